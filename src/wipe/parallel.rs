//! Concurrent wipes across several devices.
//!
//! One worker per request on a dedicated rayon pool. Each device runs its
//! own job; a failure on one never stops the others, and results come back
//! in request order.

use crate::error::{Error, Result};
use crate::wipe::engine::{WipeEngine, WipeReport, WipeRequest};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

/// Runs every request concurrently.
///
/// Cancel through [`WipeEngine::cancel_token`]; every worker stops at its
/// next block boundary.
///
/// # Errors
///
/// The outer error is returned only if the worker pool cannot be built.
/// Per-device errors are in the returned vector.
pub fn run_many(engine: &WipeEngine, requests: &[WipeRequest]) -> Result<Vec<Result<WipeReport>>> {
    if requests.is_empty() {
        return Ok(Vec::new());
    }

    let pool = ThreadPoolBuilder::new()
        .num_threads(requests.len())
        .thread_name(|i| format!("nullwipe-worker-{i}"))
        .build()
        .map_err(|e| Error::InvalidState {
            message: format!("cannot start wipe workers: {e}"),
        })?;

    tracing::info!(devices = requests.len(), "starting parallel wipe");
    let results = pool.install(|| {
        requests
            .par_iter()
            .map(|request| {
                let result = engine.run(request);
                if let Err(e) = &result {
                    tracing::error!(device = %request.target, error = %e, "wipe worker failed");
                }
                result
            })
            .collect()
    });
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::core::method::WipeMethod;
    use crate::system::testing::ScriptedRunner;
    use std::sync::Arc;
    use tempfile::{NamedTempFile, TempDir};

    fn engine(logs: &TempDir) -> WipeEngine {
        let mut settings = Settings::default();
        settings.paths.log_dir = logs.path().to_path_buf();
        settings.wipe.block_size = 1024;
        settings.wipe.sample_len = 256;
        WipeEngine::new(settings, Arc::new(ScriptedRunner::new()))
    }

    fn image(len: usize) -> NamedTempFile {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), vec![0x99u8; len]).unwrap();
        file
    }

    #[test]
    fn test_reports_in_request_order() {
        let logs = TempDir::new().unwrap();
        let engine = engine(&logs);
        let images: Vec<NamedTempFile> = (1..=4).map(|i| image(i * 3_000)).collect();
        let requests: Vec<WipeRequest> = images
            .iter()
            .map(|f| WipeRequest::new(f.path().to_string_lossy(), "alice").with_method(WipeMethod::Zero))
            .collect();

        let results = run_many(&engine, &requests).unwrap();
        assert_eq!(results.len(), 4);
        for (i, result) in results.iter().enumerate() {
            let report = result.as_ref().unwrap();
            assert_eq!(report.job.device.path, requests[i].target);
            assert_eq!(report.bytes_written, (i as u64 + 1) * 3_000);
            assert!(report.verified_clean);
        }
    }

    #[test]
    fn test_one_failure_does_not_stop_others() {
        let logs = TempDir::new().unwrap();
        let engine = engine(&logs);
        let good = image(2_048);
        let requests = vec![
            WipeRequest::new("/nonexistent/nullwipe-a", "alice"),
            WipeRequest::new(good.path().to_string_lossy(), "alice").with_method(WipeMethod::Random),
        ];

        let results = run_many(&engine, &requests).unwrap();
        assert!(results[0].is_err());
        let report = results[1].as_ref().unwrap();
        assert!(report.success);
        assert_eq!(report.status, "random_fill_ok");
    }

    #[test]
    fn test_empty_request_list() {
        let logs = TempDir::new().unwrap();
        assert!(run_many(&engine(&logs), &[]).unwrap().is_empty());
    }
}
