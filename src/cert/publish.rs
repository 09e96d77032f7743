//! Envelope publishing to a GitHub Pages verifier repository.
//!
//! The pretty-printed envelope is committed through the contents API and
//! served from `https://<user>.github.io/<repo>/<file>`. Any failure falls
//! back to the offline fragment, so this never returns an error.

use crate::cert::payload::Envelope;
use crate::config::UploadSettings;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use std::time::Duration;

const API_BASE: &str = "https://api.github.com";
const TIMEOUT: Duration = Duration::from_secs(20);

/// Uploads `envelope` and returns its hosted URL.
///
/// Returns `None` when the repository or token is not configured, or when
/// the request fails.
pub fn upload_envelope(settings: &UploadSettings, envelope: &Envelope) -> Option<String> {
    let (Some(user), Some(repo)) = (settings.user.as_deref(), settings.repo.as_deref()) else {
        tracing::debug!("upload target not configured");
        return None;
    };
    let Ok(token) = std::env::var(&settings.token_env) else {
        tracing::warn!(env = %settings.token_env, "upload token not set, using offline payload");
        return None;
    };

    let file = format!("cert_{}.json", Utc::now().format("%Y%m%d_%H%M%S"));
    let pretty = serde_json::to_string_pretty(&envelope.to_value()).ok()?;
    let body = serde_json::json!({
        "message": format!("Add {file}"),
        "content": STANDARD.encode(pretty),
        "branch": settings.branch,
    });

    let client = match reqwest::blocking::Client::builder()
        .timeout(TIMEOUT)
        .user_agent(concat!("nullwipe/", env!("CARGO_PKG_VERSION")))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(error = %e, "could not build HTTP client");
            return None;
        }
    };

    let url = format!("{API_BASE}/repos/{user}/{repo}/contents/{file}");
    let response = client
        .put(&url)
        .header("Authorization", format!("token {token}"))
        .header("Accept", "application/vnd.github+json")
        .json(&body)
        .send();

    match response {
        Ok(resp) if matches!(resp.status().as_u16(), 200 | 201) => {
            let hosted = format!("https://{user}.github.io/{repo}/{file}");
            tracing::info!(url = %hosted, "envelope published");
            Some(hosted)
        }
        Ok(resp) => {
            let status = resp.status();
            let text = resp.text().unwrap_or_default();
            tracing::warn!(status = %status, body = %text, "envelope upload rejected");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "envelope upload failed");
            None
        }
    }
}
