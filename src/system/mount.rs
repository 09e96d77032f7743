//! Unmounting and partition discovery.

use crate::system::probe::{Partition, list_partitions};
use crate::system::runner::CommandRunner;
use crate::wipe::log::WipeLog;
use std::time::Duration;

const UMOUNT_TIMEOUT: Duration = Duration::from_secs(10);

/// Unmounts every mounted partition of `path`.
///
/// Tries `umount -f` first and falls back to a lazy unmount. Failures are
/// logged and otherwise ignored. Returns the partitions that were unmounted.
pub fn unmount_device(runner: &dyn CommandRunner, path: &str, log: &mut WipeLog) -> Vec<String> {
    let partitions = match list_partitions(runner, path) {
        Ok(parts) => parts,
        Err(e) => {
            log.line(&format!("Could not list partitions of {path}: {e}"));
            return Vec::new();
        }
    };

    let mut unmounted = Vec::new();
    for Partition { path: part, .. } in partitions.into_iter().filter(|p| p.mountpoint.is_some()) {
        log.line(&format!("Unmounting {part}"));
        let forced = runner.run("umount", &["-f", &part], UMOUNT_TIMEOUT);
        if matches!(&forced, Ok(out) if out.success()) {
            unmounted.push(part);
            continue;
        }
        match runner.run("umount", &["-l", &part], UMOUNT_TIMEOUT) {
            Ok(out) if out.success() => unmounted.push(part),
            Ok(out) => {
                tracing::warn!(partition = %part, "could not unmount");
                log.line(&format!("Could not unmount {part}: {}", out.stderr.trim()));
            }
            Err(e) => {
                tracing::warn!(partition = %part, error = %e, "could not unmount");
                log.line(&format!("Could not unmount {part}: {e}"));
            }
        }
    }
    unmounted
}

/// Polls until `path` has a partition, returning its node.
pub fn find_partition(
    runner: &dyn CommandRunner,
    path: &str,
    retries: u32,
    delay: Duration,
) -> Option<String> {
    for attempt in 0..retries.max(1) {
        if let Ok(parts) = list_partitions(runner, path)
            && let Some(first) = parts.into_iter().next()
        {
            return Some(first.path);
        }
        if attempt + 1 < retries {
            runner.sleep(delay);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::runner::CommandOutput;
    use crate::system::testing::ScriptedRunner;

    const TREE: &str = r#"{"blockdevices":[{"name":"sdb","path":"/dev/sdb","type":"disk","mountpoint":null,
        "children":[
            {"name":"sdb1","path":"/dev/sdb1","type":"part","mountpoint":"/media/a"},
            {"name":"sdb2","path":"/dev/sdb2","type":"part","mountpoint":null},
            {"name":"sdb3","path":"/dev/sdb3","type":"part","mountpoint":"/media/c"}
        ]}]}"#;

    #[test]
    fn test_unmount_forced_then_lazy() {
        let runner = ScriptedRunner::new()
            .on_ok("lsblk -J", TREE)
            .on("umount -f /dev/sdb3", CommandOutput::failed(32, "target is busy"));
        let mut log = WipeLog::discard();

        let unmounted = unmount_device(&runner, "/dev/sdb", &mut log);
        assert_eq!(unmounted, vec!["/dev/sdb1", "/dev/sdb3"]);
        assert!(runner.called("umount -l /dev/sdb3"));
        assert!(!runner.called("umount -f /dev/sdb2"));
    }

    #[test]
    fn test_find_partition_after_retries() {
        let empty = r#"{"blockdevices":[{"name":"sdb","path":"/dev/sdb","type":"disk"}]}"#;
        let runner = ScriptedRunner::new()
            .on_ok("lsblk -J", empty)
            .on_ok("lsblk -J", empty)
            .on_ok("lsblk -J", TREE);
        let part = find_partition(&runner, "/dev/sdb", 5, Duration::from_secs(1));
        assert_eq!(part.as_deref(), Some("/dev/sdb1"));
    }

    #[test]
    fn test_find_partition_gives_up() {
        let empty = r#"{"blockdevices":[{"name":"sdb","path":"/dev/sdb","type":"disk"}]}"#;
        let runner = ScriptedRunner::new().on_ok("lsblk -J", empty);
        assert_eq!(find_partition(&runner, "/dev/sdb", 3, Duration::ZERO), None);
    }
}
