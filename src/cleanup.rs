use std::path::Path;
use tracing::{info, warn};

/// Remove temp files left behind by interrupted atomic writes of `target`.
/// Only names of the form `.<target>.<pid>.<nanos>.tmp` are touched, so
/// temp files of other runs sharing `dir` survive.
pub async fn reap_stale_temp_files(dir: &Path, target: &str) {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(e) => e,
        Err(_) => return,
    };

    let mut reaped = 0u32;

    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !is_atomic_temp_of(name, target) {
            continue;
        }
        let path = entry.path();
        match tokio::fs::remove_file(&path).await {
            Ok(()) => reaped += 1,
            Err(e) => warn!("Failed to cleanup {}: {}", path.display(), e),
        }
    }

    if reaped > 0 {
        info!(
            "Reaped {} stale temp files of {} in {}",
            reaped,
            target,
            dir.display()
        );
    }
}

fn is_atomic_temp_of(name: &str, target: &str) -> bool {
    let Some(rest) = name
        .strip_prefix('.')
        .and_then(|n| n.strip_prefix(target))
        .and_then(|n| n.strip_prefix('.'))
        .and_then(|n| n.strip_suffix(".tmp"))
    else {
        return false;
    };
    // <pid>.<nanos>
    match rest.split_once('.') {
        Some((pid, nanos)) => {
            !pid.is_empty()
                && !nanos.is_empty()
                && pid.bytes().all(|b| b.is_ascii_digit())
                && nanos.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: &str = "evaluate-a.checkpoint.json";

    #[test]
    fn test_is_atomic_temp_of() {
        assert!(is_atomic_temp_of(
            ".evaluate-a.checkpoint.json.4242.1700000000.tmp",
            TARGET
        ));
        assert!(!is_atomic_temp_of(TARGET, TARGET));
        assert!(!is_atomic_temp_of(
            ".evaluate-b.checkpoint.json.4242.1700000000.tmp",
            TARGET
        ));
        assert!(!is_atomic_temp_of(".evaluate-a.checkpoint.json.tmp", TARGET));
        assert!(!is_atomic_temp_of(
            ".evaluate-a.checkpoint.json.x.1.tmp",
            TARGET
        ));
        assert!(!is_atomic_temp_of("notes.tmp", TARGET));
    }

    #[tokio::test]
    async fn test_reap_nonexistent_dir() {
        reap_stale_temp_files(Path::new("/tmp/nonexistent_test_dir_xyz"), TARGET).await;
        // should not panic
    }

    #[tokio::test]
    async fn test_reap_only_temp_files() {
        let tmp = tempfile::tempdir().unwrap();
        let checkpoint = tmp.path().join(TARGET);
        let stale = tmp.path().join(".evaluate-a.checkpoint.json.99.123.tmp");
        tokio::fs::write(&checkpoint, "{}").await.unwrap();
        tokio::fs::write(&stale, "{\"partial").await.unwrap();

        reap_stale_temp_files(tmp.path(), TARGET).await;

        assert!(checkpoint.exists());
        assert!(!stale.exists());
    }

    #[tokio::test]
    async fn test_reap_leaves_other_runs_in_flight_writes() {
        let tmp = tempfile::tempdir().unwrap();
        let ours = tmp.path().join(".evaluate-a.checkpoint.json.99.123.tmp");
        let other_run = tmp.path().join(".evaluate-b.checkpoint.json.77.456.tmp");
        let other_mode = tmp.path().join(".call-a.checkpoint.json.77.456.tmp");
        for path in [&ours, &other_run, &other_mode] {
            tokio::fs::write(path, "{\"partial").await.unwrap();
        }

        reap_stale_temp_files(tmp.path(), TARGET).await;

        assert!(!ours.exists());
        assert!(other_run.exists());
        assert!(other_mode.exists());
    }
}
