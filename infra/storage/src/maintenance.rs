use crate::atomic::TMP_SUFFIX;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{error, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Temporary files younger than this may still belong to an in-flight upload.
pub(crate) const STALE_AFTER: Duration = Duration::from_secs(300);

pub(crate) async fn purge_tmp(root: &Path) {
    let root = root.to_path_buf();
    let now = SystemTime::now();

    match tokio::task::spawn_blocking(move || remove_stale(&root, now, STALE_AFTER)).await {
        Ok((removed, failed)) if removed > 0 || failed > 0 => {
            info!(removed, failed, "Purged abandoned upload files");
        },
        Err(e) => {
            error!(error = %e, "Temporary file purge task panicked");
        },
        _ => {},
    }
}

pub(crate) fn remove_stale(root: &Path, now: SystemTime, threshold: Duration) -> (usize, usize) {
    let mut removed = 0;
    let mut failed = 0;

    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .flatten()
        .filter(|entry| is_tmp(entry) && is_stale(entry, now, threshold))
        .for_each(|entry| match std::fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "Failed to remove temporary file");
                failed += 1;
            },
        });

    (removed, failed)
}

fn is_tmp(entry: &DirEntry) -> bool {
    entry.file_type().is_file()
        && entry.file_name().to_str().is_some_and(|name| name.ends_with(TMP_SUFFIX))
}

fn is_stale(entry: &DirEntry, now: SystemTime, threshold: Duration) -> bool {
    entry
        .metadata()
        .ok()
        .and_then(|m| m.modified().ok())
        .and_then(|modified| now.duration_since(modified).ok())
        .is_some_and(|age| age > threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_only_stale_tmp_files() {
        let dir = tempfile::tempdir().unwrap();
        let date_dir = dir.path().join("alice").join("20240315");
        std::fs::create_dir_all(&date_dir).unwrap();
        std::fs::write(date_dir.join("abcdefgh.cast.tmp"), b"partial").unwrap();
        std::fs::write(date_dir.join("abcdefgh.cast"), b"{}").unwrap();

        let (removed, failed) = remove_stale(dir.path(), SystemTime::now(), STALE_AFTER);
        assert_eq!((removed, failed), (0, 0), "fresh temp files belong to live uploads");

        let later = SystemTime::now() + STALE_AFTER + Duration::from_secs(1);
        let (removed, failed) = remove_stale(dir.path(), later, STALE_AFTER);
        assert_eq!((removed, failed), (1, 0));
        assert!(!date_dir.join("abcdefgh.cast.tmp").exists());
        assert!(date_dir.join("abcdefgh.cast").exists());
        assert!(date_dir.exists(), "directories are left in place");
    }
}
