//! Crash-safe commits: readers either see the complete file or nothing at all.

use crate::error::StorageError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, warn};

/// Suffix appended to the destination path while a write is in flight.
pub const TMP_SUFFIX: &str = ".tmp";

/// The temporary sibling used while writing `target`.
#[must_use]
pub fn tmp_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(TMP_SUFFIX);
    PathBuf::from(name)
}

/// Streams `reader` into `destination` using the "atomic swap" pattern.
///
/// 1. All bytes are written to `destination + ".tmp"`.
/// 2. The temporary file is synced to hardware (`fsync`) and closed.
/// 3. It is renamed onto `destination` (atomic within one directory).
/// 4. The parent directory is synced on a best-effort basis.
///
/// Parent directories are **not** created; that is the caller's job.
///
/// # Reliability
///
/// If any step fails, the temporary file is removed before the error is returned, so the
/// destination never reflects a partial write and no stray artifact remains.
///
/// # Errors
///
/// Returns [`StorageError::Io`] for write, sync, close or rename failures.
pub async fn write_atomic<R>(destination: &Path, reader: &mut R) -> Result<u64, StorageError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let temp = tmp_path(destination);

    match stage_and_swap(&temp, destination, reader).await {
        Ok(written) => {
            if let Some(parent) = destination.parent() {
                sync_dir(parent).await;
            }
            debug!(path = %destination.display(), bytes = written, "File committed atomically");
            Ok(written)
        },
        Err(err) => {
            discard(&temp).await;
            Err(err)
        },
    }
}

/// Convenience wrapper over [`write_atomic`] for in-memory payloads.
///
/// # Errors
///
/// See [`write_atomic`].
pub async fn write_bytes_atomic(destination: &Path, data: &[u8]) -> Result<u64, StorageError> {
    let mut reader = data;
    write_atomic(destination, &mut reader).await
}

/// Commits `data` to `destination` only if nothing exists there yet.
///
/// Each call stages into its own uniquely named sibling, syncs it, then hard-links it onto
/// `destination`. Linking never replaces an existing file, so among concurrent callers exactly
/// one wins. The staged file is removed in every case.
///
/// Returns `true` when this call created `destination`, `false` when it already existed.
///
/// # Errors
///
/// Returns [`StorageError::Io`] if staging or linking fails for any other reason.
pub async fn write_bytes_exclusive(destination: &Path, data: &[u8]) -> Result<bool, StorageError> {
    let temp = unique_tmp_path(destination);

    let result = stage_and_link(&temp, destination, data).await;
    match fs::remove_file(&temp).await {
        Ok(()) => {},
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {},
        Err(err) => warn!(path = %temp.display(), error = %err, "Temporary file cleanup failed"),
    }

    if let Ok(true) = result {
        if let Some(parent) = destination.parent() {
            sync_dir(parent).await;
        }
        debug!(path = %destination.display(), "File created exclusively");
    }
    result
}

/// `<target>.<random>.tmp`, private to one writer.
fn unique_tmp_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(".");
    name.push(nanoid::nanoid!(12, &nanoid::alphabet::SAFE));
    name.push(TMP_SUFFIX);
    PathBuf::from(name)
}

async fn stage_and_link(temp: &Path, destination: &Path, data: &[u8]) -> Result<bool, StorageError> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(temp)
        .await
        .map_err(|source| StorageError::Io {
            source,
            context: Some(format!("Temp creation failed: {}", temp.display()).into()),
        })?;
    file.write_all(data)
        .await
        .map_err(|source| StorageError::Io { source, context: Some("Write failed".into()) })?;
    file.sync_all().await.map_err(|source| StorageError::Io {
        source,
        context: Some("Hardware sync failed".into()),
    })?;
    drop(file);

    match fs::hard_link(temp, destination).await {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(source) => Err(StorageError::Io {
            source,
            context: Some(
                format!("Exclusive link failed: {} -> {}", temp.display(), destination.display())
                    .into(),
            ),
        }),
    }
}

async fn stage_and_swap<R>(
    temp: &Path,
    destination: &Path,
    reader: &mut R,
) -> Result<u64, StorageError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let written = {
        let mut file = fs::File::create(temp).await.map_err(|source| StorageError::Io {
            source,
            context: Some(format!("Temp creation failed: {}", temp.display()).into()),
        })?;
        let written = tokio::io::copy(reader, &mut file).await.map_err(|source| {
            StorageError::Io { source, context: Some("Write failed".into()) }
        })?;
        file.flush().await.map_err(|source| StorageError::Io {
            source,
            context: Some("Flush failed".into()),
        })?;
        file.sync_all().await.map_err(|source| StorageError::Io {
            source,
            context: Some("Hardware sync failed".into()),
        })?;
        written
    };

    fs::rename(temp, destination).await.map_err(|source| StorageError::Io {
        source,
        context: Some(
            format!("Atomic swap failed: {} -> {}", temp.display(), destination.display())
                .into(),
        ),
    })?;

    Ok(written)
}

async fn discard(temp: &Path) {
    match fs::remove_file(temp).await {
        Ok(()) => debug!(path = %temp.display(), "Removed temporary file after failed write"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {},
        Err(err) => warn!(path = %temp.display(), error = %err, "Temporary file cleanup failed"),
    }
}

async fn sync_dir(path: &Path) {
    match fs::File::open(path).await {
        Ok(dir) => {
            if let Err(err) = dir.sync_all().await {
                warn!(path = %path.display(), error = %err, "Directory sync failed");
            }
        },
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Directory open failed");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    /// Yields a few bytes, then fails like a dropped upload connection.
    struct BrokenStream {
        sent: bool,
    }

    impl AsyncRead for BrokenStream {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if self.sent {
                Poll::Ready(Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer went away")))
            } else {
                self.sent = true;
                buf.put_slice(b"{\"version\":2,\"width\":80");
                Poll::Ready(Ok(()))
            }
        }
    }

    #[tokio::test]
    async fn commits_complete_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("abc.cast");

        let written = write_bytes_atomic(&dest, b"hello\nworld\n").await.unwrap();

        assert_eq!(written, 12);
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello\nworld\n");
        assert!(!tmp_path(&dest).exists());
    }

    #[tokio::test]
    async fn interrupted_stream_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("abc.cast");

        let err = write_atomic(&dest, &mut BrokenStream { sent: false }).await.unwrap_err();

        assert!(matches!(err, StorageError::Io { .. }));
        assert!(!dest.exists(), "destination must not exist after a failed write");
        assert!(!tmp_path(&dest).exists(), "temporary file must be cleaned up");
    }

    #[tokio::test]
    async fn interrupted_stream_keeps_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("abc.cast");
        write_bytes_atomic(&dest, b"previous").await.unwrap();

        assert!(write_atomic(&dest, &mut BrokenStream { sent: false }).await.is_err());

        assert_eq!(std::fs::read(&dest).unwrap(), b"previous");
    }

    #[tokio::test]
    async fn exclusive_write_never_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("machine-id");

        assert!(write_bytes_exclusive(&dest, b"first\n").await.unwrap());
        assert!(!write_bytes_exclusive(&dest, b"second\n").await.unwrap());
        assert_eq!(std::fs::read(&dest).unwrap(), b"first\n");

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .filter(|n| n != "machine-id")
            .collect();
        assert!(leftovers.is_empty(), "staged files left behind: {leftovers:?}");
    }

    #[tokio::test]
    async fn missing_parent_is_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing").join("abc.cast");

        assert!(write_bytes_atomic(&dest, b"x").await.is_err());
        assert!(!dir.path().join("missing").exists());
    }
}
