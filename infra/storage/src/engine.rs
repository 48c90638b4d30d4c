//! The cast store: the one handle the HTTP layer talks to.
//!
//! Layout on disk is `<root>/<owner>/<YYYYMMDD>/<suffix>.cast` with the owner's upload secret
//! at `<root>/<owner>/machine-id`. The directory structure doubles as the index, so there is no
//! database to keep in sync.

use crate::atomic::write_atomic;
use crate::atomic::write_bytes_exclusive;
use crate::builder::CastStoreBuilder;
use crate::credential::{MACHINE_ID_FILE, MachineCredential};
use crate::error::{StorageError, StorageErrorExt};
use crate::header::{self, CastHeader};
use crate::maintenance;
use crate::owner::{Owner, PartitionDate};
use crate::security;
use crate::token::{CAST_EXTENSION, CastId};
use chrono::{DateTime, Utc};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tracing::{debug, info, warn};

const SUFFIX_LEN: usize = 8;
const SUFFIX_ATTEMPTS: usize = 8;
const SUFFIX_ALPHABET: [char; 26] = [
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's',
    't', 'u', 'v', 'w', 'x', 'y', 'z',
];

/// The internal shared state of a [`CastStore`].
#[derive(Debug)]
pub struct CastStoreInner {
    /// Canonical physical path of the storage root.
    pub(crate) root: PathBuf,
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredCast {
    pub id: CastId,
    pub token: String,
    /// `<owner>/<date>/<suffix>`, without the extension.
    pub rel_path: String,
    pub size: u64,
    pub header: CastHeader,
}

/// One entry of an owner's listing.
#[derive(Debug, Clone, PartialEq)]
pub struct CastSummary {
    pub id: CastId,
    pub token: String,
    pub rel_path: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    /// `None` when the header could not be read; the entry is still listed.
    pub header: Option<CastHeader>,
}

/// An opened cast ready to be streamed back to a client.
#[derive(Debug)]
pub struct CastFile {
    pub file: fs::File,
    pub size: u64,
    pub path: PathBuf,
}

/// A thread-safe handle to the cast storage tree.
///
/// Every caller-supplied path goes through the sandbox resolver, every write goes through the
/// atomic writer. The handle is reference-counted and cheap to clone into request handlers.
///
/// # Example
///
/// ```rust
/// use shelf_storage::{CastStore, PartitionDate, StorageError};
///
/// #[tokio::main]
/// async fn main() -> Result<(), StorageError> {
///     # let tmp = tempfile::tempdir().unwrap();
///     let store = CastStore::builder().root(tmp.path().join("data")).connect().await?;
///
///     let cast: &[u8] = b"{\"version\":2,\"width\":80,\"height\":24}\n[0.5,\"o\",\"hi\"]\n";
///     let date = PartitionDate::try_from("20240315")?;
///     let stored = store.store_on("alice", date, cast).await?;
///
///     let file = store.fetch_by_token(&stored.token).await?;
///     assert_eq!(file.size, cast.len() as u64);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CastStore {
    pub(crate) inner: Arc<CastStoreInner>,
}

impl Deref for CastStore {
    type Target = CastStoreInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl CastStore {
    #[must_use = "The store is not opened until you call .connect()"]
    pub fn builder() -> CastStoreBuilder {
        CastStoreBuilder::new()
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a storage-relative path to a physical path inside the root.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::PathTraversal`] if the path is absolute, escapes the root
    /// lexically or through a symlink, or names the root itself. Returns [`StorageError::Io`]
    /// if an existing ancestor cannot be verified.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<PathBuf, StorageError> {
        security::resolve_path(&self.root, path)
    }

    /// Stores an upload under today's (UTC) partition.
    ///
    /// # Errors
    ///
    /// See [`CastStore::store_on`].
    pub async fn store<R>(&self, owner: &str, reader: R) -> Result<StoredCast, StorageError>
    where
        R: AsyncRead + Unpin,
    {
        self.store_on(owner, PartitionDate::today(), reader).await
    }

    /// Streams an upload into `<owner>/<date>/<suffix>.cast` and mints its token.
    ///
    /// Only the first line is buffered for validation; the rest of the stream goes straight to
    /// the atomic writer.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Validation`] for an invalid owner or empty content.
    /// - [`StorageError::Parse`] if the first line is not a valid header.
    /// - [`StorageError::PathTraversal`] if the owner directory escapes the root via symlink.
    /// - [`StorageError::Io`] on read, write or sync failures, or when no free suffix could be
    ///   allocated. Nothing is left at the destination in that case.
    pub async fn store_on<R>(
        &self,
        owner: &str,
        date: PartitionDate,
        reader: R,
    ) -> Result<StoredCast, StorageError>
    where
        R: AsyncRead + Unpin,
    {
        let owner = Owner::try_from(owner)?;

        let mut reader = BufReader::new(reader);
        let mut first_line = Vec::new();
        let read =
            reader.read_until(b'\n', &mut first_line).await.context("Failed to read upload")?;
        if read == 0 {
            return Err(StorageError::validation("EMPTY", "Uploaded cast has no content"));
        }
        let header = CastHeader::parse_line(&first_line)?;

        let date_dir = self.resolve(format!("{owner}/{date}"))?;
        fs::create_dir_all(&date_dir)
            .await
            .context(format!("Failed to create partition {}", date_dir.display()))?;

        let suffix = allocate_suffix(&date_dir).await?;
        let id = CastId::new(owner.as_str(), date.as_str(), suffix);
        let destination = self.resolve(id.relative_path())?;

        let mut body = std::io::Cursor::new(first_line).chain(reader);
        let size = write_atomic(&destination, &mut body).await?;

        let stored = StoredCast {
            token: id.encode(),
            rel_path: id.public_path(),
            id,
            size,
            header,
        };
        info!(owner = %owner, rel_path = %stored.rel_path, size, "Cast stored");
        Ok(stored)
    }

    /// Lists every committed cast of `owner`, newest partition first, then by suffix.
    ///
    /// Missing or unreadable directories contribute nothing. A cast whose header cannot be
    /// read is still listed with `header: None`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Validation`] for an invalid owner name, or
    /// [`StorageError::PathTraversal`] if the owner directory is a symlink out of the root.
    pub async fn list(&self, owner: &str) -> Result<Vec<CastSummary>, StorageError> {
        let owner = Owner::try_from(owner)?;
        let owner_dir = self.resolve(owner.as_str())?;

        let mut casts = Vec::new();
        for date in partitions(&owner_dir).await {
            let date_dir = owner_dir.join(date.as_str());
            for (suffix, path, meta) in committed_casts(&date_dir).await {
                let id = CastId::new(owner.as_str(), date.as_str(), suffix);
                let header = match header::inspect(&path).await {
                    Ok(header) => Some(header),
                    Err(e) => {
                        debug!(path = %path.display(), error = %e, "Listing cast without header");
                        None
                    },
                };
                casts.push(CastSummary {
                    token: id.encode(),
                    rel_path: id.public_path(),
                    id,
                    size: meta.len(),
                    modified: meta.modified().ok().map(DateTime::<Utc>::from),
                    header,
                });
            }
        }

        casts.sort_by(|a, b| {
            b.id.date.cmp(&a.id.date).then_with(|| a.id.suffix.cmp(&b.id.suffix))
        });
        Ok(casts)
    }

    /// Opens a cast by its storage-relative path. The `.cast` extension is optional.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::PathTraversal`] for paths leaving the root,
    /// [`StorageError::NotFound`] if nothing (or a directory) is there, and
    /// [`StorageError::Io`] if the file cannot be opened.
    pub async fn fetch_by_path(&self, rel_path: &str) -> Result<CastFile, StorageError> {
        let mut rel = PathBuf::from(rel_path);
        if rel.extension().and_then(|e| e.to_str()) != Some(CAST_EXTENSION) {
            let mut name = rel.into_os_string();
            name.push(".");
            name.push(CAST_EXTENSION);
            rel = PathBuf::from(name);
        }

        let path = self.resolve(&rel)?;
        let meta = fs::metadata(&path).await.map_err(|e| StorageError::from_io(e, &path))?;
        if !meta.is_file() {
            return Err(StorageError::not_found(path.display().to_string()));
        }

        let file = fs::File::open(&path).await.map_err(|e| StorageError::from_io(e, &path))?;
        debug!(path = %path.display(), size = meta.len(), "Cast opened");
        Ok(CastFile { file, size: meta.len(), path })
    }

    /// Opens a cast by its public token.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidToken`] if the token does not decode; otherwise see
    /// [`CastStore::fetch_by_path`].
    pub async fn fetch_by_token(&self, token: &str) -> Result<CastFile, StorageError> {
        let id = CastId::decode(token)?;
        self.fetch_by_path(&id.relative_path()).await
    }

    /// `true` when `owner` is a valid name with a directory under the root.
    pub async fn owner_exists(&self, owner: &str) -> bool {
        let Ok(owner) = Owner::try_from(owner) else {
            return false;
        };
        match self.resolve(owner.as_str()) {
            Ok(dir) => fs::metadata(&dir).await.is_ok_and(|m| m.is_dir()),
            Err(_) => false,
        }
    }

    /// Ensures `owner` has a machine credential and returns it.
    ///
    /// The boolean is `true` when the credential was created by this call. An existing
    /// credential is never rotated; concurrent callers all receive the one that was committed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Validation`] for an invalid owner name and
    /// [`StorageError::Io`] if the directory or secret cannot be written.
    pub async fn register_owner(
        &self,
        owner: &str,
    ) -> Result<(MachineCredential, bool), StorageError> {
        let owner = Owner::try_from(owner)?;
        let owner_dir = self.resolve(owner.as_str())?;
        fs::create_dir_all(&owner_dir)
            .await
            .context(format!("Failed to create owner directory {}", owner_dir.display()))?;

        let path = owner_dir.join(MACHINE_ID_FILE);
        match read_credential(&path).await {
            Ok(existing) => return Ok((existing, false)),
            Err(StorageError::NotFound { .. }) => {},
            Err(e) => return Err(e),
        }

        let credential = MachineCredential::generate();
        if write_bytes_exclusive(&path, credential.to_file_contents().as_bytes()).await? {
            info!(owner = %owner, "Owner registered");
            return Ok((credential, true));
        }

        debug!(owner = %owner, "Owner registered concurrently, using stored credential");
        match read_credential(&path).await {
            Ok(existing) => Ok((existing, false)),
            Err(StorageError::NotFound { .. }) => Err(StorageError::Io {
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "stored machine credential is empty",
                ),
                context: Some(path.display().to_string().into()),
            }),
            Err(e) => Err(e),
        }
    }

    /// Reads the stored credential of `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the owner has none, [`StorageError::Validation`]
    /// for an invalid owner name.
    pub async fn machine_credential(&self, owner: &str) -> Result<MachineCredential, StorageError> {
        let owner = Owner::try_from(owner)?;
        let path = self.resolve(format!("{owner}/{MACHINE_ID_FILE}"))?;
        read_credential(&path).await
    }

    /// Checks a presented secret against the stored credential in constant time.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Auth`] when the owner is unknown or invalid, or the secret does
    /// not match. I/O failures are reported as [`StorageError::Io`].
    pub async fn verify_credential(&self, owner: &str, presented: &str) -> Result<(), StorageError> {
        let stored = match self.machine_credential(owner).await {
            Ok(stored) => stored,
            Err(
                StorageError::NotFound { .. }
                | StorageError::Validation { .. }
                | StorageError::PathTraversal { .. },
            ) => {
                warn!(owner, "Upload attempted for unknown owner");
                return Err(StorageError::auth(owner.to_owned()));
            },
            Err(e) => return Err(e),
        };

        if stored.matches(presented) {
            Ok(())
        } else {
            warn!(owner, "Upload attempted with wrong machine credential");
            Err(StorageError::auth(owner.to_owned()))
        }
    }

    /// Every registered owner (a valid directory name holding a `machine-id`), sorted.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the root cannot be read.
    pub async fn list_owners(&self) -> Result<Vec<Owner>, StorageError> {
        let mut entries = fs::read_dir(&self.root).await.context("Failed to read storage root")?;

        let mut owners = Vec::new();
        while let Some(entry) = entries.next_entry().await.context("Failed to read storage root")? {
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            let Ok(owner) = Owner::try_from(name) else {
                continue;
            };
            if fs::try_exists(entry.path().join(MACHINE_ID_FILE)).await.unwrap_or(false) {
                owners.push(owner);
            }
        }

        owners.sort();
        Ok(owners)
    }

    /// Removes abandoned `.tmp` files older than five minutes.
    pub async fn purge_tmp(&self) {
        maintenance::purge_tmp(&self.root).await;
    }
}

async fn allocate_suffix(date_dir: &Path) -> Result<String, StorageError> {
    allocate_suffix_with(date_dir, || nanoid::nanoid!(SUFFIX_LEN, &SUFFIX_ALPHABET)).await
}

async fn allocate_suffix_with(
    date_dir: &Path,
    mut next: impl FnMut() -> String,
) -> Result<String, StorageError> {
    for _ in 0..SUFFIX_ATTEMPTS {
        let suffix = next();
        let candidate = date_dir.join(format!("{suffix}.{CAST_EXTENSION}"));
        let taken = fs::try_exists(&candidate).await.context("Failed to check suffix")?
            || fs::try_exists(crate::atomic::tmp_path(&candidate))
                .await
                .context("Failed to check suffix")?;
        if !taken {
            return Ok(suffix);
        }
        debug!(suffix = %suffix, "Suffix collision, retrying");
    }

    Err(StorageError::Io {
        source: std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{SUFFIX_ATTEMPTS} suffix candidates taken in {}", date_dir.display()),
        ),
        context: Some("Could not allocate a unique cast suffix".into()),
    })
}

async fn read_credential(path: &Path) -> Result<MachineCredential, StorageError> {
    let raw = fs::read_to_string(path).await.map_err(|e| StorageError::from_io(e, path))?;
    let credential = MachineCredential::from_stored(&raw);
    if credential.expose().is_empty() {
        return Err(StorageError::not_found(path.display().to_string()));
    }
    Ok(credential)
}

/// Valid `YYYYMMDD` directories under an owner directory.
async fn partitions(owner_dir: &Path) -> Vec<PartitionDate> {
    let mut out = Vec::new();
    let Ok(mut entries) = fs::read_dir(owner_dir).await else {
        return out;
    };

    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let is_dir = entry.file_type().await.is_ok_and(|t| t.is_dir());
                let date = entry.file_name().to_str().and_then(|n| PartitionDate::try_from(n).ok());
                if let (true, Some(date)) = (is_dir, date) {
                    out.push(date);
                }
            },
            Ok(None) => break,
            Err(e) => {
                warn!(path = %owner_dir.display(), error = %e, "Stopped reading owner directory");
                break;
            },
        }
    }
    out
}

/// Committed `.cast` files in a partition: `(suffix, path, metadata)`.
async fn committed_casts(date_dir: &Path) -> Vec<(String, PathBuf, std::fs::Metadata)> {
    let mut out = Vec::new();
    let Ok(mut entries) = fs::read_dir(date_dir).await else {
        return out;
    };

    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some(CAST_EXTENSION) {
                    continue;
                }
                let Some(suffix) = path.file_stem().and_then(|s| s.to_str()).map(str::to_owned)
                else {
                    continue;
                };
                match entry.metadata().await {
                    Ok(meta) if meta.is_file() => out.push((suffix, path, meta)),
                    Ok(_) => {},
                    Err(e) => debug!(path = %path.display(), error = %e, "Skipping unreadable cast"),
                }
            },
            Ok(None) => break,
            Err(e) => {
                warn!(path = %date_dir.display(), error = %e, "Stopped reading partition");
                break;
            },
        }
    }
    out
}
