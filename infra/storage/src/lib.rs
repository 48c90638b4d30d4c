//! Filesystem-backed storage for terminal session recordings (asciicast files).
//!
//! Casts live in a plain directory tree, `<root>/<owner>/<YYYYMMDD>/<suffix>.cast`, and are
//! addressed by a reversible token instead of a database row. All examples use temporary
//! directories to avoid writing to the real filesystem.
//!
//! # Core Features
//!
//! - **Sandbox Security**: every caller-supplied path is resolved lexically and then checked
//!   against the canonical root, so neither `..` nor symlinks can leave the storage tree.
//! - **Atomic Writes**: uploads stream into `<dest>.tmp`, are `fsync`ed and renamed into place.
//!   Readers see the complete file or nothing.
//! - **Reversible Tokens**: [`CastId`] packs `(owner, date, suffix)` into URL-safe base64.
//! - **Header Extraction**: [`CastHeader`] reads only the first line; durations missing from
//!   the header are backfilled from the last event timestamp in one streaming pass.
//! - **Self-Healing**: stale `.tmp` files from interrupted uploads are purged on connect.
//!
//! # Examples
//!
//! ```rust
//! use shelf_storage::{CastStore, PartitionDate, StorageError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), StorageError> {
//!     # let tmp = tempfile::tempdir().unwrap();
//!     # let root = tmp.path().join("data");
//!     let store = CastStore::builder().root(&root).create(true).connect().await?;
//!
//!     let (credential, created) = store.register_owner("alice").await?;
//!     assert!(created);
//!     store.verify_credential("alice", credential.expose()).await?;
//!
//!     let cast: &[u8] = b"{\"version\":2,\"width\":80,\"height\":24}\n[2.3,\"o\",\"$ \"]\n";
//!     let stored = store.store_on("alice", PartitionDate::try_from("20240315")?, cast).await?;
//!     assert!(stored.rel_path.starts_with("alice/20240315/"));
//!
//!     let listed = store.list("alice").await?;
//!     assert_eq!(listed[0].header.as_ref().and_then(|h| h.duration), Some(2.3));
//!     Ok(())
//! }
//! ```

mod atomic;
mod builder;
mod credential;
mod engine;
mod error;
mod header;
mod maintenance;
mod owner;
mod security;
mod token;

pub use atomic::{TMP_SUFFIX, tmp_path, write_atomic, write_bytes_atomic, write_bytes_exclusive};
pub use builder::CastStoreBuilder;
pub use credential::{MACHINE_ID_FILE, MachineCredential, secure_eq};
pub use engine::{CastFile, CastStore, CastSummary, StoredCast};
pub use error::{StorageError, StorageErrorExt};
pub use header::{CastHeader, compute_duration, extract_header, inspect};
pub use owner::{Owner, PartitionDate};
pub use security::resolve_lexical;
pub use token::{CAST_EXTENSION, CastId};
