use crate::error::StorageError;
use std::path::{Component, Path, PathBuf};

/// Collapse `.` / `..` lexically while ensuring the path never escapes the sandbox root.
///
/// Allows `..` as long as it doesn't go "above" the empty relative base.
pub(crate) fn normalize_relative(path: &Path) -> Result<PathBuf, StorageError> {
    let mut out = PathBuf::new();

    for c in path.components() {
        match c {
            Component::CurDir => {},
            Component::Normal(seg) => out.push(seg),
            Component::ParentDir => {
                if !out.pop() {
                    return Err(StorageError::traversal(
                        path.display().to_string(),
                        "Path attempted to escape storage root via '..'",
                    ));
                }
            },
            Component::RootDir | Component::Prefix(_) => {
                return Err(StorageError::traversal(
                    path.display().to_string(),
                    "Absolute paths are not allowed",
                ));
            },
        }
    }

    if out.as_os_str().is_empty() {
        return Err(StorageError::traversal(
            path.display().to_string(),
            "Path resolves to the storage root itself",
        ));
    }

    Ok(out)
}

/// Joins a caller-supplied relative path onto `root` without touching the filesystem.
///
/// After joining, the relative path from `root` to the candidate is recomputed and must not
/// start with `..`; this catches platform normalization quirks the lexical pass misses.
pub fn resolve_lexical(root: &Path, path: impl AsRef<Path>) -> Result<PathBuf, StorageError> {
    let path = path.as_ref();

    if path.is_absolute() || path.has_root() {
        return Err(StorageError::traversal(
            path.display().to_string(),
            "Absolute paths are not allowed",
        ));
    }

    let safe_rel = normalize_relative(path)?;
    let joined = root.join(&safe_rel);

    let escapes = joined.strip_prefix(root).map_or(true, |rel| {
        matches!(rel.components().next(), Some(Component::ParentDir) | None)
    });
    if escapes {
        return Err(StorageError::traversal(
            joined.display().to_string(),
            "Path is outside storage boundaries",
        ));
    }

    Ok(joined)
}

/// Full resolution used by the store: the lexical check plus symlink hardening.
///
/// `root` must already be canonical. When the candidate (or its nearest existing ancestor)
/// exists on disk, its physical location must still be under `root`.
pub(crate) fn resolve_path(root: &Path, path: impl AsRef<Path>) -> Result<PathBuf, StorageError> {
    let joined = resolve_lexical(root, path)?;

    match joined.canonicalize() {
        Ok(canonical) => validate_canonical(root, &canonical).map(|()| joined),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => validate_ancestor(root, &joined),
        Err(e) => Err(StorageError::Io {
            source: e,
            context: Some(format!("Failed to verify {}", joined.display()).into()),
        }),
    }
}

fn validate_canonical(root: &Path, canonical: &Path) -> Result<(), StorageError> {
    if canonical.starts_with(root) {
        Ok(())
    } else {
        Err(StorageError::traversal(
            canonical.display().to_string(),
            "Path escapes storage root through a symlink",
        ))
    }
}

/// Validates a path that doesn't exist yet by verifying its first existing ancestor.
fn validate_ancestor(root: &Path, joined: &Path) -> Result<PathBuf, StorageError> {
    let mut current = joined.parent();

    while let Some(path) = current {
        if path == root {
            return Ok(joined.to_path_buf());
        }

        if path.exists() {
            return match path.canonicalize() {
                Ok(canonical) => validate_canonical(root, &canonical).map(|()| joined.to_path_buf()),
                Err(e) => Err(StorageError::Io {
                    source: e,
                    context: Some("Failed to verify parent directory".into()),
                }),
            };
        }

        current = path.parent();
    }

    Err(StorageError::traversal(
        joined.display().to_string(),
        "No valid parent directory found within storage root",
    ))
}
