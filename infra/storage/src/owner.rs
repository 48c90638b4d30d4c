use crate::error::StorageError;
use chrono::{DateTime, Utc};
use std::fmt;

/// The account namespace a cast belongs to; also its directory name under the storage root.
///
/// # Constraints
/// - Characters are limited to ASCII letters, digits, `_` and `-`.
/// - The name may not be empty and may not start with `.`.
/// - Case is preserved (`Alice` and `alice` are different owners).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Owner(String);

impl Owner {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` when `value` would be accepted as an owner name.
    #[must_use]
    pub fn is_valid(value: &str) -> bool {
        !value.is_empty()
            && !value.starts_with('.')
            && value.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    }
}

impl TryFrom<&str> for Owner {
    type Error = StorageError;

    fn try_from(value: &str) -> Result<Self, StorageError> {
        if value.is_empty() {
            return Err(StorageError::validation("EMPTY", "Owner cannot be empty"));
        }

        if !Self::is_valid(value) {
            return Err(StorageError::validation(
                value.to_owned(),
                "Owner contains illegal characters",
            ));
        }

        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for Owner {
    type Error = StorageError;

    fn try_from(value: String) -> Result<Self, StorageError> {
        if Self::is_valid(&value) { Ok(Self(value)) } else { Self::try_from(value.as_str()) }
    }
}

impl TryFrom<&String> for Owner {
    type Error = StorageError;

    fn try_from(value: &String) -> Result<Self, StorageError> {
        Self::try_from(value.as_str())
    }
}

impl AsRef<str> for Owner {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Calendar-day directory segment (`YYYYMMDD`) grouping casts uploaded on the same UTC day.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionDate(String);

impl PartitionDate {
    /// The UTC day of the server clock.
    #[must_use]
    pub fn today() -> Self {
        Self::from_datetime(Utc::now())
    }

    #[must_use]
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.format("%Y%m%d").to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_valid(value: &str) -> bool {
        value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit())
    }
}

impl TryFrom<&str> for PartitionDate {
    type Error = StorageError;

    fn try_from(value: &str) -> Result<Self, StorageError> {
        if Self::is_valid(value) {
            Ok(Self(value.to_owned()))
        } else {
            Err(StorageError::validation(value.to_owned(), "Partition date must be YYYYMMDD"))
        }
    }
}

impl AsRef<str> for PartitionDate {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartitionDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
