//! Reversible cast identifiers used in place of a database lookup.
//!
//! A token is the URL-safe, padding-free base64 form of
//! `"{owner_len}:{owner}:{date}:{suffix}"`, where `owner_len` is the decimal byte length of the
//! owner. Decoding trusts the length prefix to slice the owner, then splits the remainder on
//! `:` into exactly two fields.

use crate::error::StorageError;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use std::fmt;
use std::str::FromStr;

const DELIMITER: char = ':';
const TRAILING_FIELDS: usize = 2;

/// File extension of committed cast content.
pub const CAST_EXTENSION: &str = "cast";

/// Identity of a stored cast: `(owner, partition date, unique suffix)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CastId {
    pub owner: String,
    pub date: String,
    pub suffix: String,
}

impl CastId {
    pub fn new(
        owner: impl Into<String>,
        date: impl Into<String>,
        suffix: impl Into<String>,
    ) -> Self {
        Self { owner: owner.into(), date: date.into(), suffix: suffix.into() }
    }

    /// Packs the triple and encodes it as an opaque token.
    #[must_use]
    pub fn encode(&self) -> String {
        let packed = format!(
            "{len}{DELIMITER}{owner}{DELIMITER}{date}{DELIMITER}{suffix}",
            len = self.owner.len(),
            owner = self.owner,
            date = self.date,
            suffix = self.suffix,
        );
        URL_SAFE_NO_PAD.encode(packed)
    }

    /// Decodes a token produced by [`CastId::encode`].
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidToken`] when the token is not base64, the length prefix
    /// is not numeric or out of range, or the packed form has the wrong number of fields.
    pub fn decode(token: &str) -> Result<Self, StorageError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|e| StorageError::invalid_token(format!("invalid base64 encoding: {e}")))?;
        let packed = String::from_utf8(bytes)
            .map_err(|_| StorageError::invalid_token("packed token is not UTF-8"))?;

        let (len, rest) = packed
            .split_once(DELIMITER)
            .ok_or_else(|| StorageError::invalid_token("missing length prefix"))?;
        let len: usize = len
            .parse()
            .map_err(|_| StorageError::invalid_token(format!("non-numeric length prefix '{len}'")))?;

        let owner = rest
            .get(..len)
            .ok_or_else(|| StorageError::invalid_token("length prefix out of range"))?;
        let tail = rest[len..]
            .strip_prefix(DELIMITER)
            .ok_or_else(|| StorageError::invalid_token("owner field is not delimited"))?;

        let fields: Vec<&str> = tail.split(DELIMITER).collect();
        let [date, suffix] = fields.as_slice() else {
            return Err(StorageError::invalid_token(format!(
                "invalid format: expected {TRAILING_FIELDS} trailing fields, got {}",
                fields.len()
            )));
        };

        Ok(Self::new(owner, *date, *suffix))
    }

    /// Storage-relative location of the content: `<owner>/<date>/<suffix>.cast`.
    #[must_use]
    pub fn relative_path(&self) -> String {
        format!("{}/{}/{}.{CAST_EXTENSION}", self.owner, self.date, self.suffix)
    }

    /// The extension-less path exposed by the HTTP API: `<owner>/<date>/<suffix>`.
    #[must_use]
    pub fn public_path(&self) -> String {
        format!("{}/{}/{}", self.owner, self.date, self.suffix)
    }
}

impl fmt::Display for CastId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for CastId {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}
