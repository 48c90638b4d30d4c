//! Header parsing and duration backfill for asciicast files.
//!
//! The first line of a cast is a JSON object describing the recording; every following line
//! is an event `[timestamp_seconds, event_type, data]`. Files are read line by line and never
//! loaded into memory as a whole.

use crate::error::StorageError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::debug;

/// Structured metadata from the first line of a cast.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CastHeader {
    #[serde(default, deserialize_with = "coerce::integral")]
    pub version: u32,
    #[serde(default, deserialize_with = "coerce::integral")]
    pub width: u32,
    #[serde(default, deserialize_with = "coerce::integral")]
    pub height: u32,
    #[serde(default, deserialize_with = "coerce::integral")]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "coerce::seconds")]
    pub duration: Option<f64>,
}

impl CastHeader {
    /// Parses a single header line (trailing newline allowed).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Parse`] if the line is blank or not a JSON object matching the
    /// header schema.
    pub fn parse_line(line: &[u8]) -> Result<Self, StorageError> {
        let line = line.trim_ascii();
        if line.is_empty() {
            return Err(StorageError::parse("header line is empty"));
        }
        if line.first() != Some(&b'{') {
            return Err(StorageError::parse("header line is not a JSON object"));
        }
        serde_json::from_slice(line).map_err(|e| StorageError::parse(e.to_string()))
    }

    /// `true` when a positive duration is already known, so no scan is needed.
    #[must_use]
    pub fn has_duration(&self) -> bool {
        self.duration.is_some_and(|d| d > 0.0)
    }
}

/// Reads only the first line of the file at `path` and parses it as a [`CastHeader`].
///
/// # Errors
///
/// Returns [`StorageError::NotFound`] if the file is missing, [`StorageError::Parse`] if it is
/// empty or the first line is malformed, [`StorageError::Io`] on read failures.
pub async fn extract_header(path: &Path) -> Result<CastHeader, StorageError> {
    let file = fs::File::open(path).await.map_err(|e| StorageError::from_io(e, path))?;
    let mut reader = BufReader::new(file);

    let mut line = Vec::new();
    let read = reader
        .read_until(b'\n', &mut line)
        .await
        .map_err(|e| StorageError::from_io(e, path))?;
    if read == 0 {
        return Err(StorageError::Parse {
            message: path.display().to_string().into(),
            context: Some("Cast file is empty".into()),
        });
    }

    CastHeader::parse_line(&line)
}

/// Returns `header` with its duration populated from the last event timestamp.
///
/// A header that already carries a positive duration is returned unchanged without opening
/// the file. Otherwise the file is scanned once: the header line is skipped, every other line
/// is parsed as a generic JSON value and the largest numeric first array element wins.
/// Malformed, blank or short lines are ignored. With no events the duration is `0.0`.
///
/// # Errors
///
/// Returns [`StorageError::NotFound`] or [`StorageError::Io`] if the file cannot be read.
pub async fn compute_duration(path: &Path, header: &CastHeader) -> Result<CastHeader, StorageError> {
    if header.has_duration() {
        return Ok(header.clone());
    }

    let file = fs::File::open(path).await.map_err(|e| StorageError::from_io(e, path))?;
    let duration = scan_last_timestamp(BufReader::new(file))
        .await
        .map_err(|e| StorageError::from_io(e, path))?;

    debug!(path = %path.display(), duration, "Backfilled cast duration");
    Ok(CastHeader { duration: Some(duration), ..header.clone() })
}

/// Header plus duration backfill in one call.
///
/// # Errors
///
/// See [`extract_header`] and [`compute_duration`].
pub async fn inspect(path: &Path) -> Result<CastHeader, StorageError> {
    let header = extract_header(path).await?;
    compute_duration(path, &header).await
}

async fn scan_last_timestamp<R>(mut reader: R) -> std::io::Result<f64>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();

    // header
    if reader.read_until(b'\n', &mut line).await? == 0 {
        return Ok(0.0);
    }

    let mut last = 0.0_f64;
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        if let Some(ts) = event_timestamp(&line) {
            last = last.max(ts);
        }
    }

    Ok(last)
}

fn event_timestamp(line: &[u8]) -> Option<f64> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return None;
    }
    let value: serde_json::Value = serde_json::from_slice(line).ok()?;
    value.as_array()?.first()?.as_f64().filter(|ts| ts.is_finite())
}

/// Numeric coercion applied once at the deserialization boundary.
///
/// Header numbers may arrive as floats (`80.0`); integral fields truncate toward zero.
mod coerce {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};

    #[allow(clippy::cast_possible_truncation)]
    pub(super) fn integral<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<i64>,
    {
        let value = f64::deserialize(deserializer)?;
        if !value.is_finite() || value.abs() >= 9.0e18 {
            return Err(D::Error::custom(format!("number {value} is out of range")));
        }
        T::try_from(value.trunc() as i64)
            .map_err(|_| D::Error::custom(format!("number {value} is out of range")))
    }

    pub(super) fn seconds<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<f64>::deserialize(deserializer)?.filter(|d| d.is_finite()))
    }
}
