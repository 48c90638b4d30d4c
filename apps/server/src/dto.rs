//! Request and response bodies of the HTTP API (camelCase on the wire).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelf_storage::{CastHeader, CastSummary, StoredCast};
use utoipa::ToSchema;

pub(crate) const SYSTEM_TAG: &str = "system";
pub(crate) const CASTS_TAG: &str = "casts";
pub(crate) const USERS_TAG: &str = "users";

/// Liveness check body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Seconds since start.
    pub uptime: u64,
}

/// Multipart form of an upload, as sent by `asciinema upload`.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    /// The `.cast` file.
    #[schema(value_type = String, format = Binary)]
    pub asciicast: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub username: String,
    /// `<owner>/<YYYYMMDD>/<suffix>`.
    pub rel_path: String,
    pub size_bytes: u64,
    pub token: String,
    /// Player URL for the new cast.
    pub url: String,
}

impl UploadResponse {
    pub(crate) fn new(stored: StoredCast, url: String) -> Self {
        Self {
            username: stored.id.owner,
            rel_path: stored.rel_path,
            size_bytes: stored.size,
            token: stored.token,
            url,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserCredentialResponse {
    pub username: String,
    /// Upload secret for `asciinema` (`install-id`).
    pub machine_id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserListResponse {
    pub items: Vec<String>,
    pub total: usize,
}

/// Header fields of a recording.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CastMetadata {
    pub version: u32,
    pub width: u32,
    pub height: u32,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Seconds; backfilled from the last event when the header lacks it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl From<CastHeader> for CastMetadata {
    fn from(header: CastHeader) -> Self {
        Self {
            version: header.version,
            width: header.width,
            height: header.height,
            timestamp: header.timestamp,
            title: header.title,
            duration: header.duration,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CastItem {
    pub rel_path: String,
    pub token: String,
    pub size_bytes: u64,
    pub mtime: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CastMetadata>,
}

impl From<CastSummary> for CastItem {
    fn from(summary: CastSummary) -> Self {
        Self {
            rel_path: summary.rel_path,
            token: summary.token,
            size_bytes: summary.size,
            mtime: summary.modified,
            metadata: summary.header.map(CastMetadata::from),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CastListResponse {
    pub items: Vec<CastItem>,
    pub total: usize,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CastFileQuery {
    /// Storage-relative path as returned in `relPath`, or a cast token.
    pub path: String,
}
