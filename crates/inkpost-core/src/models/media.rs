use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row of the `media` table. `file_path` is relative to the media root and
/// every row owns exactly one file on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Media {
    pub id: i64,
    pub file_name: String,
    pub file_path: String,
    #[serde(skip_serializing)]
    pub file_hash: String,
    pub mime_type: String,
    pub size: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Media record plus its public URL
#[derive(Debug, Clone, Serialize)]
pub struct MediaResponse {
    #[serde(flatten)]
    pub media: Media,
    pub url: String,
}

/// Values for a new media row
#[derive(Debug, Clone)]
pub struct NewMedia {
    pub file_name: String,
    pub file_path: String,
    pub file_hash: String,
    pub mime_type: String,
    pub size: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListMediaQuery {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Offset-paginated listing (media library)
#[derive(Debug, Clone, Serialize)]
pub struct OffsetPage<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}
