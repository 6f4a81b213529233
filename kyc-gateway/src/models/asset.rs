use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Content-addressed ingested media row. `safe_filename` is the
/// content-hash-derived on-disk name, distinct from the caller-supplied
/// `original_filename`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ImageAsset {
    pub id: Uuid,
    pub org_id: Uuid,
    pub safe_filename: String,
    pub original_filename: Option<String>,
    pub content_hash: String,
    pub byte_size: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VideoAsset {
    pub id: Uuid,
    pub org_id: Uuid,
    pub safe_filename: String,
    pub original_filename: Option<String>,
    pub content_hash: String,
    pub byte_size: i64,
    pub created_at: DateTime<Utc>,
}

/// Maps a vendor-returned face-search picture path to an internal asset
/// id, so responses never leak vendor-internal paths.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FaceImageRef {
    pub id: Uuid,
    pub org_id: Uuid,
    pub vendor_picture_path: String,
    pub internal_asset_id: Uuid,
    pub created_at: DateTime<Utc>,
}
