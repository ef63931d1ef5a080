use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One row per successfully committed upload. `object_key` always matches
/// `user-assets/{user_id}/{uuid}{ext}` with an image extension.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AssetRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub object_key: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}
