#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Minimal resume projection for the print-data path. Resume CRUD lives in
/// another service; this API only reads `content` to assemble render input.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeRow {
    pub id: Uuid,
    pub user_id: Uuid,
    /// `{layout_settings, items[]}` as stored by the editor.
    pub content: Value,
    pub updated_at: DateTime<Utc>,
}
