use std::time::Duration;

use axum::{
    extract::{multipart::MultipartError, Multipart, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::assets::keys;
use crate::assets::metadata::MetadataStore;
use crate::errors::AppError;
use crate::state::AppState;
use crate::storage::ObjectStore;

const DEFAULT_LIST_LIMIT: i64 = 60;
const MAX_LIST_LIMIT: i64 = 200;
const PREVIEW_URL_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub user_id: Uuid,
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct KeyQuery {
    pub user_id: Uuid,
    pub key: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub object_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetListItem {
    pub object_key: String,
    pub preview_url: String,
    pub size: i64,
    pub last_modified: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetListResponse {
    pub items: Vec<AssetListItem>,
    pub stats: AssetStats,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetStats {
    pub count: i64,
    pub max_asset_count: i64,
}

/// POST /api/v1/assets/upload (multipart field `file`)
pub async fn handle_upload(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let mut file = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some("file") {
            file = Some(field.bytes().await.map_err(multipart_error)?);
            break;
        }
    }

    let data = file.ok_or_else(|| AppError::Validation("Missing multipart field 'file'".into()))?;
    let outcome = state.uploads.run(params.user_id, data).await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            object_key: outcome.object_key,
        }),
    ))
}

/// GET /api/v1/assets
pub async fn handle_list(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<AssetListResponse>, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    let assets = state
        .metadata
        .list_by_user(params.user_id, limit)
        .await
        .map_err(AppError::Internal)?;
    let count = state
        .metadata
        .count_by_user(params.user_id)
        .await
        .map_err(AppError::Internal)?;

    let mut items = Vec::with_capacity(assets.len());
    for asset in assets {
        let preview_url = state
            .store
            .presign_get(&asset.object_key, PREVIEW_URL_TTL)
            .await
            .map_err(|e| AppError::Storage(format!("presign for {} failed: {e}", asset.object_key)))?;
        items.push(AssetListItem {
            object_key: asset.object_key,
            preview_url,
            size: asset.size_bytes,
            last_modified: asset.created_at,
        });
    }

    Ok(Json(AssetListResponse {
        items,
        stats: AssetStats {
            count,
            max_asset_count: state.config.max_asset_count,
        },
    }))
}

/// GET /api/v1/assets/view
///
/// Unknown keys and foreign keys get the same uniform denial so a probe
/// cannot learn whether another tenant's object exists.
pub async fn handle_view(
    State(state): State<AppState>,
    Query(params): Query<KeyQuery>,
) -> Result<Json<Value>, AppError> {
    let key = require_key(params.key)?;
    if !keys::owns_object_key(params.user_id, &key) {
        return Err(AppError::Forbidden);
    }

    let owned = state
        .metadata
        .find_by_user_and_key(params.user_id, &key)
        .await
        .map_err(AppError::Internal)?;
    if owned.is_none() {
        return Err(AppError::Forbidden);
    }

    let url = state
        .store
        .presign_get(&key, PREVIEW_URL_TTL)
        .await
        .map_err(|e| AppError::Storage(format!("presign for {key} failed: {e}")))?;

    Ok(Json(json!({ "url": url })))
}

/// DELETE /api/v1/assets
///
/// Idempotent against the object store: deleting a key with no stored
/// object succeeds.
pub async fn handle_delete(
    State(state): State<AppState>,
    Query(params): Query<KeyQuery>,
) -> Result<Json<Value>, AppError> {
    let key = require_key(params.key)?;
    if !keys::owns_object_key(params.user_id, &key) {
        return Err(AppError::Forbidden);
    }

    state
        .store
        .delete(&key)
        .await
        .map_err(|e| AppError::Storage(format!("delete of {key} failed: {e}")))?;

    if let Some(asset) = state
        .metadata
        .find_by_user_and_key(params.user_id, &key)
        .await
        .map_err(AppError::Internal)?
    {
        state
            .metadata
            .delete_by_id(asset.id)
            .await
            .map_err(AppError::Internal)?;
    }

    Ok(Json(json!({ "deleted": true })))
}

fn require_key(key: Option<String>) -> Result<String, AppError> {
    key.filter(|k| !k.is_empty())
        .ok_or_else(|| AppError::Validation("Missing query parameter 'key'".into()))
}

/// A body over the route's size limit surfaces as a multipart read failure
/// carrying a 413 status; keep that contract instead of reporting a
/// malformed request.
fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("File exceeds the maximum upload size".to_string())
    } else {
        AppError::Validation(format!("Invalid multipart request: {e}"))
    }
}
