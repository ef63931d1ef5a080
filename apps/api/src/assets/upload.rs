use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::assets::keys;
use crate::assets::metadata::MetadataStore;
use crate::assets::quota::QuotaGuard;
use crate::config::Config;
use crate::errors::AppError;
use crate::models::asset::AssetRow;
use crate::scanner::{MalwareScanner, ScanVerdict};
use crate::storage::ObjectStore;

/// Bytes examined for content-type sniffing. The declared header is never
/// consulted.
const SNIFF_LEN: usize = 512;

/// Limits and the sniffed-type whitelist, injected at construction rather
/// than read from globals.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub max_asset_count: i64,
    pub max_daily_uploads: i64,
    pub max_upload_bytes: usize,
    pub allowed_types: Vec<String>,
}

impl UploadPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_asset_count: config.max_asset_count,
            max_daily_uploads: config.max_daily_uploads,
            max_upload_bytes: config.max_upload_bytes,
            allowed_types: vec![
                "image/png".to_string(),
                "image/jpeg".to_string(),
                "image/webp".to_string(),
            ],
        }
    }
}

/// Canonical extension for a sniffed type. Anything else in the whitelist
/// falls back to `.png`.
fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => ".jpg",
        "image/webp" => ".webp",
        _ => ".png",
    }
}

#[derive(Debug)]
pub struct UploadOutcome {
    pub object_key: String,
}

/// Orchestrates one upload: quota check, rate check, size check, malware
/// scan, content sniff, object-store write, metadata insert. Any failure
/// after the store write exits through a compensating delete of the object.
pub struct UploadPipeline {
    store: Arc<dyn ObjectStore>,
    scanner: Arc<dyn MalwareScanner>,
    metadata: Arc<dyn MetadataStore>,
    quota: QuotaGuard,
    policy: UploadPolicy,
}

impl UploadPipeline {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        scanner: Arc<dyn MalwareScanner>,
        metadata: Arc<dyn MetadataStore>,
        quota: QuotaGuard,
        policy: UploadPolicy,
    ) -> Self {
        Self {
            store,
            scanner,
            metadata,
            quota,
            policy,
        }
    }

    pub async fn run(&self, user_id: Uuid, data: Bytes) -> Result<UploadOutcome, AppError> {
        // Cheap checks first; nothing is written before the scan passes.
        let count = self
            .quota
            .check_asset_count(user_id)
            .await
            .map_err(AppError::Internal)?;
        if count >= self.policy.max_asset_count {
            return Err(AppError::QuotaExceeded(format!(
                "Asset limit of {} reached; delete unused assets to upload more",
                self.policy.max_asset_count
            )));
        }

        // The increment is consumed even when this attempt is rejected.
        let daily = self
            .quota
            .increment_daily_upload(user_id, Utc::now().date_naive())
            .await
            .map_err(AppError::Internal)?;
        if daily > self.policy.max_daily_uploads {
            return Err(AppError::RateLimited(format!(
                "Daily upload limit of {} reached; try again tomorrow",
                self.policy.max_daily_uploads
            )));
        }

        if data.len() > self.policy.max_upload_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "File exceeds the maximum upload size of {} bytes",
                self.policy.max_upload_bytes
            )));
        }

        match self.scanner.scan(&data).await.map_err(AppError::Internal)? {
            ScanVerdict::Clean => {}
            ScanVerdict::Infected(signature) => {
                return Err(AppError::MaliciousContent(signature));
            }
        }

        // Sniff from content, never from the client-declared header.
        let head = &data[..data.len().min(SNIFF_LEN)];
        let sniffed = infer::get(head)
            .map(|t| t.mime_type())
            .unwrap_or("application/octet-stream");
        if !self.policy.allowed_types.iter().any(|t| t == sniffed) {
            return Err(AppError::UnsupportedMediaType(format!(
                "Content type '{sniffed}' is not an accepted image format"
            )));
        }

        let object_key = keys::new_object_key(user_id, extension_for(sniffed));
        let size_bytes = data.len() as i64;
        self.store
            .put(&object_key, data, sniffed)
            .await
            .map_err(|e| AppError::Storage(format!("upload write for {object_key} failed: {e}")))?;

        // The object now exists; every failure below must compensate.
        let asset = AssetRow {
            id: Uuid::new_v4(),
            user_id,
            object_key: object_key.clone(),
            content_type: sniffed.to_string(),
            size_bytes,
            created_at: Utc::now(),
        };
        if let Err(e) = self.metadata.create(&asset).await {
            self.rollback_stored_object(&object_key).await;
            return Err(AppError::Internal(
                e.context("asset metadata insert failed"),
            ));
        }

        info!(
            "Committed asset {} ({sniffed}, {size_bytes} bytes) as {object_key}",
            asset.id
        );
        Ok(UploadOutcome { object_key })
    }

    /// Best-effort compensating delete. A failed delete leaves an orphaned
    /// object with no metadata row; logged, never surfaced to the caller.
    async fn rollback_stored_object(&self, object_key: &str) {
        match self.store.delete(object_key).await {
            Ok(()) => info!("Rolled back stored object {object_key} after metadata failure"),
            Err(e) => warn!("Rollback delete of {object_key} failed, object orphaned: {e}"),
        }
    }
}
