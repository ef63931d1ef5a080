use base64::{engine::general_purpose, Engine as _};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::assets::keys;
use crate::errors::AppError;
use crate::storage::{ObjectStore, StoreError};

pub const WARNING_MISSING_IMAGES: &str = "MISSING_IMAGES";

const DEFAULT_IMAGE_TYPE: &str = "image/png";

/// Emitted when at least one item was dropped during assembly.
/// `missing_keys` lists each concrete missing object key once; items dropped
/// for empty or malformed content contribute no key.
#[derive(Debug, Clone, Serialize)]
pub struct PrintWarning {
    pub code: String,
    pub message: String,
    #[serde(rename = "missingKeys")]
    pub missing_keys: Vec<String>,
}

/// Render-ready resume content: image object keys replaced by inline data
/// URIs, unresolvable image items removed.
#[derive(Debug, Serialize)]
pub struct AssembledDocument {
    pub layout_settings: Value,
    pub items: Vec<Value>,
    pub warnings: Vec<PrintWarning>,
}

/// Walks the resume's items and resolves each image item's object key into
/// inline base64 data, strictly sequentially.
///
/// A missing object degrades the document (drop the item, warn); a missing
/// bucket or any other store fault aborts the whole assembly. One
/// unavailable image must never block the user's PDF, but an infrastructure
/// misconfiguration must not be masked as "some missing images".
pub async fn assemble_print_content(
    content: &Value,
    owner_id: Uuid,
    store: &dyn ObjectStore,
) -> Result<AssembledDocument, AppError> {
    let layout_settings = content.get("layout_settings").cloned().unwrap_or(Value::Null);
    let raw_items = content
        .get("items")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut items = Vec::with_capacity(raw_items.len());
    let mut missing_keys: Vec<String> = Vec::new();
    let mut dropped = 0usize;

    for mut item in raw_items {
        let is_image = item
            .get("type")
            .and_then(Value::as_str)
            .is_some_and(|t| t == "image");

        if !is_image {
            normalize_content(&mut item);
            items.push(item);
            continue;
        }

        let key = match item.get("content").and_then(Value::as_str) {
            Some(k) if !k.is_empty() => k.to_string(),
            _ => {
                dropped += 1;
                debug!("Dropping image item with empty or non-string content");
                continue;
            }
        };

        if !keys::owns_object_key(owner_id, &key) {
            dropped += 1;
            warn!("Dropping image item with invalid object key format");
            continue;
        }

        match store.get(&key).await {
            Ok(object) => {
                let content_type = object
                    .content_type
                    .filter(|ct| !ct.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_IMAGE_TYPE.to_string());
                let encoded = general_purpose::STANDARD.encode(&object.bytes);
                set_content(
                    &mut item,
                    format!("data:{content_type};base64,{encoded}"),
                );
                items.push(item);
            }
            Err(StoreError::NotFound) => {
                dropped += 1;
                debug!("Dropping image item: object {key} not found");
                if !missing_keys.contains(&key) {
                    missing_keys.push(key);
                }
            }
            Err(StoreError::NoSuchBucket) => {
                return Err(AppError::Storage(format!(
                    "asset bucket missing while fetching {key} for print assembly"
                )));
            }
            Err(StoreError::Other(e)) => {
                return Err(AppError::Internal(
                    e.context(format!("image fetch for {key} failed during print assembly")),
                ));
            }
        }
    }

    let mut warnings = Vec::new();
    if dropped > 0 {
        warn!(
            "Print assembly dropped {dropped} item(s) for user {owner_id}, {} missing key(s)",
            missing_keys.len()
        );
        warnings.push(PrintWarning {
            code: WARNING_MISSING_IMAGES.to_string(),
            message: "Some images could not be loaded and were left out of the document"
                .to_string(),
            missing_keys,
        });
    }

    Ok(AssembledDocument {
        layout_settings,
        items,
        warnings,
    })
}

/// Non-image items pass through with `content` coerced to a string:
/// missing/null becomes empty, other JSON values keep their rendering.
fn normalize_content(item: &mut Value) {
    let normalized = match item.get("content") {
        Some(Value::String(s)) => s.clone(),
        None | Some(Value::Null) => String::new(),
        Some(other) => other.to_string(),
    };
    set_content(item, normalized);
}

fn set_content(item: &mut Value, content: String) {
    if let Some(obj) = item.as_object_mut() {
        obj.insert("content".to_string(), Value::String(content));
    }
}
