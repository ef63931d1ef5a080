//! In-memory collaborator fakes shared by the pipeline and assembler tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use uuid::Uuid;

use crate::assets::keys;
use crate::assets::metadata::MetadataStore;
use crate::assets::quota::RateCounter;
use crate::models::asset::AssetRow;
use crate::scanner::{MalwareScanner, ScanVerdict};
use crate::storage::{ObjectStore, StoreError, StoredObject};

/// Minimal PNG: magic plus a few bytes, enough for the sniffer.
pub fn png_bytes() -> Bytes {
    Bytes::from_static(&[
        0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D',
        b'R',
    ])
}

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, StoredObject>>,
    bucket_missing: bool,
    delete_calls: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn with_missing_bucket() -> Self {
        Self {
            bucket_missing: true,
            ..Self::default()
        }
    }

    pub fn seed(&self, key: &str, bytes: Bytes, content_type: Option<&str>) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.map(str::to_string),
            },
        );
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn content_type_of(&self, key: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .and_then(|o| o.content_type.clone())
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StoreError> {
        if self.bucket_missing {
            return Err(StoreError::NoSuchBucket);
        }
        self.seed(key, data, Some(content_type));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<StoredObject, StoreError> {
        if self.bucket_missing {
            return Err(StoreError::NoSuchBucket);
        }
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        if self.bucket_missing {
            return Err(StoreError::NoSuchBucket);
        }
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn presign_get(&self, key: &str, _expires_in: Duration) -> Result<String, StoreError> {
        if self.bucket_missing {
            return Err(StoreError::NoSuchBucket);
        }
        Ok(format!("https://assets.test/{key}?sig=stub"))
    }
}

#[derive(Default)]
pub struct MemoryMetadataStore {
    rows: Mutex<Vec<AssetRow>>,
    fail_next_create: AtomicBool,
}

impl MemoryMetadataStore {
    pub fn rows(&self) -> Vec<AssetRow> {
        self.rows.lock().unwrap().clone()
    }

    /// Pre-populates `n` committed assets for the user.
    pub fn seed_count(&self, user_id: Uuid, n: usize) {
        let mut rows = self.rows.lock().unwrap();
        for _ in 0..n {
            rows.push(AssetRow {
                id: Uuid::new_v4(),
                user_id,
                object_key: keys::new_object_key(user_id, ".png"),
                content_type: "image/png".to_string(),
                size_bytes: 1,
                created_at: Utc::now(),
            });
        }
    }

    pub fn fail_next_create(&self) {
        self.fail_next_create.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn count_by_user(&self, user_id: Uuid) -> Result<i64> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().filter(|r| r.user_id == user_id).count() as i64)
    }

    async fn create(&self, asset: &AssetRow) -> Result<()> {
        if self.fail_next_create.swap(false, Ordering::SeqCst) {
            anyhow::bail!("injected metadata failure");
        }
        self.rows.lock().unwrap().push(asset.clone());
        Ok(())
    }

    async fn find_by_user_and_key(&self, user_id: Uuid, key: &str) -> Result<Option<AssetRow>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|r| r.user_id == user_id && r.object_key == key)
            .cloned())
    }

    async fn list_by_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<AssetRow>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|r| r.user_id == user_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<()> {
        self.rows.lock().unwrap().retain(|r| r.id != id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryRateCounter {
    counts: Mutex<HashMap<String, i64>>,
    ttls: Mutex<HashMap<String, i64>>,
    expire_calls: Mutex<HashMap<String, usize>>,
}

impl MemoryRateCounter {
    pub fn current(&self, key: &str) -> i64 {
        self.counts.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    pub fn ttl(&self, key: &str) -> Option<i64> {
        self.ttls.lock().unwrap().get(key).copied()
    }

    pub fn expire_calls(&self, key: &str) -> usize {
        self.expire_calls
            .lock()
            .unwrap()
            .get(key)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl RateCounter for MemoryRateCounter {
    async fn incr(&self, key: &str) -> Result<i64> {
        let mut counts = self.counts.lock().unwrap();
        let entry = counts.entry(key.to_string()).or_insert(0);
        *entry += 1;
        Ok(*entry)
    }

    async fn expire(&self, key: &str, seconds: i64) -> Result<bool> {
        *self
            .expire_calls
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_insert(0) += 1;
        let existed = self.counts.lock().unwrap().contains_key(key);
        if existed {
            self.ttls.lock().unwrap().insert(key.to_string(), seconds);
        }
        Ok(existed)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .counts
            .lock()
            .unwrap()
            .get(key)
            .map(|n| n.to_string()))
    }
}

enum ScannerMode {
    Verdict(ScanVerdict),
    /// Ordering guard: fails the test if the scan stage is ever reached.
    Unreachable,
}

pub struct StaticScanner {
    mode: ScannerMode,
}

impl StaticScanner {
    pub fn clean() -> Self {
        Self {
            mode: ScannerMode::Verdict(ScanVerdict::Clean),
        }
    }

    pub fn infected(signature: &str) -> Self {
        Self {
            mode: ScannerMode::Verdict(ScanVerdict::Infected(signature.to_string())),
        }
    }

    pub fn panicking() -> Self {
        Self {
            mode: ScannerMode::Unreachable,
        }
    }
}

#[async_trait]
impl MalwareScanner for StaticScanner {
    async fn scan(&self, _data: &[u8]) -> Result<ScanVerdict> {
        match &self.mode {
            ScannerMode::Verdict(v) => Ok(v.clone()),
            ScannerMode::Unreachable => panic!("scan stage reached when it should not be"),
        }
    }
}
