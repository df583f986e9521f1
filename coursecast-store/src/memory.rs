//! In-memory store implementations
// Copyright 2025 Francisco F. Pinochet
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use async_trait::async_trait;
use coursecast_types::VideoAsset;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::traits::{AssetStore, EphemeralStore};

/// In-process asset store backed by a `RwLock<HashMap>`. Used by the
/// monolith binary and tests; a relational implementation replaces it in
/// deployments with a real database.
#[derive(Default)]
pub struct MemoryAssetStore {
    inner: RwLock<HashMap<Uuid, VideoAsset>>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an asset, e.g. from an upload handler or a test fixture.
    pub async fn insert(&self, asset: VideoAsset) {
        self.inner.write().await.insert(asset.id, asset);
    }
}

#[async_trait]
impl AssetStore for MemoryAssetStore {
    async fn load(&self, id: Uuid) -> StoreResult<Option<VideoAsset>> {
        Ok(self.inner.read().await.get(&id).cloned())
    }

    async fn update(&self, asset: &VideoAsset) -> StoreResult<()> {
        self.inner.write().await.insert(asset.id, asset.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        self.inner.write().await.remove(&id);
        Ok(())
    }
}

/// In-process TTL key/value store. Expiry is checked on read; expired
/// entries are pruned lazily on write so the map does not grow unbounded.
#[derive(Default)]
pub struct MemoryEphemeralStore {
    inner: RwLock<HashMap<String, (String, Instant)>>,
}

impl MemoryEphemeralStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop a key immediately, regardless of its TTL. Models backend
    /// eviction/restart in tests.
    pub async fn evict(&self, key: &str) {
        self.inner.write().await.remove(key);
    }

    fn is_live(entry: &(String, Instant)) -> bool {
        entry.1 > Instant::now()
    }
}

#[async_trait]
impl EphemeralStore for MemoryEphemeralStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let mut map = self.inner.write().await;
        map.retain(|_, entry| Self::is_live(entry));
        map.insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let map = self.inner.read().await;
        Ok(map
            .get(key)
            .filter(|entry| Self::is_live(entry))
            .map(|entry| entry.0.clone()))
    }

    async fn has(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursecast_types::{Audience, VideoStatus};

    #[tokio::test]
    async fn asset_store_round_trip() {
        let store = MemoryAssetStore::new();
        let id = Uuid::new_v4();
        let asset = VideoAsset::new(id, "Lesson 1", "/tmp/out", Audience::Everyone, true);
        store.insert(asset).await;

        let mut loaded = store.load(id).await.unwrap().expect("asset present");
        assert_eq!(loaded.status, VideoStatus::Unset);

        loaded.status = VideoStatus::Processing;
        store.update(&loaded).await.unwrap();
        let reloaded = store.load(id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, VideoStatus::Processing);

        store.delete(id).await.unwrap();
        assert!(store.load(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ephemeral_store_expires_keys() {
        let store = MemoryEphemeralStore::new();
        store
            .put("short", "v", Duration::from_millis(20))
            .await
            .unwrap();
        store.put("long", "v", Duration::from_secs(60)).await.unwrap();

        assert!(store.has("short").await.unwrap());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!store.has("short").await.unwrap());
        assert!(store.has("long").await.unwrap());
    }

    #[tokio::test]
    async fn ephemeral_store_evict_is_immediate() {
        let store = MemoryEphemeralStore::new();
        store.put("k", "v", Duration::from_secs(60)).await.unwrap();
        store.evict("k").await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}
