//! Traits for store collaborators

use async_trait::async_trait;
use coursecast_types::{TranscodeRequest, VideoAsset};
use std::time::Duration;
use uuid::Uuid;

use crate::error::StoreResult;

/// Persistence of the video-related fields of a lesson. The surrounding
/// business entity lives in the relational layer outside the core.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Load an asset by id. `Ok(None)` when the id is unknown.
    async fn load(&self, id: Uuid) -> StoreResult<Option<VideoAsset>>;

    /// Persist the asset's current video fields (status, path, duration,
    /// size).
    async fn update(&self, asset: &VideoAsset) -> StoreResult<()>;

    /// Remove the asset record entirely.
    async fn delete(&self, id: Uuid) -> StoreResult<()>;
}

/// Shared ephemeral key/value store with per-key TTL. Backs transcoding
/// start timestamps and the segment-token side table; any fixed-TTL store
/// suffices.
#[async_trait]
pub trait EphemeralStore: Send + Sync {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// `Ok(None)` for unknown or expired keys.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    async fn has(&self, key: &str) -> StoreResult<bool>;
}

/// Background dispatch lane for transcoding jobs. De-duplicating concurrent
/// dispatches for the same asset is the caller's responsibility.
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    async fn dispatch(&self, request: TranscodeRequest) -> StoreResult<()>;
}
