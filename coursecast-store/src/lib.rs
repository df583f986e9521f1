//! Coursecast collaborator stores
//!
//! Trait seams for the persistence collaborators the core consumes:
//! - `AssetStore`: load/update/delete of the video fields of a lesson
//! - `EphemeralStore`: TTL key/value store (start timestamps, segment tokens)
//! - `JobDispatcher`: background dispatch lane for transcoding jobs
//!
//! The `memory` module holds in-process implementations used by the
//! monolith binary and by tests. Relational/Redis-backed implementations
//! live with the deployment, not here.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::{MemoryAssetStore, MemoryEphemeralStore};
pub use traits::{AssetStore, EphemeralStore, JobDispatcher};
