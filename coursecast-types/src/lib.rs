//! Coursecast Types
//!
//! Shared type definitions for video assets, viewers, status payloads and
//! error types used across all Coursecast services.

pub mod asset;
pub mod error;
pub mod schemas;

pub use asset::*;
pub use error::*;
pub use schemas::*;
