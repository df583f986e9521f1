//! Error types for store operations

use thiserror::Error;

/// Errors raised by store collaborators
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store backend unavailable: {0}")]
    Unavailable(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("dispatch rejected: {0}")]
    DispatchRejected(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for coursecast_types::PipelineError {
    fn from(err: StoreError) -> Self {
        coursecast_types::PipelineError::Store(err.to_string())
    }
}
