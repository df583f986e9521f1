//! Error types for Coursecast
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


use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the transcoding pipeline.
///
/// `InputInvalid` and `OutputVerificationFailed` are terminal for the data
/// at hand; `EnvironmentUnavailable` and `EncodeFailed` are transient in
/// principle. The retry supervisor applies one fixed policy to all of them.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("asset not found: {0}")]
    AssetNotFound(Uuid),

    #[error("invalid input: {0}")]
    InputInvalid(String),

    #[error("encoder unavailable: {0}")]
    EnvironmentUnavailable(String),

    #[error("encode failed: {diagnostics}")]
    EncodeFailed { diagnostics: String },

    #[error("output verification failed: {0}")]
    OutputVerificationFailed(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// True for failures of the processing environment rather than of the
    /// input data. Reported distinctly so operators can tell a missing
    /// ffmpeg install apart from a corrupt upload.
    pub fn is_environment(&self) -> bool {
        matches!(self, PipelineError::EnvironmentUnavailable(_))
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
