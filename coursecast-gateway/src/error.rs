//! Gateway error type and its HTTP mapping
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


use axum::http::StatusCode;
use axum::response::IntoResponse;
use coursecast_store::StoreError;
use coursecast_types::PipelineError;
use thiserror::Error;
use uuid::Uuid;

use crate::tokens::TokenError;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("video not found: {0}")]
    NotFound(Uuid),

    #[error("video not ready: {0}")]
    NotReady(Uuid),

    #[error("missing or invalid viewer identity: {0}")]
    Unauthenticated(String),

    #[error("authorization denied: {0}")]
    Forbidden(String),

    #[error("invalid capability token: {0}")]
    Token(#[from] TokenError),

    #[error("transcoding already in progress: {0}")]
    AlreadyProcessing(Uuid),

    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Pipeline(PipelineError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PipelineError> for GatewayError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::AssetNotFound(id) => GatewayError::NotFound(id),
            other => GatewayError::Pipeline(other),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            GatewayError::NotFound(_) | GatewayError::NotReady(_) => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            GatewayError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            GatewayError::Forbidden(_) | GatewayError::Token(_) => {
                (StatusCode::FORBIDDEN, self.to_string())
            }
            GatewayError::AlreadyProcessing(_) => (StatusCode::CONFLICT, self.to_string()),
            GatewayError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            // Backend details stay out of the response body.
            GatewayError::Store(_) | GatewayError::Pipeline(_) | GatewayError::Io(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
            }
        };

        tracing::warn!(status = %status, error = %self, "Gateway request rejected");

        (status, message).into_response()
    }
}
