//! Wire payload schemas
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


use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::asset::VideoStatus;

// ============================================================================
// Delivery payloads
// ============================================================================

/// Body of `GET /videos/{lesson}/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub lesson_id: Uuid,
    pub status: VideoStatus,
    /// 0–100 heuristic, never decreasing for a single run.
    pub progress: u8,
    /// True once the canonical manifest is servable.
    pub available: bool,
    pub message: String,
    /// Human-readable remaining-time estimate, absent while still
    /// "estimating".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlist_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_url: Option<String>,
}

/// Dispatch request handed to the background lane. The caller guarantees
/// at most one in-flight job per asset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TranscodeRequest {
    pub asset_id: Uuid,
}
