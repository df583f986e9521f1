//! Shared gateway state
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


use coursecast_pipeline::TranscodeJob;
use coursecast_store::{AssetStore, EphemeralStore, JobDispatcher};
use std::sync::Arc;

use crate::tokens::TokenService;

/// Everything the request handlers need, injected at startup.
pub struct GatewayState {
    pub assets: Arc<dyn AssetStore>,
    pub cache: Arc<dyn EphemeralStore>,
    pub dispatcher: Arc<dyn JobDispatcher>,
    /// Owned for the explicit delete path; transcodes themselves go
    /// through the dispatcher.
    pub job: Arc<TranscodeJob>,
    pub tokens: TokenService,
    pub segment_seconds: u32,
}
