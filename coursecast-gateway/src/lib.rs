//! Coursecast Delivery Gateway
//!
//! The playback-facing HTTP surface:
//! - Per-viewer manifest rewriting with freshly minted capability tokens
//! - Token-gated segment and key delivery
//! - Progress/status polling and the transcode/delete control operations
//! - Capability token service (store-backed segment tokens, HMAC-signed
//!   key tokens)
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


pub mod auth;
pub mod error;
pub mod rewrite;
pub mod routes;
pub mod state;
pub mod tokens;

pub use error::GatewayError;
pub use routes::gateway_router;
pub use state::GatewayState;
pub use tokens::{TokenError, TokenService};
