//! Capability token service
//!
//! Two grant types, deliberately asymmetric:
//! - Segment tokens are store-backed: the serialized token is its own key
//!   in the ephemeral store with a TTL equal to its validity window, so an
//!   absent token is invalid whether it expired or was evicted.
//! - Key tokens are self-contained HMAC-SHA256 grants over the asset id
//!   and expiry; they survive store evictions and restarts because the
//!   key is the one secret a player must still be able to fetch mid-playback.
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


use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use coursecast_config::TokenConfig;
use coursecast_store::{EphemeralStore, StoreError};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token has expired or been revoked")]
    Expired,

    #[error("token does not match the requested resource")]
    Mismatch,

    #[error("token store unavailable: {0}")]
    Store(#[from] StoreError),
}

/// Bound fields of a segment token. Every field is re-checked against the
/// request at validation time; none is trusted from the client alone.
#[derive(Debug, Serialize, Deserialize)]
struct SegmentClaims {
    asset_id: Uuid,
    segment: String,
    viewer_id: Uuid,
    /// Unix seconds.
    expires_at: i64,
}

pub struct TokenService {
    secret: Vec<u8>,
    segment_ttl: Duration,
    key_ttl: Duration,
    store: Arc<dyn EphemeralStore>,
}

impl TokenService {
    pub fn new(config: &TokenConfig, store: Arc<dyn EphemeralStore>) -> Self {
        Self {
            secret: config.secret.as_bytes().to_vec(),
            segment_ttl: Duration::from_secs(config.segment_ttl_secs),
            key_ttl: Duration::from_secs(config.key_ttl_secs),
            store,
        }
    }

    /// Mint a segment token bound to {asset, segment, viewer} and register
    /// it in the ephemeral store under itself.
    pub async fn issue_segment_token(
        &self,
        asset_id: Uuid,
        segment: &str,
        viewer_id: Uuid,
    ) -> Result<String, TokenError> {
        let claims = SegmentClaims {
            asset_id,
            segment: segment.to_string(),
            viewer_id,
            expires_at: Utc::now().timestamp() + self.segment_ttl.as_secs() as i64,
        };
        let serialized = serde_json::to_string(&claims)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;
        let token = URL_SAFE_NO_PAD.encode(serialized);

        self.store.put(&token, "1", self.segment_ttl).await?;
        Ok(token)
    }

    /// Validate a segment token against the current request. All four
    /// bindings must hold and the token must still be present in the store.
    pub async fn validate_segment_token(
        &self,
        token: &str,
        asset_id: Uuid,
        segment: &str,
        viewer_id: Uuid,
    ) -> Result<(), TokenError> {
        let raw = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| TokenError::Malformed)?;
        let claims: SegmentClaims =
            serde_json::from_slice(&raw).map_err(|_| TokenError::Malformed)?;

        if !self.store.has(token).await? {
            return Err(TokenError::Expired);
        }
        if claims.asset_id != asset_id
            || claims.segment != segment
            || claims.viewer_id != viewer_id
        {
            return Err(TokenError::Mismatch);
        }
        if claims.expires_at <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(())
    }

    /// Mint a self-contained key token: `<expiry>.<hex signature>` where
    /// the signature is HMAC-SHA256 over `<asset id>.<expiry>`.
    pub fn issue_key_token(&self, asset_id: Uuid) -> String {
        let expires_at = Utc::now().timestamp() + self.key_ttl.as_secs() as i64;
        let signature = self.key_signature(asset_id, expires_at);
        format!("{}.{}", expires_at, hex::encode(signature))
    }

    /// Validate a key token against an asset. The signature comparison is
    /// constant time via the mac's own verifier.
    pub fn validate_key_token(&self, token: &str, asset_id: Uuid) -> Result<(), TokenError> {
        let (expiry, signature) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let expires_at: i64 = expiry.parse().map_err(|_| TokenError::Malformed)?;
        let signature = hex::decode(signature).map_err(|_| TokenError::Malformed)?;

        let mut mac = self.keyed_mac();
        mac.update(key_payload(asset_id, expires_at).as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::Mismatch)?;

        if expires_at <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(())
    }

    fn key_signature(&self, asset_id: Uuid, expires_at: i64) -> Vec<u8> {
        let mut mac = self.keyed_mac();
        mac.update(key_payload(asset_id, expires_at).as_bytes());
        mac.finalize().into_bytes().to_vec()
    }

    fn keyed_mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length.
        HmacSha256::new_from_slice(&self.secret).expect("HMAC key of any length is valid")
    }
}

fn key_payload(asset_id: Uuid, expires_at: i64) -> String {
    format!("{}.{}", asset_id, expires_at)
}
