//! Viewer identity and asset authorization
//!
//! Authentication itself happens upstream; the gateway trusts the viewer
//! headers the auth layer injects and only decides whether that viewer may
//! watch this asset.
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


use axum::http::HeaderMap;
use coursecast_types::{Audience, VideoAsset, Viewer};
use uuid::Uuid;

use crate::error::GatewayError;

pub const VIEWER_ID_HEADER: &str = "x-viewer-id";
pub const VIEWER_AUDIENCE_HEADER: &str = "x-viewer-audience";
pub const VIEWER_SUBSCRIBED_HEADER: &str = "x-viewer-subscribed";

/// Build the viewer from the headers the upstream auth layer sets.
pub fn viewer_from_headers(headers: &HeaderMap) -> Result<Viewer, GatewayError> {
    let id = header_value(headers, VIEWER_ID_HEADER)?;
    let id = Uuid::parse_str(id)
        .map_err(|_| GatewayError::Unauthenticated(format!("bad {}", VIEWER_ID_HEADER)))?;

    let audience = match header_value(headers, VIEWER_AUDIENCE_HEADER)? {
        "everyone" => Audience::Everyone,
        "men" => Audience::Men,
        "women" => Audience::Women,
        _ => {
            return Err(GatewayError::Unauthenticated(format!(
                "bad {}",
                VIEWER_AUDIENCE_HEADER
            )))
        }
    };

    let subscribed = matches!(
        headers
            .get(VIEWER_SUBSCRIBED_HEADER)
            .and_then(|v| v.to_str().ok()),
        Some("true") | Some("1")
    );

    Ok(Viewer {
        id,
        audience,
        subscribed,
    })
}

/// Whether this viewer may watch this asset: the asset's target audience
/// must admit the viewer, and non-free lessons need a subscription.
pub fn authorize(viewer: &Viewer, asset: &VideoAsset) -> Result<(), GatewayError> {
    if !asset.audience.admits(viewer.audience) {
        return Err(GatewayError::Forbidden(
            "viewer is outside the target audience".to_string(),
        ));
    }
    if !asset.free && !viewer.subscribed {
        return Err(GatewayError::Forbidden(
            "subscription required".to_string(),
        ));
    }
    Ok(())
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, GatewayError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| GatewayError::Unauthenticated(format!("missing {}", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn asset(audience: Audience, free: bool) -> VideoAsset {
        VideoAsset::new(Uuid::new_v4(), "Lesson", "/var/media/x", audience, free)
    }

    fn viewer(audience: Audience, subscribed: bool) -> Viewer {
        Viewer {
            id: Uuid::new_v4(),
            audience,
            subscribed,
        }
    }

    #[test]
    fn audience_gating() {
        assert!(authorize(&viewer(Audience::Men, true), &asset(Audience::Everyone, false)).is_ok());
        assert!(authorize(&viewer(Audience::Men, true), &asset(Audience::Men, false)).is_ok());
        assert!(matches!(
            authorize(&viewer(Audience::Men, true), &asset(Audience::Women, false)),
            Err(GatewayError::Forbidden(_))
        ));
    }

    #[test]
    fn subscription_gating() {
        // Free lessons need no subscription.
        assert!(authorize(&viewer(Audience::Everyone, false), &asset(Audience::Everyone, true)).is_ok());
        assert!(matches!(
            authorize(&viewer(Audience::Everyone, false), &asset(Audience::Everyone, false)),
            Err(GatewayError::Forbidden(_))
        ));
    }

    #[test]
    fn viewer_headers_parse() {
        let mut headers = HeaderMap::new();
        let id = Uuid::new_v4();
        headers.insert(VIEWER_ID_HEADER, HeaderValue::from_str(&id.to_string()).unwrap());
        headers.insert(VIEWER_AUDIENCE_HEADER, HeaderValue::from_static("women"));
        headers.insert(VIEWER_SUBSCRIBED_HEADER, HeaderValue::from_static("true"));

        let viewer = viewer_from_headers(&headers).unwrap();
        assert_eq!(viewer.id, id);
        assert_eq!(viewer.audience, Audience::Women);
        assert!(viewer.subscribed);
    }

    #[test]
    fn missing_identity_is_unauthenticated() {
        let headers = HeaderMap::new();
        assert!(matches!(
            viewer_from_headers(&headers),
            Err(GatewayError::Unauthenticated(_))
        ));
    }
}
