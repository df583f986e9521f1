//! Manifest rewriting for authenticated delivery
//!
//! On-disk manifests reference bare filenames; the gateway rewrites every
//! reference into an authenticated URL before it leaves the process. The
//! result is per-requester and must never be cached.
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


use uuid::Uuid;

use crate::tokens::{TokenError, TokenService};

/// Rewrite a manifest body for one viewer:
/// - variant-playlist references become authenticated playlist URLs
///   (re-authorized on fetch, no token needed),
/// - segment references gain a freshly minted segment token,
/// - the key URI gains a freshly minted key token.
pub async fn rewrite_manifest(
    tokens: &TokenService,
    body: &str,
    asset_id: Uuid,
    viewer_id: Uuid,
) -> Result<String, TokenError> {
    let mut out = String::with_capacity(body.len() * 2);

    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("#EXT-X-KEY") {
            let token = tokens.issue_key_token(asset_id);
            let url = format!("/videos/{}/key?token={}", asset_id, token);
            out.push_str(&replace_uri_attribute(trimmed, &url));
        } else if trimmed.is_empty() || trimmed.starts_with('#') {
            out.push_str(line);
        } else if trimmed.ends_with(".m3u8") {
            out.push_str(&format!("/videos/{}/playlists/{}", asset_id, trimmed));
        } else {
            let token = tokens
                .issue_segment_token(asset_id, trimmed, viewer_id)
                .await?;
            out.push_str(&format!(
                "/videos/{}/segments/{}?token={}",
                asset_id, trimmed, token
            ));
        }
        out.push('\n');
    }

    Ok(out)
}

/// Replace the value of the `URI="..."` attribute in a key line. A key
/// line without a URI attribute is passed through unchanged.
fn replace_uri_attribute(line: &str, url: &str) -> String {
    let Some(start) = line.find("URI=\"") else {
        return line.to_string();
    };
    let value_start = start + "URI=\"".len();
    let Some(value_len) = line[value_start..].find('"') else {
        return line.to_string();
    };
    format!(
        "{}{}{}",
        &line[..value_start],
        url,
        &line[value_start + value_len..]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursecast_config::TokenConfig;
    use coursecast_store::{EphemeralStore, MemoryEphemeralStore};
    use std::sync::Arc;

    fn service() -> (TokenService, Arc<MemoryEphemeralStore>) {
        let store = Arc::new(MemoryEphemeralStore::new());
        let config = TokenConfig {
            secret: "test-secret".to_string(),
            segment_ttl_secs: 300,
            key_ttl_secs: 300,
        };
        (
            TokenService::new(&config, store.clone() as Arc<dyn EphemeralStore>),
            store,
        )
    }

    #[tokio::test]
    async fn media_playlist_lines_are_rewritten() {
        let (tokens, _store) = service();
        let asset = Uuid::new_v4();
        let viewer = Uuid::new_v4();
        let body = concat!(
            "#EXTM3U\n",
            "#EXT-X-VERSION:3\n",
            "#EXT-X-KEY:METHOD=AES-128,URI=\"/videos/x/key\",IV=0xabcdef\n",
            "#EXTINF:6.0,\n",
            "720p_segment_000.ts\n",
            "#EXT-X-ENDLIST\n",
        );

        let rewritten = rewrite_manifest(&tokens, body, asset, viewer).await.unwrap();

        assert!(rewritten.contains("#EXTM3U"));
        let key_line = rewritten
            .lines()
            .find(|l| l.starts_with("#EXT-X-KEY"))
            .unwrap();
        assert!(key_line.contains(&format!("URI=\"/videos/{}/key?token=", asset)));
        assert!(key_line.contains("IV=0xabcdef"), "trailing attributes kept");

        let segment_line = rewritten
            .lines()
            .find(|l| l.contains("720p_segment_000.ts"))
            .unwrap();
        assert!(segment_line.starts_with(&format!("/videos/{}/segments/", asset)));
        assert!(segment_line.contains("?token="));
    }

    #[tokio::test]
    async fn master_playlist_variants_are_rewritten_without_tokens() {
        let (tokens, _store) = service();
        let asset = Uuid::new_v4();
        let body = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360\n360p.m3u8\n";

        let rewritten = rewrite_manifest(&tokens, body, asset, Uuid::new_v4())
            .await
            .unwrap();

        assert!(rewritten.contains(&format!("/videos/{}/playlists/360p.m3u8", asset)));
        assert!(!rewritten.contains("playlists/360p.m3u8?token="));
    }

    #[tokio::test]
    async fn minted_segment_tokens_validate_for_the_same_triple() {
        let (tokens, _store) = service();
        let asset = Uuid::new_v4();
        let viewer = Uuid::new_v4();
        let body = "#EXTM3U\nseg_000.ts\n";

        let rewritten = rewrite_manifest(&tokens, body, asset, viewer).await.unwrap();
        let token = rewritten
            .lines()
            .find_map(|l| l.split("?token=").nth(1))
            .unwrap();

        tokens
            .validate_segment_token(token, asset, "seg_000.ts", viewer)
            .await
            .unwrap();
    }
}
