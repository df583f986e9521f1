//! Delivery gateway HTTP routes
//!
//! The playback surface: rewritten manifests, token-gated segment and key
//! fetches, progress polling and the transcode/delete control operations.
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


use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    routing::{delete, get, post},
    Router,
};
use chrono::{DateTime, Utc};
use coursecast_pipeline::job::{started_key, START_STAMP_TTL};
use coursecast_pipeline::{manifest, progress};
use coursecast_types::{StatusResponse, TranscodeRequest, VideoAsset, VideoStatus};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{authorize, viewer_from_headers};
use crate::error::GatewayError;
use crate::rewrite::rewrite_manifest;
use crate::state::GatewayState;
use crate::tokens::TokenError;

const MANIFEST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
const SEGMENT_CONTENT_TYPE: &str = "video/mp2t";
/// Segments are static once produced; a short private cache is fine.
const SEGMENT_CACHE_CONTROL: &str = "private, max-age=300";
/// Manifests are rewritten per requester and must never be cached.
const NO_CACHE: &str = "no-cache, no-store, must-revalidate";

pub fn gateway_router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/videos/:lesson/playlist.m3u8", get(playlist_handler))
        .route("/videos/:lesson/playlists/:name", get(variant_handler))
        .route("/videos/:lesson/segments/:name", get(segment_handler))
        .route("/videos/:lesson/key", get(key_handler))
        .route("/videos/:lesson/status", get(status_handler))
        .route("/videos/:lesson/transcode", post(transcode_handler))
        .route("/videos/:lesson", delete(delete_handler))
        .with_state(state)
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "coursecast-gateway",
    }))
}

/// Canonical manifest, rewritten for this viewer with fresh tokens.
async fn playlist_handler(
    Path(lesson): Path<Uuid>,
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, GatewayError> {
    let viewer = viewer_from_headers(&headers)?;
    let asset = load_ready(&state, lesson).await?;
    authorize(&viewer, &asset)?;

    let path = asset.output_dir.join(manifest::CANONICAL_MANIFEST);
    serve_playlist(&state, &path, lesson, viewer.id).await
}

/// One variant playlist out of a multi-rendition package. Authorized the
/// same way as the canonical manifest; the tokens live in the rewritten
/// segment lines, not in the playlist URL.
async fn variant_handler(
    Path((lesson, name)): Path<(Uuid, String)>,
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, GatewayError> {
    let viewer = viewer_from_headers(&headers)?;
    let asset = load_ready(&state, lesson).await?;
    authorize(&viewer, &asset)?;
    check_artifact_name(&name, ".m3u8")?;

    let path = asset.output_dir.join(&name);
    serve_playlist(&state, &path, lesson, viewer.id).await
}

async fn serve_playlist(
    state: &GatewayState,
    path: &std::path::Path,
    lesson: Uuid,
    viewer_id: Uuid,
) -> Result<axum::response::Response, GatewayError> {
    let body = tokio::fs::read_to_string(path)
        .await
        .map_err(|_| GatewayError::NotReady(lesson))?;
    let rewritten = rewrite_manifest(&state.tokens, &body, lesson, viewer_id).await?;

    Ok((
        [
            (header::CONTENT_TYPE, MANIFEST_CONTENT_TYPE),
            (header::CACHE_CONTROL, NO_CACHE),
            (header::PRAGMA, "no-cache"),
        ],
        rewritten,
    )
        .into_response())
}

/// Encrypted segment bytes, gated by a segment token bound to
/// {asset, segment, viewer}.
async fn segment_handler(
    Path((lesson, name)): Path<(Uuid, String)>,
    Query(query): Query<TokenQuery>,
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, GatewayError> {
    let viewer = viewer_from_headers(&headers)?;
    let asset = load_ready(&state, lesson).await?;
    authorize(&viewer, &asset)?;
    check_artifact_name(&name, ".ts")?;

    let token = query.token.ok_or(TokenError::Malformed)?;
    state
        .tokens
        .validate_segment_token(&token, lesson, &name, viewer.id)
        .await?;

    let file = tokio::fs::File::open(asset.output_dir.join(&name))
        .await
        .map_err(|_| GatewayError::NotFound(lesson))?;
    let stream = ReaderStream::new(file);

    Ok((
        [
            (header::CONTENT_TYPE, SEGMENT_CONTENT_TYPE),
            (header::CACHE_CONTROL, SEGMENT_CACHE_CONTROL),
        ],
        Body::from_stream(stream),
    ))
}

/// The asset's AES key: exactly 16 raw bytes, never cached, every fetch
/// logged. This is the single point of compromise for the whole asset.
async fn key_handler(
    Path(lesson): Path<Uuid>,
    Query(query): Query<TokenQuery>,
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, GatewayError> {
    let viewer = viewer_from_headers(&headers)?;
    let asset = load_ready(&state, lesson).await?;
    authorize(&viewer, &asset)?;

    let token = query.token.ok_or(TokenError::Malformed)?;
    if let Err(err) = state.tokens.validate_key_token(&token, lesson) {
        warn!(
            asset_id = %lesson,
            viewer_id = %viewer.id,
            error = %err,
            "Key fetch rejected"
        );
        return Err(err.into());
    }

    let bytes = tokio::fs::read(asset.output_dir.join(coursecast_pipeline::keys::KEY_FILE))
        .await
        .map_err(GatewayError::Io)?;
    if bytes.len() != coursecast_pipeline::keys::KEY_LEN {
        return Err(GatewayError::Pipeline(
            coursecast_types::PipelineError::OutputVerificationFailed(format!(
                "key file is {} bytes",
                bytes.len()
            )),
        ));
    }

    info!(asset_id = %lesson, viewer_id = %viewer.id, "Key fetched");

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream"),
            (header::CACHE_CONTROL, "no-store"),
            (header::PRAGMA, "no-cache"),
            (header::CONTENT_SECURITY_POLICY, "default-src 'none'"),
        ],
        bytes,
    ))
}

/// Processing status and progress, polled by the player page.
async fn status_handler(
    Path(lesson): Path<Uuid>,
    State(state): State<Arc<GatewayState>>,
) -> Result<Json<StatusResponse>, GatewayError> {
    let asset = load_asset(&state, lesson).await?;

    let response = match asset.status {
        VideoStatus::Ready => StatusResponse {
            lesson_id: lesson,
            status: asset.status,
            progress: 100,
            available: true,
            message: "Video is ready".to_string(),
            eta: None,
            playlist_url: Some(format!("/videos/{}/playlist.m3u8", lesson)),
            key_url: Some(format!("/videos/{}/key", lesson)),
        },
        VideoStatus::Processing => {
            let started = started_at(&state, lesson).await?;
            let snapshot = progress::estimate(
                &asset.output_dir,
                asset.duration_secs,
                state.segment_seconds,
                started,
                Utc::now(),
            );
            StatusResponse {
                lesson_id: lesson,
                status: asset.status,
                progress: snapshot.percent,
                available: false,
                message: snapshot.message,
                eta: snapshot.eta,
                playlist_url: None,
                key_url: None,
            }
        }
        VideoStatus::Failed => StatusResponse {
            lesson_id: lesson,
            status: asset.status,
            progress: 0,
            available: false,
            message: "Video processing failed".to_string(),
            eta: None,
            playlist_url: None,
            key_url: None,
        },
        VideoStatus::Unset => StatusResponse {
            lesson_id: lesson,
            status: asset.status,
            progress: 0,
            available: false,
            message: "No video has been uploaded".to_string(),
            eta: None,
            playlist_url: None,
            key_url: None,
        },
    };

    Ok(Json(response))
}

/// Dispatch a transcoding job for an uploaded source. The start-stamp
/// check keeps at most one job in flight per asset.
async fn transcode_handler(
    Path(lesson): Path<Uuid>,
    State(state): State<Arc<GatewayState>>,
) -> Result<impl IntoResponse, GatewayError> {
    let asset = load_asset(&state, lesson).await?;

    if asset.is_ready() {
        return Err(GatewayError::BadRequest(
            "video is already processed; delete it before re-transcoding".to_string(),
        ));
    }
    if asset.status == VideoStatus::Processing && state.cache.has(&started_key(lesson)).await? {
        return Err(GatewayError::AlreadyProcessing(lesson));
    }
    if asset.path.is_none() {
        return Err(GatewayError::BadRequest(
            "no uploaded source to transcode".to_string(),
        ));
    }

    // Stamp before dispatching, not inside the job: the job's own stamp
    // lands only after validation and the encoder probe, and a second
    // POST inside that window would otherwise dispatch a duplicate.
    state
        .cache
        .put(
            &started_key(lesson),
            &Utc::now().to_rfc3339(),
            START_STAMP_TTL,
        )
        .await?;
    state
        .dispatcher
        .dispatch(TranscodeRequest { asset_id: lesson })
        .await?;

    info!(asset_id = %lesson, "Transcode dispatched");
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "lesson_id": lesson, "dispatched": true })),
    ))
}

/// Remove all delivery artifacts and reset the asset's video fields.
async fn delete_handler(
    Path(lesson): Path<Uuid>,
    State(state): State<Arc<GatewayState>>,
) -> Result<impl IntoResponse, GatewayError> {
    state.job.delete_output(lesson).await?;
    Ok(Json(json!({ "lesson_id": lesson, "deleted": true })))
}

async fn load_asset(state: &GatewayState, lesson: Uuid) -> Result<VideoAsset, GatewayError> {
    state
        .assets
        .load(lesson)
        .await?
        .ok_or(GatewayError::NotFound(lesson))
}

async fn load_ready(state: &GatewayState, lesson: Uuid) -> Result<VideoAsset, GatewayError> {
    let asset = load_asset(state, lesson).await?;
    if !asset.is_ready() {
        return Err(GatewayError::NotReady(lesson));
    }
    Ok(asset)
}

async fn started_at(
    state: &GatewayState,
    lesson: Uuid,
) -> Result<Option<DateTime<Utc>>, GatewayError> {
    let Some(stamp) = state.cache.get(&started_key(lesson)).await? else {
        return Ok(None);
    };
    Ok(DateTime::parse_from_rfc3339(&stamp)
        .ok()
        .map(|dt| dt.with_timezone(&Utc)))
}

/// Artifact names come from the URL; only plain filenames with the
/// expected extension are ever joined onto the output directory.
fn check_artifact_name(name: &str, extension: &str) -> Result<(), GatewayError> {
    let plain = !name.contains("..") && !name.contains('/') && !name.contains('\\');
    if plain && name.ends_with(extension) && name.len() > extension.len() {
        Ok(())
    } else {
        Err(GatewayError::BadRequest(format!(
            "invalid artifact name: {}",
            name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::TokenService;
    use async_trait::async_trait;
    use coursecast_config::{EncoderConfig, TokenConfig};
    use coursecast_pipeline::{FfmpegEncoder, TranscodeJob};
    use coursecast_store::{
        AssetStore, EphemeralStore, JobDispatcher, MemoryAssetStore, MemoryEphemeralStore,
        StoreResult,
    };
    use coursecast_types::Audience;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn artifact_names_are_sanitized() {
        check_artifact_name("720p_segment_000.ts", ".ts").unwrap();
        check_artifact_name("720p.m3u8", ".m3u8").unwrap();

        assert!(check_artifact_name("../../etc/passwd", ".ts").is_err());
        assert!(check_artifact_name("a/b.ts", ".ts").is_err());
        assert!(check_artifact_name("enc.key", ".ts").is_err());
        assert!(check_artifact_name(".ts", ".ts").is_err());
    }

    #[derive(Default)]
    struct CountingDispatcher {
        dispatched: AtomicUsize,
    }

    #[async_trait]
    impl JobDispatcher for CountingDispatcher {
        async fn dispatch(&self, _request: TranscodeRequest) -> StoreResult<()> {
            self.dispatched.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn test_state(
        dispatcher: Arc<CountingDispatcher>,
    ) -> (Arc<GatewayState>, Arc<MemoryAssetStore>) {
        let assets = Arc::new(MemoryAssetStore::new());
        let cache = Arc::new(MemoryEphemeralStore::new());
        let encoder = Arc::new(FfmpegEncoder::new(EncoderConfig {
            ffmpeg_path: "ffmpeg-missing-for-tests".to_string(),
            ffprobe_path: "ffprobe-missing-for-tests".to_string(),
            segment_seconds: 6,
            encode_timeout_secs: 1,
            probe_timeout_secs: 1,
        }));
        let job = Arc::new(TranscodeJob::new(
            assets.clone() as Arc<dyn AssetStore>,
            cache.clone() as Arc<dyn EphemeralStore>,
            encoder,
        ));
        let tokens = TokenService::new(
            &TokenConfig {
                secret: "test-secret".to_string(),
                segment_ttl_secs: 300,
                key_ttl_secs: 300,
            },
            cache.clone() as Arc<dyn EphemeralStore>,
        );
        let state = Arc::new(GatewayState {
            assets: assets.clone() as Arc<dyn AssetStore>,
            cache: cache as Arc<dyn EphemeralStore>,
            dispatcher: dispatcher as Arc<dyn JobDispatcher>,
            job,
            tokens,
            segment_seconds: 6,
        });
        (state, assets)
    }

    #[tokio::test]
    async fn second_dispatch_for_the_same_asset_is_rejected() {
        let dispatcher = Arc::new(CountingDispatcher::default());
        let (state, assets) = test_state(dispatcher.clone());

        let id = Uuid::new_v4();
        let asset = VideoAsset::new(id, "Lesson", "/var/media/out", Audience::Everyone, true)
            .with_upload("/var/media/upload.mp4");
        assets.insert(asset).await;

        let first = transcode_handler(Path(id), State(state.clone())).await;
        assert!(first.is_ok());

        // The dispatched job has not started yet; the handler's own stamp
        // must already reject the second request.
        let second = transcode_handler(Path(id), State(state.clone())).await;
        let Err(err) = second else {
            panic!("second dispatch must be rejected")
        };
        assert!(matches!(err, GatewayError::AlreadyProcessing(_)));
        assert_eq!(dispatcher.dispatched.load(Ordering::SeqCst), 1);
    }
}
