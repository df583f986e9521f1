//! Transcoding Job - pipeline orchestration
//!
//! Runs one asset from uploaded source file to verified, encrypted HLS
//! output. Every step is a fail-fast precondition check before state is
//! mutated; any failure after the asset loads marks it `Failed` and
//! re-raises for the supervisor.
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


use chrono::Utc;
use coursecast_store::{AssetStore, EphemeralStore};
use coursecast_types::{PipelineError, PipelineResult, VideoAsset, VideoStatus};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::encoder::Encoder;
use crate::keys::KeyMaterial;
use crate::manifest;
use crate::renditions::{Rendition, LADDER};

/// Containers accepted as transcoding input.
const ALLOWED_SOURCE_TYPES: &[(&str, &str)] = &[
    ("mp4", "video/mp4"),
    ("m4v", "video/x-m4v"),
    ("mov", "video/quicktime"),
    ("mkv", "video/x-matroska"),
    ("webm", "video/webm"),
    ("avi", "video/x-msvideo"),
    ("mpg", "video/mpeg"),
    ("mpeg", "video/mpeg"),
    ("ts", "video/mp2t"),
];

/// TTL of the start-timestamp record; generous enough to outlive any
/// encode within the supervisor deadline. Dispatchers write the same key
/// before enqueueing, so the record doubles as the in-flight marker.
pub const START_STAMP_TTL: Duration = Duration::from_secs(24 * 3600);

/// Ephemeral-store key carrying the run's start timestamp.
pub fn started_key(asset_id: Uuid) -> String {
    format!("transcode:started:{}", asset_id)
}

/// The orchestrating state machine for one asset's transcode.
pub struct TranscodeJob {
    assets: Arc<dyn AssetStore>,
    cache: Arc<dyn EphemeralStore>,
    encoder: Arc<dyn Encoder>,
}

impl TranscodeJob {
    pub fn new(
        assets: Arc<dyn AssetStore>,
        cache: Arc<dyn EphemeralStore>,
        encoder: Arc<dyn Encoder>,
    ) -> Self {
        Self {
            assets,
            cache,
            encoder,
        }
    }

    /// Run the job to one of two terminal outcomes: `Ready` with a
    /// verified manifest set, or `Failed` with the error re-raised for the
    /// retry supervisor.
    pub async fn run(&self, asset_id: Uuid) -> PipelineResult<()> {
        let mut asset = self
            .assets
            .load(asset_id)
            .await?
            .ok_or(PipelineError::AssetNotFound(asset_id))?;

        match self.execute(&mut asset).await {
            Ok(()) => {
                info!(
                    asset_id = %asset_id,
                    duration = ?asset.duration_secs,
                    size = ?asset.size_bytes,
                    "Transcoding completed"
                );
                Ok(())
            }
            Err(err) => {
                error!(asset_id = %asset_id, error = %err, "Transcoding failed");
                asset.status = VideoStatus::Failed;
                if let Err(store_err) = self.assets.update(&asset).await {
                    error!(
                        asset_id = %asset_id,
                        error = %store_err,
                        "Could not persist failed status"
                    );
                }
                Err(err)
            }
        }
    }

    async fn execute(&self, asset: &mut VideoAsset) -> PipelineResult<()> {
        let source = asset
            .path
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| {
                PipelineError::InputInvalid("asset has no source path".to_string())
            })?;

        validate_source(&source)?;
        self.encoder.probe_available().await?;
        fs::create_dir_all(&asset.output_dir)?;

        asset.status = VideoStatus::Processing;
        self.assets.update(asset).await?;
        self.cache
            .put(
                &started_key(asset.id),
                &Utc::now().to_rfc3339(),
                START_STAMP_TTL,
            )
            .await?;

        let key_uri = format!("/videos/{}/key", asset.id);
        let keys = KeyMaterial::generate(&asset.output_dir, &key_uri)?;

        let fell_back = self.encode_ladder(asset, &source, &keys).await?;
        manifest::verify_output(&asset.output_dir)?;

        // The one call site where a probe failure is swallowed: duration
        // stays unknown, the run still succeeds.
        asset.duration_secs = match self.encoder.probe_duration(&source).await {
            Ok(duration) => Some(duration),
            Err(err) => {
                warn!(
                    asset_id = %asset.id,
                    error = %err,
                    "Duration probe failed, continuing without duration"
                );
                None
            }
        };
        asset.size_bytes = Some(manifest::directory_size(&asset.output_dir));

        let canonical = asset.output_dir.join(manifest::CANONICAL_MANIFEST);
        asset.path = Some(canonical);
        asset.status = VideoStatus::Ready;
        self.assets.update(asset).await?;

        if let Err(err) = fs::remove_file(&source) {
            warn!(
                asset_id = %asset.id,
                source = %source.display(),
                error = %err,
                "Could not delete temporary source file"
            );
        }
        if let Err(err) = keys.discard_keyinfo() {
            warn!(
                asset_id = %asset.id,
                error = %err,
                "Could not delete key-info descriptor"
            );
        }

        if fell_back {
            info!(asset_id = %asset.id, "Completed via single-rendition fallback");
        }
        Ok(())
    }

    /// Attempt every tier in ladder order. An optional tier failing is
    /// logged and skipped; the baseline tier failing abandons the ladder
    /// for a single fallback encode that writes the canonical manifest
    /// directly. Returns whether the fallback path was taken.
    async fn encode_ladder(
        &self,
        asset: &VideoAsset,
        source: &Path,
        keys: &KeyMaterial,
    ) -> PipelineResult<bool> {
        let mut succeeded: Vec<Rendition> = Vec::new();

        for rendition in LADDER.iter() {
            match self
                .encoder
                .encode_rendition(source, &asset.output_dir, rendition, keys)
                .await
            {
                Ok(_) => succeeded.push(*rendition),
                Err(err) if rendition.is_baseline() => {
                    warn!(
                        asset_id = %asset.id,
                        tier = rendition.name,
                        error = %err,
                        "Baseline tier failed, switching to single-rendition fallback"
                    );
                    self.encoder
                        .encode_fallback(source, &asset.output_dir, keys)
                        .await?;
                    return Ok(true);
                }
                Err(err) => {
                    warn!(
                        asset_id = %asset.id,
                        tier = rendition.name,
                        error = %err,
                        "Optional tier failed, skipping"
                    );
                }
            }
        }

        match succeeded.len() {
            0 => Err(PipelineError::EncodeFailed {
                diagnostics: "no rendition succeeded".to_string(),
            }),
            1 => {
                let playlist = asset.output_dir.join(succeeded[0].playlist_name());
                manifest::promote_single(&asset.output_dir, &playlist)?;
                Ok(false)
            }
            _ => {
                manifest::write_master(&asset.output_dir, &succeeded)?;
                Ok(false)
            }
        }
    }

    /// Explicit delete: remove all artifacts and reset the asset's video
    /// fields to their unset state.
    pub async fn delete_output(&self, asset_id: Uuid) -> PipelineResult<()> {
        let mut asset = self
            .assets
            .load(asset_id)
            .await?
            .ok_or(PipelineError::AssetNotFound(asset_id))?;

        if asset.output_dir.exists() {
            fs::remove_dir_all(&asset.output_dir)?;
        }
        asset.path = None;
        asset.status = VideoStatus::Unset;
        asset.duration_secs = None;
        asset.size_bytes = None;
        self.assets.update(&asset).await?;

        info!(asset_id = %asset_id, "Deleted video output");
        Ok(())
    }
}

/// Fail-fast source validation: the file must exist, be non-empty and be
/// one of the allowed video containers.
fn validate_source(source: &Path) -> PipelineResult<()> {
    let meta = fs::metadata(source).map_err(|_| {
        PipelineError::InputInvalid(format!("source file missing: {}", source.display()))
    })?;
    if meta.len() == 0 {
        return Err(PipelineError::InputInvalid(format!(
            "source file is empty: {}",
            source.display()
        )));
    }

    match source_mime(source) {
        Some(_) => Ok(()),
        None => Err(PipelineError::InputInvalid(format!(
            "unsupported container: {}",
            source.display()
        ))),
    }
}

/// MIME type for an allowed source file, from its extension.
pub fn source_mime(source: &Path) -> Option<&'static str> {
    let ext = source.extension()?.to_str()?.to_ascii_lowercase();
    ALLOWED_SOURCE_TYPES
        .iter()
        .find(|(allowed, _)| *allowed == ext)
        .map(|(_, mime)| *mime)
}

/// Output directory for an asset under the configured media root.
pub fn output_dir_for(media_root: &Path, asset_id: Uuid) -> PathBuf {
    media_root.join(asset_id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn mime_lookup_is_case_insensitive() {
        assert_eq!(source_mime(Path::new("a/movie.MP4")), Some("video/mp4"));
        assert_eq!(source_mime(Path::new("clip.webm")), Some("video/webm"));
        assert_eq!(source_mime(Path::new("notes.pdf")), None);
        assert_eq!(source_mime(Path::new("no-extension")), None);
    }

    #[test]
    fn validate_rejects_missing_empty_and_wrong_type() {
        let dir = TempDir::new().unwrap();

        let missing = dir.path().join("gone.mp4");
        assert!(matches!(
            validate_source(&missing),
            Err(PipelineError::InputInvalid(_))
        ));

        let empty = dir.path().join("empty.mp4");
        fs::write(&empty, b"").unwrap();
        assert!(matches!(
            validate_source(&empty),
            Err(PipelineError::InputInvalid(_))
        ));

        let wrong = dir.path().join("slides.pdf");
        fs::write(&wrong, b"%PDF-").unwrap();
        assert!(matches!(
            validate_source(&wrong),
            Err(PipelineError::InputInvalid(_))
        ));

        let ok = dir.path().join("lesson.mp4");
        fs::write(&ok, b"not really a video but non-empty").unwrap();
        validate_source(&ok).unwrap();
    }
}
