//! Video asset and viewer definitions
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
use std::path::PathBuf;
use uuid::Uuid;

/// Processing state of a lesson's video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    /// No video attached, or a previous video was explicitly removed.
    Unset,
    /// The transcoding job is running (or queued).
    Processing,
    /// A verified manifest set exists on disk and is servable.
    Ready,
    /// The last transcoding run ended in a terminal failure.
    Failed,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Unset => "unset",
            VideoStatus::Processing => "processing",
            VideoStatus::Ready => "ready",
            VideoStatus::Failed => "failed",
        }
    }
}

/// Target audience of an asset, matched against the viewer's audience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    Everyone,
    Men,
    Women,
}

impl Audience {
    /// Whether a viewer with audience `viewer` may watch content
    /// targeted at `self`.
    pub fn admits(&self, viewer: Audience) -> bool {
        matches!(self, Audience::Everyone) || *self == viewer
    }
}

/// One lesson's video: the only business entity the core mutates, and only
/// its video-related fields. Persistence of the surrounding course/lesson
/// entities lives outside the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoAsset {
    pub id: Uuid,
    pub title: String,
    /// Before processing: the temporary uploaded source file.
    /// After a successful run: the canonical manifest location.
    pub path: Option<PathBuf>,
    /// Per-asset output directory for renditions, manifests and key file.
    pub output_dir: PathBuf,
    pub status: VideoStatus,
    /// Duration in seconds, populated on success (probe permitting).
    pub duration_secs: Option<f64>,
    /// Size in bytes of the canonical manifest's directory contents.
    pub size_bytes: Option<u64>,
    pub audience: Audience,
    /// Free lessons are viewable without a subscription.
    pub free: bool,
}

impl VideoAsset {
    pub fn new(
        id: Uuid,
        title: impl Into<String>,
        output_dir: impl Into<PathBuf>,
        audience: Audience,
        free: bool,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            path: None,
            output_dir: output_dir.into(),
            status: VideoStatus::Unset,
            duration_secs: None,
            size_bytes: None,
            audience,
            free,
        }
    }

    /// Record a freshly uploaded source file, queueing the asset for
    /// processing.
    pub fn with_upload(mut self, source: impl Into<PathBuf>) -> Self {
        self.path = Some(source.into());
        self.status = VideoStatus::Processing;
        self
    }

    pub fn is_ready(&self) -> bool {
        self.status == VideoStatus::Ready
    }
}

/// The authenticated viewer, as handed over by the external auth layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Viewer {
    pub id: Uuid,
    pub audience: Audience,
    pub subscribed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audience_admission() {
        assert!(Audience::Everyone.admits(Audience::Men));
        assert!(Audience::Everyone.admits(Audience::Women));
        assert!(Audience::Men.admits(Audience::Men));
        assert!(!Audience::Men.admits(Audience::Women));
        assert!(!Audience::Women.admits(Audience::Men));
    }

    #[test]
    fn upload_marks_processing() {
        let asset = VideoAsset::new(
            Uuid::new_v4(),
            "Intro",
            "/var/media/abc",
            Audience::Everyone,
            true,
        )
        .with_upload("/tmp/upload.mp4");

        assert_eq!(asset.status, VideoStatus::Processing);
        assert_eq!(asset.path.as_deref(), Some(std::path::Path::new("/tmp/upload.mp4")));
    }
}
