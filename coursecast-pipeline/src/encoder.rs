//! FFmpeg adapter - external encoder and probe invocation
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


use async_trait::async_trait;
use coursecast_config::EncoderConfig;
use coursecast_types::{PipelineError, PipelineResult};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::keys::KeyMaterial;
use crate::manifest::CANONICAL_MANIFEST;
use crate::renditions::Rendition;

/// Contract of the external encoder and probe toolchain. The transcoding
/// job consumes this seam the way the stores are consumed, so rendition
/// routing can be exercised without a media toolchain on the host.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Verify the encoder binary is reachable. A missing or broken install
    /// is an environment error, reported distinctly from data errors.
    async fn probe_available(&self) -> PipelineResult<()>;

    /// Encode one rendition: scaled, bitrate-capped, segmented into
    /// fixed-duration pieces, each encrypted through the key-info
    /// descriptor. Returns the variant playlist path.
    async fn encode_rendition(
        &self,
        input: &Path,
        output_dir: &Path,
        rendition: &Rendition,
        keys: &KeyMaterial,
    ) -> PipelineResult<PathBuf>;

    /// Fallback single-rendition encode: no scaling or bitrate ladder,
    /// writes the canonical manifest directly.
    async fn encode_fallback(
        &self,
        input: &Path,
        output_dir: &Path,
        keys: &KeyMaterial,
    ) -> PipelineResult<PathBuf>;

    /// Extract media duration in seconds. The caller decides whether a
    /// probe failure is fatal.
    async fn probe_duration(&self, media: &Path) -> PipelineResult<f64>;
}

/// Thin wrapper around the ffmpeg/ffprobe binaries. Holds no state beyond
/// its configuration.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    config: EncoderConfig,
}

impl FfmpegEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn probe_available(&self) -> PipelineResult<()> {
        let run = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        let status = timeout(Duration::from_secs(self.config.probe_timeout_secs), run)
            .await
            .map_err(|_| {
                PipelineError::EnvironmentUnavailable(format!(
                    "{} -version timed out",
                    self.config.ffmpeg_path
                ))
            })?
            .map_err(|err| {
                PipelineError::EnvironmentUnavailable(format!(
                    "{} not runnable: {}",
                    self.config.ffmpeg_path, err
                ))
            })?;

        if !status.success() {
            return Err(PipelineError::EnvironmentUnavailable(format!(
                "{} -version exited with {}",
                self.config.ffmpeg_path, status
            )));
        }
        Ok(())
    }

    async fn encode_rendition(
        &self,
        input: &Path,
        output_dir: &Path,
        rendition: &Rendition,
        keys: &KeyMaterial,
    ) -> PipelineResult<PathBuf> {
        let playlist = output_dir.join(rendition.playlist_name());
        let segment_pattern = output_dir.join(rendition.segment_pattern());

        info!(
            tier = rendition.name,
            bitrate = rendition.bitrate,
            "Encoding rendition"
        );

        // Auto width (-2) keeps the source aspect ratio; the ladder's
        // nominal width only feeds the master manifest.
        let scale = format!("scale=-2:{}", rendition.height);
        let hls_time = self.config.segment_seconds.to_string();

        let mut cmd = Command::new(&self.config.ffmpeg_path);
        cmd.arg("-y")
            .arg("-i")
            .arg(input)
            .args(["-vf", &scale])
            .args(["-c:v", "h264", "-profile:v", "main", "-preset", "medium"])
            .args(["-crf", "20", "-sc_threshold", "0"])
            .args(["-g", "48", "-keyint_min", "48"])
            .args(["-b:v", rendition.bitrate])
            .args(["-maxrate", rendition.maxrate])
            .args(["-bufsize", rendition.bufsize])
            .args(["-c:a", "aac", "-b:a", "128k", "-ar", "48000"])
            .args(["-hls_time", &hls_time])
            .args(["-hls_playlist_type", "vod"])
            .arg("-hls_key_info_file")
            .arg(&keys.keyinfo_path)
            .arg("-hls_segment_filename")
            .arg(&segment_pattern)
            .arg(&playlist);

        self.run_encode(cmd, rendition.name).await?;
        Ok(playlist)
    }

    async fn encode_fallback(
        &self,
        input: &Path,
        output_dir: &Path,
        keys: &KeyMaterial,
    ) -> PipelineResult<PathBuf> {
        let playlist = output_dir.join(CANONICAL_MANIFEST);
        let segment_pattern = output_dir.join("segment_%03d.ts");

        info!("Encoding single-rendition fallback");

        let hls_time = self.config.segment_seconds.to_string();

        let mut cmd = Command::new(&self.config.ffmpeg_path);
        cmd.arg("-y")
            .arg("-i")
            .arg(input)
            .args(["-c:v", "h264", "-profile:v", "main", "-preset", "medium"])
            .args(["-crf", "20", "-sc_threshold", "0"])
            .args(["-g", "48", "-keyint_min", "48"])
            .args(["-c:a", "aac", "-b:a", "128k", "-ar", "48000"])
            .args(["-hls_time", &hls_time])
            .args(["-hls_playlist_type", "vod"])
            .arg("-hls_key_info_file")
            .arg(&keys.keyinfo_path)
            .arg("-hls_segment_filename")
            .arg(&segment_pattern)
            .arg(&playlist);

        self.run_encode(cmd, "fallback").await?;
        Ok(playlist)
    }

    async fn probe_duration(&self, media: &Path) -> PipelineResult<f64> {
        let run = Command::new(&self.config.ffprobe_path)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(media)
            .stdin(Stdio::null())
            .output();

        let output = timeout(Duration::from_secs(self.config.probe_timeout_secs), run)
            .await
            .map_err(|_| {
                PipelineError::EncodeFailed {
                    diagnostics: format!("{} timed out", self.config.ffprobe_path),
                }
            })?
            .map_err(|err| {
                PipelineError::EnvironmentUnavailable(format!(
                    "{} not runnable: {}",
                    self.config.ffprobe_path, err
                ))
            })?;

        if !output.status.success() {
            return Err(PipelineError::EncodeFailed {
                diagnostics: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout);
        text.trim().parse::<f64>().map_err(|_| {
            PipelineError::EncodeFailed {
                diagnostics: format!("unparseable duration: {:?}", text.trim()),
            }
        })
    }
}

impl FfmpegEncoder {
    /// Run one encode to completion under the wall-clock timeout, capturing
    /// stderr so a failure carries diagnostics. A timeout is an ordinary
    /// EncodeFailed, not a crash.
    async fn run_encode(&self, mut cmd: Command, label: &str) -> PipelineResult<()> {
        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                if err.kind() == std::io::ErrorKind::NotFound {
                    PipelineError::EnvironmentUnavailable(format!(
                        "{} not found",
                        self.config.ffmpeg_path
                    ))
                } else {
                    PipelineError::Io(err)
                }
            })?;

        // Drain stderr concurrently so a chatty encoder cannot fill the
        // pipe and stall the wait below.
        let mut stderr = child.stderr.take();
        let drain = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(pipe) = stderr.as_mut() {
                let _ = pipe.read_to_string(&mut buf).await;
            }
            buf
        });

        let waited = timeout(
            Duration::from_secs(self.config.encode_timeout_secs),
            child.wait(),
        )
        .await;

        let status = match waited {
            Ok(status) => status?,
            Err(_) => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                return Err(PipelineError::EncodeFailed {
                    diagnostics: format!(
                        "{} encode exceeded {}s timeout",
                        label, self.config.encode_timeout_secs
                    ),
                });
            }
        };

        let diagnostics = drain.await.unwrap_or_default();
        if !status.success() {
            return Err(PipelineError::EncodeFailed {
                diagnostics: format!("{} encode exited with {}: {}", label, status, diagnostics),
            });
        }

        debug!(tier = label, "Encode finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(ffmpeg: &str) -> EncoderConfig {
        EncoderConfig {
            ffmpeg_path: ffmpeg.to_string(),
            ffprobe_path: "ffprobe-definitely-missing".to_string(),
            segment_seconds: 6,
            encode_timeout_secs: 5,
            probe_timeout_secs: 2,
        }
    }

    #[tokio::test]
    async fn missing_binary_is_environment_error() {
        let encoder = FfmpegEncoder::new(test_config("ffmpeg-definitely-missing"));
        let err = encoder.probe_available().await.unwrap_err();
        assert!(err.is_environment(), "got {err}");
    }

    #[tokio::test]
    async fn probe_duration_on_missing_probe_binary() {
        let encoder = FfmpegEncoder::new(test_config("ffmpeg-definitely-missing"));
        let err = encoder
            .probe_duration(Path::new("/nonexistent.mp4"))
            .await
            .unwrap_err();
        assert!(err.is_environment(), "got {err}");
    }
}
