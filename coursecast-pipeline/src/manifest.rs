//! Manifest assembly and output verification
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


use coursecast_types::{PipelineError, PipelineResult};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::keys::KeyMaterial;
use crate::renditions::Rendition;

/// The single entry point a player fetches. Either a copy of the master
/// manifest (multi-rendition) or of the sole variant playlist.
pub const CANONICAL_MANIFEST: &str = "index.m3u8";
/// Multi-variant manifest, present only when >= 2 renditions succeeded.
pub const MASTER_MANIFEST: &str = "master.m3u8";

/// Write the master manifest for the successful renditions, then copy it
/// to the canonical filename so the two are byte-identical.
pub fn write_master(output_dir: &Path, renditions: &[Rendition]) -> PipelineResult<PathBuf> {
    let master_path = output_dir.join(MASTER_MANIFEST);
    let mut file = File::create(&master_path)?;

    writeln!(file, "#EXTM3U")?;
    writeln!(file, "#EXT-X-VERSION:3")?;
    for rendition in renditions {
        writeln!(
            file,
            "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}",
            rendition.bandwidth_bps(),
            rendition.resolution()
        )?;
        writeln!(file, "{}", rendition.playlist_name())?;
    }
    drop(file);

    fs::copy(&master_path, output_dir.join(CANONICAL_MANIFEST))?;

    info!(
        master = %master_path.display(),
        variants = renditions.len(),
        "Created master manifest"
    );
    Ok(master_path)
}

/// Promote a sole variant playlist to the canonical entry point. Copy, not
/// move: the variant manifest stays addressable under its own name.
pub fn promote_single(output_dir: &Path, variant_playlist: &Path) -> PipelineResult<PathBuf> {
    let canonical = output_dir.join(CANONICAL_MANIFEST);
    fs::copy(variant_playlist, &canonical)?;
    info!(
        variant = %variant_playlist.display(),
        "Promoted single rendition to canonical manifest"
    );
    Ok(canonical)
}

/// Post-encode invariants: canonical manifest exists, is non-empty and
/// references at least one segment or variant; key file is exactly 16
/// bytes. Any violation is fatal for the run.
pub fn verify_output(output_dir: &Path) -> PipelineResult<()> {
    let canonical = output_dir.join(CANONICAL_MANIFEST);
    let body = fs::read_to_string(&canonical).map_err(|_| {
        PipelineError::OutputVerificationFailed(format!(
            "canonical manifest missing: {}",
            canonical.display()
        ))
    })?;

    if body.trim().is_empty() {
        return Err(PipelineError::OutputVerificationFailed(
            "canonical manifest is empty".to_string(),
        ));
    }
    if !has_reference(&body) {
        return Err(PipelineError::OutputVerificationFailed(
            "canonical manifest references no segments".to_string(),
        ));
    }

    KeyMaterial::verify_key_file(output_dir)
}

/// Whether a manifest body references at least one segment (media
/// playlist) or variant playlist (master).
fn has_reference(body: &str) -> bool {
    body.lines()
        .map(str::trim)
        .any(|line| !line.is_empty() && !line.starts_with('#'))
}

/// Number of segment files currently on disk, across all tiers.
pub fn count_segments(output_dir: &Path) -> usize {
    let Ok(entries) = fs::read_dir(output_dir) else {
        return 0;
    };
    entries
        .flatten()
        .filter(|entry| {
            entry
                .path()
                .extension()
                .map(|ext| ext == "ts")
                .unwrap_or(false)
        })
        .count()
}

/// Total size in bytes of the files directly under the output directory.
pub fn directory_size(output_dir: &Path) -> u64 {
    let Ok(entries) = fs::read_dir(output_dir) else {
        return 0;
    };
    entries
        .flatten()
        .filter_map(|entry| entry.metadata().ok())
        .filter(|meta| meta.is_file())
        .map(|meta| meta.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renditions::LADDER;
    use tempfile::TempDir;

    #[test]
    fn master_lists_all_variants_with_bandwidth_and_resolution() {
        let dir = TempDir::new().unwrap();
        write_master(dir.path(), &LADDER).unwrap();

        let body = fs::read_to_string(dir.path().join(MASTER_MANIFEST)).unwrap();
        let stream_infs: Vec<&str> = body
            .lines()
            .filter(|l| l.starts_with("#EXT-X-STREAM-INF"))
            .collect();
        assert_eq!(stream_infs.len(), 3);
        assert!(body.contains("BANDWIDTH=800000,RESOLUTION=640x360"));
        assert!(body.contains("BANDWIDTH=2800000,RESOLUTION=1280x720"));
        assert!(body.contains("BANDWIDTH=5000000,RESOLUTION=1920x1080"));
        assert!(body.contains("360p.m3u8"));
        assert!(body.contains("720p.m3u8"));
        assert!(body.contains("1080p.m3u8"));
    }

    #[test]
    fn canonical_equals_master_when_multi_rendition() {
        let dir = TempDir::new().unwrap();
        write_master(dir.path(), &LADDER).unwrap();

        let master = fs::read(dir.path().join(MASTER_MANIFEST)).unwrap();
        let canonical = fs::read(dir.path().join(CANONICAL_MANIFEST)).unwrap();
        assert_eq!(master, canonical);
    }

    #[test]
    fn promote_single_copies_not_moves() {
        let dir = TempDir::new().unwrap();
        let variant = dir.path().join("720p.m3u8");
        fs::write(&variant, "#EXTM3U\n#EXTINF:6.0,\n720p_segment_000.ts\n").unwrap();

        promote_single(dir.path(), &variant).unwrap();

        assert!(variant.exists(), "variant manifest must stay addressable");
        let canonical = fs::read(dir.path().join(CANONICAL_MANIFEST)).unwrap();
        assert_eq!(canonical, fs::read(&variant).unwrap());
    }

    #[test]
    fn verify_rejects_missing_and_empty_manifests() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            verify_output(dir.path()),
            Err(PipelineError::OutputVerificationFailed(_))
        ));

        fs::write(dir.path().join(CANONICAL_MANIFEST), "").unwrap();
        assert!(verify_output(dir.path()).is_err());

        fs::write(dir.path().join(CANONICAL_MANIFEST), "#EXTM3U\n#EXT-X-ENDLIST\n").unwrap();
        assert!(verify_output(dir.path()).is_err(), "no segment references");
    }

    #[test]
    fn verify_accepts_complete_output() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CANONICAL_MANIFEST),
            "#EXTM3U\n#EXTINF:6.0,\nsegment_000.ts\n#EXT-X-ENDLIST\n",
        )
        .unwrap();
        fs::write(dir.path().join(crate::keys::KEY_FILE), [7u8; 16]).unwrap();

        verify_output(dir.path()).unwrap();
    }

    #[test]
    fn count_segments_counts_only_ts_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("720p_segment_000.ts"), b"x").unwrap();
        fs::write(dir.path().join("720p_segment_001.ts"), b"x").unwrap();
        fs::write(dir.path().join("720p.m3u8"), b"#EXTM3U").unwrap();
        assert_eq!(count_segments(dir.path()), 2);
    }
}
