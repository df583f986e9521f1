//! Progress estimation from on-disk artifacts
//!
//! A pure function of the output directory, the recorded start timestamp
//! and the previously-probed duration. Stage gates are heuristics, not
//! encoder telemetry; the only guarantee is that progress never decreases
//! while artifacts accumulate.
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


use chrono::{DateTime, Utc};
use std::path::Path;

use crate::manifest::{count_segments, CANONICAL_MANIFEST};

// Stage gates.
const QUEUED: u8 = 5;
const DIRECTORY_CREATED: u8 = 15;
const ENCODING_STARTED: u8 = 25;
const SEGMENTS_CAP: u8 = 95;
const UNKNOWN_EXPECTED: u8 = 60;

/// Below this progress, elapsed time is too noisy to extrapolate from.
const ETA_MIN_PROGRESS: u8 = 10;

/// One read-only look at a transcoding run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    /// 0-100.
    pub percent: u8,
    /// Human-readable remaining time; `None` while still estimating.
    pub eta: Option<String>,
    pub message: String,
}

/// Estimate progress for an in-flight run.
///
/// `duration_secs` is the previously recorded source duration, if any;
/// `started_at` is the timestamp the job wrote when it began.
pub fn estimate(
    output_dir: &Path,
    duration_secs: Option<f64>,
    segment_seconds: u32,
    started_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> ProgressSnapshot {
    let percent = stage_percent(output_dir, duration_secs, segment_seconds);
    let eta = remaining_estimate(percent, started_at, now);
    let message = match percent {
        p if p <= QUEUED => "Waiting for the transcoder to pick up the video".to_string(),
        p if p <= DIRECTORY_CREATED => "Preparing renditions".to_string(),
        p if p <= ENCODING_STARTED => "Encoding has started".to_string(),
        _ => "Encoding renditions".to_string(),
    };
    ProgressSnapshot {
        percent,
        eta,
        message,
    }
}

fn stage_percent(output_dir: &Path, duration_secs: Option<f64>, segment_seconds: u32) -> u8 {
    if !output_dir.exists() {
        return QUEUED;
    }
    if !output_dir.join(CANONICAL_MANIFEST).exists() {
        return DIRECTORY_CREATED;
    }

    let found = count_segments(output_dir);
    if found == 0 {
        return ENCODING_STARTED;
    }

    match expected_segments(duration_secs, segment_seconds) {
        Some(expected) => {
            let ratio = (found as f64 / expected as f64).min(1.0);
            let span = (SEGMENTS_CAP - ENCODING_STARTED) as f64;
            ENCODING_STARTED + (span * ratio).round() as u8
        }
        None => UNKNOWN_EXPECTED,
    }
}

/// Segments one rendition should produce: duration over the fixed segment
/// target, rounded up.
fn expected_segments(duration_secs: Option<f64>, segment_seconds: u32) -> Option<u64> {
    let duration = duration_secs.filter(|d| *d > 0.0)?;
    Some((duration / segment_seconds as f64).ceil().max(1.0) as u64)
}

/// Linear extrapolation: total ≈ elapsed / fraction, remaining = total -
/// elapsed. Only once progress has cleared the noise floor.
fn remaining_estimate(
    percent: u8,
    started_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<String> {
    if percent < ETA_MIN_PROGRESS || percent >= 100 {
        return None;
    }
    let started = started_at?;
    let elapsed = (now - started).num_seconds();
    if elapsed <= 0 {
        return None;
    }

    let fraction = percent as f64 / 100.0;
    let total = elapsed as f64 / fraction;
    let remaining = (total - elapsed as f64).max(0.0) as i64;
    Some(humanize_secs(remaining))
}

fn humanize_secs(secs: i64) -> String {
    if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn snapshot(dir: &Path, duration: Option<f64>) -> ProgressSnapshot {
        estimate(dir, duration, 6, None, Utc::now())
    }

    #[test]
    fn progress_is_monotonic_as_artifacts_appear() {
        let root = TempDir::new().unwrap();
        let out = root.path().join("asset");
        let mut seen = Vec::new();

        // No output directory yet.
        seen.push(snapshot(&out, Some(60.0)).percent);

        // Directory without a canonical manifest.
        fs::create_dir_all(&out).unwrap();
        seen.push(snapshot(&out, Some(60.0)).percent);

        // Manifest present, no segments.
        fs::write(out.join(CANONICAL_MANIFEST), "#EXTM3U\n").unwrap();
        seen.push(snapshot(&out, Some(60.0)).percent);

        // Segments appearing one by one; 60s / 6s = 10 expected.
        for i in 0..10 {
            fs::write(out.join(format!("segment_{:03}.ts", i)), b"x").unwrap();
            seen.push(snapshot(&out, Some(60.0)).percent);
        }

        for pair in seen.windows(2) {
            assert!(
                pair[1] >= pair[0],
                "progress decreased: {:?}",
                seen
            );
        }
        assert!(*seen.last().unwrap() <= 100);
    }

    #[test]
    fn unknown_duration_reports_flat_fallback() {
        let root = TempDir::new().unwrap();
        let out = root.path().join("asset");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join(CANONICAL_MANIFEST), "#EXTM3U\n").unwrap();
        fs::write(out.join("segment_000.ts"), b"x").unwrap();

        let snap = snapshot(&out, None);
        assert_eq!(snap.percent, 60);
    }

    #[test]
    fn segment_overshoot_is_clamped() {
        let root = TempDir::new().unwrap();
        let out = root.path().join("asset");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join(CANONICAL_MANIFEST), "#EXTM3U\n").unwrap();
        // Three tiers each writing segments can overshoot the per-tier
        // expectation; the ratio is clamped.
        for i in 0..30 {
            fs::write(out.join(format!("segment_{:03}.ts", i)), b"x").unwrap();
        }
        let snap = snapshot(&out, Some(60.0));
        assert!(snap.percent <= 95);
    }

    #[test]
    fn eta_absent_below_threshold_and_present_later() {
        let root = TempDir::new().unwrap();
        let out = root.path().join("asset");
        let started = Utc::now() - chrono::Duration::seconds(120);

        // Below the noise floor: estimating.
        let early = estimate(&out, Some(600.0), 6, Some(started), Utc::now());
        assert!(early.percent < ETA_MIN_PROGRESS || early.eta.is_some());

        // Halfway through the segments: a number comes back.
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join(CANONICAL_MANIFEST), "#EXTM3U\n").unwrap();
        for i in 0..50 {
            fs::write(out.join(format!("segment_{:03}.ts", i)), b"x").unwrap();
        }
        let later = estimate(&out, Some(600.0), 6, Some(started), Utc::now());
        assert!(later.eta.is_some());
    }

    #[test]
    fn humanize_formats() {
        assert_eq!(humanize_secs(42), "42s");
        assert_eq!(humanize_secs(200), "3m 20s");
        assert_eq!(humanize_secs(3700), "1h 1m");
    }
}
