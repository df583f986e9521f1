//! Static rendition ladder
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


/// One fixed quality tier. Encodes use auto width (`-2`), so `width` here
/// is the nominal 16:9 width reported in the master manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rendition {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    /// Target video bitrate as an ffmpeg bitrate string, e.g. "800k".
    pub bitrate: &'static str,
    pub maxrate: &'static str,
    pub bufsize: &'static str,
}

/// The quality ladder, attempted in order. Losing an optional tier still
/// yields a usable output; losing the baseline triggers the
/// single-rendition fallback encode.
pub const LADDER: [Rendition; 3] = [
    Rendition {
        name: "360p",
        width: 640,
        height: 360,
        bitrate: "800k",
        maxrate: "856k",
        bufsize: "1200k",
    },
    Rendition {
        name: "720p",
        width: 1280,
        height: 720,
        bitrate: "2800k",
        maxrate: "2996k",
        bufsize: "4200k",
    },
    Rendition {
        name: "1080p",
        width: 1920,
        height: 1080,
        bitrate: "5000k",
        maxrate: "5350k",
        bufsize: "7500k",
    },
];

/// The mandatory mid tier.
pub const BASELINE: &str = "720p";

impl Rendition {
    pub fn is_baseline(&self) -> bool {
        self.name == BASELINE
    }

    /// Variant playlist filename, `<tier>.m3u8`.
    pub fn playlist_name(&self) -> String {
        format!("{}.m3u8", self.name)
    }

    /// Deterministic segment filename pattern handed to the encoder.
    pub fn segment_pattern(&self) -> String {
        format!("{}_segment_%03d.ts", self.name)
    }

    /// RESOLUTION attribute value for the master manifest.
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// BANDWIDTH attribute value: the bitrate string as bits per second
    /// ("800k" -> 800_000).
    pub fn bandwidth_bps(&self) -> u64 {
        self.bitrate
            .trim_end_matches('k')
            .parse::<u64>()
            .unwrap_or(0)
            * 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_is_ordered_low_to_high() {
        let heights: Vec<u32> = LADDER.iter().map(|r| r.height).collect();
        assert_eq!(heights, vec![360, 720, 1080]);
    }

    #[test]
    fn baseline_is_the_mid_tier() {
        let baseline: Vec<&str> = LADDER
            .iter()
            .filter(|r| r.is_baseline())
            .map(|r| r.name)
            .collect();
        assert_eq!(baseline, vec!["720p"]);
    }

    #[test]
    fn bandwidth_is_bitrate_string_times_1000() {
        assert_eq!(LADDER[0].bandwidth_bps(), 800_000);
        assert_eq!(LADDER[1].bandwidth_bps(), 2_800_000);
        assert_eq!(LADDER[2].bandwidth_bps(), 5_000_000);
    }

    #[test]
    fn resolutions_match_tier_widths() {
        assert_eq!(LADDER[0].resolution(), "640x360");
        assert_eq!(LADDER[1].resolution(), "1280x720");
        assert_eq!(LADDER[2].resolution(), "1920x1080");
    }
}
