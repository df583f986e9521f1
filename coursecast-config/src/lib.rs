//! Configuration management for Coursecast services

use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// External encoder configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EncoderConfig {
    /// Encoder binary, resolved through `PATH` unless absolute.
    pub ffmpeg_path: String,
    /// Probe binary used for duration extraction.
    pub ffprobe_path: String,
    /// Target duration of one HLS segment, in seconds.
    pub segment_seconds: u32,
    /// Wall-clock ceiling for a single rendition encode. Sized for
    /// multi-hour source material.
    pub encode_timeout_secs: u64,
    /// Short ceiling for the availability probe.
    pub probe_timeout_secs: u64,
}

/// Retry policy knobs for the transcoding supervisor.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Fixed delay between attempts, in seconds.
    pub delay_secs: u64,
    /// Overall deadline across all attempts, in seconds.
    pub deadline_secs: u64,
}

/// Capability token configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    /// Server-held application secret used for key-token signatures.
    pub secret: String,
    /// Validity window of a segment token, in seconds.
    pub segment_ttl_secs: u64,
    /// Validity window of a key token, in seconds.
    pub key_ttl_secs: u64,
}

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Root directory under which each asset gets its output directory.
    pub media_root: PathBuf,
    pub encoder: EncoderConfig,
    pub retry: RetryConfig,
    pub tokens: TokenConfig,
    /// Bind address of the delivery gateway.
    pub gateway_addr: String,
    pub log_level: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let media_root = env::var("MEDIA_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/var/lib/coursecast/media"));

        let secret = env::var("APP_SECRET").map_err(|_| {
            config::ConfigError::NotFound("APP_SECRET".to_string())
        })?;

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            media_root,
            encoder: EncoderConfig {
                ffmpeg_path: env::var("FFMPEG_PATH")
                    .unwrap_or_else(|_| "ffmpeg".to_string()),
                ffprobe_path: env::var("FFPROBE_PATH")
                    .unwrap_or_else(|_| "ffprobe".to_string()),
                segment_seconds: env_parse("SEGMENT_SECONDS", 6),
                encode_timeout_secs: env_parse("ENCODE_TIMEOUT_SECS", 6 * 3600),
                probe_timeout_secs: env_parse("PROBE_TIMEOUT_SECS", 10),
            },
            retry: RetryConfig {
                max_attempts: env_parse("TRANSCODE_MAX_ATTEMPTS", 3),
                delay_secs: env_parse("TRANSCODE_RETRY_DELAY_SECS", 30),
                deadline_secs: env_parse("TRANSCODE_DEADLINE_SECS", 8 * 3600),
            },
            tokens: TokenConfig {
                secret,
                segment_ttl_secs: env_parse("SEGMENT_TOKEN_TTL_SECS", 300),
                key_ttl_secs: env_parse("KEY_TOKEN_TTL_SECS", 300),
            },
            gateway_addr: env::var("GATEWAY_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            log_level: Some(log_level),
        })
    }

    /// Get log level, defaulting to "info"
    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    /// Output directory for one asset. Takes anything displayable so this
    /// crate does not need a uuid dependency.
    pub fn output_dir(&self, asset_id: impl std::fmt::Display) -> PathBuf {
        self.media_root.join(asset_id.to_string())
    }
}


fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
