//! Retry supervision for transcoding jobs
//!
//! Wraps a job run with a bounded attempt count, a fixed inter-attempt
//! delay and an overall deadline, decoupled from the job's own logic.
//! Partial artifacts are removed only on final, exhausted failure so
//! transient issues stay diagnosable.
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


use coursecast_store::AssetStore;
use coursecast_types::{PipelineError, PipelineResult, VideoStatus};
use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::job::TranscodeJob;

/// Retry policy for one supervised transcode.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
    /// Overall wall-clock budget across all attempts.
    pub deadline: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(30),
            deadline: Duration::from_secs(8 * 3600),
        }
    }
}

impl From<&coursecast_config::RetryConfig> for RetryPolicy {
    fn from(config: &coursecast_config::RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: Duration::from_secs(config.delay_secs),
            deadline: Duration::from_secs(config.deadline_secs),
        }
    }
}

/// Run a job under the retry policy.
///
/// Every error kind consumes retry budget, environment errors included;
/// they are unlikely to self-heal but stay bounded by the same
/// attempt/deadline policy. On exhaustion the asset's partial artifacts
/// are removed and a final `Failed` status is written.
pub async fn run_supervised(
    job: &TranscodeJob,
    assets: &Arc<dyn AssetStore>,
    policy: &RetryPolicy,
    asset_id: Uuid,
) -> PipelineResult<()> {
    let started = Instant::now();
    let mut last_error: Option<PipelineError> = None;
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match job.run(asset_id).await {
            Ok(()) => {
                if attempt > 1 {
                    debug!(
                        asset_id = %asset_id,
                        attempt,
                        "Transcoding succeeded after retry"
                    );
                }
                return Ok(());
            }
            Err(err) => {
                warn!(
                    asset_id = %asset_id,
                    attempt,
                    max_attempts,
                    environment = err.is_environment(),
                    error = %err,
                    "Transcoding attempt failed"
                );
                last_error = Some(err);

                let out_of_attempts = attempt >= max_attempts;
                let out_of_time = started.elapsed() + policy.delay >= policy.deadline;
                if out_of_attempts || out_of_time {
                    if out_of_time && !out_of_attempts {
                        warn!(asset_id = %asset_id, "Retry deadline exceeded");
                    }
                    break;
                }
                sleep(policy.delay).await;
            }
        }
    }

    let err = last_error.unwrap_or_else(|| PipelineError::EncodeFailed {
        diagnostics: "retry loop ended without an attempt".to_string(),
    });
    finalize_failure(assets, asset_id).await;
    Err(err)
}

/// Terminal cleanup after the retry budget is spent: remove the output
/// directory and write the final `Failed` status.
async fn finalize_failure(assets: &Arc<dyn AssetStore>, asset_id: Uuid) {
    match assets.load(asset_id).await {
        Ok(Some(mut asset)) => {
            if asset.output_dir.exists() {
                if let Err(err) = fs::remove_dir_all(&asset.output_dir) {
                    warn!(
                        asset_id = %asset_id,
                        error = %err,
                        "Could not clean up output directory"
                    );
                }
            }
            asset.status = VideoStatus::Failed;
            if let Err(err) = assets.update(&asset).await {
                error!(
                    asset_id = %asset_id,
                    error = %err,
                    "Could not persist terminal failed status"
                );
            }
        }
        Ok(None) => {
            debug!(asset_id = %asset_id, "No asset to clean up after failure");
        }
        Err(err) => {
            error!(
                asset_id = %asset_id,
                error = %err,
                "Could not reload asset during failure cleanup"
            );
        }
    }
}
