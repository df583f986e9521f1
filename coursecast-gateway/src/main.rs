//! Coursecast Gateway service
//!
//! Single-process deployment: the delivery gateway plus an in-process
//! dispatch lane that runs supervised transcoding jobs on the same
//! runtime. Store collaborators are the in-memory implementations; a
//! multi-node deployment swaps them for shared backends.
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


use anyhow::Result;
use async_trait::async_trait;
use coursecast_config::AppConfig;
use coursecast_gateway::{gateway_router, GatewayState, TokenService};
use coursecast_logging::init_console_logging;
use coursecast_pipeline::{run_supervised, FfmpegEncoder, RetryPolicy, TranscodeJob};
use coursecast_store::{
    AssetStore, EphemeralStore, JobDispatcher, MemoryAssetStore, MemoryEphemeralStore, StoreResult,
};
use coursecast_types::TranscodeRequest;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

/// Runs supervised jobs on the local runtime. De-duplication of dispatches
/// per asset happens at the HTTP layer before this is called.
struct LocalDispatcher {
    job: Arc<TranscodeJob>,
    assets: Arc<dyn AssetStore>,
    policy: RetryPolicy,
}

#[async_trait]
impl JobDispatcher for LocalDispatcher {
    async fn dispatch(&self, request: TranscodeRequest) -> StoreResult<()> {
        let job = self.job.clone();
        let assets = self.assets.clone();
        let policy = self.policy.clone();
        tokio::spawn(async move {
            if let Err(err) = run_supervised(&job, &assets, &policy, request.asset_id).await {
                error!(
                    asset_id = %request.asset_id,
                    error = %err,
                    "Background transcode gave up"
                );
            }
        });
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first so the log level applies from the start.
    let config = AppConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
    init_console_logging("coursecast-gateway", config.log_level());

    info!(
        media_root = %config.media_root.display(),
        gateway_addr = %config.gateway_addr,
        "Starting Coursecast gateway"
    );

    let assets: Arc<dyn AssetStore> = Arc::new(MemoryAssetStore::new());
    let cache: Arc<dyn EphemeralStore> = Arc::new(MemoryEphemeralStore::new());

    let encoder = Arc::new(FfmpegEncoder::new(config.encoder.clone()));
    let job = Arc::new(TranscodeJob::new(assets.clone(), cache.clone(), encoder));

    let dispatcher = Arc::new(LocalDispatcher {
        job: job.clone(),
        assets: assets.clone(),
        policy: RetryPolicy::from(&config.retry),
    });

    let state = Arc::new(GatewayState {
        assets,
        cache: cache.clone(),
        dispatcher,
        job,
        tokens: TokenService::new(&config.tokens, cache),
        segment_seconds: config.encoder.segment_seconds,
    });

    let app = gateway_router(state);
    let listener = TcpListener::bind(&config.gateway_addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", config.gateway_addr, e))?;

    info!(addr = %config.gateway_addr, "Gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Gateway server error: {}", e))?;

    info!("Gateway shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
