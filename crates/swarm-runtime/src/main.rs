//! Hive-Swarm node entry point.
//!
//! Configuration comes from the environment:
//!
//! - `HS_CONFIG`: path to a JSON swarm configuration (optional; defaults
//!   apply when unset).
//! - `HS_LOG_LEVEL` / `HS_LOG_FORMAT`: see `swarm-telemetry`.

use anyhow::Context;
use shared_types::SwarmConfig;
use swarm_runtime::SwarmRuntime;
use swarm_telemetry::{init_telemetry, TelemetryConfig};
use tracing::info;

fn load_config() -> anyhow::Result<SwarmConfig> {
    match std::env::var("HS_CONFIG") {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading swarm config {path}"))?;
            SwarmConfig::from_json(&raw).with_context(|| format!("parsing swarm config {path}"))
        }
        Err(_) => Ok(SwarmConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_telemetry(&TelemetryConfig::from_env()).context("initializing telemetry")?;

    let config = load_config()?;
    let runtime = SwarmRuntime::new(config)?;
    runtime.initialize().await?;

    info!(queen = %runtime.queen_id(), "Hive-Swarm node running; Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;

    runtime.shutdown().await;
    Ok(())
}
