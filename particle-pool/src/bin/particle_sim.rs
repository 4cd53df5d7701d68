// Copyright 2025 John Brosnihan
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
//! Headless particle simulation with an optional TCP snapshot broadcaster.
//!
//! Built with the `cli` feature: `cargo run --features cli --bin particle-sim`.
//!
//! ```text
//! particle-sim --spawn angle:360,640,360,0,359,3 --frames 600
//! particle-sim --config sim.toml --serve
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use particle_pool::{
    BatchRequest, BroadcastServer, SimulationConfig, SimulationDriver, WorldSnapshot,
};
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "particle-sim",
    version,
    about = "Run a partitioned bouncing-particle simulation"
)]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop after this many frames; runs until killed when omitted.
    #[arg(long)]
    frames: Option<u64>,

    /// Override the canvas width.
    #[arg(long)]
    width: Option<f64>,

    /// Override the canvas height.
    #[arg(long)]
    height: Option<f64>,

    /// Override the partition ceiling.
    #[arg(long)]
    max_partitions: Option<usize>,

    /// Batch to create before the first frame, e.g. `distance:5,0,0,100,0,45,2`.
    /// Angles are in degrees. May be repeated.
    #[arg(long = "spawn", value_name = "REQUEST")]
    spawns: Vec<String>,

    /// Start the snapshot broadcaster.
    #[arg(long)]
    serve: bool,

    /// Broadcaster listen address.
    #[arg(long)]
    bind: Option<String>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn load_config(cli: &Cli) -> Result<SimulationConfig> {
    let mut config = match &cli.config {
        Some(path) => SimulationConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => SimulationConfig::default(),
    };
    if let Some(width) = cli.width {
        config.canvas.width = width;
    }
    if let Some(height) = cli.height {
        config.canvas.height = height;
    }
    if let Some(max) = cli.max_partitions {
        config.pool.max_partitions = Some(max);
    }
    if cli.serve {
        config.network.enabled = true;
    }
    if let Some(bind) = &cli.bind {
        config.network.bind = bind.clone();
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let mut driver =
        SimulationDriver::from_config(&config).context("failed to start the simulation")?;

    for text in &cli.spawns {
        let request: BatchRequest =
            text.parse().with_context(|| format!("bad --spawn request `{text}`"))?;
        let ids = driver.manager_mut().spawn_batch(&request)?;
        info!(request = %text, created = ids.len(), "batch spawned");
    }

    // keeps the broadcaster's worker threads alive for the whole run
    let mut _runtime = None;
    if config.network.enabled {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("broadcaster")
            .build()
            .context("failed to build the network runtime")?;

        let (snapshot_tx, snapshot_rx) = watch::channel(WorldSnapshot::default());
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let server = runtime
            .block_on(BroadcastServer::bind(
                &config.network.bind,
                config.broadcast_interval(),
                snapshot_rx,
                event_tx,
            ))
            .with_context(|| format!("failed to bind {}", config.network.bind))?;
        info!(addr = %server.local_addr()?, "serving snapshots");
        runtime.spawn(async move {
            if let Err(e) = server.run().await {
                error!(error = %e, "broadcaster stopped");
            }
        });

        driver = driver.with_events(event_rx).with_sink(Box::new(snapshot_tx));
        _runtime = Some(runtime);
    }

    let frames = driver.run(cli.frames);
    let stats = driver.manager().stats();
    info!(
        frames,
        particles = stats.particles,
        partitions = stats.partitions,
        cycles = stats.cycles_submitted,
        watermark = stats.watermark,
        "simulation finished"
    );
    Ok(())
}
