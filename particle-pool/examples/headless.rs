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
//! Headless run that keeps adding particles and shows the pool growing
//!
//! Run with `RUST_LOG=particle_pool=info cargo run --features cli --example headless`.

use particle_pool::{BatchRequest, SimulationConfig, SimulationDriver, Viewport};
use std::time::Duration;

fn main() -> particle_pool::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let config = SimulationConfig::from_toml_str(
        r#"
        [growth]
        monitor_interval_ms = 100

        [frame]
        target_fps = 120
        "#,
    )?;
    let mut driver = SimulationDriver::from_config(&config)?;

    println!("=== Particle Pool Headless Demo ===");
    println!(
        "Canvas: {}x{}, partition ceiling: {}\n",
        config.canvas.width,
        config.canvas.height,
        driver.manager().policy().max_partitions
    );

    let wave: BatchRequest = "angle:5000,640,360,0,359.9,3".parse()?;
    for second in 0..5 {
        driver.manager_mut().spawn_batch(&wave)?;
        driver.run(Some(120));

        let stats = driver.manager().stats();
        println!(
            "t={}s particles={:>6} partitions={} latency={:?} reference={:?}",
            second + 1,
            stats.particles,
            stats.partitions,
            stats.latest_latency.unwrap_or(Duration::ZERO),
            stats.reference_latency
        );
    }

    let centre = Viewport::centered(640.0, 360.0, 200.0, 200.0);
    let visible = driver.manager_mut().particles_in_view(&centre).len();
    println!("\nParticles in the 200x200 centre view: {}", visible);
    println!("Partition sizes: {:?}", driver.manager_mut().partition_sizes());

    Ok(())
}
