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
//! Simulation configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so an empty
//! file (or no file) yields a working configuration:
//!
//! ```toml
//! [canvas]
//! width = 1280.0
//! height = 720.0
//! particle_radius = 0.0
//!
//! [pool]
//! # max_partitions = 8        # defaults to the hardware thread count
//! thread_name_prefix = "partition-worker"
//!
//! [growth]
//! growth_factor = 1.10
//! history_capacity = 20
//! monitor_interval_ms = 500
//!
//! [frame]
//! target_fps = 60
//!
//! [network]
//! enabled = false
//! bind = "0.0.0.0:12345"
//! broadcast_interval_ms = 10
//! explorer_spawn = [640.0, 360.0]
//! ```

use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::manager::{GrowthPolicy, DEFAULT_GROWTH_FACTOR};
use crate::particle::Canvas;
use crate::pool::{hardware_concurrency, PoolConfig};
use crate::{Result, SimError};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Canvas section
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    /// Canvas width
    pub width: f64,
    /// Canvas height
    pub height: f64,
    /// Particle half-size used as reflection margin
    pub particle_radius: f64,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        CanvasConfig { width: 1280.0, height: 720.0, particle_radius: 0.0 }
    }
}

/// Worker pool section
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PoolSection {
    /// Partition ceiling; `None` uses the hardware thread count
    pub max_partitions: Option<usize>,
    /// Prewarm task count; `None` uses the ceiling
    pub prewarm_tasks: Option<usize>,
    /// Worker thread name prefix
    pub thread_name_prefix: String,
}

impl Default for PoolSection {
    fn default() -> Self {
        PoolSection {
            max_partitions: None,
            prewarm_tasks: None,
            thread_name_prefix: "partition-worker".to_string(),
        }
    }
}

/// Growth heuristic section
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GrowthSection {
    /// Particle growth factor required between partition additions
    pub growth_factor: f64,
    /// Rolling latency window capacity
    pub history_capacity: usize,
    /// Interval between growth checks
    pub monitor_interval_ms: u64,
}

impl Default for GrowthSection {
    fn default() -> Self {
        GrowthSection {
            growth_factor: DEFAULT_GROWTH_FACTOR,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            monitor_interval_ms: 500,
        }
    }
}

/// Frame loop section
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FrameSection {
    /// Frames per second the driver aims for
    pub target_fps: u32,
}

impl Default for FrameSection {
    fn default() -> Self {
        FrameSection { target_fps: 60 }
    }
}

/// Snapshot broadcaster section
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NetworkSection {
    /// Whether the broadcaster is started
    pub enabled: bool,
    /// Listen address
    pub bind: String,
    /// Interval between delta broadcasts
    pub broadcast_interval_ms: u64,
    /// Where new explorers appear
    pub explorer_spawn: (f64, f64),
}

impl Default for NetworkSection {
    fn default() -> Self {
        NetworkSection {
            enabled: false,
            bind: "0.0.0.0:12345".to_string(),
            broadcast_interval_ms: 10,
            explorer_spawn: (640.0, 360.0),
        }
    }
}

/// Complete simulation configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Canvas settings
    pub canvas: CanvasConfig,
    /// Worker pool settings
    pub pool: PoolSection,
    /// Growth heuristic settings
    pub growth: GrowthSection,
    /// Frame loop settings
    pub frame: FrameSection,
    /// Broadcaster settings
    pub network: NetworkSection,
}

impl SimulationConfig {
    /// Parse and validate a TOML document
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not parse or fails validation.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] describing the first bad value.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(SimError::InvalidConfig(msg.to_string()));
        let c = &self.canvas;
        if !(c.width.is_finite() && c.height.is_finite() && c.width > 0.0 && c.height > 0.0) {
            return invalid("canvas dimensions must be positive and finite");
        }
        if !(c.particle_radius.is_finite()
            && c.particle_radius >= 0.0
            && 2.0 * c.particle_radius <= c.width.min(c.height))
        {
            return invalid("particle_radius must be non-negative and fit inside the canvas");
        }
        if self.pool.max_partitions == Some(0) {
            return invalid("max_partitions must be at least 1");
        }
        if !(self.growth.growth_factor.is_finite() && self.growth.growth_factor >= 1.0) {
            return invalid("growth_factor must be >= 1.0");
        }
        if self.growth.history_capacity == 0 {
            return invalid("history_capacity must be positive");
        }
        if self.frame.target_fps == 0 {
            return invalid("target_fps must be positive");
        }
        if self.network.broadcast_interval_ms == 0 {
            return invalid("broadcast_interval_ms must be positive");
        }
        Ok(())
    }

    /// Canvas described by the configuration
    pub fn canvas(&self) -> Canvas {
        Canvas::new(self.canvas.width, self.canvas.height).with_margin(self.canvas.particle_radius)
    }

    /// Partition ceiling after applying the hardware default
    pub fn max_partitions(&self) -> usize {
        self.pool.max_partitions.unwrap_or_else(hardware_concurrency)
    }

    /// Growth policy described by the configuration
    pub fn growth_policy(&self) -> GrowthPolicy {
        GrowthPolicy::new(self.max_partitions())
            .with_growth_factor(self.growth.growth_factor)
            .with_history_capacity(self.growth.history_capacity)
    }

    /// Pool configuration described by the configuration
    pub fn pool_config(&self) -> PoolConfig {
        let threads = self.max_partitions();
        PoolConfig::new(threads)
            .with_prewarm_tasks(self.pool.prewarm_tasks.unwrap_or(threads))
            .with_thread_name_prefix(self.pool.thread_name_prefix.clone())
    }

    /// Time budget of one frame
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.frame.target_fps))
    }

    /// Interval between growth checks
    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.growth.monitor_interval_ms)
    }

    /// Interval between delta broadcasts
    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.network.broadcast_interval_ms)
    }
}
