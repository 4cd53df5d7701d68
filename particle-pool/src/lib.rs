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
//! # Particle Pool
//!
//! An elastic, partitioned worker pool for simulating large populations of
//! independent bouncing particles.
//!
//! Particles are split across partitions. Each cycle every partition is
//! advanced by one pool worker. As the population grows and cycle latency
//! trends up, the manager adds partitions (up to the hardware thread count)
//! and moves a fair share of particles into each new one.
//!
//! ## Features
//!
//! - **Ownership-transfer dispatch**: partitions travel by value to workers
//!   and back, so advancing and rebalancing never overlap
//! - **Latency-driven growth**: rolling window of cycle averages
//! - **Bulk generators**: uniform distance, angle and velocity sweeps
//! - **Snapshot broadcaster** (`net` feature): TCP line protocol with
//!   peer-controlled explorers
//! - **Parallelization** (`parallel` feature): Rayon thread pool; without it
//!   advances run inline
//!
//! ## Example
//!
//! ```rust
//! use particle_pool::{Canvas, GrowthPolicy, PartitionManager};
//!
//! let mut manager = PartitionManager::new(GrowthPolicy::new(4)).unwrap();
//! manager.initialize(Canvas::new(1280.0, 720.0));
//! manager
//!     .uniform_angle(36, (640.0, 360.0), 0.0, std::f64::consts::TAU, 3.0)
//!     .unwrap();
//!
//! for _ in 0..10 {
//!     manager.record_cycle_sample();
//!     manager.check_and_adjust();
//!     manager.submit_cycle();
//! }
//! assert_eq!(manager.particles().len(), 36);
//! ```

#![warn(missing_docs)]

/// Configuration loading and validation
pub mod config;

/// Error types
pub mod error;

/// Peer-controlled explorer avatars
pub mod explorer;

/// Bulk particle generators
pub mod generators;

/// Rolling latency window
pub mod history;

/// Partition manager
pub mod manager;

/// Particles and the canvas they bounce in
pub mod particle;

/// Partitions of particles
pub mod partition;

/// Worker thread pool
pub mod pool;

/// Snapshot wire protocol
pub mod protocol;

/// TCP snapshot broadcaster
#[cfg(feature = "net")]
pub mod server;

/// Frame driver
pub mod simulation;

/// Render viewport
pub mod view;

pub use config::SimulationConfig;
pub use error::{Result, SimError};
pub use explorer::{Explorer, ExplorerId};
pub use generators::{BatchRequest, MAX_BATCH};
pub use manager::{GrowthPolicy, ManagerStats, PartitionManager, RunState};
pub use particle::{Canvas, Particle, ParticleId, ParticleSpec};
pub use partition::{Partition, PartitionId};
pub use pool::{PoolConfig, WorkerPool};
pub use protocol::{DeltaEncoder, PeerCommand, WireRecord, WorldSnapshot};
#[cfg(feature = "net")]
pub use server::BroadcastServer;
pub use simulation::{PeerEvent, SimulationDriver};
pub use view::Viewport;
