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
//! Partition manager: placement, cycle dispatch, growth and rebalancing
//!
//! The manager is the single owner of every partition. A cycle moves each
//! partition by value into a pool task; the task advances it and sends it
//! back over a channel. While a partition is away its slot is empty, so the
//! manager physically cannot touch it.
//!
//! Every operation that reads or changes membership (adding particles,
//! growth, clearing, resizing, enumeration) first waits for outstanding
//! partitions to return. Dispatching advances and adjusting the topology are
//! therefore two mutually exclusive phases, both driven by whoever owns the
//! manager.
//!
//! # Growth heuristic
//!
//! A new partition is added when all of these hold:
//!
//! - the latest cycle average is above the rolling window mean
//! - the particle count reached `growth_factor` times the count recorded at
//!   the previous growth
//! - the partition count is below the concurrency ceiling
//!
//! # Examples
//!
//! ```
//! use particle_pool::{Canvas, GrowthPolicy, PartitionManager, ParticleSpec};
//!
//! let mut manager = PartitionManager::new(GrowthPolicy::new(2)).unwrap();
//! manager.initialize(Canvas::new(640.0, 480.0));
//! manager.add_particle(ParticleSpec::new(10.0, 10.0, 1.0, 1.0));
//! manager.submit_cycle();
//! manager.record_cycle_sample();
//! assert_eq!(manager.particles()[0].x(), 11.0);
//! ```

use crate::history::{LatencyHistory, DEFAULT_HISTORY_CAPACITY};
use crate::particle::{Canvas, Particle, ParticleId, ParticleSpec};
use crate::partition::{Partition, PartitionId};
use crate::pool::{hardware_concurrency, PoolConfig, PoolStats, WorkerPool};
use crate::view::Viewport;
use crate::{Result, SimError};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::time::Duration;
use tracing::{debug, info};

/// Default particle growth required between two partition additions
pub const DEFAULT_GROWTH_FACTOR: f64 = 1.10;

/// Whether submitted cycles are dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Cycles are dispatched
    Active,
    /// Cycle submissions are skipped; particles keep their last state
    Paused,
}

/// Tunable thresholds of the growth heuristic
#[derive(Debug, Clone, PartialEq)]
pub struct GrowthPolicy {
    /// Factor the particle count must reach relative to the last growth
    pub growth_factor: f64,
    /// Ceiling on the number of partitions
    pub max_partitions: usize,
    /// Capacity of the rolling latency window
    pub history_capacity: usize,
}

impl GrowthPolicy {
    /// Policy with default thresholds and the given partition ceiling
    ///
    /// # Panics
    ///
    /// Panics if `max_partitions` is zero
    pub fn new(max_partitions: usize) -> Self {
        assert!(max_partitions > 0, "Partition ceiling must be at least 1");
        GrowthPolicy {
            growth_factor: DEFAULT_GROWTH_FACTOR,
            max_partitions,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }

    /// Set the growth factor
    ///
    /// # Panics
    ///
    /// Panics if the factor is below 1.0 or not finite
    pub fn with_growth_factor(mut self, factor: f64) -> Self {
        assert!(factor.is_finite() && factor >= 1.0, "Growth factor must be >= 1.0");
        self.growth_factor = factor;
        self
    }

    /// Set the latency window capacity
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }
}

impl Default for GrowthPolicy {
    fn default() -> Self {
        GrowthPolicy::new(hardware_concurrency())
    }
}

/// Point-in-time summary of the manager
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerStats {
    /// Number of partitions
    pub partitions: usize,
    /// Number of particles
    pub particles: usize,
    /// Cycles dispatched so far
    pub cycles_submitted: u64,
    /// Cycles whose timing was recorded
    pub cycles_sampled: u64,
    /// Latest per-cycle average advance time
    pub latest_latency: Option<Duration>,
    /// Rolling window mean
    pub reference_latency: Duration,
    /// Particle count at the last growth
    pub watermark: usize,
    /// Run state
    pub state: RunState,
}

/// Owner of the partitions and the worker pool advancing them
pub struct PartitionManager {
    policy: GrowthPolicy,
    pool: WorkerPool,
    canvas: Option<Canvas>,
    slots: Vec<Option<Partition>>,
    in_flight: usize,
    returned_tx: Sender<Partition>,
    returned_rx: Receiver<Partition>,
    particle_count: usize,
    next_particle_id: u64,
    history: LatencyHistory,
    watermark: usize,
    state: RunState,
    cycles_submitted: u64,
    cycles_sampled: u64,
    unsampled: bool,
}

impl PartitionManager {
    /// Create a manager whose pool has one thread per allowed partition
    ///
    /// # Errors
    ///
    /// Returns an error if the worker pool cannot be built.
    pub fn new(policy: GrowthPolicy) -> Result<Self> {
        let pool_config = PoolConfig::new(policy.max_partitions);
        Self::with_pool_config(policy, pool_config)
    }

    /// Create a manager with an explicit pool configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the policy is inconsistent or the worker pool
    /// cannot be built.
    pub fn with_pool_config(policy: GrowthPolicy, pool_config: PoolConfig) -> Result<Self> {
        if policy.history_capacity == 0 {
            return Err(SimError::InvalidConfig(
                "history capacity must be positive".to_string(),
            ));
        }
        let pool = WorkerPool::new(pool_config)?;
        let (returned_tx, returned_rx) = unbounded();
        Ok(PartitionManager {
            history: LatencyHistory::new(policy.history_capacity),
            policy,
            pool,
            canvas: None,
            slots: Vec::new(),
            in_flight: 0,
            returned_tx,
            returned_rx,
            particle_count: 0,
            next_particle_id: 0,
            watermark: 0,
            state: RunState::Active,
            cycles_submitted: 0,
            cycles_sampled: 0,
            unsampled: false,
        })
    }

    /// Create the first partition and prewarm the worker pool
    ///
    /// Must be called once before any particle is added.
    ///
    /// # Panics
    ///
    /// Panics if the manager is already initialized
    pub fn initialize(&mut self, canvas: Canvas) {
        assert!(self.canvas.is_none(), "PartitionManager is already initialized");
        self.canvas = Some(canvas);
        self.pool.prewarm();
        self.slots.push(Some(Partition::new(PartitionId::new(0), canvas)));
        info!(
            width = canvas.width(),
            height = canvas.height(),
            ceiling = self.policy.max_partitions,
            "partition manager initialized"
        );
    }

    fn require_initialized(&self) -> Canvas {
        match self.canvas {
            Some(canvas) => canvas,
            None => panic!("PartitionManager must be initialized before use"),
        }
    }

    fn home_mut(&mut self, index: usize) -> &mut Partition {
        match self.slots[index].as_mut() {
            Some(partition) => partition,
            None => unreachable!("partition {} used while advancing", index),
        }
    }

    fn home(&self) -> impl Iterator<Item = &Partition> {
        self.slots.iter().flatten()
    }

    /// Index of the partition owning the fewest particles
    ///
    /// Linear scan; the partition count is bounded by the concurrency
    /// ceiling. Ties go to the earliest created partition.
    fn least_loaded(&self) -> usize {
        match self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|p| (i, p.size())))
            .min_by_key(|&(_, size)| size)
        {
            Some((index, _)) => index,
            None => panic!("PartitionManager must be initialized before use"),
        }
    }

    /// Add one particle to the least loaded partition
    ///
    /// Waits for an in-flight cycle before touching any partition.
    ///
    /// # Panics
    ///
    /// Panics if the manager has not been initialized or any spec field is
    /// NaN or infinite
    pub fn add_particle(&mut self, spec: ParticleSpec) -> ParticleId {
        self.require_initialized();
        assert!(spec.is_valid(), "Particle spec must be finite");
        self.wait_for_cycle();

        let index = self.least_loaded();
        let id = ParticleId::new(self.next_particle_id);
        self.next_particle_id += 1;
        self.particle_count += 1;
        self.home_mut(index).add(Particle::from_spec(id, spec));
        id
    }

    /// Add a batch of particles, all or nothing
    ///
    /// # Errors
    ///
    /// Returns an error without adding anything if the batch is empty or
    /// any spec holds a non-finite value.
    pub fn add_batch(&mut self, specs: &[ParticleSpec]) -> Result<Vec<ParticleId>> {
        if specs.is_empty() {
            return Err(SimError::EmptyBatch);
        }
        for spec in specs {
            check_finite("x", spec.x)?;
            check_finite("y", spec.y)?;
            check_finite("vx", spec.vx)?;
            check_finite("vy", spec.vy)?;
        }
        let ids: Vec<ParticleId> = specs.iter().map(|spec| self.add_particle(*spec)).collect();
        debug!(added = ids.len(), total = self.particle_count, "batch added");
        Ok(ids)
    }

    /// Dispatch one advance per partition without waiting for them
    ///
    /// A previous cycle still in flight is waited for first. Returns whether
    /// a cycle was dispatched; paused managers skip the submission.
    ///
    /// # Panics
    ///
    /// Panics if the manager has not been initialized
    pub fn submit_cycle(&mut self) -> bool {
        self.require_initialized();
        if self.state == RunState::Paused {
            return false;
        }
        self.wait_for_cycle();

        for slot in &mut self.slots {
            if let Some(mut partition) = slot.take() {
                let returned = self.returned_tx.clone();
                self.pool.spawn(move || {
                    partition.advance();
                    // The manager keeps its own sender and receiver alive,
                    // so a failed send only happens while it is dropped.
                    let _ = returned.send(partition);
                });
                self.in_flight += 1;
            }
        }
        self.cycles_submitted += 1;
        self.unsampled = true;
        true
    }

    /// Block until every dispatched partition has been returned
    pub fn wait_for_cycle(&mut self) {
        while self.in_flight > 0 {
            let partition = match self.returned_rx.recv() {
                Ok(partition) => partition,
                Err(_) => unreachable!("manager holds a sender for returned partitions"),
            };
            let index = partition.id().index();
            self.slots[index] = Some(partition);
            self.in_flight -= 1;
        }
    }

    /// Whether partitions are currently out with workers
    pub fn is_cycle_in_flight(&self) -> bool {
        self.in_flight > 0
    }

    /// Record the average advance time of the last completed cycle
    ///
    /// Waits for the in-flight cycle. Returns `None` when no cycle completed
    /// since the previous sample.
    pub fn record_cycle_sample(&mut self) -> Option<Duration> {
        self.wait_for_cycle();
        if !self.unsampled || self.slots.is_empty() {
            return None;
        }
        self.unsampled = false;

        let total: Duration = self.home().map(Partition::last_duration).sum();
        let average = total / self.slots.len() as u32;
        self.history.record(average);
        self.cycles_sampled += 1;
        debug!(
            cycle = self.cycles_submitted,
            average_us = average.as_micros() as u64,
            reference_us = self.history.reference_average().as_micros() as u64,
            "cycle sampled"
        );
        Some(average)
    }

    /// Evaluate the growth heuristic
    pub fn should_grow(&self) -> bool {
        let trending_up = self.history.is_trending_up();
        let grown_enough =
            self.particle_count as f64 >= self.watermark as f64 * self.policy.growth_factor;
        let below_ceiling = self.slots.len() < self.policy.max_partitions;
        trending_up && grown_enough && below_ceiling
    }

    /// Add a partition and move a fair share of particles into it
    ///
    /// Each existing partition donates `size / (partitions + 1)` of its
    /// earliest-added particles. The total particle count is unchanged and
    /// the watermark is set to it. Returns `None` when the partition
    /// ceiling has been reached.
    ///
    /// # Panics
    ///
    /// Panics if the manager has not been initialized
    pub fn grow_and_rebalance(&mut self) -> Option<PartitionId> {
        let canvas = self.require_initialized();
        self.wait_for_cycle();

        let before = self.slots.len();
        if before >= self.policy.max_partitions {
            debug!(partitions = before, "partition ceiling reached, growth skipped");
            return None;
        }

        let mut donated = Vec::new();
        for partition in self.slots.iter_mut().flatten() {
            let share = partition.size() / (before + 1);
            donated.extend(partition.donate(share));
        }

        let moved = donated.len();
        let id = PartitionId::new(before);
        self.slots.push(Some(Partition::with_particles(id, canvas, donated)));
        self.watermark = self.particle_count;
        info!(
            partition = id.index(),
            partitions = before + 1,
            moved,
            particles = self.particle_count,
            "partition added and rebalanced"
        );
        Some(id)
    }

    /// Grow if the heuristic says so
    pub fn check_and_adjust(&mut self) -> Option<PartitionId> {
        if self.should_grow() {
            self.grow_and_rebalance()
        } else {
            None
        }
    }

    /// Remove every particle, keeping the partitions
    pub fn clear_all(&mut self) {
        self.wait_for_cycle();
        for partition in self.slots.iter_mut().flatten() {
            partition.clear();
        }
        let removed = self.particle_count;
        self.particle_count = 0;
        info!(removed, partitions = self.slots.len(), "particles cleared");
    }

    /// Change the canvas of every partition
    ///
    /// # Panics
    ///
    /// Panics if the manager has not been initialized
    pub fn resize(&mut self, canvas: Canvas) {
        self.require_initialized();
        self.wait_for_cycle();
        self.canvas = Some(canvas);
        for partition in self.slots.iter_mut().flatten() {
            partition.set_canvas(canvas);
        }
        debug!(width = canvas.width(), height = canvas.height(), "canvas resized");
    }

    /// Stop dispatching cycles
    pub fn pause(&mut self) {
        self.state = RunState::Paused;
    }

    /// Resume dispatching and submit a cycle right away
    ///
    /// Returns whether a cycle was dispatched.
    pub fn resume(&mut self) -> bool {
        self.state = RunState::Active;
        if self.canvas.is_some() {
            self.submit_cycle()
        } else {
            false
        }
    }

    /// Current run state
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Whether submissions are being skipped
    pub fn is_paused(&self) -> bool {
        self.state == RunState::Paused
    }

    /// Copy of every particle, partition by partition
    pub fn particles(&mut self) -> Vec<Particle> {
        self.wait_for_cycle();
        self.home().flat_map(|p| p.particles().iter().copied()).collect()
    }

    /// Copy of the particles whose position lies inside `viewport`
    pub fn particles_in_view(&mut self, viewport: &Viewport) -> Vec<Particle> {
        self.wait_for_cycle();
        self.home()
            .flat_map(|p| p.particles().iter())
            .filter(|particle| viewport.contains(particle))
            .copied()
            .collect()
    }

    /// Visit every particle without copying
    pub fn for_each_particle<F: FnMut(&Particle)>(&mut self, mut f: F) {
        self.wait_for_cycle();
        for particle in self.home().flat_map(|p| p.particles().iter()) {
            f(particle);
        }
    }

    /// Particle count of each partition in creation order
    pub fn partition_sizes(&mut self) -> Vec<usize> {
        self.wait_for_cycle();
        self.home().map(Partition::size).collect()
    }

    /// Total number of particles
    pub fn particle_count(&self) -> usize {
        self.particle_count
    }

    /// Number of partitions
    pub fn partition_count(&self) -> usize {
        self.slots.len()
    }

    /// Canvas, once initialized
    pub fn canvas(&self) -> Option<Canvas> {
        self.canvas
    }

    /// Particle count recorded at the last growth
    pub fn watermark(&self) -> usize {
        self.watermark
    }

    /// Rolling latency window
    pub fn history(&self) -> &LatencyHistory {
        &self.history
    }

    /// Growth thresholds
    pub fn policy(&self) -> &GrowthPolicy {
        &self.policy
    }

    /// Worker pool counters
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Summary of the manager state
    pub fn stats(&self) -> ManagerStats {
        ManagerStats {
            partitions: self.slots.len(),
            particles: self.particle_count,
            cycles_submitted: self.cycles_submitted,
            cycles_sampled: self.cycles_sampled,
            latest_latency: self.history.latest(),
            reference_latency: self.history.reference_average(),
            watermark: self.watermark,
            state: self.state,
        }
    }

    #[cfg(test)]
    pub(crate) fn record_latency(&mut self, sample: Duration) {
        self.history.record(sample);
    }
}

pub(crate) fn check_finite(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SimError::NonFiniteParameter { name, value })
    }
}
