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
//! Headless frame driver
//!
//! Each frame the driver:
//!
//! 1. records the timing of the cycle submitted last frame
//! 2. runs the growth check when the monitor interval elapsed
//! 3. applies peer events and moves explorers
//! 4. publishes a [`WorldSnapshot`] if a sink is attached
//! 5. submits the next cycle
//!
//! Advances run while the driver sleeps out the rest of the frame.

use crate::config::SimulationConfig;
use crate::explorer::{Explorer, ExplorerId};
use crate::manager::PartitionManager;
use crate::partition::PartitionId;
use crate::protocol::{PeerCommand, WorldSnapshot};
use crate::Result;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Something that happened to a connected peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerEvent {
    /// A peer connected and was given an explorer
    Joined {
        /// Explorer controlled by the peer
        id: ExplorerId,
    },
    /// A peer sent a movement command
    Command {
        /// Explorer controlled by the peer
        id: ExplorerId,
        /// The command
        command: PeerCommand,
    },
    /// A peer disconnected
    Left {
        /// Explorer controlled by the peer
        id: ExplorerId,
    },
}

/// Receiver of per-frame world snapshots
pub trait SnapshotSink: Send {
    /// Hand over the latest snapshot; older unread snapshots may be dropped
    fn publish(&mut self, snapshot: WorldSnapshot);
}

impl SnapshotSink for Sender<WorldSnapshot> {
    fn publish(&mut self, snapshot: WorldSnapshot) {
        // full or disconnected consumers just miss this frame
        let _ = self.try_send(snapshot);
    }
}

/// Frames-per-second counter over one-second windows
#[derive(Debug, Clone, Default)]
pub struct FpsCounter {
    window_start: Option<Instant>,
    frames: u32,
    fps: u32,
}

impl FpsCounter {
    /// Create a counter that has seen no frames
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a frame rendered at `now` and return the current rate
    ///
    /// The rate stays 0 until the first full second has passed.
    pub fn tick(&mut self, now: Instant) -> u32 {
        let start = *self.window_start.get_or_insert(now);
        self.frames += 1;
        if now.saturating_duration_since(start) >= Duration::from_secs(1) {
            self.fps = self.frames;
            self.frames = 0;
            self.window_start = Some(now);
        }
        self.fps
    }

    /// Rate measured over the last completed window
    pub fn fps(&self) -> u32 {
        self.fps
    }
}

/// What happened during one frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    /// Frame number, starting at 0
    pub frame: u64,
    /// Whether a cycle was dispatched
    pub submitted: bool,
    /// Partition added by the growth check, if any
    pub grown: Option<PartitionId>,
    /// Current frames per second
    pub fps: u32,
}

/// Owns a partition manager and drives it frame by frame
pub struct SimulationDriver {
    manager: PartitionManager,
    explorers: BTreeMap<ExplorerId, Explorer>,
    explorer_spawn: (f64, f64),
    events: Option<Receiver<PeerEvent>>,
    sink: Option<Box<dyn SnapshotSink>>,
    fps: FpsCounter,
    frame: u64,
    frame_interval: Duration,
    monitor_interval: Duration,
    last_monitor: Option<Instant>,
}

impl SimulationDriver {
    /// Wrap an initialized manager with default timings
    ///
    /// # Panics
    ///
    /// Panics if the manager has not been initialized
    pub fn new(manager: PartitionManager) -> Self {
        assert!(
            manager.canvas().is_some(),
            "PartitionManager must be initialized before use"
        );
        let defaults = SimulationConfig::default();
        SimulationDriver {
            manager,
            explorers: BTreeMap::new(),
            explorer_spawn: defaults.network.explorer_spawn,
            events: None,
            sink: None,
            fps: FpsCounter::new(),
            frame: 0,
            frame_interval: defaults.frame_interval(),
            monitor_interval: defaults.monitor_interval(),
            last_monitor: None,
        }
    }

    /// Build and initialize a manager from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the worker pool
    /// cannot be built.
    pub fn from_config(config: &SimulationConfig) -> Result<Self> {
        config.validate()?;
        let mut manager =
            PartitionManager::with_pool_config(config.growth_policy(), config.pool_config())?;
        manager.initialize(config.canvas());
        Ok(SimulationDriver::new(manager)
            .with_frame_interval(config.frame_interval())
            .with_monitor_interval(config.monitor_interval())
            .with_explorer_spawn(config.network.explorer_spawn))
    }

    /// Read peer events from `events` every frame
    pub fn with_events(mut self, events: Receiver<PeerEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Publish a snapshot to `sink` every frame
    pub fn with_sink(mut self, sink: Box<dyn SnapshotSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Set the frame budget used by [`SimulationDriver::run`]
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Set how often the growth check runs
    pub fn with_monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval;
        self
    }

    /// Set where new explorers appear
    pub fn with_explorer_spawn(mut self, position: (f64, f64)) -> Self {
        self.explorer_spawn = position;
        self
    }

    /// The partition manager
    pub fn manager(&self) -> &PartitionManager {
        &self.manager
    }

    /// Mutable access to the partition manager
    pub fn manager_mut(&mut self) -> &mut PartitionManager {
        &mut self.manager
    }

    /// Explorers in id order
    pub fn explorers(&self) -> impl Iterator<Item = &Explorer> {
        self.explorers.values()
    }

    /// Look up one explorer
    pub fn explorer(&self, id: ExplorerId) -> Option<&Explorer> {
        self.explorers.get(&id)
    }

    /// Frames completed so far
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Current frames per second
    pub fn fps(&self) -> u32 {
        self.fps.fps()
    }

    /// Apply one peer event
    pub fn handle_event(&mut self, event: PeerEvent) {
        match event {
            PeerEvent::Joined { id } => {
                let (x, y) = self.explorer_spawn;
                self.explorers.insert(id, Explorer::new(id, x, y));
                info!(explorer = %id, "explorer joined");
            }
            PeerEvent::Command { id, command } => match self.explorers.get_mut(&id) {
                Some(explorer) => explorer.apply(command),
                None => debug!(explorer = %id, %command, "command for unknown explorer"),
            },
            PeerEvent::Left { id } => {
                if self.explorers.remove(&id).is_some() {
                    info!(explorer = %id, "explorer left");
                }
            }
        }
    }

    fn drain_events(&mut self) {
        let Some(events) = self.events.take() else {
            return;
        };
        loop {
            match events.try_recv() {
                Ok(event) => self.handle_event(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("peer event source closed");
                    return;
                }
            }
        }
        self.events = Some(events);
    }

    /// Current state of every particle and explorer
    pub fn snapshot(&mut self) -> WorldSnapshot {
        WorldSnapshot {
            frame: self.frame,
            particles: self.manager.particles(),
            explorers: self.explorers.values().copied().collect(),
        }
    }

    /// Run one frame now
    pub fn tick(&mut self) -> FrameReport {
        self.tick_at(Instant::now())
    }

    /// Run one frame as if the clock read `now`
    pub fn tick_at(&mut self, now: Instant) -> FrameReport {
        self.manager.record_cycle_sample();

        let fps = self.fps.tick(now);
        let monitor_due = match self.last_monitor {
            Some(last) => now.saturating_duration_since(last) >= self.monitor_interval,
            None => true,
        };
        let mut grown = None;
        if fps != 0 && monitor_due {
            self.last_monitor = Some(now);
            grown = self.manager.check_and_adjust();
        }

        self.drain_events();
        if let Some(canvas) = self.manager.canvas() {
            for explorer in self.explorers.values_mut() {
                explorer.update(&canvas);
            }
        }

        if self.sink.is_some() {
            let snapshot = self.snapshot();
            if let Some(sink) = self.sink.as_mut() {
                sink.publish(snapshot);
            }
        }

        let submitted = self.manager.submit_cycle();
        let report = FrameReport { frame: self.frame, submitted, grown, fps };
        self.frame += 1;
        report
    }

    /// Run frames paced to the frame interval
    ///
    /// Stops after `max_frames` frames, or never when `None`. Returns the
    /// number of frames run.
    pub fn run(&mut self, max_frames: Option<u64>) -> u64 {
        let mut ran = 0;
        while max_frames.map_or(true, |max| ran < max) {
            let started = Instant::now();
            let report = self.tick_at(started);
            ran += 1;
            if report.frame % 600 == 0 {
                let stats = self.manager.stats();
                info!(
                    frame = report.frame,
                    fps = report.fps,
                    particles = stats.particles,
                    partitions = stats.partitions,
                    explorers = self.explorers.len(),
                    "simulation running"
                );
            }
            if let Some(rest) = self.frame_interval.checked_sub(started.elapsed()) {
                std::thread::sleep(rest);
            }
        }
        self.manager.wait_for_cycle();
        ran
    }
}
