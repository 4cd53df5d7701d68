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
//! Partitions of the particle population
//!
//! A partition owns a disjoint slice of the population and is the unit of
//! work handed to a pool worker. Partitions are moved by value into worker
//! tasks, so an advance has exclusive access to its particles without any
//! locking.

use crate::particle::{Canvas, Particle};
use std::fmt;
use std::time::{Duration, Instant};

/// Identifier of a partition, equal to its creation index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionId(usize);

impl PartitionId {
    /// Create a partition id from its creation index
    pub fn new(index: usize) -> Self {
        PartitionId(index)
    }

    /// Creation index of the partition
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Partition({})", self.0)
    }
}

/// An owned group of particles advanced together by one worker
///
/// Particles are kept in insertion order. Rebalancing donates from the
/// front, so the oldest particles of a partition move first.
#[derive(Debug, Clone)]
pub struct Partition {
    id: PartitionId,
    particles: Vec<Particle>,
    canvas: Canvas,
    last_duration: Duration,
    advances: u64,
}

impl Partition {
    /// Create an empty partition
    pub fn new(id: PartitionId, canvas: Canvas) -> Self {
        Partition::with_particles(id, canvas, Vec::new())
    }

    /// Create a partition that starts out owning `particles`
    pub fn with_particles(id: PartitionId, canvas: Canvas, particles: Vec<Particle>) -> Self {
        Partition {
            id,
            particles,
            canvas,
            last_duration: Duration::ZERO,
            advances: 0,
        }
    }

    /// Partition id
    pub fn id(&self) -> PartitionId {
        self.id
    }

    /// Append a particle
    pub fn add(&mut self, particle: Particle) {
        self.particles.push(particle);
    }

    /// Advance every owned particle by one step
    ///
    /// Records and returns the wall-clock time the advance took.
    pub fn advance(&mut self) -> Duration {
        let start = Instant::now();
        let canvas = self.canvas;
        for particle in &mut self.particles {
            particle.advance(&canvas);
        }
        self.last_duration = start.elapsed();
        self.advances += 1;
        self.last_duration
    }

    /// Number of owned particles
    pub fn size(&self) -> usize {
        self.particles.len()
    }

    /// Check whether the partition owns no particles
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Remove every owned particle
    pub fn clear(&mut self) {
        self.particles.clear();
    }

    /// Remove up to `count` particles, earliest-added first
    pub fn donate(&mut self, count: usize) -> Vec<Particle> {
        let count = count.min(self.particles.len());
        self.particles.drain(..count).collect()
    }

    /// Owned particles in insertion order
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Canvas the partition advances against
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Replace the canvas used by subsequent advances
    pub fn set_canvas(&mut self, canvas: Canvas) {
        self.canvas = canvas;
    }

    /// Duration of the most recent advance (zero before the first one)
    pub fn last_duration(&self) -> Duration {
        self.last_duration
    }

    /// Number of completed advances
    pub fn advances(&self) -> u64 {
        self.advances
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::ParticleId;

    fn filled(n: u64) -> Partition {
        let mut partition = Partition::new(PartitionId::new(0), Canvas::new(100.0, 100.0));
        for i in 0..n {
            partition.add(Particle::new(ParticleId::new(i), 10.0, 10.0, 1.0, 1.0));
        }
        partition
    }

    #[test]
    fn test_add_and_size() {
        let partition = filled(3);
        assert_eq!(partition.size(), 3);
        assert!(!partition.is_empty());
        assert_eq!(partition.particles()[2].id(), ParticleId::new(2));
    }

    #[test]
    fn test_advance_moves_every_particle() {
        let mut partition = filled(4);
        partition.advance();
        assert_eq!(partition.advances(), 1);
        assert!(partition.particles().iter().all(|p| p.x() == 11.0 && p.y() == 11.0));
    }

    #[test]
    fn test_donate_takes_front() {
        let mut partition = filled(5);
        let donated = partition.donate(2);
        let ids: Vec<u64> = donated.iter().map(|p| p.id().raw()).collect();
        assert_eq!(ids, vec![0, 1]);
        assert_eq!(partition.size(), 3);
        assert_eq!(partition.particles()[0].id(), ParticleId::new(2));
    }

    #[test]
    fn test_donate_more_than_owned() {
        let mut partition = filled(2);
        assert_eq!(partition.donate(10).len(), 2);
        assert!(partition.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut partition = filled(8);
        partition.clear();
        assert_eq!(partition.size(), 0);
    }

    #[test]
    fn test_set_canvas_applies_to_next_advance() {
        let mut partition = filled(1);
        partition.set_canvas(Canvas::new(5.0, 5.0));
        partition.advance();
        let p = partition.particles()[0];
        assert_eq!(p.x(), 5.0);
        assert_eq!(p.vx(), -1.0);
    }
}
