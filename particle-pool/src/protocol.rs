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
//! Snapshot wire protocol
//!
//! Records are single text lines:
//!
//! ```text
//! PARTICLE: <id>, <x>, <y>, <vx>, <vy>
//! EXPLORER: <id>, <x>, <y>
//! CONTROLLED_EXPLORER: <id>
//! ```
//!
//! Peers send back one movement command per line: `MOVE_UP`, `MOVE_DOWN`,
//! `MOVE_LEFT`, `MOVE_RIGHT` or `STOP_MOVE`.
//!
//! [`DeltaEncoder`] remembers what was last broadcast for every id and only
//! emits records whose values changed.

use crate::explorer::{Explorer, ExplorerId};
use crate::particle::{Particle, ParticleId};
use crate::{Result, SimError};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// One line of the broadcast stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WireRecord {
    /// Particle state
    Particle {
        /// Particle id
        id: ParticleId,
        /// x position
        x: f64,
        /// y position
        y: f64,
        /// x velocity
        vx: f64,
        /// y velocity
        vy: f64,
    },
    /// Explorer position
    Explorer {
        /// Explorer id
        id: ExplorerId,
        /// x position
        x: f64,
        /// y position
        y: f64,
    },
    /// Tells a peer which explorer it controls; sent once per connection
    ControlledExplorer {
        /// Explorer id
        id: ExplorerId,
    },
}

impl From<&Particle> for WireRecord {
    fn from(p: &Particle) -> Self {
        WireRecord::Particle { id: p.id(), x: p.x(), y: p.y(), vx: p.vx(), vy: p.vy() }
    }
}

impl From<&Explorer> for WireRecord {
    fn from(e: &Explorer) -> Self {
        WireRecord::Explorer { id: e.id(), x: e.x(), y: e.y() }
    }
}

impl fmt::Display for WireRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireRecord::Particle { id, x, y, vx, vy } => {
                write!(f, "PARTICLE: {}, {}, {}, {}, {}", id, x, y, vx, vy)
            }
            WireRecord::Explorer { id, x, y } => write!(f, "EXPLORER: {}, {}, {}", id, x, y),
            WireRecord::ControlledExplorer { id } => write!(f, "CONTROLLED_EXPLORER: {}", id),
        }
    }
}

fn parse_number(line: &str, field: &str) -> Result<f64> {
    field
        .trim()
        .parse()
        .map_err(|_| SimError::MalformedRecord(line.to_string()))
}

impl FromStr for WireRecord {
    type Err = SimError;

    fn from_str(line: &str) -> Result<Self> {
        let malformed = || SimError::MalformedRecord(line.to_string());
        let (tag, body) = line.trim().split_once(": ").ok_or_else(malformed)?;
        let fields: Vec<&str> = body.split(", ").collect();

        match (tag, fields.as_slice()) {
            ("PARTICLE", [id, x, y, vx, vy]) => Ok(WireRecord::Particle {
                id: id.parse().map_err(|_| malformed())?,
                x: parse_number(line, x)?,
                y: parse_number(line, y)?,
                vx: parse_number(line, vx)?,
                vy: parse_number(line, vy)?,
            }),
            ("EXPLORER", [id, x, y]) => Ok(WireRecord::Explorer {
                id: id.parse().map_err(|_| malformed())?,
                x: parse_number(line, x)?,
                y: parse_number(line, y)?,
            }),
            ("CONTROLLED_EXPLORER", [id]) => Ok(WireRecord::ControlledExplorer {
                id: id.parse().map_err(|_| malformed())?,
            }),
            _ => Err(malformed()),
        }
    }
}

/// Movement command sent by a peer for its explorer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerCommand {
    /// Move towards negative y
    MoveUp,
    /// Move towards positive y
    MoveDown,
    /// Move towards negative x
    MoveLeft,
    /// Move towards positive x
    MoveRight,
    /// Stop moving
    Stop,
}

impl fmt::Display for PeerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PeerCommand::MoveUp => "MOVE_UP",
            PeerCommand::MoveDown => "MOVE_DOWN",
            PeerCommand::MoveLeft => "MOVE_LEFT",
            PeerCommand::MoveRight => "MOVE_RIGHT",
            PeerCommand::Stop => "STOP_MOVE",
        };
        f.write_str(text)
    }
}

impl FromStr for PeerCommand {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "MOVE_UP" => Ok(PeerCommand::MoveUp),
            "MOVE_DOWN" => Ok(PeerCommand::MoveDown),
            "MOVE_LEFT" => Ok(PeerCommand::MoveLeft),
            "MOVE_RIGHT" => Ok(PeerCommand::MoveRight),
            "STOP_MOVE" => Ok(PeerCommand::Stop),
            other => Err(SimError::UnknownCommand(other.to_string())),
        }
    }
}

/// Particle and explorer state of one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldSnapshot {
    /// Frame number the snapshot was taken at
    pub frame: u64,
    /// Every particle
    pub particles: Vec<Particle>,
    /// Every explorer
    pub explorers: Vec<Explorer>,
}

impl WorldSnapshot {
    /// Every entity as a record, particles first
    pub fn full_records(&self) -> Vec<WireRecord> {
        self.particles
            .iter()
            .map(WireRecord::from)
            .chain(self.explorers.iter().map(WireRecord::from))
            .collect()
    }
}

/// Emits only the records whose values changed since their last emission
///
/// Ids absent from a snapshot are forgotten, so an entity that reappears
/// is sent again in full.
#[derive(Debug, Default)]
pub struct DeltaEncoder {
    particles: HashMap<ParticleId, [u64; 4]>,
    explorers: HashMap<ExplorerId, [u64; 2]>,
}

impl DeltaEncoder {
    /// Create an encoder that has broadcast nothing yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Records for entities that changed, particles first
    pub fn encode(&mut self, snapshot: &WorldSnapshot) -> Vec<WireRecord> {
        let mut records = Vec::new();

        let mut particles = HashMap::with_capacity(snapshot.particles.len());
        for particle in &snapshot.particles {
            let bits = [
                particle.x().to_bits(),
                particle.y().to_bits(),
                particle.vx().to_bits(),
                particle.vy().to_bits(),
            ];
            if self.particles.get(&particle.id()) != Some(&bits) {
                records.push(WireRecord::from(particle));
            }
            particles.insert(particle.id(), bits);
        }
        self.particles = particles;

        let mut explorers = HashMap::with_capacity(snapshot.explorers.len());
        for explorer in &snapshot.explorers {
            let bits = [explorer.x().to_bits(), explorer.y().to_bits()];
            if self.explorers.get(&explorer.id()) != Some(&bits) {
                records.push(WireRecord::from(explorer));
            }
            explorers.insert(explorer.id(), bits);
        }
        self.explorers = explorers;

        records
    }

    /// Forget everything broadcast so far
    pub fn reset(&mut self) {
        self.particles.clear();
        self.explorers.clear();
    }

    /// Number of particles currently tracked
    pub fn tracked_particles(&self) -> usize {
        self.particles.len()
    }
}
