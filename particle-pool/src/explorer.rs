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
//! Peer-controlled explorer avatars
//!
//! Explorers are not particles: they do not bounce and are not owned by a
//! partition. The simulation driver moves them once per frame and the
//! broadcaster publishes their positions next to the particles.

use crate::particle::Canvas;
use crate::protocol::PeerCommand;
use std::fmt;
use std::str::FromStr;

/// Drawn size of an explorer; positions are clamped so it stays visible
pub const EXPLORER_SIZE: f64 = 10.0;

/// Distance an explorer moves per frame while a move command is held
pub const EXPLORER_SPEED: f64 = 5.0;

/// Unique identifier for an explorer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExplorerId(u64);

impl ExplorerId {
    /// Create a new ExplorerId from a raw u64 value
    pub fn new(id: u64) -> Self {
        ExplorerId(id)
    }

    /// Get the raw u64 value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ExplorerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ExplorerId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(ExplorerId)
    }
}

/// A movable avatar steered by one peer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Explorer {
    id: ExplorerId,
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
}

impl Explorer {
    /// Create a stationary explorer
    pub fn new(id: ExplorerId, x: f64, y: f64) -> Self {
        Explorer { id, x, y, vx: 0.0, vy: 0.0 }
    }

    /// Explorer id
    pub fn id(&self) -> ExplorerId {
        self.id
    }

    /// Current x position
    pub fn x(&self) -> f64 {
        self.x
    }

    /// Current y position
    pub fn y(&self) -> f64 {
        self.y
    }

    /// Current velocity
    pub fn velocity(&self) -> (f64, f64) {
        (self.vx, self.vy)
    }

    /// Set the velocity directly
    pub fn set_velocity(&mut self, vx: f64, vy: f64) {
        self.vx = vx;
        self.vy = vy;
    }

    /// Apply a movement command from the controlling peer
    pub fn apply(&mut self, command: PeerCommand) {
        let (vx, vy) = match command {
            PeerCommand::MoveUp => (0.0, -EXPLORER_SPEED),
            PeerCommand::MoveDown => (0.0, EXPLORER_SPEED),
            PeerCommand::MoveLeft => (-EXPLORER_SPEED, 0.0),
            PeerCommand::MoveRight => (EXPLORER_SPEED, 0.0),
            PeerCommand::Stop => (0.0, 0.0),
        };
        self.set_velocity(vx, vy);
    }

    /// Move one velocity step, staying fully inside the canvas
    pub fn update(&mut self, canvas: &Canvas) {
        self.x += self.vx;
        self.y += self.vy;
        let max_x = (canvas.width() - EXPLORER_SIZE).max(0.0);
        let max_y = (canvas.height() - EXPLORER_SIZE).max(0.0);
        self.x = self.x.clamp(0.0, max_x);
        self.y = self.y.clamp(0.0, max_y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_set_velocity() {
        let mut explorer = Explorer::new(ExplorerId::new(1), 50.0, 50.0);
        explorer.apply(PeerCommand::MoveLeft);
        assert_eq!(explorer.velocity(), (-EXPLORER_SPEED, 0.0));
        explorer.apply(PeerCommand::MoveDown);
        assert_eq!(explorer.velocity(), (0.0, EXPLORER_SPEED));
        explorer.apply(PeerCommand::Stop);
        assert_eq!(explorer.velocity(), (0.0, 0.0));
    }

    #[test]
    fn test_update_clamps_to_canvas() {
        let canvas = Canvas::new(100.0, 100.0);
        let mut explorer = Explorer::new(ExplorerId::new(1), 88.0, 2.0);
        explorer.apply(PeerCommand::MoveRight);
        explorer.update(&canvas);
        assert_eq!(explorer.x(), 90.0);

        explorer.apply(PeerCommand::MoveUp);
        explorer.update(&canvas);
        assert_eq!(explorer.y(), 0.0);
        // clamping does not stop the explorer
        assert_eq!(explorer.velocity(), (0.0, -EXPLORER_SPEED));
    }
}
