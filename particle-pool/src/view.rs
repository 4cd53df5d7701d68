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
//! Viewport filtering for render collaborators

use crate::particle::Particle;

/// Axis-aligned rectangle in canvas coordinates
///
/// Bounds are inclusive on every side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    left: f64,
    top: f64,
    right: f64,
    bottom: f64,
}

impl Viewport {
    /// Create a viewport from its edges
    ///
    /// Edges given in the wrong order are swapped.
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Viewport {
            left: left.min(right),
            top: top.min(bottom),
            right: left.max(right),
            bottom: top.max(bottom),
        }
    }

    /// Viewport centred on a point
    pub fn centered(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        let (hw, hh) = (width / 2.0, height / 2.0);
        Viewport::new(cx - hw, cy - hh, cx + hw, cy + hh)
    }

    /// Left edge
    pub fn left(&self) -> f64 {
        self.left
    }

    /// Top edge
    pub fn top(&self) -> f64 {
        self.top
    }

    /// Right edge
    pub fn right(&self) -> f64 {
        self.right
    }

    /// Bottom edge
    pub fn bottom(&self) -> f64 {
        self.bottom
    }

    /// Check whether a point lies inside the viewport
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
    }

    /// Check whether a particle's position lies inside the viewport
    pub fn contains(&self, particle: &Particle) -> bool {
        self.contains_point(particle.x(), particle.y())
    }
}
