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
//! Particles and the canvas they bounce inside
//!
//! A particle is a point mass with a position and a velocity. Each advance
//! moves it by one velocity step and reflects it off the canvas edges. The
//! update depends on nothing but the particle and the canvas, which is what
//! lets partitions advance in parallel without sharing anything.

use std::fmt;
use std::str::FromStr;

/// Unique identifier for a particle
///
/// Assigned by the manager when the particle is created and never reused
/// by the same manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticleId(u64);

impl ParticleId {
    /// Create a new ParticleId from a raw u64 value
    pub fn new(id: u64) -> Self {
        ParticleId(id)
    }

    /// Get the raw u64 value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ParticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ParticleId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(ParticleId)
    }
}

/// Rectangular simulation bounds
///
/// Particles are kept inside `[margin, width - margin] x [margin, height - margin]`.
/// A margin of zero (the default) reflects particles exactly at the canvas
/// edges; a positive margin models the drawn half-size of a particle.
///
/// # Examples
///
/// ```
/// use particle_pool::Canvas;
///
/// let canvas = Canvas::new(1280.0, 720.0).with_margin(5.0);
/// assert_eq!(canvas.max_x(), 1275.0);
/// assert!(canvas.contains(5.0, 715.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Canvas {
    width: f64,
    height: f64,
    margin: f64,
}

impl Canvas {
    /// Create a canvas with no reflection margin
    ///
    /// # Panics
    ///
    /// Panics if either dimension is non-positive, NaN, or infinite
    pub fn new(width: f64, height: f64) -> Self {
        assert!(
            width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0,
            "Canvas dimensions must be positive and finite"
        );
        Canvas { width, height, margin: 0.0 }
    }

    /// Set the reflection margin
    ///
    /// # Panics
    ///
    /// Panics if the margin is negative, non-finite, or leaves no room
    /// between opposite edges
    pub fn with_margin(mut self, margin: f64) -> Self {
        assert!(
            margin.is_finite() && margin >= 0.0 && 2.0 * margin <= self.width.min(self.height),
            "Canvas margin must be finite, non-negative and fit inside the canvas"
        );
        self.margin = margin;
        self
    }

    /// Canvas width
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Canvas height
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Reflection margin
    pub fn margin(&self) -> f64 {
        self.margin
    }

    /// Smallest x a particle may occupy
    pub fn min_x(&self) -> f64 {
        self.margin
    }

    /// Largest x a particle may occupy
    pub fn max_x(&self) -> f64 {
        self.width - self.margin
    }

    /// Smallest y a particle may occupy
    pub fn min_y(&self) -> f64 {
        self.margin
    }

    /// Largest y a particle may occupy
    pub fn max_y(&self) -> f64 {
        self.height - self.margin
    }

    /// Check whether a point lies inside the reflection bounds (inclusive)
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x() && x <= self.max_x() && y >= self.min_y() && y <= self.max_y()
    }
}

/// Parameters for a particle that has not been assigned an id yet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleSpec {
    /// Initial x position
    pub x: f64,
    /// Initial y position
    pub y: f64,
    /// Initial x velocity
    pub vx: f64,
    /// Initial y velocity
    pub vy: f64,
}

impl ParticleSpec {
    /// Create a spec from cartesian position and velocity
    pub fn new(x: f64, y: f64, vx: f64, vy: f64) -> Self {
        ParticleSpec { x, y, vx, vy }
    }

    /// Create a spec from a heading in radians and a speed
    pub fn polar(x: f64, y: f64, angle: f64, speed: f64) -> Self {
        ParticleSpec::new(x, y, angle.cos() * speed, angle.sin() * speed)
    }

    /// Check if all fields are finite (not NaN or infinite)
    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.vx.is_finite() && self.vy.is_finite()
    }
}

/// A point mass reflecting off the canvas bounds
///
/// # Examples
///
/// ```
/// use particle_pool::{Canvas, Particle, ParticleId};
///
/// let canvas = Canvas::new(100.0, 100.0);
/// let mut p = Particle::new(ParticleId::new(1), 98.0, 50.0, 5.0, 0.0);
/// p.advance(&canvas);
/// assert_eq!(p.x(), 100.0);
/// assert_eq!(p.vx(), -5.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    id: ParticleId,
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
}

impl Particle {
    /// Create a particle with the given position and velocity
    pub fn new(id: ParticleId, x: f64, y: f64, vx: f64, vy: f64) -> Self {
        Particle { id, x, y, vx, vy }
    }

    /// Create a particle from a spec
    pub fn from_spec(id: ParticleId, spec: ParticleSpec) -> Self {
        Particle::new(id, spec.x, spec.y, spec.vx, spec.vy)
    }

    /// Particle id
    pub fn id(&self) -> ParticleId {
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

    /// Current x velocity
    pub fn vx(&self) -> f64 {
        self.vx
    }

    /// Current y velocity
    pub fn vy(&self) -> f64 {
        self.vy
    }

    /// Speed (velocity magnitude)
    pub fn speed(&self) -> f64 {
        self.vx.hypot(self.vy)
    }

    /// Heading in radians
    pub fn heading(&self) -> f64 {
        self.vy.atan2(self.vx)
    }

    /// Move one velocity step and reflect off the canvas edges
    ///
    /// Each axis is handled independently: a coordinate that leaves the
    /// canvas range is clamped to the boundary it crossed and the matching
    /// velocity component changes sign.
    pub fn advance(&mut self, canvas: &Canvas) {
        self.x += self.vx;
        self.y += self.vy;
        reflect(&mut self.x, &mut self.vx, canvas.min_x(), canvas.max_x());
        reflect(&mut self.y, &mut self.vy, canvas.min_y(), canvas.max_y());
    }
}

#[inline]
fn reflect(position: &mut f64, velocity: &mut f64, low: f64, high: f64) {
    if *position < low {
        *position = low;
        *velocity = -*velocity;
    } else if *position > high {
        *position = high;
        *velocity = -*velocity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn particle(x: f64, y: f64, vx: f64, vy: f64) -> Particle {
        Particle::new(ParticleId::new(7), x, y, vx, vy)
    }

    #[test]
    fn test_free_motion() {
        let canvas = Canvas::new(100.0, 100.0);
        let mut p = particle(10.0, 20.0, 1.5, -2.0);
        p.advance(&canvas);
        assert_eq!(p.x(), 11.5);
        assert_eq!(p.y(), 18.0);
        assert_eq!(p.vx(), 1.5);
        assert_eq!(p.vy(), -2.0);
    }

    #[test]
    fn test_reflect_right_edge() {
        let canvas = Canvas::new(100.0, 100.0);
        let mut p = particle(99.0, 50.0, 3.0, 0.0);
        p.advance(&canvas);
        assert_eq!(p.x(), 100.0);
        assert_eq!(p.vx(), -3.0);
    }

    #[test]
    fn test_reflect_left_and_top_independently() {
        let canvas = Canvas::new(100.0, 100.0);
        let mut p = particle(1.0, 99.5, -4.0, 2.0);
        p.advance(&canvas);
        assert_eq!(p.x(), 0.0);
        assert_eq!(p.vx(), 4.0);
        assert_eq!(p.y(), 100.0);
        assert_eq!(p.vy(), -2.0);
    }

    #[test]
    fn test_landing_on_edge_keeps_velocity() {
        let canvas = Canvas::new(100.0, 100.0);
        let mut p = particle(98.0, 50.0, 2.0, 0.0);
        p.advance(&canvas);
        assert_eq!(p.x(), 100.0);
        assert_eq!(p.vx(), 2.0);
    }

    #[test]
    fn test_margin_bounds() {
        let canvas = Canvas::new(100.0, 60.0).with_margin(5.0);
        let mut p = particle(94.0, 6.0, 3.0, -3.0);
        p.advance(&canvas);
        assert_eq!(p.x(), 95.0);
        assert_eq!(p.y(), 5.0);
        assert_eq!(p.vx(), -3.0);
        assert_eq!(p.vy(), 3.0);
    }

    #[test]
    fn test_spawn_outside_is_pulled_in() {
        let canvas = Canvas::new(50.0, 50.0);
        let mut p = particle(-20.0, 80.0, 1.0, 1.0);
        p.advance(&canvas);
        assert!(canvas.contains(p.x(), p.y()));
    }

    #[test]
    fn test_polar_spec() {
        let spec = ParticleSpec::polar(0.0, 0.0, std::f64::consts::FRAC_PI_2, 2.0);
        assert!(spec.vx.abs() < 1e-12);
        assert!((spec.vy - 2.0).abs() < 1e-12);
        assert!(spec.is_valid());

        let p = Particle::from_spec(ParticleId::new(1), spec);
        assert!((p.speed() - 2.0).abs() < 1e-12);
        assert!((p.heading() - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_spec() {
        assert!(!ParticleSpec::new(f64::NAN, 0.0, 0.0, 0.0).is_valid());
        assert!(!ParticleSpec::new(0.0, 0.0, f64::INFINITY, 0.0).is_valid());
    }

    #[test]
    fn test_particle_id_display_round_trip() {
        let id = ParticleId::new(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!("42".parse::<ParticleId>().unwrap(), id);
    }

    #[test]
    #[should_panic(expected = "Canvas dimensions must be positive and finite")]
    fn test_zero_width_canvas() {
        Canvas::new(0.0, 10.0);
    }

    #[test]
    #[should_panic(expected = "Canvas margin")]
    fn test_oversized_margin() {
        Canvas::new(10.0, 10.0).with_margin(6.0);
    }
}
