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
//! Bulk particle generators
//!
//! Each uniform mode sweeps one parameter linearly across `count` particles,
//! inclusive of both endpoints. A batch is planned and validated in full
//! before any particle is created, so a rejected batch leaves the manager
//! untouched.
//!
//! Batch requests can also be parsed from operator text. Angles in text are
//! given in degrees:
//!
//! | mode       | format                                   |
//! |------------|------------------------------------------|
//! | single     | `single:x,y,angle,speed`                 |
//! | distance   | `distance:n,x1,y1,x2,y2,angle,speed`     |
//! | angle      | `angle:n,x,y,start_angle,end_angle,speed`|
//! | velocity   | `velocity:n,x,y,angle,start_speed,end_speed` |
//!
//! ```
//! use particle_pool::BatchRequest;
//!
//! let request: BatchRequest = "distance:5,0,0,100,0,0,1".parse().unwrap();
//! let xs: Vec<f64> = request.plan().unwrap().iter().map(|s| s.x).collect();
//! assert_eq!(xs, vec![0.0, 25.0, 50.0, 75.0, 100.0]);
//! ```

use crate::manager::{check_finite, PartitionManager};
use crate::particle::{ParticleId, ParticleSpec};
use crate::{Result, SimError};
use std::str::FromStr;

/// Largest particle count a single batch may create
pub const MAX_BATCH: usize = 1_000_000;

/// A request to create one or more particles
#[derive(Debug, Clone, PartialEq)]
pub enum BatchRequest {
    /// One particle with a heading (radians) and speed
    Single {
        /// Position
        origin: (f64, f64),
        /// Heading in radians
        angle: f64,
        /// Speed
        speed: f64,
    },
    /// Particles evenly spaced on the segment from `start` to `end`
    UniformDistance {
        /// Number of particles
        count: usize,
        /// First position
        start: (f64, f64),
        /// Last position
        end: (f64, f64),
        /// Shared heading in radians
        angle: f64,
        /// Shared speed
        speed: f64,
    },
    /// Particles at one point with headings swept from `start_angle` to `end_angle`
    UniformAngle {
        /// Number of particles
        count: usize,
        /// Shared position
        origin: (f64, f64),
        /// First heading in radians
        start_angle: f64,
        /// Last heading in radians
        end_angle: f64,
        /// Shared speed
        speed: f64,
    },
    /// Particles at one point with speeds swept from `start_speed` to `end_speed`
    UniformVelocity {
        /// Number of particles
        count: usize,
        /// Shared position
        origin: (f64, f64),
        /// Shared heading in radians
        angle: f64,
        /// First speed
        start_speed: f64,
        /// Last speed
        end_speed: f64,
    },
}

/// Value `index` of `count` evenly spaced values from `start` to `end`
///
/// A single value sits at `start`.
pub fn interpolate(start: f64, end: f64, count: usize, index: usize) -> f64 {
    if count <= 1 {
        return start;
    }
    let step = (end - start) / (count - 1) as f64;
    start + index as f64 * step
}

impl BatchRequest {
    /// Number of particles the request creates
    pub fn count(&self) -> usize {
        match *self {
            BatchRequest::Single { .. } => 1,
            BatchRequest::UniformDistance { count, .. }
            | BatchRequest::UniformAngle { count, .. }
            | BatchRequest::UniformVelocity { count, .. } => count,
        }
    }

    /// Check count and parameters
    ///
    /// # Errors
    ///
    /// Returns [`SimError::EmptyBatch`] for a zero count,
    /// [`SimError::BatchTooLarge`] above [`MAX_BATCH`] and
    /// [`SimError::NonFiniteParameter`] for NaN or infinite inputs.
    pub fn validate(&self) -> Result<()> {
        let count = self.count();
        if count == 0 {
            return Err(SimError::EmptyBatch);
        }
        if count > MAX_BATCH {
            return Err(SimError::BatchTooLarge { count, max: MAX_BATCH });
        }
        match *self {
            BatchRequest::Single { origin, angle, speed } => {
                check_finite("x", origin.0)?;
                check_finite("y", origin.1)?;
                check_finite("angle", angle)?;
                check_finite("speed", speed)
            }
            BatchRequest::UniformDistance { start, end, angle, speed, .. } => {
                check_finite("x1", start.0)?;
                check_finite("y1", start.1)?;
                check_finite("x2", end.0)?;
                check_finite("y2", end.1)?;
                check_finite("angle", angle)?;
                check_finite("speed", speed)
            }
            BatchRequest::UniformAngle { origin, start_angle, end_angle, speed, .. } => {
                check_finite("x", origin.0)?;
                check_finite("y", origin.1)?;
                check_finite("start_angle", start_angle)?;
                check_finite("end_angle", end_angle)?;
                check_finite("speed", speed)
            }
            BatchRequest::UniformVelocity { origin, angle, start_speed, end_speed, .. } => {
                check_finite("x", origin.0)?;
                check_finite("y", origin.1)?;
                check_finite("angle", angle)?;
                check_finite("start_speed", start_speed)?;
                check_finite("end_speed", end_speed)
            }
        }
    }

    /// Compute the particle specs this request creates, in creation order
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`BatchRequest::validate`].
    pub fn plan(&self) -> Result<Vec<ParticleSpec>> {
        self.validate()?;
        let count = self.count();
        let specs = match *self {
            BatchRequest::Single { origin, angle, speed } => {
                vec![ParticleSpec::polar(origin.0, origin.1, angle, speed)]
            }
            BatchRequest::UniformDistance { start, end, angle, speed, .. } => (0..count)
                .map(|i| {
                    let x = interpolate(start.0, end.0, count, i);
                    let y = interpolate(start.1, end.1, count, i);
                    ParticleSpec::polar(x, y, angle, speed)
                })
                .collect(),
            BatchRequest::UniformAngle { origin, start_angle, end_angle, speed, .. } => (0..count)
                .map(|i| {
                    let angle = interpolate(start_angle, end_angle, count, i);
                    ParticleSpec::polar(origin.0, origin.1, angle, speed)
                })
                .collect(),
            BatchRequest::UniformVelocity { origin, angle, start_speed, end_speed, .. } => (0..count)
                .map(|i| {
                    let speed = interpolate(start_speed, end_speed, count, i);
                    ParticleSpec::polar(origin.0, origin.1, angle, speed)
                })
                .collect(),
        };
        Ok(specs)
    }
}

fn parse_fields(text: &str, expected: usize) -> Result<Vec<f64>> {
    let fields: Vec<f64> = text
        .split(',')
        .map(|field| field.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| SimError::MalformedBatch(text.to_string()))?;
    if fields.len() != expected {
        return Err(SimError::MalformedBatch(text.to_string()));
    }
    Ok(fields)
}

fn parse_count(text: &str, raw: &str) -> Result<usize> {
    let count: usize = raw
        .trim()
        .parse()
        .map_err(|_| SimError::MalformedBatch(text.to_string()))?;
    if count == 0 {
        return Err(SimError::EmptyBatch);
    }
    Ok(count)
}

impl FromStr for BatchRequest {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        let (mode, rest) = s
            .split_once(':')
            .ok_or_else(|| SimError::MalformedBatch(s.to_string()))?;
        let mode = mode.trim().to_ascii_lowercase();

        if mode == "single" {
            let f = parse_fields(rest, 4)?;
            return Ok(BatchRequest::Single {
                origin: (f[0], f[1]),
                angle: f[2].to_radians(),
                speed: f[3],
            });
        }

        let (count, params) = rest
            .split_once(',')
            .ok_or_else(|| SimError::MalformedBatch(s.to_string()))?;
        let count = parse_count(s, count)?;

        let request = match mode.as_str() {
            "distance" => {
                let f = parse_fields(params, 6)?;
                BatchRequest::UniformDistance {
                    count,
                    start: (f[0], f[1]),
                    end: (f[2], f[3]),
                    angle: f[4].to_radians(),
                    speed: f[5],
                }
            }
            "angle" => {
                let f = parse_fields(params, 5)?;
                BatchRequest::UniformAngle {
                    count,
                    origin: (f[0], f[1]),
                    start_angle: f[2].to_radians(),
                    end_angle: f[3].to_radians(),
                    speed: f[4],
                }
            }
            "velocity" => {
                let f = parse_fields(params, 5)?;
                BatchRequest::UniformVelocity {
                    count,
                    origin: (f[0], f[1]),
                    angle: f[2].to_radians(),
                    start_speed: f[3],
                    end_speed: f[4],
                }
            }
            _ => return Err(SimError::MalformedBatch(s.to_string())),
        };
        Ok(request)
    }
}

impl PartitionManager {
    /// Create every particle described by `request`
    ///
    /// # Errors
    ///
    /// Returns an error, creating nothing, if the request is invalid.
    pub fn spawn_batch(&mut self, request: &BatchRequest) -> Result<Vec<ParticleId>> {
        let specs = request.plan()?;
        self.add_batch(&specs)
    }

    /// Add one particle at `(x, y)` heading `angle` radians at `speed`
    ///
    /// # Errors
    ///
    /// Returns an error, creating nothing, for non-finite input.
    pub fn single(&mut self, x: f64, y: f64, angle: f64, speed: f64) -> Result<ParticleId> {
        let ids = self.spawn_batch(&BatchRequest::Single { origin: (x, y), angle, speed })?;
        ids.into_iter().next().ok_or(SimError::EmptyBatch)
    }

    /// Add `count` particles evenly spaced from `start` to `end`
    ///
    /// # Errors
    ///
    /// Returns an error, creating nothing, for a zero count or non-finite input.
    pub fn uniform_distance(
        &mut self,
        count: usize,
        start: (f64, f64),
        end: (f64, f64),
        angle: f64,
        speed: f64,
    ) -> Result<Vec<ParticleId>> {
        self.spawn_batch(&BatchRequest::UniformDistance { count, start, end, angle, speed })
    }

    /// Add `count` particles at `origin` with headings from `start_angle` to `end_angle`
    ///
    /// # Errors
    ///
    /// Returns an error, creating nothing, for a zero count or non-finite input.
    pub fn uniform_angle(
        &mut self,
        count: usize,
        origin: (f64, f64),
        start_angle: f64,
        end_angle: f64,
        speed: f64,
    ) -> Result<Vec<ParticleId>> {
        self.spawn_batch(&BatchRequest::UniformAngle {
            count,
            origin,
            start_angle,
            end_angle,
            speed,
        })
    }

    /// Add `count` particles at `origin` with speeds from `start_speed` to `end_speed`
    ///
    /// # Errors
    ///
    /// Returns an error, creating nothing, for a zero count or non-finite input.
    pub fn uniform_velocity(
        &mut self,
        count: usize,
        origin: (f64, f64),
        angle: f64,
        start_speed: f64,
        end_speed: f64,
    ) -> Result<Vec<ParticleId>> {
        self.spawn_batch(&BatchRequest::UniformVelocity {
            count,
            origin,
            angle,
            start_speed,
            end_speed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate_endpoints() {
        assert_eq!(interpolate(0.0, 100.0, 5, 0), 0.0);
        assert_eq!(interpolate(0.0, 100.0, 5, 4), 100.0);
        assert_eq!(interpolate(3.0, 9.0, 1, 0), 3.0);
    }

    #[test]
    fn test_velocity_plan() {
        let request = BatchRequest::UniformVelocity {
            count: 3,
            origin: (5.0, 5.0),
            angle: 0.0,
            start_speed: 1.0,
            end_speed: 3.0,
        };
        let speeds: Vec<f64> = request.plan().unwrap().iter().map(|s| s.vx).collect();
        assert_eq!(speeds, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_zero_count_rejected() {
        let request = BatchRequest::UniformAngle {
            count: 0,
            origin: (0.0, 0.0),
            start_angle: 0.0,
            end_angle: 1.0,
            speed: 1.0,
        };
        assert!(matches!(request.plan(), Err(SimError::EmptyBatch)));
    }

    #[test]
    fn test_oversized_count_rejected() {
        let request = BatchRequest::UniformDistance {
            count: usize::MAX,
            start: (0.0, 0.0),
            end: (10.0, 0.0),
            angle: 0.0,
            speed: 1.0,
        };
        assert!(matches!(
            request.plan(),
            Err(SimError::BatchTooLarge { count: usize::MAX, max: MAX_BATCH })
        ));

        let at_limit = BatchRequest::UniformVelocity {
            count: MAX_BATCH,
            origin: (0.0, 0.0),
            angle: 0.0,
            start_speed: 1.0,
            end_speed: 2.0,
        };
        assert!(at_limit.validate().is_ok());

        let parsed: BatchRequest = "angle:2000000,0,0,0,90,1".parse().unwrap();
        assert!(matches!(parsed.validate(), Err(SimError::BatchTooLarge { .. })));
    }

    #[test]
    fn test_non_finite_rejected() {
        let request = BatchRequest::UniformDistance {
            count: 2,
            start: (0.0, 0.0),
            end: (f64::INFINITY, 0.0),
            angle: 0.0,
            speed: 1.0,
        };
        assert!(matches!(
            request.validate(),
            Err(SimError::NonFiniteParameter { name: "x2", .. })
        ));
    }

    #[test]
    fn test_parse_modes() {
        let single: BatchRequest = "single: 10, 20, 90, 3".parse().unwrap();
        match single {
            BatchRequest::Single { origin, angle, speed } => {
                assert_eq!(origin, (10.0, 20.0));
                assert!((angle - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
                assert_eq!(speed, 3.0);
            }
            other => panic!("unexpected request {:?}", other),
        }

        let angle: BatchRequest = "angle:4,1,2,0,270,5".parse().unwrap();
        assert_eq!(angle.count(), 4);

        let velocity: BatchRequest = "VELOCITY:2,1,2,45,1,9".parse().unwrap();
        assert_eq!(velocity.count(), 2);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(
            "distance:-3,0,0,1,1,0,1".parse::<BatchRequest>(),
            Err(SimError::MalformedBatch(_))
        ));
        assert!(matches!(
            "distance:0,0,0,1,1,0,1".parse::<BatchRequest>(),
            Err(SimError::EmptyBatch)
        ));
        assert!(matches!(
            "spiral:3,0,0".parse::<BatchRequest>(),
            Err(SimError::MalformedBatch(_))
        ));
        assert!(matches!(
            "angle:3,0,0,1".parse::<BatchRequest>(),
            Err(SimError::MalformedBatch(_))
        ));
        assert!("no separator".parse::<BatchRequest>().is_err());
    }
}
