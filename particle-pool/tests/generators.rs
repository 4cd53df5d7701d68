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
//! Bulk generator placement through the manager

use particle_pool::{BatchRequest, Canvas, GrowthPolicy, Particle, PartitionManager, SimError};
use std::f64::consts::{FRAC_PI_2, PI};

const EPSILON: f64 = 1e-9;

fn manager() -> PartitionManager {
    let mut manager = PartitionManager::new(GrowthPolicy::new(2)).unwrap();
    manager.initialize(Canvas::new(1000.0, 1000.0));
    manager
}

fn by_id(manager: &mut PartitionManager) -> Vec<Particle> {
    let mut particles = manager.particles();
    particles.sort_by_key(|p| p.id());
    particles
}

#[test]
fn test_uniform_distance_spacing() {
    let mut manager = manager();
    let ids = manager.uniform_distance(5, (0.0, 0.0), (100.0, 0.0), 0.0, 1.0).unwrap();
    assert_eq!(ids.len(), 5);

    let xs: Vec<f64> = by_id(&mut manager).iter().map(|p| p.x()).collect();
    assert_eq!(xs, vec![0.0, 25.0, 50.0, 75.0, 100.0]);
}

#[test]
fn test_uniform_angle_headings() {
    let mut manager = manager();
    manager.uniform_angle(4, (500.0, 500.0), 0.0, 3.0 * FRAC_PI_2, 2.0).unwrap();

    let expected = [(2.0, 0.0), (0.0, 2.0), (-2.0, 0.0), (0.0, -2.0)];
    for (particle, (vx, vy)) in by_id(&mut manager).iter().zip(expected) {
        assert!((particle.vx() - vx).abs() < EPSILON, "vx {}", particle.vx());
        assert!((particle.vy() - vy).abs() < EPSILON, "vy {}", particle.vy());
        assert_eq!((particle.x(), particle.y()), (500.0, 500.0));
    }
}

#[test]
fn test_uniform_velocity_speeds() {
    let mut manager = manager();
    manager.uniform_velocity(3, (10.0, 10.0), PI, 1.0, 5.0).unwrap();

    let speeds: Vec<f64> = by_id(&mut manager).iter().map(|p| p.speed()).collect();
    for (speed, expected) in speeds.iter().zip([1.0, 3.0, 5.0]) {
        assert!((speed - expected).abs() < EPSILON);
    }
}

#[test]
fn test_single_count_uses_start() {
    let mut manager = manager();
    manager.uniform_distance(1, (0.0, 0.0), (100.0, 100.0), 0.0, 1.0).unwrap();
    manager.uniform_velocity(1, (0.0, 0.0), 0.0, 2.0, 8.0).unwrap();

    let particles = by_id(&mut manager);
    assert_eq!((particles[0].x(), particles[0].y()), (0.0, 0.0));
    assert_eq!(particles[1].vx(), 2.0);
}

#[test]
fn test_single() {
    let mut manager = manager();
    let id = manager.single(30.0, 40.0, FRAC_PI_2, 3.0).unwrap();
    let particle = manager.particles()[0];
    assert_eq!(particle.id(), id);
    assert!((particle.vy() - 3.0).abs() < EPSILON);
}

#[test]
fn test_rejected_batches_create_nothing() {
    let mut manager = manager();
    assert!(matches!(
        manager.uniform_angle(0, (0.0, 0.0), 0.0, 1.0, 1.0),
        Err(SimError::EmptyBatch)
    ));
    assert!(matches!(
        manager.uniform_velocity(4, (0.0, 0.0), 0.0, 1.0, f64::NAN),
        Err(SimError::NonFiniteParameter { name: "end_speed", .. })
    ));
    assert!(manager.single(f64::INFINITY, 0.0, 0.0, 1.0).is_err());
    assert!(matches!(
        manager.uniform_distance(usize::MAX, (0.0, 0.0), (1.0, 1.0), 0.0, 1.0),
        Err(SimError::BatchTooLarge { .. })
    ));
    assert_eq!(manager.particle_count(), 0);
}

#[test]
fn test_parsed_requests() {
    let mut manager = manager();
    let request: BatchRequest = "angle:4,100,100,0,270,1".parse().unwrap();
    manager.spawn_batch(&request).unwrap();

    let request: BatchRequest = "distance:3, 0,0, 10,20, 0, 0".parse().unwrap();
    manager.spawn_batch(&request).unwrap();

    let particles = by_id(&mut manager);
    assert_eq!(particles.len(), 7);
    assert!((particles[3].vy() + 1.0).abs() < EPSILON);
    assert_eq!((particles[5].x(), particles[5].y()), (5.0, 10.0));
}
