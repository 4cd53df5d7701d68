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
//! Benchmarks for cycle dispatch and rebalancing
//!
//! Measures a full submit-and-wait cycle for different partition counts and
//! the cost of adding a partition to a populated manager.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use particle_pool::{
    Canvas, DeltaEncoder, GrowthPolicy, PartitionManager, PoolConfig, WorldSnapshot,
};
use std::f64::consts::TAU;

fn populated(partitions: usize, particles: usize) -> PartitionManager {
    let policy = GrowthPolicy::new(partitions);
    let pool = PoolConfig::new(partitions).with_thread_name_prefix("bench");
    let mut manager = PartitionManager::with_pool_config(policy, pool).unwrap();
    manager.initialize(Canvas::new(1920.0, 1080.0));
    manager
        .uniform_angle(particles, (960.0, 540.0), 0.0, TAU, 4.0)
        .unwrap();
    while manager.grow_and_rebalance().is_some() {}
    manager
}

fn bench_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("cycle");
    for &partitions in &[1usize, 2, 4, 8] {
        let mut manager = populated(partitions, 100_000);
        group.bench_with_input(
            BenchmarkId::from_parameter(partitions),
            &partitions,
            |b, _| {
                b.iter(|| {
                    manager.submit_cycle();
                    manager.wait_for_cycle();
                })
            },
        );
    }
    group.finish();
}

fn bench_rebalance(c: &mut Criterion) {
    c.bench_function("grow_and_rebalance_100k", |b| {
        b.iter_batched(
            || populated(1, 100_000),
            |mut manager| {
                manager.grow_and_rebalance();
                black_box(manager.partition_count())
            },
            criterion::BatchSize::LargeInput,
        )
    });
}

fn bench_delta_encode(c: &mut Criterion) {
    let mut manager = populated(4, 20_000);
    c.bench_function("delta_encode_20k", |b| {
        let mut encoder = DeltaEncoder::new();
        b.iter(|| {
            manager.submit_cycle();
            let snapshot = WorldSnapshot {
                frame: 0,
                particles: manager.particles(),
                explorers: Vec::new(),
            };
            black_box(encoder.encode(&snapshot).len())
        })
    });
}

criterion_group!(benches, bench_cycle, bench_rebalance, bench_delta_encode);
criterion_main!(benches);
