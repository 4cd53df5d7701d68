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
//! Worker pool executing partition advances
//!
//! With the `parallel` feature the pool is a dedicated Rayon thread pool
//! sized to the concurrency ceiling. Without it, tasks run inline on the
//! calling thread, which keeps the manager's dispatch/collect protocol
//! identical in both builds.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Number of hardware threads available to this process
///
/// Falls back to 1 when the platform cannot report it.
pub fn hardware_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Configuration for the worker pool
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of worker threads
    pub num_threads: usize,
    /// Number of no-op tasks submitted by [`WorkerPool::prewarm`]
    pub prewarm_tasks: usize,
    /// Prefix for worker thread names
    pub thread_name_prefix: String,
    /// Whether to log pool lifecycle events at debug level
    pub log_pool_events: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig::new(hardware_concurrency())
    }
}

impl PoolConfig {
    /// Create a pool configuration with `num_threads` workers
    ///
    /// The prewarm task count defaults to the thread count.
    ///
    /// # Panics
    ///
    /// Panics if `num_threads` is zero
    pub fn new(num_threads: usize) -> Self {
        assert!(num_threads > 0, "Worker pool needs at least one thread");
        PoolConfig {
            num_threads,
            prewarm_tasks: num_threads,
            thread_name_prefix: "partition-worker".to_string(),
            log_pool_events: false,
        }
    }

    /// Enable debug logging of pool events
    pub fn with_logging(mut self) -> Self {
        self.log_pool_events = true;
        self
    }

    /// Set the number of no-op prewarm tasks
    pub fn with_prewarm_tasks(mut self, tasks: usize) -> Self {
        self.prewarm_tasks = tasks;
        self
    }

    /// Set the worker thread name prefix
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }
}

/// Counters describing pool activity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Tasks handed to the pool, prewarm tasks included
    pub dispatched: u64,
    /// Tasks that ran to completion
    pub completed: u64,
    /// Prewarm tasks submitted so far
    pub prewarmed: u64,
    /// Worker thread count
    pub threads: usize,
}

impl PoolStats {
    /// Tasks dispatched but not yet finished
    pub fn in_flight(&self) -> u64 {
        self.dispatched.saturating_sub(self.completed)
    }
}

#[derive(Debug, Default)]
struct Counters {
    dispatched: AtomicU64,
    completed: AtomicU64,
    prewarmed: AtomicU64,
}

/// Pool of workers that run fire-and-forget tasks
///
/// [`WorkerPool::spawn`] never blocks on the task; results travel back to
/// the caller through whatever channel the task captured.
pub struct WorkerPool {
    #[cfg(feature = "parallel")]
    pool: ThreadPool,
    config: PoolConfig,
    counters: Arc<Counters>,
}

impl WorkerPool {
    /// Build a pool from `config`
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying thread pool cannot be created.
    pub fn new(config: PoolConfig) -> crate::Result<Self> {
        #[cfg(feature = "parallel")]
        let pool = {
            let prefix = config.thread_name_prefix.clone();
            ThreadPoolBuilder::new()
                .num_threads(config.num_threads)
                .thread_name(move |i| format!("{}-{}", prefix, i))
                .build()?
        };

        if config.log_pool_events {
            debug!(threads = config.num_threads, "worker pool created");
        }

        Ok(WorkerPool {
            #[cfg(feature = "parallel")]
            pool,
            config,
            counters: Arc::new(Counters::default()),
        })
    }

    /// Run `task` on a worker without waiting for it
    pub fn spawn<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.counters.dispatched.fetch_add(1, Ordering::Relaxed);
        let counters = Arc::clone(&self.counters);
        let job = move || {
            task();
            counters.completed.fetch_add(1, Ordering::Release);
        };

        #[cfg(feature = "parallel")]
        self.pool.spawn(job);

        #[cfg(not(feature = "parallel"))]
        job();
    }

    /// Submit the configured number of no-op tasks
    ///
    /// Forces every worker thread to start up before the first real cycle.
    pub fn prewarm(&self) {
        let tasks = self.config.prewarm_tasks;
        for _ in 0..tasks {
            self.spawn(|| std::hint::black_box(()));
        }
        self.counters.prewarmed.fetch_add(tasks as u64, Ordering::Relaxed);
        if self.config.log_pool_events {
            debug!(tasks, "worker pool prewarmed");
        }
    }

    /// Number of worker threads
    pub fn threads(&self) -> usize {
        #[cfg(feature = "parallel")]
        {
            self.pool.current_num_threads()
        }
        #[cfg(not(feature = "parallel"))]
        {
            1
        }
    }

    /// Pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Snapshot of the pool counters
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            dispatched: self.counters.dispatched.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Acquire),
            prewarmed: self.counters.prewarmed.load(Ordering::Relaxed),
            threads: self.threads(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_pool_config_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.num_threads, hardware_concurrency());
        assert_eq!(config.prewarm_tasks, config.num_threads);
        assert_eq!(config.thread_name_prefix, "partition-worker");
        assert!(!config.log_pool_events);
    }

    #[test]
    fn test_pool_config_custom() {
        let config = PoolConfig::new(3)
            .with_prewarm_tasks(7)
            .with_thread_name_prefix("bench")
            .with_logging();

        assert_eq!(config.num_threads, 3);
        assert_eq!(config.prewarm_tasks, 7);
        assert_eq!(config.thread_name_prefix, "bench");
        assert!(config.log_pool_events);
    }

    #[test]
    #[should_panic(expected = "Worker pool needs at least one thread")]
    fn test_zero_threads() {
        PoolConfig::new(0);
    }

    #[test]
    fn test_spawn_runs_tasks() {
        let pool = WorkerPool::new(PoolConfig::new(2)).unwrap();
        let (tx, rx) = unbounded();
        for i in 0..10u32 {
            let tx = tx.clone();
            pool.spawn(move || tx.send(i).unwrap());
        }
        let mut received: Vec<u32> = (0..10).map(|_| rx.recv().unwrap()).collect();
        received.sort_unstable();
        assert_eq!(received, (0..10).collect::<Vec<_>>());
        assert_eq!(pool.stats().dispatched, 10);
    }

    #[test]
    fn test_prewarm_counts() {
        let pool = WorkerPool::new(PoolConfig::new(2).with_prewarm_tasks(4)).unwrap();
        pool.prewarm();
        let stats = pool.stats();
        assert_eq!(stats.prewarmed, 4);
        assert_eq!(stats.dispatched, 4);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_thread_count() {
        let pool = WorkerPool::new(PoolConfig::new(3)).unwrap();
        assert_eq!(pool.threads(), 3);
        assert_eq!(pool.stats().threads, 3);
    }

    #[test]
    fn test_hardware_concurrency_positive() {
        assert!(hardware_concurrency() >= 1);
    }
}
