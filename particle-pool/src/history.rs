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
//! Rolling latency history used by the growth heuristic

use std::collections::VecDeque;
use std::time::Duration;

/// Default number of cycle samples kept in the window
pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

/// Fixed-capacity window of per-cycle average advance durations
///
/// The reference average is the mean of the whole window, recomputed on
/// every record. The latest sample is part of the window it is compared
/// against.
#[derive(Debug, Clone)]
pub struct LatencyHistory {
    samples: VecDeque<Duration>,
    capacity: usize,
    reference: Duration,
}

impl LatencyHistory {
    /// Create an empty history holding at most `capacity` samples
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "History capacity must be positive");
        LatencyHistory {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            reference: Duration::ZERO,
        }
    }

    /// Append a sample, evicting the oldest one past capacity
    pub fn record(&mut self, sample: Duration) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        let total: Duration = self.samples.iter().sum();
        self.reference = total / self.samples.len() as u32;
    }

    /// Most recent sample
    pub fn latest(&self) -> Option<Duration> {
        self.samples.back().copied()
    }

    /// Mean of the samples currently in the window
    pub fn reference_average(&self) -> Duration {
        self.reference
    }

    /// Whether the latest sample is above the window mean
    pub fn is_trending_up(&self) -> bool {
        self.latest().is_some_and(|latest| latest > self.reference)
    }

    /// Number of samples in the window
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check whether no sample has been recorded
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Maximum number of samples kept
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &Duration> {
        self.samples.iter()
    }
}

impl Default for LatencyHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
