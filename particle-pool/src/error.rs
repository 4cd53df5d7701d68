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
//! Error types
//!
//! Recoverable failures surface as [`SimError`]. Caller contract breaches
//! (adding particles before the manager is initialized, initializing twice,
//! invalid canvas dimensions) are not represented here: they panic at the
//! call site.

use thiserror::Error;

/// Errors produced by the simulation core, its configuration and its
/// peer-facing surfaces
#[derive(Error, Debug)]
pub enum SimError {
    /// A batch request asked for zero particles
    #[error("batch count must be a positive integer")]
    EmptyBatch,

    /// A batch request asked for more particles than one batch may create
    #[error("batch of {count} particles exceeds the limit of {max}")]
    BatchTooLarge {
        /// Requested particle count
        count: usize,
        /// Largest accepted count
        max: usize,
    },

    /// A batch parameter was NaN or infinite
    #[error("batch parameter `{name}` must be finite, got {value}")]
    NonFiniteParameter {
        /// Name of the offending parameter
        name: &'static str,
        /// The rejected value
        value: f64,
    },

    /// A textual batch request could not be parsed
    #[error("malformed batch request `{0}`")]
    MalformedBatch(String),

    /// A wire record could not be parsed
    #[error("malformed wire record `{0}`")]
    MalformedRecord(String),

    /// A peer sent a command line that is not part of the protocol
    #[error("unknown peer command `{0}`")]
    UnknownCommand(String),

    /// Configuration values failed validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be parsed
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Underlying I/O failure (configuration file, sockets)
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The worker thread pool could not be constructed
    #[cfg(feature = "parallel")]
    #[error("failed to build worker pool: {0}")]
    PoolBuild(#[from] rayon::ThreadPoolBuildError),
}

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, SimError>;
