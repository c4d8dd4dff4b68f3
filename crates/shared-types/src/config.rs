//! # Swarm Configuration
//!
//! The recognized configuration surface for the swarm runtime. Loaded from
//! JSON (file or inline) with serde; every field has a default so partial
//! configs are valid. `validate()` rejects combinations the protocols cannot
//! honor.

use crate::entities::TopologyType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file or inline document could not be parsed.
    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field value is outside its legal range.
    #[error("Invalid config: {field} = {value} ({reason})")]
    InvalidField {
        /// The offending field name.
        field: &'static str,
        /// The rejected value, stringified.
        value: String,
        /// Why the value is rejected.
        reason: &'static str,
    },
}

/// Recognized swarm options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SwarmConfig {
    /// Maximum workers the queen will register.
    pub max_workers: usize,
    /// Upper bound `f` on Byzantine nodes tolerated (`n >= 3f+1` required
    /// per round).
    pub fault_tolerance: usize,
    /// Initial topology layout.
    pub topology: TopologyType,
    /// Worker heartbeat cadence.
    pub heartbeat_interval_ms: u64,
    /// Heartbeat silence after which a worker is marked failed.
    pub worker_timeout_ms: u64,
    /// Per-attempt election timeout; backoff jitters within this bound.
    pub election_timeout_ms: u64,
    /// Budget for `await_consensus` before `ConsensusTimeout`.
    pub consensus_timeout_ms: u64,
    /// Whether the queen keeps re-running elections after losing quorum.
    pub enable_failover: bool,
    /// Entry cap for the collective-memory collaborator.
    pub memory_capacity: usize,
    /// Multiplier on `worker_timeout_ms` before a worker self-degrades.
    pub degradation_threshold: u32,
    /// Concurrent directive executions per worker.
    pub max_concurrent_tasks: usize,
    /// Queue capacity = `max_concurrent_tasks * backlog_factor`.
    pub backlog_factor: usize,
    /// Cadence of the periodic partition-detection sweep.
    pub partition_check_interval_ms: u64,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            max_workers: 16,
            fault_tolerance: 1,
            topology: TopologyType::Hierarchical,
            heartbeat_interval_ms: 1_000,
            worker_timeout_ms: 5_000,
            election_timeout_ms: 3_000,
            consensus_timeout_ms: 10_000,
            enable_failover: true,
            memory_capacity: 10_000,
            degradation_threshold: 3,
            max_concurrent_tasks: 4,
            backlog_factor: 4,
            partition_check_interval_ms: 5_000,
        }
    }
}

impl SwarmConfig {
    /// Parse a JSON document, falling back to defaults for absent fields.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the protocols cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_workers == 0 {
            return Err(ConfigError::InvalidField {
                field: "maxWorkers",
                value: self.max_workers.to_string(),
                reason: "must be at least 1",
            });
        }
        if self.max_concurrent_tasks == 0 {
            return Err(ConfigError::InvalidField {
                field: "maxConcurrentTasks",
                value: self.max_concurrent_tasks.to_string(),
                reason: "must be at least 1",
            });
        }
        if self.backlog_factor == 0 {
            return Err(ConfigError::InvalidField {
                field: "backlogFactor",
                value: self.backlog_factor.to_string(),
                reason: "must be at least 1",
            });
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::InvalidField {
                field: "heartbeatIntervalMs",
                value: self.heartbeat_interval_ms.to_string(),
                reason: "must be non-zero",
            });
        }
        if self.worker_timeout_ms < self.heartbeat_interval_ms {
            return Err(ConfigError::InvalidField {
                field: "workerTimeoutMs",
                value: self.worker_timeout_ms.to_string(),
                reason: "must be at least heartbeatIntervalMs",
            });
        }
        if self.degradation_threshold == 0 {
            return Err(ConfigError::InvalidField {
                field: "degradationThreshold",
                value: self.degradation_threshold.to_string(),
                reason: "must be at least 1",
            });
        }
        Ok(())
    }

    /// Worker queue capacity derived from concurrency and backlog factor.
    #[must_use]
    pub fn directive_queue_capacity(&self) -> usize {
        self.max_concurrent_tasks * self.backlog_factor
    }

    /// Minimum membership a PBFT round needs under the configured `f`.
    #[must_use]
    pub fn min_consensus_nodes(&self) -> usize {
        3 * self.fault_tolerance + 1
    }
}
