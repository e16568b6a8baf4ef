//! Job broker configuration.

use serde::{Deserialize, Serialize};

/// Which broker implementation backs the queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerBackend {
    /// Durable PostgreSQL job table shared by all processes.
    #[default]
    Postgres,
    /// Process-local store. Jobs are lost on restart.
    Memory,
}

/// Broker settings: backend, claim lease, retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Backend selection.
    #[serde(default)]
    pub backend: BrokerBackend,
    /// Claim lease length; an unacknowledged job becomes reclaimable after it.
    #[serde(default = "default_lease")]
    pub lease_seconds: u64,
    /// How long completed and cancelled jobs are retained.
    #[serde(default = "default_completed_retention")]
    pub completed_retention_hours: i64,
    /// Interval of the retention sweep.
    #[serde(default = "default_sweep_interval")]
    pub retention_sweep_seconds: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            backend: BrokerBackend::default(),
            lease_seconds: default_lease(),
            completed_retention_hours: default_completed_retention(),
            retention_sweep_seconds: default_sweep_interval(),
        }
    }
}

fn default_lease() -> u64 {
    30
}

fn default_completed_retention() -> i64 {
    24
}

fn default_sweep_interval() -> u64 {
    300
}
