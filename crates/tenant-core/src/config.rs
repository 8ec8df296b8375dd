//! Provisioning Configuration

use serde::{Deserialize, Serialize};

/// Orchestrator and step configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionConfig {
    /// Register the message-broker vhost step. When the broker runtime is not
    /// in use the step is left out of the registry entirely.
    pub broker_enabled: bool,
    /// Register the time-series database step
    pub tsdb_enabled: bool,
    /// Compensate (reverse-delete attempted steps) when a create step fails
    pub rollback_on_error: bool,
    /// Retention clause for created time-series databases
    pub tsdb_retention: String,
    /// Default results-retention secret value
    pub default_results_retention: String,
    /// Capability tags enabled on auto-created personal projects
    pub personal_project_plugins: Vec<String>,
    /// Max coalesced visitor entries
    pub visitor_cache_capacity: u64,
    /// Seconds a visitor entry suppresses re-processing
    pub visitor_cache_ttl_secs: u64,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            broker_enabled: true,
            tsdb_enabled: true,
            rollback_on_error: true,
            tsdb_retention: "duration 180d replication 1 shard duration 7d".to_string(),
            default_results_retention: "30d".to_string(),
            personal_project_plugins: vec!["configuration".into(), "models".into()],
            visitor_cache_capacity: 20_480,
            visitor_cache_ttl_secs: 300,
        }
    }
}
