//! Canonical Provisioning Steps
//!
//! The canonical order is fixed: the record step first so every later step
//! can key off the project ID, identity before secrets so the token can be
//! stored as a secret, and the admin binding last so a project only becomes
//! reachable once everything under it exists. Feature-flagged steps are
//! simply never registered when their runtime is disabled.

mod access;
mod record;
mod services;

pub use access::{ProjectAdmin, RoleGrants, SystemToken, SystemUser};
pub use record::{ObjectBuckets, ProjectRecord, ProjectSchema};
pub use services::{BrokerVhost, ProjectSecrets, TsdbDatabases};

use crate::context::Collaborators;
use crate::registry::StepRegistry;
use crate::step::Step;
use tenant_core::ProvisionConfig;

/// Build the canonical step sequence for one run
pub fn canonical_registry(collab: &Collaborators, config: &ProvisionConfig) -> StepRegistry {
    let mut registry = StepRegistry::new();
    registry.register(Step::new(Box::new(ProjectRecord)));
    registry.register(Step::new(Box::new(ObjectBuckets::new(collab.objects.clone()))));
    registry.register(Step::new(Box::new(ProjectSchema)));
    registry.register(Step::new(Box::new(RoleGrants::new(collab.identity.clone()))));
    registry.register(Step::new(Box::new(SystemUser::new(collab.identity.clone()))));
    registry.register(Step::new(Box::new(SystemToken::new(collab.identity.clone()))));
    registry.register(Step::new(Box::new(ProjectSecrets::new(
        collab.secrets.clone(),
        config.default_results_retention.clone(),
    ))));
    if config.broker_enabled {
        registry.register(Step::new(Box::new(BrokerVhost::new(
            collab.broker.clone(),
            collab.secrets.clone(),
        ))));
    }
    if config.tsdb_enabled {
        registry.register(Step::new(Box::new(TsdbDatabases::new(
            collab.tsdb.clone(),
            config.tsdb_retention.clone(),
        ))));
    }
    registry.register(Step::new(Box::new(ProjectAdmin::new(
        collab.identity.clone(),
        collab.bus.clone(),
        collab.cache.clone(),
    ))));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestHarness;

    #[test]
    fn test_canonical_order() {
        let harness = TestHarness::new();
        let registry = canonical_registry(&harness.collaborators(), &ProvisionConfig::default());

        let names: Vec<_> = registry.steps().iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "project_record",
                "object_buckets",
                "project_schema",
                "role_grants",
                "system_user",
                "system_token",
                "project_secrets",
                "broker_vhost",
                "tsdb_databases",
                "project_admin",
            ]
        );
    }

    #[test]
    fn test_flags_leave_steps_out() {
        let harness = TestHarness::new();
        let config = ProvisionConfig {
            broker_enabled: false,
            tsdb_enabled: false,
            ..ProvisionConfig::default()
        };
        let registry = canonical_registry(&harness.collaborators(), &config);

        let names: Vec<_> = registry.steps().iter().map(|s| s.name()).collect();
        assert!(!names.contains(&"broker_vhost"));
        assert!(!names.contains(&"tsdb_databases"));
        assert_eq!(registry.len(), 8);
    }
}
