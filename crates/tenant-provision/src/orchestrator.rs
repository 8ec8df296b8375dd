//! Provisioning Orchestrator
//!
//! Runs the canonical step sequence forward for create and reversed for
//! teardown. A failed create first rolls the buffered store session back,
//! then compensates every step that already succeeded, in reverse order; the
//! failed step itself is never compensated. Teardown is a best-effort sweep
//! over the full reversed sequence, so it converges even when earlier
//! attempts left partial state behind.

use crate::context::{Collaborators, ProvisionContext};
use crate::step::{Step, StepReport};
use crate::steps::canonical_registry;
use std::sync::Arc;
use tenant_core::{
    names, EventName, ProjectCreateRequest, ProjectId, ProvisionConfig, StoreError, UserId,
    ValidationError,
};
use tracing::{error, info, warn};

/// Create-run failure
#[derive(Debug, thiserror::Error)]
pub enum ProjectCreateError {
    /// The request was rejected before any step ran
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// A step failed; the run was compensated
    #[error("provisioning step '{step}' failed: {message}")]
    StepFailed {
        /// Name of the failed step
        step: String,
        /// Failure detail
        message: String,
        /// Forward reports for every attempted step, failed one included
        progress: Vec<StepReport>,
        /// Reverse reports for the compensation sweep, newest first
        rollback_progress: Vec<StepReport>,
    },
    /// The committed row vanished mid-run
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A step contract violation surfaced outside the step loop
    #[error(transparent)]
    Step(#[from] crate::step::StepError),
}

/// Teardown outcome
#[derive(Debug)]
pub enum DeleteOutcome {
    /// No such project row
    NotFound,
    /// The reverse sweep ran to completion
    Deleted {
        /// Reverse report for every step, failed ones included
        statuses: Vec<StepReport>,
    },
}

/// Sequenced, compensable project provisioning
pub struct Orchestrator {
    collab: Collaborators,
    config: ProvisionConfig,
}

impl Orchestrator {
    /// Create an orchestrator over the collaborators
    pub fn new(collab: Collaborators, config: ProvisionConfig) -> Self {
        Self { collab, config }
    }

    /// The orchestrator's collaborators
    pub fn collaborators(&self) -> &Collaborators {
        &self.collab
    }

    /// Provision a project end to end.
    ///
    /// The success flag on the row only ever becomes true in the same commit
    /// that publishes the row, so a visible `create_success = false` row
    /// always means an interrupted earlier run.
    pub async fn create_project(
        &self,
        request: ProjectCreateRequest,
        owner_id: UserId,
        roles: Vec<String>,
    ) -> Result<Vec<StepReport>, ProjectCreateError> {
        request.validate()?;

        let registry = canonical_registry(&self.collab, &self.config);
        let mut cx = ProvisionContext::for_create(&self.collab.store, request, owner_id, roles);
        let mut attempted: Vec<Arc<Step>> = Vec::new();

        for step in registry.steps() {
            attempted.push(step.clone());
            if let Err(e) = step.create(&mut cx).await {
                error!(step = step.name(), error = %e, "provisioning failed, compensating");
                return Err(self.compensate(cx, attempted, e.to_string()).await);
            }
        }

        let project_id = cx.project_id()?;
        cx.session.set_create_success(project_id, true)?;
        let ProvisionContext { session, admin_user_id, .. } = cx;
        session.commit();

        if let Some(project) = self.collab.store.get(project_id) {
            self.collab
                .bus
                .fire(EventName::ProjectCreated, project.to_public_json());
        }
        let mut affected = vec![owner_id];
        affected.extend(admin_user_id);
        self.collab.cache.invalidate(&affected);
        info!(project = %project_id, "project provisioned");

        Ok(attempted.iter().map(|s| s.report_created()).collect())
    }

    /// Roll the session back, then undo every step that succeeded before the
    /// failed one, newest first. Compensation failures are logged and
    /// swallowed; the sweep always runs to the end.
    async fn compensate(
        &self,
        mut cx: ProvisionContext,
        attempted: Vec<Arc<Step>>,
        message: String,
    ) -> ProjectCreateError {
        cx.session.rollback();

        let mut rollback_progress = Vec::new();
        if self.config.rollback_on_error {
            let succeeded = &attempted[..attempted.len() - 1];
            for step in succeeded.iter().rev() {
                if let Err(e) = step.delete(&mut cx).await {
                    warn!(step = step.name(), error = %e, "compensation step failed");
                }
                rollback_progress.push(step.report_deleted());
            }
        }

        let failed = attempted
            .last()
            .map(|s| s.name().to_string())
            .unwrap_or_default();
        ProjectCreateError::StepFailed {
            step: failed,
            message,
            progress: attempted.iter().map(|s| s.report_created()).collect(),
            rollback_progress,
        }
    }

    /// Tear a project down.
    ///
    /// Every registered step's delete runs in reverse canonical order
    /// regardless of individual failures, so repeated calls converge on a
    /// fully removed project.
    pub async fn delete_project(&self, project_id: ProjectId) -> DeleteOutcome {
        let Some(project) = self.collab.store.get(project_id) else {
            return DeleteOutcome::NotFound;
        };

        // Best-effort resolution of accounts to clean up and caches to drop.
        let system_user_id = match self
            .collab
            .identity
            .find_user_by_email(&names::system_user_email(project_id))
            .await
        {
            Ok(user) => user.map(|u| u.id),
            Err(e) => {
                warn!(project = %project_id, error = %e, "system account lookup failed");
                None
            }
        };
        let mut affected = match self.collab.identity.users_in_project(project_id).await {
            Ok(members) => members,
            Err(e) => {
                warn!(project = %project_id, error = %e, "membership lookup failed");
                Vec::new()
            }
        };
        affected.push(project.owner_id);

        let registry = canonical_registry(&self.collab, &self.config);
        let mut cx = ProvisionContext::for_delete(&self.collab.store, project_id, system_user_id);

        let mut statuses = Vec::with_capacity(registry.len());
        for step in registry.steps().iter().rev() {
            if let Err(e) = step.delete(&mut cx).await {
                warn!(step = step.name(), error = %e, "teardown step failed, continuing");
            }
            statuses.push(step.report_deleted());
        }

        self.collab.bus.fire(
            EventName::ProjectDeleted,
            serde_json::json!({ "project_id": project_id }),
        );
        self.collab.cache.invalidate(&affected);
        info!(project = %project_id, "project deleted");

        DeleteOutcome::Deleted { statuses }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestHarness;
    use tenant_core::quota::QuotaVerdict;
    use tenant_core::ResourceClass;
    use uuid::Uuid;

    fn request(name: &str) -> ProjectCreateRequest {
        ProjectCreateRequest::new(name, "admin@x.com", vec!["configuration".into()])
    }

    #[tokio::test]
    async fn test_full_create_provisions_everything() {
        let harness = TestHarness::new();
        let owner = Uuid::new_v4();

        let reports = harness
            .orchestrator()
            .create_project(request("acme"), owner, vec![])
            .await
            .unwrap();

        assert_eq!(reports.len(), 10);
        assert!(reports.iter().all(|r| r.ok == Some(true)));

        let project = harness.store.find_by_name("acme").unwrap();
        assert!(project.create_success);
        assert!(harness.store.quota(project.id).is_some());
        assert!(harness.store.has_schema(&names::schema_name(project.id)));
        assert_eq!(harness.objects.bucket_count(), 2);
        assert!(harness.secrets.has_space(project.id));
        assert!(harness.broker.has_vhost(&names::broker_vhost(project.id)));
        assert_eq!(harness.tsdb.database_count(), 4);
        // System account + admin account
        assert_eq!(harness.identity.user_count(), 2);
        assert_eq!(harness.bus.fired_named(EventName::ProjectCreated).len(), 1);

        // The quota honors the request's ceilings
        let quota = harness.store.quota(project.id).unwrap();
        let stat = harness.store.statistic(project.id).unwrap();
        assert_eq!(quota.check(&stat, ResourceClass::Compute), QuotaVerdict::Allowed);
    }

    #[tokio::test]
    async fn test_validation_failure_has_zero_side_effects() {
        let harness = TestHarness::new();
        let bad = ProjectCreateRequest::new("", "admin@x.com", vec![]);

        let err = harness
            .orchestrator()
            .create_project(bad, Uuid::new_v4(), vec![])
            .await
            .unwrap_err();

        assert!(matches!(err, ProjectCreateError::Validation(_)));
        assert_eq!(harness.store.project_count(), 0);
        assert_eq!(harness.identity.user_count(), 0);
        assert!(harness.bus.fired().is_empty());
    }

    #[tokio::test]
    async fn test_midway_failure_compensates_in_reverse() {
        let harness = TestHarness::new();
        harness.secrets.fail_next("create_project_space");

        let err = harness
            .orchestrator()
            .create_project(request("acme"), Uuid::new_v4(), vec![])
            .await
            .unwrap_err();

        let ProjectCreateError::StepFailed {
            step,
            progress,
            rollback_progress,
            ..
        } = err
        else {
            panic!("expected StepFailed");
        };
        assert_eq!(step, "project_secrets");
        assert_eq!(progress.len(), 7);
        assert_eq!(progress.last().unwrap().ok, Some(false));

        // Compensation covers the six earlier steps, newest first, and
        // excludes the failed step itself.
        let rolled: Vec<_> = rollback_progress.iter().map(|r| r.step.as_str()).collect();
        assert_eq!(
            rolled,
            vec![
                "system_token",
                "system_user",
                "role_grants",
                "project_schema",
                "object_buckets",
                "project_record",
            ]
        );
        assert!(rollback_progress.iter().all(|r| r.ok == Some(true)));

        // Nothing survives the rollback
        assert_eq!(harness.store.project_count(), 0);
        assert_eq!(harness.objects.bucket_count(), 0);
        assert_eq!(harness.identity.user_count(), 0);
        assert_eq!(harness.secrets.space_count(), 0);
        assert!(harness.bus.fired_named(EventName::ProjectCreated).is_empty());
    }

    #[tokio::test]
    async fn test_rollback_can_be_disabled() {
        let harness = TestHarness::new();
        harness.secrets.fail_next("create_project_space");
        let config = ProvisionConfig {
            rollback_on_error: false,
            ..ProvisionConfig::default()
        };

        let err = harness
            .orchestrator_with(config)
            .create_project(request("acme"), Uuid::new_v4(), vec![])
            .await
            .unwrap_err();

        let ProjectCreateError::StepFailed { rollback_progress, .. } = err else {
            panic!("expected StepFailed");
        };
        assert!(rollback_progress.is_empty());
        // The session still rolled back, but external resources stay
        assert_eq!(harness.store.project_count(), 0);
        assert_eq!(harness.objects.bucket_count(), 2);
    }

    #[tokio::test]
    async fn test_success_flag_never_visible_as_false() {
        let harness = TestHarness::new();
        let owner = Uuid::new_v4();

        harness
            .orchestrator()
            .create_project(request("acme"), owner, vec![])
            .await
            .unwrap();

        // The only visible row is the committed, successful one
        for project in harness.store.list(None, None, 0) {
            assert!(project.create_success);
        }
    }

    #[tokio::test]
    async fn test_delete_sweeps_everything() {
        let harness = TestHarness::new();
        let owner = Uuid::new_v4();
        let orchestrator = harness.orchestrator();

        orchestrator
            .create_project(request("acme"), owner, vec![])
            .await
            .unwrap();
        let project = harness.store.find_by_name("acme").unwrap();

        let outcome = orchestrator.delete_project(project.id).await;
        let DeleteOutcome::Deleted { statuses } = outcome else {
            panic!("expected Deleted");
        };
        assert_eq!(statuses.len(), 10);
        assert!(statuses.iter().all(|s| s.ok == Some(true)));

        assert!(harness.store.get(project.id).is_none());
        assert_eq!(harness.objects.bucket_count(), 0);
        assert_eq!(harness.tsdb.database_count(), 0);
        assert!(!harness.secrets.has_space(project.id));
        assert!(!harness.broker.has_vhost(&names::broker_vhost(project.id)));
        // System account gone, admin account survives
        assert_eq!(harness.identity.user_count(), 1);
        assert_eq!(harness.bus.fired_named(EventName::ProjectDeleted).len(), 1);
    }

    #[tokio::test]
    async fn test_delete_swallows_step_failures() {
        let harness = TestHarness::new();
        let owner = Uuid::new_v4();
        let orchestrator = harness.orchestrator();

        orchestrator
            .create_project(request("acme"), owner, vec![])
            .await
            .unwrap();
        let project = harness.store.find_by_name("acme").unwrap();

        harness.objects.fail_next("remove_bucket");
        let outcome = orchestrator.delete_project(project.id).await;
        let DeleteOutcome::Deleted { statuses } = outcome else {
            panic!("expected Deleted");
        };

        // Every step reported, the bucket one as failed
        assert_eq!(statuses.len(), 10);
        let buckets = statuses.iter().find(|s| s.step == "object_buckets").unwrap();
        assert_eq!(buckets.ok, Some(false));
        // The sweep kept going past the failure
        assert!(harness.store.get(project.id).is_none());
        assert_eq!(harness.bus.fired_named(EventName::ProjectDeleted).len(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_project() {
        let harness = TestHarness::new();
        let outcome = harness.orchestrator().delete_project(Uuid::new_v4()).await;
        assert!(matches!(outcome, DeleteOutcome::NotFound));
        assert!(harness.bus.fired().is_empty());
    }
}
