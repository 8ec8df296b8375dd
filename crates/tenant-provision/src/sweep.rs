//! Convergence Sweep
//!
//! Periodic repair job: walk every registered human user and make sure their
//! personal project exists and finished provisioning. Rows whose success flag
//! never flipped are torn down and rebuilt. Per-user failures are logged and
//! counted; the sweep always visits everyone.

use crate::visitors::{PersonalOutcome, PersonalProjects};
use std::sync::Arc;
use tenant_clients::{IdentityError, IdentityProvider};
use tenant_core::names;
use tracing::{info, warn};

/// Tally of one sweep run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvergenceReport {
    /// Users whose personal project was already healthy
    pub already_provisioned: usize,
    /// Personal projects created from scratch
    pub created: usize,
    /// Half-provisioned rows torn down and rebuilt
    pub recreated: usize,
    /// Users whose repair failed this run
    pub failed: usize,
}

/// Walks all users and repairs their personal projects
pub struct ConvergenceSweep {
    personal: Arc<PersonalProjects>,
    identity: Arc<dyn IdentityProvider>,
}

impl ConvergenceSweep {
    /// Create a sweep over the personal-project service
    pub fn new(personal: Arc<PersonalProjects>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { personal, identity }
    }

    /// Run one full sweep
    pub async fn run(&self) -> Result<ConvergenceReport, IdentityError> {
        let mut report = ConvergenceReport::default();
        for user in self.identity.list_users().await? {
            if names::is_system_user_name(&user.name)
                || names::parse_system_user_email(&user.email).is_some()
            {
                continue;
            }
            match self.personal.ensure(user.id).await {
                Ok(PersonalOutcome::AlreadyProvisioned(_)) => report.already_provisioned += 1,
                Ok(PersonalOutcome::Created(_)) => report.created += 1,
                Ok(PersonalOutcome::Recreated(_)) => report.recreated += 1,
                Err(e) => {
                    warn!(user = %user.id, error = %e, "personal project repair failed");
                    report.failed += 1;
                }
            }
        }
        info!(
            created = report.created,
            recreated = report.recreated,
            already = report.already_provisioned,
            failed = report.failed,
            "convergence sweep finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestHarness;
    use tenant_core::Project;

    #[tokio::test]
    async fn test_sweep_provisions_missing_and_repairs_broken() {
        let harness = TestHarness::new();
        let alice = harness.identity.add_user("a@x.com", "Alice").await.unwrap();
        let bob = harness.identity.add_user("b@x.com", "Bob").await.unwrap();

        // Bob carries a half-provisioned row from an interrupted earlier run
        let broken = Project::new(&names::personal_project_name(bob), bob, vec![]);
        let mut session = harness.store.direct();
        session.upsert_project(broken);

        let personal = Arc::new(harness.personal_projects());
        let sweep = ConvergenceSweep::new(personal.clone(), harness.identity.clone());

        let report = sweep.run().await.unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.recreated, 1);
        assert_eq!(report.failed, 0);

        for user in [alice, bob] {
            let id = personal.personal_project_id(user).unwrap();
            assert!(harness.store.get(id).unwrap().create_success);
        }

        // A second sweep converges to all-healthy
        let report = sweep.run().await.unwrap();
        assert_eq!(report.created, 0);
        assert_eq!(report.recreated, 0);
        assert!(report.already_provisioned >= 2);
    }

    #[tokio::test]
    async fn test_sweep_ignores_system_accounts() {
        let harness = TestHarness::new();
        let project_id = uuid::Uuid::new_v4();
        harness
            .identity
            .add_user(
                &names::system_user_email(project_id),
                &names::system_user_name(project_id),
            )
            .await
            .unwrap();

        let personal = Arc::new(harness.personal_projects());
        let sweep = ConvergenceSweep::new(personal, harness.identity.clone());

        let report = sweep.run().await.unwrap();
        assert_eq!(report, ConvergenceReport::default());
        assert_eq!(harness.store.project_count(), 0);
    }
}
