//! Shared Collaborators and the Per-Run Context
//!
//! [`ProvisionContext`] is the typed accumulator threaded through every step
//! of one run. Earlier steps fill slots (project row, system user, token,
//! secret pointers) that later steps read; a step reading a slot that was
//! never produced gets [`StepError::MissingContext`] instead of a panic.

use crate::step::StepError;
use std::sync::Arc;
use tenant_clients::{BrokerAdmin, IdentityProvider, ObjectStore, SecretSpaceRef, SecretStore, TsdbAdmin};
use tenant_core::{
    EventBus, Project, ProjectCreateRequest, ProjectId, ProjectStore, StoreSession, UserId,
    VisibilityCache,
};

/// Every external system a provisioning run touches
#[derive(Clone)]
pub struct Collaborators {
    /// Relational store
    pub store: ProjectStore,
    /// Secret store
    pub secrets: Arc<dyn SecretStore>,
    /// Identity provider
    pub identity: Arc<dyn IdentityProvider>,
    /// Message-broker admin
    pub broker: Arc<dyn BrokerAdmin>,
    /// Time-series admin
    pub tsdb: Arc<dyn TsdbAdmin>,
    /// Object store
    pub objects: Arc<dyn ObjectStore>,
    /// Lifecycle event bus
    pub bus: Arc<dyn EventBus>,
    /// Per-user visibility cache
    pub cache: Arc<VisibilityCache>,
}

/// Typed accumulator for one provisioning or teardown run
pub struct ProvisionContext {
    /// The validated request, present on create runs
    pub request: Option<ProjectCreateRequest>,
    /// Requesting owner, present on create runs
    pub owner_id: Option<UserId>,
    /// Roles to bind the project admin with; empty means the default set
    pub roles: Vec<String>,
    /// Project row, filled by the record step
    pub project: Option<Project>,
    /// Project ID, filled by the record step (create) or given (delete)
    pub project_id: Option<ProjectId>,
    /// System service account, filled by the system-user step
    pub system_user_id: Option<UserId>,
    /// Project admin account, filled by the admin step
    pub admin_user_id: Option<UserId>,
    /// Encoded system token, filled by the token step
    pub system_token: Option<String>,
    /// Secret-space pointers, filled by the secrets step
    pub secret_refs: Option<SecretSpaceRef>,
    /// Store session: buffered on create runs, direct on teardown
    pub session: StoreSession,
}

impl ProvisionContext {
    /// Context for a create run. Store writes are buffered and only become
    /// visible on commit.
    pub fn for_create(
        store: &ProjectStore,
        request: ProjectCreateRequest,
        owner_id: UserId,
        roles: Vec<String>,
    ) -> Self {
        Self {
            request: Some(request),
            owner_id: Some(owner_id),
            roles,
            project: None,
            project_id: None,
            system_user_id: None,
            admin_user_id: None,
            system_token: None,
            secret_refs: None,
            session: store.session(),
        }
    }

    /// Context for a teardown run. Store writes go through immediately so
    /// partial teardown progress survives.
    pub fn for_delete(
        store: &ProjectStore,
        project_id: ProjectId,
        system_user_id: Option<UserId>,
    ) -> Self {
        Self {
            request: None,
            owner_id: None,
            roles: Vec::new(),
            project: store.get(project_id),
            project_id: Some(project_id),
            system_user_id,
            admin_user_id: None,
            system_token: None,
            secret_refs: None,
            session: store.direct(),
        }
    }

    /// The validated request
    pub fn request(&self) -> Result<&ProjectCreateRequest, StepError> {
        self.request.as_ref().ok_or(StepError::MissingContext("request"))
    }

    /// The requesting owner
    pub fn owner_id(&self) -> Result<UserId, StepError> {
        self.owner_id.ok_or(StepError::MissingContext("owner_id"))
    }

    /// The project ID under provisioning or teardown
    pub fn project_id(&self) -> Result<ProjectId, StepError> {
        self.project_id.ok_or(StepError::MissingContext("project_id"))
    }

    /// The system service account
    pub fn system_user_id(&self) -> Result<UserId, StepError> {
        self.system_user_id
            .ok_or(StepError::MissingContext("system_user_id"))
    }

    /// The encoded system token
    pub fn system_token(&self) -> Result<&str, StepError> {
        self.system_token
            .as_deref()
            .ok_or(StepError::MissingContext("system_token"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestHarness;
    use uuid::Uuid;

    #[test]
    fn test_create_context_is_buffered() {
        let harness = TestHarness::new();
        let request = ProjectCreateRequest::new("acme", "a@x.com", vec![]);
        let cx = ProvisionContext::for_create(&harness.store, request, Uuid::new_v4(), vec![]);

        assert!(cx.session.is_buffered());
        assert!(matches!(cx.project_id(), Err(StepError::MissingContext("project_id"))));
    }

    #[test]
    fn test_delete_context_is_direct() {
        let harness = TestHarness::new();
        let cx = ProvisionContext::for_delete(&harness.store, Uuid::new_v4(), None);

        assert!(!cx.session.is_buffered());
        assert!(cx.project_id().is_ok());
        assert!(cx.request().is_err());
    }
}
