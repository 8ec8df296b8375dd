//! Identity Steps: Roles, System Account, Token, Admin Binding

use crate::context::ProvisionContext;
use crate::step::{StepBody, StepError};
use async_trait::async_trait;
use std::sync::Arc;
use tenant_clients::identity::{default_permissions, PROJECT_ROLES};
use tenant_clients::{IdentityProvider, RoleScope};
use tenant_core::{names, EventBus, EventName, VisibilityCache};
use tracing::{debug, info};

/// Project role namespace with the built-in role set
pub struct RoleGrants {
    identity: Arc<dyn IdentityProvider>,
}

impl RoleGrants {
    /// Create the step over an identity provider
    pub fn new(identity: Arc<dyn IdentityProvider>) -> Self {
        Self { identity }
    }
}

#[async_trait]
impl StepBody for RoleGrants {
    fn name(&self) -> &'static str {
        "role_grants"
    }

    async fn create(&self, cx: &mut ProvisionContext) -> Result<(), StepError> {
        let project_id = cx.project_id()?;
        for role in PROJECT_ROLES {
            self.identity.add_project_role(project_id, role).await?;
            self.identity
                .set_role_permissions(project_id, role, &default_permissions(role))
                .await?;
        }
        Ok(())
    }

    async fn delete(&self, cx: &mut ProvisionContext) -> Result<(), StepError> {
        let project_id = cx.project_id()?;
        self.identity.delete_project_roles(project_id).await?;
        Ok(())
    }
}

/// Per-project system service account.
///
/// The account is keyed by its derived email, so re-entry finds the existing
/// account instead of minting a second one.
pub struct SystemUser {
    identity: Arc<dyn IdentityProvider>,
}

impl SystemUser {
    /// Create the step over an identity provider
    pub fn new(identity: Arc<dyn IdentityProvider>) -> Self {
        Self { identity }
    }
}

#[async_trait]
impl StepBody for SystemUser {
    fn name(&self) -> &'static str {
        "system_user"
    }

    async fn create(&self, cx: &mut ProvisionContext) -> Result<(), StepError> {
        let project_id = cx.project_id()?;
        let email = names::system_user_email(project_id);

        let user_id = match self.identity.find_user_by_email(&email).await? {
            Some(existing) => {
                debug!(project = %project_id, user = %existing.id, "system account already exists");
                existing.id
            }
            None => {
                let user_id = self
                    .identity
                    .add_user(&email, &names::system_user_name(project_id))
                    .await?;
                self.identity
                    .assign_role(user_id, "system", RoleScope::Administration)
                    .await?;
                info!(project = %project_id, user = %user_id, "system account created");
                user_id
            }
        };
        cx.system_user_id = Some(user_id);
        Ok(())
    }

    async fn delete(&self, cx: &mut ProvisionContext) -> Result<(), StepError> {
        // The account may never have been resolved (teardown of a half-built
        // project); nothing to do then.
        if let Some(user_id) = cx.system_user_id {
            self.identity.delete_user(user_id).await?;
        }
        Ok(())
    }
}

/// API token for the system account, encoded into the run context
pub struct SystemToken {
    identity: Arc<dyn IdentityProvider>,
}

impl SystemToken {
    /// Create the step over an identity provider
    pub fn new(identity: Arc<dyn IdentityProvider>) -> Self {
        Self { identity }
    }
}

#[async_trait]
impl StepBody for SystemToken {
    fn name(&self) -> &'static str {
        "system_token"
    }

    async fn create(&self, cx: &mut ProvisionContext) -> Result<(), StepError> {
        let user_id = cx.system_user_id()?;
        let token_id = match self.identity.list_tokens(user_id).await?.first() {
            Some(existing) => existing.id,
            None => self.identity.add_token(user_id, "api").await?,
        };
        cx.system_token = Some(self.identity.encode_token(token_id).await?);
        Ok(())
    }

    async fn delete(&self, cx: &mut ProvisionContext) -> Result<(), StepError> {
        if let Some(user_id) = cx.system_user_id {
            for token in self.identity.list_tokens(user_id).await? {
                self.identity.delete_token(token.id).await?;
            }
        }
        Ok(())
    }
}

/// Final step: bind the requesting admin to the project and announce it
pub struct ProjectAdmin {
    identity: Arc<dyn IdentityProvider>,
    bus: Arc<dyn EventBus>,
    cache: Arc<VisibilityCache>,
}

impl ProjectAdmin {
    /// Create the step over the identity provider, event bus and cache
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        bus: Arc<dyn EventBus>,
        cache: Arc<VisibilityCache>,
    ) -> Self {
        Self { identity, bus, cache }
    }
}

#[async_trait]
impl StepBody for ProjectAdmin {
    fn name(&self) -> &'static str {
        "project_admin"
    }

    async fn create(&self, cx: &mut ProvisionContext) -> Result<(), StepError> {
        let project_id = cx.project_id()?;
        let request = cx.request()?.clone();

        let admin_id = match self.identity.find_user_by_email(&request.admin_email).await? {
            Some(existing) => existing.id,
            None => {
                let name = request
                    .admin_email
                    .split('@')
                    .next()
                    .unwrap_or(&request.admin_email);
                self.identity.add_user(&request.admin_email, name).await?
            }
        };

        let roles: Vec<String> = if cx.roles.is_empty() {
            vec!["admin".to_string()]
        } else {
            cx.roles.clone()
        };
        self.identity
            .add_user_to_project(project_id, admin_id, &roles)
            .await?;
        cx.admin_user_id = Some(admin_id);

        self.bus.fire(
            EventName::UserAddedToProject,
            serde_json::json!({
                "project_id": project_id,
                "user_id": admin_id,
                "roles": roles,
            }),
        );
        self.cache.invalidate(&[admin_id]);
        Ok(())
    }

    async fn delete(&self, cx: &mut ProvisionContext) -> Result<(), StepError> {
        let project_id = cx.project_id()?;
        let members = self.identity.users_in_project(project_id).await?;
        for user_id in &members {
            self.identity
                .remove_user_from_project(project_id, *user_id)
                .await?;
            self.bus.fire(
                EventName::UserRemovedFromProject,
                serde_json::json!({
                    "project_id": project_id,
                    "user_id": user_id,
                }),
            );
        }
        self.cache.invalidate(&members);
        Ok(())
    }
}
