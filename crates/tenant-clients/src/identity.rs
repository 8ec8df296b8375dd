//! Identity Provider Boundary
//!
//! Users, API tokens, role grants and project membership. Creation is
//! create-if-absent throughout: registering an email that already exists
//! returns the existing user ID instead of erroring, because provisioning
//! steps may be re-entered.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tenant_core::model::{ProjectId, TokenId, UserId};
use uuid::Uuid;

/// Identity provider failure
#[derive(Debug, Clone, thiserror::Error)]
pub enum IdentityError {
    /// No such user
    #[error("user not found: {0}")]
    UserNotFound(UserId),
    /// No such token
    #[error("token not found: {0}")]
    TokenNotFound(TokenId),
    /// Backend failure
    #[error("identity provider error: {0}")]
    Backend(String),
}

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// User ID
    pub id: UserId,
    /// Email, unique
    pub email: String,
    /// Display name
    pub name: String,
}

/// An API token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Token ID
    pub id: TokenId,
    /// Owning user
    pub user_id: UserId,
    /// Token kind, e.g. "api"
    pub kind: String,
}

/// Scope of a role assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoleScope {
    /// Platform administration scope
    Administration,
    /// Scoped to one project
    Project(ProjectId),
}

/// Identity provider boundary
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Register a user. Returns the existing ID when the email is taken.
    async fn add_user(&self, email: &str, name: &str) -> Result<UserId, IdentityError>;

    /// Look up a user by email
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, IdentityError>;

    /// Look up a user by ID
    async fn get_user(&self, user_id: UserId) -> Result<Option<UserRecord>, IdentityError>;

    /// Every registered user, system accounts included
    async fn list_users(&self) -> Result<Vec<UserRecord>, IdentityError>;

    /// Delete a user. Absent users are a no-op.
    async fn delete_user(&self, user_id: UserId) -> Result<(), IdentityError>;

    /// Grant a role to a user within a scope
    async fn assign_role(&self, user_id: UserId, role: &str, scope: RoleScope) -> Result<(), IdentityError>;

    /// Tokens owned by a user
    async fn list_tokens(&self, user_id: UserId) -> Result<Vec<TokenRecord>, IdentityError>;

    /// Look up a token
    async fn get_token(&self, token_id: TokenId) -> Result<Option<TokenRecord>, IdentityError>;

    /// Mint a token for a user
    async fn add_token(&self, user_id: UserId, kind: &str) -> Result<TokenId, IdentityError>;

    /// Encode a token for transport
    async fn encode_token(&self, token_id: TokenId) -> Result<String, IdentityError>;

    /// Delete a token. Absent tokens are a no-op.
    async fn delete_token(&self, token_id: TokenId) -> Result<(), IdentityError>;

    /// Register a role inside a project namespace. Existing roles are a no-op.
    async fn add_project_role(&self, project_id: ProjectId, role: &str) -> Result<(), IdentityError>;

    /// Attach a permission set to a project role
    async fn set_role_permissions(
        &self,
        project_id: ProjectId,
        role: &str,
        permissions: &[String],
    ) -> Result<(), IdentityError>;

    /// Drop every role in a project namespace
    async fn delete_project_roles(&self, project_id: ProjectId) -> Result<(), IdentityError>;

    /// Bind a user to a project with roles. Re-binding replaces the roles.
    async fn add_user_to_project(
        &self,
        project_id: ProjectId,
        user_id: UserId,
        roles: &[String],
    ) -> Result<(), IdentityError>;

    /// Unbind a user from a project. Absent bindings are a no-op.
    async fn remove_user_from_project(&self, project_id: ProjectId, user_id: UserId) -> Result<(), IdentityError>;

    /// Users bound to a project
    async fn users_in_project(&self, project_id: ProjectId) -> Result<Vec<UserId>, IdentityError>;

    /// Whether a user is bound to a project
    async fn is_user_in_project(&self, project_id: ProjectId, user_id: UserId) -> Result<bool, IdentityError>;
}

/// Built-in project roles
pub const PROJECT_ROLES: [&str; 3] = ["admin", "editor", "viewer"];

/// Default permission set for a built-in project role
pub fn default_permissions(role: &str) -> Vec<String> {
    let perms: &[&str] = match role {
        "admin" => &[
            "project.view",
            "project.edit",
            "project.delete",
            "quota.view",
            "quota.edit",
        ],
        "editor" => &["project.view", "project.edit", "quota.view"],
        "viewer" => &["project.view", "quota.view"],
        _ => &[],
    };
    perms.iter().map(|p| p.to_string()).collect()
}

/// In-memory identity provider
#[derive(Default)]
pub struct InMemoryIdentity {
    users: DashMap<UserId, UserRecord>,
    emails: DashMap<String, UserId>,
    tokens: DashMap<TokenId, TokenRecord>,
    role_grants: RwLock<HashSet<(UserId, String, RoleScope)>>,
    project_roles: RwLock<HashMap<ProjectId, HashMap<String, Vec<String>>>>,
    membership: RwLock<HashMap<ProjectId, HashMap<UserId, Vec<String>>>>,
    fail_next: Mutex<HashSet<&'static str>>,
}

impl InMemoryIdentity {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered users
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Number of live tokens
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Roles registered in a project namespace
    pub fn project_role_names(&self, project_id: ProjectId) -> Vec<String> {
        self.project_roles
            .read()
            .get(&project_id)
            .map(|roles| roles.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Make the next call of the named operation fail. Test hook.
    pub fn fail_next(&self, op: &'static str) {
        self.fail_next.lock().insert(op);
    }

    fn take_failure(&self, op: &'static str) -> Result<(), IdentityError> {
        if self.fail_next.lock().remove(op) {
            return Err(IdentityError::Backend(format!("injected failure: {op}")));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentity {
    async fn add_user(&self, email: &str, name: &str) -> Result<UserId, IdentityError> {
        self.take_failure("add_user")?;
        let email = email.to_lowercase();
        if let Some(existing) = self.emails.get(&email) {
            return Ok(*existing);
        }
        let user = UserRecord {
            id: Uuid::new_v4(),
            email: email.clone(),
            name: name.to_string(),
        };
        let id = user.id;
        self.users.insert(id, user);
        self.emails.insert(email, id);
        Ok(id)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, IdentityError> {
        self.take_failure("find_user_by_email")?;
        let email = email.to_lowercase();
        Ok(self
            .emails
            .get(&email)
            .and_then(|id| self.users.get(&id).map(|u| u.clone())))
    }

    async fn get_user(&self, user_id: UserId) -> Result<Option<UserRecord>, IdentityError> {
        self.take_failure("get_user")?;
        Ok(self.users.get(&user_id).map(|u| u.clone()))
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, IdentityError> {
        self.take_failure("list_users")?;
        Ok(self.users.iter().map(|u| u.clone()).collect())
    }

    async fn delete_user(&self, user_id: UserId) -> Result<(), IdentityError> {
        self.take_failure("delete_user")?;
        if let Some((_, user)) = self.users.remove(&user_id) {
            self.emails.remove(&user.email);
        }
        self.tokens.retain(|_, t| t.user_id != user_id);
        self.role_grants.write().retain(|(uid, _, _)| *uid != user_id);
        Ok(())
    }

    async fn assign_role(&self, user_id: UserId, role: &str, scope: RoleScope) -> Result<(), IdentityError> {
        self.take_failure("assign_role")?;
        if !self.users.contains_key(&user_id) {
            return Err(IdentityError::UserNotFound(user_id));
        }
        self.role_grants
            .write()
            .insert((user_id, role.to_string(), scope));
        Ok(())
    }

    async fn list_tokens(&self, user_id: UserId) -> Result<Vec<TokenRecord>, IdentityError> {
        self.take_failure("list_tokens")?;
        Ok(self
            .tokens
            .iter()
            .filter(|t| t.user_id == user_id)
            .map(|t| t.clone())
            .collect())
    }

    async fn get_token(&self, token_id: TokenId) -> Result<Option<TokenRecord>, IdentityError> {
        self.take_failure("get_token")?;
        Ok(self.tokens.get(&token_id).map(|t| t.clone()))
    }

    async fn add_token(&self, user_id: UserId, kind: &str) -> Result<TokenId, IdentityError> {
        self.take_failure("add_token")?;
        if !self.users.contains_key(&user_id) {
            return Err(IdentityError::UserNotFound(user_id));
        }
        let token = TokenRecord {
            id: Uuid::new_v4(),
            user_id,
            kind: kind.to_string(),
        };
        let id = token.id;
        self.tokens.insert(id, token);
        Ok(id)
    }

    async fn encode_token(&self, token_id: TokenId) -> Result<String, IdentityError> {
        self.take_failure("encode_token")?;
        let token = self
            .tokens
            .get(&token_id)
            .ok_or(IdentityError::TokenNotFound(token_id))?;
        Ok(format!("tok.{}.{}", token.kind, token.id.simple()))
    }

    async fn delete_token(&self, token_id: TokenId) -> Result<(), IdentityError> {
        self.take_failure("delete_token")?;
        self.tokens.remove(&token_id);
        Ok(())
    }

    async fn add_project_role(&self, project_id: ProjectId, role: &str) -> Result<(), IdentityError> {
        self.take_failure("add_project_role")?;
        self.project_roles
            .write()
            .entry(project_id)
            .or_default()
            .entry(role.to_string())
            .or_default();
        Ok(())
    }

    async fn set_role_permissions(
        &self,
        project_id: ProjectId,
        role: &str,
        permissions: &[String],
    ) -> Result<(), IdentityError> {
        self.take_failure("set_role_permissions")?;
        self.project_roles
            .write()
            .entry(project_id)
            .or_default()
            .insert(role.to_string(), permissions.to_vec());
        Ok(())
    }

    async fn delete_project_roles(&self, project_id: ProjectId) -> Result<(), IdentityError> {
        self.take_failure("delete_project_roles")?;
        self.project_roles.write().remove(&project_id);
        Ok(())
    }

    async fn add_user_to_project(
        &self,
        project_id: ProjectId,
        user_id: UserId,
        roles: &[String],
    ) -> Result<(), IdentityError> {
        self.take_failure("add_user_to_project")?;
        if !self.users.contains_key(&user_id) {
            return Err(IdentityError::UserNotFound(user_id));
        }
        self.membership
            .write()
            .entry(project_id)
            .or_default()
            .insert(user_id, roles.to_vec());
        Ok(())
    }

    async fn remove_user_from_project(&self, project_id: ProjectId, user_id: UserId) -> Result<(), IdentityError> {
        self.take_failure("remove_user_from_project")?;
        if let Some(members) = self.membership.write().get_mut(&project_id) {
            members.remove(&user_id);
        }
        Ok(())
    }

    async fn users_in_project(&self, project_id: ProjectId) -> Result<Vec<UserId>, IdentityError> {
        self.take_failure("users_in_project")?;
        Ok(self
            .membership
            .read()
            .get(&project_id)
            .map(|members| members.keys().copied().collect())
            .unwrap_or_default())
    }

    async fn is_user_in_project(&self, project_id: ProjectId, user_id: UserId) -> Result<bool, IdentityError> {
        self.take_failure("is_user_in_project")?;
        Ok(self
            .membership
            .read()
            .get(&project_id)
            .is_some_and(|members| members.contains_key(&user_id)))
    }
}
