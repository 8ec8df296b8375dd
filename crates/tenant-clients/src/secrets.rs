//! Secret Store Boundary
//!
//! Per-project secret spaces with two tiers: plain project secrets (visible
//! to the project's users) and hidden secrets (infrastructure pointers such
//! as derived database names). Reads of "all" secrets merge the shared admin
//! layer under hidden under plain, so project values override shared ones.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tenant_core::model::ProjectId;
use uuid::Uuid;

/// Secret key/value map
pub type SecretMap = HashMap<String, serde_json::Value>;

/// Opaque pointers to a project's secret space. Safe to persist on the
/// project row; never contains raw secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretSpaceRef {
    /// Mount/space path
    pub space: String,
    /// Access role id
    pub role_id: String,
    /// Access secret id handle
    pub secret_id: String,
}

/// Secret store failure
#[derive(Debug, Clone, thiserror::Error)]
pub enum SecretStoreError {
    /// Project has no secret space
    #[error("secret space not found for project {0}")]
    SpaceNotFound(ProjectId),
    /// Backend failure
    #[error("secret store error: {0}")]
    Backend(String),
}

/// Secret store boundary
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Create the project's secret space. Re-entrant: an existing space is
    /// returned, not an error.
    async fn create_project_space(&self, project_id: ProjectId) -> Result<SecretSpaceRef, SecretStoreError>;

    /// Plain project secrets
    async fn get_secrets(&self, project_id: ProjectId) -> Result<SecretMap, SecretStoreError>;

    /// Replace plain project secrets
    async fn set_secrets(&self, project_id: ProjectId, secrets: SecretMap) -> Result<(), SecretStoreError>;

    /// Hidden (infrastructure) project secrets
    async fn get_hidden_secrets(&self, project_id: ProjectId) -> Result<SecretMap, SecretStoreError>;

    /// Replace hidden project secrets
    async fn set_hidden_secrets(&self, project_id: ProjectId, secrets: SecretMap) -> Result<(), SecretStoreError>;

    /// Shared admin layer merged under hidden merged under plain
    async fn get_all_secrets(&self, project_id: ProjectId) -> Result<SecretMap, SecretStoreError>;

    /// Remove the project's secret space. Absent spaces are a no-op.
    async fn remove_project_space(&self, project_id: ProjectId) -> Result<(), SecretStoreError>;
}

#[derive(Debug, Clone)]
struct Space {
    refs: SecretSpaceRef,
    secrets: SecretMap,
    hidden: SecretMap,
}

/// In-memory secret store
#[derive(Default)]
pub struct InMemorySecretStore {
    shared: RwLock<SecretMap>,
    spaces: RwLock<HashMap<ProjectId, Space>>,
    fail_next: Mutex<HashSet<&'static str>>,
}

impl InMemorySecretStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the shared admin secret layer
    pub fn set_shared_secrets(&self, secrets: SecretMap) {
        *self.shared.write() = secrets;
    }

    /// Whether a project space exists
    pub fn has_space(&self, project_id: ProjectId) -> bool {
        self.spaces.read().contains_key(&project_id)
    }

    /// Number of project spaces
    pub fn space_count(&self) -> usize {
        self.spaces.read().len()
    }

    /// Make the next call of the named operation fail. Test hook.
    pub fn fail_next(&self, op: &'static str) {
        self.fail_next.lock().insert(op);
    }

    fn take_failure(&self, op: &'static str) -> Result<(), SecretStoreError> {
        if self.fail_next.lock().remove(op) {
            return Err(SecretStoreError::Backend(format!("injected failure: {op}")));
        }
        Ok(())
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn create_project_space(&self, project_id: ProjectId) -> Result<SecretSpaceRef, SecretStoreError> {
        self.take_failure("create_project_space")?;
        let mut spaces = self.spaces.write();
        let space = spaces.entry(project_id).or_insert_with(|| Space {
            refs: SecretSpaceRef {
                space: format!("kv/project_{}", project_id.simple()),
                role_id: Uuid::new_v4().to_string(),
                secret_id: Uuid::new_v4().to_string(),
            },
            secrets: SecretMap::new(),
            hidden: SecretMap::new(),
        });
        Ok(space.refs.clone())
    }

    async fn get_secrets(&self, project_id: ProjectId) -> Result<SecretMap, SecretStoreError> {
        self.take_failure("get_secrets")?;
        let spaces = self.spaces.read();
        let space = spaces
            .get(&project_id)
            .ok_or(SecretStoreError::SpaceNotFound(project_id))?;
        Ok(space.secrets.clone())
    }

    async fn set_secrets(&self, project_id: ProjectId, secrets: SecretMap) -> Result<(), SecretStoreError> {
        self.take_failure("set_secrets")?;
        let mut spaces = self.spaces.write();
        let space = spaces
            .get_mut(&project_id)
            .ok_or(SecretStoreError::SpaceNotFound(project_id))?;
        space.secrets = secrets;
        Ok(())
    }

    async fn get_hidden_secrets(&self, project_id: ProjectId) -> Result<SecretMap, SecretStoreError> {
        self.take_failure("get_hidden_secrets")?;
        let spaces = self.spaces.read();
        let space = spaces
            .get(&project_id)
            .ok_or(SecretStoreError::SpaceNotFound(project_id))?;
        Ok(space.hidden.clone())
    }

    async fn set_hidden_secrets(&self, project_id: ProjectId, secrets: SecretMap) -> Result<(), SecretStoreError> {
        self.take_failure("set_hidden_secrets")?;
        let mut spaces = self.spaces.write();
        let space = spaces
            .get_mut(&project_id)
            .ok_or(SecretStoreError::SpaceNotFound(project_id))?;
        space.hidden = secrets;
        Ok(())
    }

    async fn get_all_secrets(&self, project_id: ProjectId) -> Result<SecretMap, SecretStoreError> {
        self.take_failure("get_all_secrets")?;
        let mut merged = self.shared.read().clone();
        if let Some(space) = self.spaces.read().get(&project_id) {
            merged.extend(space.hidden.clone());
            merged.extend(space.secrets.clone());
        }
        Ok(merged)
    }

    async fn remove_project_space(&self, project_id: ProjectId) -> Result<(), SecretStoreError> {
        self.take_failure("remove_project_space")?;
        self.spaces.write().remove(&project_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_space_is_reentrant() {
        let store = InMemorySecretStore::new();
        let id = Uuid::new_v4();

        let first = store.create_project_space(id).await.unwrap();
        let second = store.create_project_space(id).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.space_count(), 1);
    }

    #[tokio::test]
    async fn test_merged_view_overrides_shared() {
        let store = InMemorySecretStore::new();
        let id = Uuid::new_v4();
        store.set_shared_secrets(SecretMap::from([
            ("broker_user".to_string(), serde_json::json!("admin")),
            ("retention".to_string(), serde_json::json!("7d")),
        ]));
        store.create_project_space(id).await.unwrap();
        store
            .set_secrets(id, SecretMap::from([("retention".to_string(), serde_json::json!("30d"))]))
            .await
            .unwrap();

        let all = store.get_all_secrets(id).await.unwrap();
        assert_eq!(all["retention"], "30d");
        assert_eq!(all["broker_user"], "admin");
    }

    #[tokio::test]
    async fn test_remove_space_is_benign_when_absent() {
        let store = InMemorySecretStore::new();
        assert!(store.remove_project_space(Uuid::new_v4()).await.is_ok());
    }

    #[tokio::test]
    async fn test_fail_injection_fires_once() {
        let store = InMemorySecretStore::new();
        let id = Uuid::new_v4();
        store.fail_next("create_project_space");

        assert!(store.create_project_space(id).await.is_err());
        assert!(store.create_project_space(id).await.is_ok());
    }
}
