//! Project Directory
//!
//! Read side of the project catalog: listing, search and the per-user
//! visibility view. Visible-project sets are memoized in the shared
//! [`VisibilityCache`]; the orchestrator and membership paths invalidate
//! entries explicitly, so a cached set is never stale for longer than one
//! membership change.

use std::sync::Arc;
use tenant_clients::{IdentityError, IdentityProvider};
use tenant_core::{Project, ProjectId, ProjectStore, UserId, VisibilityCache};
use tracing::debug;

/// Catalog reads over the store, identity membership and the cache
pub struct ProjectDirectory {
    store: ProjectStore,
    identity: Arc<dyn IdentityProvider>,
    cache: Arc<VisibilityCache>,
}

impl ProjectDirectory {
    /// Create a directory over the shared collaborators
    pub fn new(
        store: ProjectStore,
        identity: Arc<dyn IdentityProvider>,
        cache: Arc<VisibilityCache>,
    ) -> Self {
        Self {
            store,
            identity,
            cache,
        }
    }

    /// All projects, with optional name-substring filter and pagination
    pub fn list(&self, search: Option<&str>, limit: Option<usize>, offset: usize) -> Vec<Project> {
        self.store.list(search, limit, offset)
    }

    /// One project row
    pub fn get(&self, project_id: ProjectId) -> Option<Project> {
        self.store.get(project_id)
    }

    /// IDs of projects the user owns or is a member of, memoized per user
    pub async fn visible_project_ids(
        &self,
        user_id: UserId,
    ) -> Result<Arc<Vec<ProjectId>>, IdentityError> {
        if let Some(cached) = self.cache.get(&user_id) {
            return Ok(cached);
        }
        debug!(user = %user_id, "visibility cache miss, recomputing");

        let mut visible = Vec::new();
        for project in self.store.list(None, None, 0) {
            if project.owner_id == user_id
                || self.identity.is_user_in_project(project.id, user_id).await?
            {
                visible.push(project.id);
            }
        }
        self.cache.insert(user_id, visible.clone());
        Ok(Arc::new(visible))
    }

    /// Projects visible to the user, filtered and paginated
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        search: Option<&str>,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<Project>, IdentityError> {
        let visible = self.visible_project_ids(user_id).await?;
        Ok(self
            .store
            .list(search, None, 0)
            .into_iter()
            .filter(|p| visible.contains(&p.id))
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .collect())
    }
}
