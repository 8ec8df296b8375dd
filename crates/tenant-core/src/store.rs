//! In-Memory Relational Store
//!
//! Narrow stand-in for the relational collaborator: project, quota and
//! statistic tables plus per-project schemas/namespaces. Provisioning runs
//! work through a buffered [`StoreSession`] with commit/rollback semantics;
//! teardown and admin paths use a direct (auto-commit) session.

use crate::model::{Project, ProjectId};
use crate::quota::{ProjectQuota, Statistic};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Store failure
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    /// Project row does not exist
    #[error("project not found: {0}")]
    NotFound(ProjectId),
}

#[derive(Debug, Clone, Default)]
struct Tables {
    projects: HashMap<ProjectId, Project>,
    quotas: HashMap<ProjectId, ProjectQuota>,
    statistics: HashMap<ProjectId, Statistic>,
    schemas: HashSet<String>,
}

/// Buffered write operation, replayed on commit
#[derive(Debug, Clone)]
enum Op {
    UpsertProject(Project),
    RemoveProject(ProjectId),
    UpsertQuota(ProjectQuota),
    RemoveQuota(ProjectId),
    UpsertStatistic(Statistic),
    RemoveStatistic(ProjectId),
    CreateSchema(String),
    DropSchema(String),
}

fn apply(tables: &mut Tables, op: &Op) {
    match op {
        Op::UpsertProject(p) => {
            tables.projects.insert(p.id, p.clone());
        }
        Op::RemoveProject(id) => {
            tables.projects.remove(id);
        }
        Op::UpsertQuota(q) => {
            tables.quotas.insert(q.project_id, q.clone());
        }
        Op::RemoveQuota(id) => {
            tables.quotas.remove(id);
        }
        Op::UpsertStatistic(s) => {
            tables.statistics.insert(s.project_id, s.clone());
        }
        Op::RemoveStatistic(id) => {
            tables.statistics.remove(id);
        }
        Op::CreateSchema(name) => {
            tables.schemas.insert(name.clone());
        }
        Op::DropSchema(name) => {
            tables.schemas.remove(name);
        }
    }
}

/// Shared project store
#[derive(Clone, Default)]
pub struct ProjectStore {
    tables: Arc<RwLock<Tables>>,
}

impl ProjectStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a buffered session. Writes stay local until [`StoreSession::commit`];
    /// dropping the session rolls everything back.
    pub fn session(&self) -> StoreSession {
        StoreSession {
            store: self.clone(),
            buffer: Some(Buffer {
                working: self.tables.read().clone(),
                ops: Vec::new(),
            }),
        }
    }

    /// Open a direct (auto-commit) session
    pub fn direct(&self) -> StoreSession {
        StoreSession {
            store: self.clone(),
            buffer: None,
        }
    }

    /// Look up a project row
    pub fn get(&self, project_id: ProjectId) -> Option<Project> {
        self.tables.read().projects.get(&project_id).cloned()
    }

    /// Look up a project by exact name
    pub fn find_by_name(&self, name: &str) -> Option<Project> {
        self.tables
            .read()
            .projects
            .values()
            .find(|p| p.name == name)
            .cloned()
    }

    /// List projects with optional name-substring filter and pagination.
    /// Results are ordered by creation time for stable pagination.
    pub fn list(&self, search: Option<&str>, limit: Option<usize>, offset: usize) -> Vec<Project> {
        let tables = self.tables.read();
        let mut projects: Vec<Project> = tables
            .projects
            .values()
            .filter(|p| match search {
                Some(s) => p.name.to_lowercase().contains(&s.to_lowercase()),
                None => true,
            })
            .cloned()
            .collect();
        projects.sort_by_key(|p| p.created_at);
        projects
            .into_iter()
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .collect()
    }

    /// Quota row for a project
    pub fn quota(&self, project_id: ProjectId) -> Option<ProjectQuota> {
        self.tables.read().quotas.get(&project_id).cloned()
    }

    /// Statistic row for a project
    pub fn statistic(&self, project_id: ProjectId) -> Option<Statistic> {
        self.tables.read().statistics.get(&project_id).cloned()
    }

    /// Mutate a project's quota in place
    pub fn with_quota_mut<F>(&self, project_id: ProjectId, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut ProjectQuota),
    {
        let mut tables = self.tables.write();
        let quota = tables
            .quotas
            .get_mut(&project_id)
            .ok_or(StoreError::NotFound(project_id))?;
        f(quota);
        Ok(())
    }

    /// Increment a statistic counter in place
    pub fn with_statistic_mut<F>(&self, project_id: ProjectId, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Statistic),
    {
        let mut tables = self.tables.write();
        let stat = tables
            .statistics
            .get_mut(&project_id)
            .ok_or(StoreError::NotFound(project_id))?;
        f(stat);
        Ok(())
    }

    /// Whether a relational schema/namespace exists
    pub fn has_schema(&self, name: &str) -> bool {
        self.tables.read().schemas.contains(name)
    }

    /// Number of project rows
    pub fn project_count(&self) -> usize {
        self.tables.read().projects.len()
    }
}

struct Buffer {
    working: Tables,
    ops: Vec<Op>,
}

/// Scoped store session.
///
/// Buffered sessions see their own staged writes; nothing is visible to other
/// readers until `commit`. Direct sessions write through immediately.
pub struct StoreSession {
    store: ProjectStore,
    buffer: Option<Buffer>,
}

impl StoreSession {
    fn write(&mut self, op: Op) {
        match &mut self.buffer {
            Some(buffer) => {
                apply(&mut buffer.working, &op);
                buffer.ops.push(op);
            }
            None => apply(&mut self.store.tables.write(), &op),
        }
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        match &self.buffer {
            Some(buffer) => f(&buffer.working),
            None => f(&self.store.tables.read()),
        }
    }

    /// Look up a project row as seen by this session
    pub fn get(&self, project_id: ProjectId) -> Option<Project> {
        self.read(|t| t.projects.get(&project_id).cloned())
    }

    /// Look up a project by exact name as seen by this session
    pub fn find_by_name(&self, name: &str) -> Option<Project> {
        self.read(|t| t.projects.values().find(|p| p.name == name).cloned())
    }

    /// Insert or replace a project row
    pub fn upsert_project(&mut self, project: Project) {
        self.write(Op::UpsertProject(project));
    }

    /// Remove a project row. Absent rows are a no-op.
    pub fn remove_project(&mut self, project_id: ProjectId) {
        self.write(Op::RemoveProject(project_id));
    }

    /// Flip the create-success marker
    pub fn set_create_success(&mut self, project_id: ProjectId, ok: bool) -> Result<(), StoreError> {
        let mut project = self
            .get(project_id)
            .ok_or(StoreError::NotFound(project_id))?;
        project.create_success = ok;
        project.updated_at = chrono::Utc::now();
        self.write(Op::UpsertProject(project));
        Ok(())
    }

    /// Store the secret-space pointers on the project row
    pub fn update_secret_refs(
        &mut self,
        project_id: ProjectId,
        refs: serde_json::Value,
    ) -> Result<(), StoreError> {
        let mut project = self
            .get(project_id)
            .ok_or(StoreError::NotFound(project_id))?;
        project.secret_refs = refs;
        project.updated_at = chrono::Utc::now();
        self.write(Op::UpsertProject(project));
        Ok(())
    }

    /// Insert or replace a quota row
    pub fn upsert_quota(&mut self, quota: ProjectQuota) {
        self.write(Op::UpsertQuota(quota));
    }

    /// Remove a quota row. Absent rows are a no-op.
    pub fn remove_quota(&mut self, project_id: ProjectId) {
        self.write(Op::RemoveQuota(project_id));
    }

    /// Insert or replace a statistic row
    pub fn upsert_statistic(&mut self, statistic: Statistic) {
        self.write(Op::UpsertStatistic(statistic));
    }

    /// Remove a statistic row. Absent rows are a no-op.
    pub fn remove_statistic(&mut self, project_id: ProjectId) {
        self.write(Op::RemoveStatistic(project_id));
    }

    /// Create a schema/namespace. Existing schemas are a no-op.
    pub fn create_schema(&mut self, name: &str) {
        self.write(Op::CreateSchema(name.to_string()));
    }

    /// Drop a schema/namespace. Absent schemas are a no-op.
    pub fn drop_schema(&mut self, name: &str) {
        self.write(Op::DropSchema(name.to_string()));
    }

    /// Whether a schema exists as seen by this session
    pub fn has_schema(&self, name: &str) -> bool {
        self.read(|t| t.schemas.contains(name))
    }

    /// Replay buffered writes into the shared store atomically.
    /// Direct sessions commit as a no-op.
    pub fn commit(mut self) {
        if let Some(buffer) = self.buffer.take() {
            let mut tables = self.store.tables.write();
            for op in &buffer.ops {
                apply(&mut tables, op);
            }
        }
    }

    /// Discard buffered writes. Equivalent to dropping the session; kept as an
    /// explicit operation for the orchestrator's error path.
    pub fn rollback(&mut self) {
        self.buffer = None;
        // Re-open as direct so compensation steps can still reach the store
        // through the same session handle.
    }

    /// Whether this session buffers writes
    pub fn is_buffered(&self) -> bool {
        self.buffer.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Project;
    use uuid::Uuid;

    #[test]
    fn test_commit_makes_writes_visible() {
        let store = ProjectStore::new();
        let project = Project::new("acme", Uuid::new_v4(), vec![]);
        let id = project.id;

        let mut session = store.session();
        session.upsert_project(project);
        session.create_schema("p_acme");

        // Staged writes are invisible outside the session
        assert!(store.get(id).is_none());
        assert!(!store.has_schema("p_acme"));
        assert!(session.get(id).is_some());

        session.commit();
        assert!(store.get(id).is_some());
        assert!(store.has_schema("p_acme"));
    }

    #[test]
    fn test_drop_rolls_back() {
        let store = ProjectStore::new();
        let project = Project::new("acme", Uuid::new_v4(), vec![]);
        let id = project.id;

        {
            let mut session = store.session();
            session.upsert_project(project);
        }
        assert!(store.get(id).is_none());
    }

    #[test]
    fn test_direct_session_writes_through() {
        let store = ProjectStore::new();
        let project = Project::new("acme", Uuid::new_v4(), vec![]);
        let id = project.id;

        let mut session = store.direct();
        session.upsert_project(project);
        assert!(store.get(id).is_some());

        session.remove_project(id);
        assert!(store.get(id).is_none());
    }

    #[test]
    fn test_list_filters_and_paginates() {
        let store = ProjectStore::new();
        let mut session = store.direct();
        for name in ["acme", "acme-staging", "other"] {
            session.upsert_project(Project::new(name, Uuid::new_v4(), vec![]));
        }

        assert_eq!(store.list(Some("ACME"), None, 0).len(), 2);
        assert_eq!(store.list(None, Some(2), 0).len(), 2);
        assert_eq!(store.list(None, None, 2).len(), 1);
    }

    #[test]
    fn test_set_create_success_missing_row() {
        let store = ProjectStore::new();
        let mut session = store.direct();
        let id = Uuid::new_v4();
        assert_eq!(
            session.set_create_success(id, true),
            Err(StoreError::NotFound(id))
        );
    }
}
