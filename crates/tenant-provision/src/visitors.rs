//! Personal Projects and the Visitor Queue
//!
//! Every human user gets a personal project, auto-provisioned the first time
//! they show up. Visits arrive as user or token sightings on an mpsc channel;
//! the single consumer coalesces repeats through a TTL cache, resolves tokens
//! back to their owners and skips platform system accounts. The check-then-
//! create window is closed by a per-owner async mutex, so two concurrent
//! sightings of the same user cannot race into two personal projects.

use crate::context::Collaborators;
use crate::orchestrator::{Orchestrator, ProjectCreateError};
use dashmap::DashMap;
use moka::sync::Cache;
use std::sync::Arc;
use std::time::Duration;
use tenant_clients::{IdentityError, IdentityProvider};
use tenant_core::{names, EventName, ProjectCreateRequest, ProjectId, ProvisionConfig, UserId};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Per-owner async locks guarding check-then-create sections
#[derive(Default)]
pub struct OwnerLocks {
    locks: DashMap<UserId, Arc<Mutex<()>>>,
}

impl OwnerLocks {
    /// Create an empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for one owner, created on first use
    pub fn lock_for(&self, user_id: UserId) -> Arc<Mutex<()>> {
        self.locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// What kind of credential was sighted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitorKind {
    /// A user session
    User,
    /// An API token
    Token,
}

/// One sighting on the visitor channel
#[derive(Debug, Clone, Copy)]
pub struct Visitor {
    /// User or token ID, depending on `kind`
    pub id: Uuid,
    /// How the ID should be resolved
    pub kind: VisitorKind,
}

/// Personal-project provisioning failure
#[derive(Debug, thiserror::Error)]
pub enum PersonalError {
    /// Identity provider failure while resolving the owner
    #[error(transparent)]
    Identity(#[from] IdentityError),
    /// The owner is not a registered user
    #[error("user not found: {0}")]
    UserNotFound(UserId),
    /// The provisioning run failed
    #[error(transparent)]
    Provision(#[from] Box<ProjectCreateError>),
}

/// How an ensure call found the personal project
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonalOutcome {
    /// A healthy personal project already existed
    AlreadyProvisioned(ProjectId),
    /// No personal project existed; one was created
    Created(ProjectId),
    /// A half-provisioned row was found, torn down and recreated
    Recreated(ProjectId),
}

impl PersonalOutcome {
    /// The personal project's ID
    pub fn project_id(&self) -> ProjectId {
        match self {
            Self::AlreadyProvisioned(id) | Self::Created(id) | Self::Recreated(id) => *id,
        }
    }
}

/// Auto-provisioning of per-user personal projects
pub struct PersonalProjects {
    orchestrator: Arc<Orchestrator>,
    collab: Collaborators,
    plugins: Vec<String>,
    locks: OwnerLocks,
}

impl PersonalProjects {
    /// Create the service over an orchestrator
    pub fn new(orchestrator: Arc<Orchestrator>, config: &ProvisionConfig) -> Self {
        let collab = orchestrator.collaborators().clone();
        Self {
            orchestrator,
            collab,
            plugins: config.personal_project_plugins.clone(),
            locks: OwnerLocks::new(),
        }
    }

    /// The user's personal project row ID, if one exists
    pub fn personal_project_id(&self, user_id: UserId) -> Option<ProjectId> {
        self.collab
            .store
            .find_by_name(&names::personal_project_name(user_id))
            .map(|p| p.id)
    }

    /// The project a user belongs to by construction: their personal project,
    /// or for a system service account the project encoded in its email.
    pub async fn project_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<ProjectId>, IdentityError> {
        if let Some(project_id) = self.personal_project_id(user_id) {
            return Ok(Some(project_id));
        }
        if let Some(user) = self.collab.identity.get_user(user_id).await? {
            if let Some(project_id) = names::parse_system_user_email(&user.email) {
                return Ok(Some(project_id));
            }
        }
        Ok(None)
    }

    /// Make sure the user has a healthy personal project.
    ///
    /// Serialized per owner: concurrent calls for the same user queue behind
    /// one lock and the losers observe the winner's row.
    pub async fn ensure(&self, user_id: UserId) -> Result<PersonalOutcome, PersonalError> {
        let lock = self.locks.lock_for(user_id);
        let _guard = lock.lock().await;

        let name = names::personal_project_name(user_id);
        let outcome = match self.collab.store.find_by_name(&name) {
            Some(existing) if existing.create_success => {
                PersonalOutcome::AlreadyProvisioned(existing.id)
            }
            Some(broken) => {
                info!(user = %user_id, project = %broken.id, "recreating half-provisioned personal project");
                self.orchestrator.delete_project(broken.id).await;
                PersonalOutcome::Recreated(self.create(user_id, &name).await?)
            }
            None => PersonalOutcome::Created(self.create(user_id, &name).await?),
        };

        if !matches!(outcome, PersonalOutcome::AlreadyProvisioned(_)) {
            self.collab.bus.fire(
                EventName::PersonalProjectCreated,
                serde_json::json!({
                    "project_id": outcome.project_id(),
                    "user_id": user_id,
                }),
            );
            self.collab.cache.invalidate(&[user_id]);
        }
        Ok(outcome)
    }

    async fn create(&self, user_id: UserId, name: &str) -> Result<ProjectId, PersonalError> {
        let user = self
            .collab
            .identity
            .get_user(user_id)
            .await?
            .ok_or(PersonalError::UserNotFound(user_id))?;

        let request = ProjectCreateRequest::new(name, &user.email, self.plugins.clone());
        self.orchestrator
            .create_project(request, user_id, vec!["admin".to_string()])
            .await
            .map_err(Box::new)?;

        self.collab
            .store
            .find_by_name(name)
            .map(|p| p.id)
            .ok_or(PersonalError::UserNotFound(user_id))
    }
}

/// Single consumer over the visitor channel
pub struct VisitorProcessor {
    personal: Arc<PersonalProjects>,
    identity: Arc<dyn IdentityProvider>,
    seen: Cache<Uuid, ()>,
}

impl VisitorProcessor {
    /// Create a processor with the configured coalescing window
    pub fn new(personal: Arc<PersonalProjects>, config: &ProvisionConfig) -> Self {
        let identity = personal.collab.identity.clone();
        let seen = Cache::builder()
            .max_capacity(config.visitor_cache_capacity)
            .time_to_live(Duration::from_secs(config.visitor_cache_ttl_secs))
            .build();
        Self {
            personal,
            identity,
            seen,
        }
    }

    /// Consume the channel until every sender is dropped
    pub fn spawn(self, mut rx: mpsc::Receiver<Visitor>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(visitor) = rx.recv().await {
                self.process(visitor).await;
            }
            debug!("visitor channel closed");
        })
    }

    /// Handle one sighting. Errors are logged, never propagated; a failed
    /// visit simply gets retried the next time the TTL window reopens.
    pub async fn process(&self, visitor: Visitor) {
        if self.seen.get(&visitor.id).is_some() {
            return;
        }
        self.seen.insert(visitor.id, ());

        let user_id = match self.resolve(visitor).await {
            Ok(Some(user_id)) => user_id,
            Ok(None) => return,
            Err(e) => {
                warn!(visitor = %visitor.id, error = %e, "visitor resolution failed");
                return;
            }
        };

        if let Err(e) = self.personal.ensure(user_id).await {
            warn!(user = %user_id, error = %e, "personal project provisioning failed");
        }
    }

    /// Map a sighting to a human user, or `None` when it should be skipped
    async fn resolve(&self, visitor: Visitor) -> Result<Option<UserId>, IdentityError> {
        let user_id = match visitor.kind {
            VisitorKind::User => visitor.id,
            VisitorKind::Token => match self.identity.get_token(visitor.id).await? {
                Some(token) => token.user_id,
                None => return Ok(None),
            },
        };
        let Some(user) = self.identity.get_user(user_id).await? else {
            return Ok(None);
        };
        if names::is_system_user_name(&user.name)
            || names::parse_system_user_email(&user.email).is_some()
        {
            return Ok(None);
        }
        Ok(Some(user_id))
    }
}
