//! OpenTenant Provision - Sequenced, compensable project provisioning
//!
//! The orchestrator runs a fixed sequence of named steps, each a create/delete
//! pair over one backing resource. A failed create compensates the steps that
//! already succeeded, in reverse; teardown is a best-effort reverse sweep
//! over the whole sequence. Around the core sit the read-side directory, the
//! personal-project service with its visitor queue, and the convergence sweep
//! that repairs interrupted runs.

#![warn(missing_docs)]
#![allow(dead_code)]

pub mod context;
pub mod directory;
pub mod orchestrator;
pub mod registry;
pub mod step;
pub mod steps;
pub mod sweep;
pub mod visitors;

pub use context::{Collaborators, ProvisionContext};
pub use directory::ProjectDirectory;
pub use orchestrator::{DeleteOutcome, Orchestrator, ProjectCreateError};
pub use registry::StepRegistry;
pub use step::{Step, StepBody, StepError, StepReport};
pub use steps::canonical_registry;
pub use sweep::{ConvergenceReport, ConvergenceSweep};
pub use visitors::{
    OwnerLocks, PersonalError, PersonalOutcome, PersonalProjects, Visitor, VisitorKind,
    VisitorProcessor,
};

#[cfg(test)]
pub(crate) mod testing {
    //! Shared test fixture wiring the in-memory collaborators together.

    use crate::context::{Collaborators, ProvisionContext};
    use crate::directory::ProjectDirectory;
    use crate::orchestrator::Orchestrator;
    use crate::visitors::PersonalProjects;
    use std::sync::Arc;
    use tenant_clients::{
        InMemoryBroker, InMemoryIdentity, InMemoryObjectStore, InMemorySecretStore, InMemoryTsdb,
    };
    use tenant_core::{
        InMemoryEventBus, ProjectCreateRequest, ProjectId, ProjectStore, ProvisionConfig, UserId,
        VisibilityCache,
    };

    pub(crate) struct TestHarness {
        pub store: ProjectStore,
        pub secrets: Arc<InMemorySecretStore>,
        pub identity: Arc<InMemoryIdentity>,
        pub broker: Arc<InMemoryBroker>,
        pub tsdb: Arc<InMemoryTsdb>,
        pub objects: Arc<InMemoryObjectStore>,
        pub bus: Arc<InMemoryEventBus>,
        pub cache: Arc<VisibilityCache>,
    }

    impl TestHarness {
        pub fn new() -> Self {
            Self {
                store: ProjectStore::new(),
                secrets: Arc::new(InMemorySecretStore::new()),
                identity: Arc::new(InMemoryIdentity::new()),
                broker: Arc::new(InMemoryBroker::new()),
                tsdb: Arc::new(InMemoryTsdb::new()),
                objects: Arc::new(InMemoryObjectStore::new()),
                bus: Arc::new(InMemoryEventBus::new()),
                cache: Arc::new(VisibilityCache::default()),
            }
        }

        pub fn collaborators(&self) -> Collaborators {
            Collaborators {
                store: self.store.clone(),
                secrets: self.secrets.clone(),
                identity: self.identity.clone(),
                broker: self.broker.clone(),
                tsdb: self.tsdb.clone(),
                objects: self.objects.clone(),
                bus: self.bus.clone(),
                cache: self.cache.clone(),
            }
        }

        pub fn orchestrator(&self) -> Orchestrator {
            self.orchestrator_with(ProvisionConfig::default())
        }

        pub fn orchestrator_with(&self, config: ProvisionConfig) -> Orchestrator {
            Orchestrator::new(self.collaborators(), config)
        }

        pub fn directory(&self) -> ProjectDirectory {
            ProjectDirectory::new(self.store.clone(), self.identity.clone(), self.cache.clone())
        }

        pub fn personal_projects(&self) -> PersonalProjects {
            PersonalProjects::new(Arc::new(self.orchestrator()), &ProvisionConfig::default())
        }

        pub fn create_context(
            &self,
            request: ProjectCreateRequest,
            owner_id: UserId,
        ) -> ProvisionContext {
            ProvisionContext::for_create(&self.store, request, owner_id, vec![])
        }

        pub fn delete_context(&self, project_id: ProjectId) -> ProvisionContext {
            ProvisionContext::for_delete(&self.store, project_id, None)
        }
    }
}
