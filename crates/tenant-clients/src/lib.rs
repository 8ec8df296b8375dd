//! OpenTenant Clients - Narrow boundaries to the external systems a project
//! spans.
//!
//! Each collaborator is a small async trait plus an in-memory implementation.
//! The in-memory engines are real enough for the orchestrator and its tests;
//! production deployments swap in wrappers over the actual services behind
//! the same traits. All creates tolerate already-existing entities and all
//! deletes tolerate absent ones, because the provisioning steps must be
//! re-enterable.

#![warn(missing_docs)]
#![allow(dead_code)]

pub mod broker;
pub mod identity;
pub mod objectstore;
pub mod secrets;
pub mod tsdb;

pub use broker::{BrokerAdmin, BrokerError, InMemoryBroker};
pub use identity::{IdentityError, IdentityProvider, InMemoryIdentity, RoleScope, TokenRecord, UserRecord};
pub use objectstore::{BucketKind, InMemoryObjectStore, ObjectStore, ObjectStoreError};
pub use secrets::{InMemorySecretStore, SecretMap, SecretSpaceRef, SecretStore, SecretStoreError};
pub use tsdb::{InMemoryTsdb, TsdbAdmin, TsdbError};
