//! OpenTenant Core - Domain model for multi-tenant project provisioning
//!
//! A "project" is a tenant workspace spanning a relational schema, object
//! store buckets, a message-broker vhost, time-series databases, a secret
//! store space and an identity-provider user/token set. This crate holds the
//! parts every other crate agrees on:
//!
//! - Project / quota / statistics rows and the in-memory relational store
//! - The per-user visibility cache with explicit invalidation
//! - The lifecycle event bus
//! - Provisioning configuration and derived-name templates

#![warn(missing_docs)]
#![allow(dead_code)]

pub mod cache;
pub mod config;
pub mod events;
pub mod model;
pub mod names;
pub mod quota;
pub mod store;

pub use cache::VisibilityCache;
pub use config::ProvisionConfig;
pub use events::{Event, EventBus, EventName, InMemoryEventBus};
pub use model::{Project, ProjectCreateRequest, ProjectId, UserId, ValidationError};
pub use quota::{ProjectQuota, QuotaVerdict, ResourceClass, Statistic, UsageCounter};
pub use store::{ProjectStore, StoreError, StoreSession};
