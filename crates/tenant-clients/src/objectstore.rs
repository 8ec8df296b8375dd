//! Object Store Boundary
//!
//! Bucket management for per-project object storage.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Object store failure
#[derive(Debug, Clone, thiserror::Error)]
pub enum ObjectStoreError {
    /// Backend failure
    #[error("object store error: {0}")]
    Backend(String),
}

/// Bucket classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketKind {
    /// Platform-managed bucket
    System,
    /// User-created bucket
    Local,
}

/// Object store boundary
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create a bucket. Existing buckets are a no-op.
    async fn create_bucket(&self, name: &str, kind: BucketKind) -> Result<(), ObjectStoreError>;

    /// Remove a bucket. Absent buckets are a no-op.
    async fn remove_bucket(&self, name: &str) -> Result<(), ObjectStoreError>;
}

/// In-memory object store
#[derive(Default)]
pub struct InMemoryObjectStore {
    buckets: RwLock<HashMap<String, BucketKind>>,
    fail_next: Mutex<HashSet<&'static str>>,
}

impl InMemoryObjectStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a bucket exists
    pub fn has_bucket(&self, name: &str) -> bool {
        self.buckets.read().contains_key(name)
    }

    /// Number of buckets
    pub fn bucket_count(&self) -> usize {
        self.buckets.read().len()
    }

    /// Make the next call of the named operation fail. Test hook.
    pub fn fail_next(&self, op: &'static str) {
        self.fail_next.lock().insert(op);
    }

    fn take_failure(&self, op: &'static str) -> Result<(), ObjectStoreError> {
        if self.fail_next.lock().remove(op) {
            return Err(ObjectStoreError::Backend(format!("injected failure: {op}")));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn create_bucket(&self, name: &str, kind: BucketKind) -> Result<(), ObjectStoreError> {
        self.take_failure("create_bucket")?;
        self.buckets.write().entry(name.to_string()).or_insert(kind);
        Ok(())
    }

    async fn remove_bucket(&self, name: &str) -> Result<(), ObjectStoreError> {
        self.take_failure("remove_bucket")?;
        self.buckets.write().remove(name);
        Ok(())
    }
}
