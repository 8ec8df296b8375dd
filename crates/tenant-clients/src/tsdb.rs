//! Time-Series Admin Boundary
//!
//! Database create/drop for the per-project time-series set. Names come from
//! the fixed templates in `tenant_core::names`; feature-flagged like the
//! broker.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};

/// Time-series admin failure
#[derive(Debug, Clone, thiserror::Error)]
pub enum TsdbError {
    /// Backend failure
    #[error("time-series admin error: {0}")]
    Backend(String),
}

/// Time-series admin boundary
#[async_trait]
pub trait TsdbAdmin: Send + Sync {
    /// `create database <name> with <retention>`. Existing databases are a
    /// no-op.
    async fn create_database(&self, name: &str, retention: &str) -> Result<(), TsdbError>;

    /// `drop database <name>`. Absent databases are a no-op.
    async fn drop_database(&self, name: &str) -> Result<(), TsdbError>;
}

/// In-memory time-series admin
#[derive(Default)]
pub struct InMemoryTsdb {
    databases: RwLock<HashMap<String, String>>,
    fail_next: Mutex<HashSet<&'static str>>,
}

impl InMemoryTsdb {
    /// Create an empty admin
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a database exists
    pub fn has_database(&self, name: &str) -> bool {
        self.databases.read().contains_key(name)
    }

    /// Number of databases
    pub fn database_count(&self) -> usize {
        self.databases.read().len()
    }

    /// Make the next call of the named operation fail. Test hook.
    pub fn fail_next(&self, op: &'static str) {
        self.fail_next.lock().insert(op);
    }

    fn take_failure(&self, op: &'static str) -> Result<(), TsdbError> {
        if self.fail_next.lock().remove(op) {
            return Err(TsdbError::Backend(format!("injected failure: {op}")));
        }
        Ok(())
    }
}

#[async_trait]
impl TsdbAdmin for InMemoryTsdb {
    async fn create_database(&self, name: &str, retention: &str) -> Result<(), TsdbError> {
        self.take_failure("create_database")?;
        self.databases
            .write()
            .entry(name.to_string())
            .or_insert_with(|| retention.to_string());
        Ok(())
    }

    async fn drop_database(&self, name: &str) -> Result<(), TsdbError> {
        self.take_failure("drop_database")?;
        self.databases.write().remove(name);
        Ok(())
    }
}
