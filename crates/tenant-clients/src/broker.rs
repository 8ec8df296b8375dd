//! Message-Broker Admin Boundary
//!
//! Vhost/user/permission management for the per-project broker namespace.
//! The whole collaborator is feature-flagged: when the broker runtime is not
//! in use, the corresponding step never enters the registry.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};

/// Broker admin failure
#[derive(Debug, Clone, thiserror::Error)]
pub enum BrokerError {
    /// Backend failure
    #[error("broker admin error: {0}")]
    Backend(String),
}

/// Broker admin boundary
#[async_trait]
pub trait BrokerAdmin: Send + Sync {
    /// Create a vhost. Existing vhosts are a no-op.
    async fn create_vhost(&self, name: &str) -> Result<(), BrokerError>;

    /// Create a user. Re-creating resets the password.
    async fn create_user(&self, name: &str, password: &str) -> Result<(), BrokerError>;

    /// Grant a user full permissions on a vhost
    async fn grant_permission(&self, user: &str, vhost: &str) -> Result<(), BrokerError>;

    /// Delete a user. Absent users are a no-op.
    async fn delete_user(&self, name: &str) -> Result<(), BrokerError>;

    /// Delete a vhost. Absent vhosts are a no-op.
    async fn delete_vhost(&self, name: &str) -> Result<(), BrokerError>;
}

/// In-memory broker admin
#[derive(Default)]
pub struct InMemoryBroker {
    vhosts: RwLock<HashSet<String>>,
    users: RwLock<HashMap<String, String>>,
    permissions: RwLock<HashSet<(String, String)>>,
    fail_next: Mutex<HashSet<&'static str>>,
}

impl InMemoryBroker {
    /// Create an empty broker
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a vhost exists
    pub fn has_vhost(&self, name: &str) -> bool {
        self.vhosts.read().contains(name)
    }

    /// Whether a user exists
    pub fn has_user(&self, name: &str) -> bool {
        self.users.read().contains_key(name)
    }

    /// Whether a user has permissions on a vhost
    pub fn has_permission(&self, user: &str, vhost: &str) -> bool {
        self.permissions
            .read()
            .contains(&(user.to_string(), vhost.to_string()))
    }

    /// Make the next call of the named operation fail. Test hook.
    pub fn fail_next(&self, op: &'static str) {
        self.fail_next.lock().insert(op);
    }

    fn take_failure(&self, op: &'static str) -> Result<(), BrokerError> {
        if self.fail_next.lock().remove(op) {
            return Err(BrokerError::Backend(format!("injected failure: {op}")));
        }
        Ok(())
    }
}

#[async_trait]
impl BrokerAdmin for InMemoryBroker {
    async fn create_vhost(&self, name: &str) -> Result<(), BrokerError> {
        self.take_failure("create_vhost")?;
        self.vhosts.write().insert(name.to_string());
        Ok(())
    }

    async fn create_user(&self, name: &str, password: &str) -> Result<(), BrokerError> {
        self.take_failure("create_user")?;
        self.users
            .write()
            .insert(name.to_string(), password.to_string());
        Ok(())
    }

    async fn grant_permission(&self, user: &str, vhost: &str) -> Result<(), BrokerError> {
        self.take_failure("grant_permission")?;
        self.permissions
            .write()
            .insert((user.to_string(), vhost.to_string()));
        Ok(())
    }

    async fn delete_user(&self, name: &str) -> Result<(), BrokerError> {
        self.take_failure("delete_user")?;
        self.users.write().remove(name);
        self.permissions.write().retain(|(u, _)| u != name);
        Ok(())
    }

    async fn delete_vhost(&self, name: &str) -> Result<(), BrokerError> {
        self.take_failure("delete_vhost")?;
        self.vhosts.write().remove(name);
        self.permissions.write().retain(|(_, v)| v != name);
        Ok(())
    }
}
