//! Project Data Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Project ID
pub type ProjectId = Uuid;

/// User ID (assigned by the identity provider)
pub type UserId = Uuid;

/// API token ID
pub type TokenId = Uuid;

/// A tenant workspace spanning multiple backing systems.
///
/// The row is created by the first provisioning step, mutated by later steps
/// (secret pointers, success flag) and removed by the reverse sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Unique project ID
    pub id: ProjectId,
    /// Display name, unique within the tenant namespace
    pub name: String,
    /// Owning user
    pub owner_id: UserId,
    /// Ordered set of enabled capability tags
    pub plugins: Vec<String>,
    /// Opaque pointers into the secret store. Never raw secrets.
    pub secret_refs: serde_json::Value,
    /// True only after the full forward sequence completed without a fatal step
    pub create_success: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Create a new (not yet provisioned) project row
    pub fn new(name: &str, owner_id: UserId, plugins: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner_id,
            plugins,
            secret_refs: serde_json::Value::Null,
            create_success: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Serialize for API/event payloads. Secret pointers are always excluded.
    pub fn to_public_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "name": self.name,
            "owner_id": self.owner_id,
            "plugins": self.plugins,
            "create_success": self.create_success,
            "created_at": self.created_at,
            "updated_at": self.updated_at,
        })
    }
}

/// Validated provisioning request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectCreateRequest {
    /// Project name
    pub name: String,
    /// Email of the user to bind as project admin
    pub admin_email: String,
    /// Capability tags to enable
    #[serde(default)]
    pub plugins: Vec<String>,
    /// Data retention limit, -1 for unlimited
    #[serde(default = "default_retention_limit")]
    pub data_retention_limit: i64,
    /// Storage hard ceiling in GB, -1 for unlimited
    #[serde(default = "default_storage_limit")]
    pub storage_limit: i64,
    /// Compute hard ceiling, -1 for unlimited
    #[serde(default = "default_compute_limit")]
    pub compute_limit: i64,
}

fn default_retention_limit() -> i64 {
    1_000_000_000
}

fn default_storage_limit() -> i64 {
    1_000_000_000
}

fn default_compute_limit() -> i64 {
    60_000
}

impl ProjectCreateRequest {
    /// Build a request with default limits
    pub fn new(name: &str, admin_email: &str, plugins: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            admin_email: admin_email.to_string(),
            plugins,
            data_retention_limit: default_retention_limit(),
            storage_limit: default_storage_limit(),
            compute_limit: default_compute_limit(),
        }
    }

    /// Validate the request. Runs before any provisioning step; a rejected
    /// request has zero side effects.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        let email = self.admin_email.trim();
        let (local, domain) = email
            .split_once('@')
            .ok_or_else(|| ValidationError::InvalidEmail(email.to_string()))?;
        if local.is_empty() || domain.is_empty() || !domain.contains('.') {
            return Err(ValidationError::InvalidEmail(email.to_string()));
        }
        for (field, value) in [
            ("data_retention_limit", self.data_retention_limit),
            ("storage_limit", self.storage_limit),
            ("compute_limit", self.compute_limit),
        ] {
            if value < -1 {
                return Err(ValidationError::InvalidLimit { field, value });
            }
        }
        Ok(())
    }
}

/// Request validation failure
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Project name is empty
    #[error("project name must not be empty")]
    EmptyName,
    /// Admin email is malformed
    #[error("invalid admin email: {0}")]
    InvalidEmail(String),
    /// A numeric limit is out of range
    #[error("invalid value for {field}: {value} (must be >= -1)")]
    InvalidLimit {
        /// Offending field name
        field: &'static str,
        /// Offending value
        value: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_new_is_unprovisioned() {
        let owner = Uuid::new_v4();
        let project = Project::new("acme", owner, vec!["configuration".into()]);

        assert!(!project.create_success);
        assert_eq!(project.owner_id, owner);
        assert_eq!(project.secret_refs, serde_json::Value::Null);
    }

    #[test]
    fn test_public_json_excludes_secret_refs() {
        let mut project = Project::new("acme", Uuid::new_v4(), vec![]);
        project.secret_refs = serde_json::json!({"space": "kv/acme"});

        let json = project.to_public_json();
        assert!(json.get("secret_refs").is_none());
        assert_eq!(json["name"], "acme");
    }

    #[test]
    fn test_request_validation() {
        let ok = ProjectCreateRequest::new("acme", "a@x.com", vec![]);
        assert!(ok.validate().is_ok());

        let mut bad = ok.clone();
        bad.name = "  ".into();
        assert_eq!(bad.validate(), Err(ValidationError::EmptyName));

        let mut bad = ok.clone();
        bad.admin_email = "not-an-email".into();
        assert!(matches!(bad.validate(), Err(ValidationError::InvalidEmail(_))));

        let mut bad = ok;
        bad.compute_limit = -2;
        assert!(matches!(bad.validate(), Err(ValidationError::InvalidLimit { .. })));
    }
}
