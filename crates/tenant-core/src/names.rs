//! Derived-Name Templates
//!
//! Every external resource a project owns is named from a fixed template over
//! the project or user ID, so teardown can re-derive names without reading
//! back state that may already be gone.

use crate::model::{ProjectId, UserId};
use regex::Regex;
use std::sync::OnceLock;

/// Prefix marking identity-provider system accounts
pub const SYSTEM_USER_NAME_PREFIX: &str = ":system:project:";

/// Object-store buckets provisioned for every project
pub const SYSTEM_BUCKETS: [&str; 2] = ["reports", "tasks"];

/// Logical time-series databases provisioned per project:
/// (hidden-secret key, name template base)
pub const TSDB_DATABASES: [(&str, &str); 4] = [
    ("load_db", "load"),
    ("journey_db", "journey"),
    ("comparison_db", "comparison"),
    ("telemetry_db", "telemetry"),
];

/// Relational schema/namespace name
pub fn schema_name(project_id: ProjectId) -> String {
    format!("p_{}", project_id.simple())
}

/// Identity-provider name of a project's system service account
pub fn system_user_name(project_id: ProjectId) -> String {
    format!("{SYSTEM_USER_NAME_PREFIX}{}:", project_id.simple())
}

/// Derived email of a project's system service account
pub fn system_user_email(project_id: ProjectId) -> String {
    format!("system_user_{}@opentenant.local", project_id.simple())
}

/// Broker user for a project
pub fn broker_user(project_id: ProjectId) -> String {
    format!("broker_user_{}", project_id.simple())
}

/// Broker vhost for a project
pub fn broker_vhost(project_id: ProjectId) -> String {
    format!("project_{}_vhost", project_id.simple())
}

/// Object-store bucket name for a project-scoped bucket
pub fn bucket_name(project_id: ProjectId, base: &str) -> String {
    format!("p-{}-{}", project_id.simple(), base)
}

/// Time-series database name for one of the fixed templates
pub fn tsdb_database_name(project_id: ProjectId, base: &str) -> String {
    format!("{base}_{}", project_id.simple())
}

/// Derived name of a user's personal project
pub fn personal_project_name(user_id: UserId) -> String {
    format!("project_user_{}", user_id.simple())
}

fn system_email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^system_user_([0-9a-f]{32})@opentenant\.local$").expect("static regex")
    })
}

/// Recover the project ID from a system service-account email, if it is one
pub fn parse_system_user_email(email: &str) -> Option<ProjectId> {
    let captures = system_email_regex().captures(email)?;
    uuid::Uuid::try_parse(&captures[1]).ok()
}

/// Whether an identity-provider account is a project system account
pub fn is_system_user_name(name: &str) -> bool {
    name.starts_with(SYSTEM_USER_NAME_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_system_email_roundtrip() {
        let id = Uuid::new_v4();
        let email = system_user_email(id);
        assert_eq!(parse_system_user_email(&email), Some(id));
        assert_eq!(parse_system_user_email("someone@example.com"), None);
    }

    #[test]
    fn test_system_user_name_recognition() {
        let id = Uuid::new_v4();
        assert!(is_system_user_name(&system_user_name(id)));
        assert!(!is_system_user_name("alice"));
    }

    #[test]
    fn test_derived_names_are_stable() {
        let id = Uuid::new_v4();
        assert_eq!(schema_name(id), schema_name(id));
        assert_eq!(broker_vhost(id), broker_vhost(id));
        assert!(bucket_name(id, "reports").ends_with("-reports"));
    }
}
