//! Service Steps: Secrets, Broker Vhost, Time-Series Databases

use crate::context::ProvisionContext;
use crate::step::{StepBody, StepError};
use async_trait::async_trait;
use rand::{distributions::Alphanumeric, Rng};
use std::sync::Arc;
use tenant_clients::{BrokerAdmin, SecretMap, SecretStore, TsdbAdmin};
use tenant_core::names;
use tracing::info;

/// Per-project secret space seeded with the run's derived values.
///
/// Plain secrets hold values project users may read (the system token, the
/// results retention); hidden secrets hold infrastructure pointers the
/// platform resolves internally.
pub struct ProjectSecrets {
    secrets: Arc<dyn SecretStore>,
    results_retention: String,
}

impl ProjectSecrets {
    /// Create the step over a secret store
    pub fn new(secrets: Arc<dyn SecretStore>, results_retention: String) -> Self {
        Self {
            secrets,
            results_retention,
        }
    }
}

#[async_trait]
impl StepBody for ProjectSecrets {
    fn name(&self) -> &'static str {
        "project_secrets"
    }

    async fn create(&self, cx: &mut ProvisionContext) -> Result<(), StepError> {
        let project_id = cx.project_id()?;
        let token = cx.system_token()?.to_string();

        let refs = self.secrets.create_project_space(project_id).await?;
        cx.session
            .update_secret_refs(project_id, serde_json::to_value(&refs)?)?;
        cx.secret_refs = Some(refs);

        let plain = SecretMap::from([
            (
                "results_retention".to_string(),
                serde_json::json!(self.results_retention),
            ),
            ("auth_token".to_string(), serde_json::json!(token)),
        ]);
        self.secrets.set_secrets(project_id, plain).await?;

        let mut hidden = SecretMap::from([(
            "project_id".to_string(),
            serde_json::json!(project_id),
        )]);
        for (key, base) in names::TSDB_DATABASES {
            hidden.insert(
                key.to_string(),
                serde_json::json!(names::tsdb_database_name(project_id, base)),
            );
        }
        self.secrets.set_hidden_secrets(project_id, hidden).await?;
        Ok(())
    }

    async fn delete(&self, cx: &mut ProvisionContext) -> Result<(), StepError> {
        let project_id = cx.project_id()?;
        self.secrets.remove_project_space(project_id).await?;
        Ok(())
    }
}

/// Dedicated broker vhost plus a project-scoped broker user.
///
/// Credentials land in the project's plain secrets so tenant workloads can
/// read them; the names themselves are template-derived, so teardown never
/// needs the secrets back.
pub struct BrokerVhost {
    broker: Arc<dyn BrokerAdmin>,
    secrets: Arc<dyn SecretStore>,
}

impl BrokerVhost {
    /// Create the step over a broker admin and the secret store
    pub fn new(broker: Arc<dyn BrokerAdmin>, secrets: Arc<dyn SecretStore>) -> Self {
        Self { broker, secrets }
    }
}

fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

#[async_trait]
impl StepBody for BrokerVhost {
    fn name(&self) -> &'static str {
        "broker_vhost"
    }

    async fn create(&self, cx: &mut ProvisionContext) -> Result<(), StepError> {
        let project_id = cx.project_id()?;
        let vhost = names::broker_vhost(project_id);
        let user = names::broker_user(project_id);
        let password = generate_password();

        self.broker.create_vhost(&vhost).await?;
        self.broker.create_user(&user, &password).await?;
        self.broker.grant_permission(&user, &vhost).await?;
        info!(project = %project_id, vhost = %vhost, "broker vhost provisioned");

        let mut plain = self.secrets.get_secrets(project_id).await?;
        plain.insert("broker_vhost".to_string(), serde_json::json!(vhost));
        plain.insert("broker_user".to_string(), serde_json::json!(user));
        plain.insert("broker_password".to_string(), serde_json::json!(password));
        self.secrets.set_secrets(project_id, plain).await?;
        Ok(())
    }

    async fn delete(&self, cx: &mut ProvisionContext) -> Result<(), StepError> {
        let project_id = cx.project_id()?;
        self.broker.delete_user(&names::broker_user(project_id)).await?;
        self.broker.delete_vhost(&names::broker_vhost(project_id)).await?;
        Ok(())
    }
}

/// Fixed set of per-project time-series databases
pub struct TsdbDatabases {
    tsdb: Arc<dyn TsdbAdmin>,
    retention: String,
}

impl TsdbDatabases {
    /// Create the step over a time-series admin
    pub fn new(tsdb: Arc<dyn TsdbAdmin>, retention: String) -> Self {
        Self { tsdb, retention }
    }
}

#[async_trait]
impl StepBody for TsdbDatabases {
    fn name(&self) -> &'static str {
        "tsdb_databases"
    }

    async fn create(&self, cx: &mut ProvisionContext) -> Result<(), StepError> {
        let project_id = cx.project_id()?;
        for (_, base) in names::TSDB_DATABASES {
            self.tsdb
                .create_database(&names::tsdb_database_name(project_id, base), &self.retention)
                .await?;
        }
        Ok(())
    }

    async fn delete(&self, cx: &mut ProvisionContext) -> Result<(), StepError> {
        let project_id = cx.project_id()?;
        for (_, base) in names::TSDB_DATABASES {
            self.tsdb
                .drop_database(&names::tsdb_database_name(project_id, base))
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestHarness;
    use tenant_core::{Project, ProjectCreateRequest};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_secrets_step_seeds_both_tiers() {
        let harness = TestHarness::new();
        let owner = Uuid::new_v4();
        let request = ProjectCreateRequest::new("acme", "a@x.com", vec![]);
        let mut cx = harness.create_context(request, owner);

        let project = Project::new("acme", owner, vec![]);
        let project_id = project.id;
        cx.session.upsert_project(project);
        cx.project_id = Some(project_id);
        cx.system_token = Some("tok.api.deadbeef".to_string());

        let step = ProjectSecrets::new(harness.secrets.clone(), "30d".to_string());
        step.create(&mut cx).await.unwrap();

        let plain = harness.secrets.get_secrets(project_id).await.unwrap();
        assert_eq!(plain["auth_token"], "tok.api.deadbeef");
        assert_eq!(plain["results_retention"], "30d");

        let hidden = harness.secrets.get_hidden_secrets(project_id).await.unwrap();
        assert_eq!(
            hidden["load_db"],
            serde_json::json!(names::tsdb_database_name(project_id, "load"))
        );

        // Pointers landed on the (staged) project row
        let row = cx.session.get(project_id).unwrap();
        assert!(row.secret_refs.get("space").is_some());
    }

    #[tokio::test]
    async fn test_broker_step_stores_credentials() {
        let harness = TestHarness::new();
        let project_id = Uuid::new_v4();
        let mut cx = harness.delete_context(project_id);
        harness.secrets.create_project_space(project_id).await.unwrap();

        let step = BrokerVhost::new(harness.broker.clone(), harness.secrets.clone());
        step.create(&mut cx).await.unwrap();

        let vhost = names::broker_vhost(project_id);
        let user = names::broker_user(project_id);
        assert!(harness.broker.has_vhost(&vhost));
        assert!(harness.broker.has_permission(&user, &vhost));

        let plain = harness.secrets.get_secrets(project_id).await.unwrap();
        assert_eq!(plain["broker_vhost"], serde_json::json!(vhost));
        assert_eq!(plain["broker_password"].as_str().unwrap().len(), 32);

        step.delete(&mut cx).await.unwrap();
        assert!(!harness.broker.has_vhost(&vhost));
        assert!(!harness.broker.has_user(&user));
    }

    #[tokio::test]
    async fn test_tsdb_step_creates_all_databases() {
        let harness = TestHarness::new();
        let project_id = Uuid::new_v4();
        let mut cx = harness.delete_context(project_id);

        let step = TsdbDatabases::new(harness.tsdb.clone(), "duration 180d".to_string());
        step.create(&mut cx).await.unwrap();
        assert_eq!(harness.tsdb.database_count(), 4);
        assert!(harness
            .tsdb
            .has_database(&names::tsdb_database_name(project_id, "telemetry")));

        step.delete(&mut cx).await.unwrap();
        assert_eq!(harness.tsdb.database_count(), 0);
    }
}
