//! Record, Bucket and Schema Steps

use crate::context::ProvisionContext;
use crate::step::{StepBody, StepError};
use async_trait::async_trait;
use std::sync::Arc;
use tenant_clients::{BucketKind, ObjectStore};
use tenant_core::names;
use tenant_core::quota::{ProjectQuota, Statistic};
use tenant_core::Project;
use tracing::{debug, info};

/// First step: the project row plus its quota and statistic rows.
///
/// Re-entrant by name: when a row with the requested name already exists the
/// step adopts it instead of inserting a duplicate.
pub struct ProjectRecord;

#[async_trait]
impl StepBody for ProjectRecord {
    fn name(&self) -> &'static str {
        "project_record"
    }

    async fn create(&self, cx: &mut ProvisionContext) -> Result<(), StepError> {
        let request = cx.request()?.clone();
        let owner_id = cx.owner_id()?;

        let project = match cx.session.find_by_name(&request.name) {
            Some(existing) => {
                debug!(project = %existing.id, name = %request.name, "adopting existing project row");
                existing
            }
            None => {
                let project = Project::new(&request.name, owner_id, request.plugins.clone());
                cx.session.upsert_project(project.clone());
                cx.session.upsert_quota(ProjectQuota::new(
                    project.id,
                    request.data_retention_limit,
                    request.storage_limit,
                    request.compute_limit,
                ));
                cx.session.upsert_statistic(Statistic::new(project.id));
                info!(project = %project.id, name = %project.name, "project row created");
                project
            }
        };
        cx.project_id = Some(project.id);
        cx.project = Some(project);
        Ok(())
    }

    async fn delete(&self, cx: &mut ProvisionContext) -> Result<(), StepError> {
        let project_id = cx.project_id()?;
        cx.session.remove_statistic(project_id);
        cx.session.remove_quota(project_id);
        cx.session.remove_project(project_id);
        Ok(())
    }
}

/// Object-store buckets every project gets
pub struct ObjectBuckets {
    objects: Arc<dyn ObjectStore>,
}

impl ObjectBuckets {
    /// Create the step over an object store
    pub fn new(objects: Arc<dyn ObjectStore>) -> Self {
        Self { objects }
    }
}

#[async_trait]
impl StepBody for ObjectBuckets {
    fn name(&self) -> &'static str {
        "object_buckets"
    }

    async fn create(&self, cx: &mut ProvisionContext) -> Result<(), StepError> {
        let project_id = cx.project_id()?;
        for base in names::SYSTEM_BUCKETS {
            self.objects
                .create_bucket(&names::bucket_name(project_id, base), BucketKind::System)
                .await?;
        }
        Ok(())
    }

    async fn delete(&self, cx: &mut ProvisionContext) -> Result<(), StepError> {
        let project_id = cx.project_id()?;
        for base in names::SYSTEM_BUCKETS {
            self.objects
                .remove_bucket(&names::bucket_name(project_id, base))
                .await?;
        }
        Ok(())
    }
}

/// Relational schema/namespace for the project's own tables
pub struct ProjectSchema;

#[async_trait]
impl StepBody for ProjectSchema {
    fn name(&self) -> &'static str {
        "project_schema"
    }

    async fn create(&self, cx: &mut ProvisionContext) -> Result<(), StepError> {
        let project_id = cx.project_id()?;
        cx.session.create_schema(&names::schema_name(project_id));
        Ok(())
    }

    async fn delete(&self, cx: &mut ProvisionContext) -> Result<(), StepError> {
        let project_id = cx.project_id()?;
        cx.session.drop_schema(&names::schema_name(project_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestHarness;
    use tenant_core::ProjectCreateRequest;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_record_step_reuses_existing_row() {
        let harness = TestHarness::new();
        let request = ProjectCreateRequest::new("acme", "a@x.com", vec![]);
        let owner = Uuid::new_v4();

        let mut cx = harness.create_context(request.clone(), owner);
        ProjectRecord.create(&mut cx).await.unwrap();
        let first = cx.project_id.unwrap();

        // Re-entering the same run context finds the staged row
        ProjectRecord.create(&mut cx).await.unwrap();
        assert_eq!(cx.project_id, Some(first));
    }

    #[tokio::test]
    async fn test_buckets_create_and_delete() {
        let harness = TestHarness::new();
        let project_id = Uuid::new_v4();
        let mut cx = harness.delete_context(project_id);
        let step = ObjectBuckets::new(harness.objects.clone());

        step.create(&mut cx).await.unwrap();
        assert!(harness.objects.has_bucket(&names::bucket_name(project_id, "reports")));
        assert!(harness.objects.has_bucket(&names::bucket_name(project_id, "tasks")));

        step.delete(&mut cx).await.unwrap();
        assert_eq!(harness.objects.bucket_count(), 0);
    }

    #[tokio::test]
    async fn test_schema_round_trip() {
        let harness = TestHarness::new();
        let project_id = Uuid::new_v4();
        let mut cx = harness.delete_context(project_id);

        ProjectSchema.create(&mut cx).await.unwrap();
        assert!(harness.store.has_schema(&names::schema_name(project_id)));

        ProjectSchema.delete(&mut cx).await.unwrap();
        assert!(!harness.store.has_schema(&names::schema_name(project_id)));
    }
}
