//! Step Contract
//!
//! A provisioning step is a named create/delete pair over one backing
//! resource. The [`Step`] wrapper records, per run, whether each direction
//! was entered and how it ended; status is captured before any error is
//! propagated so a failed run still yields a full report.

use crate::context::ProvisionContext;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tenant_clients::{BrokerError, IdentityError, ObjectStoreError, SecretStoreError, TsdbError};
use tenant_core::StoreError;
use tracing::warn;

/// Step execution failure
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// Relational store failure
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Secret store failure
    #[error(transparent)]
    Secrets(#[from] SecretStoreError),
    /// Identity provider failure
    #[error(transparent)]
    Identity(#[from] IdentityError),
    /// Broker admin failure
    #[error(transparent)]
    Broker(#[from] BrokerError),
    /// Time-series admin failure
    #[error(transparent)]
    Tsdb(#[from] TsdbError),
    /// Object store failure
    #[error(transparent)]
    Objects(#[from] ObjectStoreError),
    /// Payload serialization failure
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// A step ran before the context value it depends on was produced
    #[error("missing context value: {0}")]
    MissingContext(&'static str),
}

/// Per-direction execution record
#[derive(Debug, Clone, Default)]
pub struct StatusRecord {
    /// The direction was entered
    pub initialized: bool,
    /// How the direction ended; `None` while still running or never entered
    pub ok: Option<bool>,
    /// Error text on failure, empty otherwise
    pub message: String,
}

/// Reportable snapshot of one step direction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    /// Step name
    pub step: String,
    /// The direction was entered
    pub initialized: bool,
    /// How the direction ended
    pub ok: Option<bool>,
    /// Error text on failure
    pub message: String,
}

/// One provisioning step's behavior
#[async_trait]
pub trait StepBody: Send + Sync {
    /// Stable step name; steps with equal names are the same logical step
    fn name(&self) -> &'static str;

    /// Provision the step's resource
    async fn create(&self, cx: &mut ProvisionContext) -> Result<(), StepError>;

    /// Tear the step's resource down
    async fn delete(&self, cx: &mut ProvisionContext) -> Result<(), StepError>;
}

/// A registered step with per-run status tracking
pub struct Step {
    body: Box<dyn StepBody>,
    created: Mutex<StatusRecord>,
    deleted: Mutex<StatusRecord>,
}

impl Step {
    /// Wrap a step body for one run
    pub fn new(body: Box<dyn StepBody>) -> Self {
        Self {
            body,
            created: Mutex::new(StatusRecord::default()),
            deleted: Mutex::new(StatusRecord::default()),
        }
    }

    /// Step name
    pub fn name(&self) -> &'static str {
        self.body.name()
    }

    /// Run the forward direction, recording status either way
    pub async fn create(&self, cx: &mut ProvisionContext) -> Result<(), StepError> {
        self.created.lock().initialized = true;
        match self.body.create(cx).await {
            Ok(()) => {
                self.created.lock().ok = Some(true);
                Ok(())
            }
            Err(e) => {
                let mut record = self.created.lock();
                record.ok = Some(false);
                record.message = e.to_string();
                warn!(step = self.name(), error = %e, "create step failed");
                Err(e)
            }
        }
    }

    /// Run the reverse direction, recording status either way
    pub async fn delete(&self, cx: &mut ProvisionContext) -> Result<(), StepError> {
        self.deleted.lock().initialized = true;
        match self.body.delete(cx).await {
            Ok(()) => {
                self.deleted.lock().ok = Some(true);
                Ok(())
            }
            Err(e) => {
                let mut record = self.deleted.lock();
                record.ok = Some(false);
                record.message = e.to_string();
                warn!(step = self.name(), error = %e, "delete step failed");
                Err(e)
            }
        }
    }

    /// Snapshot of the forward direction
    pub fn report_created(&self) -> StepReport {
        let record = self.created.lock();
        StepReport {
            step: self.name().to_string(),
            initialized: record.initialized,
            ok: record.ok,
            message: record.message.clone(),
        }
    }

    /// Snapshot of the reverse direction
    pub fn report_deleted(&self) -> StepReport {
        let record = self.deleted.lock();
        StepReport {
            step: self.name().to_string(),
            initialized: record.initialized,
            ok: record.ok,
            message: record.message.clone(),
        }
    }
}
