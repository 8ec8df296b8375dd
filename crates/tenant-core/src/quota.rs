//! Project Quotas and Usage Statistics
//!
//! Two-tier ceilings per resource class: breaching the soft limit surfaces a
//! warning, breaching the hard limit denies only when the class is flagged to
//! block. `-1` (or `None` for the tiered ceilings) means unlimited.

use crate::model::ProjectId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Seconds in the usage accounting window (30 days)
const USAGE_WINDOW_SECS: i64 = 2_592_000;

/// Per-project resource limits, one-to-one with a project row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectQuota {
    /// Owning project
    pub project_id: ProjectId,
    /// Data retention limit, -1 for unlimited
    pub data_retention_limit: i64,
    /// Max task duration, -1 for unlimited
    pub task_duration_limit: i64,
    /// CPU limit, -1 for unlimited
    pub cpu_limit: i64,
    /// Memory limit, -1 for unlimited
    pub memory_limit: i64,
    /// Compute soft ceiling
    pub compute_soft_limit: Option<i64>,
    /// Compute hard ceiling
    pub compute_hard_limit: Option<i64>,
    /// Deny work once the compute hard ceiling is breached
    pub compute_block_on_hard: bool,
    /// Storage soft ceiling (GB)
    pub storage_soft_limit: Option<i64>,
    /// Storage hard ceiling (GB)
    pub storage_hard_limit: Option<i64>,
    /// Deny writes once the storage hard ceiling is breached
    pub storage_block_on_hard: bool,
    /// Start of the current usage window
    pub last_update_time: DateTime<Utc>,
}

impl ProjectQuota {
    /// Create quota with the request-supplied hard ceilings
    pub fn new(project_id: ProjectId, data_retention_limit: i64, storage_limit: i64, compute_limit: i64) -> Self {
        Self {
            project_id,
            data_retention_limit,
            task_duration_limit: -1,
            cpu_limit: -1,
            memory_limit: -1,
            compute_soft_limit: None,
            compute_hard_limit: limit_opt(compute_limit),
            compute_block_on_hard: false,
            storage_soft_limit: None,
            storage_hard_limit: limit_opt(storage_limit),
            storage_block_on_hard: false,
            last_update_time: Utc::now(),
        }
    }

    /// Admin update: retention limit
    pub fn update_retention_limit(&mut self, data_retention_limit: i64) {
        self.data_retention_limit = data_retention_limit;
    }

    /// Admin update: compute ceilings
    pub fn update_compute_limits(&mut self, hard: Option<i64>, soft: Option<i64>, block_on_hard: bool) {
        self.compute_hard_limit = hard;
        self.compute_soft_limit = soft;
        self.compute_block_on_hard = block_on_hard;
    }

    /// Admin update: storage ceilings
    pub fn update_storage_limits(&mut self, hard: Option<i64>, soft: Option<i64>, block_on_hard: bool) {
        self.storage_hard_limit = hard;
        self.storage_soft_limit = soft;
        self.storage_block_on_hard = block_on_hard;
    }

    /// Storage hard ceiling in bytes
    pub fn storage_hard_limit_bytes(&self) -> Option<i64> {
        self.storage_hard_limit.map(|gb| gb * 1_000_000_000)
    }

    /// Storage soft ceiling in bytes
    pub fn storage_soft_limit_bytes(&self) -> Option<i64> {
        self.storage_soft_limit.map(|gb| gb * 1_000_000_000)
    }

    /// Advance the usage window. Returns true when a new 30-day window opened
    /// and the statistic's usage counters were reset.
    pub fn roll_window(&mut self, statistic: &mut Statistic) -> bool {
        let elapsed = Utc::now() - self.last_update_time;
        if elapsed.num_seconds() <= USAGE_WINDOW_SECS {
            return false;
        }
        self.last_update_time += Duration::seconds(USAGE_WINDOW_SECS);
        statistic.reset_usage();
        true
    }

    /// Evaluate current usage against the ceilings for one resource class
    pub fn check(&self, statistic: &Statistic, class: ResourceClass) -> QuotaVerdict {
        let (used, soft, hard, block) = match class {
            ResourceClass::Compute => (
                statistic.compute_used,
                self.compute_soft_limit,
                self.compute_hard_limit,
                self.compute_block_on_hard,
            ),
            ResourceClass::Storage => (
                statistic.storage_used,
                self.storage_soft_limit,
                self.storage_hard_limit,
                self.storage_block_on_hard,
            ),
        };
        if let Some(hard) = hard {
            if hard >= 0 && used >= hard {
                return if block {
                    QuotaVerdict::Blocked
                } else {
                    QuotaVerdict::HardBreach
                };
            }
        }
        if let Some(soft) = soft {
            if soft >= 0 && used >= soft {
                return QuotaVerdict::SoftBreach;
            }
        }
        QuotaVerdict::Allowed
    }
}

fn limit_opt(value: i64) -> Option<i64> {
    if value < 0 {
        None
    } else {
        Some(value)
    }
}

/// Resource class with tiered ceilings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceClass {
    /// Compute usage (task minutes)
    Compute,
    /// Storage usage (GB)
    Storage,
}

/// Outcome of a quota check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuotaVerdict {
    /// Within all ceilings
    Allowed,
    /// Soft ceiling breached; work proceeds with a warning
    SoftBreach,
    /// Hard ceiling breached but the class is not flagged to block
    HardBreach,
    /// Hard ceiling breached and the class blocks on breach
    Blocked,
}

/// One trackable usage counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageCounter {
    /// Task executions
    Tasks,
    /// Compute (task minutes)
    Compute,
    /// Storage level (GB)
    Storage,
    /// Static scans
    SastScans,
    /// Dynamic scans
    DastScans,
}

/// Per-project usage counters, one-to-one with a project row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statistic {
    /// Owning project
    pub project_id: ProjectId,
    /// Window start
    pub start_time: DateTime<Utc>,
    /// Task executions in the current window
    pub tasks_executions: i64,
    /// Compute used in the current window
    pub compute_used: i64,
    /// Storage used (GB)
    pub storage_used: i64,
    /// Static scans run in the current window
    pub sast_scans: i64,
    /// Dynamic scans run in the current window
    pub dast_scans: i64,
}

impl Statistic {
    /// Fresh counters for a new project
    pub fn new(project_id: ProjectId) -> Self {
        Self {
            project_id,
            start_time: Utc::now(),
            tasks_executions: 0,
            compute_used: 0,
            storage_used: 0,
            sast_scans: 0,
            dast_scans: 0,
        }
    }

    /// Add to one usage counter
    pub fn increment(&mut self, counter: UsageCounter, amount: i64) {
        match counter {
            UsageCounter::Tasks => self.tasks_executions += amount,
            UsageCounter::Compute => self.compute_used += amount,
            UsageCounter::Storage => self.storage_used += amount,
            UsageCounter::SastScans => self.sast_scans += amount,
            UsageCounter::DastScans => self.dast_scans += amount,
        }
    }

    /// Zero the windowed usage counters
    pub fn reset_usage(&mut self) {
        self.tasks_executions = 0;
        self.compute_used = 0;
        self.sast_scans = 0;
        self.dast_scans = 0;
    }
}
