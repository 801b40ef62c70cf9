//! Persistence layer for run history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteRunStore;

use crate::core::{RunReport, RunStatus, StepStatus};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run ID
    pub run_id: Uuid,

    /// Workflow name
    pub workflow: String,

    pub status: RunStatus,

    pub started_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,

    /// Progress (0.0 to 1.0)
    pub progress: f64,

    pub succeeded_steps: usize,

    pub skipped_steps: usize,

    pub total_steps: usize,
}

impl RunSummary {
    pub fn from_report(report: &RunReport) -> Self {
        Self {
            run_id: report.run_id,
            workflow: report.workflow.clone(),
            status: report.status,
            started_at: report.started_at,
            completed_at: report.completed_at,
            progress: report.progress(),
            succeeded_steps: report.count(StepStatus::Succeeded),
            skipped_steps: report.count(StepStatus::Skipped),
            total_steps: report.steps.len(),
        }
    }
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Save a run report (replacing any earlier save of the same run)
    async fn save_run(&self, report: &RunReport) -> Result<()>;

    /// Load a full report by run ID
    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunReport>>;

    /// List runs of a workflow, most recent first
    async fn list_runs(&self, workflow: &str) -> Result<Vec<RunSummary>>;

    /// List all workflow names with saved runs, sorted
    async fn list_workflows(&self) -> Result<Vec<String>>;
}

/// In-memory persistence (for testing or ephemeral use)
#[derive(Default)]
pub struct InMemoryPersistence {
    runs: RwLock<HashMap<Uuid, RunReport>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_run(&self, report: &RunReport) -> Result<()> {
        self.runs.write().await.insert(report.run_id, report.clone());
        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunReport>> {
        Ok(self.runs.read().await.get(&run_id).cloned())
    }

    async fn list_runs(&self, workflow: &str) -> Result<Vec<RunSummary>> {
        let runs = self.runs.read().await;
        let mut summaries: Vec<RunSummary> = runs
            .values()
            .filter(|r| r.workflow == workflow)
            .map(RunSummary::from_report)
            .collect();
        summaries.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(summaries)
    }

    async fn list_workflows(&self) -> Result<Vec<String>> {
        let runs = self.runs.read().await;
        let mut names: Vec<String> = runs.values().map(|r| r.workflow.clone()).collect();
        names.sort();
        names.dedup();
        Ok(names)
    }
}

/// Open the default history backend
///
/// SQLite under the local data directory when the `sqlite` feature is on,
/// otherwise an in-memory store that lives as long as the process.
pub async fn default_backend() -> Result<Box<dyn PersistenceBackend>> {
    #[cfg(feature = "sqlite")]
    {
        Ok(Box::new(SqliteRunStore::with_default_path().await?))
    }
    #[cfg(not(feature = "sqlite"))]
    {
        Ok(Box::new(InMemoryPersistence::new()))
    }
}
