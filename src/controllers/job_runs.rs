//! Job runs
//!
//! Active runs are cancelled on stop. Cancelled work cannot be resumed, so
//! restore does nothing.

use super::{cell, Controller, Listing, RestoreReport, ShowFilter, StopReport};
use crate::databricks::session::WorkspaceSession;
use crate::error::Result;
use crate::resource::{fetch_collection, query_params, ResourceCollection, ResourceKind, SnapshotStore};
use crate::table::Table;
use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Page size of `jobs/runs/list`
const RUNS_PAGE_SIZE: &str = "25";

/// Life cycle states after which a run can no longer be cancelled
const TERMINAL_STATES: &[&str] = &["TERMINATED", "SKIPPED", "INTERNAL_ERROR"];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunState {
    #[serde(default)]
    pub life_cycle_state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Run {
    pub run_id: i64,
    #[serde(default)]
    pub job_id: Option<i64>,
    #[serde(default)]
    pub creator_user_name: Option<String>,
    /// Epoch milliseconds
    #[serde(default)]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub state: RunState,
}

impl Run {
    pub fn is_active(&self) -> bool {
        match self.state.life_cycle_state.as_deref() {
            Some(state) => !TERMINAL_STATES.contains(&state),
            None => true,
        }
    }

    fn started(&self) -> String {
        self.start_time
            .and_then(DateTime::from_timestamp_millis)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default()
    }
}

pub struct JobRuns {
    session: Arc<WorkspaceSession>,
}

impl JobRuns {
    pub fn new(session: Arc<WorkspaceSession>) -> Self {
        Self { session }
    }

    async fn fetch(&self, active_only: bool) -> Result<ResourceCollection> {
        let url = self.session.api("2.1", "jobs/runs/list");
        let mut params = query_params(&[("limit", RUNS_PAGE_SIZE)]);
        if active_only {
            params.extend(query_params(&[("active_only", "true")]));
        }
        fetch_collection(&self.session.http, &url, self.kind().aggregate_key(), &params).await
    }
}

#[async_trait]
impl Controller for JobRuns {
    fn kind(&self) -> ResourceKind {
        ResourceKind::JobRuns
    }

    fn title(&self, filter: ShowFilter) -> String {
        if filter.active_only {
            "Running Jobs".to_string()
        } else {
            "All Job Runs".to_string()
        }
    }

    async fn list(&self, filter: ShowFilter) -> Result<Listing> {
        let runs: Vec<Run> = self.fetch(filter.active_only).await?.typed()?;
        if runs.is_empty() {
            return Ok(Listing::nothing("No job runs found"));
        }

        let mut table = Table::new(["Run ID", "Job ID", "Creator", "Start Time", "State"]);
        for run in &runs {
            table.push([
                run.run_id.to_string(),
                run.job_id.map(|id| id.to_string()).unwrap_or_default(),
                cell(run.creator_user_name.as_deref()),
                run.started(),
                cell(run.state.life_cycle_state.as_deref()),
            ]);
        }
        Ok(Listing::Rows(table))
    }

    async fn stop(&self, store: &SnapshotStore) -> Result<StopReport> {
        let collection = self.fetch(true).await?;
        store.save(self.kind(), &collection)?;

        let runs: Vec<Run> = collection.typed()?;
        let mut report = StopReport::new(self.kind(), runs.len());
        if runs.is_empty() {
            println!("No active job runs to stop");
            return Ok(report);
        }

        let url = self.session.api("2.1", "jobs/runs/cancel");
        for run in &runs {
            if !run.is_active() {
                report.skipped += 1;
                continue;
            }
            self.session
                .http
                .post(&url, Some(&json!({ "run_id": run.run_id })))
                .await?;
            tracing::info!(run_id = run.run_id, "Run cancelled");
            report.mutated += 1;
        }

        println!("Stopped {} active job runs", report.mutated);
        Ok(report)
    }

    async fn restore(&self, _store: &SnapshotStore) -> Result<RestoreReport> {
        Ok(RestoreReport::not_restorable(self.kind()))
    }
}
