//! Workflows (jobs)
//!
//! A job can be started by a cron schedule, by continuous mode, or by a file
//! arrival trigger. Each mechanism carries its own `pause_status` and is
//! paused and restored independently; every other field of the mechanism is
//! sent back unchanged.

use super::{cell, Controller, Listing, RestoreReport, ShowFilter, StopReport};
use crate::databricks::session::WorkspaceSession;
use crate::error::Result;
use crate::resource::{fetch_collection, ResourceCollection, ResourceKind, SnapshotStore};
use crate::table::Table;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;

/// Values the API does not document yet read as `Unknown` and never match UNPAUSED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PauseStatus {
    Paused,
    Unpaused,
    Unknown,
}

impl PauseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PauseStatus::Paused => "PAUSED",
            PauseStatus::Unpaused => "UNPAUSED",
            PauseStatus::Unknown => "UNKNOWN",
        }
    }
}

impl From<String> for PauseStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "PAUSED" => PauseStatus::Paused,
            "UNPAUSED" => PauseStatus::Unpaused,
            _ => PauseStatus::Unknown,
        }
    }
}

impl From<PauseStatus> for String {
    fn from(status: PauseStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for PauseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A schedule, continuous or trigger block. Fields other than
/// `pause_status` (cron expression, timezone, file arrival settings) are kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerSetting {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_status: Option<PauseStatus>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl TriggerSetting {
    pub fn is_unpaused(&self) -> bool {
        self.pause_status == Some(PauseStatus::Unpaused)
    }

    /// Copy of this setting with a different pause status
    pub fn with_status(&self, status: PauseStatus) -> Self {
        Self {
            pause_status: Some(status),
            fields: self.fields.clone(),
        }
    }

    fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobSettings {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub schedule: Option<TriggerSetting>,
    #[serde(default)]
    pub continuous: Option<TriggerSetting>,
    #[serde(default)]
    pub trigger: Option<TriggerSetting>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    pub job_id: i64,
    #[serde(default)]
    pub creator_user_name: Option<String>,
    #[serde(default)]
    pub settings: JobSettings,
}

/// The ways a job gets started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mechanism {
    Schedule,
    Continuous,
    Trigger,
}

impl Mechanism {
    pub const ALL: [Mechanism; 3] = [Mechanism::Schedule, Mechanism::Continuous, Mechanism::Trigger];

    /// Settings field name
    pub fn field(self) -> &'static str {
        match self {
            Mechanism::Schedule => "schedule",
            Mechanism::Continuous => "continuous",
            Mechanism::Trigger => "trigger",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Mechanism::Schedule => "scheduled",
            Mechanism::Continuous => "continuous",
            Mechanism::Trigger => "file trigger",
        }
    }

    pub fn setting(self, settings: &JobSettings) -> Option<&TriggerSetting> {
        match self {
            Mechanism::Schedule => settings.schedule.as_ref(),
            Mechanism::Continuous => settings.continuous.as_ref(),
            Mechanism::Trigger => settings.trigger.as_ref(),
        }
    }
}

impl Job {
    /// Mechanisms currently set to UNPAUSED
    pub fn unpaused(&self) -> Vec<(Mechanism, &TriggerSetting)> {
        Mechanism::ALL
            .into_iter()
            .filter_map(|m| m.setting(&self.settings).map(|s| (m, s)))
            .filter(|(_, s)| s.is_unpaused())
            .collect()
    }

    pub fn is_active(&self) -> bool {
        !self.unpaused().is_empty()
    }
}

/// Body of a `jobs/update` call touching a single mechanism
pub fn update_payload(job_id: i64, mechanism: Mechanism, setting: &TriggerSetting) -> Result<Value> {
    let mut new_settings = Map::new();
    new_settings.insert(mechanism.field().to_string(), serde_json::to_value(setting)?);
    Ok(json!({
        "job_id": job_id,
        "new_settings": new_settings,
    }))
}

pub struct Workflows {
    session: Arc<WorkspaceSession>,
}

impl Workflows {
    pub fn new(session: Arc<WorkspaceSession>) -> Self {
        Self { session }
    }

    async fn fetch(&self) -> Result<ResourceCollection> {
        let url = self.session.api("2.1", "jobs/list");
        fetch_collection(&self.session.http, &url, self.kind().aggregate_key(), &[]).await
    }

    async fn set_status(
        &self,
        job: &Job,
        mechanism: Mechanism,
        setting: &TriggerSetting,
        status: PauseStatus,
    ) -> Result<()> {
        let payload = update_payload(job.job_id, mechanism, &setting.with_status(status))?;
        let url = self.session.api("2.1", "jobs/update");
        self.session.http.post(&url, Some(&payload)).await?;
        tracing::info!(job_id = job.job_id, mechanism = mechanism.field(), %status, "Job updated");
        Ok(())
    }
}

#[async_trait]
impl Controller for Workflows {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Workflows
    }

    fn title(&self, filter: ShowFilter) -> String {
        if filter.active_only {
            "Unpaused Workflows".to_string()
        } else {
            "All Workflows".to_string()
        }
    }

    async fn list(&self, filter: ShowFilter) -> Result<Listing> {
        let jobs: Vec<Job> = self.fetch().await?.typed()?;
        if jobs.is_empty() {
            return Ok(Listing::nothing("No workflows found"));
        }

        let status = |s: Option<&TriggerSetting>| {
            s.and_then(|s| s.pause_status)
                .map(|p| p.to_string())
                .unwrap_or_default()
        };

        let mut table = Table::new([
            "Job ID",
            "Job Name",
            "Creator",
            "Continuous",
            "Schedule",
            "Schedule Status",
            "Trigger",
        ]);
        for job in jobs.iter().filter(|j| !filter.active_only || j.is_active()) {
            let s = &job.settings;
            table.push([
                job.job_id.to_string(),
                cell(s.name.as_deref()),
                cell(job.creator_user_name.as_deref()),
                status(s.continuous.as_ref()),
                cell(s.schedule.as_ref().and_then(|x| x.str_field("quartz_cron_expression"))),
                status(s.schedule.as_ref()),
                status(s.trigger.as_ref()),
            ]);
        }

        if table.is_empty() {
            return Ok(Listing::nothing("All workflows are paused"));
        }
        Ok(Listing::Rows(table))
    }

    async fn stop(&self, store: &SnapshotStore) -> Result<StopReport> {
        let collection = self.fetch().await?;
        store.save(self.kind(), &collection)?;

        let jobs: Vec<Job> = collection.typed()?;
        let mut report = StopReport::new(self.kind(), jobs.len());

        for job in &jobs {
            let unpaused = job.unpaused();
            if unpaused.is_empty() {
                report.skipped += 1;
                continue;
            }
            for (mechanism, setting) in unpaused {
                println!("Pausing {} job {}", mechanism.label(), job.job_id);
                self.set_status(job, mechanism, setting, PauseStatus::Paused)
                    .await?;
                report.mutated += 1;
            }
        }

        println!("Paused {} trigger(s)", report.mutated);
        Ok(report)
    }

    async fn restore(&self, store: &SnapshotStore) -> Result<RestoreReport> {
        let Some(collection) = store.load_optional(self.kind())? else {
            println!("No workflow snapshot found, nothing to restore");
            return Ok(RestoreReport::nothing_to_restore(self.kind()));
        };

        let jobs: Vec<Job> = collection.typed()?;
        let mut restored = 0;

        for job in &jobs {
            for (mechanism, setting) in job.unpaused() {
                println!("Resuming {} job {}", mechanism.label(), job.job_id);
                self.set_status(job, mechanism, setting, PauseStatus::Unpaused)
                    .await?;
                restored += 1;
            }
        }

        println!("Resumed {} trigger(s)", restored);
        Ok(RestoreReport::restored(self.kind(), restored, 0))
    }
}
