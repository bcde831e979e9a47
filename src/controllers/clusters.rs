//! All-purpose compute clusters
//!
//! Every cluster that is not TERMINATED is terminated on stop. Clusters are
//! not started again by restore.

use super::{cell, Controller, Listing, RestoreReport, ShowFilter, StopReport};
use crate::databricks::session::WorkspaceSession;
use crate::error::Result;
use crate::resource::{fetch_collection, ResourceCollection, ResourceKind, SnapshotStore};
use crate::table::Table;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

pub const TERMINATED: &str = "TERMINATED";

#[derive(Debug, Clone, Deserialize)]
pub struct Cluster {
    pub cluster_id: String,
    #[serde(default)]
    pub cluster_name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub creator_user_name: Option<String>,
}

impl Cluster {
    pub fn is_terminated(&self) -> bool {
        self.state.as_deref() == Some(TERMINATED)
    }
}

pub struct Clusters {
    session: Arc<WorkspaceSession>,
}

impl Clusters {
    pub fn new(session: Arc<WorkspaceSession>) -> Self {
        Self { session }
    }

    async fn fetch(&self) -> Result<ResourceCollection> {
        let url = self.session.api("2.0", "clusters/list");
        fetch_collection(&self.session.http, &url, self.kind().aggregate_key(), &[]).await
    }
}

#[async_trait]
impl Controller for Clusters {
    fn kind(&self) -> ResourceKind {
        ResourceKind::AllPurposeCompute
    }

    async fn list(&self, filter: ShowFilter) -> Result<Listing> {
        let clusters: Vec<Cluster> = self.fetch().await?.typed()?;
        if clusters.is_empty() {
            return Ok(Listing::nothing("No clusters found"));
        }

        let mut table = Table::new(["Cluster ID", "Cluster Name", "State", "Creator"]);
        for cluster in clusters
            .iter()
            .filter(|c| !filter.active_only || !c.is_terminated())
        {
            table.push([
                cluster.cluster_id.clone(),
                cell(cluster.cluster_name.as_deref()),
                cell(cluster.state.as_deref()),
                cell(cluster.creator_user_name.as_deref()),
            ]);
        }

        if table.is_empty() {
            return Ok(Listing::nothing("All clusters are terminated"));
        }
        Ok(Listing::Rows(table))
    }

    async fn stop(&self, store: &SnapshotStore) -> Result<StopReport> {
        let collection = self.fetch().await?;
        store.save(self.kind(), &collection)?;

        let clusters: Vec<Cluster> = collection.typed()?;
        let mut report = StopReport::new(self.kind(), clusters.len());
        let running: Vec<&Cluster> = clusters.iter().filter(|c| !c.is_terminated()).collect();
        report.skipped = clusters.len() - running.len();

        if running.is_empty() {
            println!("All clusters are already terminated");
            return Ok(report);
        }

        println!("Terminating {} clusters", running.len());
        let url = self.session.api("2.0", "clusters/delete");
        for cluster in running {
            self.session
                .http
                .post(&url, Some(&json!({ "cluster_id": cluster.cluster_id })))
                .await?;
            tracing::info!(cluster_id = %cluster.cluster_id, "Cluster terminated");
            report.mutated += 1;
        }

        println!("Terminated {} clusters", report.mutated);
        Ok(report)
    }

    async fn restore(&self, _store: &SnapshotStore) -> Result<RestoreReport> {
        Ok(RestoreReport::not_restorable(self.kind()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_terminated_state_counts_as_stopped() {
        let c = |state: &str| Cluster {
            cluster_id: "0101-abc".into(),
            cluster_name: None,
            state: Some(state.into()),
            creator_user_name: None,
        };
        assert!(c("TERMINATED").is_terminated());
        assert!(!c("RUNNING").is_terminated());
        assert!(!c("PENDING").is_terminated());
    }
}
