//! SQL warehouses
//!
//! Every warehouse that is not STOPPED is stopped. Warehouses start on demand,
//! so restore leaves them alone.

use super::{cell, Controller, Listing, RestoreReport, ShowFilter, StopReport};
use crate::databricks::session::WorkspaceSession;
use crate::error::Result;
use crate::resource::{fetch_collection, ResourceCollection, ResourceKind, SnapshotStore};
use crate::table::Table;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

pub const STOPPED: &str = "STOPPED";

#[derive(Debug, Clone, Deserialize)]
pub struct Warehouse {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

impl Warehouse {
    pub fn is_stopped(&self) -> bool {
        self.state.as_deref() == Some(STOPPED)
    }
}

pub struct SqlWarehouses {
    session: Arc<WorkspaceSession>,
}

impl SqlWarehouses {
    pub fn new(session: Arc<WorkspaceSession>) -> Self {
        Self { session }
    }

    async fn fetch(&self) -> Result<ResourceCollection> {
        let url = self.session.api("2.0", "sql/warehouses");
        fetch_collection(&self.session.http, &url, self.kind().aggregate_key(), &[]).await
    }
}

#[async_trait]
impl Controller for SqlWarehouses {
    fn kind(&self) -> ResourceKind {
        ResourceKind::SqlWarehouses
    }

    async fn list(&self, filter: ShowFilter) -> Result<Listing> {
        let warehouses: Vec<Warehouse> = self.fetch().await?.typed()?;
        if warehouses.is_empty() {
            return Ok(Listing::nothing("No warehouses found"));
        }

        let mut table = Table::new(["Warehouse ID", "Warehouse Name", "State"]);
        for w in warehouses
            .iter()
            .filter(|w| !filter.active_only || !w.is_stopped())
        {
            table.push([w.id.clone(), cell(w.name.as_deref()), cell(w.state.as_deref())]);
        }

        if table.is_empty() {
            return Ok(Listing::nothing("All warehouses are stopped"));
        }
        Ok(Listing::Rows(table))
    }

    async fn stop(&self, store: &SnapshotStore) -> Result<StopReport> {
        let collection = self.fetch().await?;
        store.save(self.kind(), &collection)?;

        let warehouses: Vec<Warehouse> = collection.typed()?;
        let mut report = StopReport::new(self.kind(), warehouses.len());
        if warehouses.is_empty() {
            println!("No warehouses to stop");
            return Ok(report);
        }

        for w in &warehouses {
            if w.is_stopped() {
                report.skipped += 1;
                continue;
            }
            let url = self.session.api("2.0", &format!("sql/warehouses/{}/stop", w.id));
            self.session.http.post(&url, None).await?;
            tracing::info!(warehouse_id = %w.id, "Warehouse stopped");
            report.mutated += 1;
        }

        println!("Stopped {} warehouses", report.mutated);
        Ok(report)
    }

    async fn restore(&self, _store: &SnapshotStore) -> Result<RestoreReport> {
        Ok(RestoreReport::not_restorable(self.kind()))
    }
}
