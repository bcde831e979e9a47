//! Workspace Manager
//!
//! Runs the controllers one after another in a fixed order. The first fatal
//! error aborts the remaining controllers.

use crate::controllers::{
    Clusters, Controller, JobRuns, Permissions, RestoreReport, ShowFilter, SqlWarehouses,
    StopReport, Workflows,
};
use crate::databricks::session::WorkspaceSession;
use crate::error::Result;
use crate::resource::{ResourceKind, SnapshotStore};
use std::path::Path;
use std::sync::Arc;

/// Order in which `show` lists the kinds
pub const SHOW_ORDER: [ResourceKind; 5] = [
    ResourceKind::PermissionAssignments,
    ResourceKind::Workflows,
    ResourceKind::JobRuns,
    ResourceKind::AllPurposeCompute,
    ResourceKind::SqlWarehouses,
];

/// Order in which `stop` and `restore` visit the kinds
pub const LIFECYCLE_ORDER: [ResourceKind; 5] = [
    ResourceKind::PermissionAssignments,
    ResourceKind::Workflows,
    ResourceKind::AllPurposeCompute,
    ResourceKind::JobRuns,
    ResourceKind::SqlWarehouses,
];

pub struct WorkspaceManager {
    session: Arc<WorkspaceSession>,
    permissions: Permissions,
    workflows: Workflows,
    job_runs: JobRuns,
    clusters: Clusters,
    warehouses: SqlWarehouses,
}

impl WorkspaceManager {
    pub fn new(session: Arc<WorkspaceSession>) -> Self {
        Self {
            permissions: Permissions::new(session.clone()),
            workflows: Workflows::new(session.clone()),
            job_runs: JobRuns::new(session.clone()),
            clusters: Clusters::new(session.clone()),
            warehouses: SqlWarehouses::new(session.clone()),
            session,
        }
    }

    /// Principals whose permission assignments survive `stop`
    pub fn with_ignored_principals(mut self, principals: impl IntoIterator<Item = i64>) -> Self {
        self.permissions = self.permissions.with_ignored(principals);
        self
    }

    pub fn controller(&self, kind: ResourceKind) -> &dyn Controller {
        match kind {
            ResourceKind::PermissionAssignments => &self.permissions,
            ResourceKind::Workflows => &self.workflows,
            ResourceKind::JobRuns => &self.job_runs,
            ResourceKind::AllPurposeCompute => &self.clusters,
            ResourceKind::SqlWarehouses => &self.warehouses,
        }
    }

    /// Claim the snapshot directory for this invocation: `{state_dir}/{env}_{timestamp}`
    pub fn run_store(&self, state_dir: &Path) -> Result<SnapshotStore> {
        SnapshotStore::create_run(state_dir, &self.session.run_name())
    }

    pub async fn show(&self, filter: ShowFilter) -> Result<()> {
        for kind in SHOW_ORDER {
            self.controller(kind).show(filter).await?;
        }
        Ok(())
    }

    /// Halt the workspace, writing snapshots into `store`
    pub async fn stop(&self, store: &SnapshotStore) -> Result<Vec<StopReport>> {
        tracing::info!(
            workspace_id = self.session.workspace_id(),
            root = %store.root().display(),
            "Halting workspace"
        );
        println!("Saving restore state to {}", store.root().display());

        let mut reports = Vec::with_capacity(LIFECYCLE_ORDER.len());
        for kind in LIFECYCLE_ORDER {
            crate::table::print_header(&format!("Stopping {}", kind.display_name()));
            let report = self.controller(kind).stop(store).await?;
            tracing::info!("{}", report);
            reports.push(report);
        }
        Ok(reports)
    }

    /// Restore the workspace from the snapshots in `store`
    pub async fn restore(&self, store: &SnapshotStore) -> Result<Vec<RestoreReport>> {
        tracing::info!(
            workspace_id = self.session.workspace_id(),
            root = %store.root().display(),
            "Restoring workspace"
        );

        let mut reports = Vec::with_capacity(LIFECYCLE_ORDER.len());
        for kind in LIFECYCLE_ORDER {
            crate::table::print_header(&format!("Restoring {}", kind.display_name()));
            let report = self.controller(kind).restore(store).await?;
            tracing::info!("{}", report);
            reports.push(report);
        }
        Ok(reports)
    }
}
