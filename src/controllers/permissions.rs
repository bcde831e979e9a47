//! Workspace permission assignments
//!
//! Stop revokes every principal's assignment except the exempt ones; restore
//! re-grants every recorded assignment as it was. The snapshot is mandatory
//! for restore: access control is never silently skipped.

use super::{cell, Controller, Listing, RestoreReport, ShowFilter, StopReport};
use crate::databricks::session::WorkspaceSession;
use crate::error::Result;
use crate::resource::{
    fetch_collection, run_bulk, ResourceCollection, ResourceKind, SnapshotStore, MAX_IN_FLIGHT,
};
use crate::table::Table;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
pub struct Principal {
    pub principal_id: i64,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub service_principal_name: Option<String>,
}

impl Principal {
    pub fn name(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .or(self.user_name.as_deref())
            .or(self.group_name.as_deref())
            .or(self.service_principal_name.as_deref())
    }
}

/// One principal's permissions on the workspace
#[derive(Debug, Clone, Deserialize)]
pub struct PermissionAssignment {
    pub principal: Principal,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Principal ids to revoke: everyone not in `ignored`, in listing order
pub fn revoke_targets(assignments: &[PermissionAssignment], ignored: &BTreeSet<i64>) -> Vec<i64> {
    assignments
        .iter()
        .map(|a| a.principal.principal_id)
        .filter(|id| !ignored.contains(id))
        .collect()
}

pub struct Permissions {
    session: Arc<WorkspaceSession>,
    ignored: BTreeSet<i64>,
}

impl Permissions {
    pub fn new(session: Arc<WorkspaceSession>) -> Self {
        Self {
            session,
            ignored: BTreeSet::new(),
        }
    }

    /// Principals that keep their access through `stop`
    pub fn with_ignored(mut self, principals: impl IntoIterator<Item = i64>) -> Self {
        self.ignored.extend(principals);
        self
    }

    fn principal_url(&self, principal_id: i64) -> String {
        self.session.account_workspace_url(&format!(
            "permissionassignments/principals/{}",
            principal_id
        ))
    }

    async fn fetch(&self) -> Result<ResourceCollection> {
        let url = self.session.account_workspace_url("permissionassignments");
        fetch_collection(&self.session.http, &url, self.kind().aggregate_key(), &[]).await
    }
}

#[async_trait]
impl Controller for Permissions {
    fn kind(&self) -> ResourceKind {
        ResourceKind::PermissionAssignments
    }

    async fn list(&self, _filter: ShowFilter) -> Result<Listing> {
        let assignments: Vec<PermissionAssignment> = self.fetch().await?.typed()?;
        if assignments.is_empty() {
            return Ok(Listing::nothing("No permissions found"));
        }

        let mut table = Table::new(["Principal ID", "Display Name", "Permissions"]);
        for a in &assignments {
            table.push([
                a.principal.principal_id.to_string(),
                cell(a.principal.name()),
                a.permissions.join(", "),
            ]);
        }
        Ok(Listing::Rows(table))
    }

    async fn stop(&self, store: &SnapshotStore) -> Result<StopReport> {
        let collection = self.fetch().await?;
        store.save(self.kind(), &collection)?;

        let assignments: Vec<PermissionAssignment> = collection.typed()?;
        let targets = revoke_targets(&assignments, &self.ignored);

        let mut report = StopReport::new(self.kind(), assignments.len());
        report.skipped = assignments.len() - targets.len();

        if !self.ignored.is_empty() {
            println!(
                "Ignoring principals: {}",
                self.ignored
                    .iter()
                    .map(i64::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        let http = &self.session.http;
        let bulk = run_bulk(targets, MAX_IN_FLIGHT, |principal_id| {
            let url = self.principal_url(principal_id);
            async move {
                tracing::info!("Revoking workspace access for principal {}", principal_id);
                http.delete(&url).await.map(|_| ())
            }
        })
        .await;

        for (principal_id, err) in &bulk.failed {
            eprintln!("Error removing permission for principal {}: {}", principal_id, err);
        }

        report.mutated = bulk.success_count();
        report.failed = bulk.failure_count();
        println!("Deleted {} permissions", report.mutated);
        Ok(report)
    }

    async fn restore(&self, store: &SnapshotStore) -> Result<RestoreReport> {
        let collection = store.load(self.kind())?;
        let assignments: Vec<PermissionAssignment> = collection.typed()?;

        // PUT takes the assignment exactly as it was listed
        let grants: HashMap<i64, Value> = assignments
            .iter()
            .zip(collection.items())
            .map(|(a, raw)| (a.principal.principal_id, raw.clone()))
            .collect();
        let principal_ids: Vec<i64> = assignments
            .iter()
            .map(|a| a.principal.principal_id)
            .collect();

        let http = &self.session.http;
        let grants = &grants;
        let bulk = run_bulk(principal_ids, MAX_IN_FLIGHT, |principal_id| {
            let url = self.principal_url(principal_id);
            let body = grants.get(&principal_id).cloned().unwrap_or(Value::Null);
            async move {
                tracing::info!("Restoring workspace access for principal {}", principal_id);
                http.put(&url, &body).await.map(|_| ())
            }
        })
        .await;

        for (principal_id, err) in &bulk.failed {
            eprintln!("Error restoring permission for principal {}: {}", principal_id, err);
        }

        println!("Restored {} permissions", bulk.success_count());
        Ok(RestoreReport::restored(
            self.kind(),
            bulk.success_count(),
            bulk.failure_count(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assignments(ids: &[i64]) -> Vec<PermissionAssignment> {
        ids.iter()
            .map(|id| {
                serde_json::from_value(json!({
                    "principal": {"principal_id": id, "display_name": format!("p{id}")},
                    "permissions": ["USER"]
                }))
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn exempt_principals_are_not_revoked() {
        let ignored: BTreeSet<i64> = [1, 3].into_iter().collect();
        assert_eq!(revoke_targets(&assignments(&[1, 2, 3, 4]), &ignored), vec![2, 4]);
    }

    #[test]
    fn everyone_is_revoked_without_exemptions() {
        assert_eq!(
            revoke_targets(&assignments(&[7, 8]), &BTreeSet::new()),
            vec![7, 8]
        );
    }

    #[test]
    fn principal_name_falls_back() {
        let p: Principal = serde_json::from_value(json!({
            "principal_id": 5,
            "group_name": "admins"
        }))
        .unwrap();
        assert_eq!(p.name(), Some("admins"));
    }
}
