//! Resource collections
//!
//! A collection is the aggregated list response for one resource kind: the
//! first page's document with every page's items concatenated under the
//! kind's aggregate key. Records stay as raw JSON so that snapshots carry
//! every field the API returned; typed views are derived on demand.

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;

/// Pagination fields removed from aggregated documents
const PAGINATION_FIELDS: &[&str] = &["next_page_token", "prev_page_token", "has_more"];

/// The five resource kinds handled by this tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    PermissionAssignments,
    Workflows,
    JobRuns,
    AllPurposeCompute,
    SqlWarehouses,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::PermissionAssignments,
        ResourceKind::Workflows,
        ResourceKind::JobRuns,
        ResourceKind::AllPurposeCompute,
        ResourceKind::SqlWarehouses,
    ];

    /// File stem of this kind's snapshot
    pub fn snapshot_name(self) -> &'static str {
        match self {
            ResourceKind::PermissionAssignments => "permission_assignments",
            ResourceKind::Workflows => "workflows",
            ResourceKind::JobRuns => "job_runs",
            ResourceKind::AllPurposeCompute => "all_purpose_compute_clusters",
            ResourceKind::SqlWarehouses => "sql_warehouses",
        }
    }

    /// Array key used by the list API for this kind
    pub fn aggregate_key(self) -> &'static str {
        match self {
            ResourceKind::PermissionAssignments => "permission_assignments",
            ResourceKind::Workflows => "jobs",
            ResourceKind::JobRuns => "runs",
            ResourceKind::AllPurposeCompute => "clusters",
            ResourceKind::SqlWarehouses => "warehouses",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ResourceKind::PermissionAssignments => "Workspace Permissions",
            ResourceKind::Workflows => "Workflows",
            ResourceKind::JobRuns => "Job Runs",
            ResourceKind::AllPurposeCompute => "All Purpose Compute",
            ResourceKind::SqlWarehouses => "SQL Warehouses",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.snapshot_name())
    }
}

/// Aggregated list response for one resource kind
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceCollection {
    key: String,
    document: Map<String, Value>,
}

impl ResourceCollection {
    /// An empty collection under `key`
    pub fn empty(key: &str) -> Self {
        let mut document = Map::new();
        document.insert(key.to_string(), Value::Array(Vec::new()));
        Self {
            key: key.to_string(),
            document,
        }
    }

    /// Wrap a response document.
    ///
    /// A missing key means no items (the API omits empty arrays); pagination
    /// fields are dropped. Returns `None` if `document` is not an object or
    /// the key holds something other than an array.
    pub fn from_document(key: &str, document: Value) -> Option<Self> {
        let Value::Object(mut document) = document else {
            return None;
        };
        for field in PAGINATION_FIELDS {
            document.remove(*field);
        }
        match document.get(key) {
            None => {
                document.insert(key.to_string(), Value::Array(Vec::new()));
            }
            Some(Value::Array(_)) => {}
            Some(_) => return None,
        }
        Some(Self {
            key: key.to_string(),
            document,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn items(&self) -> &[Value] {
        self.document
            .get(&self.key)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// Append items from a later page
    pub(crate) fn extend(&mut self, items: Vec<Value>) {
        if let Some(Value::Array(existing)) = self.document.get_mut(&self.key) {
            existing.extend(items);
        }
    }

    /// Deserialize every item into a typed view
    pub fn typed<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.items()
            .iter()
            .map(|item| serde_json::from_value(item.clone()).map_err(Into::into))
            .collect()
    }

    pub fn document(&self) -> &Map<String, Value> {
        &self.document
    }
}
