//! Resource plumbing shared by every controller
//!
//! # Architecture
//!
//! - [`collection`] - Aggregated list responses and the resource kinds
//! - [`fetcher`] - Continuation-token pagination
//! - [`snapshot`] - Per-run JSON snapshots, one file per kind
//! - [`bulk`] - Bounded-concurrency execution with per-item failure isolation
//! - [`restore_point`] - Finding and choosing a run directory to restore from

pub mod bulk;
pub mod collection;
pub mod fetcher;
pub mod restore_point;
pub mod snapshot;

pub use bulk::{run_bulk, BulkReport, MAX_IN_FLIGHT};
pub use collection::{ResourceCollection, ResourceKind};
pub use fetcher::{fetch_collection, query_params};
pub use restore_point::{choose_restore_point, list_restore_points, RestorePoint, Selection};
pub use snapshot::{SnapshotStore, DEFAULT_STATE_DIR};
