//! Resource controllers
//!
//! One controller per resource kind, all behind the [`Controller`] trait:
//!
//! - [`permissions`] - Workspace permission assignments (revoke / re-grant)
//! - [`workflows`] - Job schedules, continuous runs and file triggers (pause / unpause)
//! - [`job_runs`] - Active job runs (cancel, not restorable)
//! - [`clusters`] - All-purpose compute (terminate, not restorable)
//! - [`warehouses`] - SQL warehouses (stop, not restorable)
//!
//! `stop` always snapshots before mutating and skips items that are already
//! inactive. `restore` only re-activates what was active when the snapshot
//! was taken.

pub mod clusters;
pub mod job_runs;
pub mod permissions;
pub mod warehouses;
pub mod workflows;

pub use clusters::Clusters;
pub use job_runs::JobRuns;
pub use permissions::Permissions;
pub use warehouses::SqlWarehouses;
pub use workflows::Workflows;

use crate::error::Result;
use crate::resource::{ResourceKind, SnapshotStore};
use crate::table::{print_header, Table};
use async_trait::async_trait;
use std::fmt;

/// Filter flags for `show`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShowFilter {
    /// Only unpaused workflows, running job runs, unterminated clusters and warehouses
    pub active_only: bool,
}

impl ShowFilter {
    pub fn active_only() -> Self {
        Self { active_only: true }
    }
}

/// What `show` renders for one kind
#[derive(Debug, Clone)]
pub enum Listing {
    Rows(Table),
    Nothing(String),
}

impl Listing {
    pub fn nothing(message: impl Into<String>) -> Self {
        Listing::Nothing(message.into())
    }

    /// Rows shown, zero for [`Listing::Nothing`]
    pub fn row_count(&self) -> usize {
        match self {
            Listing::Rows(table) => table.len(),
            Listing::Nothing(_) => 0,
        }
    }
}

/// Outcome of `stop` for one kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopReport {
    pub kind: ResourceKind,
    /// Items written to the snapshot
    pub recorded: usize,
    /// Successful mutating calls
    pub mutated: usize,
    /// Items left alone (already inactive or exempt)
    pub skipped: usize,
    pub failed: usize,
}

impl StopReport {
    pub fn new(kind: ResourceKind, recorded: usize) -> Self {
        Self {
            kind,
            recorded,
            mutated: 0,
            skipped: 0,
            failed: 0,
        }
    }
}

impl fmt::Display for StopReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: recorded {}, stopped {}, skipped {}, failed {}",
            self.kind.display_name(),
            self.recorded,
            self.mutated,
            self.skipped,
            self.failed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreStatus {
    Restored,
    NothingToRestore,
    NotRestorable,
}

/// Outcome of `restore` for one kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    pub kind: ResourceKind,
    pub status: RestoreStatus,
    pub restored: usize,
    pub failed: usize,
}

impl RestoreReport {
    pub fn restored(kind: ResourceKind, restored: usize, failed: usize) -> Self {
        Self {
            kind,
            status: RestoreStatus::Restored,
            restored,
            failed,
        }
    }

    pub fn nothing_to_restore(kind: ResourceKind) -> Self {
        Self {
            kind,
            status: RestoreStatus::NothingToRestore,
            restored: 0,
            failed: 0,
        }
    }

    /// Ephemeral compute is never brought back
    pub fn not_restorable(kind: ResourceKind) -> Self {
        println!(".. not restoring {}", kind.display_name().to_lowercase());
        Self {
            kind,
            status: RestoreStatus::NotRestorable,
            restored: 0,
            failed: 0,
        }
    }
}

impl fmt::Display for RestoreReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            RestoreStatus::Restored => write!(
                f,
                "{}: restored {}, failed {}",
                self.kind.display_name(),
                self.restored,
                self.failed
            ),
            RestoreStatus::NothingToRestore => {
                write!(f, "{}: nothing to restore", self.kind.display_name())
            }
            RestoreStatus::NotRestorable => {
                write!(f, "{}: not restorable", self.kind.display_name())
            }
        }
    }
}

/// show / stop / restore for one resource kind
#[async_trait]
pub trait Controller: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// Section title for `show`
    fn title(&self, _filter: ShowFilter) -> String {
        self.kind().display_name().to_string()
    }

    /// Fetch current state and build what `show` prints. Read-only.
    async fn list(&self, filter: ShowFilter) -> Result<Listing>;

    /// Print the current state
    async fn show(&self, filter: ShowFilter) -> Result<Listing> {
        let listing = self.list(filter).await?;
        print_header(&self.title(filter));
        match &listing {
            Listing::Rows(table) => print!("{}", table),
            Listing::Nothing(message) => println!("{}", message),
        }
        Ok(listing)
    }

    /// Snapshot current state, then deactivate whatever is still active
    async fn stop(&self, store: &SnapshotStore) -> Result<StopReport>;

    /// Re-activate what the snapshot in `store` recorded as active
    async fn restore(&self, store: &SnapshotStore) -> Result<RestoreReport>;
}

/// Render an optional string cell
pub(crate) fn cell(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}
