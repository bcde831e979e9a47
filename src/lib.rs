//! halt-workspace
//!
//! Inventory, halt and restore an Azure Databricks workspace: permission
//! assignments, workflows, job runs, all-purpose clusters and SQL warehouses.
//! `stop` snapshots each resource kind before deactivating it so that a later
//! `restore` can bring back exactly what was active.

pub mod config;
pub mod controllers;
pub mod databricks;
pub mod error;
pub mod manager;
pub mod resource;
pub mod table;

pub use error::{ConfigError, HaltError, Result};
pub use manager::WorkspaceManager;
