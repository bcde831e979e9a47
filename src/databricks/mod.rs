//! Databricks API interaction module
//!
//! This module provides the core functionality for talking to the Azure
//! Databricks account and workspace APIs.
//!
//! # Module Structure
//!
//! - [`auth`] - Access token retrieval through the Azure CLI
//! - [`http`] - Retrying JSON transport
//! - [`session`] - Per-invocation workspace session and URL builders
//!
//! # Example
//!
//! ```ignore
//! use halt_workspace::databricks::{AzureCliCredential, SessionConfig, WorkspaceSession};
//!
//! async fn example(config: SessionConfig) -> halt_workspace::Result<()> {
//!     let token = AzureCliCredential::default().get_token().await?;
//!     let session = WorkspaceSession::new(config, &token)?;
//!     let jobs = session.http.get(&session.api("2.1", "jobs/list"), &[]).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod http;
pub mod session;

pub use auth::{AccessToken, AzureCliCredential};
pub use http::{ApiClient, RetryPolicy};
pub use session::{SessionConfig, WorkspaceSession};
