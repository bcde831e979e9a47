//! Workspace Session
//!
//! Process-scoped context shared read-only by every controller: the
//! authenticated transport, the account and workspace API roots, and the
//! invocation timestamp that names this run's snapshot directory.

use super::auth::AccessToken;
use super::http::{ApiClient, RetryPolicy};
use crate::config::{self, Environment};
use crate::error::Result;
use chrono::Local;

/// Timestamp format used in restore-state directory names
pub const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Everything needed to reach one workspace
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub env_name: String,
    pub account_url: String,
    pub workspace_url: String,
    pub workspace_id: String,
    pub retry: RetryPolicy,
}

impl SessionConfig {
    /// Build from a resolved environment and account id
    pub fn for_environment(env: &Environment, account_id: &str) -> Self {
        Self {
            env_name: env.name.clone(),
            account_url: config::account_url(account_id),
            workspace_url: env.workspace_url.clone(),
            workspace_id: env.workspace_id.clone(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Shared transport and URL builders
#[derive(Clone)]
pub struct WorkspaceSession {
    pub http: ApiClient,
    env_name: String,
    account_url: String,
    workspace_url: String,
    workspace_id: String,
    started_at: String,
}

impl WorkspaceSession {
    pub fn new(config: SessionConfig, token: &AccessToken) -> Result<Self> {
        let http = ApiClient::new(token, config.retry)?;
        let started_at = Local::now().format(RUN_TIMESTAMP_FORMAT).to_string();

        tracing::info!(
            env = %config.env_name,
            workspace_id = %config.workspace_id,
            "Workspace session started at {}",
            started_at
        );

        Ok(Self {
            http,
            env_name: config.env_name,
            account_url: config.account_url.trim_end_matches('/').to_string(),
            workspace_url: config.workspace_url.trim_end_matches('/').to_string(),
            workspace_id: config.workspace_id,
            started_at,
        })
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    /// Invocation start, formatted as `%Y%m%d_%H%M%S`
    pub fn started_at(&self) -> &str {
        &self.started_at
    }

    /// Name of this run's restore-state directory: `{env}_{timestamp}`
    pub fn run_name(&self) -> String {
        format!("{}_{}", self.env_name, self.started_at)
    }

    // =========================================================================
    // URL helpers
    // =========================================================================

    /// Build a workspace REST API URL, e.g. `api("2.1", "jobs/list")`
    pub fn api(&self, version: &str, path: &str) -> String {
        format!("{}/api/{}/{}", self.workspace_url, version, path)
    }

    /// Build an account-level URL scoped to this workspace
    pub fn account_workspace_url(&self, path: &str) -> String {
        format!(
            "{}/workspaces/{}/{}",
            self.account_url, self.workspace_id, path
        )
    }
}
