//! Shared helpers for integration tests

#![allow(dead_code)]

use halt_workspace::databricks::{AccessToken, RetryPolicy, SessionConfig, WorkspaceSession};
use std::sync::Arc;
use wiremock::MockServer;

pub const TOKEN: &str = "test-token";
pub const WORKSPACE_ID: &str = "1234567890";
pub const ACCOUNT_PATH: &str = "/api/2.0/accounts/acc-1";

/// Session whose account and workspace APIs both live on `server`
pub fn session(server: &MockServer) -> Arc<WorkspaceSession> {
    let config = SessionConfig {
        env_name: "dev".to_string(),
        account_url: format!("{}{}", server.uri(), ACCOUNT_PATH),
        workspace_url: server.uri(),
        workspace_id: WORKSPACE_ID.to_string(),
        retry: RetryPolicy::immediate(),
    };
    Arc::new(WorkspaceSession::new(config, &AccessToken::new(TOKEN)).expect("session"))
}

/// Path of the account-level permission assignments API
pub fn assignments_path() -> String {
    format!(
        "{}/workspaces/{}/permissionassignments",
        ACCOUNT_PATH, WORKSPACE_ID
    )
}

pub fn principal_path(principal_id: i64) -> String {
    format!("{}/principals/{}", assignments_path(), principal_id)
}
