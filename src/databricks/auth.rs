//! Databricks Authentication
//!
//! Obtains an Entra ID access token for the Azure Databricks resource through
//! the Azure CLI. The token is fetched once per invocation and never refreshed.

use crate::error::{HaltError, Result};
use std::fmt;
use tokio::process::Command;

/// Well-known application id of the Azure Databricks resource
pub const DATABRICKS_RESOURCE_ID: &str = "2ff814a6-3304-4ab8-85cb-cd0e6f879c1d";

/// A bearer credential. Debug output never shows the token itself.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Credential source backed by `az account get-access-token`
#[derive(Debug, Clone)]
pub struct AzureCliCredential {
    program: String,
    resource: String,
}

impl Default for AzureCliCredential {
    fn default() -> Self {
        Self {
            program: "az".to_string(),
            resource: DATABRICKS_RESOURCE_ID.to_string(),
        }
    }
}

impl AzureCliCredential {
    /// Use a different executable in place of `az`
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    fn args(&self) -> [&str; 8] {
        [
            "account",
            "get-access-token",
            "--resource",
            &self.resource,
            "--query",
            "accessToken",
            "-o",
            "tsv",
        ]
    }

    /// Fetch an access token for the Databricks resource
    pub async fn get_token(&self) -> Result<AccessToken> {
        tracing::debug!("Requesting access token via {}", self.program);

        let output = Command::new(&self.program)
            .args(self.args())
            .output()
            .await
            .map_err(|e| HaltError::Credential(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HaltError::Credential(stderr.trim().to_string()));
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(HaltError::Credential(format!(
                "{} returned an empty access token",
                self.program
            )));
        }

        tracing::info!("Access token acquired");
        Ok(AccessToken(token))
    }
}
