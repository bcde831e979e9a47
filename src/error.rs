//! Error types for halt-workspace

use std::path::PathBuf;
use thiserror::Error;

/// Problems with the environment registry or local setup.
///
/// All of these are detected before the first network call.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The environment registry file does not exist
    #[error("{} environment file not found", .0.display())]
    EnvFileMissing(PathBuf),

    /// The environment registry file is not valid JSON
    #[error("Failed to parse environment file {}: {reason}", .path.display())]
    EnvFileInvalid { path: PathBuf, reason: String },

    /// The requested environment has no entry
    #[error("Environment {env} not found in {}. Known environments: {known}", .path.display())]
    EnvMissing {
        env: String,
        path: PathBuf,
        known: String,
    },

    /// The entry exists but is not a URL string
    #[error("Value for environment {0} is not a URL string. Please provide a URL in the format 'https://adb-<workspace_id>.<integer>.azuredatabricks.net'")]
    EnvNotAString(String),

    /// The workspace URL does not match `adb-<digits>.`
    #[error("Workspace URL '{0}' is not in the correct format. Please ensure it looks like 'https://adb-<workspace_id>.<integer>.azuredatabricks.net'")]
    MalformedWorkspaceUrl(String),

    /// A required environment variable is unset
    #[error("Environment variable {0} is not set")]
    MissingVariable(&'static str),
}

/// Errors raised while inventorying, halting or restoring a workspace.
#[derive(Error, Debug)]
pub enum HaltError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The external credential source failed
    #[error("Error fetching access token: {0}")]
    Credential(String),

    /// A list response broke the pagination contract
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A required call returned something other than 200
    #[error("{method} {url} failed with status {status}")]
    Http {
        status: u16,
        method: String,
        url: String,
    },

    /// A snapshot file is absent
    #[error("Restore state not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A snapshot for this kind was already written in the run directory
    #[error("Restore state already exists and is never overwritten: {}", .0.display())]
    SnapshotExists(PathBuf),

    /// No restore-state directory is available to restore from
    #[error("No restore point found: {0}")]
    NoRestorePoint(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HaltError {
    /// Status code of an HTTP failure, if this is one
    pub fn status(&self) -> Option<u16> {
        match self {
            HaltError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, HaltError::NotFound(_))
    }
}

/// Result type alias for HaltError
pub type Result<T> = std::result::Result<T, HaltError>;
