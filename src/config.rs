//! Configuration Management
//!
//! Resolves an environment name to a workspace through the environment
//! registry (`.env.json`) and reads the account id from the process
//! environment.

use crate::error::ConfigError;
use regex::Regex;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use url::Url;

/// Default location of the environment registry
pub const DEFAULT_ENV_FILE: &str = ".env.json";

/// Variable holding the Databricks account id
pub const ACCOUNT_ID_VAR: &str = "AZ_DATABRICKS_ACCOUNT_ID";

/// Account console API root
pub const ACCOUNTS_API: &str = "https://accounts.azuredatabricks.net/api/2.0/accounts";

static WORKSPACE_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"adb-(\d+)\.").expect("workspace id pattern is valid"));

/// A resolved workspace environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub name: String,
    pub workspace_url: String,
    pub workspace_id: String,
}

/// Environment name to workspace URL mapping
#[derive(Debug, Clone)]
pub struct EnvRegistry {
    path: PathBuf,
    entries: Map<String, Value>,
}

impl EnvRegistry {
    /// Load the registry from disk
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::EnvFileMissing(path.to_path_buf()));
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::EnvFileInvalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Self::parse(path, &content)
    }

    /// Parse registry content read from `path`
    pub fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::EnvFileInvalid {
            path: path.to_path_buf(),
            reason,
        };
        let value: Value = serde_json::from_str(content).map_err(|e| invalid(e.to_string()))?;
        let Value::Object(entries) = value else {
            return Err(invalid("top level is not an object".to_string()));
        };
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    /// Look up an environment and derive its workspace id
    pub fn resolve(&self, env: &str) -> Result<Environment, ConfigError> {
        let entry = self.entries.get(env).ok_or_else(|| ConfigError::EnvMissing {
            env: env.to_string(),
            path: self.path.clone(),
            known: self.names().collect::<Vec<_>>().join(", "),
        })?;
        let Some(raw_url) = entry.as_str() else {
            return Err(ConfigError::EnvNotAString(env.to_string()));
        };

        let workspace_url = raw_url.trim().trim_end_matches('/').to_string();
        let workspace_id = extract_workspace_id(&workspace_url)?;

        tracing::info!("Resolved environment {} to workspace {}", env, workspace_id);

        Ok(Environment {
            name: env.to_string(),
            workspace_url,
            workspace_id,
        })
    }

    /// Environment names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Extract the numeric workspace id from an `adb-<id>.<n>.azuredatabricks.net` URL
pub fn extract_workspace_id(workspace_url: &str) -> Result<String, ConfigError> {
    let malformed = || ConfigError::MalformedWorkspaceUrl(workspace_url.to_string());

    let parsed = Url::parse(workspace_url).map_err(|_| malformed())?;
    if !matches!(parsed.scheme(), "https" | "http") {
        return Err(malformed());
    }

    WORKSPACE_ID_PATTERN
        .captures(workspace_url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(malformed)
}

/// Read the account id, after `.env` has been loaded
pub fn account_id_from_env() -> Result<String, ConfigError> {
    match std::env::var(ACCOUNT_ID_VAR) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(ConfigError::MissingVariable(ACCOUNT_ID_VAR)),
    }
}

/// Account-level API base for an account id
pub fn account_url(account_id: &str) -> String {
    format!("{}/{}", ACCOUNTS_API, account_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(content: &str) -> EnvRegistry {
        EnvRegistry::parse(Path::new(".env.json"), content).unwrap()
    }

    #[test]
    fn resolves_workspace_id_from_url() {
        let reg = registry(r#"{"dev": "https://adb-1234567890123456.7.azuredatabricks.net/"}"#);
        let env = reg.resolve("dev").unwrap();
        assert_eq!(env.workspace_id, "1234567890123456");
        assert_eq!(
            env.workspace_url,
            "https://adb-1234567890123456.7.azuredatabricks.net"
        );
        assert_eq!(env.name, "dev");
    }

    #[test]
    fn missing_environment_is_reported() {
        let reg = registry(r#"{"dev": "https://adb-1.2.azuredatabricks.net"}"#);
        let err = reg.resolve("prod").unwrap_err();
        assert!(matches!(err, ConfigError::EnvMissing { ref env, .. } if env == "prod"));
        assert!(err.to_string().ends_with("Known environments: dev"));
    }

    #[test]
    fn non_string_entry_is_reported() {
        let reg = registry(r#"{"dev": {"WORKSPACE_URL": "https://adb-1.2.azuredatabricks.net"}}"#);
        assert!(matches!(
            reg.resolve("dev").unwrap_err(),
            ConfigError::EnvNotAString(_)
        ));
    }

    #[test]
    fn malformed_urls_are_rejected() {
        for url in [
            "https://myworkspace.azuredatabricks.net",
            "adb-123.4.azuredatabricks.net",
            "https://adb-abc.4.azuredatabricks.net",
            "ftp://adb-123.4.azuredatabricks.net",
        ] {
            assert!(
                matches!(
                    extract_workspace_id(url),
                    Err(ConfigError::MalformedWorkspaceUrl(_))
                ),
                "{url} should be rejected"
            );
        }
    }

    #[test]
    fn invalid_json_is_reported() {
        let err = EnvRegistry::parse(Path::new(".env.json"), "{not json").unwrap_err();
        assert!(matches!(err, ConfigError::EnvFileInvalid { .. }));

        let err = EnvRegistry::parse(Path::new(".env.json"), "[1, 2]").unwrap_err();
        assert!(matches!(err, ConfigError::EnvFileInvalid { .. }));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = EnvRegistry::load(Path::new("/nonexistent/dir/.env.json")).unwrap_err();
        assert!(matches!(err, ConfigError::EnvFileMissing(_)));
    }

    #[test]
    fn account_url_format() {
        assert_eq!(
            account_url("abc-123"),
            "https://accounts.azuredatabricks.net/api/2.0/accounts/abc-123"
        );
    }
}
