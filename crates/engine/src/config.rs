use std::path::{Path, PathBuf};
use std::time::Duration;

use agrodesk_core::TransitionPolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_DATABASE: &str = "AGRODESK_DATABASE";
pub const ENV_EXPORT_DIR: &str = "AGRODESK_EXPORT_DIR";
pub const ENV_LOG: &str = "AGRODESK_LOG";
pub const ENV_TRANSITIONS: &str = "AGRODESK_TRANSITIONS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for {var}: {reason}")]
    Env { var: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file; in-memory when absent.
    pub path: Option<PathBuf>,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: 5000,
        }
    }
}

impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub directory: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("exports"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackofficeConfig {
    pub database: DatabaseConfig,
    pub export: ExportConfig,
    pub transition_policy: TransitionPolicy,
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for BackofficeConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            export: ExportConfig::default(),
            transition_policy: TransitionPolicy::Strict,
            log_filter: "info".to_string(),
        }
    }
}

impl BackofficeConfig {
    /// Parse a JSON config file. Missing keys fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `AGRODESK_*` overrides from the process environment.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary lookup, e.g. a map in tests.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(db) = lookup(ENV_DATABASE) {
            self.database.path = match db.as_str() {
                "" | ":memory:" => None,
                other => Some(PathBuf::from(other)),
            };
        }
        if let Some(dir) = lookup(ENV_EXPORT_DIR) {
            self.export.directory = PathBuf::from(dir);
        }
        if let Some(filter) = lookup(ENV_LOG) {
            self.log_filter = filter;
        }
        if let Some(policy) = lookup(ENV_TRANSITIONS) {
            self.transition_policy =
                TransitionPolicy::parse(&policy).map_err(|e| ConfigError::Env {
                    var: ENV_TRANSITIONS,
                    reason: e.to_string(),
                })?;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agrodesk.json");
        std::fs::write(&path, r#"{ "transition_policy": "permissive", "database": { "path": "crm.db" } }"#)
            .unwrap();

        let config = BackofficeConfig::load(&path).unwrap();
        assert_eq!(config.transition_policy, TransitionPolicy::Permissive);
        assert_eq!(config.database.path, Some(PathBuf::from("crm.db")));
        assert_eq!(config.database.busy_timeout_ms, 5000);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = BackofficeConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn overrides_win_over_file_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_DATABASE, ":memory:"),
            (ENV_LOG, "agrodesk_engine=debug"),
            (ENV_TRANSITIONS, "strict"),
        ]);
        let base = BackofficeConfig {
            database: DatabaseConfig {
                path: Some(PathBuf::from("old.db")),
                ..Default::default()
            },
            transition_policy: TransitionPolicy::Permissive,
            ..Default::default()
        };
        let config = base
            .with_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.database.path, None);
        assert_eq!(config.log_filter, "agrodesk_engine=debug");
        assert_eq!(config.transition_policy, TransitionPolicy::Strict);
    }

    #[test]
    fn unknown_policy_is_an_error() {
        let err = BackofficeConfig::default()
            .with_overrides(|k| (k == ENV_TRANSITIONS).then(|| "lenient".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: ENV_TRANSITIONS, .. }));
    }
}
