//! Configuration types for the taskflow service.
//!
//! Configuration is loaded from a TOML file; every section has sensible
//! defaults so an empty file (or no file) yields a runnable local setup.
//! The advisor API key is a secret *reference* resolved at startup, so the
//! key itself never has to live in the config file.

use crate::error::{Result, TaskflowError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for the service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Task store settings.
    pub database: DatabaseConfig,
    /// Scheduling advisor settings.
    pub advisor: AdvisorConfig,
    /// Session / authentication settings.
    pub auth: AuthConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to (0 = auto-assign).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8080,
        }
    }
}

/// Task store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Directory holding the SQLite database (None = platform data dir).
    pub data_dir: Option<PathBuf>,
}

impl DatabaseConfig {
    /// Resolve the directory the database file lives in.
    pub fn resolved_data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("taskflow")
    }
}

/// Secret reference for the advisor API key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApiSecretRef {
    /// No API key (local / keyless endpoints).
    #[default]
    None,
    /// Inline literal key (discouraged; use env when possible).
    Literal { value: String },
    /// Resolve the key from an environment variable.
    Env { var: String },
}

impl ApiSecretRef {
    /// Resolve the reference to the actual key, if any.
    pub fn resolve(&self) -> Result<Option<String>> {
        match self {
            Self::None => Ok(None),
            Self::Literal { value } => Ok(Some(value.clone())),
            Self::Env { var } => {
                let value = std::env::var(var).map_err(|_| {
                    TaskflowError::Config(format!("advisor api key env var is missing: {var}"))
                })?;
                if value.trim().is_empty() {
                    return Err(TaskflowError::Config(format!(
                        "advisor api key env var is empty: {var}"
                    )));
                }
                Ok(Some(value))
            }
        }
    }
}

/// Scheduling advisor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    /// Base URL of the OpenAI-compatible completion endpoint.
    pub api_url: String,
    /// Model ID to request.
    pub api_model: String,
    /// API key reference.
    pub api_key: ApiSecretRef,
    /// Sampling temperature for the recommendation request.
    pub temperature: f64,
    /// Maximum tokens for the completion.
    pub max_tokens: usize,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com".to_owned(),
            api_model: "gpt-4o-mini".to_owned(),
            api_key: ApiSecretRef::Env {
                var: "TASKFLOW_API_KEY".to_owned(),
            },
            temperature: 0.2,
            max_tokens: 1024,
        }
    }
}

/// Session / authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Session lifetime in days.
    pub session_ttl_days: u32,
    /// Minimum accepted password length at registration.
    pub min_password_len: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_days: 30,
            min_password_len: 8,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the default configuration; a present but
    /// invalid file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|e| {
            TaskflowError::Config(format!("failed to read config {}: {e}", path.display()))
        })?;
        let config: Self = toml::from_str(&raw).map_err(|e| {
            TaskflowError::Config(format!("invalid config {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.advisor.api_url.trim().is_empty() {
            return Err(TaskflowError::Config(
                "advisor.api_url must not be empty".to_owned(),
            ));
        }
        if self.advisor.api_model.trim().is_empty() {
            return Err(TaskflowError::Config(
                "advisor.api_model must not be empty".to_owned(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    struct EnvGuard {
        key: &'static str,
        old: Option<std::ffi::OsString>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let old = std::env::var_os(key);
            unsafe { std::env::set_var(key, value) };
            Self { key, old }
        }

        fn unset(key: &'static str) -> Self {
            let old = std::env::var_os(key);
            unsafe { std::env::remove_var(key) };
            Self { key, old }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.old {
                Some(v) => unsafe { std::env::set_var(self.key, v) },
                None => unsafe { std::env::remove_var(self.key) },
            }
        }
    }

    #[test]
    fn defaults_are_sensible() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.session_ttl_days, 30);
        assert_eq!(config.auth.min_password_len, 8);
        assert_eq!(config.advisor.api_model, "gpt-4o-mini");
    }

    #[test]
    fn toml_round_trip() {
        let config = AppConfig {
            server: ServerConfig {
                host: "0.0.0.0".to_owned(),
                port: 9000,
            },
            ..Default::default()
        };
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.server.host, "0.0.0.0");
        assert_eq!(parsed.server.port, 9000);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml_str = r#"
[advisor]
api_model = "gpt-4o"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.advisor.api_model, "gpt-4o");
        assert_eq!(config.advisor.api_url, "https://api.openai.com");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn secret_env_resolves() {
        let _env = EnvGuard::set("TASKFLOW_TEST_KEY", "secret-123");
        let secret = ApiSecretRef::Env {
            var: "TASKFLOW_TEST_KEY".to_owned(),
        };
        assert_eq!(secret.resolve().unwrap(), Some("secret-123".to_owned()));
    }

    #[test]
    fn secret_env_missing_errors() {
        let _env = EnvGuard::unset("TASKFLOW_TEST_KEY_MISSING");
        let secret = ApiSecretRef::Env {
            var: "TASKFLOW_TEST_KEY_MISSING".to_owned(),
        };
        assert!(secret.resolve().is_err());
    }

    #[test]
    fn secret_none_resolves_to_none() {
        assert_eq!(ApiSecretRef::None.resolve().unwrap(), None);
    }

    #[test]
    fn load_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn load_rejects_empty_api_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[advisor]\napi_url = \"\"\n").unwrap();
        assert!(AppConfig::load(&path).is_err());
    }
}
