//! Server configuration loaded from `weekchain.toml`.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//! cors_origins = ["https://week-chain.com"]
//!
//! [rate_limit]
//! payment = 10
//!
//! [beta]
//! total_cap = 68
//!
//! [admin]
//! email = "corporativo@morises.com"
//!
//! [repository]
//! type = "local"
//! ```
//!
//! `HOST` and `PORT` override the `[server]` table and `ADMIN_EMAIL` the
//! `[admin]` table. Storage overrides (`REPOSITORY_TYPE`, `DATABASE_URL`,
//! `PG_*`) are described in [`crate::db::repo_config`].

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::db::repo_config::{RepositoryConfig, CONFIG_FILE_NAME};
use crate::db::RepositoryError;
use crate::services::capacity::DEFAULT_BETA_TOTAL_CAP;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    #[serde(default)]
    pub beta: BetaSettings,
    #[serde(default)]
    pub admin: AdminSettings,
    #[serde(flatten)]
    pub storage: RepositoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origins; empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

/// Requests allowed per client and path in each window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_limit")]
    pub default: u32,
    #[serde(default = "default_auth_limit")]
    pub auth: u32,
    #[serde(default = "default_payment_limit")]
    pub payment: u32,
    #[serde(default = "default_api_limit")]
    pub api: u32,
    #[serde(default = "default_webhook_limit")]
    pub webhook: u32,
    #[serde(default = "default_admin_limit")]
    pub admin: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: default_window_secs(),
            default: default_limit(),
            auth: default_auth_limit(),
            payment: default_payment_limit(),
            api: default_api_limit(),
            webhook: default_webhook_limit(),
            admin: default_admin_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetaSettings {
    /// Certificates sellable across the whole catalog during the beta.
    #[serde(default = "default_total_cap")]
    pub total_cap: u32,
}

impl Default for BetaSettings {
    fn default() -> Self {
        Self {
            total_cap: default_total_cap(),
        }
    }
}

/// Root administrator provisioned at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminSettings {
    #[serde(default = "default_admin_email")]
    pub email: String,
    #[serde(default = "default_admin_name")]
    pub full_name: String,
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self {
            email: default_admin_email(),
            full_name: default_admin_name(),
        }
    }
}

fn default_admin_email() -> String {
    "corporativo@morises.com".to_string()
}

fn default_admin_name() -> String {
    "WEEK-CHAIN Corporativo".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

fn default_window_secs() -> u64 {
    60
}

fn default_limit() -> u32 {
    120
}

fn default_auth_limit() -> u32 {
    5
}

fn default_payment_limit() -> u32 {
    10
}

fn default_api_limit() -> u32 {
    60
}

fn default_webhook_limit() -> u32 {
    1000
}

fn default_admin_limit() -> u32 {
    200
}

fn default_total_cap() -> u32 {
    DEFAULT_BETA_TOTAL_CAP
}

impl AppConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, RepositoryError> {
        toml::from_str(content).map_err(|e| {
            RepositoryError::configuration(format!("Failed to parse config file: {}", e))
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RepositoryError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            RepositoryError::configuration(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load `weekchain.toml` from the standard locations, falling back to
    /// defaults when none exists, then apply environment overrides.
    pub fn load() -> Result<Self, RepositoryError> {
        let candidates = [
            Path::new(CONFIG_FILE_NAME).to_path_buf(),
            Path::new("backend").join(CONFIG_FILE_NAME),
            Path::new("..").join(CONFIG_FILE_NAME),
        ];
        let mut config = match candidates.iter().find(|p| p.exists()) {
            Some(path) => {
                log::info!("Loading configuration from {}", path.display());
                Self::from_file(path)?
            }
            None => {
                log::info!("No {} found, using defaults", CONFIG_FILE_NAME);
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("HOST") {
            self.server.host = host;
        }
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(email) = std::env::var("ADMIN_EMAIL")
            .ok()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
        {
            self.admin.email = email;
        }
        self.storage.apply_env_overrides();
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::RepositoryType;

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.rate_limit.default, 120);
        assert_eq!(config.rate_limit.auth, 5);
        assert_eq!(config.rate_limit.webhook, 1000);
        assert_eq!(config.beta.total_cap, 68);
        assert_eq!(config.admin.email, "corporativo@morises.com");
        assert_eq!(
            config.storage.repository_type().unwrap(),
            RepositoryType::Local
        );
    }

    #[test]
    fn test_partial_tables_keep_other_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
[server]
port = 9090
cors_origins = ["https://week-chain.com"]

[rate_limit]
payment = 3

[beta]
total_cap = 10

[repository]
type = "memory"
"#,
        )
        .unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.cors_origins.len(), 1);
        assert_eq!(config.rate_limit.payment, 3);
        assert_eq!(config.rate_limit.admin, 200);
        assert_eq!(config.beta.total_cap, 10);
        assert_eq!(config.bind_address(), "0.0.0.0:9090");
    }

    #[test]
    fn test_invalid_toml_is_configuration_error() {
        let err = AppConfig::from_toml_str("[server\nport = 1").unwrap_err();
        assert!(matches!(err, RepositoryError::ConfigurationError { .. }));
    }
}
