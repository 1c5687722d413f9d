use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use lendlog_ledger::LoanPolicy;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ServerError, ServerResult};

pub const ENV_ADMIN_PASSWORD: &str = "LENDLOG_ADMIN_PASSWORD";
pub const ENV_ENCRYPTION_SECRET: &str = "LENDLOG_ENCRYPTION_SECRET";

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub catalog_path: PathBuf,
    pub ledger_path: PathBuf,
    pub users_path: PathBuf,
    pub collateral_path: PathBuf,
    /// Front-end assets served for any path the API does not claim.
    pub static_dir: Option<PathBuf>,
    pub admin_password: String,
    /// Collateral save/reveal is disabled while this is empty.
    pub encryption_secret: String,
    pub loan_period_days: i64,
    pub webhook: WebhookConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 3000)),
            catalog_path: PathBuf::from("catalog.csv"),
            ledger_path: PathBuf::from("transactions.csv"),
            users_path: PathBuf::from("users.json"),
            collateral_path: PathBuf::from("collateral.json"),
            static_dir: None,
            admin_password: "1234".into(),
            encryption_secret: String::new(),
            loan_period_days: LoanPolicy::DEFAULT_LOAN_PERIOD_DAYS,
            webhook: WebhookConfig::default(),
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("catalog_path", &self.catalog_path)
            .field("ledger_path", &self.ledger_path)
            .field("users_path", &self.users_path)
            .field("collateral_path", &self.collateral_path)
            .field("static_dir", &self.static_dir)
            .field("admin_password", &"<redacted>")
            .field("encryption_secret", &"<redacted>")
            .field("loan_period_days", &self.loan_period_days)
            .field("webhook", &self.webhook)
            .finish()
    }
}

impl ServerConfig {
    /// Read a TOML file, falling back to defaults when it does not exist,
    /// then apply environment overrides.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml_str(&raw)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file; using defaults");
                Self::default()
            }
            Err(e) => return Err(e.into()),
        };
        config.apply_env_overrides();
        info!(path = %path.display(), bind = %config.bind_addr, "configuration loaded");
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> ServerResult<Self> {
        toml::from_str(raw).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Secrets may come from the environment instead of the file.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(password) = lookup(ENV_ADMIN_PASSWORD) {
            self.admin_password = password;
        }
        if let Some(secret) = lookup(ENV_ENCRYPTION_SECRET) {
            self.encryption_secret = secret;
        }
    }

    pub fn policy(&self) -> LoanPolicy {
        LoanPolicy::new(self.loan_period_days)
    }
}

/// Outbound notification after each recorded transaction.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub url: Option<String>,
    pub timeout_ms: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: 1000,
        }
    }
}

impl WebhookConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr, "127.0.0.1:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(c.ledger_path, PathBuf::from("transactions.csv"));
        assert_eq!(c.admin_password, "1234");
        assert!(c.encryption_secret.is_empty());
        assert_eq!(c.policy(), LoanPolicy::new(14));
        assert!(c.webhook.url.is_none());
        assert_eq!(c.webhook.timeout(), Duration::from_secs(1));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = ServerConfig::from_toml_str(
            r#"
            bind_addr = "0.0.0.0:8080"
            loan_period_days = 21

            [webhook]
            url = "https://hooks.example.org/library"
            "#,
        )
        .unwrap();
        assert_eq!(c.bind_addr.port(), 8080);
        assert_eq!(c.loan_period_days, 21);
        assert_eq!(c.catalog_path, PathBuf::from("catalog.csv"));
        assert_eq!(c.webhook.url.as_deref(), Some("https://hooks.example.org/library"));
        assert_eq!(c.webhook.timeout_ms, 1000);
    }

    #[test]
    fn invalid_toml_is_config_error() {
        assert!(matches!(
            ServerConfig::from_toml_str("bind_addr = 12"),
            Err(ServerError::Config(_))
        ));
    }

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let c = ServerConfig::load(&dir.path().join("lendlog.toml")).unwrap();
        assert_eq!(c.bind_addr.port(), 3000);
    }

    #[test]
    fn overrides_replace_secrets() {
        let env: HashMap<&str, &str> = [
            (ENV_ADMIN_PASSWORD, "desk-pass"),
            (ENV_ENCRYPTION_SECRET, "vault-key"),
        ]
        .into();
        let mut c = ServerConfig::default();
        c.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(c.admin_password, "desk-pass");
        assert_eq!(c.encryption_secret, "vault-key");
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut c = ServerConfig::default();
        c.encryption_secret = "vault-key".into();
        let rendered = format!("{c:?}");
        assert!(!rendered.contains("vault-key"));
        assert!(!rendered.contains("1234"));
    }
}
