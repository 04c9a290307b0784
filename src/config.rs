use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub security: SecurityConfig,

    pub token: TokenConfig,

    pub sso: SsoConfig,

    pub observability: ObservabilityConfig,
}

/// Runtime mode. In `Dev` the signing secret is a fixed development value so
/// tokens survive database resets; `Prod` provisions a random secret once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Dev,
    #[default]
    Prod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub mode: Mode,

    pub database_path: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Prod,
            database_path: "sqlite:data/sigil.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,

    pub port: u16,

    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 5230,
            cors_allowed_origins: vec![
                "http://localhost:5230".to_string(),
                "http://127.0.0.1:5230".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (default: 19456 = 19MB, the OWASP baseline)
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations)
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,

    /// Length of the random password given to SSO-provisioned accounts.
    pub provisioned_password_length: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 19456,
            argon2_time_cost: 2,
            argon2_parallelism: 1,
            provisioned_password_length: 20,
        }
    }
}

/// Upper bound for any token lifetime.
pub const MAX_TOKEN_YEARS: i64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Lifetime of a regular access token (default: 168 = 7 days)
    pub access_token_hours: i64,

    /// Lifetime used when the client asks for a never-expiring session.
    pub never_expire_years: i64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_token_hours: 7 * 24,
            never_expire_years: 100,
        }
    }
}

impl TokenConfig {
    #[must_use]
    pub fn access_token_duration(&self) -> chrono::Duration {
        chrono::Duration::try_hours(self.access_token_hours).unwrap_or(chrono::Duration::MAX)
    }

    #[must_use]
    pub fn never_expire_duration(&self) -> chrono::Duration {
        self.never_expire_years
            .checked_mul(365)
            .and_then(chrono::Duration::try_days)
            .unwrap_or(chrono::Duration::MAX)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SsoConfig {
    /// Upper bound for the authorization-code exchange and profile fetch.
    pub exchange_timeout_seconds: u64,

    pub user_agent: String,
}

impl Default for SsoConfig {
    fn default() -> Self {
        Self {
            exchange_timeout_seconds: 10,
            user_agent: "Sigil/1.0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub json_logs: bool,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: std::collections::HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = std::collections::HashMap::new();
        labels.insert("app".to_string(), "sigil".to_string());

        Self {
            metrics_enabled: true,
            json_logs: false,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("sigil").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".sigil").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_TOKEN_YEARS * 365 * 24).contains(&self.token.access_token_hours) {
            anyhow::bail!(
                "token.access_token_hours must be between 1 and {}",
                MAX_TOKEN_YEARS * 365 * 24
            );
        }

        if !(1..=MAX_TOKEN_YEARS).contains(&self.token.never_expire_years) {
            anyhow::bail!("token.never_expire_years must be between 1 and {MAX_TOKEN_YEARS}");
        }

        if self.sso.exchange_timeout_seconds == 0 {
            anyhow::bail!("sso.exchange_timeout_seconds must be > 0");
        }

        if self.security.provisioned_password_length < 16 {
            anyhow::bail!("security.provisioned_password_length must be at least 16");
        }

        argon2::Params::new(
            self.security.argon2_memory_cost_kib,
            self.security.argon2_time_cost,
            self.security.argon2_parallelism,
            None,
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;

        if self.general.min_db_connections > self.general.max_db_connections {
            anyhow::bail!("general.min_db_connections cannot exceed max_db_connections");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.mode, Mode::Prod);
        assert_eq!(config.token.access_token_hours, 168);
        assert_eq!(config.token.never_expire_years, 100);
        assert_eq!(config.sso.exchange_timeout_seconds, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[token]"));
        assert!(toml_str.contains("[sso]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            mode = "dev"
            log_level = "debug"

            [token]
            access_token_hours = 1
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.mode, Mode::Dev);
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.token.access_token_duration(), chrono::Duration::hours(1));

        assert_eq!(config.server.port, 5230);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.token.access_token_hours = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.security.argon2_time_cost = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.security.provisioned_password_length = 8;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_caps_token_lifetimes() {
        let mut config = Config::default();
        config.token.never_expire_years = 300_000;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.token.never_expire_years = MAX_TOKEN_YEARS;
        assert!(config.validate().is_ok());

        let mut config = Config::default();
        config.token.access_token_hours = i64::MAX;
        assert!(config.validate().is_err());
    }

    #[test]
    fn huge_lifetimes_saturate_instead_of_panicking() {
        let config = TokenConfig {
            access_token_hours: i64::MAX,
            never_expire_years: i64::MAX,
        };
        assert_eq!(config.access_token_duration(), chrono::Duration::MAX);
        assert_eq!(config.never_expire_duration(), chrono::Duration::MAX);
    }

    #[test]
    fn never_expire_duration_spans_a_century() {
        let config = TokenConfig::default();
        assert_eq!(config.never_expire_duration().num_days(), 36_500);
    }
}
