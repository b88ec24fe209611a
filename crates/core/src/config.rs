use config::{Config, ConfigError, Environment, File};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::RetentionPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub retention: RetentionConfig,
    pub governance: GovernanceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub bucket: Option<String>,
    pub prefix: String,
    pub endpoint: Option<String>,
    pub region: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetentionConfig {
    pub daily_retention_days: u32,
    pub weekly_retention_weeks: u32,
    pub monthly_retention_months: u32,
    #[serde(default)]
    pub max_total_size_bytes: u64,
    #[serde(default)]
    pub max_backup_count: u32,
    pub delete_concurrency: usize,
    pub run_timeout_secs: Option<u64>,
}

impl RetentionConfig {
    /// The policy applied when a caller supplies no overrides.
    pub fn default_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            daily_retention_days: self.daily_retention_days,
            weekly_retention_weeks: self.weekly_retention_weeks,
            monthly_retention_months: self.monthly_retention_months,
            max_total_size_bytes: self.max_total_size_bytes,
            max_backup_count: self.max_backup_count,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GovernanceConfig {
    pub admin_token: Option<Secret<String>>,
    /// Accept the development token when `admin_token` is unset. Local use only.
    #[serde(default)]
    pub allow_dev_token: bool,
    pub json_logs: bool,
}

impl GovernanceConfig {
    /// The configured admin token, ignoring blank values.
    pub fn admin_token(&self) -> Option<&Secret<String>> {
        self.admin_token
            .as_ref()
            .filter(|token| !token.expose_secret().trim().is_empty())
    }
}

impl AppConfig {
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from(Path::new("config"))
    }

    /// Layer `default`, `{RETENTION_ENV}` and `local` files from `dir`, then
    /// `APP__SECTION__KEY` environment variables.
    pub fn load_from(dir: &Path) -> std::result::Result<Self, ConfigError> {
        let env = std::env::var("RETENTION_ENV").unwrap_or_else(|_| "development".into());
        let path = |name: &str| dir.join(name).to_string_lossy().into_owned();

        let s = Config::builder()
            .add_source(File::with_name(&path("default")))
            .add_source(File::with_name(&path(&env)).required(false))
            .add_source(File::with_name(&path("local")).required(false))
            // Map APP__STORAGE__BUCKET=backups to storage.bucket
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    /// Reject configurations that cannot drive a run.
    pub fn validate(&self) -> Result<()> {
        match self.storage.bucket.as_deref().map(str::trim) {
            Some(bucket) if !bucket.is_empty() => {}
            _ => return Err(Error::configuration("storage.bucket is required")),
        }
        if self.retention.delete_concurrency == 0 {
            return Err(Error::configuration(
                "retention.delete_concurrency must be at least 1",
            ));
        }
        self.retention.default_policy().validate()
    }

    /// Everything [`AppConfig::validate`] checks, plus an admin token for the
    /// API. Only an explicit `allow_dev_token` lets the server start without one.
    pub fn validate_for_serve(&self) -> Result<()> {
        self.validate()?;
        if self.governance.admin_token().is_none() && !self.governance.allow_dev_token {
            return Err(Error::configuration(
                "governance.admin_token is required to serve the admin API",
            ));
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let policy = RetentionPolicy::default();
        Self {
            server: ServerConfig {
                host: "0.0.0.0".into(),
                port: 3000,
            },
            storage: StorageConfig {
                bucket: None,
                prefix: "backups/".into(),
                endpoint: None,
                region: None,
                force_path_style: false,
            },
            retention: RetentionConfig {
                daily_retention_days: policy.daily_retention_days,
                weekly_retention_weeks: policy.weekly_retention_weeks,
                monthly_retention_months: policy.monthly_retention_months,
                max_total_size_bytes: policy.max_total_size_bytes,
                max_backup_count: policy.max_backup_count,
                delete_concurrency: 8,
                run_timeout_secs: None,
            },
            governance: GovernanceConfig {
                admin_token: None,
                allow_dev_token: false,
                json_logs: false,
            },
        }
    }
}
