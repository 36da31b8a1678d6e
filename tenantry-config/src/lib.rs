//! Tenancy configuration.
//!
//! Every recognized option lives in one immutable [`TenancyConfig`], built
//! once at startup and shared (usually behind an `Arc`) by the resolver, the
//! database manager and the provisioning pipeline.
//!
//! Sources are layered in increasing precedence: defaults, a TOML or JSON
//! file, a `.env` file, then `TENANCY_*` environment variables.
//!
//! ```no_run
//! use tenantry_config::TenancyConfig;
//!
//! # fn main() -> Result<(), tenantry_config::ConfigError> {
//! let config = TenancyConfig::builder()
//!     .add_file("config/tenancy.toml")
//!     .load_env()
//!     .build()?;
//!
//! assert!(config.is_multi_database());
//! # Ok(())
//! # }
//! ```

pub mod env;
pub mod error;
pub mod loader;
pub mod validation;

pub use env::{ENV_PREFIX, EnvLoader};
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use validation::{ConfigValidator, Validate};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Tenancy isolation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TenancyMode {
    /// All tenants share the central database.
    Single,
    /// Each tenant gets its own database.
    #[default]
    #[serde(alias = "multi-database", alias = "multi_database")]
    Multi,
}

/// Naming of per-tenant connections and databases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub tenant_connection: String,
    pub prefix: String,
    pub suffix: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            tenant_connection: "tenant".to_string(),
            prefix: "tenant_".to_string(),
            suffix: String::new(),
        }
    }
}

/// Provisioning switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisioningSettings {
    pub auto_create_database: bool,
    pub auto_migrate: bool,
    pub auto_seed: bool,
    /// Run steps as queued jobs instead of inline.
    pub queue: bool,
    pub queue_name: String,
    pub seeder: Option<String>,
    pub migration_path: Option<String>,
    /// Attempts per queued job before its failed callback fires.
    pub max_attempts: u32,
}

impl Default for ProvisioningSettings {
    fn default() -> Self {
        Self {
            auto_create_database: true,
            auto_migrate: true,
            auto_seed: false,
            queue: false,
            queue_name: "default".to_string(),
            seeder: None,
            migration_path: None,
            max_attempts: 3,
        }
    }
}

/// Longest accepted `cache.ttl`, in seconds (30 days).
pub const MAX_CACHE_TTL: u64 = 30 * 24 * 3600;

/// Domain lookup cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    /// Seconds, at most [`MAX_CACHE_TTL`]
    pub ttl: u64,
    pub prefix: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: 3600,
            prefix: "tenancy:domain:".to_string(),
        }
    }
}

/// Table bindings for the tenant and domain records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelBindings {
    pub tenant_table: String,
    pub domain_table: String,
}

impl Default for ModelBindings {
    fn default() -> Self {
        Self {
            tenant_table: "tenants".to_string(),
            domain_table: "domains".to_string(),
        }
    }
}

/// Complete tenancy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TenancyConfig {
    pub mode: TenancyMode,
    pub base_domain: String,
    pub central_domains: Vec<String>,
    pub reserved_subdomains: Vec<String>,
    pub central_connection: String,
    pub database: DatabaseSettings,
    pub provisioning: ProvisioningSettings,
    pub cache: CacheSettings,
    pub models: ModelBindings,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            mode: TenancyMode::Multi,
            base_domain: "localhost".to_string(),
            central_domains: vec!["localhost".to_string(), "127.0.0.1".to_string()],
            reserved_subdomains: ["www", "api", "admin", "mail"]
                .into_iter()
                .map(String::from)
                .collect(),
            central_connection: "central".to_string(),
            database: DatabaseSettings::default(),
            provisioning: ProvisioningSettings::default(),
            cache: CacheSettings::default(),
            models: ModelBindings::default(),
        }
    }
}

impl TenancyConfig {
    pub fn builder() -> TenancyConfigBuilder {
        TenancyConfigBuilder::new()
    }

    /// Load defaults, `.env` and `TENANCY_*` variables.
    pub fn from_env() -> Result<Self> {
        Self::builder().load_dotenv(None).load_env().build()
    }

    pub fn is_multi_database(&self) -> bool {
        self.mode == TenancyMode::Multi
    }

    pub fn is_central_domain(&self, host: &str) -> bool {
        self.central_domains
            .iter()
            .any(|d| d.eq_ignore_ascii_case(host))
    }

    pub fn is_reserved(&self, subdomain: &str) -> bool {
        self.reserved_subdomains
            .iter()
            .any(|s| s.eq_ignore_ascii_case(subdomain))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl)
    }
}

impl Validate for TenancyConfig {
    fn validate(&self) -> Result<()> {
        ConfigValidator::is_host(&self.base_domain, "base_domain")?;
        for domain in &self.central_domains {
            ConfigValidator::is_host(domain, "central_domains")?;
        }
        for sub in &self.reserved_subdomains {
            ConfigValidator::is_label(sub, "reserved_subdomains")?;
        }

        ConfigValidator::not_empty(&self.central_connection, "central_connection")?;
        ConfigValidator::not_empty(&self.database.tenant_connection, "database.tenant_connection")?;

        if self.cache.enabled {
            ConfigValidator::in_range(self.cache.ttl, 1, MAX_CACHE_TTL, "cache.ttl")?;
        }
        if self.provisioning.queue {
            ConfigValidator::not_empty(&self.provisioning.queue_name, "provisioning.queue_name")?;
        }
        ConfigValidator::at_least(self.provisioning.max_attempts, 1, "provisioning.max_attempts")?;

        Ok(())
    }
}

enum Source {
    File(PathBuf),
    Dotenv(Option<PathBuf>),
    Env,
    Vars(HashMap<String, String>),
}

/// Layered builder for [`TenancyConfig`].
///
/// Sources are applied in the order they were added; later ones win.
pub struct TenancyConfigBuilder {
    sources: Vec<Source>,
    env: EnvLoader,
}

impl TenancyConfigBuilder {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            env: EnvLoader::default(),
        }
    }

    /// Use a prefix other than `TENANCY`.
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env = EnvLoader::new(prefix);
        self
    }

    /// Merge a TOML or JSON file (format by extension).
    pub fn add_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(Source::File(path.into()));
        self
    }

    /// Load a `.env` file into the process environment and apply it.
    ///
    /// Without a path a missing `.env` is ignored; an explicit path must exist.
    pub fn load_dotenv(mut self, path: Option<&str>) -> Self {
        self.sources.push(Source::Dotenv(path.map(PathBuf::from)));
        self
    }

    /// Apply prefixed process environment variables.
    pub fn load_env(mut self) -> Self {
        self.sources.push(Source::Env);
        self
    }

    /// Apply an explicit set of prefixed variables.
    pub fn with_env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let vars = self.env.collect(vars);
        self.sources.push(Source::Vars(vars));
        self
    }

    pub fn build(self) -> Result<TenancyConfig> {
        let mut tree = serde_json::to_value(TenancyConfig::default())
            .map_err(|e| ConfigError::Malformed(e.to_string()))?;

        for source in self.sources {
            let overlay = match source {
                Source::File(path) => {
                    debug!(path = %path.display(), "Loading tenancy config file");
                    ConfigLoader::auto(&path)?.load_file(&path)?
                }
                Source::Dotenv(path) => {
                    match path {
                        Some(path) => {
                            dotenvy::from_path(&path)
                                .map_err(|e| ConfigError::Dotenv(e.to_string()))?;
                        }
                        None => {
                            dotenvy::dotenv().ok();
                        }
                    }
                    self.env.overlay(&self.env.load())?
                }
                Source::Env => self.env.overlay(&self.env.load())?,
                Source::Vars(vars) => self.env.overlay(&vars)?,
            };
            loader::merge(&mut tree, overlay);
        }

        let config: TenancyConfig = serde_json::from_value(tree)
            .map_err(|e| ConfigError::Malformed(e.to_string()))?;
        config.validate()?;

        Ok(config)
    }
}

impl Default for TenancyConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
