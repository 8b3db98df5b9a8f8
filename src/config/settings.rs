//! Application settings loading from config.toml
//!
//! Every section is optional; missing values fall back to the defaults below so an
//! empty file (or no file at all) yields a working configuration.

use crate::entities::UserId;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Users allowed to run admin commands
    pub admin_ids: Vec<UserId>,
    /// External lookup settings
    pub lookup: LookupConfig,
    /// Purchase flow settings
    pub payments: PaymentConfig,
    /// Bonus code settings
    pub codes: CodeConfig,
}

/// External record lookup settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Base URL; the normalised query is appended verbatim
    pub endpoint: String,
    /// Credits debited per successful lookup
    pub cost: i64,
    /// Upper bound on a single lookup call
    pub timeout_secs: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://rtdb-2.onrender.com/vehicle?rc=".to_string(),
            cost: 10,
            timeout_secs: 20,
        }
    }
}

impl LookupConfig {
    /// Lookup timeout as a [`Duration`]
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Purchase flow settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    /// Shortest accepted transaction reference
    pub min_reference_len: usize,
    /// Rows shown in the pending payments list
    pub pending_list_limit: u64,
    /// Price line shown on the buy screen
    pub price_text: String,
    /// Where users send money
    pub payment_address: String,
    /// Link to the QR code post
    pub qr_link: String,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            min_reference_len: 4,
            pending_list_limit: 12,
            price_text: "💳 Price: 10₹ = 10 credits\n(10 credits = 1 search)".to_string(),
            payment_address: "http://t.me/OSINTSUPPORTsBOT".to_string(),
            qr_link: "https://t.me/Vechialosint".to_string(),
        }
    }
}

/// Bonus code settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CodeConfig {
    /// Most codes a single `gen` may create
    pub max_batch: usize,
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self { max_batch: 50 }
    }
}

impl AppConfig {
    /// Whether `user_id` may run admin commands
    #[must_use]
    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.admin_ids.contains(&user_id)
    }

    /// Adds admins not already configured
    pub fn merge_admins(&mut self, extra: impl IntoIterator<Item = UserId>) {
        for id in extra {
            if !self.admin_ids.contains(&id) {
                self.admin_ids.push(id);
            }
        }
    }

    fn validate(self) -> Result<Self> {
        if self.lookup.cost <= 0 {
            return Err(Error::Config {
                message: format!("lookup.cost must be positive, got {}", self.lookup.cost),
            });
        }
        if self.codes.max_batch == 0 {
            return Err(Error::Config {
                message: "codes.max_batch must be at least 1".to_string(),
            });
        }
        Ok(self)
    }
}

/// Parses and validates configuration from a TOML string
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    config.validate()
}

/// Loads configuration from a TOML file
///
/// # Errors
/// Returns an error if the file cannot be read, the TOML syntax is invalid, or a
/// value is out of range.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    tracing::debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {path_ref:?}: {e}"),
    })?;
    parse_config(&contents)
}

/// Loads the application configuration from `CONFIG_PATH` (default `./config.toml`),
/// falling back to defaults when the file is absent, then merges `ADMIN_USER_IDS`.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    let mut config = if Path::new(&path).exists() {
        load_config(&path)?
    } else {
        tracing::warn!("Config file {path} not found, using defaults");
        AppConfig::default()
    };
    config.merge_admins(super::admins::get_admin_ids());
    if config.admin_ids.is_empty() {
        tracing::warn!("No admin ids configured; admin commands are unreachable");
    }
    Ok(config)
}
