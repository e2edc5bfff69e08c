//! Service configuration loading and validation.
//!
//! Configuration is read from an optional TOML file (`WAGER_CONFIG`, default
//! `config.toml`). A `.env` file is honoured and a few environment variables
//! override file values: `WAGER_BIND`, `WAGER_DATA_PATH`, `WAGER_QUOTE_MAX_AGE`
//! and `WAGER_ADMIN`.
//!
//! The HTTP service is a development harness. It does not authenticate
//! anyone: every request names its caller in the body, so whoever can reach
//! the bind address can act as the admin account. Bind it to loopback.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{ConfigError, WagerError, WagerResult};
use crate::market::liability::validate_odds;
use crate::market::MAX_FEE_BPS;
use crate::oracle::{OracleSettings, DEFAULT_MAX_QUOTE_AGE_SECS, DEFAULT_NATIVE_DECIMALS, DEFAULT_STABLE_DECIMALS};
use crate::types::ODDS_SCALE;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub oracle: OracleConfig,
    pub defaults: MatchDefaults,
    pub logging: LoggingConfig,
    /// Account granted every role at startup
    pub admin: AdminConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "127.0.0.1:1234".into() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON snapshot written on shutdown and read at startup
    pub data_path: PathBuf,
    pub persist: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_path: PathBuf::from("data/state.json"), persist: true }
    }
}

/// Price feed settings; decimals describe the stake and stable units
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub max_age_secs: u64,
    pub native_decimals: u8,
    pub stable_decimals: u8,
    pub feed_decimals: u8,
    /// Price pushed into the feed at startup, in feed units
    pub initial_price: Option<i64>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            max_age_secs: DEFAULT_MAX_QUOTE_AGE_SECS,
            native_decimals: DEFAULT_NATIVE_DECIMALS,
            stable_decimals: DEFAULT_STABLE_DECIMALS,
            feed_decimals: 8,
            initial_price: None,
        }
    }
}

/// Values used when a create-match request leaves them out
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchDefaults {
    pub fee_bps: u16,
    pub treasury: String,
    pub min_stake: u64,
    pub max_bet_amount: u64,
    pub max_liability: u64,
}

impl Default for MatchDefaults {
    fn default() -> Self {
        Self {
            fee_bps: 200,
            treasury: "TREASURY".into(),
            min_stake: 1,
            max_bet_amount: 10_000,
            max_liability: 100_000,
        }
    }
}

/// Role holder named in request bodies; not a credential
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self { address: "ADMIN".into() }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl LoggingConfig {
    /// Initialize the tracing subscriber with this logging configuration.
    /// `RUST_LOG` wins over the configured level.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.format.as_str() {
            "json" => {
                fmt().json().with_env_filter(filter).init();
            }
            _ => {
                fmt().with_env_filter(filter).init();
            }
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

impl LedgerConfig {
    /// `.env`, then the TOML file if present, then environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        let path = std::env::var("WAGER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        let mut config = if Path::new(&path).exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Apply overrides from a key lookup (the process environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("WAGER_BIND") {
            self.server.bind = bind;
        }
        if let Some(path) = lookup("WAGER_DATA_PATH") {
            self.storage.data_path = PathBuf::from(path);
        }
        if let Some(age) = lookup("WAGER_QUOTE_MAX_AGE") {
            self.oracle.max_age_secs = age.parse().map_err(|_| ConfigError::InvalidValue {
                field: "WAGER_QUOTE_MAX_AGE",
                reason: format!("not a number of seconds: {age}"),
            })?;
        }
        if let Some(admin) = lookup("WAGER_ADMIN") {
            self.admin.address = admin;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::InvalidValue {
                field: "server.bind",
                reason: format!("not a socket address: {}", self.server.bind),
            });
        }
        if self.oracle.max_age_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "oracle.max_age_secs",
                reason: "must be positive".into(),
            });
        }
        if self.defaults.fee_bps > MAX_FEE_BPS {
            return Err(ConfigError::InvalidValue {
                field: "defaults.fee_bps",
                reason: format!("exceeds {MAX_FEE_BPS}"),
            });
        }
        if self.admin.address.is_empty() {
            return Err(ConfigError::InvalidValue { field: "admin.address", reason: "empty".into() });
        }
        Ok(())
    }

    pub fn oracle_settings(&self) -> OracleSettings {
        OracleSettings {
            max_age_secs: self.oracle.max_age_secs,
            native_decimals: self.oracle.native_decimals,
            stable_decimals: self.oracle.stable_decimals,
        }
    }
}

// ============================================================================
// DECIMAL ODDS
// ============================================================================

/// Human decimal odds (e.g. `1.85`) to scaled odds (`18_500`)
pub fn odds_from_decimal(odds: Decimal) -> WagerResult<u32> {
    let scaled = odds * Decimal::from(ODDS_SCALE);
    if !scaled.fract().is_zero() {
        return Err(WagerError::InvalidOdds {
            odds: scaled.trunc().to_u32().unwrap_or(0),
            reason: format!("{odds} has more than 4 decimal places"),
        });
    }
    let value = scaled.to_u32().ok_or_else(|| WagerError::InvalidOdds {
        odds: 0,
        reason: format!("{odds} out of range"),
    })?;
    validate_odds(value)?;
    Ok(value)
}

pub fn odds_to_decimal(odds: u32) -> Decimal {
    Decimal::new(odds as i64, 4)
}
