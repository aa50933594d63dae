//! # Exchange Configuration
//!
//! Settings for the exchange session.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     EXCHANGE_SUBMIT_TIMEOUT_SECS=10                                    │
//! │     EXCHANGE_CURRENCY_SYMBOL=৳                                         │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/exchange-desk/exchange.toml (Linux)                      │
//! │     ~/Library/Application Support/com.exchange.exchange-desk/...        │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [currency]
//! code = "BDT"
//! symbol = "৳"
//! minor_per_major = 100
//!
//! [limits]
//! max_item_quantity = 999
//! max_basket_lines = 100
//!
//! [submit]
//! timeout_secs = 30
//! drift_tolerance_minor = 0
//! ```

use std::path::PathBuf;
use std::time::Duration;

use exchange_core::money::MINOR_PER_MAJOR;
use exchange_core::Money;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{SessionError, SessionResult};

// =============================================================================
// Currency
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencySettings {
    /// ISO 4217 code.
    #[serde(default = "default_currency_code")]
    pub code: String,

    /// Shown before amounts on screen and in the preview output.
    #[serde(default = "default_currency_symbol")]
    pub symbol: String,

    /// Minor units per major unit. Must match the core's fixed scale
    /// (`MINOR_PER_MAJOR`), which note values and `from_major` assume.
    #[serde(default = "default_minor_per_major")]
    pub minor_per_major: u32,
}

fn default_currency_code() -> String {
    "BDT".to_string()
}

fn default_currency_symbol() -> String {
    "৳".to_string()
}

fn default_minor_per_major() -> u32 {
    100
}

impl Default for CurrencySettings {
    fn default() -> Self {
        CurrencySettings {
            code: default_currency_code(),
            symbol: default_currency_symbol(),
            minor_per_major: default_minor_per_major(),
        }
    }
}

impl CurrencySettings {
    /// Formats an amount with the configured symbol, e.g. `৳ -12.50`.
    pub fn format(&self, amount: Money) -> String {
        let per = i64::from(self.minor_per_major.max(1));
        let digits = decimal_places(self.minor_per_major);
        let minor = amount.minor();
        let sign = if minor < 0 { "-" } else { "" };
        let major = (minor / per).abs();
        if digits == 0 {
            return format!("{} {}{}", self.symbol, sign, major);
        }
        let frac = (minor % per).abs();
        format!("{} {}{}.{:0width$}", self.symbol, sign, major, frac, width = digits)
    }
}

// =============================================================================
// Limits
// =============================================================================

/// Checked by the session before any edit reaches the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitSettings {
    /// Largest quantity on any single line.
    #[serde(default = "default_max_item_quantity")]
    pub max_item_quantity: i64,

    /// Most replacement lines in one exchange.
    #[serde(default = "default_max_basket_lines")]
    pub max_basket_lines: usize,
}

fn default_max_item_quantity() -> i64 {
    exchange_core::MAX_ITEM_QUANTITY
}

fn default_max_basket_lines() -> usize {
    exchange_core::MAX_BASKET_LINES
}

impl Default for LimitSettings {
    fn default() -> Self {
        LimitSettings {
            max_item_quantity: default_max_item_quantity(),
            max_basket_lines: default_max_basket_lines(),
        }
    }
}

// =============================================================================
// Submit
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitSettings {
    /// Caller-side timeout on the submit call (seconds). A timeout counts
    /// as a failed submission.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Largest client/server difference gap (minor units) accepted without
    /// a warning.
    #[serde(default)]
    pub drift_tolerance_minor: i64,
}

fn default_timeout() -> u64 {
    30
}

impl Default for SubmitSettings {
    fn default() -> Self {
        SubmitSettings {
            timeout_secs: default_timeout(),
            drift_tolerance_minor: 0,
        }
    }
}

impl SubmitSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn drift_tolerance(&self) -> Money {
        Money::from_minor(self.drift_tolerance_minor)
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    #[serde(default)]
    pub currency: CurrencySettings,

    #[serde(default)]
    pub limits: LimitSettings,

    #[serde(default)]
    pub submit: SubmitSettings,
}

impl ExchangeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (exchange.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SessionResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading exchange config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load exchange config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SessionResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SessionError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SessionError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SessionError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Exchange config saved");
        Ok(())
    }

    pub fn validate(&self) -> SessionResult<()> {
        let per = self.currency.minor_per_major;
        if i64::from(per) != MINOR_PER_MAJOR {
            return Err(SessionError::InvalidConfig(format!(
                "minor_per_major must be {}, got {}",
                MINOR_PER_MAJOR, per
            )));
        }
        if self.limits.max_item_quantity <= 0 {
            return Err(SessionError::InvalidConfig(
                "max_item_quantity must be greater than 0".into(),
            ));
        }
        if self.limits.max_basket_lines == 0 {
            return Err(SessionError::InvalidConfig(
                "max_basket_lines must be greater than 0".into(),
            ));
        }
        if self.submit.timeout_secs == 0 {
            return Err(SessionError::InvalidConfig(
                "timeout_secs must be greater than 0".into(),
            ));
        }
        if self.submit.drift_tolerance_minor < 0 {
            return Err(SessionError::InvalidConfig(
                "drift_tolerance_minor must not be negative".into(),
            ));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(code) = std::env::var("EXCHANGE_CURRENCY_CODE") {
            self.currency.code = code;
        }

        if let Ok(symbol) = std::env::var("EXCHANGE_CURRENCY_SYMBOL") {
            self.currency.symbol = symbol;
        }

        if let Ok(value) = std::env::var("EXCHANGE_MAX_ITEM_QUANTITY") {
            match value.parse::<i64>() {
                Ok(v) => self.limits.max_item_quantity = v,
                Err(_) => warn!(value = %value, "Ignoring invalid EXCHANGE_MAX_ITEM_QUANTITY"),
            }
        }

        if let Ok(value) = std::env::var("EXCHANGE_MAX_BASKET_LINES") {
            match value.parse::<usize>() {
                Ok(v) => self.limits.max_basket_lines = v,
                Err(_) => warn!(value = %value, "Ignoring invalid EXCHANGE_MAX_BASKET_LINES"),
            }
        }

        if let Ok(value) = std::env::var("EXCHANGE_SUBMIT_TIMEOUT_SECS") {
            match value.parse::<u64>() {
                Ok(v) => {
                    debug!(timeout_secs = v, "Overriding submit timeout from environment");
                    self.submit.timeout_secs = v;
                }
                Err(_) => warn!(value = %value, "Ignoring invalid EXCHANGE_SUBMIT_TIMEOUT_SECS"),
            }
        }

        if let Ok(value) = std::env::var("EXCHANGE_DRIFT_TOLERANCE_MINOR") {
            match value.parse::<i64>() {
                Ok(v) => self.submit.drift_tolerance_minor = v,
                Err(_) => warn!(value = %value, "Ignoring invalid EXCHANGE_DRIFT_TOLERANCE_MINOR"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "exchange", "exchange-desk")
            .map(|dirs| dirs.config_dir().join("exchange.toml"))
    }
}

/// Number of trailing zeros in a power of ten.
fn decimal_places(mut n: u32) -> usize {
    let mut places = 0;
    while n >= 10 && n % 10 == 0 {
        n /= 10;
        places += 1;
    }
    places
}

// =============================================================================
// Unit Tests
// =============================================================================
