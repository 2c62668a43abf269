//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (API keys) are referenced by env-var name in the config and
//! resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::types::{GameId, ScannerError};

/// Largest page the marketplace will return in one request.
pub const MAX_SCAN_LIMIT: u32 = 100;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub scanner: ScannerConfig,
    pub marketplace: MarketplaceConfig,
    pub oracle: Option<OracleConfig>,
    pub secondary: Option<SecondaryConfig>,
}

/// Scanner session settings. Loaded once, immutable for a session.
#[derive(Debug, Deserialize, Clone)]
pub struct ScannerConfig {
    pub game_id: String,
    /// Longest acceptable trade-lock in days when locked items are not allowed.
    #[serde(default)]
    pub max_lock_days: u64,
    pub min_profit_percent: Decimal,
    #[serde(default)]
    pub price_ceiling: Option<Decimal>,
    #[serde(default = "default_scan_limit")]
    pub scan_limit: u32,
    #[serde(default = "default_scan_delay_ms")]
    pub scan_delay_ms: u64,
    #[serde(default = "default_true")]
    pub ai_enabled: bool,
    #[serde(default)]
    pub allow_locked: bool,
    #[serde(default = "default_true")]
    pub dry_run: bool,
    #[serde(default = "default_filter_size")]
    pub delta_filter_size: usize,
}

fn default_scan_limit() -> u32 {
    MAX_SCAN_LIMIT
}

fn default_scan_delay_ms() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

fn default_filter_size() -> usize {
    crate::engine::delta::DEFAULT_MAX_SIZE
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            game_id: "csgo".to_string(),
            max_lock_days: 0,
            min_profit_percent: dec!(5.0),
            price_ceiling: None,
            scan_limit: default_scan_limit(),
            scan_delay_ms: default_scan_delay_ms(),
            ai_enabled: true,
            allow_locked: false,
            dry_run: true,
            delta_filter_size: default_filter_size(),
        }
    }
}

impl ScannerConfig {
    /// Pause between polling iterations.
    pub fn scan_delay(&self) -> Duration {
        Duration::from_millis(self.scan_delay_ms)
    }

    /// Check the settings and resolve the game id.
    pub fn validate(&self) -> Result<GameId, ScannerError> {
        let game = self.game_id.parse::<GameId>()?;

        if self.scan_limit == 0 || self.scan_limit > MAX_SCAN_LIMIT {
            return Err(ScannerError::Config(format!(
                "scan_limit must be within 1..={MAX_SCAN_LIMIT}, got {}",
                self.scan_limit
            )));
        }
        if self.min_profit_percent < Decimal::ZERO {
            return Err(ScannerError::Config(format!(
                "min_profit_percent must not be negative, got {}",
                self.min_profit_percent
            )));
        }
        if let Some(ceiling) = self.price_ceiling {
            if ceiling <= Decimal::ZERO {
                return Err(ScannerError::Config(format!(
                    "price_ceiling must be positive, got {ceiling}"
                )));
            }
        }

        Ok(game)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MarketplaceConfig {
    pub base_url: String,
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OracleConfig {
    pub url: String,
    /// Largest premium over market price the oracle may report, in percent.
    #[serde(default = "default_max_deviation")]
    pub max_deviation_percent: Decimal,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SecondaryConfig {
    pub url: String,
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Quotes backed by fewer listings than this are ignored.
    #[serde(default)]
    pub min_liquidity: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_deviation() -> Decimal {
    dec!(50)
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
