//! Engine Configuration Module
//!
//! Provides configuration loading and validation for the AMM engine.
//! Supports loading from TOML files with environment variable overrides.

use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::protocol::{BPS_DENOMINATOR, DEFAULT_FEE_BPS};

/// Main engine configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct AmmConfig {
    /// Chain identity bound into every permit domain separator
    pub chain_id: u64,

    /// Swap fee in basis points, charged on the input side of every swap
    pub fee_bps: u32,

    /// Account allowed to change the protocol fee recipient (hex address)
    pub fee_to_setter: Option<String>,

    /// Protocol fee recipient; the protocol fee is off when unset (hex address)
    pub fee_to: Option<String>,

    /// Metadata of the liquidity share token issued by each pair
    pub liquidity_token: LiquidityTokenConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Liquidity share token metadata
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LiquidityTokenConfig {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `pairdex_amm=debug`
    pub level: String,
    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Default for AmmConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            fee_bps: DEFAULT_FEE_BPS,
            fee_to_setter: None,
            fee_to: None,
            liquidity_token: LiquidityTokenConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LiquidityTokenConfig {
    fn default() -> Self {
        Self {
            name: "Pairdex V2".to_string(),
            symbol: "PDX-V2".to_string(),
            decimals: 18,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AmmConfig {
    /// Load configuration from an optional file with environment overrides
    ///
    /// Environment variables use the `PAIRDEX` prefix and `__` as the nesting
    /// separator, e.g. `PAIRDEX__FEE_BPS=25` or `PAIRDEX__LOGGING__LEVEL=debug`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            info!("Loading AMM config: {:?}", path);
            builder = builder.add_source(File::from(path).required(true));
        } else {
            debug!("No config file given, using defaults and environment");
        }

        // Override with environment variables (PAIRDEX__ prefix)
        builder = builder.add_source(
            Environment::with_prefix("PAIRDEX")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Reject settings the engine cannot operate with
    pub fn validate(&self) -> Result<()> {
        if self.fee_bps >= BPS_DENOMINATOR {
            bail!(
                "fee_bps must be below {}, got {}",
                BPS_DENOMINATOR,
                self.fee_bps
            );
        }
        if self.liquidity_token.name.trim().is_empty() {
            bail!("liquidity_token.name must not be empty");
        }
        if self.liquidity_token.symbol.trim().is_empty() {
            bail!("liquidity_token.symbol must not be empty");
        }
        for (field, value) in [("fee_to_setter", &self.fee_to_setter), ("fee_to", &self.fee_to)] {
            if let Some(address) = value {
                validate_address(address).with_context(|| format!("Invalid {}", field))?;
            }
        }
        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}

fn validate_address(value: &str) -> Result<()> {
    let hex = value.strip_prefix("0x").unwrap_or(value);
    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("'{}' is not a 20-byte hex address", value);
    }
    Ok(())
}

/// Convenience function to load and validate configuration
pub fn load_config(path: Option<&Path>) -> Result<AmmConfig> {
    let config = AmmConfig::load(path)?;
    config.validate()?;
    Ok(config)
}
