//! # Pairdex Configuration
//!
//! Centralized configuration and protocol constants for the Pairdex AMM
//! engine, so the engine crate never hardcodes tunables.
//!
//! ## Features
//!
//! - **Protocol Constants**: minimum liquidity lock, fee denominators, permit type strings
//! - **Engine Configuration**: chain id, swap fee, liquidity token metadata, fee switch owner
//! - **Logging**: `tracing-subscriber` initialization driven by the same config file
//!
//! ## Usage
//!
//! ```rust
//! use pairdex_config::{protocol, AmmConfig};
//!
//! let config = AmmConfig::default();
//! assert_eq!(config.fee_bps, protocol::DEFAULT_FEE_BPS);
//! assert_eq!(protocol::MINIMUM_LIQUIDITY, 1_000);
//! ```

pub mod amm_config;
pub mod logging;
pub mod protocol;

// Re-export commonly used types
pub use amm_config::{load_config, AmmConfig, LiquidityTokenConfig, LoggingConfig};
pub use logging::init_tracing;
