//! # Pairdex AMM Library - Constant-Product Exchange Engine
//!
//! ## Purpose
//!
//! Deterministic constant-product exchange engine: a factory of two-token
//! pairs with fungible liquidity shares, a router that composes pair
//! primitives into slippage- and deadline-protected operations, flash
//! swaps with borrower callbacks, signed approvals, and a wrapped native
//! asset. All amounts are exact 256-bit integers; decimals only appear in
//! derived prices.
//!
//! ## Integration Points
//!
//! - **Configuration**: [`pairdex_config::AmmConfig`] seeds chain id, default fee, fee
//!   recipient and share token metadata through [`Chain::from_config`]
//! - **State**: every balance, pair and exchange lives in one [`Chain`]; calls borrow it
//!   exclusively and run atomically via [`Chain::transact`]
//! - **Events**: every state change appends a [`LoggedEvent`], exportable as JSON lines
//! - **Signatures**: permit recovery goes through [`SignatureVerifier`]
//! - **Legacy**: [`Migrator`] moves positions out of single-token legacy exchanges
//!
//! ## Architecture Role
//!
//! ```text
//! Router ──► Pair (mint / burn / swap / skim / sync) ──► Token ledger
//!   │            │                                        ▲
//!   │            └──► FlashBorrower callback ─────────────┘
//!   ├──► Factory (create, fee switch)
//!   └──► Wrapped native (deposit / withdraw)
//!
//! Migrator ──► Legacy exchange ──► Router
//! ```
//!
//! Pure math ([`V2Math`], [`math`]) never touches state, so quoting and
//! execution share one formula.

pub mod chain;
pub mod errors;
pub mod events;
pub mod factory;
pub mod flash;
pub mod legacy;
pub mod math;
pub mod migrator;
pub mod native;
pub mod oracle;
pub mod pair;
pub mod path;
pub mod permit;
pub mod pool_traits;
pub mod router;
pub mod token;
pub mod v2_math;

pub use chain::Chain;
pub use errors::{AmmError, AmmResult};
pub use events::{Event, LoggedEvent};
pub use factory::{pair_for, sort_tokens, Factory};
pub use flash::{encode_min_amount, FlashBorrower, FlashContext, LegacyArbitrageur};
pub use legacy::{LegacyFactory, LegacyPoolState};
pub use migrator::Migrator;
pub use oracle::{AveragePrice, Observation};
pub use pair::Pair;
pub use path::SwapPath;
pub use permit::{EcdsaVerifier, PermitSignature, SignatureVerifier};
pub use pool_traits::{AmmPool, PoolType};
pub use router::{LiquidityAdded, Router};
pub use token::{TokenAccount, TokenState};
pub use v2_math::{V2Math, V2PoolState};

/// Common types for price calculations
pub use rust_decimal::Decimal;
pub use rust_decimal_macros::dec;
