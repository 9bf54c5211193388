//! Error types for the AMM engine
//!
//! Every failure a caller can observe is one [`AmmError`] variant. Each variant
//! maps to a stable identifier (see [`AmmError::code`]) that callers match on to
//! decide whether to retry with adjusted parameters or give up.

use ethers::types::Address;
use thiserror::Error;

/// Result alias used across the engine
pub type AmmResult<T> = Result<T, AmmError>;

/// Errors that can abort an engine call
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmmError {
    // Arithmetic
    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    #[error("arithmetic underflow")]
    ArithmeticUnderflow,

    #[error("division by zero")]
    DivisionByZero,

    #[error("reserve balance exceeds 112 bits")]
    ReserveOverflow,

    // Invariant
    #[error("constant product invariant violated (K)")]
    InvariantViolation,

    // Liquidity sizing
    #[error("insufficient liquidity minted")]
    InsufficientLiquidityMinted,

    #[error("insufficient liquidity burned")]
    InsufficientLiquidityBurned,

    #[error("insufficient liquidity")]
    InsufficientLiquidity,

    #[error("insufficient input amount")]
    InsufficientInputAmount,

    #[error("insufficient output amount")]
    InsufficientOutputAmount,

    #[error("insufficient amount")]
    InsufficientAmount,

    // Caller constraints
    #[error("deadline expired")]
    DeadlineExpired,

    #[error("insufficient A amount")]
    InsufficientAAmount,

    #[error("insufficient B amount")]
    InsufficientBAmount,

    #[error("excessive input amount")]
    ExcessiveInputAmount,

    #[error("invalid swap path")]
    InvalidPath,

    #[error("invalid recipient {0:?}")]
    InvalidTo(Address),

    // Registry
    #[error("identical token addresses")]
    IdenticalAddresses,

    #[error("zero address")]
    ZeroAddress,

    #[error("no pair for tokens {token_a:?} / {token_b:?}")]
    PairNotFound { token_a: Address, token_b: Address },

    #[error("unknown pair {0:?}")]
    UnknownPair(Address),

    #[error("unknown token {0:?}")]
    UnknownToken(Address),

    #[error("no legacy exchange for token {0:?}")]
    LegacyExchangeNotFound(Address),

    #[error("caller is not allowed to perform this operation")]
    Forbidden,

    // Balances
    #[error("insufficient balance of {token:?} held by {account:?}")]
    InsufficientBalance { token: Address, account: Address },

    #[error("insufficient allowance of {token:?} from {owner:?} to {spender:?}")]
    InsufficientAllowance {
        token: Address,
        owner: Address,
        spender: Address,
    },

    #[error("insufficient native balance held by {0:?}")]
    InsufficientNativeBalance(Address),

    // Authorization
    #[error("permit expired")]
    PermitExpired,

    #[error("invalid signature")]
    InvalidSignature,

    // Flash callbacks
    #[error("flash swap callback failed: {0}")]
    FlashCallbackFailed(String),

    #[error("flash swap data present but no callback supplied")]
    MissingFlashCallback,

    // Setup
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),
}

impl AmmError {
    /// Stable identifier of the failure
    pub fn code(&self) -> &'static str {
        match self {
            AmmError::ArithmeticOverflow => "ARITHMETIC_OVERFLOW",
            AmmError::ArithmeticUnderflow => "ARITHMETIC_UNDERFLOW",
            AmmError::DivisionByZero => "DIVISION_BY_ZERO",
            AmmError::ReserveOverflow => "OVERFLOW",
            AmmError::InvariantViolation => "K",
            AmmError::InsufficientLiquidityMinted => "INSUFFICIENT_LIQUIDITY_MINTED",
            AmmError::InsufficientLiquidityBurned => "INSUFFICIENT_LIQUIDITY_BURNED",
            AmmError::InsufficientLiquidity => "INSUFFICIENT_LIQUIDITY",
            AmmError::InsufficientInputAmount => "INSUFFICIENT_INPUT_AMOUNT",
            AmmError::InsufficientOutputAmount => "INSUFFICIENT_OUTPUT_AMOUNT",
            AmmError::InsufficientAmount => "INSUFFICIENT_AMOUNT",
            AmmError::DeadlineExpired => "EXPIRED",
            AmmError::InsufficientAAmount => "INSUFFICIENT_A_AMOUNT",
            AmmError::InsufficientBAmount => "INSUFFICIENT_B_AMOUNT",
            AmmError::ExcessiveInputAmount => "EXCESSIVE_INPUT_AMOUNT",
            AmmError::InvalidPath => "INVALID_PATH",
            AmmError::InvalidTo(_) => "INVALID_TO",
            AmmError::IdenticalAddresses => "IDENTICAL_ADDRESSES",
            AmmError::ZeroAddress => "ZERO_ADDRESS",
            AmmError::PairNotFound { .. } => "PAIR_NOT_FOUND",
            AmmError::UnknownPair(_) => "UNKNOWN_PAIR",
            AmmError::UnknownToken(_) => "UNKNOWN_TOKEN",
            AmmError::LegacyExchangeNotFound(_) => "EXCHANGE_NOT_FOUND",
            AmmError::Forbidden => "FORBIDDEN",
            AmmError::InsufficientBalance { .. } => "TRANSFER_FAILED",
            AmmError::InsufficientAllowance { .. } => "TRANSFER_FROM_FAILED",
            AmmError::InsufficientNativeBalance(_) => "NATIVE_TRANSFER_FAILED",
            AmmError::PermitExpired => "PERMIT_EXPIRED",
            AmmError::InvalidSignature => "INVALID_SIGNATURE",
            AmmError::FlashCallbackFailed(_) => "CALLBACK_FAILED",
            AmmError::MissingFlashCallback => "MISSING_CALLBACK",
            AmmError::InvalidConfig(_) => "INVALID_CONFIG",
        }
    }

    /// Failures caused by market movement that a caller may retry with looser bounds
    pub fn is_slippage(&self) -> bool {
        matches!(
            self,
            AmmError::InsufficientAAmount
                | AmmError::InsufficientBAmount
                | AmmError::InsufficientOutputAmount
                | AmmError::ExcessiveInputAmount
        )
    }
}
