//! Protocol constants
//!
//! Values fixed by the pair/router protocol. Anything an operator may tune
//! lives in [`crate::AmmConfig`] instead.

/// Shares minted to the null holder on the first deposit into a pair.
pub const MINIMUM_LIQUIDITY: u64 = 1_000;

/// Denominator for fees expressed in basis points.
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Default swap fee (30 bps = 0.3%, the 997/1000 pair).
pub const DEFAULT_FEE_BPS: u32 = 30;

/// Reserves are bounded to 112 bits.
pub const RESERVE_BITS: usize = 112;

/// Share of fee growth minted to the protocol fee recipient is `1 / (PROTOCOL_FEE_DIVISOR + 1)`.
pub const PROTOCOL_FEE_DIVISOR: u64 = 5;

/// Typed-data signatures for the permit digest
pub mod permit {
    /// EIP-712 domain type string.
    pub const DOMAIN_TYPE: &str =
        "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

    /// Permit struct type string.
    pub const PERMIT_TYPE: &str =
        "Permit(address owner,address spender,uint256 value,uint256 nonce,uint256 deadline)";

    /// Domain version of every liquidity token.
    pub const DOMAIN_VERSION: &str = "1";
}

/// Legacy single-pair exchange parameters
pub mod legacy {
    /// Minimum native amount accepted for the first deposit into a legacy exchange.
    pub const MIN_INITIAL_NATIVE: u64 = 1_000_000_000;

    /// Legacy exchanges charge the same 0.3% input fee.
    pub const FEE_BPS: u32 = 30;
}

/// Init code hash used to derive deterministic pair addresses.
pub const PAIR_INIT_CODE_HASH: [u8; 32] = [
    0x96, 0xe8, 0xac, 0x42, 0x77, 0x19, 0x8f, 0xf8,
    0xb6, 0xf7, 0x85, 0x47, 0x8a, 0xa9, 0xa3, 0x9f,
    0x40, 0x3c, 0xb7, 0x68, 0xdd, 0x02, 0xcb, 0xee,
    0x32, 0x6c, 0x3e, 0x7d, 0xa3, 0x48, 0x84, 0x5f,
];
