//! Pool trait definitions for a unified quoting interface

use ethers::types::U256;
use rust_decimal::Decimal;

use crate::errors::AmmResult;
use crate::legacy::LegacyPoolState;
use crate::v2_math::{V2Math, V2PoolState};

/// Pool type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolType {
    /// Two-token reserve ledger with a configurable fee
    ConstantProduct,
    /// Single-token exchange priced against the native asset
    Legacy,
}

/// Unified pool interface for quoting a trade direction
pub trait AmmPool {
    fn pool_type(&self) -> PoolType;

    /// Calculate output amount for given input
    fn get_amount_out(&self, amount_in: U256) -> AmmResult<U256>;

    /// Calculate required input for desired output
    fn get_amount_in(&self, amount_out: U256) -> AmmResult<U256>;

    /// Current `(reserve_in, reserve_out)`
    fn get_liquidity(&self) -> (U256, U256);

    /// Get fee tier
    fn get_fee_bps(&self) -> u32;

    /// Marginal price of the input side in units of the output side
    fn spot_price(&self) -> AmmResult<Decimal> {
        let (reserve_in, reserve_out) = self.get_liquidity();
        V2Math::spot_price(reserve_in, reserve_out)
    }
}

impl AmmPool for V2PoolState {
    fn pool_type(&self) -> PoolType {
        PoolType::ConstantProduct
    }

    fn get_amount_out(&self, amount_in: U256) -> AmmResult<U256> {
        V2Math::get_amount_out(amount_in, self.reserve_in, self.reserve_out, self.fee_bps)
    }

    fn get_amount_in(&self, amount_out: U256) -> AmmResult<U256> {
        V2Math::get_amount_in(amount_out, self.reserve_in, self.reserve_out, self.fee_bps)
    }

    fn get_liquidity(&self) -> (U256, U256) {
        (self.reserve_in, self.reserve_out)
    }

    fn get_fee_bps(&self) -> u32 {
        self.fee_bps
    }
}

impl AmmPool for LegacyPoolState {
    fn pool_type(&self) -> PoolType {
        PoolType::Legacy
    }

    fn get_amount_out(&self, amount_in: U256) -> AmmResult<U256> {
        V2Math::get_amount_out(amount_in, self.reserve_in, self.reserve_out, self.fee_bps())
    }

    fn get_amount_in(&self, amount_out: U256) -> AmmResult<U256> {
        V2Math::get_amount_in(amount_out, self.reserve_in, self.reserve_out, self.fee_bps())
    }

    fn get_liquidity(&self) -> (U256, U256) {
        (self.reserve_in, self.reserve_out)
    }

    fn get_fee_bps(&self) -> u32 {
        self.fee_bps()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_pool_views_quote_alike() {
        let e18 = U256::exp10(18);
        let pair = V2PoolState {
            reserve_in: e18 * 10,
            reserve_out: e18 * 2000,
            fee_bps: 30,
        };
        let legacy = LegacyPoolState {
            reserve_in: e18 * 10,
            reserve_out: e18 * 2000,
        };

        let pools: Vec<&dyn AmmPool> = vec![&pair, &legacy];
        let quotes: Vec<U256> = pools
            .iter()
            .map(|p| p.get_amount_out(e18).unwrap())
            .collect();
        assert_eq!(quotes[0], quotes[1]);
        assert_eq!(pools[1].pool_type(), PoolType::Legacy);
        assert_eq!(pools[0].spot_price().unwrap(), dec!(200));
        assert_eq!(pools[0].get_fee_bps(), pools[1].get_fee_bps());
    }
}
