//! Time-weighted average prices from pair accumulators
//!
//! Take an [`Observation`] now, another one later, and the difference of the
//! cumulative prices divided by the elapsed time is the average price over
//! the window. Accumulators and timestamps wrap, so subtraction wraps too.

use ethers::types::{Address, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::chain::Chain;
use crate::errors::{AmmError, AmmResult};
use crate::math::Uq112x112;
use crate::v2_math::ratio_to_decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: u32,
    /// Cumulative price of token0 in token1, UQ112x112 seconds
    pub price0_cumulative: U256,
    pub price1_cumulative: U256,
}

/// Average prices between two observations of the same pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AveragePrice {
    /// UQ112x112 price of token0 in token1
    pub price0: U256,
    pub price1: U256,
}

impl AveragePrice {
    pub fn between(older: &Observation, newer: &Observation) -> AmmResult<Self> {
        let elapsed = newer.timestamp.wrapping_sub(older.timestamp);
        if elapsed == 0 {
            return Err(AmmError::DivisionByZero);
        }
        let elapsed = U256::from(elapsed);
        Ok(Self {
            price0: newer.price0_cumulative.overflowing_sub(older.price0_cumulative).0 / elapsed,
            price1: newer.price1_cumulative.overflowing_sub(older.price1_cumulative).0 / elapsed,
        })
    }

    /// Amount of token1 worth `amount_in` of token0 at the average price
    pub fn consult0(&self, amount_in: U256) -> AmmResult<U256> {
        Uq112x112::mul_decode(self.price0, amount_in)
    }

    /// Amount of token0 worth `amount_in` of token1 at the average price
    pub fn consult1(&self, amount_in: U256) -> AmmResult<U256> {
        Uq112x112::mul_decode(self.price1, amount_in)
    }

    pub fn price0_decimal(&self) -> AmmResult<Decimal> {
        ratio_to_decimal(self.price0, U256::one() << 112)
    }

    pub fn price1_decimal(&self) -> AmmResult<Decimal> {
        ratio_to_decimal(self.price1, U256::one() << 112)
    }
}

impl Chain {
    /// Cumulative prices as of now, including the time since the pair last updated
    pub fn observe(&self, pair: Address) -> AmmResult<Observation> {
        let state = self.pair(pair)?;
        let timestamp = (self.timestamp() % (1u64 << 32)) as u32;
        let mut observation = Observation {
            timestamp,
            price0_cumulative: state.price0_cumulative_last,
            price1_cumulative: state.price1_cumulative_last,
        };

        let elapsed = timestamp.wrapping_sub(state.block_timestamp_last);
        if elapsed > 0 && !state.reserve0.is_zero() && !state.reserve1.is_zero() {
            let elapsed = U256::from(elapsed);
            let step0 = Uq112x112::fraction(state.reserve1, state.reserve0)?.overflowing_mul(elapsed).0;
            let step1 = Uq112x112::fraction(state.reserve0, state.reserve1)?.overflowing_mul(elapsed).0;
            observation.price0_cumulative = observation.price0_cumulative.overflowing_add(step0).0;
            observation.price1_cumulative = observation.price1_cumulative.overflowing_add(step1).0;
        }
        Ok(observation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn account(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    #[test]
    fn test_average_over_window_with_trade() {
        let wallet = account(1);
        let mut chain = Chain::new(wallet);
        let e18 = U256::exp10(18);
        let a = chain.deploy_token("A", "A", 18, e18 * 100, wallet).unwrap();
        let b = chain.deploy_token("B", "B", 18, e18 * 100, wallet).unwrap();
        let pair = chain.create_pair(a, b).unwrap();
        let (token0, token1) = {
            let p = chain.pair(pair).unwrap();
            (p.token0, p.token1)
        };
        chain.transfer(token0, wallet, pair, e18 * 3).unwrap();
        chain.transfer(token1, wallet, pair, e18 * 6).unwrap();
        chain.mint(pair, wallet, wallet).unwrap();

        let start = chain.observe(pair).unwrap();
        chain.advance_time(100);

        // Double token1 reserves halfway through the window
        chain.transfer(token1, wallet, pair, e18 * 6).unwrap();
        chain.sync(pair).unwrap();
        chain.advance_time(100);

        let end = chain.observe(pair).unwrap();
        let average = AveragePrice::between(&start, &end).unwrap();

        // price0 was 2 for 100s and 4 for 100s
        assert_eq!(average.price0_decimal().unwrap(), dec!(3));
        assert_eq!(average.consult0(U256::from(10)).unwrap(), U256::from(30));
        assert!(average.price1_decimal().unwrap() < dec!(0.5));
    }

    #[test]
    fn test_zero_window_is_rejected() {
        let observation = Observation {
            timestamp: 5,
            price0_cumulative: U256::zero(),
            price1_cumulative: U256::zero(),
        };
        assert_eq!(
            AveragePrice::between(&observation, &observation),
            Err(AmmError::DivisionByZero)
        );
    }
}
