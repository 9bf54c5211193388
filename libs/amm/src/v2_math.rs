//! Constant product swap math with exact integer rounding
//!
//! Every function is total over its inputs and side-effect free. Rounding
//! always favors the pool: outputs round down, required inputs round up.
//! Human-facing prices are reported as `Decimal`, ledger amounts stay `U256`.

use ethers::types::U256;
use pairdex_config::protocol::BPS_DENOMINATOR;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::errors::{AmmError, AmmResult};
use crate::math;

/// Largest mantissa a `Decimal` can carry (2^96 - 1)
const DECIMAL_MAX_MANTISSA: u128 = 79_228_162_514_264_337_593_543_950_335;

/// Fractional digits kept when reporting prices
const PRICE_SCALE: u32 = 18;

/// Reserves and fee of one pool, oriented for a trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct V2PoolState {
    pub reserve_in: U256,
    pub reserve_out: U256,
    pub fee_bps: u32, // Fee in basis points (30 = 0.3%)
}

impl V2PoolState {
    /// Same pool seen from the opposite trade direction
    pub fn flipped(&self) -> Self {
        Self {
            reserve_in: self.reserve_out,
            reserve_out: self.reserve_in,
            fee_bps: self.fee_bps,
        }
    }
}

/// Constant product math functions
pub struct V2Math;

impl V2Math {
    /// Output received for `amount_in`, after the fee
    ///
    /// `floor(amount_in * (10000 - fee) * reserve_out / (reserve_in * 10000 + amount_in * (10000 - fee)))`
    pub fn get_amount_out(
        amount_in: U256,
        reserve_in: U256,
        reserve_out: U256,
        fee_bps: u32,
    ) -> AmmResult<U256> {
        if amount_in.is_zero() {
            return Err(AmmError::InsufficientInputAmount);
        }
        if reserve_in.is_zero() || reserve_out.is_zero() {
            return Err(AmmError::InsufficientLiquidity);
        }

        let amount_in_with_fee = math::mul(amount_in, Self::fee_multiplier(fee_bps)?)?;
        let numerator = math::mul(amount_in_with_fee, reserve_out)?;
        let denominator = math::add(
            math::mul(reserve_in, U256::from(BPS_DENOMINATOR))?,
            amount_in_with_fee,
        )?;
        math::div(numerator, denominator)
    }

    /// Input required to receive exactly `amount_out`, rounded up by one unit
    pub fn get_amount_in(
        amount_out: U256,
        reserve_in: U256,
        reserve_out: U256,
        fee_bps: u32,
    ) -> AmmResult<U256> {
        if amount_out.is_zero() {
            return Err(AmmError::InsufficientOutputAmount);
        }
        if reserve_in.is_zero() || reserve_out.is_zero() || amount_out >= reserve_out {
            return Err(AmmError::InsufficientLiquidity);
        }

        let numerator = math::mul(
            math::mul(reserve_in, amount_out)?,
            U256::from(BPS_DENOMINATOR),
        )?;
        let denominator = math::mul(reserve_out - amount_out, Self::fee_multiplier(fee_bps)?)?;
        math::add(math::div(numerator, denominator)?, U256::one())
    }

    /// Amount of B matching `amount_a` at the current reserve ratio, no fee
    pub fn quote(amount_a: U256, reserve_a: U256, reserve_b: U256) -> AmmResult<U256> {
        if amount_a.is_zero() {
            return Err(AmmError::InsufficientAmount);
        }
        if reserve_a.is_zero() || reserve_b.is_zero() {
            return Err(AmmError::InsufficientLiquidity);
        }
        math::mul_div(amount_a, reserve_b, reserve_a)
    }

    /// Marginal price of the input token in units of the output token
    pub fn spot_price(reserve_in: U256, reserve_out: U256) -> AmmResult<Decimal> {
        if reserve_in.is_zero() {
            return Err(AmmError::InsufficientLiquidity);
        }
        ratio_to_decimal(reserve_out, reserve_in)
    }

    /// Price impact of a trade in percent, fee excluded
    pub fn calculate_price_impact(
        amount_in: U256,
        reserve_in: U256,
        reserve_out: U256,
    ) -> AmmResult<Decimal> {
        let price_before = Self::spot_price(reserve_in, reserve_out)?;
        if price_before.is_zero() {
            return Err(AmmError::InsufficientLiquidity);
        }

        let amount_out = Self::get_amount_out(amount_in, reserve_in, reserve_out, 0)?;
        let price_after = Self::spot_price(
            math::add(reserve_in, amount_in)?,
            math::sub(reserve_out, amount_out)?,
        )?;

        Ok((price_before - price_after).abs() / price_before * dec!(100))
    }

    fn fee_multiplier(fee_bps: u32) -> AmmResult<U256> {
        BPS_DENOMINATOR
            .checked_sub(fee_bps)
            .map(U256::from)
            .ok_or(AmmError::ArithmeticUnderflow)
    }
}

/// `numerator / denominator` as a `Decimal`, keeping as many fractional digits as fit
pub fn ratio_to_decimal(numerator: U256, denominator: U256) -> AmmResult<Decimal> {
    if denominator.is_zero() {
        return Err(AmmError::DivisionByZero);
    }
    let limit = U256::from(DECIMAL_MAX_MANTISSA);
    for scale in (0..=PRICE_SCALE).rev() {
        let scaled = match numerator.checked_mul(U256::exp10(scale as usize)) {
            Some(scaled) => scaled / denominator,
            None => continue,
        };
        if scaled <= limit {
            return Decimal::try_from_i128_with_scale(scaled.as_u128() as i128, scale)
                .map(|d| d.normalize())
                .map_err(|_| AmmError::ArithmeticOverflow);
        }
    }
    Err(AmmError::ArithmeticOverflow)
}
