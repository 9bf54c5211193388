//! Fixed-point math core
//!
//! Checked 256-bit integer arithmetic for every reserve, amount and share
//! computation. Nothing in here wraps: overflow and underflow surface as
//! [`AmmError::ArithmeticOverflow`] / [`AmmError::ArithmeticUnderflow`].
//! Division truncates toward zero; callers arrange operands so truncation
//! always favors the pool.
//!
//! The only intentionally wrapping values in the engine (price accumulators
//! and the 32-bit timestamp delta) do not go through these helpers.

use ethers::types::U256;
use pairdex_config::protocol::RESERVE_BITS;

use crate::errors::{AmmError, AmmResult};

/// `a + b`, failing on overflow
#[inline]
pub fn add(a: U256, b: U256) -> AmmResult<U256> {
    a.checked_add(b).ok_or(AmmError::ArithmeticOverflow)
}

/// `a - b`, failing on underflow
#[inline]
pub fn sub(a: U256, b: U256) -> AmmResult<U256> {
    a.checked_sub(b).ok_or(AmmError::ArithmeticUnderflow)
}

/// `a * b`, failing on overflow
#[inline]
pub fn mul(a: U256, b: U256) -> AmmResult<U256> {
    a.checked_mul(b).ok_or(AmmError::ArithmeticOverflow)
}

/// `a / b` rounded down
#[inline]
pub fn div(a: U256, b: U256) -> AmmResult<U256> {
    if b.is_zero() {
        return Err(AmmError::DivisionByZero);
    }
    Ok(a / b)
}

/// `a * b / c` rounded down, without an intermediate overflow check beyond 256 bits
pub fn mul_div(a: U256, b: U256, c: U256) -> AmmResult<U256> {
    div(mul(a, b)?, c)
}

#[inline]
pub fn min(a: U256, b: U256) -> U256 {
    if a < b {
        a
    } else {
        b
    }
}

/// Floor of the square root, Babylonian method
///
/// Used for the geometric mean of the first deposit and for `√k` in the
/// protocol fee computation.
pub fn sqrt(y: U256) -> U256 {
    if y > U256::from(3) {
        let mut z = y;
        let mut x = y / 2 + 1;
        while x < z {
            z = x;
            x = (y / x + x) / 2;
        }
        z
    } else if !y.is_zero() {
        U256::one()
    } else {
        U256::zero()
    }
}

/// Largest value a reserve may hold
pub fn max_reserve() -> U256 {
    (U256::one() << RESERVE_BITS) - 1
}

/// True when `value` fits the bounded reserve width
#[inline]
pub fn fits_reserve(value: U256) -> bool {
    value <= max_reserve()
}

/// Binary fixed-point numbers with 112 fractional bits (UQ112x112)
///
/// Range `[0, 2^112 - 1]`, resolution `1 / 2^112`. Stored in the low 224 bits
/// of a `U256`.
pub struct Uq112x112;

impl Uq112x112 {
    /// Encode a reserve-sized integer as UQ112x112
    pub fn encode(y: U256) -> AmmResult<U256> {
        if !fits_reserve(y) {
            return Err(AmmError::ReserveOverflow);
        }
        Ok(y << RESERVE_BITS)
    }

    /// Divide a UQ112x112 by a reserve-sized integer
    pub fn uqdiv(x: U256, y: U256) -> AmmResult<U256> {
        div(x, y)
    }

    /// `numerator / denominator` as UQ112x112
    pub fn fraction(numerator: U256, denominator: U256) -> AmmResult<U256> {
        Self::uqdiv(Self::encode(numerator)?, denominator)
    }

    /// Multiply a UQ112x112 by an integer and truncate to an integer
    pub fn mul_decode(x: U256, y: U256) -> AmmResult<U256> {
        Ok(mul(x, y)? >> RESERVE_BITS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqrt_floor() {
        assert_eq!(sqrt(U256::zero()), U256::zero());
        assert_eq!(sqrt(U256::from(1)), U256::from(1));
        assert_eq!(sqrt(U256::from(3)), U256::from(1));
        assert_eq!(sqrt(U256::from(4)), U256::from(2));
        assert_eq!(sqrt(U256::from(99)), U256::from(9));
        assert_eq!(sqrt(U256::from(100)), U256::from(10));

        let e18 = U256::exp10(18);
        assert_eq!(sqrt(e18 * e18 * 4), e18 * 2);
    }

    #[test]
    fn test_sqrt_of_max_does_not_overflow() {
        let root = sqrt(U256::MAX);
        assert_eq!(root, (U256::one() << 128) - 1);
    }

    #[test]
    fn test_checked_ops_fail_instead_of_wrapping() {
        assert_eq!(add(U256::MAX, U256::one()), Err(AmmError::ArithmeticOverflow));
        assert_eq!(sub(U256::zero(), U256::one()), Err(AmmError::ArithmeticUnderflow));
        assert_eq!(mul(U256::MAX, U256::from(2)), Err(AmmError::ArithmeticOverflow));
        assert_eq!(div(U256::one(), U256::zero()), Err(AmmError::DivisionByZero));
        assert_eq!(div(U256::from(7), U256::from(2)), Ok(U256::from(3)));
    }

    #[test]
    fn test_uq112x112_fraction() {
        let half = Uq112x112::fraction(U256::from(1), U256::from(2)).unwrap();
        assert_eq!(half, U256::one() << 111);
        assert_eq!(
            Uq112x112::mul_decode(half, U256::from(10)).unwrap(),
            U256::from(5)
        );
        assert_eq!(
            Uq112x112::encode(max_reserve() + 1),
            Err(AmmError::ReserveOverflow)
        );
    }
}
