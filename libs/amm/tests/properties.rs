//! Engine Property Tests
//!
//! Invariants that must hold for any reserves and trade sizes, checked
//! against the full engine rather than the bare formulas.

mod common;

use common::Fixture;
use ethers::types::U256;
use pairdex_amm::{AmmError, V2Math};
use proptest::prelude::*;

/// Amounts between 0.000001 and 1,000 whole tokens
fn token_amount() -> impl Strategy<Value = U256> {
    (1u64..1_000_000_000u64).prop_map(|micro| U256::from(micro) * U256::exp10(12))
}

fn product(reserves: (U256, U256, u32)) -> U256 {
    reserves.0 * reserves.1
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: a router swap pays exactly the quoted amount and never shrinks k
    #[test]
    fn swap_pays_quote_and_grows_k(
        reserve0 in token_amount(),
        reserve1 in token_amount(),
        amount_in in token_amount(),
    ) {
        let mut f = Fixture::new();
        prop_assume!(reserve0 * reserve1 > U256::from(1_000_000u64));
        f.add_liquidity(reserve0, reserve1);
        let k_before = product(f.chain.pair(f.pair).unwrap().reserves());
        let quoted = V2Math::get_amount_out(amount_in, reserve0, reserve1, 30).unwrap();

        let result = f.router.swap_exact_tokens_for_tokens(
            &mut f.chain,
            f.wallet,
            amount_in,
            U256::zero(),
            &[f.token0, f.token1],
            f.wallet,
            U256::MAX,
        );
        match result {
            Ok(amounts) => {
                prop_assert_eq!(amounts[1], quoted);
                let k_after = product(f.chain.pair(f.pair).unwrap().reserves());
                prop_assert!(k_after >= k_before);
            }
            // Output rounds to zero for dust trades against deep reserves
            Err(err) => prop_assert_eq!(err, AmmError::InsufficientOutputAmount),
        }
    }

    /// Property: buying the quoted input back never falls short of the requested output
    #[test]
    fn amount_in_covers_amount_out(
        reserve_in in token_amount(),
        reserve_out in token_amount(),
        amount_out in token_amount(),
    ) {
        prop_assume!(amount_out < reserve_out);
        let amount_in = V2Math::get_amount_in(amount_out, reserve_in, reserve_out, 30).unwrap();
        let received = V2Math::get_amount_out(amount_in, reserve_in, reserve_out, 30).unwrap();
        prop_assert!(received >= amount_out);
    }

    /// Property: selling then buying the same amount back never leaves the trader ahead
    #[test]
    fn swap_round_trip_never_profits(
        reserve0 in token_amount(),
        reserve1 in token_amount(),
        amount in token_amount(),
    ) {
        prop_assume!(amount <= reserve0);
        let quoted = V2Math::get_amount_out(amount, reserve0, reserve1, 30);
        prop_assume!(matches!(quoted, Ok(out) if !out.is_zero()));

        let mut f = Fixture::new();
        f.add_liquidity(reserve0, reserve1);
        let before0 = f.chain.balance_of(f.token0, f.wallet);
        let before1 = f.chain.balance_of(f.token1, f.wallet);

        let sold = f.router.swap_exact_tokens_for_tokens(
            &mut f.chain,
            f.wallet,
            amount,
            U256::zero(),
            &[f.token0, f.token1],
            f.wallet,
            U256::MAX,
        ).unwrap();
        let bought = f.router.swap_tokens_for_exact_tokens(
            &mut f.chain,
            f.wallet,
            amount,
            U256::MAX,
            &[f.token1, f.token0],
            f.wallet,
            U256::MAX,
        ).unwrap();

        prop_assert!(bought[0] >= sold[1]);
        prop_assert_eq!(f.chain.balance_of(f.token0, f.wallet), before0);
        prop_assert!(f.chain.balance_of(f.token1, f.wallet) <= before1);
    }

    /// Property: a deposit followed by a full withdrawal never returns more than was put in
    #[test]
    fn liquidity_round_trip_never_profits(
        seed0 in token_amount(),
        seed1 in token_amount(),
        amount0 in token_amount(),
        amount1 in token_amount(),
    ) {
        let mut f = Fixture::new();
        prop_assume!(seed0 * seed1 > U256::from(1_000_000u64));
        f.add_liquidity(seed0, seed1);
        f.chain.approve(f.pair, f.wallet, f.router.address, U256::MAX).unwrap();
        let before = f.chain.balance_of(f.pair, f.wallet);

        let added = f.router.add_liquidity(
            &mut f.chain,
            f.wallet,
            f.token0,
            f.token1,
            amount0,
            amount1,
            U256::zero(),
            U256::zero(),
            f.wallet,
            U256::MAX,
        );
        let Ok(added) = added else {
            return Ok(());
        };
        prop_assert_eq!(f.chain.balance_of(f.pair, f.wallet), before + added.liquidity);

        let (out0, out1) = f.router.remove_liquidity(
            &mut f.chain,
            f.wallet,
            f.token0,
            f.token1,
            added.liquidity,
            U256::zero(),
            U256::zero(),
            f.wallet,
            U256::MAX,
        ).unwrap();
        prop_assert!(out0 <= added.amount_a);
        prop_assert!(out1 <= added.amount_b);
    }

    /// Property: wrapped supply stays backed through any sequence of wraps and unwraps
    #[test]
    fn wrapped_native_stays_backed(
        ops in prop::collection::vec((any::<bool>(), token_amount()), 1..20),
    ) {
        let mut f = Fixture::new();
        for (wrap, amount) in ops {
            let result = if wrap {
                f.chain.deposit(f.wrapped, f.wallet, amount)
            } else {
                f.chain.withdraw(f.wrapped, f.wallet, amount)
            };
            if let Err(err) = result {
                let expected = matches!(err, AmmError::InsufficientBalance { .. });
                prop_assert!(expected, "unexpected error {:?}", err);
            }
            prop_assert!(f.chain.is_fully_backed(f.wrapped));
        }
        prop_assert_eq!(
            f.chain.total_supply(f.wrapped),
            f.chain.native_balance(f.wrapped)
        );
    }
}
