//! Reserve ledger
//!
//! A pair custodies two tokens and tracks the reserves it last accounted
//! for. Callers push tokens (or liquidity shares) into the pair first and then
//! call [`Chain::mint`], [`Chain::burn`] or [`Chain::swap`], which infer the
//! amounts from the difference between balances and reserves.
//!
//! Every state change checks the constant product invariant (net of the swap
//! fee), keeps both reserves within 112 bits and folds the time-weighted
//! price into the cumulative accumulators before the reserves move.

use ethers::types::{Address, U256};
use pairdex_config::protocol::{BPS_DENOMINATOR, MINIMUM_LIQUIDITY, PROTOCOL_FEE_DIVISOR};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chain::Chain;
use crate::errors::{AmmError, AmmResult};
use crate::events::Event;
use crate::flash::{FlashBorrower, FlashContext};
use crate::math::{self, Uq112x112};
use crate::v2_math::V2PoolState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    pub address: Address,
    pub token0: Address,
    pub token1: Address,
    /// Swap fee charged on inputs, fixed at creation
    pub fee_bps: u32,
    pub reserve0: U256,
    pub reserve1: U256,
    /// Block timestamp of the last reserve update, modulo 2^32
    pub block_timestamp_last: u32,
    pub price0_cumulative_last: U256,
    pub price1_cumulative_last: U256,
    /// `reserve0 * reserve1` right after the most recent liquidity event, while the protocol fee is on
    pub k_last: U256,
}

impl Pair {
    pub fn new(address: Address, token0: Address, token1: Address, fee_bps: u32) -> Self {
        Self {
            address,
            token0,
            token1,
            fee_bps,
            reserve0: U256::zero(),
            reserve1: U256::zero(),
            block_timestamp_last: 0,
            price0_cumulative_last: U256::zero(),
            price1_cumulative_last: U256::zero(),
            k_last: U256::zero(),
        }
    }

    pub fn reserves(&self) -> (U256, U256, u32) {
        (self.reserve0, self.reserve1, self.block_timestamp_last)
    }

    /// Reserves oriented for a trade that sells `token_in`
    pub fn reserves_for(&self, token_in: Address) -> AmmResult<(U256, U256)> {
        if token_in == self.token0 {
            Ok((self.reserve0, self.reserve1))
        } else if token_in == self.token1 {
            Ok((self.reserve1, self.reserve0))
        } else {
            Err(AmmError::UnknownToken(token_in))
        }
    }

    /// Pure quoting view for a trade that sells `token_in`
    pub fn pool_state(&self, token_in: Address) -> AmmResult<V2PoolState> {
        let (reserve_in, reserve_out) = self.reserves_for(token_in)?;
        Ok(V2PoolState {
            reserve_in,
            reserve_out,
            fee_bps: self.fee_bps,
        })
    }

    pub fn other_token(&self, token: Address) -> AmmResult<Address> {
        if token == self.token0 {
            Ok(self.token1)
        } else if token == self.token1 {
            Ok(self.token0)
        } else {
            Err(AmmError::UnknownToken(token))
        }
    }
}

impl Chain {
    /// Issue liquidity shares to `to` for the tokens pushed into the pair since the last update
    pub fn mint(&mut self, pair: Address, sender: Address, to: Address) -> AmmResult<U256> {
        self.transact(|chain| chain.mint_unchecked(pair, sender, to))
    }

    /// Redeem the liquidity shares held by the pair itself, sending both tokens to `to`
    pub fn burn(&mut self, pair: Address, sender: Address, to: Address) -> AmmResult<(U256, U256)> {
        self.transact(|chain| chain.burn_unchecked(pair, sender, to))
    }

    /// Send the requested outputs to `to` and settle against whatever input arrived
    ///
    /// Outputs are transferred optimistically. When `data` is non-empty the
    /// supplied borrower is called back before any input is verified, so it may
    /// use the outputs and repay within the same call.
    #[allow(clippy::too_many_arguments)]
    pub fn swap(
        &mut self,
        pair: Address,
        sender: Address,
        amount0_out: U256,
        amount1_out: U256,
        to: Address,
        data: &[u8],
        borrower: Option<&mut dyn FlashBorrower>,
    ) -> AmmResult<()> {
        self.transact(|chain| {
            chain.swap_unchecked(pair, sender, amount0_out, amount1_out, to, data, borrower)
        })
    }

    /// Force reserves to match balances
    pub fn sync(&mut self, pair: Address) -> AmmResult<()> {
        self.transact(|chain| {
            let state = chain.pair(pair)?.clone();
            let balance0 = chain.balance_of(state.token0, pair);
            let balance1 = chain.balance_of(state.token1, pair);
            chain.update_reserves(pair, balance0, balance1, state.reserve0, state.reserve1)
        })
    }

    /// Send balances in excess of reserves to `to`
    pub fn skim(&mut self, pair: Address, to: Address) -> AmmResult<()> {
        self.transact(|chain| {
            let state = chain.pair(pair)?.clone();
            let excess0 = math::sub(chain.balance_of(state.token0, pair), state.reserve0)?;
            let excess1 = math::sub(chain.balance_of(state.token1, pair), state.reserve1)?;
            chain.transfer(state.token0, pair, to, excess0)?;
            chain.transfer(state.token1, pair, to, excess1)
        })
    }

    pub(crate) fn mint_unchecked(&mut self, pair: Address, sender: Address, to: Address) -> AmmResult<U256> {
        let state = self.pair(pair)?.clone();
        let (reserve0, reserve1) = (state.reserve0, state.reserve1);
        let balance0 = self.balance_of(state.token0, pair);
        let balance1 = self.balance_of(state.token1, pair);
        let amount0 = math::sub(balance0, reserve0)?;
        let amount1 = math::sub(balance1, reserve1)?;

        let fee_on = self.mint_protocol_fee(pair, reserve0, reserve1)?;
        // Read after the protocol fee, which can grow the supply
        let total_supply = self.total_supply(pair);

        let liquidity = if total_supply.is_zero() {
            let minimum = U256::from(MINIMUM_LIQUIDITY);
            let root = math::sqrt(math::mul(amount0, amount1)?);
            let liquidity = root.checked_sub(minimum).unwrap_or_default();
            if !liquidity.is_zero() {
                self.mint_tokens(pair, Address::zero(), minimum)?;
            }
            liquidity
        } else {
            math::min(
                math::mul_div(amount0, total_supply, reserve0)?,
                math::mul_div(amount1, total_supply, reserve1)?,
            )
        };
        if liquidity.is_zero() {
            return Err(AmmError::InsufficientLiquidityMinted);
        }
        self.mint_tokens(pair, to, liquidity)?;

        self.update_reserves(pair, balance0, balance1, reserve0, reserve1)?;
        if fee_on {
            self.record_k_last(pair)?;
        }
        self.emit(pair, Event::Mint { sender, amount0, amount1 });
        debug!(?pair, %amount0, %amount1, %liquidity, "Liquidity minted");
        Ok(liquidity)
    }

    pub(crate) fn burn_unchecked(
        &mut self,
        pair: Address,
        sender: Address,
        to: Address,
    ) -> AmmResult<(U256, U256)> {
        let state = self.pair(pair)?.clone();
        let (token0, token1) = (state.token0, state.token1);
        let balance0 = self.balance_of(token0, pair);
        let balance1 = self.balance_of(token1, pair);
        let liquidity = self.balance_of(pair, pair);

        let fee_on = self.mint_protocol_fee(pair, state.reserve0, state.reserve1)?;
        let total_supply = self.total_supply(pair);

        // Pro-rata on balances, not reserves
        let amount0 = math::mul_div(liquidity, balance0, total_supply)?;
        let amount1 = math::mul_div(liquidity, balance1, total_supply)?;
        if amount0.is_zero() || amount1.is_zero() {
            return Err(AmmError::InsufficientLiquidityBurned);
        }

        self.burn_tokens(pair, pair, liquidity)?;
        self.transfer(token0, pair, to, amount0)?;
        self.transfer(token1, pair, to, amount1)?;

        let balance0 = self.balance_of(token0, pair);
        let balance1 = self.balance_of(token1, pair);
        self.update_reserves(pair, balance0, balance1, state.reserve0, state.reserve1)?;
        if fee_on {
            self.record_k_last(pair)?;
        }
        self.emit(
            pair,
            Event::Burn {
                sender,
                amount0,
                amount1,
                to,
            },
        );
        debug!(?pair, %amount0, %amount1, %liquidity, "Liquidity burned");
        Ok((amount0, amount1))
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn swap_unchecked(
        &mut self,
        pair: Address,
        sender: Address,
        amount0_out: U256,
        amount1_out: U256,
        to: Address,
        data: &[u8],
        borrower: Option<&mut dyn FlashBorrower>,
    ) -> AmmResult<()> {
        if amount0_out.is_zero() && amount1_out.is_zero() {
            return Err(AmmError::InsufficientOutputAmount);
        }
        let state = self.pair(pair)?.clone();
        let (reserve0, reserve1) = (state.reserve0, state.reserve1);
        if amount0_out >= reserve0 || amount1_out >= reserve1 {
            return Err(AmmError::InsufficientLiquidity);
        }
        if to == state.token0 || to == state.token1 {
            return Err(AmmError::InvalidTo(to));
        }

        if !amount0_out.is_zero() {
            self.transfer(state.token0, pair, to, amount0_out)?;
        }
        if !amount1_out.is_zero() {
            self.transfer(state.token1, pair, to, amount1_out)?;
        }

        if !data.is_empty() {
            let borrower = borrower.ok_or(AmmError::MissingFlashCallback)?;
            let context = FlashContext {
                pair,
                sender,
                amount0_out,
                amount1_out,
            };
            debug!(?pair, borrower = ?borrower.address(), "Handing control to flash borrower");
            borrower.on_flash_swap(self, &context, data)?;
        }

        let balance0 = self.balance_of(state.token0, pair);
        let balance1 = self.balance_of(state.token1, pair);
        let amount0_in = net_input(balance0, reserve0, amount0_out);
        let amount1_in = net_input(balance1, reserve1, amount1_out);
        if amount0_in.is_zero() && amount1_in.is_zero() {
            return Err(AmmError::InsufficientInputAmount);
        }

        let fee_bps = U256::from(state.fee_bps);
        let scale = U256::from(BPS_DENOMINATOR);
        let adjusted0 = math::sub(math::mul(balance0, scale)?, math::mul(amount0_in, fee_bps)?)?;
        let adjusted1 = math::sub(math::mul(balance1, scale)?, math::mul(amount1_in, fee_bps)?)?;
        let k_after = math::mul(adjusted0, adjusted1)?;
        let k_before = math::mul(math::mul(reserve0, reserve1)?, math::mul(scale, scale)?)?;
        if k_after < k_before {
            return Err(AmmError::InvariantViolation);
        }

        self.update_reserves(pair, balance0, balance1, reserve0, reserve1)?;
        self.emit(
            pair,
            Event::Swap {
                sender,
                amount0_in,
                amount1_in,
                amount0_out,
                amount1_out,
                to,
            },
        );
        debug!(
            ?pair,
            %amount0_in,
            %amount1_in,
            %amount0_out,
            %amount1_out,
            "Swap settled"
        );
        Ok(())
    }

    /// Store new reserves, accumulating prices for the time elapsed since the last update
    fn update_reserves(
        &mut self,
        pair: Address,
        balance0: U256,
        balance1: U256,
        reserve0: U256,
        reserve1: U256,
    ) -> AmmResult<()> {
        if !math::fits_reserve(balance0) || !math::fits_reserve(balance1) {
            return Err(AmmError::ReserveOverflow);
        }
        let block_timestamp = (self.timestamp() % (1u64 << 32)) as u32;

        let price0_step;
        let price1_step;
        {
            let state = self.pair(pair)?;
            let time_elapsed = block_timestamp.wrapping_sub(state.block_timestamp_last);
            if time_elapsed > 0 && !reserve0.is_zero() && !reserve1.is_zero() {
                let elapsed = U256::from(time_elapsed);
                price0_step = Some(Uq112x112::fraction(reserve1, reserve0)?.overflowing_mul(elapsed).0);
                price1_step = Some(Uq112x112::fraction(reserve0, reserve1)?.overflowing_mul(elapsed).0);
            } else {
                price0_step = None;
                price1_step = None;
            }
        }

        let state = self.pair_mut(pair)?;
        // Accumulators wrap by design
        if let (Some(step0), Some(step1)) = (price0_step, price1_step) {
            state.price0_cumulative_last = state.price0_cumulative_last.overflowing_add(step0).0;
            state.price1_cumulative_last = state.price1_cumulative_last.overflowing_add(step1).0;
        }
        state.reserve0 = balance0;
        state.reserve1 = balance1;
        state.block_timestamp_last = block_timestamp;

        self.emit(
            pair,
            Event::Sync {
                reserve0: balance0,
                reserve1: balance1,
            },
        );
        Ok(())
    }

    /// Mint one sixth of the fee growth since the last liquidity event to the protocol fee recipient
    fn mint_protocol_fee(&mut self, pair: Address, reserve0: U256, reserve1: U256) -> AmmResult<bool> {
        let fee_to = self.factory().fee_to;
        let fee_on = !fee_to.is_zero();
        let k_last = self.pair(pair)?.k_last;

        if fee_on {
            if !k_last.is_zero() {
                let root_k = math::sqrt(math::mul(reserve0, reserve1)?);
                let root_k_last = math::sqrt(k_last);
                if root_k > root_k_last {
                    let total_supply = self.total_supply(pair);
                    let numerator = math::mul(total_supply, root_k - root_k_last)?;
                    let denominator = math::add(
                        math::mul(root_k, U256::from(PROTOCOL_FEE_DIVISOR))?,
                        root_k_last,
                    )?;
                    let liquidity = math::div(numerator, denominator)?;
                    if !liquidity.is_zero() {
                        self.mint_tokens(pair, fee_to, liquidity)?;
                        debug!(?pair, ?fee_to, %liquidity, "Protocol fee minted");
                    }
                }
            }
        } else if !k_last.is_zero() {
            self.pair_mut(pair)?.k_last = U256::zero();
        }
        Ok(fee_on)
    }

    fn record_k_last(&mut self, pair: Address) -> AmmResult<()> {
        let state = self.pair_mut(pair)?;
        state.k_last = math::mul(state.reserve0, state.reserve1)?;
        Ok(())
    }
}

/// Input inferred from the balance above what remains of the reserve after the output
fn net_input(balance: U256, reserve: U256, amount_out: U256) -> U256 {
    let remaining = reserve - amount_out;
    if balance > remaining {
        balance - remaining
    } else {
        U256::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    fn e18(n: u64) -> U256 {
        U256::from(n) * U256::exp10(18)
    }

    struct Setup {
        chain: Chain,
        token0: Address,
        token1: Address,
        pair: Address,
        wallet: Address,
    }

    fn setup() -> Setup {
        let wallet = account(0xa11ce);
        let mut chain = Chain::new(wallet);
        let a = chain.deploy_token("A", "A", 18, e18(10_000), wallet).unwrap();
        let b = chain.deploy_token("B", "B", 18, e18(10_000), wallet).unwrap();
        let pair = chain.create_pair(a, b).unwrap();
        let (token0, token1) = {
            let state = chain.pair(pair).unwrap();
            (state.token0, state.token1)
        };
        Setup {
            chain,
            token0,
            token1,
            pair,
            wallet,
        }
    }

    fn add_liquidity(s: &mut Setup, amount0: U256, amount1: U256) -> U256 {
        s.chain.transfer(s.token0, s.wallet, s.pair, amount0).unwrap();
        s.chain.transfer(s.token1, s.wallet, s.pair, amount1).unwrap();
        s.chain.mint(s.pair, s.wallet, s.wallet).unwrap()
    }

    #[test]
    fn test_first_mint_locks_minimum_liquidity() {
        let mut s = setup();
        let mark = s.chain.event_count();
        let liquidity = add_liquidity(&mut s, e18(1), e18(4));

        assert_eq!(liquidity, e18(2) - 1000);
        assert_eq!(s.chain.total_supply(s.pair), e18(2));
        assert_eq!(s.chain.balance_of(s.pair, Address::zero()), U256::from(1000));
        assert_eq!(s.chain.pair(s.pair).unwrap().reserves().0, e18(1));

        let names: Vec<&str> = s.chain.events_since(mark).iter().map(|e| e.event.name()).collect();
        assert_eq!(names, vec!["Transfer", "Transfer", "Transfer", "Transfer", "Sync", "Mint"]);
    }

    #[test]
    fn test_mint_without_deposit_fails() {
        let mut s = setup();
        add_liquidity(&mut s, e18(1), e18(4));
        let err = s.chain.mint(s.pair, s.wallet, s.wallet).unwrap_err();
        assert_eq!(err, AmmError::InsufficientLiquidityMinted);
    }

    #[test]
    fn test_tiny_first_mint_is_rejected() {
        let mut s = setup();
        s.chain.transfer(s.token0, s.wallet, s.pair, U256::from(1000)).unwrap();
        s.chain.transfer(s.token1, s.wallet, s.pair, U256::from(1000)).unwrap();
        let err = s.chain.mint(s.pair, s.wallet, s.wallet).unwrap_err();
        assert_eq!(err, AmmError::InsufficientLiquidityMinted);
        assert_eq!(s.chain.total_supply(s.pair), U256::zero());
    }

    #[test]
    fn test_swap_enforces_invariant() {
        let mut s = setup();
        add_liquidity(&mut s, e18(5), e18(10));

        // 1 token0 in buys exactly the fee-adjusted output
        let expected = U256::from_dec_str("1662497915624478906").unwrap();
        s.chain.transfer(s.token0, s.wallet, s.pair, e18(1)).unwrap();
        let err = s
            .chain
            .swap(s.pair, s.wallet, U256::zero(), expected + 1, s.wallet, &[], None)
            .unwrap_err();
        assert_eq!(err, AmmError::InvariantViolation);

        s.chain
            .swap(s.pair, s.wallet, U256::zero(), expected, s.wallet, &[], None)
            .unwrap();
        let (reserve0, reserve1, _) = s.chain.pair(s.pair).unwrap().reserves();
        assert_eq!(reserve0, e18(6));
        assert_eq!(reserve1, e18(10) - expected);
    }

    #[test]
    fn test_swap_input_and_output_validation() {
        let mut s = setup();
        add_liquidity(&mut s, e18(5), e18(10));

        let none = s
            .chain
            .swap(s.pair, s.wallet, U256::zero(), U256::zero(), s.wallet, &[], None)
            .unwrap_err();
        assert_eq!(none, AmmError::InsufficientOutputAmount);

        let too_much = s
            .chain
            .swap(s.pair, s.wallet, e18(5), U256::zero(), s.wallet, &[], None)
            .unwrap_err();
        assert_eq!(too_much, AmmError::InsufficientLiquidity);

        let bad_to = s
            .chain
            .swap(s.pair, s.wallet, U256::one(), U256::zero(), s.token1, &[], None)
            .unwrap_err();
        assert_eq!(bad_to, AmmError::InvalidTo(s.token1));

        let unpaid = s
            .chain
            .swap(s.pair, s.wallet, U256::one(), U256::zero(), s.wallet, &[], None)
            .unwrap_err();
        assert_eq!(unpaid, AmmError::InsufficientInputAmount);

        let missing = s
            .chain
            .swap(s.pair, s.wallet, U256::one(), U256::zero(), s.wallet, &[1], None)
            .unwrap_err();
        assert_eq!(missing, AmmError::MissingFlashCallback);

        // Nothing moved
        assert_eq!(s.chain.balance_of(s.token0, s.pair), e18(5));
    }

    #[test]
    fn test_burn_returns_pro_rata_share() {
        let mut s = setup();
        let liquidity = add_liquidity(&mut s, e18(1), e18(4));
        s.chain.transfer(s.pair, s.wallet, s.pair, liquidity).unwrap();

        let (amount0, amount1) = s.chain.burn(s.pair, s.wallet, s.wallet).unwrap();
        assert_eq!(amount0, e18(1) - 500);
        assert_eq!(amount1, e18(4) - 2000);
        let (reserve0, reserve1, _) = s.chain.pair(s.pair).unwrap().reserves();
        assert_eq!((reserve0, reserve1), (U256::from(500), U256::from(2000)));
        assert_eq!(s.chain.total_supply(s.pair), U256::from(1000));

        let err = s.chain.burn(s.pair, s.wallet, s.wallet).unwrap_err();
        assert_eq!(err, AmmError::InsufficientLiquidityBurned);
    }

    #[test]
    fn test_price_accumulators_advance_with_time() {
        let mut s = setup();
        add_liquidity(&mut s, e18(3), e18(6));
        let start = s.chain.pair(s.pair).unwrap().block_timestamp_last;

        s.chain.advance_time(10);
        s.chain.sync(s.pair).unwrap();
        let state = s.chain.pair(s.pair).unwrap();

        // price0 = reserve1 / reserve0 = 2, price1 = 1/2
        assert_eq!(state.block_timestamp_last, start + 10);
        assert_eq!(state.price0_cumulative_last, (U256::from(2) << 112) * 10);
        assert_eq!(state.price1_cumulative_last, (U256::one() << 111) * 10);
    }

    #[test]
    fn test_skim_and_sync_reconcile_balances() {
        let mut s = setup();
        add_liquidity(&mut s, e18(1), e18(1));
        s.chain.transfer(s.token0, s.wallet, s.pair, U256::from(777)).unwrap();

        let recipient = account(0xb0b);
        s.chain.skim(s.pair, recipient).unwrap();
        assert_eq!(s.chain.balance_of(s.token0, recipient), U256::from(777));

        s.chain.transfer(s.token1, s.wallet, s.pair, U256::from(55)).unwrap();
        s.chain.sync(s.pair).unwrap();
        assert_eq!(s.chain.pair(s.pair).unwrap().reserve1, e18(1) + 55);
    }

    #[test]
    fn test_protocol_fee_takes_sixth_of_growth() {
        let mut s = setup();
        let fee_to = account(0xfee);
        s.chain.set_fee_to(s.wallet, fee_to).unwrap();
        add_liquidity(&mut s, e18(1000), e18(1000));

        let expected_out = U256::from_dec_str("996006981039903216").unwrap();
        s.chain.transfer(s.token1, s.wallet, s.pair, e18(1)).unwrap();
        s.chain
            .swap(s.pair, s.wallet, expected_out, U256::zero(), s.wallet, &[], None)
            .unwrap();

        let liquidity = e18(1000) - 1000;
        s.chain.transfer(s.pair, s.wallet, s.pair, liquidity).unwrap();
        s.chain.burn(s.pair, s.wallet, s.wallet).unwrap();

        assert_eq!(
            s.chain.balance_of(s.pair, fee_to),
            U256::from_dec_str("249750499251388").unwrap()
        );
        assert_eq!(
            s.chain.total_supply(s.pair),
            U256::from(1000) + U256::from_dec_str("249750499251388").unwrap()
        );
    }
}
