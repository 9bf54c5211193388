//! Router
//!
//! Composes the pure amount math with the pair primitives. Every entry point
//! checks its deadline first, runs as one atomic call and fails as a whole on
//! any slippage bound. Native variants take the attached native `value`
//! explicitly and route it through the wrapped native token; unused native
//! input is refunded to the caller.

use ethers::types::{Address, U256};
use tracing::{debug, info};

use crate::chain::Chain;
use crate::errors::{AmmError, AmmResult};
use crate::factory::sort_tokens;
use crate::math;
use crate::path::SwapPath;
use crate::permit::PermitSignature;
use crate::v2_math::V2Math;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Router {
    pub address: Address,
    pub wrapped_native: Address,
}

/// Amounts actually deposited by an add-liquidity call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidityAdded {
    pub amount_a: U256,
    pub amount_b: U256,
    pub liquidity: U256,
}

#[allow(clippy::too_many_arguments)]
impl Router {
    pub fn deploy(chain: &mut Chain, wrapped_native: Address) -> Self {
        let address = chain.deploy_address();
        info!(router = ?address, ?wrapped_native, "Router deployed");
        Self {
            address,
            wrapped_native,
        }
    }

    pub fn factory(&self, chain: &Chain) -> Address {
        chain.factory().address
    }

    // Quoting

    pub fn quote(&self, amount_a: U256, reserve_a: U256, reserve_b: U256) -> AmmResult<U256> {
        V2Math::quote(amount_a, reserve_a, reserve_b)
    }

    /// Output for `amount_in` at the fee new pairs are created with
    pub fn get_amount_out(
        &self,
        chain: &Chain,
        amount_in: U256,
        reserve_in: U256,
        reserve_out: U256,
    ) -> AmmResult<U256> {
        V2Math::get_amount_out(amount_in, reserve_in, reserve_out, chain.default_fee_bps())
    }

    pub fn get_amount_in(
        &self,
        chain: &Chain,
        amount_out: U256,
        reserve_in: U256,
        reserve_out: U256,
    ) -> AmmResult<U256> {
        V2Math::get_amount_in(amount_out, reserve_in, reserve_out, chain.default_fee_bps())
    }

    pub fn get_amounts_out(&self, chain: &Chain, amount_in: U256, path: &[Address]) -> AmmResult<Vec<U256>> {
        chain.get_amounts_out(amount_in, &SwapPath::new(path)?)
    }

    pub fn get_amounts_in(&self, chain: &Chain, amount_out: U256, path: &[Address]) -> AmmResult<Vec<U256>> {
        chain.get_amounts_in(amount_out, &SwapPath::new(path)?)
    }

    // Liquidity

    pub fn add_liquidity(
        &self,
        chain: &mut Chain,
        sender: Address,
        token_a: Address,
        token_b: Address,
        amount_a_desired: U256,
        amount_b_desired: U256,
        amount_a_min: U256,
        amount_b_min: U256,
        to: Address,
        deadline: U256,
    ) -> AmmResult<LiquidityAdded> {
        chain.transact(|chain| {
            chain.ensure_deadline(deadline)?;
            let (amount_a, amount_b) = self.optimal_deposit(
                chain,
                token_a,
                token_b,
                amount_a_desired,
                amount_b_desired,
                amount_a_min,
                amount_b_min,
            )?;
            let pair = chain.require_pair(token_a, token_b)?;
            chain.transfer_from(token_a, self.address, sender, pair, amount_a)?;
            chain.transfer_from(token_b, self.address, sender, pair, amount_b)?;
            let liquidity = chain.mint_unchecked(pair, self.address, to)?;
            debug!(?pair, %amount_a, %amount_b, %liquidity, "Liquidity added");
            Ok(LiquidityAdded {
                amount_a,
                amount_b,
                liquidity,
            })
        })
    }

    /// Add liquidity against the wrapped native token; `amount_a` is the token side
    pub fn add_liquidity_native(
        &self,
        chain: &mut Chain,
        sender: Address,
        value: U256,
        token: Address,
        amount_token_desired: U256,
        amount_token_min: U256,
        amount_native_min: U256,
        to: Address,
        deadline: U256,
    ) -> AmmResult<LiquidityAdded> {
        chain.transact(|chain| {
            chain.ensure_deadline(deadline)?;
            chain.transfer_native(sender, self.address, value)?;
            let (amount_token, amount_native) = self.optimal_deposit(
                chain,
                token,
                self.wrapped_native,
                amount_token_desired,
                value,
                amount_token_min,
                amount_native_min,
            )?;
            let pair = chain.require_pair(token, self.wrapped_native)?;
            chain.transfer_from(token, self.address, sender, pair, amount_token)?;
            chain.deposit(self.wrapped_native, self.address, amount_native)?;
            chain.transfer(self.wrapped_native, self.address, pair, amount_native)?;
            let liquidity = chain.mint_unchecked(pair, self.address, to)?;
            self.refund_native(chain, sender, value - amount_native)?;
            debug!(?pair, %amount_token, %amount_native, %liquidity, "Native liquidity added");
            Ok(LiquidityAdded {
                amount_a: amount_token,
                amount_b: amount_native,
                liquidity,
            })
        })
    }

    pub fn remove_liquidity(
        &self,
        chain: &mut Chain,
        sender: Address,
        token_a: Address,
        token_b: Address,
        liquidity: U256,
        amount_a_min: U256,
        amount_b_min: U256,
        to: Address,
        deadline: U256,
    ) -> AmmResult<(U256, U256)> {
        chain.transact(|chain| {
            chain.ensure_deadline(deadline)?;
            self.burn_position(
                chain,
                sender,
                token_a,
                token_b,
                liquidity,
                amount_a_min,
                amount_b_min,
                to,
            )
        })
    }

    /// Returns `(amount_token, amount_native)`
    pub fn remove_liquidity_native(
        &self,
        chain: &mut Chain,
        sender: Address,
        token: Address,
        liquidity: U256,
        amount_token_min: U256,
        amount_native_min: U256,
        to: Address,
        deadline: U256,
    ) -> AmmResult<(U256, U256)> {
        chain.transact(|chain| {
            chain.ensure_deadline(deadline)?;
            let (amount_token, amount_native) = self.burn_position(
                chain,
                sender,
                token,
                self.wrapped_native,
                liquidity,
                amount_token_min,
                amount_native_min,
                self.address,
            )?;
            chain.transfer(token, self.address, to, amount_token)?;
            self.unwrap_to(chain, amount_native, to)?;
            Ok((amount_token, amount_native))
        })
    }

    pub fn remove_liquidity_with_permit(
        &self,
        chain: &mut Chain,
        sender: Address,
        token_a: Address,
        token_b: Address,
        liquidity: U256,
        amount_a_min: U256,
        amount_b_min: U256,
        to: Address,
        deadline: U256,
        approve_max: bool,
        signature: &PermitSignature,
    ) -> AmmResult<(U256, U256)> {
        chain.transact(|chain| {
            chain.ensure_deadline(deadline)?;
            let pair = chain.require_pair(token_a, token_b)?;
            self.permit_shares(chain, pair, sender, liquidity, deadline, approve_max, signature)?;
            self.remove_liquidity(
                chain,
                sender,
                token_a,
                token_b,
                liquidity,
                amount_a_min,
                amount_b_min,
                to,
                deadline,
            )
        })
    }

    pub fn remove_liquidity_native_with_permit(
        &self,
        chain: &mut Chain,
        sender: Address,
        token: Address,
        liquidity: U256,
        amount_token_min: U256,
        amount_native_min: U256,
        to: Address,
        deadline: U256,
        approve_max: bool,
        signature: &PermitSignature,
    ) -> AmmResult<(U256, U256)> {
        chain.transact(|chain| {
            chain.ensure_deadline(deadline)?;
            let pair = chain.require_pair(token, self.wrapped_native)?;
            self.permit_shares(chain, pair, sender, liquidity, deadline, approve_max, signature)?;
            self.remove_liquidity_native(
                chain,
                sender,
                token,
                liquidity,
                amount_token_min,
                amount_native_min,
                to,
                deadline,
            )
        })
    }

    /// Remove native liquidity for a token that takes a fee on transfer
    ///
    /// Forwards whatever token balance the router actually received and
    /// returns the native amount.
    pub fn remove_liquidity_native_supporting_fee_on_transfer(
        &self,
        chain: &mut Chain,
        sender: Address,
        token: Address,
        liquidity: U256,
        amount_token_min: U256,
        amount_native_min: U256,
        to: Address,
        deadline: U256,
    ) -> AmmResult<U256> {
        chain.transact(|chain| {
            chain.ensure_deadline(deadline)?;
            let (_, amount_native) = self.burn_position(
                chain,
                sender,
                token,
                self.wrapped_native,
                liquidity,
                amount_token_min,
                amount_native_min,
                self.address,
            )?;
            let received = chain.balance_of(token, self.address);
            chain.transfer(token, self.address, to, received)?;
            self.unwrap_to(chain, amount_native, to)?;
            Ok(amount_native)
        })
    }

    pub fn remove_liquidity_native_with_permit_supporting_fee_on_transfer(
        &self,
        chain: &mut Chain,
        sender: Address,
        token: Address,
        liquidity: U256,
        amount_token_min: U256,
        amount_native_min: U256,
        to: Address,
        deadline: U256,
        approve_max: bool,
        signature: &PermitSignature,
    ) -> AmmResult<U256> {
        chain.transact(|chain| {
            chain.ensure_deadline(deadline)?;
            let pair = chain.require_pair(token, self.wrapped_native)?;
            self.permit_shares(chain, pair, sender, liquidity, deadline, approve_max, signature)?;
            self.remove_liquidity_native_supporting_fee_on_transfer(
                chain,
                sender,
                token,
                liquidity,
                amount_token_min,
                amount_native_min,
                to,
                deadline,
            )
        })
    }

    // Swaps

    pub fn swap_exact_tokens_for_tokens(
        &self,
        chain: &mut Chain,
        sender: Address,
        amount_in: U256,
        amount_out_min: U256,
        path: &[Address],
        to: Address,
        deadline: U256,
    ) -> AmmResult<Vec<U256>> {
        chain.transact(|chain| {
            chain.ensure_deadline(deadline)?;
            let path = SwapPath::new(path)?;
            let amounts = chain.get_amounts_out(amount_in, &path)?;
            if amounts[amounts.len() - 1] < amount_out_min {
                return Err(AmmError::InsufficientOutputAmount);
            }
            let pairs = path.resolve(chain)?;
            chain.transfer_from(path.first(), self.address, sender, pairs[0], amounts[0])?;
            self.execute_hops(chain, &amounts, &path, &pairs, to)?;
            Ok(amounts)
        })
    }

    pub fn swap_tokens_for_exact_tokens(
        &self,
        chain: &mut Chain,
        sender: Address,
        amount_out: U256,
        amount_in_max: U256,
        path: &[Address],
        to: Address,
        deadline: U256,
    ) -> AmmResult<Vec<U256>> {
        chain.transact(|chain| {
            chain.ensure_deadline(deadline)?;
            let path = SwapPath::new(path)?;
            let amounts = chain.get_amounts_in(amount_out, &path)?;
            if amounts[0] > amount_in_max {
                return Err(AmmError::ExcessiveInputAmount);
            }
            let pairs = path.resolve(chain)?;
            chain.transfer_from(path.first(), self.address, sender, pairs[0], amounts[0])?;
            self.execute_hops(chain, &amounts, &path, &pairs, to)?;
            Ok(amounts)
        })
    }

    pub fn swap_exact_native_for_tokens(
        &self,
        chain: &mut Chain,
        sender: Address,
        value: U256,
        amount_out_min: U256,
        path: &[Address],
        to: Address,
        deadline: U256,
    ) -> AmmResult<Vec<U256>> {
        chain.transact(|chain| {
            chain.ensure_deadline(deadline)?;
            let path = self.native_in_path(path)?;
            let amounts = chain.get_amounts_out(value, &path)?;
            if amounts[amounts.len() - 1] < amount_out_min {
                return Err(AmmError::InsufficientOutputAmount);
            }
            let pairs = path.resolve(chain)?;
            chain.transfer_native(sender, self.address, value)?;
            self.wrap_into(chain, amounts[0], pairs[0])?;
            self.execute_hops(chain, &amounts, &path, &pairs, to)?;
            Ok(amounts)
        })
    }

    pub fn swap_tokens_for_exact_native(
        &self,
        chain: &mut Chain,
        sender: Address,
        amount_out: U256,
        amount_in_max: U256,
        path: &[Address],
        to: Address,
        deadline: U256,
    ) -> AmmResult<Vec<U256>> {
        chain.transact(|chain| {
            chain.ensure_deadline(deadline)?;
            let path = self.native_out_path(path)?;
            let amounts = chain.get_amounts_in(amount_out, &path)?;
            if amounts[0] > amount_in_max {
                return Err(AmmError::ExcessiveInputAmount);
            }
            let pairs = path.resolve(chain)?;
            chain.transfer_from(path.first(), self.address, sender, pairs[0], amounts[0])?;
            self.execute_hops(chain, &amounts, &path, &pairs, self.address)?;
            self.unwrap_to(chain, amounts[amounts.len() - 1], to)?;
            Ok(amounts)
        })
    }

    pub fn swap_exact_tokens_for_native(
        &self,
        chain: &mut Chain,
        sender: Address,
        amount_in: U256,
        amount_out_min: U256,
        path: &[Address],
        to: Address,
        deadline: U256,
    ) -> AmmResult<Vec<U256>> {
        chain.transact(|chain| {
            chain.ensure_deadline(deadline)?;
            let path = self.native_out_path(path)?;
            let amounts = chain.get_amounts_out(amount_in, &path)?;
            if amounts[amounts.len() - 1] < amount_out_min {
                return Err(AmmError::InsufficientOutputAmount);
            }
            let pairs = path.resolve(chain)?;
            chain.transfer_from(path.first(), self.address, sender, pairs[0], amounts[0])?;
            self.execute_hops(chain, &amounts, &path, &pairs, self.address)?;
            self.unwrap_to(chain, amounts[amounts.len() - 1], to)?;
            Ok(amounts)
        })
    }

    /// Buy exactly `amount_out` with native input, refunding what is left of `value`
    pub fn swap_native_for_exact_tokens(
        &self,
        chain: &mut Chain,
        sender: Address,
        value: U256,
        amount_out: U256,
        path: &[Address],
        to: Address,
        deadline: U256,
    ) -> AmmResult<Vec<U256>> {
        chain.transact(|chain| {
            chain.ensure_deadline(deadline)?;
            let path = self.native_in_path(path)?;
            let amounts = chain.get_amounts_in(amount_out, &path)?;
            if amounts[0] > value {
                return Err(AmmError::ExcessiveInputAmount);
            }
            let pairs = path.resolve(chain)?;
            chain.transfer_native(sender, self.address, value)?;
            self.wrap_into(chain, amounts[0], pairs[0])?;
            self.execute_hops(chain, &amounts, &path, &pairs, to)?;
            self.refund_native(chain, sender, value - amounts[0])?;
            Ok(amounts)
        })
    }

    pub fn swap_exact_tokens_for_tokens_supporting_fee_on_transfer(
        &self,
        chain: &mut Chain,
        sender: Address,
        amount_in: U256,
        amount_out_min: U256,
        path: &[Address],
        to: Address,
        deadline: U256,
    ) -> AmmResult<()> {
        chain.transact(|chain| {
            chain.ensure_deadline(deadline)?;
            let path = SwapPath::new(path)?;
            let pairs = path.resolve(chain)?;
            chain.transfer_from(path.first(), self.address, sender, pairs[0], amount_in)?;
            let before = chain.balance_of(path.last(), to);
            self.execute_hops_by_balance(chain, &path, &pairs, to)?;
            let received = chain.balance_of(path.last(), to).saturating_sub(before);
            if received < amount_out_min {
                return Err(AmmError::InsufficientOutputAmount);
            }
            Ok(())
        })
    }

    pub fn swap_exact_native_for_tokens_supporting_fee_on_transfer(
        &self,
        chain: &mut Chain,
        sender: Address,
        value: U256,
        amount_out_min: U256,
        path: &[Address],
        to: Address,
        deadline: U256,
    ) -> AmmResult<()> {
        chain.transact(|chain| {
            chain.ensure_deadline(deadline)?;
            let path = self.native_in_path(path)?;
            let pairs = path.resolve(chain)?;
            chain.transfer_native(sender, self.address, value)?;
            self.wrap_into(chain, value, pairs[0])?;
            let before = chain.balance_of(path.last(), to);
            self.execute_hops_by_balance(chain, &path, &pairs, to)?;
            let received = chain.balance_of(path.last(), to).saturating_sub(before);
            if received < amount_out_min {
                return Err(AmmError::InsufficientOutputAmount);
            }
            Ok(())
        })
    }

    pub fn swap_exact_tokens_for_native_supporting_fee_on_transfer(
        &self,
        chain: &mut Chain,
        sender: Address,
        amount_in: U256,
        amount_out_min: U256,
        path: &[Address],
        to: Address,
        deadline: U256,
    ) -> AmmResult<()> {
        chain.transact(|chain| {
            chain.ensure_deadline(deadline)?;
            let path = self.native_out_path(path)?;
            let pairs = path.resolve(chain)?;
            chain.transfer_from(path.first(), self.address, sender, pairs[0], amount_in)?;
            self.execute_hops_by_balance(chain, &path, &pairs, self.address)?;
            let amount_out = chain.balance_of(self.wrapped_native, self.address);
            if amount_out < amount_out_min {
                return Err(AmmError::InsufficientOutputAmount);
            }
            self.unwrap_to(chain, amount_out, to)
        })
    }

    // Internals

    /// Deposit amounts that keep the pair's ratio, creating the pair on first use
    fn optimal_deposit(
        &self,
        chain: &mut Chain,
        token_a: Address,
        token_b: Address,
        amount_a_desired: U256,
        amount_b_desired: U256,
        amount_a_min: U256,
        amount_b_min: U256,
    ) -> AmmResult<(U256, U256)> {
        let pair = chain.create_pair(token_a, token_b)?;
        let (reserve_a, reserve_b) = chain.pair(pair)?.reserves_for(token_a)?;
        if reserve_a.is_zero() && reserve_b.is_zero() {
            return Ok((amount_a_desired, amount_b_desired));
        }

        let amount_b_optimal = V2Math::quote(amount_a_desired, reserve_a, reserve_b)?;
        if amount_b_optimal <= amount_b_desired {
            if amount_b_optimal < amount_b_min {
                return Err(AmmError::InsufficientBAmount);
            }
            return Ok((amount_a_desired, amount_b_optimal));
        }

        let amount_a_optimal = V2Math::quote(amount_b_desired, reserve_b, reserve_a)?;
        if amount_a_optimal > amount_a_desired || amount_a_optimal < amount_a_min {
            return Err(AmmError::InsufficientAAmount);
        }
        Ok((amount_a_optimal, amount_b_desired))
    }

    /// Pull shares from `sender` into the pair and burn them, sending proceeds to `to`
    fn burn_position(
        &self,
        chain: &mut Chain,
        sender: Address,
        token_a: Address,
        token_b: Address,
        liquidity: U256,
        amount_a_min: U256,
        amount_b_min: U256,
        to: Address,
    ) -> AmmResult<(U256, U256)> {
        let pair = chain.require_pair(token_a, token_b)?;
        chain.transfer_from(pair, self.address, sender, pair, liquidity)?;
        let (amount0, amount1) = chain.burn_unchecked(pair, self.address, to)?;
        let (token0, _) = sort_tokens(token_a, token_b)?;
        let (amount_a, amount_b) = if token_a == token0 {
            (amount0, amount1)
        } else {
            (amount1, amount0)
        };
        if amount_a < amount_a_min {
            return Err(AmmError::InsufficientAAmount);
        }
        if amount_b < amount_b_min {
            return Err(AmmError::InsufficientBAmount);
        }
        Ok((amount_a, amount_b))
    }

    fn permit_shares(
        &self,
        chain: &mut Chain,
        pair: Address,
        owner: Address,
        liquidity: U256,
        deadline: U256,
        approve_max: bool,
        signature: &PermitSignature,
    ) -> AmmResult<()> {
        let value = if approve_max { U256::MAX } else { liquidity };
        chain.permit(pair, owner, self.address, value, deadline, signature)
    }

    /// Swap through every hop; intermediate outputs go straight to the next pair
    fn execute_hops(
        &self,
        chain: &mut Chain,
        amounts: &[U256],
        path: &SwapPath,
        pairs: &[Address],
        to: Address,
    ) -> AmmResult<()> {
        for (i, (input, output)) in path.hops().enumerate() {
            let (token0, _) = sort_tokens(input, output)?;
            let amount_out = amounts[i + 1];
            let (amount0_out, amount1_out) = if input == token0 {
                (U256::zero(), amount_out)
            } else {
                (amount_out, U256::zero())
            };
            let recipient = pairs.get(i + 1).copied().unwrap_or(to);
            chain.swap_unchecked(pairs[i], self.address, amount0_out, amount1_out, recipient, &[], None)?;
        }
        Ok(())
    }

    /// Like [`Router::execute_hops`] but sizes each hop from the input the pair actually received
    fn execute_hops_by_balance(
        &self,
        chain: &mut Chain,
        path: &SwapPath,
        pairs: &[Address],
        to: Address,
    ) -> AmmResult<()> {
        for (i, (input, output)) in path.hops().enumerate() {
            let pair = pairs[i];
            let state = chain.pair(pair)?.pool_state(input)?;
            let amount_input = math::sub(chain.balance_of(input, pair), state.reserve_in)?;
            let amount_output = V2Math::get_amount_out(
                amount_input,
                state.reserve_in,
                state.reserve_out,
                state.fee_bps,
            )?;
            let (token0, _) = sort_tokens(input, output)?;
            let (amount0_out, amount1_out) = if input == token0 {
                (U256::zero(), amount_output)
            } else {
                (amount_output, U256::zero())
            };
            let recipient = pairs.get(i + 1).copied().unwrap_or(to);
            chain.swap_unchecked(pair, self.address, amount0_out, amount1_out, recipient, &[], None)?;
        }
        Ok(())
    }

    fn native_in_path(&self, path: &[Address]) -> AmmResult<SwapPath> {
        let path = SwapPath::new(path)?;
        if path.first() != self.wrapped_native {
            return Err(AmmError::InvalidPath);
        }
        Ok(path)
    }

    fn native_out_path(&self, path: &[Address]) -> AmmResult<SwapPath> {
        let path = SwapPath::new(path)?;
        if path.last() != self.wrapped_native {
            return Err(AmmError::InvalidPath);
        }
        Ok(path)
    }

    /// Wrap native held by the router and push it into `pair`
    fn wrap_into(&self, chain: &mut Chain, amount: U256, pair: Address) -> AmmResult<()> {
        chain.deposit(self.wrapped_native, self.address, amount)?;
        chain.transfer(self.wrapped_native, self.address, pair, amount)
    }

    /// Unwrap wrapped native held by the router and send the native units to `to`
    fn unwrap_to(&self, chain: &mut Chain, amount: U256, to: Address) -> AmmResult<()> {
        chain.withdraw(self.wrapped_native, self.address, amount)?;
        chain.transfer_native(self.address, to, amount)
    }

    fn refund_native(&self, chain: &mut Chain, to: Address, amount: U256) -> AmmResult<()> {
        if amount.is_zero() {
            return Ok(());
        }
        chain.transfer_native(self.address, to, amount)
    }
}
