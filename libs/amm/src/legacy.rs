//! Legacy single-token exchange
//!
//! Each exchange pairs one token with the native asset. Its native reserve is
//! the exchange's own native balance and its shares live in the token ledger
//! at the exchange address. Only the entry points used by migration and the
//! flash arbitrage borrower are provided.

use std::collections::HashMap;

use ethers::types::{Address, U256};
use pairdex_config::protocol::legacy::{FEE_BPS, MIN_INITIAL_NATIVE};
use tracing::{debug, info};

use crate::chain::Chain;
use crate::errors::{AmmError, AmmResult};
use crate::events::Event;
use crate::math;
use crate::pool_traits::AmmPool;
use crate::token::TokenState;

/// Quoting view of a legacy exchange for one trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyPoolState {
    pub reserve_in: U256,
    pub reserve_out: U256,
}

impl LegacyPoolState {
    pub fn fee_bps(&self) -> u32 {
        FEE_BPS
    }
}

#[derive(Debug, Clone)]
pub struct LegacyFactory {
    pub address: Address,
    token_to_exchange: HashMap<Address, Address>,
    exchange_to_token: HashMap<Address, Address>,
}

impl LegacyFactory {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            token_to_exchange: HashMap::new(),
            exchange_to_token: HashMap::new(),
        }
    }

    pub fn get_exchange(&self, token: Address) -> Option<Address> {
        self.token_to_exchange.get(&token).copied()
    }

    pub fn get_token(&self, exchange: Address) -> Option<Address> {
        self.exchange_to_token.get(&exchange).copied()
    }
}

impl Chain {
    pub fn legacy_factory(&self) -> &LegacyFactory {
        &self.legacy
    }

    /// Deploy the exchange for `token`; returns the existing one when already deployed
    pub fn create_exchange(&mut self, token: Address) -> AmmResult<Address> {
        if token.is_zero() {
            return Err(AmmError::ZeroAddress);
        }
        if let Some(existing) = self.legacy.get_exchange(token) {
            return Ok(existing);
        }
        let exchange = self.deploy_address();
        self.tokens.insert(exchange, TokenState::new("Legacy Exchange", "LEX-V1", 18));
        self.legacy.token_to_exchange.insert(token, exchange);
        self.legacy.exchange_to_token.insert(exchange, token);
        info!(?token, ?exchange, "Legacy exchange created");
        Ok(exchange)
    }

    pub fn get_exchange(&self, token: Address) -> Option<Address> {
        self.legacy.get_exchange(token)
    }

    fn exchange_token(&self, exchange: Address) -> AmmResult<Address> {
        self.legacy
            .get_token(exchange)
            .ok_or(AmmError::LegacyExchangeNotFound(exchange))
    }

    /// `(native_reserve, token_reserve)` of an exchange
    pub fn legacy_reserves(&self, exchange: Address) -> AmmResult<(U256, U256)> {
        let token = self.exchange_token(exchange)?;
        Ok((
            self.native_balance(exchange),
            self.balance_of(token, exchange),
        ))
    }

    /// Deposit `value` native units plus the matching token amount
    ///
    /// The first deposit sets the price: it takes exactly `max_tokens` and
    /// mints shares equal to the native amount. Later deposits take
    /// `value * token_reserve / native_reserve + 1` tokens.
    #[allow(clippy::too_many_arguments)]
    pub fn legacy_add_liquidity(
        &mut self,
        exchange: Address,
        sender: Address,
        value: U256,
        min_liquidity: U256,
        max_tokens: U256,
        deadline: U256,
    ) -> AmmResult<U256> {
        self.transact(|chain| {
            let token = chain.exchange_token(exchange)?;
            if deadline <= U256::from(chain.timestamp()) {
                return Err(AmmError::DeadlineExpired);
            }
            if max_tokens.is_zero() || value.is_zero() {
                return Err(AmmError::InsufficientInputAmount);
            }

            let total_liquidity = chain.total_supply(exchange);
            let native_reserve = chain.native_balance(exchange);
            let token_reserve = chain.balance_of(token, exchange);
            chain.transfer_native(sender, exchange, value)?;

            let (token_amount, minted) = if total_liquidity.is_zero() {
                if value < U256::from(MIN_INITIAL_NATIVE) {
                    return Err(AmmError::InsufficientInputAmount);
                }
                (max_tokens, math::add(native_reserve, value)?)
            } else {
                if min_liquidity.is_zero() {
                    return Err(AmmError::InsufficientLiquidityMinted);
                }
                let token_amount = math::add(math::mul_div(value, token_reserve, native_reserve)?, U256::one())?;
                let minted = math::mul_div(value, total_liquidity, native_reserve)?;
                if token_amount > max_tokens {
                    return Err(AmmError::ExcessiveInputAmount);
                }
                if minted < min_liquidity {
                    return Err(AmmError::InsufficientLiquidityMinted);
                }
                (token_amount, minted)
            };

            chain.mint_tokens(exchange, sender, minted)?;
            chain.transfer_from(token, exchange, sender, exchange, token_amount)?;
            chain.emit(
                exchange,
                Event::AddLiquidity {
                    provider: sender,
                    native_amount: value,
                    token_amount,
                },
            );
            debug!(?exchange, %value, %token_amount, %minted, "Legacy liquidity added");
            Ok(minted)
        })
    }

    /// Burn `amount` shares for a pro-rata slice of both reserves
    #[allow(clippy::too_many_arguments)]
    pub fn legacy_remove_liquidity(
        &mut self,
        exchange: Address,
        sender: Address,
        amount: U256,
        min_native: U256,
        min_tokens: U256,
        deadline: U256,
    ) -> AmmResult<(U256, U256)> {
        self.transact(|chain| {
            let token = chain.exchange_token(exchange)?;
            if amount.is_zero() || min_native.is_zero() || min_tokens.is_zero() {
                return Err(AmmError::InsufficientAmount);
            }
            if deadline <= U256::from(chain.timestamp()) {
                return Err(AmmError::DeadlineExpired);
            }
            let total_liquidity = chain.total_supply(exchange);
            if total_liquidity.is_zero() {
                return Err(AmmError::InsufficientLiquidity);
            }

            let (native_reserve, token_reserve) = chain.legacy_reserves(exchange)?;
            let native_amount = math::mul_div(amount, native_reserve, total_liquidity)?;
            let token_amount = math::mul_div(amount, token_reserve, total_liquidity)?;
            if native_amount < min_native || token_amount < min_tokens {
                return Err(AmmError::InsufficientOutputAmount);
            }

            chain.burn_tokens(exchange, sender, amount)?;
            chain.transfer_native(exchange, sender, native_amount)?;
            chain.transfer(token, exchange, sender, token_amount)?;
            chain.emit(
                exchange,
                Event::RemoveLiquidity {
                    provider: sender,
                    native_amount,
                    token_amount,
                },
            );
            debug!(?exchange, %native_amount, %token_amount, "Legacy liquidity removed");
            Ok((native_amount, token_amount))
        })
    }

    /// Sell exactly `value` native units for tokens
    pub fn native_to_token_swap_input(
        &mut self,
        exchange: Address,
        sender: Address,
        value: U256,
        min_tokens: U256,
        deadline: U256,
    ) -> AmmResult<U256> {
        self.transact(|chain| {
            let token = chain.exchange_token(exchange)?;
            chain.ensure_deadline(deadline)?;
            if value.is_zero() || min_tokens.is_zero() {
                return Err(AmmError::InsufficientAmount);
            }

            let (native_reserve, token_reserve) = chain.legacy_reserves(exchange)?;
            let pool = LegacyPoolState {
                reserve_in: native_reserve,
                reserve_out: token_reserve,
            };
            let tokens_bought = pool.get_amount_out(value)?;
            if tokens_bought < min_tokens {
                return Err(AmmError::InsufficientOutputAmount);
            }

            chain.transfer_native(sender, exchange, value)?;
            chain.transfer(token, exchange, sender, tokens_bought)?;
            chain.emit(
                exchange,
                Event::TokenPurchase {
                    buyer: sender,
                    native_sold: value,
                    tokens_bought,
                },
            );
            Ok(tokens_bought)
        })
    }

    /// Sell exactly `tokens_sold` tokens for native units
    pub fn token_to_native_swap_input(
        &mut self,
        exchange: Address,
        sender: Address,
        tokens_sold: U256,
        min_native: U256,
        deadline: U256,
    ) -> AmmResult<U256> {
        self.transact(|chain| {
            let token = chain.exchange_token(exchange)?;
            chain.ensure_deadline(deadline)?;
            if tokens_sold.is_zero() || min_native.is_zero() {
                return Err(AmmError::InsufficientAmount);
            }

            let (native_reserve, token_reserve) = chain.legacy_reserves(exchange)?;
            let pool = LegacyPoolState {
                reserve_in: token_reserve,
                reserve_out: native_reserve,
            };
            let native_bought = pool.get_amount_out(tokens_sold)?;
            if native_bought < min_native {
                return Err(AmmError::InsufficientOutputAmount);
            }

            chain.transfer_native(exchange, sender, native_bought)?;
            chain.transfer_from(token, exchange, sender, exchange, tokens_sold)?;
            chain.emit(
                exchange,
                Event::NativePurchase {
                    buyer: sender,
                    tokens_sold,
                    native_bought,
                },
            );
            Ok(native_bought)
        })
    }
}
