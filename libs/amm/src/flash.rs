//! Flash swap callbacks
//!
//! A swap with non-empty data hands control to a [`FlashBorrower`] after the
//! outputs are credited and before the pair verifies its invariant. The
//! borrower gets the whole engine back and may trade anywhere, the lending
//! pair included, as long as the pair ends up repaid.
//!
//! [`LegacyArbitrageur`] is a complete borrower: it borrows one side of a
//! pair against the wrapped native token, sells it on the legacy exchange,
//! repays the pair the minimum it requires and sends the rest to the caller.

use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, U256};
use tracing::info;

use crate::chain::Chain;
use crate::errors::{AmmError, AmmResult};
use crate::path::SwapPath;

/// What the pair tells the borrower when it calls back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashContext {
    /// Pair that lent the outputs and will verify repayment
    pub pair: Address,
    /// Caller of the swap
    pub sender: Address,
    pub amount0_out: U256,
    pub amount1_out: U256,
}

pub trait FlashBorrower {
    /// Account the borrowed outputs were sent to
    fn address(&self) -> Address;

    /// Use the borrowed outputs and repay the pair before returning
    fn on_flash_swap(&mut self, chain: &mut Chain, context: &FlashContext, data: &[u8]) -> AmmResult<()>;
}

/// Encode the minimum the arbitrageur must receive on the legacy exchange
pub fn encode_min_amount(amount: U256) -> Vec<u8> {
    abi::encode(&[Token::Uint(amount)])
}

fn decode_min_amount(data: &[u8]) -> AmmResult<U256> {
    abi::decode(&[ParamType::Uint(256)], data)
        .ok()
        .and_then(|tokens| tokens.into_iter().next())
        .and_then(Token::into_uint)
        .ok_or_else(|| AmmError::FlashCallbackFailed("malformed callback data".to_string()))
}

/// Borrows from a pair and settles through the legacy exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyArbitrageur {
    pub address: Address,
    pub wrapped_native: Address,
}

impl LegacyArbitrageur {
    pub fn deploy(chain: &mut Chain, wrapped_native: Address) -> Self {
        Self {
            address: chain.deploy_address(),
            wrapped_native,
        }
    }
}

impl FlashBorrower for LegacyArbitrageur {
    fn address(&self) -> Address {
        self.address
    }

    fn on_flash_swap(&mut self, chain: &mut Chain, context: &FlashContext, data: &[u8]) -> AmmResult<()> {
        let pair = chain.pair(context.pair)?.clone();
        let (borrowed_token, amount_borrowed) = match (context.amount0_out.is_zero(), context.amount1_out.is_zero()) {
            (true, false) => (pair.token1, context.amount1_out),
            (false, true) => (pair.token0, context.amount0_out),
            _ => {
                return Err(AmmError::FlashCallbackFailed(
                    "exactly one side must be borrowed".to_string(),
                ))
            }
        };
        let repay_token = pair.other_token(borrowed_token)?;
        if borrowed_token != self.wrapped_native && repay_token != self.wrapped_native {
            return Err(AmmError::FlashCallbackFailed(
                "pair does not trade the wrapped native token".to_string(),
            ));
        }

        let token = if borrowed_token == self.wrapped_native {
            repay_token
        } else {
            borrowed_token
        };
        let exchange = chain
            .get_exchange(token)
            .ok_or(AmmError::LegacyExchangeNotFound(token))?;
        let min_received = decode_min_amount(data)?;

        // Pair reserves have not moved yet, so this is what the pair will demand
        let path = SwapPath::new(vec![repay_token, borrowed_token])?;
        let amount_required = chain.get_amounts_in(amount_borrowed, &path)?[0];

        let profit = if borrowed_token == self.wrapped_native {
            chain.withdraw(self.wrapped_native, self.address, amount_borrowed)?;
            let received = chain.native_to_token_swap_input(
                exchange,
                self.address,
                amount_borrowed,
                min_received,
                U256::MAX,
            )?;
            let profit = unprofitable_guard(received, amount_required)?;
            chain.transfer(token, self.address, context.pair, amount_required)?;
            chain.transfer(token, self.address, context.sender, profit)?;
            profit
        } else {
            chain.approve(token, self.address, exchange, amount_borrowed)?;
            let received = chain.token_to_native_swap_input(
                exchange,
                self.address,
                amount_borrowed,
                min_received,
                U256::MAX,
            )?;
            let profit = unprofitable_guard(received, amount_required)?;
            chain.deposit(self.wrapped_native, self.address, amount_required)?;
            chain.transfer(self.wrapped_native, self.address, context.pair, amount_required)?;
            chain.transfer_native(self.address, context.sender, profit)?;
            profit
        };

        info!(
            pair = ?context.pair,
            ?borrowed_token,
            %amount_borrowed,
            %amount_required,
            %profit,
            "Flash arbitrage settled"
        );
        Ok(())
    }
}

fn unprofitable_guard(received: U256, required: U256) -> AmmResult<U256> {
    if received <= required {
        return Err(AmmError::FlashCallbackFailed(format!(
            "received {} but must repay {}",
            received, required
        )));
    }
    Ok(received - required)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_amount_codec() {
        let data = encode_min_amount(U256::from(1));
        assert_eq!(data.len(), 32);
        assert_eq!(decode_min_amount(&data).unwrap(), U256::one());
        assert!(matches!(
            decode_min_amount(&[1, 2, 3]),
            Err(AmmError::FlashCallbackFailed(_))
        ));
    }

    #[test]
    fn test_unprofitable_trade_is_rejected() {
        assert_eq!(unprofitable_guard(U256::from(10), U256::from(4)).unwrap(), U256::from(6));
        assert!(unprofitable_guard(U256::from(4), U256::from(4)).is_err());
    }
}
