//! Wrapped native asset
//!
//! A token whose supply is backed 1:1 by native units held in the wrapper's
//! own native balance. Deposits mint, withdrawals burn.

use ethers::types::{Address, U256};
use tracing::debug;

use crate::chain::Chain;
use crate::errors::AmmResult;
use crate::events::Event;
use crate::token::TokenState;

impl Chain {
    /// Deploy a wrapper token for the native asset
    pub fn deploy_wrapped_native(&mut self, name: &str, symbol: &str) -> Address {
        let address = self.deploy_address();
        self.tokens.insert(address, TokenState::new(name, symbol, 18));
        address
    }

    /// Lock `amount` native units from `sender` and credit the same amount of wrapped tokens
    pub fn deposit(&mut self, wrapper: Address, sender: Address, amount: U256) -> AmmResult<()> {
        self.transact(|chain| {
            chain.token(wrapper)?;
            chain.transfer_native(sender, wrapper, amount)?;
            chain.increase_supply(wrapper, sender, amount)?;
            chain.emit(wrapper, Event::Deposit { dst: sender, amount });
            debug!(?wrapper, ?sender, %amount, "Native deposited");
            Ok(())
        })
    }

    /// Burn `amount` wrapped tokens from `sender` and release the native units
    pub fn withdraw(&mut self, wrapper: Address, sender: Address, amount: U256) -> AmmResult<()> {
        self.transact(|chain| {
            chain.decrease_supply(wrapper, sender, amount)?;
            chain.transfer_native(wrapper, sender, amount)?;
            chain.emit(wrapper, Event::Withdrawal { src: sender, amount });
            debug!(?wrapper, ?sender, %amount, "Native withdrawn");
            Ok(())
        })
    }

    /// Wrapped supply is never larger than the native custody backing it
    pub fn is_fully_backed(&self, wrapper: Address) -> bool {
        self.total_supply(wrapper) <= self.native_balance(wrapper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AmmError;

    fn account(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    #[test]
    fn test_deposit_withdraw_round_trip() {
        let mut chain = Chain::new(account(1));
        let wrapper = chain.deploy_wrapped_native("Wrapped Native", "WNAT");
        chain.fund_native(account(2), U256::from(1_000)).unwrap();

        chain.deposit(wrapper, account(2), U256::from(700)).unwrap();
        assert_eq!(chain.balance_of(wrapper, account(2)), U256::from(700));
        assert_eq!(chain.native_balance(account(2)), U256::from(300));
        assert_eq!(chain.native_balance(wrapper), U256::from(700));
        assert!(chain.is_fully_backed(wrapper));
        assert_eq!(
            chain.events().last().map(|e| &e.event),
            Some(&Event::Deposit {
                dst: account(2),
                amount: U256::from(700)
            })
        );

        chain.withdraw(wrapper, account(2), U256::from(200)).unwrap();
        assert_eq!(chain.balance_of(wrapper, account(2)), U256::from(500));
        assert_eq!(chain.native_balance(account(2)), U256::from(500));
        assert!(chain.is_fully_backed(wrapper));
    }

    #[test]
    fn test_withdraw_more_than_balance_fails() {
        let mut chain = Chain::new(account(1));
        let wrapper = chain.deploy_wrapped_native("Wrapped Native", "WNAT");
        chain.fund_native(account(2), U256::from(10)).unwrap();
        chain.deposit(wrapper, account(2), U256::from(10)).unwrap();

        let err = chain.withdraw(wrapper, account(2), U256::from(11)).unwrap_err();
        assert!(matches!(err, AmmError::InsufficientBalance { .. }));
        assert_eq!(chain.native_balance(wrapper), U256::from(10));
    }
}
