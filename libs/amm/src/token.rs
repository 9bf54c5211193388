//! Fungible token ledger
//!
//! One ledger holds every fungible balance in the engine: plain tokens, the
//! wrapped native token, pair liquidity shares and legacy exchange shares.
//! Tokens may charge a transfer fee (in basis points) that is burned on every
//! transfer; pairs and the router must cope with receiving less than was sent.

use std::collections::HashMap;

use ethers::types::{Address, U256};
use pairdex_config::protocol::BPS_DENOMINATOR;

use crate::chain::Chain;
use crate::errors::{AmmError, AmmResult};
use crate::events::Event;
use crate::math;

/// Per-account token position
///
/// The permit nonce lives next to the balance it protects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenAccount {
    pub balance: U256,
    pub nonce: U256,
}

#[derive(Debug, Clone)]
pub struct TokenState {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: U256,
    /// Share of every transfer burned in transit
    pub transfer_fee_bps: u32,
    accounts: HashMap<Address, TokenAccount>,
    allowances: HashMap<(Address, Address), U256>,
}

impl TokenState {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            decimals,
            total_supply: U256::zero(),
            transfer_fee_bps: 0,
            accounts: HashMap::new(),
            allowances: HashMap::new(),
        }
    }

    pub fn with_transfer_fee(mut self, fee_bps: u32) -> Self {
        self.transfer_fee_bps = fee_bps;
        self
    }

    pub fn account(&self, owner: Address) -> TokenAccount {
        self.accounts.get(&owner).cloned().unwrap_or_default()
    }

    pub fn balance_of(&self, owner: Address) -> U256 {
        self.accounts
            .get(&owner)
            .map(|a| a.balance)
            .unwrap_or_default()
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default()
    }

    fn account_mut(&mut self, owner: Address) -> &mut TokenAccount {
        self.accounts.entry(owner).or_default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TokenLedger {
    tokens: HashMap<Address, TokenState>,
}

impl TokenLedger {
    pub fn contains(&self, token: Address) -> bool {
        self.tokens.contains_key(&token)
    }

    pub fn get(&self, token: Address) -> AmmResult<&TokenState> {
        self.tokens.get(&token).ok_or(AmmError::UnknownToken(token))
    }

    pub(crate) fn get_mut(&mut self, token: Address) -> AmmResult<&mut TokenState> {
        self.tokens
            .get_mut(&token)
            .ok_or(AmmError::UnknownToken(token))
    }

    pub(crate) fn insert(&mut self, token: Address, state: TokenState) {
        self.tokens.insert(token, state);
    }
}

impl Chain {
    /// Deploy a token and credit `initial_supply` to `holder`
    pub fn deploy_token(
        &mut self,
        name: &str,
        symbol: &str,
        decimals: u8,
        initial_supply: U256,
        holder: Address,
    ) -> AmmResult<Address> {
        self.deploy_token_with_state(TokenState::new(name, symbol, decimals), initial_supply, holder)
    }

    /// Deploy a token that burns `transfer_fee_bps` of every transfer
    pub fn deploy_fee_on_transfer_token(
        &mut self,
        name: &str,
        symbol: &str,
        decimals: u8,
        initial_supply: U256,
        holder: Address,
        transfer_fee_bps: u32,
    ) -> AmmResult<Address> {
        if transfer_fee_bps >= BPS_DENOMINATOR {
            return Err(AmmError::InvalidConfig(format!(
                "transfer fee {} bps is not below {}",
                transfer_fee_bps, BPS_DENOMINATOR
            )));
        }
        let state = TokenState::new(name, symbol, decimals).with_transfer_fee(transfer_fee_bps);
        self.deploy_token_with_state(state, initial_supply, holder)
    }

    fn deploy_token_with_state(
        &mut self,
        state: TokenState,
        initial_supply: U256,
        holder: Address,
    ) -> AmmResult<Address> {
        let address = self.deploy_address();
        self.tokens.insert(address, state);
        if !initial_supply.is_zero() {
            self.mint_tokens(address, holder, initial_supply)?;
        }
        Ok(address)
    }

    pub fn token(&self, token: Address) -> AmmResult<&TokenState> {
        self.tokens.get(token)
    }

    /// Balance of `owner`; zero for unknown tokens
    pub fn balance_of(&self, token: Address, owner: Address) -> U256 {
        self.tokens
            .get(token)
            .map(|t| t.balance_of(owner))
            .unwrap_or_default()
    }

    pub fn total_supply(&self, token: Address) -> U256 {
        self.tokens
            .get(token)
            .map(|t| t.total_supply)
            .unwrap_or_default()
    }

    pub fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256 {
        self.tokens
            .get(token)
            .map(|t| t.allowance(owner, spender))
            .unwrap_or_default()
    }

    /// Next permit nonce of `owner`
    pub fn nonce(&self, token: Address, owner: Address) -> U256 {
        self.tokens
            .get(token)
            .map(|t| t.account(owner).nonce)
            .unwrap_or_default()
    }

    pub fn approve(
        &mut self,
        token: Address,
        owner: Address,
        spender: Address,
        value: U256,
    ) -> AmmResult<()> {
        self.tokens
            .get_mut(token)?
            .allowances
            .insert((owner, spender), value);
        self.emit(token, Event::Approval { owner, spender, value });
        Ok(())
    }

    /// Move `value` from `from` to `to`
    ///
    /// For fee-on-transfer tokens `to` receives `value` minus the fee and the
    /// fee is burned.
    pub fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        value: U256,
    ) -> AmmResult<()> {
        let state = self.tokens.get_mut(token)?;
        let from_balance = state.balance_of(from);
        if from_balance < value {
            return Err(AmmError::InsufficientBalance { token, account: from });
        }

        let fee = math::mul(value, U256::from(state.transfer_fee_bps))? / BPS_DENOMINATOR;
        let received = value - fee;

        state.account_mut(from).balance = from_balance - value;
        let to_account = state.account_mut(to);
        to_account.balance = math::add(to_account.balance, received)?;
        state.total_supply = math::sub(state.total_supply, fee)?;

        self.emit(token, Event::Transfer { from, to, value: received });
        if !fee.is_zero() {
            self.emit(
                token,
                Event::Transfer {
                    from,
                    to: Address::zero(),
                    value: fee,
                },
            );
        }
        Ok(())
    }

    /// Move `value` from `from` to `to` on behalf of `spender`
    ///
    /// An allowance of `U256::MAX` is treated as infinite and never decremented.
    pub fn transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        value: U256,
    ) -> AmmResult<()> {
        let state = self.tokens.get_mut(token)?;
        let allowance = state.allowance(from, spender);
        if allowance < value {
            return Err(AmmError::InsufficientAllowance {
                token,
                owner: from,
                spender,
            });
        }
        let balance = state.balance_of(from);
        if balance < value {
            return Err(AmmError::InsufficientBalance { token, account: from });
        }
        if allowance != U256::MAX {
            state.allowances.insert((from, spender), allowance - value);
        }
        self.transfer(token, from, to, value)
    }

    pub(crate) fn mint_tokens(&mut self, token: Address, to: Address, value: U256) -> AmmResult<()> {
        self.increase_supply(token, to, value)?;
        self.emit(
            token,
            Event::Transfer {
                from: Address::zero(),
                to,
                value,
            },
        );
        Ok(())
    }

    pub(crate) fn burn_tokens(&mut self, token: Address, from: Address, value: U256) -> AmmResult<()> {
        self.decrease_supply(token, from, value)?;
        self.emit(
            token,
            Event::Transfer {
                from,
                to: Address::zero(),
                value,
            },
        );
        Ok(())
    }

    /// Supply change without a Transfer record
    pub(crate) fn increase_supply(&mut self, token: Address, to: Address, value: U256) -> AmmResult<()> {
        let state = self.tokens.get_mut(token)?;
        state.total_supply = math::add(state.total_supply, value)?;
        let account = state.account_mut(to);
        account.balance = math::add(account.balance, value)?;
        Ok(())
    }

    pub(crate) fn decrease_supply(&mut self, token: Address, from: Address, value: U256) -> AmmResult<()> {
        let state = self.tokens.get_mut(token)?;
        let balance = state.balance_of(from);
        if balance < value {
            return Err(AmmError::InsufficientBalance { token, account: from });
        }
        state.account_mut(from).balance = balance - value;
        state.total_supply = math::sub(state.total_supply, value)?;
        Ok(())
    }

    /// Consume the current permit nonce of `owner`, returning it
    pub(crate) fn use_nonce(&mut self, token: Address, owner: Address) -> AmmResult<U256> {
        let account = self.tokens.get_mut(token)?.account_mut(owner);
        let current = account.nonce;
        account.nonce = math::add(current, U256::one())?;
        Ok(current)
    }
}
