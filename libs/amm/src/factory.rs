//! Pair registry
//!
//! Pairs are keyed by their canonical `(token0, token1)` ordering and live at
//! a deterministic address derived from the factory address and the sorted
//! token pair, so any caller can compute where a pair lives without a lookup.

use std::collections::HashMap;

use ethers::types::{Address, H256};
use ethers::utils::{get_create2_address_from_hash, keccak256};
use pairdex_config::protocol::PAIR_INIT_CODE_HASH;
use tracing::info;

use crate::chain::Chain;
use crate::errors::{AmmError, AmmResult};
use crate::events::Event;
use crate::pair::Pair;
use crate::token::TokenState;

#[derive(Debug, Clone)]
pub struct Factory {
    pub address: Address,
    /// Protocol fee recipient; zero disables the protocol fee
    pub fee_to: Address,
    pub fee_to_setter: Address,
    by_tokens: HashMap<(Address, Address), Address>,
    all_pairs: Vec<Address>,
    pairs: HashMap<Address, Pair>,
}

impl Factory {
    pub fn new(address: Address, fee_to_setter: Address) -> Self {
        Self {
            address,
            fee_to: Address::zero(),
            fee_to_setter,
            by_tokens: HashMap::new(),
            all_pairs: Vec::new(),
            pairs: HashMap::new(),
        }
    }

    /// Pair address for an unordered token pair, if created
    pub fn get_pair(&self, token_a: Address, token_b: Address) -> Option<Address> {
        let (token0, token1) = sort_tokens(token_a, token_b).ok()?;
        self.by_tokens.get(&(token0, token1)).copied()
    }

    pub fn all_pairs(&self) -> &[Address] {
        &self.all_pairs
    }

    pub fn all_pairs_length(&self) -> usize {
        self.all_pairs.len()
    }

    pub fn pair(&self, address: Address) -> AmmResult<&Pair> {
        self.pairs.get(&address).ok_or(AmmError::UnknownPair(address))
    }

    pub(crate) fn pair_mut(&mut self, address: Address) -> AmmResult<&mut Pair> {
        self.pairs
            .get_mut(&address)
            .ok_or(AmmError::UnknownPair(address))
    }
}

/// Canonical ordering of two token addresses
pub fn sort_tokens(token_a: Address, token_b: Address) -> AmmResult<(Address, Address)> {
    if token_a == token_b {
        return Err(AmmError::IdenticalAddresses);
    }
    let (token0, token1) = if token_a < token_b {
        (token_a, token_b)
    } else {
        (token_b, token_a)
    };
    if token0.is_zero() {
        return Err(AmmError::ZeroAddress);
    }
    Ok((token0, token1))
}

/// Deterministic pair address, computed without touching any state
pub fn pair_for(factory: Address, token_a: Address, token_b: Address) -> AmmResult<Address> {
    let (token0, token1) = sort_tokens(token_a, token_b)?;
    let mut packed = [0u8; 40];
    packed[..20].copy_from_slice(token0.as_bytes());
    packed[20..].copy_from_slice(token1.as_bytes());
    let salt = keccak256(packed);
    Ok(get_create2_address_from_hash(
        factory,
        salt,
        H256::from(PAIR_INIT_CODE_HASH),
    ))
}

impl Chain {
    pub fn factory(&self) -> &Factory {
        &self.factory
    }

    pub fn pair(&self, address: Address) -> AmmResult<&Pair> {
        self.factory.pair(address)
    }

    pub(crate) fn pair_mut(&mut self, address: Address) -> AmmResult<&mut Pair> {
        self.factory.pair_mut(address)
    }

    pub fn get_pair(&self, token_a: Address, token_b: Address) -> Option<Address> {
        self.factory.get_pair(token_a, token_b)
    }

    /// Pair for the token pair, failing with [`AmmError::PairNotFound`] when absent
    pub fn require_pair(&self, token_a: Address, token_b: Address) -> AmmResult<Address> {
        self.get_pair(token_a, token_b)
            .ok_or(AmmError::PairNotFound { token_a, token_b })
    }

    /// Create the pair for an unordered token pair
    ///
    /// Idempotent: when the pair exists its address is returned unchanged.
    pub fn create_pair(&mut self, token_a: Address, token_b: Address) -> AmmResult<Address> {
        let (token0, token1) = sort_tokens(token_a, token_b)?;
        if let Some(existing) = self.factory.by_tokens.get(&(token0, token1)) {
            return Ok(*existing);
        }

        let address = pair_for(self.factory.address, token0, token1)?;
        let fee_bps = self.default_fee_bps();
        let metadata = self.liquidity_token_config().clone();

        self.tokens.insert(
            address,
            TokenState::new(metadata.name, metadata.symbol, metadata.decimals),
        );
        self.factory
            .pairs
            .insert(address, Pair::new(address, token0, token1, fee_bps));
        self.factory.by_tokens.insert((token0, token1), address);
        self.factory.all_pairs.push(address);

        let index = self.factory.all_pairs.len() as u64;
        let factory = self.factory.address;
        self.emit(
            factory,
            Event::PairCreated {
                token0,
                token1,
                pair: address,
                index,
            },
        );
        info!(?token0, ?token1, pair = ?address, fee_bps, "Pair created");
        Ok(address)
    }

    pub fn set_fee_to(&mut self, caller: Address, fee_to: Address) -> AmmResult<()> {
        if caller != self.factory.fee_to_setter {
            return Err(AmmError::Forbidden);
        }
        self.factory.fee_to = fee_to;
        info!(?fee_to, "Protocol fee recipient updated");
        Ok(())
    }

    pub fn set_fee_to_setter(&mut self, caller: Address, fee_to_setter: Address) -> AmmResult<()> {
        if caller != self.factory.fee_to_setter {
            return Err(AmmError::Forbidden);
        }
        self.factory.fee_to_setter = fee_to_setter;
        info!(?fee_to_setter, "Protocol fee setter updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::U256;

    fn account(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    #[test]
    fn test_sort_tokens() {
        assert_eq!(sort_tokens(account(2), account(1)).unwrap(), (account(1), account(2)));
        assert_eq!(sort_tokens(account(1), account(1)), Err(AmmError::IdenticalAddresses));
        assert_eq!(sort_tokens(Address::zero(), account(1)), Err(AmmError::ZeroAddress));
    }

    #[test]
    fn test_pair_for_is_order_independent() {
        let factory: Address = "0x5C69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f".parse().unwrap();
        let token_a: Address = "0x1000000000000000000000000000000000000000".parse().unwrap();
        let token_b: Address = "0x2000000000000000000000000000000000000000".parse().unwrap();

        let forward = pair_for(factory, token_a, token_b).unwrap();
        let reverse = pair_for(factory, token_b, token_a).unwrap();
        assert_eq!(forward, reverse);
        assert_ne!(forward, factory);
    }

    #[test]
    fn test_create_pair_is_idempotent() {
        let mut chain = Chain::new(account(1));
        let a = chain.deploy_token("A", "A", 18, U256::zero(), account(1)).unwrap();
        let b = chain.deploy_token("B", "B", 18, U256::zero(), account(1)).unwrap();

        let mark = chain.event_count();
        let pair = chain.create_pair(a, b).unwrap();
        assert_eq!(chain.create_pair(b, a).unwrap(), pair);
        assert_eq!(chain.factory().all_pairs_length(), 1);
        assert_eq!(chain.events_since(mark).len(), 1);
        assert_eq!(pair, pair_for(chain.factory().address, a, b).unwrap());

        let state = chain.pair(pair).unwrap();
        assert!(state.token0 < state.token1);
        assert_eq!(chain.token(pair).unwrap().symbol, "PDX-V2");
    }

    #[test]
    fn test_fee_switch_requires_setter() {
        let mut chain = Chain::new(account(1));
        assert_eq!(chain.set_fee_to(account(2), account(3)), Err(AmmError::Forbidden));
        chain.set_fee_to(account(1), account(3)).unwrap();
        assert_eq!(chain.factory().fee_to, account(3));

        chain.set_fee_to_setter(account(1), account(2)).unwrap();
        assert_eq!(chain.set_fee_to(account(1), account(4)), Err(AmmError::Forbidden));
    }
}
