//! Multi-hop swap paths
//!
//! A [`SwapPath`] is validated on construction and every hop is resolved to
//! its pair before any reserve is read. Amounts are then folded hop by hop
//! against the reserves current at call time.

use ethers::types::{Address, U256};

use crate::chain::Chain;
use crate::errors::{AmmError, AmmResult};
use crate::pool_traits::AmmPool;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapPath {
    tokens: Vec<Address>,
}

impl SwapPath {
    /// Build a path of at least two tokens with no zero address and no hop onto itself
    pub fn new(tokens: impl Into<Vec<Address>>) -> AmmResult<Self> {
        let tokens = tokens.into();
        if tokens.len() < 2 {
            return Err(AmmError::InvalidPath);
        }
        if tokens.iter().any(Address::is_zero) {
            return Err(AmmError::ZeroAddress);
        }
        if tokens.windows(2).any(|hop| hop[0] == hop[1]) {
            return Err(AmmError::IdenticalAddresses);
        }
        Ok(Self { tokens })
    }

    pub fn tokens(&self) -> &[Address] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn first(&self) -> Address {
        self.tokens[0]
    }

    pub fn last(&self) -> Address {
        self.tokens[self.tokens.len() - 1]
    }

    /// `(token_in, token_out)` for every hop, left to right
    pub fn hops(
        &self,
    ) -> impl DoubleEndedIterator<Item = (Address, Address)> + ExactSizeIterator + '_ {
        self.tokens.windows(2).map(|hop| (hop[0], hop[1]))
    }

    /// Pair address of every hop; fails on the first hop without a pair
    pub fn resolve(&self, chain: &Chain) -> AmmResult<Vec<Address>> {
        self.hops()
            .map(|(token_in, token_out)| chain.require_pair(token_in, token_out))
            .collect()
    }
}

impl Chain {
    /// Amounts received at each step when selling `amount_in` of the first token
    pub fn get_amounts_out(&self, amount_in: U256, path: &SwapPath) -> AmmResult<Vec<U256>> {
        let pairs = path.resolve(self)?;
        path.hops().zip(pairs).try_fold(
            vec![amount_in],
            |mut amounts, ((token_in, _), pair)| {
                let pool = self.pair(pair)?.pool_state(token_in)?;
                let last = amounts[amounts.len() - 1];
                amounts.push(pool.get_amount_out(last)?);
                Ok(amounts)
            },
        )
    }

    /// Amounts required at each step to receive exactly `amount_out` of the last token
    pub fn get_amounts_in(&self, amount_out: U256, path: &SwapPath) -> AmmResult<Vec<U256>> {
        let pairs = path.resolve(self)?;
        let mut amounts = path.hops().zip(pairs).rev().try_fold(
            vec![amount_out],
            |mut amounts, ((token_in, _), pair)| {
                let pool = self.pair(pair)?.pool_state(token_in)?;
                let last = amounts[amounts.len() - 1];
                amounts.push(pool.get_amount_in(last)?);
                Ok::<_, AmmError>(amounts)
            },
        )?;
        amounts.reverse();
        Ok(amounts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    #[test]
    fn test_path_validation() {
        assert_eq!(SwapPath::new(vec![account(1)]), Err(AmmError::InvalidPath));
        assert_eq!(
            SwapPath::new(vec![account(1), account(1)]),
            Err(AmmError::IdenticalAddresses)
        );
        assert_eq!(
            SwapPath::new(vec![account(1), Address::zero()]),
            Err(AmmError::ZeroAddress)
        );

        let path = SwapPath::new(vec![account(1), account(2), account(1)]).unwrap();
        let hops: Vec<_> = path.hops().collect();
        assert_eq!(hops, vec![(account(1), account(2)), (account(2), account(1))]);
        assert_eq!(path.last(), account(1));
    }

    #[test]
    fn test_unresolved_hop_fails_before_quoting() {
        let mut chain = Chain::new(account(1));
        let a = chain.deploy_token("A", "A", 18, U256::exp10(24), account(1)).unwrap();
        let b = chain.deploy_token("B", "B", 18, U256::exp10(24), account(1)).unwrap();
        let c = chain.deploy_token("C", "C", 18, U256::exp10(24), account(1)).unwrap();
        chain.create_pair(a, b).unwrap();

        let path = SwapPath::new(vec![a, b, c]).unwrap();
        let err = chain.get_amounts_out(U256::one(), &path).unwrap_err();
        assert_eq!(err, AmmError::PairNotFound { token_a: b, token_b: c });
    }

    #[test]
    fn test_multi_hop_folds() {
        let wallet = account(1);
        let mut chain = Chain::new(wallet);
        let e18 = U256::exp10(18);
        let a = chain.deploy_token("A", "A", 18, e18 * 1000, wallet).unwrap();
        let b = chain.deploy_token("B", "B", 18, e18 * 1000, wallet).unwrap();
        let c = chain.deploy_token("C", "C", 18, e18 * 1000, wallet).unwrap();
        for (x, y) in [(a, b), (b, c)] {
            let pair = chain.create_pair(x, y).unwrap();
            chain.transfer(x, wallet, pair, e18 * 100).unwrap();
            chain.transfer(y, wallet, pair, e18 * 100).unwrap();
            chain.mint(pair, wallet, wallet).unwrap();
        }

        let path = SwapPath::new(vec![a, b, c]).unwrap();
        let out = chain.get_amounts_out(e18, &path).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], e18);
        assert!(out[2] < out[1] && out[1] < out[0]);

        let back = chain.get_amounts_in(out[2], &path).unwrap();
        assert_eq!(back[2], out[2]);
        assert!(back[0] <= out[0]);
    }
}
