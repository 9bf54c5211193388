//! Legacy liquidity migration
//!
//! Moves a provider's whole legacy exchange position into the matching
//! wrapped-native pair in one atomic call. The caller must have approved the
//! migrator for their legacy shares.

use ethers::types::{Address, U256};
use tracing::info;

use crate::chain::Chain;
use crate::errors::{AmmError, AmmResult};
use crate::router::{LiquidityAdded, Router};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migrator {
    pub address: Address,
    pub router: Router,
}

impl Migrator {
    pub fn deploy(chain: &mut Chain, router: Router) -> Self {
        let address = chain.deploy_address();
        info!(migrator = ?address, router = ?router.address, "Migrator deployed");
        Self { address, router }
    }

    /// Withdraw the caller's legacy position for `token` and deposit it through the router
    ///
    /// Whatever the pair does not take is returned to the caller, in tokens
    /// or in native units depending on which side was in excess.
    #[allow(clippy::too_many_arguments)]
    pub fn migrate(
        &self,
        chain: &mut Chain,
        caller: Address,
        token: Address,
        amount_token_min: U256,
        amount_native_min: U256,
        to: Address,
        deadline: U256,
    ) -> AmmResult<LiquidityAdded> {
        chain.transact(|chain| {
            let exchange = chain
                .get_exchange(token)
                .ok_or(AmmError::LegacyExchangeNotFound(token))?;
            let shares = chain.balance_of(exchange, caller);
            chain.transfer_from(exchange, self.address, caller, self.address, shares)?;
            let (amount_native, amount_token) = chain.legacy_remove_liquidity(
                exchange,
                self.address,
                shares,
                U256::one(),
                U256::one(),
                U256::MAX,
            )?;

            chain.approve(token, self.address, self.router.address, amount_token)?;
            let added = self.router.add_liquidity_native(
                chain,
                self.address,
                amount_native,
                token,
                amount_token,
                amount_token_min,
                amount_native_min,
                to,
                deadline,
            )?;

            if amount_token > added.amount_a {
                chain.approve(token, self.address, self.router.address, U256::zero())?;
                chain.transfer(token, self.address, caller, amount_token - added.amount_a)?;
            } else if amount_native > added.amount_b {
                chain.transfer_native(self.address, caller, amount_native - added.amount_b)?;
            }

            info!(
                ?exchange,
                ?token,
                %shares,
                amount_token = %added.amount_a,
                amount_native = %added.amount_b,
                liquidity = %added.liquidity,
                "Legacy position migrated"
            );
            Ok(added)
        })
    }
}
