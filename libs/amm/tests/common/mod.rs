//! Common Test Utilities for the AMM engine
//!
//! Deploys the standard set of contracts every integration suite starts
//! from: two plain tokens with their pair, a wrapped native token, a partner
//! token paired against it, the partner's legacy exchange, a router and a
//! migrator.

#![allow(dead_code)]

use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, H256, U256};
use pairdex_amm::{sort_tokens, Chain, Migrator, PermitSignature, Router};

/// Well-known development key; never holds real funds
const WALLET_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

pub fn e18(n: u64) -> U256 {
    U256::from(n) * U256::exp10(18)
}

pub fn account(n: u64) -> Address {
    Address::from_low_u64_be(n)
}

pub struct Fixture {
    pub chain: Chain,
    pub signer: LocalWallet,
    pub wallet: Address,
    pub token0: Address,
    pub token1: Address,
    pub pair: Address,
    pub wrapped: Address,
    pub partner: Address,
    pub native_pair: Address,
    pub exchange: Address,
    pub router: Router,
    pub migrator: Migrator,
}

/// Route engine logs to the test harness; `RUST_LOG` overrides the default
pub fn init_test_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pairdex_amm=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

impl Fixture {
    pub fn new() -> Self {
        init_test_logging();
        let signer: LocalWallet = WALLET_KEY.parse().expect("valid key");
        let wallet = signer.address();
        let mut chain = Chain::new(wallet);

        let token_a = chain
            .deploy_token("Token A", "TKA", 18, e18(10_000), wallet)
            .unwrap();
        let token_b = chain
            .deploy_token("Token B", "TKB", 18, e18(10_000), wallet)
            .unwrap();
        let wrapped = chain.deploy_wrapped_native("Wrapped Native", "WNAT");
        let partner = chain
            .deploy_token("Partner", "PRT", 18, e18(10_000), wallet)
            .unwrap();
        chain.fund_native(wallet, e18(100_000)).unwrap();

        let exchange = chain.create_exchange(partner).unwrap();
        let router = Router::deploy(&mut chain, wrapped);
        let migrator = Migrator::deploy(&mut chain, router);

        let pair = chain.create_pair(token_a, token_b).unwrap();
        let native_pair = chain.create_pair(partner, wrapped).unwrap();
        let (token0, token1) = sort_tokens(token_a, token_b).unwrap();

        for token in [token0, token1, partner, wrapped] {
            chain.approve(token, wallet, router.address, U256::MAX).unwrap();
        }

        Self {
            chain,
            signer,
            wallet,
            token0,
            token1,
            pair,
            wrapped,
            partner,
            native_pair,
            exchange,
            router,
            migrator,
        }
    }

    pub fn deadline(&self) -> U256 {
        U256::from(self.chain.timestamp() + 600)
    }

    /// Seed the token0/token1 pair directly through the pair primitives
    pub fn add_liquidity(&mut self, amount0: U256, amount1: U256) -> U256 {
        let (wallet, pair) = (self.wallet, self.pair);
        self.chain.transfer(self.token0, wallet, pair, amount0).unwrap();
        self.chain.transfer(self.token1, wallet, pair, amount1).unwrap();
        self.chain.mint(pair, wallet, wallet).unwrap()
    }

    /// Seed the partner/wrapped pair, wrapping `native_amount` from the wallet
    pub fn add_native_liquidity(&mut self, partner_amount: U256, native_amount: U256) -> U256 {
        let (wallet, pair) = (self.wallet, self.native_pair);
        self.chain.transfer(self.partner, wallet, pair, partner_amount).unwrap();
        self.chain.deposit(self.wrapped, wallet, native_amount).unwrap();
        self.chain.transfer(self.wrapped, wallet, pair, native_amount).unwrap();
        self.chain.mint(pair, wallet, wallet).unwrap()
    }

    /// Seed the partner's legacy exchange
    pub fn add_legacy_liquidity(&mut self, partner_amount: U256, native_amount: U256) -> U256 {
        let (wallet, exchange) = (self.wallet, self.exchange);
        self.chain
            .approve(self.partner, wallet, exchange, U256::MAX)
            .unwrap();
        self.chain
            .legacy_add_liquidity(exchange, wallet, native_amount, U256::one(), partner_amount, U256::MAX)
            .unwrap()
    }

    /// Sign a permit for the wallet's shares of `token`
    pub fn sign_permit(&self, token: Address, spender: Address, value: U256, deadline: U256) -> PermitSignature {
        let digest: H256 = self
            .chain
            .permit_digest(token, self.wallet, spender, value, deadline)
            .unwrap();
        self.signer.sign_hash(digest).unwrap().into()
    }
}
