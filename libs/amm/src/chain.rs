//! Serialized ledger context
//!
//! [`Chain`] owns every piece of mutable engine state: token balances and
//! allowances, native balances, the pair registry, legacy exchanges, the
//! event log and the block clock. Calls execute one at a time against an
//! exclusive borrow, and every top-level operation runs inside
//! [`Chain::transact`] so a failure anywhere leaves no partial effect.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use ethers::types::{Address, U256};
use ethers::utils::get_contract_address;
use pairdex_config::{AmmConfig, LiquidityTokenConfig};
use tracing::{debug, warn};

use crate::errors::{AmmError, AmmResult};
use crate::events::{Event, LoggedEvent};
use crate::factory::Factory;
use crate::legacy::LegacyFactory;
use crate::math;
use crate::permit::{EcdsaVerifier, SignatureVerifier};
use crate::token::TokenLedger;

/// Block timestamp the clock starts from
pub const GENESIS_TIMESTAMP: u64 = 1_600_000_000;

#[derive(Clone)]
pub struct Chain {
    chain_id: u64,
    default_fee_bps: u32,
    liquidity_token: LiquidityTokenConfig,
    timestamp: u64,
    deployer: Address,
    deploy_nonce: u64,
    native: HashMap<Address, U256>,
    pub(crate) tokens: TokenLedger,
    pub(crate) factory: Factory,
    pub(crate) legacy: LegacyFactory,
    events: Vec<LoggedEvent>,
    verifier: Arc<dyn SignatureVerifier + Send + Sync>,
}

impl Chain {
    /// Engine with default settings; `fee_to_setter` controls the protocol fee switch
    pub fn new(fee_to_setter: Address) -> Self {
        let config = AmmConfig::default();
        Self::build(&config, fee_to_setter)
    }

    /// Engine configured from a loaded [`AmmConfig`]
    pub fn from_config(config: &AmmConfig) -> AmmResult<Self> {
        let fee_to_setter = parse_address(config.fee_to_setter.as_deref())?;
        let fee_to = parse_address(config.fee_to.as_deref())?;

        let mut chain = Self::build(config, fee_to_setter);
        chain.factory.fee_to = fee_to;
        Ok(chain)
    }

    fn build(config: &AmmConfig, fee_to_setter: Address) -> Self {
        let deployer = Address::from_low_u64_be(0xd3_9107);
        let factory_address = get_contract_address(deployer, 0u64);
        let legacy_address = get_contract_address(deployer, 1u64);

        debug!(
            chain_id = config.chain_id,
            fee_bps = config.fee_bps,
            ?factory_address,
            "Engine initialized"
        );

        Self {
            chain_id: config.chain_id,
            default_fee_bps: config.fee_bps,
            liquidity_token: config.liquidity_token.clone(),
            timestamp: GENESIS_TIMESTAMP,
            deployer,
            deploy_nonce: 2,
            native: HashMap::new(),
            tokens: TokenLedger::default(),
            factory: Factory::new(factory_address, fee_to_setter),
            legacy: LegacyFactory::new(legacy_address),
            events: Vec::new(),
            verifier: Arc::new(EcdsaVerifier),
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Swap fee applied to pairs created from now on
    pub fn default_fee_bps(&self) -> u32 {
        self.default_fee_bps
    }

    pub fn liquidity_token_config(&self) -> &LiquidityTokenConfig {
        &self.liquidity_token
    }

    /// Replace the permit signature verifier
    pub fn set_verifier(&mut self, verifier: Arc<dyn SignatureVerifier + Send + Sync>) {
        self.verifier = verifier;
    }

    pub(crate) fn verifier(&self) -> Arc<dyn SignatureVerifier + Send + Sync> {
        Arc::clone(&self.verifier)
    }

    // Clock

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = timestamp;
    }

    pub fn advance_time(&mut self, seconds: u64) {
        self.timestamp = self.timestamp.saturating_add(seconds);
    }

    /// Fails with [`AmmError::DeadlineExpired`] once the clock is past `deadline`
    pub fn ensure_deadline(&self, deadline: U256) -> AmmResult<()> {
        if deadline < U256::from(self.timestamp) {
            return Err(AmmError::DeadlineExpired);
        }
        Ok(())
    }

    /// Fresh deterministic address for a newly deployed entity
    pub fn deploy_address(&mut self) -> Address {
        let address = get_contract_address(self.deployer, self.deploy_nonce);
        self.deploy_nonce += 1;
        address
    }

    // Native asset

    pub fn native_balance(&self, account: Address) -> U256 {
        self.native.get(&account).copied().unwrap_or_default()
    }

    /// Create native units out of thin air (genesis allocation)
    pub fn fund_native(&mut self, account: Address, amount: U256) -> AmmResult<()> {
        let balance = self.native.entry(account).or_default();
        *balance = math::add(*balance, amount)?;
        Ok(())
    }

    pub fn transfer_native(&mut self, from: Address, to: Address, amount: U256) -> AmmResult<()> {
        let from_balance = self.native_balance(from);
        if from_balance < amount {
            return Err(AmmError::InsufficientNativeBalance(from));
        }
        self.native.insert(from, from_balance - amount);
        let to_balance = self.native.entry(to).or_default();
        *to_balance = math::add(*to_balance, amount)?;
        Ok(())
    }

    // Events

    pub(crate) fn emit(&mut self, emitter: Address, event: Event) {
        self.events.push(LoggedEvent::new(emitter, event));
    }

    pub fn events(&self) -> &[LoggedEvent] {
        &self.events
    }

    /// Number of events emitted so far; pass to [`Chain::events_since`]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn events_since(&self, mark: usize) -> &[LoggedEvent] {
        self.events.get(mark..).unwrap_or(&[])
    }

    /// Run `operation` atomically
    ///
    /// On error every change made by `operation` is discarded, emitted events
    /// included, and the error is returned unchanged. Nested calls roll back
    /// only their own part unless the outer call fails too.
    pub fn transact<T, F>(&mut self, operation: F) -> AmmResult<T>
    where
        F: FnOnce(&mut Chain) -> AmmResult<T>,
    {
        let snapshot = LedgerSnapshot::capture(self);
        match operation(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!(code = err.code(), "Rolling back failed call: {}", err);
                snapshot.restore(self);
                Err(err)
            }
        }
    }
}

/// Mutable ledger state taken on entry to [`Chain::transact`]
///
/// The event log is append-only, so only its length is recorded.
struct LedgerSnapshot {
    timestamp: u64,
    deploy_nonce: u64,
    native: HashMap<Address, U256>,
    tokens: TokenLedger,
    factory: Factory,
    legacy: LegacyFactory,
    event_count: usize,
}

impl LedgerSnapshot {
    fn capture(chain: &Chain) -> Self {
        Self {
            timestamp: chain.timestamp,
            deploy_nonce: chain.deploy_nonce,
            native: chain.native.clone(),
            tokens: chain.tokens.clone(),
            factory: chain.factory.clone(),
            legacy: chain.legacy.clone(),
            event_count: chain.events.len(),
        }
    }

    fn restore(self, chain: &mut Chain) {
        chain.timestamp = self.timestamp;
        chain.deploy_nonce = self.deploy_nonce;
        chain.native = self.native;
        chain.tokens = self.tokens;
        chain.factory = self.factory;
        chain.legacy = self.legacy;
        chain.events.truncate(self.event_count);
    }
}

fn parse_address(value: Option<&str>) -> AmmResult<Address> {
    match value {
        None => Ok(Address::zero()),
        Some(raw) => Address::from_str(raw)
            .map_err(|e| AmmError::InvalidConfig(format!("'{}': {}", raw, e))),
    }
}
