//! State-change records emitted by the engine
//!
//! Every emitted record carries the address of the entity that produced it
//! (pair, token, wrapper, legacy exchange or factory), mirroring how an
//! indexer would see a log.

use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum Event {
    // Fungible tokens, liquidity shares included
    Transfer {
        from: Address,
        to: Address,
        value: U256,
    },
    Approval {
        owner: Address,
        spender: Address,
        value: U256,
    },

    // Pair
    Mint {
        sender: Address,
        amount0: U256,
        amount1: U256,
    },
    Burn {
        sender: Address,
        amount0: U256,
        amount1: U256,
        to: Address,
    },
    Swap {
        sender: Address,
        amount0_in: U256,
        amount1_in: U256,
        amount0_out: U256,
        amount1_out: U256,
        to: Address,
    },
    Sync {
        reserve0: U256,
        reserve1: U256,
    },

    // Native wrapper
    Deposit {
        dst: Address,
        amount: U256,
    },
    Withdrawal {
        src: Address,
        amount: U256,
    },

    // Factory
    PairCreated {
        token0: Address,
        token1: Address,
        pair: Address,
        index: u64,
    },

    // Legacy exchange
    TokenPurchase {
        buyer: Address,
        native_sold: U256,
        tokens_bought: U256,
    },
    NativePurchase {
        buyer: Address,
        tokens_sold: U256,
        native_bought: U256,
    },
    AddLiquidity {
        provider: Address,
        native_amount: U256,
        token_amount: U256,
    },
    RemoveLiquidity {
        provider: Address,
        native_amount: U256,
        token_amount: U256,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Transfer { .. } => "Transfer",
            Event::Approval { .. } => "Approval",
            Event::Mint { .. } => "Mint",
            Event::Burn { .. } => "Burn",
            Event::Swap { .. } => "Swap",
            Event::Sync { .. } => "Sync",
            Event::Deposit { .. } => "Deposit",
            Event::Withdrawal { .. } => "Withdrawal",
            Event::PairCreated { .. } => "PairCreated",
            Event::TokenPurchase { .. } => "TokenPurchase",
            Event::NativePurchase { .. } => "NativePurchase",
            Event::AddLiquidity { .. } => "AddLiquidity",
            Event::RemoveLiquidity { .. } => "RemoveLiquidity",
        }
    }
}

/// An event together with the address that emitted it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedEvent {
    pub emitter: Address,
    #[serde(flatten)]
    pub event: Event,
}

impl LoggedEvent {
    pub fn new(emitter: Address, event: Event) -> Self {
        Self { emitter, event }
    }
}

/// Render events as newline-delimited JSON, one record per line
pub fn to_json_lines(events: &[LoggedEvent]) -> serde_json::Result<String> {
    let mut out = String::new();
    for event in events {
        out.push_str(&serde_json::to_string(event)?);
        out.push('\n');
    }
    Ok(out)
}
