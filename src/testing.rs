//! Scripted collaborators for exercising the fetcher and poll loop
//! without a network.

use std::collections::VecDeque;
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use anyhow::anyhow;
use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::sync::Notify;

use crate::api::{BlockchainRpc, PriceFeed, RawTransaction, SortOrder, TransactionHistory};
use crate::wallet::WalletFetcher;

pub const TRACKED: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
pub const OTHER: &str = "0x2222222222222222222222222222222222222222";

/// A received, 1 ETH history entry.
pub fn raw_tx(timestamp: i64, confirmations: u64) -> RawTransaction {
    RawTransaction {
        timestamp,
        from: OTHER.to_string(),
        to: TRACKED.to_string(),
        value: U256::from(1_000_000_000_000_000_000u128),
        confirmations,
    }
}

#[derive(Default)]
struct ChainState {
    balance: U256,
    price: Decimal,
    history: Vec<RawTransaction>,
    balance_failures: VecDeque<String>,
    history_failures: VecDeque<String>,
    balance_calls: Vec<String>,
    history_requests: Vec<(String, u64, u64, SortOrder)>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<ChainState>,
    balance_gate: Mutex<Option<Arc<Notify>>>,
}

/// Implements all three collaborators from one shared, scriptable state.
#[derive(Clone, Default)]
pub struct FakeChain {
    inner: Arc<Inner>,
}

impl FakeChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fetcher(&self) -> WalletFetcher {
        WalletFetcher::new(
            Arc::new(self.clone()),
            Arc::new(self.clone()),
            Arc::new(self.clone()),
        )
    }

    pub fn set_balance(&self, wei: u128) {
        self.inner.state.lock().balance = U256::from(wei);
    }

    pub fn set_price(&self, price: Decimal) {
        self.inner.state.lock().price = price;
    }

    pub fn set_history(&self, history: Vec<RawTransaction>) {
        self.inner.state.lock().history = history;
    }

    /// Make the next balance lookup fail with `message`.
    pub fn fail_balance(&self, message: &str) {
        self.inner
            .state
            .lock()
            .balance_failures
            .push_back(message.to_string());
    }

    /// Make the next history lookup fail with `message`.
    pub fn fail_history(&self, message: &str) {
        self.inner
            .state
            .lock()
            .history_failures
            .push_back(message.to_string());
    }

    /// Park balance lookups until the returned handle is notified, once per lookup.
    pub fn hold_balance(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.inner.balance_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn release_balance(&self) {
        self.inner.balance_gate.lock().take();
    }

    pub fn balance_calls(&self) -> usize {
        self.inner.state.lock().balance_calls.len()
    }

    pub fn balance_addresses(&self) -> Vec<String> {
        self.inner.state.lock().balance_calls.clone()
    }

    pub fn history_requests(&self) -> Vec<(String, u64, u64, SortOrder)> {
        self.inner.state.lock().history_requests.clone()
    }
}

#[async_trait]
impl BlockchainRpc for FakeChain {
    async fn get_balance(&self, address: Address) -> anyhow::Result<U256> {
        self.inner
            .state
            .lock()
            .balance_calls
            .push(address.to_checksum(None));

        let gate = self.inner.balance_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut state = self.inner.state.lock();
        match state.balance_failures.pop_front() {
            Some(message) => Err(anyhow!(message)),
            None => Ok(state.balance),
        }
    }
}

#[async_trait]
impl PriceFeed for FakeChain {
    async fn spot_price_usd(&self, _symbol: &str) -> anyhow::Result<Decimal> {
        Ok(self.inner.state.lock().price)
    }
}

#[async_trait]
impl TransactionHistory for FakeChain {
    async fn transactions(
        &self,
        address: &str,
        start_block: u64,
        end_block: u64,
        order: SortOrder,
    ) -> anyhow::Result<Vec<RawTransaction>> {
        let mut state = self.inner.state.lock();
        state
            .history_requests
            .push((address.to_string(), start_block, end_block, order));
        match state.history_failures.pop_front() {
            Some(message) => Err(anyhow!(message)),
            None => Ok(state.history.clone()),
        }
    }
}
