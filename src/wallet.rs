use std::sync::Arc;

use alloy::primitives::U256;
use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::address;
use crate::api::{
    BlockchainRpc, HttpSources, PriceFeed, RawTransaction, SortOrder, TransactionHistory,
};
use crate::config::HISTORY_LIMIT;
use crate::error::TrackerError;

pub const START_BLOCK: u64 = 0;
pub const END_BLOCK: u64 = 99_999_999;

const ETH_SYMBOL: &str = "ETH";
const WEI_DECIMALS: u32 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
}

impl Direction {
    pub fn label(self) -> &'static str {
        match self {
            Direction::Sent => "Sent",
            Direction::Received => "Received",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Confirmed,
    Pending,
}

impl TxStatus {
    pub fn label(self) -> &'static str {
        match self {
            TxStatus::Confirmed => "Confirmed",
            TxStatus::Pending => "Pending",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
    pub amount_eth: Decimal,
    pub status: TxStatus,
}

impl Transaction {
    /// Interpret a history entry from the point of view of `tracked`.
    pub fn classify(raw: &RawTransaction, tracked: &str) -> anyhow::Result<Self> {
        let timestamp = DateTime::from_timestamp(raw.timestamp, 0)
            .ok_or_else(|| anyhow!("timestamp {} is out of range", raw.timestamp))?;

        let direction = if address::same_address(&raw.from, tracked) {
            Direction::Sent
        } else {
            Direction::Received
        };

        let status = if raw.confirmations > 0 {
            TxStatus::Confirmed
        } else {
            TxStatus::Pending
        };

        Ok(Self {
            timestamp,
            direction,
            amount_eth: wei_to_eth(raw.value)?,
            status,
        })
    }
}

/// Everything one successful refresh produces.
#[derive(Debug, Clone, PartialEq)]
pub struct WalletSnapshot {
    pub address: String,
    pub balance_eth: Decimal,
    pub price_usd: Decimal,
    pub value_usd: Decimal,
    /// Most recent first, at most [`HISTORY_LIMIT`] entries.
    pub transactions: Vec<Transaction>,
    pub fetched_at: DateTime<Utc>,
}

impl WalletSnapshot {
    pub fn build(
        address: &str,
        balance_eth: Decimal,
        price_usd: Decimal,
        history: &[RawTransaction],
    ) -> anyhow::Result<Self> {
        let value_usd = balance_eth
            .checked_mul(price_usd)
            .ok_or_else(|| anyhow!("wallet value overflows ({balance_eth} ETH x ${price_usd})"))?;

        let transactions = history
            .iter()
            .take(HISTORY_LIMIT)
            .map(|raw| Transaction::classify(raw, address))
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            address: address.to_string(),
            balance_eth,
            price_usd,
            value_usd,
            transactions,
            fetched_at: Utc::now(),
        })
    }
}

/// Convert an integer wei amount into whole ether without rounding.
pub fn wei_to_eth(wei: U256) -> anyhow::Result<Decimal> {
    let wei = u128::try_from(wei)
        .ok()
        .and_then(|wei| i128::try_from(wei).ok())
        .ok_or_else(|| anyhow!("amount {wei} wei is out of range"))?;
    let eth = Decimal::try_from_i128_with_scale(wei, WEI_DECIMALS)
        .with_context(|| format!("amount {wei} wei is out of range"))?;
    Ok(eth.normalize())
}

/// Reads balance, price and history for an address as a single unit:
/// any failing step discards the whole refresh.
pub struct WalletFetcher {
    rpc: Arc<dyn BlockchainRpc>,
    prices: Arc<dyn PriceFeed>,
    history: Arc<dyn TransactionHistory>,
}

impl WalletFetcher {
    pub fn new(
        rpc: Arc<dyn BlockchainRpc>,
        prices: Arc<dyn PriceFeed>,
        history: Arc<dyn TransactionHistory>,
    ) -> Self {
        Self {
            rpc,
            prices,
            history,
        }
    }

    pub fn from_http(sources: HttpSources) -> Self {
        Self::new(
            Arc::new(sources.rpc),
            Arc::new(sources.prices),
            Arc::new(sources.history),
        )
    }

    /// Check user input and return the checksummed address. Mixed-case input
    /// must already carry a valid checksum.
    pub fn validate(&self, input: &str) -> Result<String, TrackerError> {
        let input = input.trim();
        if !self.rpc.is_valid_address(input) {
            return Err(TrackerError::InvalidAddress(input.to_string()));
        }
        address::normalize(input).ok_or_else(|| TrackerError::InvalidAddress(input.to_string()))
    }

    pub async fn fetch(&self, address: &str) -> Result<WalletSnapshot, TrackerError> {
        self.try_fetch(address)
            .await
            .map_err(|err| TrackerError::fetch(&err))
    }

    async fn try_fetch(&self, address: &str) -> anyhow::Result<WalletSnapshot> {
        let account =
            address::parse(address).ok_or_else(|| anyhow!("{address:?} is not an address"))?;
        let wei = self
            .rpc
            .get_balance(account)
            .await
            .context("balance lookup")?;
        let balance_eth = wei_to_eth(wei)?;

        let price_usd = self
            .prices
            .spot_price_usd(ETH_SYMBOL)
            .await
            .context("price lookup")?;

        let history = self
            .history
            .transactions(address, START_BLOCK, END_BLOCK, SortOrder::Descending)
            .await
            .context("transaction history lookup")?;

        WalletSnapshot::build(address, balance_eth, price_usd, &history)
    }
}
