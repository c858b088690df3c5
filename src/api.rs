use std::str::FromStr;

use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, RootProvider};
use alloy::transports::http::reqwest::Url;
use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use reqwest::{Client, Response};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::address;
use crate::config::{Config, ETHERSCAN_CHAIN_ID, HISTORY_LIMIT};

/// One entry of an account's transaction history, as reported upstream.
/// Amounts are in wei.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransaction {
    pub timestamp: i64,
    pub from: String,
    pub to: String,
    pub value: U256,
    pub confirmations: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    fn as_param(self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }
}

/// Node access for balances.
#[async_trait]
pub trait BlockchainRpc: Send + Sync {
    fn is_valid_address(&self, address: &str) -> bool {
        address::is_well_formed(address)
    }

    /// Balance in wei at the latest block.
    async fn get_balance(&self, address: Address) -> anyhow::Result<U256>;
}

#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn spot_price_usd(&self, symbol: &str) -> anyhow::Result<Decimal>;
}

#[async_trait]
pub trait TransactionHistory: Send + Sync {
    async fn transactions(
        &self,
        address: &str,
        start_block: u64,
        end_block: u64,
        order: SortOrder,
    ) -> anyhow::Result<Vec<RawTransaction>>;
}

pub fn http_client() -> anyhow::Result<Client> {
    Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")
}

fn ensure_success(response: Response, service: &str) -> anyhow::Result<Response> {
    let status = response.status();
    if !status.is_success() {
        bail!("{service} returned HTTP {status}");
    }
    Ok(response)
}

/// Balance reads through an alloy HTTP provider.
pub struct NodeClient {
    provider: RootProvider,
}

impl NodeClient {
    pub fn new(rpc_url: &str) -> anyhow::Result<Self> {
        let url: Url = rpc_url
            .parse()
            .with_context(|| format!("invalid RPC URL {rpc_url:?}"))?;
        Ok(Self {
            provider: RootProvider::new_http(url),
        })
    }
}

#[async_trait]
impl BlockchainRpc for NodeClient {
    async fn get_balance(&self, address: Address) -> anyhow::Result<U256> {
        let wei = self
            .provider
            .get_balance(address)
            .await
            .context("RPC request failed")?;
        debug!(%address, %wei, "balance fetched");
        Ok(wei)
    }
}

pub struct CoinGeckoClient {
    client: Client,
    url: String,
}

impl CoinGeckoClient {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

fn coin_id(symbol: &str) -> String {
    match symbol.to_ascii_uppercase().as_str() {
        "ETH" => "ethereum".to_string(),
        _ => symbol.to_ascii_lowercase(),
    }
}

/// Pull `payload[coin]["usd"]` out as an exact decimal.
fn extract_usd_price(payload: &Value, coin: &str) -> anyhow::Result<Decimal> {
    let price = payload
        .get(coin)
        .and_then(|quotes| quotes.get("usd"))
        .ok_or_else(|| anyhow!("no USD quote for {coin}"))?;

    let Value::Number(number) = price else {
        bail!("USD quote for {coin} is not a number: {price}");
    };

    let text = number.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .with_context(|| format!("USD quote {text} is out of range"))
}

#[async_trait]
impl PriceFeed for CoinGeckoClient {
    async fn spot_price_usd(&self, symbol: &str) -> anyhow::Result<Decimal> {
        let coin = coin_id(symbol);
        let response = self
            .client
            .get(&self.url)
            .query(&[("ids", coin.as_str()), ("vs_currencies", "usd")])
            .send()
            .await
            .context("price request failed")?;
        let payload: Value = ensure_success(response, "price service")?
            .json()
            .await
            .context("failed to decode price response")?;

        let price = extract_usd_price(&payload, &coin)?;
        debug!(%symbol, %price, "spot price fetched");
        Ok(price)
    }
}

pub struct EtherscanClient {
    client: Client,
    url: String,
    api_key: String,
    chain_id: u64,
    page_size: usize,
}

impl EtherscanClient {
    pub fn new(client: Client, url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
            chain_id: ETHERSCAN_CHAIN_ID,
            page_size: HISTORY_LIMIT,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EtherscanResponse {
    status: String,
    message: String,
    #[serde(default)]
    result: Value,
}

#[derive(Debug, Deserialize)]
struct EtherscanTx {
    #[serde(rename = "timeStamp")]
    time_stamp: String,
    from: String,
    #[serde(default)]
    to: String,
    value: String,
    confirmations: String,
}

impl EtherscanResponse {
    /// The first `limit` entries of the list. Entries past the limit are
    /// never looked at, so a malformed one there cannot fail the refresh.
    fn into_transactions(self, limit: usize) -> anyhow::Result<Vec<RawTransaction>> {
        if self.status != "1" {
            // An address without history is reported as a failed call.
            if self.message.starts_with("No transactions found") {
                return Ok(Vec::new());
            }
            let detail = match &self.result {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            bail!("{}: {}", self.message, detail);
        }

        let entries = match self.result {
            Value::Array(entries) => entries,
            other => bail!("unexpected transaction list format: {other}"),
        };
        entries
            .into_iter()
            .take(limit)
            .map(|entry| {
                serde_json::from_value::<EtherscanTx>(entry)
                    .context("unexpected transaction format")?
                    .parse()
            })
            .collect()
    }
}

impl EtherscanTx {
    fn parse(self) -> anyhow::Result<RawTransaction> {
        Ok(RawTransaction {
            timestamp: self
                .time_stamp
                .parse()
                .with_context(|| format!("invalid timestamp {:?}", self.time_stamp))?,
            value: self
                .value
                .parse()
                .with_context(|| format!("invalid value {:?}", self.value))?,
            confirmations: self
                .confirmations
                .parse()
                .with_context(|| format!("invalid confirmations {:?}", self.confirmations))?,
            from: self.from,
            to: self.to,
        })
    }
}

#[async_trait]
impl TransactionHistory for EtherscanClient {
    async fn transactions(
        &self,
        address: &str,
        start_block: u64,
        end_block: u64,
        order: SortOrder,
    ) -> anyhow::Result<Vec<RawTransaction>> {
        let params = [
            ("chainid", self.chain_id.to_string()),
            ("module", "account".to_string()),
            ("action", "txlist".to_string()),
            ("address", address.to_string()),
            ("startblock", start_block.to_string()),
            ("endblock", end_block.to_string()),
            ("sort", order.as_param().to_string()),
            ("page", "1".to_string()),
            ("offset", self.page_size.to_string()),
            ("apikey", self.api_key.clone()),
        ];

        let response = self
            .client
            .get(&self.url)
            .query(&params)
            .send()
            .await
            .context("transaction history request failed")?;
        let payload: EtherscanResponse = ensure_success(response, "transaction history service")?
            .json()
            .await
            .context("failed to decode transaction history response")?;

        let transactions = payload.into_transactions(self.page_size)?;
        debug!(%address, count = transactions.len(), "transaction history fetched");
        Ok(transactions)
    }
}

/// The three network collaborators. Price and history share one HTTP pool.
pub struct HttpSources {
    pub rpc: NodeClient,
    pub prices: CoinGeckoClient,
    pub history: EtherscanClient,
}

impl HttpSources {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = http_client()?;
        Ok(Self {
            rpc: NodeClient::new(&config.rpc_url)?,
            prices: CoinGeckoClient::new(client.clone(), &config.price_url),
            history: EtherscanClient::new(client, &config.etherscan_url, &config.etherscan_key),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn node_client_rejects_a_malformed_url() {
        assert!(NodeClient::new("not a url").is_err());
        assert!(NodeClient::new("https://mainnet.infura.io/v3/YOUR-PROJECT-ID").is_ok());
    }

    #[test]
    fn price_is_exact_decimal() {
        let payload: Value = serde_json::from_str(r#"{"ethereum":{"usd":1800.12}}"#).unwrap();
        assert_eq!(extract_usd_price(&payload, "ethereum").unwrap(), dec!(1800.12));

        let whole: Value = serde_json::from_str(r#"{"ethereum":{"usd":1800}}"#).unwrap();
        assert_eq!(extract_usd_price(&whole, "ethereum").unwrap(), dec!(1800));
    }

    #[test]
    fn missing_price_is_a_failure() {
        let payload: Value = serde_json::from_str(r#"{"status":{"error_code":429}}"#).unwrap();
        let err = extract_usd_price(&payload, "ethereum").unwrap_err();
        assert_eq!(err.to_string(), "no USD quote for ethereum");
    }

    #[test]
    fn eth_symbol_maps_to_coin_id() {
        assert_eq!(coin_id("ETH"), "ethereum");
        assert_eq!(coin_id("eth"), "ethereum");
        assert_eq!(coin_id("Bitcoin"), "bitcoin");
    }

    #[test]
    fn transaction_list_is_parsed_in_order() {
        let payload: EtherscanResponse = serde_json::from_str(
            r#"{
                "status": "1",
                "message": "OK",
                "result": [
                    {
                        "blockNumber": "19000001",
                        "timeStamp": "1705000100",
                        "hash": "0xaa",
                        "from": "0x1111111111111111111111111111111111111111",
                        "to": "0x2222222222222222222222222222222222222222",
                        "value": "1500000000000000000",
                        "confirmations": "12"
                    },
                    {
                        "blockNumber": "19000000",
                        "timeStamp": "1705000000",
                        "hash": "0xbb",
                        "from": "0x2222222222222222222222222222222222222222",
                        "to": "",
                        "value": "0",
                        "confirmations": "0"
                    }
                ]
            }"#,
        )
        .unwrap();

        let txs = payload.into_transactions(HISTORY_LIMIT).unwrap();

        assert_eq!(txs.len(), 2);
        assert_eq!(
            txs[0],
            RawTransaction {
                timestamp: 1_705_000_100,
                from: "0x1111111111111111111111111111111111111111".to_string(),
                to: "0x2222222222222222222222222222222222222222".to_string(),
                value: U256::from(1_500_000_000_000_000_000u128),
                confirmations: 12,
            }
        );
        assert_eq!(txs[1].to, "");
        assert_eq!(txs[1].confirmations, 0);
    }

    #[test]
    fn empty_history_is_not_an_error() {
        let payload: EtherscanResponse = serde_json::from_str(
            r#"{"status":"0","message":"No transactions found","result":[]}"#,
        )
        .unwrap();

        assert!(payload.into_transactions(HISTORY_LIMIT).unwrap().is_empty());
    }

    #[test]
    fn api_rejection_carries_the_message() {
        let payload: EtherscanResponse = serde_json::from_str(
            r#"{"status":"0","message":"NOTOK","result":"Invalid API Key"}"#,
        )
        .unwrap();

        let err = payload.into_transactions(HISTORY_LIMIT).unwrap_err();
        assert_eq!(err.to_string(), "NOTOK: Invalid API Key");
    }

    #[test]
    fn non_numeric_fields_fail_the_whole_list() {
        let payload: EtherscanResponse = serde_json::from_str(
            r#"{"status":"1","message":"OK","result":[
                {"timeStamp":"soon","from":"0x1","to":"0x2","value":"1","confirmations":"1"}
            ]}"#,
        )
        .unwrap();

        assert!(payload.into_transactions(HISTORY_LIMIT).is_err());
    }

    fn history_entry(timestamp: i64) -> Value {
        serde_json::json!({
            "timeStamp": timestamp.to_string(),
            "from": "0x1111111111111111111111111111111111111111",
            "to": "0x2222222222222222222222222222222222222222",
            "value": "1000000000000000000",
            "confirmations": "3"
        })
    }

    #[test]
    fn entries_past_the_limit_are_not_parsed() {
        let mut entries: Vec<Value> = (0..HISTORY_LIMIT as i64)
            .map(|i| history_entry(1_705_000_000 - i))
            .collect();
        entries.push(serde_json::json!({
            "timeStamp": "soon", "from": "0x1", "to": "0x2", "value": "x", "confirmations": "?"
        }));
        entries.push(serde_json::json!({"unexpected": true}));
        let payload = EtherscanResponse {
            status: "1".to_string(),
            message: "OK".to_string(),
            result: Value::Array(entries),
        };

        let txs = payload.into_transactions(HISTORY_LIMIT).unwrap();

        assert_eq!(txs.len(), HISTORY_LIMIT);
        assert_eq!(txs[0].timestamp, 1_705_000_000);
        assert_eq!(txs[HISTORY_LIMIT - 1].timestamp, 1_705_000_000 - 9);
    }

    #[test]
    fn malformed_entry_within_the_limit_still_fails() {
        let mut entries: Vec<Value> = (0..3).map(history_entry).collect();
        entries[1]["value"] = Value::String("lots".to_string());
        let payload = EtherscanResponse {
            status: "1".to_string(),
            message: "OK".to_string(),
            result: Value::Array(entries),
        };

        assert!(payload.into_transactions(HISTORY_LIMIT).is_err());
    }
}
