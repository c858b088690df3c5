use std::time::Duration;

use tracing::warn;

pub const DEFAULT_RPC_URL: &str = "https://mainnet.infura.io/v3/YOUR-PROJECT-ID";
pub const DEFAULT_ETHERSCAN_KEY: &str = "YOUR-ETHERSCAN-KEY";

pub const PRICE_API_URL: &str = "https://api.coingecko.com/api/v3/simple/price";
pub const ETHERSCAN_API_URL: &str = "https://api.etherscan.io/v2/api";
pub const ETHERSCAN_CHAIN_ID: u64 = 1;

pub const POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const HISTORY_LIMIT: usize = 10;

const RPC_URL_VAR: &str = "INFURA_URL";
const ETHERSCAN_KEY_VAR: &str = "ETHERSCAN_KEY";

/// Runtime settings. Only the RPC endpoint and the history API key come
/// from the environment; everything else is fixed.
#[derive(Clone)]
pub struct Config {
    pub rpc_url: String,
    pub etherscan_key: String,
    pub etherscan_url: String,
    pub price_url: String,
    pub poll_interval: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let rpc_url = read_or_placeholder(&lookup, RPC_URL_VAR, DEFAULT_RPC_URL);
        let etherscan_key = read_or_placeholder(&lookup, ETHERSCAN_KEY_VAR, DEFAULT_ETHERSCAN_KEY);

        Self {
            rpc_url,
            etherscan_key,
            etherscan_url: ETHERSCAN_API_URL.to_string(),
            price_url: PRICE_API_URL.to_string(),
            poll_interval: POLL_INTERVAL,
        }
    }
}

// The key stays out of logs and panics.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("rpc_url", &self.rpc_url)
            .field("etherscan_key", &"<redacted>")
            .field("etherscan_url", &self.etherscan_url)
            .field("price_url", &self.price_url)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

fn read_or_placeholder(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    placeholder: &str,
) -> String {
    match lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(value) => value,
        None => {
            warn!("{key} is not set, using placeholder value; requests will fail");
            placeholder.to_string()
        }
    }
}
