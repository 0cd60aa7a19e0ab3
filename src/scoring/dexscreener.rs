//! DexScreener market-data provider.
//!
//! Lists the latest token profiles for the configured chain and reads volume,
//! liquidity, transaction counts and USD price from the token's busiest pair.

use crate::config::ProviderConfig;
use crate::scoring::data_sources::MarketDataProvider;
use crate::trading::execution::PriceSource;
use crate::types::{MarketSnapshot, Pubkey};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tokio_retry::{strategy::ExponentialBackoff, Retry};
use tracing::{debug, instrument};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenProfile {
    #[serde(default)]
    chain_id: String,
    #[serde(default)]
    token_address: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TxnCounts {
    #[serde(default)]
    buys: u64,
    #[serde(default)]
    sells: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PairTxns {
    #[serde(default)]
    h24: TxnCounts,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PairVolume {
    #[serde(default)]
    h24: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PairLiquidity {
    #[serde(default)]
    usd: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pair {
    #[serde(default)]
    price_usd: Option<String>,
    #[serde(default)]
    txns: PairTxns,
    #[serde(default)]
    volume: PairVolume,
    #[serde(default)]
    liquidity: PairLiquidity,
}

impl Pair {
    fn price(&self) -> Option<f64> {
        self.price_usd
            .as_deref()
            .and_then(|p| p.parse::<f64>().ok())
            .filter(|p| p.is_finite() && *p > 0.0)
    }
}

/// Pick the pair with the highest 24h volume.
fn busiest_pair(pairs: Vec<Pair>) -> Option<Pair> {
    pairs
        .into_iter()
        .max_by(|a, b| a.volume.h24.total_cmp(&b.volume.h24))
}

/// HTTP client for the DexScreener public API.
pub struct DexScreenerClient {
    http_client: Client,
    config: ProviderConfig,
}

impl DexScreenerClient {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http_client, config })
    }

    fn pairs_url(&self, address: &str) -> String {
        self.config
            .token_pairs_url_template
            .replace("{chain}", &self.config.chain_id)
            .replace("{address}", address)
    }

    /// GET a JSON document with exponential-backoff retries.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let retry_strategy = ExponentialBackoff::from_millis(100)
            .max_delay(Duration::from_secs(5))
            .take(self.config.retry_attempts);

        Retry::spawn(retry_strategy, || async {
            let response = self
                .http_client
                .get(url)
                .send()
                .await
                .with_context(|| format!("Request to {} failed", url))?;

            if !response.status().is_success() {
                return Err(anyhow!("{} returned {}", url, response.status()));
            }

            response
                .json::<T>()
                .await
                .with_context(|| format!("Failed to parse response from {}", url))
        })
        .await
    }

    async fn fetch_best_pair(&self, address: &str) -> Result<Pair> {
        let pairs: Vec<Pair> = self.get_json(&self.pairs_url(address)).await?;
        busiest_pair(pairs).ok_or_else(|| anyhow!("No pairs listed for {}", address))
    }
}

#[async_trait]
impl MarketDataProvider for DexScreenerClient {
    #[instrument(skip(self))]
    async fn list_tokens(&self) -> Result<Vec<Pubkey>> {
        let profiles: Vec<TokenProfile> = self.get_json(&self.config.token_profiles_url).await?;
        let total = profiles.len();

        let addresses: Vec<Pubkey> = profiles
            .into_iter()
            .filter(|p| p.chain_id == self.config.chain_id && !p.token_address.is_empty())
            .map(|p| p.token_address)
            .collect();

        debug!("{} of {} profiles are on {}", addresses.len(), total, self.config.chain_id);
        Ok(addresses)
    }

    #[instrument(skip(self))]
    async fn fetch_market_snapshot(&self, address: &str) -> Result<MarketSnapshot> {
        let pair = self.fetch_best_pair(address).await?;
        Ok(MarketSnapshot {
            address: address.to_string(),
            volume_24h_usd: pair.volume.h24,
            liquidity_usd: pair.liquidity.usd,
            tx_count_24h: pair.txns.h24.buys + pair.txns.h24.sells,
            price_usd: pair.price(),
        })
    }
}

#[async_trait]
impl PriceSource for DexScreenerClient {
    #[instrument(skip(self))]
    async fn fetch_current_price(&self, address: &str) -> Result<f64> {
        self.fetch_best_pair(address)
            .await?
            .price()
            .ok_or_else(|| anyhow!("No usable USD price for {}", address))
    }
}
