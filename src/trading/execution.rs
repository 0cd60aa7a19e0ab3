//! Execution, pricing and wallet contracts plus the paper and HTTP venues.

use crate::config::ExecutionConfig;
use crate::types::Pubkey;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Current USD price of a token.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Errors mean "no price this time", never a zero price.
    async fn fetch_current_price(&self, address: &str) -> Result<f64>;
}

/// Order execution venue.
#[async_trait]
pub trait ExecutionVenue: Send + Sync {
    /// Sell `amount_usd` worth of the token.
    async fn execute_sell(&self, address: &str, amount_usd: f64) -> Result<()>;

    /// Buy `amount_usd` worth of the token. Returns the fill price in USD.
    async fn execute_buy(&self, address: &str, amount_usd: f64) -> Result<f64>;
}

/// Wallet balance service.
#[async_trait]
pub trait WalletBalance: Send + Sync {
    async fn available_usd(&self) -> Result<f64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

/// A fill recorded by the paper venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub address: Pubkey,
    pub side: Side,
    pub amount_usd: f64,
    pub price: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct PaperBook {
    cash_usd: f64,
    fills: Vec<Fill>,
}

/// Simulated venue: fills buys at the quoted price plus random slippage and
/// keeps a cash balance.
pub struct PaperVenue {
    prices: Arc<dyn PriceSource>,
    max_slippage_pct: f64,
    book: Mutex<PaperBook>,
}

impl PaperVenue {
    pub fn new(prices: Arc<dyn PriceSource>, starting_balance_usd: f64, max_slippage_pct: f64) -> Self {
        Self {
            prices,
            max_slippage_pct,
            book: Mutex::new(PaperBook {
                cash_usd: starting_balance_usd,
                fills: Vec::new(),
            }),
        }
    }

    pub async fn fills(&self) -> Vec<Fill> {
        self.book.lock().await.fills.clone()
    }

    fn slippage_factor(&self) -> f64 {
        if self.max_slippage_pct > 0.0 {
            let pct = rand::thread_rng().gen_range(0.0..=self.max_slippage_pct);
            1.0 + pct / 100.0
        } else {
            1.0
        }
    }
}

#[async_trait]
impl ExecutionVenue for PaperVenue {
    #[instrument(skip(self))]
    async fn execute_sell(&self, address: &str, amount_usd: f64) -> Result<()> {
        if !amount_usd.is_finite() || amount_usd < 0.0 {
            bail!("invalid sell amount {}", amount_usd);
        }
        let mut book = self.book.lock().await;
        book.cash_usd += amount_usd;
        book.fills.push(Fill {
            address: address.to_string(),
            side: Side::Sell,
            amount_usd,
            price: None,
            timestamp: Utc::now(),
        });
        info!("[paper] Sold ${:.2} of {}", amount_usd, address);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn execute_buy(&self, address: &str, amount_usd: f64) -> Result<f64> {
        if !amount_usd.is_finite() || amount_usd <= 0.0 {
            bail!("invalid buy amount {}", amount_usd);
        }
        let quote = self
            .prices
            .fetch_current_price(address)
            .await
            .context("No quote for paper buy")?;
        let fill_price = quote * self.slippage_factor();

        let mut book = self.book.lock().await;
        if book.cash_usd < amount_usd {
            bail!("insufficient paper balance: need ${:.2}, have ${:.2}", amount_usd, book.cash_usd);
        }
        book.cash_usd -= amount_usd;
        book.fills.push(Fill {
            address: address.to_string(),
            side: Side::Buy,
            amount_usd,
            price: Some(fill_price),
            timestamp: Utc::now(),
        });
        info!("[paper] Bought ${:.2} of {} at ${}", amount_usd, address, fill_price);
        Ok(fill_price)
    }
}

#[async_trait]
impl WalletBalance for PaperVenue {
    async fn available_usd(&self) -> Result<f64> {
        Ok(self.book.lock().await.cash_usd)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderRequest<'a> {
    token_address: &'a str,
    #[serde(rename = "amountUSD")]
    amount_usd: f64,
    wallet: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuyResponse {
    #[serde(rename = "executedPriceUSD")]
    executed_price_usd: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceResponse {
    #[serde(rename = "balanceUSD")]
    balance_usd: f64,
}

/// Venue backed by a REST trading API (`POST /trade/buy`, `POST /trade/sell`,
/// `GET /wallet/{address}/balance`) authenticated with a bearer key.
pub struct HttpExecutionVenue {
    http_client: Client,
    base_url: String,
    api_key: String,
    wallet_address: String,
}

impl HttpExecutionVenue {
    pub fn new(base_url: impl Into<String>, api_key: String, wallet_address: String, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            wallet_address,
        })
    }

    /// Build from config, reading the key and wallet address from the named env vars.
    pub fn from_config(config: &ExecutionConfig, timeout: Duration) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .with_context(|| format!("{} is not set", config.api_key_env))?;
        let wallet_address = std::env::var(&config.wallet_address_env)
            .with_context(|| format!("{} is not set", config.wallet_address_env))?;
        Self::new(config.base_url.clone(), api_key, wallet_address, timeout)
    }

    async fn post_order(&self, path: &str, address: &str, amount_usd: f64) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&OrderRequest {
                token_address: address,
                amount_usd,
                wallet: &self.wallet_address,
            })
            .send()
            .await
            .with_context(|| format!("Order request to {} failed", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Order rejected by {}: {} {}", url, status, body);
            return Err(anyhow!("{} returned {}", url, status));
        }
        Ok(response)
    }
}

#[async_trait]
impl ExecutionVenue for HttpExecutionVenue {
    #[instrument(skip(self))]
    async fn execute_sell(&self, address: &str, amount_usd: f64) -> Result<()> {
        self.post_order("/trade/sell", address, amount_usd).await?;
        info!("Sold ${:.2} of {}", amount_usd, address);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn execute_buy(&self, address: &str, amount_usd: f64) -> Result<f64> {
        let response = self.post_order("/trade/buy", address, amount_usd).await?;
        let body: BuyResponse = response.json().await.context("Failed to parse buy response")?;
        let price = body
            .executed_price_usd
            .filter(|p| p.is_finite() && *p > 0.0)
            .ok_or_else(|| anyhow!("buy response for {} carried no executed price", address))?;
        info!("Bought {} at ${} per token", address, price);
        Ok(price)
    }
}

#[async_trait]
impl WalletBalance for HttpExecutionVenue {
    async fn available_usd(&self) -> Result<f64> {
        let url = format!("{}/wallet/{}/balance", self.base_url, self.wallet_address);
        let balance: BalanceResponse = self
            .http_client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .with_context(|| format!("Balance request to {} failed", url))?
            .error_for_status()?
            .json()
            .await
            .context("Failed to parse balance response")?;
        debug!("Wallet balance: ${:.2}", balance.balance_usd);
        Ok(balance.balance_usd)
    }
}
