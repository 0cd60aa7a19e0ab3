//! Core types and data structures shared by the scoring and trading halves.

use serde::{Deserialize, Serialize};

/// A simple public key representation (token addresses are kept as strings)
pub type Pubkey = String;

/// One point of a token's historical volume/liquidity series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPoint {
    /// Unix timestamp (seconds) of the sample
    pub timestamp: i64,
    /// Volume in USD over the sample period
    pub volume: f64,
    /// Liquidity in USD at the sample time
    pub liquidity: f64,
}

/// Share of supply held by a single address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolderShare {
    pub address: Pubkey,
    /// Percentage of supply, 0-100
    pub percentage: f64,
}

/// Live market numbers for a token as reported by the market-data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub address: Pubkey,
    pub volume_24h_usd: f64,
    pub liquidity_usd: f64,
    pub tx_count_24h: u64,
    pub price_usd: Option<f64>,
}

/// An asset snapshot evaluated for trading eligibility.
///
/// Built fresh on every screening run and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// The token address
    pub address: Pubkey,
    /// Volume over the last 24h in USD
    pub volume_24h_usd: f64,
    /// Pool liquidity in USD
    pub liquidity_usd: f64,
    /// Number of transactions over the last 24h
    pub tx_count_24h: u64,
    /// Largest single-holder percentage, `None` when no holder data was available
    pub top_holder_pct: Option<f64>,
    /// Whether the pool liquidity is locked
    pub liquidity_locked: bool,
    /// Historical series, oldest first
    pub history: Vec<HistoricalPoint>,
}

impl Candidate {
    /// Top-holder percentage used by filtering and scoring (missing data counts as 0).
    pub fn effective_top_holder_pct(&self) -> f64 {
        self.top_holder_pct.unwrap_or(0.0)
    }
}
