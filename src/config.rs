//! Application configuration.
//!
//! Every section has defaults, so a TOML file only needs the values it changes.

use crate::error::LadderError;
use crate::scoring::types::ScoringConfig;
use anyhow::{Context, Result};
use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Position sizing and exit rules for new trades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    /// Total USD budget that investment percentages apply to
    pub total_budget_usd: f64,
    /// One trade is opened per passing token and per entry here
    pub investment_percentages: Vec<f64>,
    /// Loss percentage that triggers liquidation
    pub stop_loss_pct: f64,
    /// Profit percentages for partial exits
    pub milestones: Vec<f64>,
    /// Stop onboarding once this many trades are open
    pub max_open_trades: Option<usize>,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            total_budget_usd: 305.0,
            investment_percentages: vec![5.0, 10.0, 15.0, 20.0],
            stop_loss_pct: 10.0,
            milestones: vec![30.0, 65.0, 100.0],
            max_open_trades: None,
        }
    }
}

impl TradingConfig {
    /// The milestone ladder, rejecting an empty list.
    pub fn milestone_ladder(&self) -> Result<NonEmpty<f64>, LadderError> {
        NonEmpty::from_vec(self.milestones.clone())
            .ok_or_else(|| LadderError::InvalidConfiguration("milestone ladder is empty".to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub interval_secs: u64,
    /// Upper bound for any single price fetch or order call
    pub request_timeout_secs: u64,
    pub max_concurrent_evaluations: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            request_timeout_secs: 10,
            max_concurrent_evaluations: 8,
        }
    }
}

/// Market-data provider endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub token_profiles_url: String,
    /// `{chain}` and `{address}` are substituted
    pub token_pairs_url_template: String,
    pub chain_id: String,
    pub retry_attempts: usize,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            token_profiles_url: "https://api.dexscreener.com/token-profiles/latest/v1".to_string(),
            token_pairs_url_template: "https://api.dexscreener.com/token-pairs/v1/{chain}/{address}".to_string(),
            chain_id: "solana".to_string(),
            retry_attempts: 3,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Paper,
    Http,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub mode: ExecutionMode,
    pub base_url: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Environment variable holding the wallet address
    pub wallet_address_env: String,
    pub paper_starting_balance_usd: f64,
    pub paper_max_slippage_pct: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Paper,
            base_url: "https://api.jupiter.xyz".to_string(),
            api_key_env: "JUPITER_API_KEY".to_string(),
            wallet_address_env: "PHANTOM_WALLET_ADDRESS".to_string(),
            paper_starting_balance_usd: 305.0,
            paper_max_slippage_pct: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scoring: ScoringConfig,
    pub trading: TradingConfig,
    pub monitor: MonitorConfig,
    pub provider: ProviderConfig,
    pub execution: ExecutionConfig,
}

impl AppConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&contents)
    }

    /// Reject malformed weights, thresholds and intervals.
    pub fn validate(&self) -> Result<(), LadderError> {
        let invalid = |msg: String| Err(LadderError::InvalidConfiguration(msg));

        let w = &self.scoring.weights;
        for (name, value) in [
            ("weights.liquidity", w.liquidity),
            ("weights.volume", w.volume),
            ("weights.tx_count", w.tx_count),
            ("weights.holder_distribution", w.holder_distribution),
        ] {
            if !value.is_finite() || value < 0.0 {
                return invalid(format!("{} must be a non-negative number, got {}", name, value));
            }
        }

        let t = &self.scoring.thresholds;
        if !t.min_liquidity_usd.is_finite() || t.min_liquidity_usd < 0.0 {
            return invalid(format!("min_liquidity_usd must be non-negative, got {}", t.min_liquidity_usd));
        }
        if !t.max_top_holder_pct.is_finite() || !(0.0..=100.0).contains(&t.max_top_holder_pct) {
            return invalid(format!("max_top_holder_pct must be within 0-100, got {}", t.max_top_holder_pct));
        }
        if !t.min_score.is_finite() {
            return invalid(format!("min_score must be finite, got {}", t.min_score));
        }

        let tr = &self.trading;
        if !tr.total_budget_usd.is_finite() || tr.total_budget_usd <= 0.0 {
            return invalid(format!("total_budget_usd must be positive, got {}", tr.total_budget_usd));
        }
        if tr.investment_percentages.is_empty() {
            return invalid("investment_percentages is empty".to_string());
        }
        if let Some(pct) = tr
            .investment_percentages
            .iter()
            .find(|p| !p.is_finite() || **p <= 0.0 || **p > 100.0)
        {
            return invalid(format!("investment percentage {} outside (0, 100]", pct));
        }
        if !tr.stop_loss_pct.is_finite() || tr.stop_loss_pct <= 0.0 {
            return invalid(format!("stop_loss_pct must be positive, got {}", tr.stop_loss_pct));
        }
        let ladder = tr.milestone_ladder()?;
        if ladder.iter().any(|g| !g.is_finite() || *g <= 0.0) {
            return invalid("milestone gains must be positive".to_string());
        }
        let ladder_total: f64 = ladder.iter().sum();
        if ladder_total > 100.0 {
            warn!(
                "Milestone ladder sells {}% of the original investment in total",
                ladder_total
            );
        }

        if self.monitor.interval_secs == 0 {
            return invalid("monitor.interval_secs must be at least 1".to_string());
        }
        if self.monitor.request_timeout_secs == 0 {
            return invalid("monitor.request_timeout_secs must be at least 1".to_string());
        }
        if self.monitor.max_concurrent_evaluations == 0 {
            return invalid("monitor.max_concurrent_evaluations must be at least 1".to_string());
        }

        if self.execution.mode == ExecutionMode::Paper
            && (!self.execution.paper_starting_balance_usd.is_finite() || self.execution.paper_starting_balance_usd < 0.0)
        {
            return invalid("paper_starting_balance_usd must be non-negative".to_string());
        }
        if !self.execution.paper_max_slippage_pct.is_finite() || self.execution.paper_max_slippage_pct < 0.0 {
            return invalid("paper_max_slippage_pct must be non-negative".to_string());
        }

        Ok(())
    }
}
