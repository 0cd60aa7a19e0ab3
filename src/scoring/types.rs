//! Types for the candidate scoring engine.

use crate::types::{Candidate, Pubkey};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Feature weights for the linear fitness score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureWeights {
    pub liquidity: f64,
    pub volume: f64,
    pub tx_count: f64,
    /// Subtracted per percentage point held by the largest holder
    pub holder_distribution: f64,
}

impl Default for FeatureWeights {
    fn default() -> Self {
        Self {
            liquidity: 0.4,
            volume: 0.3,
            tx_count: 0.2,
            holder_distribution: 0.1,
        }
    }
}

/// Eligibility thresholds and the final pass mark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreThresholds {
    pub min_liquidity_usd: f64,
    pub min_tx_count_24h: u64,
    pub max_top_holder_pct: f64,
    pub require_liquidity_lock: bool,
    pub min_score: f64,
}

impl Default for ScoreThresholds {
    fn default() -> Self {
        Self {
            min_liquidity_usd: 10_000.0,
            min_tx_count_24h: 300,
            max_top_holder_pct: 30.0,
            require_liquidity_lock: true,
            min_score: 2_000.0,
        }
    }
}

/// Scoring engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: FeatureWeights,
    pub thresholds: ScoreThresholds,
}

/// Why a candidate failed the eligibility filter. Only the first failing check is reported.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    InsufficientLiquidity { liquidity_usd: f64, min: f64 },
    InsufficientTxCount { tx_count: u64, min: u64 },
    HolderConcentration { top_holder_pct: f64, max: f64 },
    LiquidityNotLocked,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::InsufficientLiquidity { liquidity_usd, min } => {
                write!(f, "liquidity ${:.2} below ${:.2}", liquidity_usd, min)
            }
            Rejection::InsufficientTxCount { tx_count, min } => {
                write!(f, "{} txns in 24h, need {}", tx_count, min)
            }
            Rejection::HolderConcentration { top_holder_pct, max } => {
                write!(f, "top holder owns {:.2}% (max {:.2}%)", top_holder_pct, max)
            }
            Rejection::LiquidityNotLocked => write!(f, "liquidity not locked"),
        }
    }
}

/// A scored candidate together with the raw metrics that produced the score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub address: Pubkey,
    pub score: f64,
    pub volume_24h_usd: f64,
    pub liquidity_usd: f64,
    pub tx_count_24h: u64,
    pub top_holder_pct: f64,
    pub historical_bonus: f64,
}

impl ScoreResult {
    pub fn from_candidate(candidate: &Candidate, score: f64, historical_bonus: f64) -> Self {
        Self {
            address: candidate.address.clone(),
            score,
            volume_24h_usd: candidate.volume_24h_usd,
            liquidity_usd: candidate.liquidity_usd,
            tx_count_24h: candidate.tx_count_24h,
            top_holder_pct: candidate.effective_top_holder_pct(),
            historical_bonus,
        }
    }
}

/// Outcome of running one candidate through filter, score and threshold.
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateVerdict {
    Rejected(Rejection),
    BelowThreshold(ScoreResult),
    Passed(ScoreResult),
}

/// A candidate dropped because its market data could not be fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedCandidate {
    pub address: Pubkey,
    pub reason: String,
}

/// Candidates assembled by a feed plus the ones it had to skip.
#[derive(Debug, Clone, Default)]
pub struct CandidateBatch {
    pub candidates: Vec<Candidate>,
    pub skipped: Vec<SkippedCandidate>,
}

/// Result of one screening run.
#[derive(Debug, Clone, Default)]
pub struct ScreeningReport {
    /// Passing candidates, best score first
    pub results: Vec<ScoreResult>,
    /// Candidates dropped for missing market data
    pub skipped: Vec<SkippedCandidate>,
    pub rejected: usize,
    pub below_threshold: usize,
}

impl ScreeningReport {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}
