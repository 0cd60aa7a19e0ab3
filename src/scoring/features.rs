//! Scoring math.
//!
//! Pure functions only: the same candidate and weights always produce the same score.

use crate::scoring::types::FeatureWeights;
use crate::types::{Candidate, HistoricalPoint};
use tracing::debug;

/// Bonus granted when volume has grown across the historical series.
pub const HISTORICAL_GROWTH_BONUS: f64 = 100.0;

/// Trend bonus: +100 when there are at least two points and the latest volume
/// exceeds the earliest one, otherwise 0.
pub fn historical_bonus(history: &[HistoricalPoint]) -> f64 {
    match (history.first(), history.last()) {
        (Some(first), Some(last)) if history.len() >= 2 && last.volume > first.volume => {
            HISTORICAL_GROWTH_BONUS
        }
        _ => 0.0,
    }
}

/// Weighted linear score before the historical bonus.
pub fn base_score(candidate: &Candidate, weights: &FeatureWeights) -> f64 {
    weights.liquidity * candidate.liquidity_usd
        + weights.volume * candidate.volume_24h_usd
        + weights.tx_count * candidate.tx_count_24h as f64
        - weights.holder_distribution * candidate.effective_top_holder_pct()
}

/// Full fitness score. Returns `(score, historical_bonus)`.
pub fn compute_score(candidate: &Candidate, weights: &FeatureWeights) -> (f64, f64) {
    let bonus = historical_bonus(&candidate.history);
    let score = base_score(candidate, weights) + bonus;

    debug!(
        "Score for {}: liq={} vol={} tx={} top={} bonus={} -> {:.2}",
        candidate.address,
        candidate.liquidity_usd,
        candidate.volume_24h_usd,
        candidate.tx_count_24h,
        candidate.effective_top_holder_pct(),
        bonus,
        score
    );
    (score, bonus)
}
