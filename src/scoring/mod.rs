//! Candidate screening: data sources, eligibility filter, scoring and ranking.

pub mod types;
pub mod features;
pub mod scorer;
pub mod data_sources;
pub mod dexscreener;
pub mod screener;

pub use types::{
    CandidateBatch, CandidateVerdict, FeatureWeights, Rejection, ScoreResult, ScoreThresholds,
    ScoringConfig, ScreeningReport, SkippedCandidate,
};

pub use data_sources::{
    AssembledFeed, CandidateFeed, HistoricalDataSource, HolderDistributionSource, LiquidityLockSource,
    MarketDataProvider,
};
pub use dexscreener::DexScreenerClient;
pub use scorer::CandidateScorer;
pub use screener::Screener;

use std::sync::Arc;

/// Builds a `Screener`, starting from the default scoring config.
pub struct ScreenerBuilder {
    config: ScoringConfig,
}

impl ScreenerBuilder {
    pub fn new() -> Self {
        Self {
            config: ScoringConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ScoringConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_weights(mut self, weights: FeatureWeights) -> Self {
        self.config.weights = weights;
        self
    }

    pub fn with_thresholds(mut self, thresholds: ScoreThresholds) -> Self {
        self.config.thresholds = thresholds;
        self
    }

    /// Minimum score a candidate needs to pass.
    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.config.thresholds.min_score = min_score;
        self
    }

    pub fn build(self, feed: Arc<dyn CandidateFeed>) -> Screener {
        Screener::new(feed, self.config)
    }
}

impl Default for ScreenerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
