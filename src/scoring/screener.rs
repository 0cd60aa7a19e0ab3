//! One screening run: fetch candidates, filter, score, rank.

use crate::scoring::data_sources::CandidateFeed;
use crate::scoring::scorer::CandidateScorer;
use crate::scoring::types::{ScoringConfig, ScreeningReport};
use crate::types::Candidate;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub struct Screener {
    feed: Arc<dyn CandidateFeed>,
    scorer: CandidateScorer,
}

impl Screener {
    pub fn new(feed: Arc<dyn CandidateFeed>, config: ScoringConfig) -> Self {
        Self {
            feed,
            scorer: CandidateScorer::new(config),
        }
    }

    pub fn scorer(&self) -> &CandidateScorer {
        &self.scorer
    }

    /// Fetch candidates from the feed and produce a ranked report.
    ///
    /// Fails only if the feed cannot list tokens at all. Individual tokens
    /// with missing market data show up in `skipped`.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<ScreeningReport> {
        let batch = self
            .feed
            .fetch_candidates()
            .await
            .context("Failed to fetch candidates")?;

        for skipped in &batch.skipped {
            warn!("Candidate {} skipped: {}", skipped.address, skipped.reason);
        }

        let mut report = self.screen(&batch.candidates);
        report.skipped = batch.skipped;

        info!(
            "Screening finished: {} passed, {} rejected, {} below threshold, {} skipped",
            report.results.len(),
            report.rejected,
            report.below_threshold,
            report.skipped_count()
        );
        Ok(report)
    }

    /// Score an already assembled candidate list.
    pub fn screen(&self, candidates: &[Candidate]) -> ScreeningReport {
        self.scorer.rank(candidates)
    }
}
