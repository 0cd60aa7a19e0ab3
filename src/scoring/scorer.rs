//! Candidate scorer - eligibility filter, weighted score, threshold and ranking.

use crate::scoring::features::compute_score;
use crate::scoring::types::{CandidateVerdict, Rejection, ScoreResult, ScoringConfig, ScreeningReport};
use crate::types::Candidate;
use tracing::{debug, instrument};

/// Applies the eligibility filter and fitness score to candidates.
#[derive(Debug, Clone)]
pub struct CandidateScorer {
    config: ScoringConfig,
}

impl CandidateScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Short-circuit eligibility filter. Checks run in a fixed order and the
    /// first failure is returned.
    pub fn check_eligibility(&self, candidate: &Candidate) -> Result<(), Rejection> {
        let t = &self.config.thresholds;

        if candidate.liquidity_usd < t.min_liquidity_usd {
            return Err(Rejection::InsufficientLiquidity {
                liquidity_usd: candidate.liquidity_usd,
                min: t.min_liquidity_usd,
            });
        }

        if candidate.tx_count_24h < t.min_tx_count_24h {
            return Err(Rejection::InsufficientTxCount {
                tx_count: candidate.tx_count_24h,
                min: t.min_tx_count_24h,
            });
        }

        let top_holder_pct = candidate.effective_top_holder_pct();
        if top_holder_pct > t.max_top_holder_pct {
            return Err(Rejection::HolderConcentration {
                top_holder_pct,
                max: t.max_top_holder_pct,
            });
        }

        if t.require_liquidity_lock && !candidate.liquidity_locked {
            return Err(Rejection::LiquidityNotLocked);
        }

        Ok(())
    }

    /// Run one candidate through filter, score and threshold.
    #[instrument(skip(self, candidate), fields(address = %candidate.address))]
    pub fn evaluate(&self, candidate: &Candidate) -> CandidateVerdict {
        if let Err(rejection) = self.check_eligibility(candidate) {
            debug!("Rejected {}: {}", candidate.address, rejection);
            return CandidateVerdict::Rejected(rejection);
        }

        let (score, bonus) = compute_score(candidate, &self.config.weights);
        let result = ScoreResult::from_candidate(candidate, score, bonus);

        if score >= self.config.thresholds.min_score {
            CandidateVerdict::Passed(result)
        } else {
            debug!(
                "{} scored {:.2}, below threshold {:.2}",
                candidate.address, score, self.config.thresholds.min_score
            );
            CandidateVerdict::BelowThreshold(result)
        }
    }

    /// Score a candidate list. Passing results come back sorted by descending
    /// score, ties keeping input order; the rest are only counted.
    pub fn rank(&self, candidates: &[Candidate]) -> ScreeningReport {
        let mut report = ScreeningReport::default();
        for candidate in candidates {
            match self.evaluate(candidate) {
                CandidateVerdict::Passed(result) => report.results.push(result),
                CandidateVerdict::BelowThreshold(_) => report.below_threshold += 1,
                CandidateVerdict::Rejected(_) => report.rejected += 1,
            }
        }
        sort_by_score_desc(&mut report.results);
        report
    }
}

/// Stable descending sort on score.
fn sort_by_score_desc(results: &mut [ScoreResult]) {
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::types::{FeatureWeights, ScoreThresholds};
    use crate::types::HistoricalPoint;

    fn create_test_candidate(address: &str) -> Candidate {
        Candidate {
            address: address.to_string(),
            volume_24h_usd: 50_000.0,
            liquidity_usd: 15_000.0,
            tx_count_24h: 500,
            top_holder_pct: Some(10.0),
            liquidity_locked: true,
            history: vec![
                HistoricalPoint { timestamp: 1690000000, volume: 30_000.0, liquidity: 9_000.0 },
                HistoricalPoint { timestamp: 1690086400, volume: 40_000.0, liquidity: 11_000.0 },
            ],
        }
    }

    fn create_test_scorer() -> CandidateScorer {
        CandidateScorer::new(ScoringConfig::default())
    }

    #[test]
    fn test_reference_candidate_passes() {
        let scorer = create_test_scorer();
        match scorer.evaluate(&create_test_candidate("Ref")) {
            CandidateVerdict::Passed(result) => {
                assert!((result.score - 21_199.0).abs() < 1e-9);
                assert_eq!(result.historical_bonus, 100.0);
                assert_eq!(result.top_holder_pct, 10.0);
            }
            other => panic!("expected pass, got {:?}", other),
        }
    }

    #[test]
    fn test_filter_order_reports_first_failure() {
        let scorer = create_test_scorer();
        let mut candidate = create_test_candidate("Bad");
        candidate.liquidity_usd = 5_000.0;
        candidate.tx_count_24h = 10;
        candidate.liquidity_locked = false;

        assert!(matches!(
            scorer.check_eligibility(&candidate),
            Err(Rejection::InsufficientLiquidity { .. })
        ));

        candidate.liquidity_usd = 20_000.0;
        assert!(matches!(
            scorer.check_eligibility(&candidate),
            Err(Rejection::InsufficientTxCount { tx_count: 10, min: 300 })
        ));

        candidate.tx_count_24h = 300;
        assert_eq!(scorer.check_eligibility(&candidate), Err(Rejection::LiquidityNotLocked));
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        let scorer = create_test_scorer();
        let mut candidate = create_test_candidate("Edge");
        candidate.liquidity_usd = 10_000.0;
        candidate.tx_count_24h = 300;
        candidate.top_holder_pct = Some(30.0);
        assert!(scorer.check_eligibility(&candidate).is_ok());

        candidate.top_holder_pct = Some(30.01);
        assert!(matches!(
            scorer.check_eligibility(&candidate),
            Err(Rejection::HolderConcentration { .. })
        ));
    }

    #[test]
    fn test_no_holder_data_passes_holder_check() {
        let scorer = create_test_scorer();
        let mut candidate = create_test_candidate("NoHolders");
        candidate.top_holder_pct = None;
        assert!(scorer.check_eligibility(&candidate).is_ok());
    }

    #[test]
    fn test_lock_not_required() {
        let config = ScoringConfig {
            thresholds: ScoreThresholds { require_liquidity_lock: false, ..ScoreThresholds::default() },
            ..ScoringConfig::default()
        };
        let scorer = CandidateScorer::new(config);
        let mut candidate = create_test_candidate("Unlocked");
        candidate.liquidity_locked = false;
        assert!(scorer.check_eligibility(&candidate).is_ok());
    }

    #[test]
    fn test_below_threshold() {
        let config = ScoringConfig {
            thresholds: ScoreThresholds { min_score: 25_000.0, ..ScoreThresholds::default() },
            weights: FeatureWeights::default(),
        };
        let scorer = CandidateScorer::new(config);
        assert!(matches!(
            scorer.evaluate(&create_test_candidate("Low")),
            CandidateVerdict::BelowThreshold(_)
        ));
        let report = scorer.rank(&[create_test_candidate("Low")]);
        assert!(report.results.is_empty());
        assert_eq!(report.below_threshold, 1);
    }

    #[test]
    fn test_rank_sorts_descending_and_is_stable() {
        let scorer = create_test_scorer();
        let mut big = create_test_candidate("Big");
        big.volume_24h_usd = 90_000.0;
        let tie_a = create_test_candidate("TieA");
        let tie_b = create_test_candidate("TieB");
        let mut rejected = create_test_candidate("Rejected");
        rejected.liquidity_locked = false;

        let candidates = vec![tie_a, rejected, big, tie_b];
        let report = scorer.rank(&candidates);
        assert_eq!(report.rejected, 1);
        let ranked = report.results;
        let order: Vec<&str> = ranked.iter().map(|r| r.address.as_str()).collect();
        assert_eq!(order, vec!["Big", "TieA", "TieB"]);

        // Re-running gives the same answer
        assert_eq!(scorer.rank(&candidates).results, ranked);
    }

    #[test]
    fn test_raising_thresholds_never_grows_eligible_set() {
        let candidates: Vec<Candidate> = (0..20)
            .map(|i| {
                let mut c = create_test_candidate(&format!("T{}", i));
                c.liquidity_usd = 5_000.0 + i as f64 * 1_000.0;
                c.tx_count_24h = 200 + i * 20;
                c
            })
            .collect();

        let mut previous = usize::MAX;
        for step in 0..10 {
            let thresholds = ScoreThresholds {
                min_liquidity_usd: 5_000.0 + step as f64 * 2_000.0,
                min_tx_count_24h: 200 + step * 30,
                ..ScoreThresholds::default()
            };
            let scorer = CandidateScorer::new(ScoringConfig { thresholds, ..ScoringConfig::default() });
            let eligible = candidates.iter().filter(|c| scorer.check_eligibility(c).is_ok()).count();
            assert!(eligible <= previous);
            previous = eligible;
        }
    }
}
