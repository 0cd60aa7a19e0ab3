//! Trade lifecycle state machine.
//!
//! `decide` is the pure part: given a trade and a price it picks at most one
//! action. `evaluate` executes that action against the venue and applies the
//! result to the trade. OPEN -> STOPPED and OPEN -> COMPLETED are the only
//! transitions; terminal trades are never touched again.

use crate::error::LadderError;
use crate::trading::execution::ExecutionVenue;
use crate::trading::types::{Trade, TradeStatus};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, instrument, warn};

/// Tolerance for percentage comparisons, so that an exact 10% drop hits a 10% stop.
pub const PCT_EPSILON: f64 = 1e-9;

/// What the trade should do at the current price.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Trade is STOPPED or COMPLETED already
    NotOpen,
    Hold { pct_change: f64 },
    /// Stop-loss hit: sell everything not yet realized
    Liquidate { pct_change: f64, amount_usd: f64 },
    /// Realize the milestone at `index`
    SellMilestone { pct_change: f64, index: usize, amount_usd: f64 },
}

/// Result of one `evaluate` call.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    NotOpen,
    Hold { pct_change: f64 },
    Stopped { pct_change: f64, liquidated_usd: f64 },
    StopLossFailed { pct_change: f64, reason: String },
    MilestoneRealized {
        pct_change: f64,
        percentage_gain: f64,
        sold_usd: f64,
        completed: bool,
    },
    MilestoneFailed {
        pct_change: f64,
        percentage_gain: f64,
        reason: String,
    },
}

impl Evaluation {
    /// Whether the trade reached STOPPED or COMPLETED and must leave the registry.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Evaluation::Stopped { .. } | Evaluation::MilestoneRealized { completed: true, .. }
        )
    }

    pub fn is_execution_failure(&self) -> bool {
        matches!(self, Evaluation::StopLossFailed { .. } | Evaluation::MilestoneFailed { .. })
    }
}

/// Pick the action for `trade` at `current_price`.
///
/// Stop-loss takes priority. Otherwise the first unrealized milestone (in
/// ascending order) whose gain is reached is chosen; at most one per call.
pub fn decide(trade: &Trade, current_price: f64) -> Decision {
    if trade.status != TradeStatus::Open {
        return Decision::NotOpen;
    }

    let pct_change = trade.pct_change(current_price);

    if pct_change <= -trade.stop_loss + PCT_EPSILON {
        return Decision::Liquidate {
            pct_change,
            amount_usd: trade.remaining_investment(),
        };
    }

    let next = trade
        .milestones
        .iter()
        .enumerate()
        .find(|(_, m)| !m.is_sold && m.percentage_gain <= pct_change + PCT_EPSILON);

    match next {
        Some((index, milestone)) => Decision::SellMilestone {
            pct_change,
            index,
            amount_usd: trade.investment_amount * (milestone.percentage_gain / 100.0),
        },
        None => Decision::Hold { pct_change },
    }
}

/// Evaluate one trade at `current_price`, executing any resulting sell.
///
/// Mutates only `trade`. On execution failure nothing changes, so the next
/// tick retries.
#[instrument(skip(trade, venue), fields(trade_id = %trade.id, address = %trade.token_address))]
pub async fn evaluate(
    trade: &mut Trade,
    current_price: f64,
    venue: &dyn ExecutionVenue,
    call_timeout: Duration,
) -> Evaluation {
    match decide(trade, current_price) {
        Decision::NotOpen => Evaluation::NotOpen,
        Decision::Hold { pct_change } => Evaluation::Hold { pct_change },
        Decision::Liquidate { pct_change, amount_usd } if amount_usd <= 0.0 => {
            // Milestones already sold the whole investment
            trade.status = TradeStatus::Stopped;
            info!(
                "Trade {} hit stop-loss at {:.2}% with nothing left to sell",
                trade.id, pct_change
            );
            Evaluation::Stopped {
                pct_change,
                liquidated_usd: 0.0,
            }
        }
        Decision::Liquidate { pct_change, amount_usd } => {
            warn!(
                "Trade {} hit stop-loss at {:.2}% (limit -{:.2}%). Liquidating ${:.2}",
                trade.id, pct_change, trade.stop_loss, amount_usd
            );
            match sell(venue, &trade.token_address, amount_usd, call_timeout).await {
                Ok(()) => {
                    trade.status = TradeStatus::Stopped;
                    info!("Trade {} liquidated due to stop-loss", trade.id);
                    Evaluation::Stopped {
                        pct_change,
                        liquidated_usd: amount_usd,
                    }
                }
                Err(e) => {
                    warn!("Stop-loss liquidation failed, will retry next tick: {}", e);
                    Evaluation::StopLossFailed {
                        pct_change,
                        reason: e.to_string(),
                    }
                }
            }
        }
        Decision::SellMilestone { pct_change, index, amount_usd } => {
            let percentage_gain = trade.milestones[index].percentage_gain;
            match sell(venue, &trade.token_address, amount_usd, call_timeout).await {
                Ok(()) => {
                    let milestone = &mut trade.milestones[index];
                    milestone.is_sold = true;
                    milestone.sold_amount = amount_usd;
                    info!(
                        "Sold ${:.2} of {} at milestone {}%",
                        amount_usd, trade.token_address, percentage_gain
                    );

                    let completed = trade.all_milestones_realized();
                    if completed {
                        trade.status = TradeStatus::Completed;
                        info!("Trade {} completed", trade.id);
                    }
                    Evaluation::MilestoneRealized {
                        pct_change,
                        percentage_gain,
                        sold_usd: amount_usd,
                        completed,
                    }
                }
                Err(e) => {
                    warn!("Milestone {}% sell failed, will retry next tick: {}", percentage_gain, e);
                    Evaluation::MilestoneFailed {
                        pct_change,
                        percentage_gain,
                        reason: e.to_string(),
                    }
                }
            }
        }
    }
}

async fn sell(
    venue: &dyn ExecutionVenue,
    address: &str,
    amount_usd: f64,
    call_timeout: Duration,
) -> Result<(), LadderError> {
    match timeout(call_timeout, venue.execute_sell(address, amount_usd)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(LadderError::execution_failed(address, amount_usd, e)),
        Err(_) => Err(LadderError::execution_failed(
            address,
            amount_usd,
            format!("sell timed out after {:?}", call_timeout),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingVenue {
        sells: Mutex<Vec<(String, f64)>>,
        fail: AtomicBool,
    }

    impl RecordingVenue {
        fn failing() -> Self {
            let venue = Self::default();
            venue.fail.store(true, Ordering::SeqCst);
            venue
        }

        fn sells(&self) -> Vec<(String, f64)> {
            self.sells.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ExecutionVenue for RecordingVenue {
        async fn execute_sell(&self, address: &str, amount_usd: f64) -> Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(anyhow!("venue unavailable"));
            }
            self.sells.lock().unwrap().push((address.to_string(), amount_usd));
            Ok(())
        }

        async fn execute_buy(&self, _address: &str, _amount_usd: f64) -> Result<f64> {
            Err(anyhow!("not used"))
        }
    }

    const TIMEOUT: Duration = Duration::from_secs(1);

    fn create_test_trade() -> Trade {
        Trade::new("Tok", 1.0, 100.0, 10.0).unwrap()
    }

    #[test]
    fn test_decide_hold_between_levels() {
        let trade = create_test_trade();
        assert!(matches!(decide(&trade, 1.05), Decision::Hold { .. }));
        assert!(matches!(decide(&trade, 0.95), Decision::Hold { .. }));
    }

    #[test]
    fn test_decide_exact_stop_loss_boundary() {
        let trade = create_test_trade();
        assert!(matches!(decide(&trade, 0.90), Decision::Liquidate { .. }));
    }

    #[test]
    fn test_decide_one_milestone_even_after_a_jump() {
        let trade = create_test_trade();
        match decide(&trade, 2.5) {
            Decision::SellMilestone { index, amount_usd, .. } => {
                assert_eq!(index, 0);
                assert!((amount_usd - 30.0).abs() < 1e-9);
            }
            other => panic!("unexpected decision {:?}", other),
        }
    }

    #[test]
    fn test_decide_skips_realized_milestones() {
        let mut trade = create_test_trade();
        trade.milestones[0].is_sold = true;
        trade.milestones[0].sold_amount = 30.0;
        match decide(&trade, 1.70) {
            Decision::SellMilestone { index, amount_usd, .. } => {
                assert_eq!(index, 1);
                assert!((amount_usd - 65.0).abs() < 1e-9);
            }
            other => panic!("unexpected decision {:?}", other),
        }
    }

    #[test]
    fn test_decide_liquidates_only_remaining() {
        let mut trade = create_test_trade();
        trade.milestones[0].is_sold = true;
        trade.milestones[0].sold_amount = 30.0;
        match decide(&trade, 0.5) {
            Decision::Liquidate { amount_usd, .. } => assert!((amount_usd - 70.0).abs() < 1e-9),
            other => panic!("unexpected decision {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stop_loss_scenario() {
        let venue = RecordingVenue::default();
        let mut trade = create_test_trade();

        let evaluation = evaluate(&mut trade, 0.85, &venue, TIMEOUT).await;

        assert!(matches!(evaluation, Evaluation::Stopped { liquidated_usd, .. } if liquidated_usd == 100.0));
        assert!(evaluation.is_terminal());
        assert_eq!(trade.status, TradeStatus::Stopped);
        assert_eq!(venue.sells(), vec![("Tok".to_string(), 100.0)]);
    }

    #[tokio::test]
    async fn test_first_milestone_scenario() {
        let venue = RecordingVenue::default();
        let mut trade = create_test_trade();

        let evaluation = evaluate(&mut trade, 1.31, &venue, TIMEOUT).await;

        match evaluation {
            Evaluation::MilestoneRealized { percentage_gain, sold_usd, completed, .. } => {
                assert_eq!(percentage_gain, 30.0);
                assert!((sold_usd - 30.0).abs() < 1e-9);
                assert!(!completed);
            }
            other => panic!("unexpected evaluation {:?}", other),
        }
        assert_eq!(trade.status, TradeStatus::Open);
        assert!(trade.milestones[0].is_sold);
        assert!(!trade.milestones[1].is_sold);
        assert!(!trade.milestones[2].is_sold);
    }

    #[tokio::test]
    async fn test_realized_milestone_is_never_resold() {
        let venue = RecordingVenue::default();
        let mut trade = create_test_trade();

        evaluate(&mut trade, 1.31, &venue, TIMEOUT).await;
        for _ in 0..5 {
            let evaluation = evaluate(&mut trade, 1.31, &venue, TIMEOUT).await;
            assert!(matches!(evaluation, Evaluation::Hold { .. }));
        }
        assert_eq!(venue.sells().len(), 1);
        assert!(trade.milestones[0].is_sold);
        assert!((trade.milestones[0].sold_amount - 30.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_stop_loss_with_nothing_left_skips_the_venue() {
        // Ladder sums past 100%, so the first two milestones already sold it all
        let venue = RecordingVenue::failing();
        let mut trade =
            Trade::with_milestones("Tok", 1.0, 100.0, 10.0, nonempty::nonempty![50.0, 60.0, 200.0]).unwrap();
        trade.milestones[0].is_sold = true;
        trade.milestones[0].sold_amount = 50.0;
        trade.milestones[1].is_sold = true;
        trade.milestones[1].sold_amount = 60.0;
        assert_eq!(trade.remaining_investment(), 0.0);

        let evaluation = evaluate(&mut trade, 0.5, &venue, TIMEOUT).await;

        assert!(matches!(evaluation, Evaluation::Stopped { liquidated_usd, .. } if liquidated_usd == 0.0));
        assert!(evaluation.is_terminal());
        assert_eq!(trade.status, TradeStatus::Stopped);
        assert!(venue.sells().is_empty());
    }

    #[tokio::test]
    async fn test_completion_after_last_milestone() {
        let venue = RecordingVenue::default();
        let mut trade = create_test_trade();

        let mut evaluations = Vec::new();
        for _ in 0..3 {
            evaluations.push(evaluate(&mut trade, 2.0, &venue, TIMEOUT).await);
        }

        assert!(!evaluations[0].is_terminal());
        assert!(!evaluations[1].is_terminal());
        assert!(evaluations[2].is_terminal());
        assert_eq!(trade.status, TradeStatus::Completed);
        let amounts: Vec<f64> = venue.sells().into_iter().map(|(_, a)| a).collect();
        assert_eq!(amounts.len(), 3);
        assert!((amounts[0] - 30.0).abs() < 1e-9);
        assert!((amounts[1] - 65.0).abs() < 1e-9);
        assert!((amounts[2] - 100.0).abs() < 1e-9);

        // Terminal trades are left alone
        assert_eq!(evaluate(&mut trade, 0.1, &venue, TIMEOUT).await, Evaluation::NotOpen);
        assert_eq!(venue.sells().len(), 3);
    }

    #[tokio::test]
    async fn test_stop_loss_preempts_milestones() {
        let venue = RecordingVenue::default();
        // Constructors refuse negative gains, so force one in to make both paths eligible
        let mut trade = create_test_trade();
        trade.milestones[0].percentage_gain = -80.0;

        // -60% satisfies the stop and the milestone; only liquidation happens
        let evaluation = evaluate(&mut trade, 0.4, &venue, TIMEOUT).await;
        assert!(matches!(evaluation, Evaluation::Stopped { .. }));
        assert!(trade.milestones.iter().all(|m| !m.is_sold));
        assert_eq!(venue.sells().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_sell_leaves_state_for_retry() {
        let venue = RecordingVenue::failing();
        let mut trade = create_test_trade();

        let evaluation = evaluate(&mut trade, 1.31, &venue, TIMEOUT).await;
        assert!(evaluation.is_execution_failure());
        assert!(!trade.milestones[0].is_sold);
        assert_eq!(trade.status, TradeStatus::Open);

        let evaluation = evaluate(&mut trade, 0.85, &venue, TIMEOUT).await;
        assert!(matches!(evaluation, Evaluation::StopLossFailed { .. }));
        assert_eq!(trade.status, TradeStatus::Open);

        // Venue recovers, the next tick succeeds
        venue.fail.store(false, Ordering::SeqCst);
        let evaluation = evaluate(&mut trade, 0.85, &venue, TIMEOUT).await;
        assert!(evaluation.is_terminal());
        assert_eq!(trade.status, TradeStatus::Stopped);
    }
}
