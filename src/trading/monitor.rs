//! TradeMonitor - periodically re-prices every open trade and drives its lifecycle.
//!
//! Each tick snapshots the registry, evaluates every trade in its own task
//! (price fetch and sells happen with no lock held), then commits the results.
//! Ticks never overlap, so one trade is never evaluated twice at once.

use crate::config::MonitorConfig;
use crate::error::LadderError;
use crate::trading::execution::{ExecutionVenue, PriceSource};
use crate::trading::lifecycle::{evaluate, Evaluation};
use crate::trading::registry::{CommitOutcome, TradeRegistry};
use crate::trading::types::Trade;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{timeout, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

/// Counters for one monitor tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub evaluated: usize,
    pub price_unavailable: usize,
    pub milestones_realized: usize,
    pub stopped: usize,
    pub completed: usize,
    pub execution_failures: usize,
    /// Per-trade tasks that panicked or were cancelled
    pub task_failures: usize,
}

impl TickReport {
    fn record(&mut self, evaluation: &Evaluation) {
        self.evaluated += 1;
        match evaluation {
            Evaluation::Stopped { .. } => self.stopped += 1,
            Evaluation::MilestoneRealized { completed, .. } => {
                self.milestones_realized += 1;
                if *completed {
                    self.completed += 1;
                }
            }
            Evaluation::StopLossFailed { .. } | Evaluation::MilestoneFailed { .. } => {
                self.execution_failures += 1
            }
            Evaluation::NotOpen | Evaluation::Hold { .. } => {}
        }
    }
}

enum TradeTick {
    PriceUnavailable,
    Evaluated(Trade, Evaluation),
}

/// Periodic evaluator of the trade registry.
pub struct TradeMonitor {
    registry: Arc<TradeRegistry>,
    prices: Arc<dyn PriceSource>,
    venue: Arc<dyn ExecutionVenue>,
    interval: Duration,
    request_timeout: Duration,
    permits: Arc<Semaphore>,
}

impl TradeMonitor {
    pub fn new(
        registry: Arc<TradeRegistry>,
        prices: Arc<dyn PriceSource>,
        venue: Arc<dyn ExecutionVenue>,
        config: &MonitorConfig,
    ) -> Self {
        Self {
            registry,
            prices,
            venue,
            interval: Duration::from_secs(config.interval_secs),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            permits: Arc::new(Semaphore::new(config.max_concurrent_evaluations.max(1))),
        }
    }

    /// Override the tick interval (sub-second intervals are handy in tests).
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Main execution loop. Runs until `shutdown` turns true or its sender is
    /// dropped, or `max_ticks` ticks have run. The signal is only checked
    /// between ticks: an in-flight tick always finishes.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>, max_ticks: Option<u64>) {
        info!("TradeMonitor is running. Evaluating every {:?}", self.interval);

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = 0u64;

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = interval.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        info!("Shutdown channel closed");
                        break;
                    }
                    continue;
                }
            }

            let report = self.tick().await;
            ticks += 1;
            if report.evaluated > 0 || report.price_unavailable > 0 {
                info!(
                    "Tick {}: evaluated={} no_price={} milestones={} stopped={} completed={} exec_failures={}",
                    ticks,
                    report.evaluated,
                    report.price_unavailable,
                    report.milestones_realized,
                    report.stopped,
                    report.completed,
                    report.execution_failures
                );
            }

            if max_ticks.is_some_and(|max| ticks >= max) {
                info!("Reached {} ticks", ticks);
                break;
            }
        }

        info!("TradeMonitor stopped after {} ticks", ticks);
    }

    /// Evaluate every trade in the current snapshot once.
    #[instrument(skip(self))]
    pub async fn tick(&self) -> TickReport {
        let snapshot = self.registry.snapshot().await;
        let mut report = TickReport::default();
        if snapshot.is_empty() {
            debug!("No open trades");
            return report;
        }

        let mut tasks = JoinSet::new();
        for trade in snapshot {
            let prices = self.prices.clone();
            let venue = self.venue.clone();
            let permits = self.permits.clone();
            let request_timeout = self.request_timeout;

            tasks.spawn(async move {
                // The semaphore is never closed
                let _permit = permits.acquire_owned().await.ok();
                evaluate_one(trade, prices.as_ref(), venue.as_ref(), request_timeout).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(TradeTick::PriceUnavailable) => report.price_unavailable += 1,
                Ok(TradeTick::Evaluated(trade, evaluation)) => {
                    report.record(&evaluation);
                    let trade_id = trade.id;
                    if self.registry.commit(trade, &evaluation).await == CommitOutcome::Missing {
                        debug!("Trade {} was removed during the tick", trade_id);
                    }
                }
                Err(e) => {
                    error!("Trade evaluation task failed: {}", e);
                    report.task_failures += 1;
                }
            }
        }

        report
    }
}

async fn evaluate_one(
    mut trade: Trade,
    prices: &dyn PriceSource,
    venue: &dyn ExecutionVenue,
    request_timeout: Duration,
) -> TradeTick {
    match fetch_price(prices, &trade.token_address, request_timeout).await {
        Ok(price) => {
            let evaluation = evaluate(&mut trade, price, venue, request_timeout).await;
            TradeTick::Evaluated(trade, evaluation)
        }
        Err(e) => {
            warn!("Skipping trade {} this tick: {}", trade.id, e);
            TradeTick::PriceUnavailable
        }
    }
}

/// Fetch a price, treating errors, timeouts and non-positive values as unavailable.
async fn fetch_price(prices: &dyn PriceSource, address: &str, limit: Duration) -> Result<f64, LadderError> {
    let price = match timeout(limit, prices.fetch_current_price(address)).await {
        Ok(Ok(price)) => price,
        Ok(Err(e)) => return Err(LadderError::data_unavailable(address, e)),
        Err(_) => {
            return Err(LadderError::data_unavailable(
                address,
                format!("price fetch timed out after {:?}", limit),
            ))
        }
    };

    if !price.is_finite() || price <= 0.0 {
        return Err(LadderError::data_unavailable(address, format!("unusable price {}", price)));
    }
    Ok(price)
}
