//! Opens trades for screened tokens.
//!
//! Every passing token is bought once per configured investment level, each
//! fill becoming its own trade in the registry.

use crate::config::TradingConfig;
use crate::error::LadderError;
use crate::scoring::types::ScoreResult;
use crate::trading::execution::{ExecutionVenue, WalletBalance};
use crate::trading::registry::TradeRegistry;
use crate::trading::types::{Trade, TradeId};
use nonempty::NonEmpty;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OnboardingReport {
    pub opened: Vec<TradeId>,
    pub buy_failures: usize,
    pub insufficient_balance: usize,
    /// Fills that could not become a valid trade, e.g. a zero fill price
    pub invalid_fills: usize,
}

pub struct TradeOnboarder {
    registry: Arc<TradeRegistry>,
    venue: Arc<dyn ExecutionVenue>,
    wallet: Arc<dyn WalletBalance>,
    config: TradingConfig,
    ladder: NonEmpty<f64>,
    request_timeout: Duration,
}

impl TradeOnboarder {
    pub fn new(
        registry: Arc<TradeRegistry>,
        venue: Arc<dyn ExecutionVenue>,
        wallet: Arc<dyn WalletBalance>,
        config: TradingConfig,
        request_timeout: Duration,
    ) -> Result<Self, LadderError> {
        let ladder = config.milestone_ladder()?;
        Ok(Self {
            registry,
            venue,
            wallet,
            config,
            ladder,
            request_timeout,
        })
    }

    /// Buy into every result at every investment level, best score first.
    #[instrument(skip(self, results), fields(tokens = results.len()))]
    pub async fn open_positions(&self, results: &[ScoreResult]) -> OnboardingReport {
        let mut report = OnboardingReport::default();

        'tokens: for result in results {
            for &pct in &self.config.investment_percentages {
                if let Some(cap) = self.config.max_open_trades {
                    if self.registry.len().await >= cap {
                        info!("Open trade cap of {} reached", cap);
                        break 'tokens;
                    }
                }

                let amount = pct / 100.0 * self.config.total_budget_usd;
                if !amount.is_finite() || amount <= 0.0 {
                    continue;
                }

                match self.available_balance().await {
                    Ok(balance) if balance >= amount => {}
                    Ok(balance) => {
                        warn!(
                            "Insufficient balance for {} at {}%: need ${:.2}, have ${:.2}",
                            result.address, pct, amount, balance
                        );
                        report.insufficient_balance += 1;
                        continue;
                    }
                    Err(e) => {
                        warn!("Balance check failed before buying {}: {}", result.address, e);
                        report.insufficient_balance += 1;
                        continue;
                    }
                }

                match self.open_one(&result.address, amount, pct).await {
                    Ok(id) => report.opened.push(id),
                    Err(e) if e.is_recoverable() => {
                        warn!("{}", e);
                        report.buy_failures += 1;
                    }
                    Err(e) => {
                        error!("Cannot open trade for {} at {}%: {}", result.address, pct, e);
                        report.invalid_fills += 1;
                    }
                }
            }
        }

        info!(
            "Onboarding finished: {} opened, {} buy failures, {} skipped for balance, {} invalid fills",
            report.opened.len(),
            report.buy_failures,
            report.insufficient_balance,
            report.invalid_fills
        );
        report
    }

    async fn available_balance(&self) -> anyhow::Result<f64> {
        match timeout(self.request_timeout, self.wallet.available_usd()).await {
            Ok(balance) => balance,
            Err(_) => Err(anyhow::anyhow!("balance request timed out after {:?}", self.request_timeout)),
        }
    }

    async fn open_one(&self, address: &str, amount: f64, pct: f64) -> Result<TradeId, LadderError> {
        let entry_price = match timeout(self.request_timeout, self.venue.execute_buy(address, amount)).await {
            Ok(Ok(price)) => price,
            Ok(Err(e)) => return Err(LadderError::execution_failed(address, amount, e)),
            Err(_) => {
                return Err(LadderError::execution_failed(
                    address,
                    amount,
                    format!("buy timed out after {:?}", self.request_timeout),
                ))
            }
        };

        let trade = Trade::with_milestones(
            address,
            entry_price,
            amount,
            self.config.stop_loss_pct,
            self.ladder.clone(),
        )?
        .with_purchase_level(pct);

        let id = self.registry.add(trade).await?;
        info!("Opened trade {} for {}: ${:.2} at ${}", id, address, amount, entry_price);
        Ok(id)
    }
}
