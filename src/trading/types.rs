//! Trade and milestone types.

use crate::error::LadderError;
use crate::types::Pubkey;
use chrono::{DateTime, Utc};
use nonempty::{nonempty, NonEmpty};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type TradeId = Uuid;

/// The default scale-out ladder: +30%, +65%, +100%.
pub fn default_milestone_ladder() -> NonEmpty<f64> {
    nonempty![30.0, 65.0, 100.0]
}

/// A profit-percentage trigger for a partial exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    /// Gain over entry price, e.g. 30.0 for +30%
    pub percentage_gain: f64,
    /// Whether this milestone has been sold
    pub is_sold: bool,
    /// USD amount sold when the milestone was realized
    pub sold_amount: f64,
}

impl Milestone {
    pub fn new(percentage_gain: f64) -> Self {
        Self {
            percentage_gain,
            is_sold: false,
            sold_amount: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeStatus {
    Open,
    Stopped,
    Completed,
}

impl TradeStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TradeStatus::Open)
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TradeStatus::Open => "OPEN",
            TradeStatus::Stopped => "STOPPED",
            TradeStatus::Completed => "COMPLETED",
        };
        f.write_str(s)
    }
}

/// One open position and its milestone ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub token_address: Pubkey,
    /// USD price at which the position was entered
    pub entry_price: f64,
    /// USD amount invested
    pub investment_amount: f64,
    /// Sorted by ascending `percentage_gain`
    pub milestones: Vec<Milestone>,
    /// Loss percentage from entry that triggers full liquidation
    pub stop_loss: f64,
    pub status: TradeStatus,
    pub opened_at: DateTime<Utc>,
    /// Share of the budget (in percent) that funded this trade, if known
    pub purchase_level_pct: Option<f64>,
}

impl Trade {
    /// Open a trade with the default 30/65/100 ladder.
    pub fn new(
        token_address: impl Into<Pubkey>,
        entry_price: f64,
        investment_amount: f64,
        stop_loss: f64,
    ) -> Result<Self, LadderError> {
        Self::with_milestones(
            token_address,
            entry_price,
            investment_amount,
            stop_loss,
            default_milestone_ladder(),
        )
    }

    /// Open a trade with a custom ladder. Milestones are sorted ascending.
    ///
    /// The ladder total is not checked against 100%: every milestone sells a
    /// fixed share of the original investment.
    pub fn with_milestones(
        token_address: impl Into<Pubkey>,
        entry_price: f64,
        investment_amount: f64,
        stop_loss: f64,
        ladder: NonEmpty<f64>,
    ) -> Result<Self, LadderError> {
        if !entry_price.is_finite() || entry_price <= 0.0 {
            return Err(LadderError::InvalidTrade(format!("entry price must be positive, got {}", entry_price)));
        }
        if !investment_amount.is_finite() || investment_amount <= 0.0 {
            return Err(LadderError::InvalidTrade(format!(
                "investment must be positive, got {}",
                investment_amount
            )));
        }
        if !stop_loss.is_finite() || stop_loss <= 0.0 {
            return Err(LadderError::InvalidTrade(format!("stop-loss must be positive, got {}", stop_loss)));
        }
        if ladder.iter().any(|g| !g.is_finite() || *g <= 0.0) {
            return Err(LadderError::InvalidTrade("milestone gains must be positive".to_string()));
        }

        let mut milestones: Vec<Milestone> = ladder.into_iter().map(Milestone::new).collect();
        milestones.sort_by(|a, b| a.percentage_gain.total_cmp(&b.percentage_gain));

        Ok(Self {
            id: Uuid::new_v4(),
            token_address: token_address.into(),
            entry_price,
            investment_amount,
            milestones,
            stop_loss,
            status: TradeStatus::Open,
            opened_at: Utc::now(),
            purchase_level_pct: None,
        })
    }

    pub fn with_purchase_level(mut self, pct: f64) -> Self {
        self.purchase_level_pct = Some(pct);
        self
    }

    pub fn is_open(&self) -> bool {
        self.status == TradeStatus::Open
    }

    /// Percent change of `current_price` relative to entry.
    pub fn pct_change(&self, current_price: f64) -> f64 {
        (current_price - self.entry_price) / self.entry_price * 100.0
    }

    /// Total USD sold through milestones so far.
    pub fn realized_amount(&self) -> f64 {
        self.milestones.iter().map(|m| m.sold_amount).sum()
    }

    /// Part of the original investment not yet sold, never negative.
    pub fn remaining_investment(&self) -> f64 {
        (self.investment_amount - self.realized_amount()).max(0.0)
    }

    pub fn all_milestones_realized(&self) -> bool {
        self.milestones.iter().all(|m| m.is_sold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_trade() {
        let trade = Trade::new("Tok", 1.0, 100.0, 10.0).unwrap();
        let gains: Vec<f64> = trade.milestones.iter().map(|m| m.percentage_gain).collect();
        assert_eq!(gains, vec![30.0, 65.0, 100.0]);
        assert_eq!(trade.status, TradeStatus::Open);
        assert!(trade.milestones.iter().all(|m| !m.is_sold && m.sold_amount == 0.0));
        assert_eq!(trade.remaining_investment(), 100.0);
    }

    #[test]
    fn test_custom_ladder_is_sorted() {
        let trade = Trade::with_milestones("Tok", 2.0, 50.0, 5.0, nonempty![50.0, 10.0, 25.0]).unwrap();
        let gains: Vec<f64> = trade.milestones.iter().map(|m| m.percentage_gain).collect();
        assert_eq!(gains, vec![10.0, 25.0, 50.0]);
    }

    #[test]
    fn test_invalid_trades_rejected() {
        assert!(Trade::new("Tok", 0.0, 100.0, 10.0).is_err());
        assert!(Trade::new("Tok", f64::NAN, 100.0, 10.0).is_err());
        assert!(Trade::new("Tok", 1.0, -5.0, 10.0).is_err());
        assert!(Trade::new("Tok", 1.0, 100.0, 0.0).is_err());
        assert!(Trade::with_milestones("Tok", 1.0, 100.0, 10.0, nonempty![30.0, -1.0]).is_err());
    }

    #[test]
    fn test_unique_ids() {
        let a = Trade::new("Tok", 1.0, 100.0, 10.0).unwrap();
        let b = Trade::new("Tok", 1.0, 100.0, 10.0).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_pct_change_and_remaining() {
        let mut trade = Trade::new("Tok", 1.0, 100.0, 10.0).unwrap();
        assert!((trade.pct_change(1.31) - 31.0).abs() < 1e-9);
        assert!((trade.pct_change(0.85) + 15.0).abs() < 1e-9);

        trade.milestones[0].is_sold = true;
        trade.milestones[0].sold_amount = 30.0;
        trade.milestones[1].is_sold = true;
        trade.milestones[1].sold_amount = 65.0;
        trade.milestones[2].is_sold = true;
        trade.milestones[2].sold_amount = 100.0;
        assert_eq!(trade.realized_amount(), 195.0);
        assert_eq!(trade.remaining_investment(), 0.0);
        assert!(trade.all_milestones_realized());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(TradeStatus::Open.to_string(), "OPEN");
        assert_eq!(TradeStatus::Stopped.to_string(), "STOPPED");
        assert!(TradeStatus::Completed.is_terminal());
        assert!(!TradeStatus::Open.is_terminal());
    }
}
