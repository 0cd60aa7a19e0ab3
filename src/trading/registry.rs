//! Trade registry - the single owner of all open trades.
//!
//! All access goes through a mutex that is held only for the map operation
//! itself. Callers work on snapshot copies and hand updated trades back via
//! `commit`. The registry never holds a STOPPED or COMPLETED trade.

use crate::error::LadderError;
use crate::trading::lifecycle::Evaluation;
use crate::trading::types::{Trade, TradeId};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// What `commit` did with an evaluated trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Entry replaced with the updated trade
    Updated,
    /// Terminal trade removed
    Removed,
    /// Trade had already been removed by someone else; nothing changed
    Missing,
}

#[derive(Debug, Default)]
pub struct TradeRegistry {
    trades: Mutex<HashMap<TradeId, Trade>>,
}

impl TradeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an OPEN trade.
    pub async fn add(&self, trade: Trade) -> Result<TradeId, LadderError> {
        if !trade.is_open() {
            return Err(LadderError::InvalidTrade(format!(
                "cannot register trade {} with status {}",
                trade.id, trade.status
            )));
        }

        let id = trade.id;
        let mut trades = self.trades.lock().await;
        if trades.contains_key(&id) {
            return Err(LadderError::DuplicateTrade(id));
        }
        trades.insert(id, trade);
        drop(trades);

        info!("Trade {} added", id);
        Ok(id)
    }

    pub async fn remove(&self, id: &TradeId) -> Option<Trade> {
        let removed = self.trades.lock().await.remove(id);
        if removed.is_some() {
            info!("Trade {} removed", id);
        }
        removed
    }

    pub async fn get(&self, id: &TradeId) -> Option<Trade> {
        self.trades.lock().await.get(id).cloned()
    }

    /// Point-in-time copy of all open trades, oldest first.
    pub async fn snapshot(&self) -> Vec<Trade> {
        let mut trades: Vec<Trade> = self.trades.lock().await.values().cloned().collect();
        trades.sort_by(|a, b| a.opened_at.cmp(&b.opened_at).then_with(|| a.id.cmp(&b.id)));
        trades
    }

    /// Write back a trade after evaluation.
    ///
    /// Terminal evaluations remove the entry. Other results replace it, but
    /// only if it is still registered, so a concurrent `remove` wins.
    pub async fn commit(&self, trade: Trade, evaluation: &Evaluation) -> CommitOutcome {
        let id = trade.id;
        let mut trades = self.trades.lock().await;

        if evaluation.is_terminal() || trade.status.is_terminal() {
            let outcome = match trades.remove(&id) {
                Some(_) => CommitOutcome::Removed,
                None => CommitOutcome::Missing,
            };
            drop(trades);
            info!("Trade {} retired with status {}", id, trade.status);
            return outcome;
        }

        match trades.get_mut(&id) {
            Some(entry) => {
                *entry = trade;
                CommitOutcome::Updated
            }
            None => {
                debug!("Trade {} no longer registered, dropping update", id);
                CommitOutcome::Missing
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.trades.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.trades.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trading::types::TradeStatus;
    use std::sync::Arc;

    fn create_test_trade(address: &str) -> Trade {
        Trade::new(address, 1.0, 100.0, 10.0).unwrap()
    }

    #[tokio::test]
    async fn test_add_remove_snapshot() {
        let registry = TradeRegistry::new();
        let a = registry.add(create_test_trade("A")).await.unwrap();
        let b = registry.add(create_test_trade("B")).await.unwrap();

        assert_eq!(registry.len().await, 2);
        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.len(), 2);

        assert!(registry.remove(&a).await.is_some());
        assert!(registry.remove(&a).await.is_none());

        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, b);
    }

    #[tokio::test]
    async fn test_rejects_duplicates_and_terminal_trades() {
        let registry = TradeRegistry::new();
        let trade = create_test_trade("A");
        registry.add(trade.clone()).await.unwrap();
        assert!(matches!(registry.add(trade).await, Err(LadderError::DuplicateTrade(_))));

        let mut stopped = create_test_trade("B");
        stopped.status = TradeStatus::Stopped;
        assert!(matches!(registry.add(stopped).await, Err(LadderError::InvalidTrade(_))));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_snapshot_is_oldest_first() {
        let registry = TradeRegistry::new();
        let mut older = create_test_trade("Old");
        older.opened_at = older.opened_at - chrono::Duration::minutes(5);
        let newer = create_test_trade("New");

        registry.add(newer).await.unwrap();
        registry.add(older).await.unwrap();

        let addresses: Vec<String> = registry.snapshot().await.into_iter().map(|t| t.token_address).collect();
        assert_eq!(addresses, vec!["Old".to_string(), "New".to_string()]);
    }

    #[tokio::test]
    async fn test_commit_updates_and_removes() {
        let registry = TradeRegistry::new();
        let id = registry.add(create_test_trade("A")).await.unwrap();

        let mut trade = registry.get(&id).await.unwrap();
        trade.milestones[0].is_sold = true;
        trade.milestones[0].sold_amount = 30.0;
        let evaluation = Evaluation::MilestoneRealized {
            pct_change: 31.0,
            percentage_gain: 30.0,
            sold_usd: 30.0,
            completed: false,
        };
        assert_eq!(registry.commit(trade, &evaluation).await, CommitOutcome::Updated);
        assert!(registry.get(&id).await.unwrap().milestones[0].is_sold);

        let mut trade = registry.get(&id).await.unwrap();
        trade.status = TradeStatus::Stopped;
        let evaluation = Evaluation::Stopped { pct_change: -15.0, liquidated_usd: 70.0 };
        assert_eq!(registry.commit(trade, &evaluation).await, CommitOutcome::Removed);
        assert!(registry.is_empty().await);
        assert!(registry.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_commit_does_not_resurrect_removed_trade() {
        let registry = TradeRegistry::new();
        let id = registry.add(create_test_trade("A")).await.unwrap();
        let trade = registry.get(&id).await.unwrap();

        registry.remove(&id).await;
        let outcome = registry.commit(trade, &Evaluation::Hold { pct_change: 1.0 }).await;
        assert_eq!(outcome, CommitOutcome::Missing);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_concurrent_adds() {
        let registry = Arc::new(TradeRegistry::new());
        let mut handles = Vec::new();
        for i in 0..50 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.add(create_test_trade(&format!("T{}", i))).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(registry.len().await, 50);
        assert!(registry.snapshot().await.iter().all(|t| t.is_open()));
    }
}
