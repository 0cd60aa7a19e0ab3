//! Data sources for assembling candidates.
//!
//! Each external capability is a single-method trait so live providers and
//! static/test sources are interchangeable. `AssembledFeed` stitches them
//! together into `Candidate`s.

use crate::error::LadderError;
use crate::scoring::types::{CandidateBatch, SkippedCandidate};
use crate::types::{Candidate, HistoricalPoint, HolderShare, MarketSnapshot, Pubkey};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

/// Token listing plus per-token market numbers.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Addresses of tokens worth screening.
    async fn list_tokens(&self) -> Result<Vec<Pubkey>>;

    /// Current volume/liquidity/tx-count for one token.
    async fn fetch_market_snapshot(&self, address: &str) -> Result<MarketSnapshot>;
}

/// Largest holders of a token. `Ok(vec![])` means no holder data.
#[async_trait]
pub trait HolderDistributionSource: Send + Sync {
    async fn top_holders(&self, address: &str) -> Result<Vec<HolderShare>>;
}

#[async_trait]
pub trait LiquidityLockSource: Send + Sync {
    async fn is_locked(&self, address: &str) -> Result<bool>;
}

/// Historical series, oldest first.
#[async_trait]
pub trait HistoricalDataSource: Send + Sync {
    async fn history(&self, address: &str) -> Result<Vec<HistoricalPoint>>;
}

/// Anything that can produce a batch of candidates for a screening run.
#[async_trait]
pub trait CandidateFeed: Send + Sync {
    async fn fetch_candidates(&self) -> Result<CandidateBatch>;
}

/// Builds candidates from a market-data provider and the auxiliary sources.
///
/// A failed market snapshot skips the candidate. Auxiliary failures degrade:
/// no holder data, lock treated as not locked, empty history.
pub struct AssembledFeed {
    market: Arc<dyn MarketDataProvider>,
    holders: Arc<dyn HolderDistributionSource>,
    locks: Arc<dyn LiquidityLockSource>,
    history: Arc<dyn HistoricalDataSource>,
    request_timeout: Duration,
}

impl AssembledFeed {
    pub fn new(
        market: Arc<dyn MarketDataProvider>,
        holders: Arc<dyn HolderDistributionSource>,
        locks: Arc<dyn LiquidityLockSource>,
        history: Arc<dyn HistoricalDataSource>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            market,
            holders,
            locks,
            history,
            request_timeout,
        }
    }

    /// Assemble one candidate. Errors only when the market snapshot is unavailable.
    #[instrument(skip(self))]
    pub async fn assemble(&self, address: &str) -> Result<Candidate, LadderError> {
        let snapshot = bounded(self.request_timeout, self.market.fetch_market_snapshot(address))
            .await
            .map_err(|e| LadderError::data_unavailable(address, e))?;

        let top_holder_pct = match bounded(self.request_timeout, self.holders.top_holders(address)).await {
            Ok(holders) => holders.iter().map(|h| h.percentage).reduce(f64::max),
            Err(e) => {
                warn!("Holder data unavailable for {}: {}", address, e);
                None
            }
        };

        let liquidity_locked = match bounded(self.request_timeout, self.locks.is_locked(address)).await {
            Ok(locked) => locked,
            Err(e) => {
                warn!("Liquidity lock status unavailable for {}, treating as unlocked: {}", address, e);
                false
            }
        };

        let mut history = match bounded(self.request_timeout, self.history.history(address)).await {
            Ok(points) => points,
            Err(e) => {
                warn!("Historical data unavailable for {}: {}", address, e);
                Vec::new()
            }
        };
        history.sort_by_key(|p| p.timestamp);

        Ok(Candidate {
            address: address.to_string(),
            volume_24h_usd: snapshot.volume_24h_usd,
            liquidity_usd: snapshot.liquidity_usd,
            tx_count_24h: snapshot.tx_count_24h,
            top_holder_pct,
            liquidity_locked,
            history,
        })
    }
}

#[async_trait]
impl CandidateFeed for AssembledFeed {
    async fn fetch_candidates(&self) -> Result<CandidateBatch> {
        let addresses = bounded(self.request_timeout, self.market.list_tokens()).await?;
        info!("Assembling {} candidates", addresses.len());

        let mut batch = CandidateBatch::default();
        for address in addresses {
            match self.assemble(&address).await {
                Ok(candidate) => batch.candidates.push(candidate),
                Err(e) => {
                    warn!("Skipping candidate: {}", e);
                    batch.skipped.push(SkippedCandidate {
                        address,
                        reason: e.to_string(),
                    });
                }
            }
        }

        debug!(
            "Assembled {} candidates, skipped {}",
            batch.candidates.len(),
            batch.skipped.len()
        );
        Ok(batch)
    }
}

/// Run a collaborator call with an upper bound on its duration.
pub(crate) async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(anyhow!("timed out after {:?}", limit)),
    }
}

// --- Static sources standing in for services that have no public API yet ---

/// Returns the same holder list for every token.
#[derive(Debug, Clone, Default)]
pub struct StaticHolderSource {
    pub holders: Vec<HolderShare>,
}

#[async_trait]
impl HolderDistributionSource for StaticHolderSource {
    async fn top_holders(&self, _address: &str) -> Result<Vec<HolderShare>> {
        Ok(self.holders.clone())
    }
}

/// Reports every token as locked (or unlocked).
#[derive(Debug, Clone, Copy)]
pub struct StaticLockSource {
    pub locked: bool,
}

#[async_trait]
impl LiquidityLockSource for StaticLockSource {
    async fn is_locked(&self, _address: &str) -> Result<bool> {
        Ok(self.locked)
    }
}

/// Returns the same series for every token.
#[derive(Debug, Clone, Default)]
pub struct StaticHistorySource {
    pub points: Vec<HistoricalPoint>,
}

#[async_trait]
impl HistoricalDataSource for StaticHistorySource {
    async fn history(&self, _address: &str) -> Result<Vec<HistoricalPoint>> {
        Ok(self.points.clone())
    }
}

/// Fixed candidate list, useful for dry runs and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticCandidateFeed {
    pub candidates: Vec<Candidate>,
}

#[async_trait]
impl CandidateFeed for StaticCandidateFeed {
    async fn fetch_candidates(&self) -> Result<CandidateBatch> {
        Ok(CandidateBatch {
            candidates: self.candidates.clone(),
            skipped: Vec::new(),
        })
    }
}
