//! Error taxonomy for the scoring and trade-management core.

use crate::trading::types::TradeId;
use crate::types::Pubkey;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LadderError {
    /// Provider or network failure. Skips the candidate or this tick's price update.
    #[error("Data unavailable for {address}: {reason}")]
    DataUnavailable { address: Pubkey, reason: String },

    /// A buy or sell call failed. Lifecycle state is left untouched for a retry.
    #[error("Execution failed for {address} (${amount_usd:.2}): {reason}")]
    ExecutionFailed {
        address: Pubkey,
        amount_usd: f64,
        reason: String,
    },

    /// Malformed weights, thresholds or intervals. Fatal at start-up.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid trade: {0}")]
    InvalidTrade(String),

    #[error("Trade {0} is already registered")]
    DuplicateTrade(TradeId),
}

impl LadderError {
    pub fn data_unavailable(address: impl Into<Pubkey>, reason: impl ToString) -> Self {
        LadderError::DataUnavailable {
            address: address.into(),
            reason: reason.to_string(),
        }
    }

    pub fn execution_failed(address: impl Into<Pubkey>, amount_usd: f64, reason: impl ToString) -> Self {
        LadderError::ExecutionFailed {
            address: address.into(),
            amount_usd,
            reason: reason.to_string(),
        }
    }

    /// Whether the operation may succeed on a later attempt.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            LadderError::DataUnavailable { .. } | LadderError::ExecutionFailed { .. }
        )
    }
}
