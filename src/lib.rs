//! token-ladder - screen new tokens and manage the resulting trades
//!
//! Screening filters and scores candidate tokens from market data.
//! Trading opens positions for the winners and drives each one through a
//! stop-loss and a ladder of profit-taking milestones.

pub mod types;
pub mod error;
pub mod config;
pub mod scoring;
pub mod trading;

// Re-export main types for convenience
pub use config::AppConfig;
pub use error::LadderError;
pub use types::{Candidate, Pubkey};
