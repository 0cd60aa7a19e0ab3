//! Trade lifecycle: registry, stop-loss and milestone ladder, periodic monitor.

pub mod types;
pub mod lifecycle;
pub mod registry;
pub mod execution;
pub mod monitor;
pub mod onboarding;

pub use types::{Milestone, Trade, TradeId, TradeStatus};
pub use lifecycle::{decide, evaluate, Decision, Evaluation};
pub use registry::{CommitOutcome, TradeRegistry};
pub use execution::{ExecutionVenue, HttpExecutionVenue, PaperVenue, PriceSource, WalletBalance};
pub use monitor::{TickReport, TradeMonitor};
pub use onboarding::{OnboardingReport, TradeOnboarder};
