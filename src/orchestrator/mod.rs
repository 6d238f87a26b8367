// Mon Jan 19 2026 - Alex

pub mod adjuster;
pub mod aggregator;
pub mod cancel;
pub mod coordinator;
pub mod discovery;
pub mod error;
pub mod planner;
pub mod retry;
pub mod runner;

pub use adjuster::TargetAdjuster;
pub use aggregator::ResponseAggregator;
pub use cancel::CancellationToken;
pub use coordinator::{Orchestrator, OrchestratorReport, OrchestratorState};
pub use discovery::ShardDiscovery;
pub use error::OrchestratorError;
pub use planner::{ShardGroup, ShardPlan, ShardPlanner, ShardSet};
pub use retry::{RetryDecision, RetryPolicy, RetryState};
pub use runner::{QueryOutcome, ShardedQuery, ShardedQueryRunner};
