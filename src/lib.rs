// Mon Jan 19 2026 - Alex

pub mod config;
pub mod datasource;
pub mod orchestrator;
pub mod query;
pub mod ui;
pub mod utils;

pub use config::Config;
pub use datasource::fixture::FixtureDataSource;
pub use datasource::{DataSourceError, LogDataSource};
pub use orchestrator::{CancellationToken, QueryOutcome, ShardedQuery, ShardedQueryRunner};
pub use query::{AccumulatedResponse, LogicalRequest, Target, TimeRange};
