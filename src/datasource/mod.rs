// Mon Jan 19 2026 - Alex

pub mod error;
pub mod fixture;

pub use error::DataSourceError;
pub use fixture::FixtureDataSource;

use crate::orchestrator::cancel::CancellationToken;
use crate::query::{PartialResponse, SubRequest, TimeRange};

/// Events of one sub-request. An `Err` item ends the stream with a transport failure.
pub type PartialStream = Box<dyn Iterator<Item = Result<PartialResponse, DataSourceError>> + Send>;

/// Boundary toward the backing log store.
pub trait LogDataSource: Send + Sync {
    fn name(&self) -> &str;

    /// Values of `label` seen in `range`, optionally narrowed by a stream selector.
    fn shard_values(
        &self,
        label: &str,
        selector: Option<&str>,
        range: &TimeRange,
    ) -> Result<Vec<String>, DataSourceError>;

    /// Starts one sub-request. Implementations should stop producing events
    /// once `cancel` fires.
    fn query(
        &self,
        request: &SubRequest,
        cancel: &CancellationToken,
    ) -> Result<PartialStream, DataSourceError>;
}
