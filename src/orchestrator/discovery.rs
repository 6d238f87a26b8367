// Mon Jan 19 2026 - Alex

use crate::datasource::{DataSourceError, LogDataSource};
use crate::orchestrator::planner::ShardSet;
use crate::query::selector::service_name;
use crate::query::{Target, TimeRange};

/// Looks up which shards hold data for a query window.
pub struct ShardDiscovery<'a> {
    datasource: &'a dyn LogDataSource,
    shard_label: &'a str,
    sentinel: i64,
}

impl<'a> ShardDiscovery<'a> {
    pub fn new(datasource: &'a dyn LogDataSource, shard_label: &'a str, sentinel: i64) -> Self {
        Self {
            datasource,
            shard_label,
            sentinel,
        }
    }

    /// Narrows discovery to the service named by the first target, if any.
    pub fn stream_selector(targets: &[Target]) -> Option<String> {
        targets
            .first()
            .and_then(|t| service_name(&t.expr))
            .map(|name| format!("{{service_name=\"{}\"}}", name))
    }

    pub fn discover(&self, targets: &[Target], range: &TimeRange) -> Result<ShardSet, DataSourceError> {
        let selector = Self::stream_selector(targets);
        let values = self
            .datasource
            .shard_values(self.shard_label, selector.as_deref(), range)?;

        let ids = values
            .iter()
            .filter_map(|value| match value.trim().parse::<i64>() {
                Ok(id) => Some(id),
                Err(_) => {
                    log::warn!("Ignoring non-numeric shard value {:?}", value);
                    None
                }
            })
            .collect();

        Ok(ShardSet::from_ids(ids, self.sentinel))
    }
}
