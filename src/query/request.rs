// Mon Jan 19 2026 - Alex

use crate::orchestrator::planner::ShardGroup;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Query window in Unix epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from_ms: i64,
    pub to_ms: i64,
}

impl TimeRange {
    pub fn new(from_ms: i64, to_ms: i64) -> Self {
        Self { from_ms, to_ms }
    }

    /// Window ending at `to_ms` and reaching `span` back.
    pub fn ending_at(to_ms: i64, span: Duration) -> Self {
        let span_ms = i64::try_from(span.as_millis()).unwrap_or(i64::MAX);
        Self {
            from_ms: to_ms.saturating_sub(span_ms),
            to_ms,
        }
    }

    pub fn duration(&self) -> Duration {
        let span = self.to_ms.saturating_sub(self.from_ms);
        if span <= 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(span as u64)
        }
    }

    pub fn contains_ns(&self, timestamp_ns: i64) -> bool {
        let ms = timestamp_ns.div_euclid(1_000_000);
        ms >= self.from_ms && ms <= self.to_ms
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub ref_id: String,
    pub expr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_lines: Option<u64>,
}

impl Target {
    pub fn new(ref_id: &str, expr: &str) -> Self {
        Self {
            ref_id: ref_id.to_string(),
            expr: expr.to_string(),
            max_lines: None,
        }
    }

    pub fn with_max_lines(mut self, max_lines: u64) -> Self {
        self.max_lines = Some(max_lines);
        self
    }
}

/// The caller's view of one logical query. Never mutated by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub range: TimeRange,
    pub targets: Vec<Target>,
}

impl LogicalRequest {
    pub fn new(range: TimeRange, targets: Vec<Target>) -> Self {
        Self {
            request_id: None,
            range,
            targets,
        }
    }

    pub fn with_request_id(mut self, request_id: &str) -> Self {
        self.request_id = Some(request_id.to_string());
        self
    }

    /// Id of the sub-request issued for `cycle`, or for the unsharded fallback when `None`.
    pub fn sub_request_id(&self, cycle: Option<usize>) -> Option<String> {
        self.request_id.as_ref().map(|id| match cycle {
            Some(cycle) => format!("{}_shard_{}", id, cycle),
            None => format!("{}_shard_no-shard", id),
        })
    }
}

/// What one cycle hands to the datasource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubRequest {
    pub request_id: Option<String>,
    pub range: TimeRange,
    pub targets: Vec<Target>,
    /// `None` for the unsharded fallback request.
    pub shards: Option<ShardGroup>,
}

impl SubRequest {
    pub fn is_sharded(&self) -> bool {
        self.shards.is_some()
    }

    pub fn target(&self, ref_id: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.ref_id == ref_id)
    }
}
