// Mon Jan 19 2026 - Alex

//! In-memory log store described by a JSON document.
//!
//! ```json
//! {
//!   "shards": [1, 2, 3],
//!   "batch_size": 100,
//!   "streams": [
//!     { "labels": { "service_name": "api" }, "shard": 2,
//!       "lines": [ { "timestamp_ns": 1700000000000000000, "line": "GET /" } ] }
//!   ],
//!   "failures": [ { "shard": 3, "times": 2, "message": "upstream timeout" } ]
//! }
//! ```
//!
//! `"shards": null` (or a missing key) makes shard discovery unsupported.
//! Streams without a shard belong to the catch-all group.

use crate::datasource::{DataSourceError, LogDataSource, PartialStream};
use crate::orchestrator::cancel::CancellationToken;
use crate::orchestrator::planner::ShardGroup;
use crate::query::selector::{is_logs_query, stream_selector_matchers, LabelMatcher, MatchOp};
use crate::query::{Frame, LogLine, PartialResponse, QueryError, Sample, Series, SubRequest, Target, TimeRange};
use indexmap::IndexMap;
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureStream {
    pub labels: IndexMap<String, String>,
    #[serde(default)]
    pub shard: Option<i64>,
    #[serde(default)]
    pub lines: Vec<LogLine>,
}

/// Fails the next `times` requests whose shard group contains `shard`.
/// A `shard` of `None` targets the unsharded fallback request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRule {
    #[serde(default)]
    pub shard: Option<i64>,
    pub times: u32,
    pub message: String,
    /// Fail the stream itself instead of returning an error response.
    #[serde(default)]
    pub transport: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureSpec {
    pub shards: Option<Vec<i64>>,
    pub streams: Vec<FixtureStream>,
    pub failures: Vec<FailureRule>,
    /// Lines per streamed partial response.
    pub batch_size: usize,
}

impl Default for FixtureSpec {
    fn default() -> Self {
        Self {
            shards: None,
            streams: Vec::new(),
            failures: Vec::new(),
            batch_size: 500,
        }
    }
}

pub struct FixtureDataSource {
    spec: FixtureSpec,
    shard_label: String,
    sentinel: i64,
    remaining_failures: Mutex<Vec<u32>>,
    requests: Mutex<Vec<SubRequest>>,
}

impl FixtureDataSource {
    pub fn new(spec: FixtureSpec) -> Self {
        let remaining = spec.failures.iter().map(|f| f.times).collect();
        Self {
            spec,
            shard_label: "__stream_shard__".to_string(),
            sentinel: -1,
            remaining_failures: Mutex::new(remaining),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, FixtureError> {
        let content = fs::read_to_string(path.as_ref())?;
        let spec: FixtureSpec = serde_json::from_str(&content)?;
        Ok(Self::new(spec))
    }

    pub fn with_shard_label(mut self, label: &str) -> Self {
        self.shard_label = label.to_string();
        self
    }

    pub fn with_sentinel(mut self, sentinel: i64) -> Self {
        self.sentinel = sentinel;
        self
    }

    pub fn spec(&self) -> &FixtureSpec {
        &self.spec
    }

    /// Every sub-request received so far, in order.
    pub fn requests(&self) -> Vec<SubRequest> {
        self.requests.lock().clone()
    }

    fn take_failure(&self, group: Option<&ShardGroup>) -> Option<FailureRule> {
        let mut remaining = self.remaining_failures.lock();
        for (index, rule) in self.spec.failures.iter().enumerate() {
            let applies = match (rule.shard, group) {
                (None, None) => true,
                (Some(shard), Some(group)) => group.contains(shard),
                _ => false,
            };
            if applies && remaining[index] > 0 {
                remaining[index] -= 1;
                return Some(rule.clone());
            }
        }
        None
    }

    fn in_group(&self, stream: &FixtureStream, group: Option<&ShardGroup>) -> bool {
        match group {
            None => true,
            Some(group) if group.is_catch_all(self.sentinel) => stream.shard.is_none(),
            Some(group) => stream.shard.map_or(false, |shard| group.contains(shard)),
        }
    }

    fn matching_streams(
        &self,
        expr: &str,
        group: Option<&ShardGroup>,
    ) -> Result<Vec<&FixtureStream>, DataSourceError> {
        let matchers = compile_matchers(expr, &self.shard_label)?;
        Ok(self
            .spec
            .streams
            .iter()
            .filter(|stream| self.in_group(stream, group))
            .filter(|stream| matchers.iter().all(|m| m.matches(&stream.labels)))
            .collect())
    }

    fn target_events(
        &self,
        target: &Target,
        request: &SubRequest,
    ) -> Result<Vec<PartialResponse>, DataSourceError> {
        let streams = self.matching_streams(&target.expr, request.shards.as_ref())?;

        if !is_logs_query(&target.expr) {
            let series = streams
                .iter()
                .map(|stream| Series {
                    labels: stream.labels.clone(),
                    samples: vec![Sample {
                        timestamp_ms: request.range.to_ms,
                        value: stream.lines.iter().filter(|l| request.range.contains_ns(l.timestamp_ns)).count() as f64,
                    }],
                })
                .collect();
            return Ok(vec![PartialResponse::new(vec![Frame::metrics(&target.ref_id, series)])]);
        }

        let range = request.range;
        let mut lines: Vec<LogLine> = streams
            .into_iter()
            .flat_map(|stream| {
                stream
                    .lines
                    .iter()
                    .filter(move |line| range.contains_ns(line.timestamp_ns))
                    .map(move |line| {
                        let mut line = line.clone();
                        for (name, value) in &stream.labels {
                            line.labels.entry(name.clone()).or_insert_with(|| value.clone());
                        }
                        line
                    })
            })
            .collect();
        lines.sort_by(|a, b| b.timestamp_ns.cmp(&a.timestamp_ns));
        if let Some(max_lines) = target.max_lines {
            lines.truncate(usize::try_from(max_lines).unwrap_or(usize::MAX));
        }

        if lines.is_empty() {
            return Ok(vec![PartialResponse::new(vec![Frame::logs(&target.ref_id, Vec::new())])]);
        }

        let batch_size = self.spec.batch_size.max(1);
        Ok(lines
            .chunks(batch_size)
            .map(|chunk| PartialResponse::new(vec![Frame::logs(&target.ref_id, chunk.to_vec())]))
            .collect())
    }
}

impl LogDataSource for FixtureDataSource {
    fn name(&self) -> &str {
        "fixture"
    }

    fn shard_values(
        &self,
        _label: &str,
        selector: Option<&str>,
        _range: &TimeRange,
    ) -> Result<Vec<String>, DataSourceError> {
        let Some(shards) = &self.spec.shards else {
            return Err(DataSourceError::Unsupported("fixture has no shard index".to_string()));
        };

        let matchers = match selector {
            Some(selector) => compile_matchers(selector, &self.shard_label)?,
            None => Vec::new(),
        };

        Ok(shards
            .iter()
            .filter(|&&shard| {
                matchers.is_empty()
                    || self.spec.streams.iter().any(|s| {
                        s.shard == Some(shard) && matchers.iter().all(|m| m.matches(&s.labels))
                    })
            })
            .map(|shard| shard.to_string())
            .collect())
    }

    fn query(&self, request: &SubRequest, cancel: &CancellationToken) -> Result<PartialStream, DataSourceError> {
        if cancel.is_cancelled() {
            return Err(DataSourceError::Cancelled);
        }
        self.requests.lock().push(request.clone());

        let events: Vec<Result<PartialResponse, DataSourceError>> = match self.take_failure(request.shards.as_ref()) {
            Some(rule) if rule.transport => vec![Err(DataSourceError::Transport(rule.message))],
            Some(rule) => vec![Ok(PartialResponse::failed(QueryError::new(&rule.message)))],
            None => {
                let mut events = Vec::new();
                for target in &request.targets {
                    events.extend(self.target_events(target, request)?.into_iter().map(Ok));
                }
                events
            }
        };

        Ok(Box::new(CancellableEvents {
            events: events.into_iter(),
            cancel: cancel.clone(),
        }))
    }
}

struct CancellableEvents {
    events: std::vec::IntoIter<Result<PartialResponse, DataSourceError>>,
    cancel: CancellationToken,
}

impl Iterator for CancellableEvents {
    type Item = Result<PartialResponse, DataSourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cancel.is_cancelled() {
            return None;
        }
        self.events.next()
    }
}

enum CompiledMatcher {
    Eq(String, String),
    NotEq(String, String),
    Regex(String, Regex),
    NotRegex(String, Regex),
}

impl CompiledMatcher {
    fn compile(matcher: &LabelMatcher) -> Result<Self, DataSourceError> {
        let anchored = |value: &str| {
            Regex::new(&format!("^(?:{})$", value))
                .map_err(|e| DataSourceError::Query(format!("invalid regex for {}: {}", matcher.name, e)))
        };
        Ok(match matcher.op {
            MatchOp::Eq => CompiledMatcher::Eq(matcher.name.clone(), matcher.value.clone()),
            MatchOp::NotEq => CompiledMatcher::NotEq(matcher.name.clone(), matcher.value.clone()),
            MatchOp::Regex => CompiledMatcher::Regex(matcher.name.clone(), anchored(&matcher.value)?),
            MatchOp::NotRegex => CompiledMatcher::NotRegex(matcher.name.clone(), anchored(&matcher.value)?),
        })
    }

    fn matches(&self, labels: &IndexMap<String, String>) -> bool {
        let value = |name: &str| labels.get(name).map(String::as_str).unwrap_or("");
        match self {
            CompiledMatcher::Eq(name, expected) => value(name) == expected,
            CompiledMatcher::NotEq(name, expected) => value(name) != expected,
            CompiledMatcher::Regex(name, re) => re.is_match(value(name)),
            CompiledMatcher::NotRegex(name, re) => !re.is_match(value(name)),
        }
    }
}

/// Label matchers of `expr` except the shard matcher, which is applied separately.
fn compile_matchers(expr: &str, shard_label: &str) -> Result<Vec<CompiledMatcher>, DataSourceError> {
    stream_selector_matchers(expr)
        .iter()
        .filter(|m| m.name != shard_label)
        .map(CompiledMatcher::compile)
        .collect()
}
