// Mon Jan 19 2026 - Alex

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadingState {
    Loading,
    Streaming,
    Done,
    Error,
}

impl LoadingState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoadingState::Done | LoadingState::Error)
    }

    fn rank(&self) -> u8 {
        match self {
            LoadingState::Loading => 0,
            LoadingState::Streaming => 1,
            LoadingState::Done | LoadingState::Error => 2,
        }
    }
}

impl fmt::Display for LoadingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadingState::Loading => "loading",
            LoadingState::Streaming => "streaming",
            LoadingState::Done => "done",
            LoadingState::Error => "error",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub timestamp_ns: i64,
    pub line: String,
    #[serde(default)]
    pub labels: IndexMap<String, String>,
}

impl LogLine {
    pub fn new(timestamp_ns: i64, line: &str) -> Self {
        Self {
            timestamp_ns,
            line: line.to_string(),
            labels: IndexMap::new(),
        }
    }

    pub fn with_label(mut self, name: &str, value: &str) -> Self {
        self.labels.insert(name.to_string(), value.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp_ms: i64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub labels: IndexMap<String, String>,
    pub samples: Vec<Sample>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum FrameData {
    Logs(Vec<LogLine>),
    Metrics(Vec<Series>),
}

/// Result data for one target, correlated by `ref_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub ref_id: String,
    pub data: FrameData,
}

impl Frame {
    pub fn logs(ref_id: &str, lines: Vec<LogLine>) -> Self {
        Self {
            ref_id: ref_id.to_string(),
            data: FrameData::Logs(lines),
        }
    }

    pub fn metrics(ref_id: &str, series: Vec<Series>) -> Self {
        Self {
            ref_id: ref_id.to_string(),
            data: FrameData::Metrics(series),
        }
    }

    /// Number of log lines, or total samples for a metric frame.
    pub fn len(&self) -> usize {
        match &self.data {
            FrameData::Logs(lines) => lines.len(),
            FrameData::Metrics(series) => series.iter().map(|s| s.samples.len()).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_logs(&self) -> bool {
        matches!(self.data, FrameData::Logs(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl QueryError {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            ref_id: None,
            status: None,
        }
    }

    pub fn with_ref_id(mut self, ref_id: &str) -> Self {
        self.ref_id = Some(ref_id.to_string());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.ref_id, self.status) {
            (Some(ref_id), Some(status)) => write!(f, "[{}] {} ({})", ref_id, self.message, status),
            (Some(ref_id), None) => write!(f, "[{}] {}", ref_id, self.message),
            (None, Some(status)) => write!(f, "{} ({})", self.message, status),
            (None, None) => write!(f, "{}", self.message),
        }
    }
}

/// One event of a sub-request stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialResponse {
    pub frames: Vec<Frame>,
    #[serde(default)]
    pub errors: Vec<QueryError>,
    pub state: LoadingState,
}

impl PartialResponse {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            errors: Vec::new(),
            state: LoadingState::Streaming,
        }
    }

    pub fn failed(error: QueryError) -> Self {
        Self {
            frames: Vec::new(),
            errors: vec![error],
            state: LoadingState::Error,
        }
    }

    pub fn with_error(mut self, error: QueryError) -> Self {
        self.errors.push(error);
        self
    }

    pub fn with_state(mut self, state: LoadingState) -> Self {
        self.state = state;
        self
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Running merge of every partial seen for one logical query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccumulatedResponse {
    pub key: String,
    pub state: LoadingState,
    pub frames: IndexMap<String, Frame>,
    pub errors: Vec<QueryError>,
}

impl AccumulatedResponse {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            state: LoadingState::Streaming,
            frames: IndexMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn frame(&self, ref_id: &str) -> Option<&Frame> {
        self.frames.get(ref_id)
    }

    pub fn line_count(&self, ref_id: &str) -> usize {
        self.frames.get(ref_id).map(|f| f.len()).unwrap_or(0)
    }

    pub fn total_lines(&self) -> usize {
        self.frames.values().filter(|f| f.is_logs()).map(|f| f.len()).sum()
    }

    pub fn is_done(&self) -> bool {
        self.state == LoadingState::Done
    }

    /// Moves the status forward. Returns false and leaves the status alone
    /// when the move would go backwards or leave a terminal state.
    pub fn advance_state(&mut self, next: LoadingState) -> bool {
        if self.state.is_terminal() || next.rank() < self.state.rank() {
            return false;
        }
        self.state = next;
        true
    }
}
