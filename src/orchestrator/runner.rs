// Mon Jan 19 2026 - Alex

use crate::config::Config;
use crate::datasource::LogDataSource;
use crate::orchestrator::cancel::CancellationToken;
use crate::orchestrator::coordinator::{Orchestrator, OrchestratorReport};
use crate::orchestrator::error::OrchestratorError;
use crate::query::{AccumulatedResponse, LogicalRequest};
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;
use std::thread;

/// Entry point for callers: starts one sharded query per [`run`](Self::run).
pub struct ShardedQueryRunner {
    datasource: Arc<dyn LogDataSource>,
    config: Arc<Config>,
}

impl ShardedQueryRunner {
    pub fn new(datasource: Arc<dyn LogDataSource>, config: Config) -> Result<Self, OrchestratorError> {
        config.validate()?;
        Ok(Self {
            datasource,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Spawns the query pipeline. Every operation gets its own accumulated
    /// response and retry counters.
    pub fn run(&self, request: LogicalRequest) -> ShardedQuery {
        let cancel = CancellationToken::new();
        let (sender, receiver) = channel();
        let orchestrator = Orchestrator::new(
            self.datasource.clone(),
            self.config.clone(),
            request,
            cancel.clone(),
        );

        let worker = thread::spawn(move || {
            orchestrator.run(|response| sender.send(response.clone()).is_ok())
        });

        ShardedQuery {
            receiver,
            cancel,
            worker: Some(worker),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryOutcome {
    /// Last response emitted; `None` if the query was cancelled before any data.
    pub response: Option<AccumulatedResponse>,
    pub report: OrchestratorReport,
}

/// Streaming handle over one running query. Iterating yields each snapshot
/// of the accumulated response; dropping the handle cancels the query.
pub struct ShardedQuery {
    receiver: Receiver<AccumulatedResponse>,
    cancel: CancellationToken,
    worker: Option<thread::JoinHandle<OrchestratorReport>>,
}

impl ShardedQuery {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drains the remaining responses and waits for the pipeline to stop.
    pub fn wait(mut self) -> Result<QueryOutcome, OrchestratorError> {
        let mut last = None;
        for response in self.receiver.iter() {
            last = Some(response);
        }

        let report = match self.worker.take() {
            Some(worker) => worker.join().map_err(|_| OrchestratorError::WorkerPanicked)?,
            None => OrchestratorReport::default(),
        };

        Ok(QueryOutcome {
            response: last,
            report,
        })
    }
}

impl Iterator for ShardedQuery {
    type Item = AccumulatedResponse;

    fn next(&mut self) -> Option<Self::Item> {
        self.receiver.recv().ok()
    }
}

impl Drop for ShardedQuery {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::fixture::{FixtureDataSource, FixtureSpec, FixtureStream};
    use crate::datasource::{DataSourceError, LogDataSource, PartialStream};
    use crate::query::{Frame, LoadingState, LogLine, PartialResponse, SubRequest, Target, TimeRange};
    use parking_lot::Mutex;
    use std::sync::mpsc::{Receiver, Sender};
    use std::time::Duration;

    const HOUR_MS: i64 = 3_600_000;
    const NS_PER_MS: i64 = 1_000_000;

    fn fixture() -> FixtureDataSource {
        let streams = (1..=5)
            .map(|shard| FixtureStream {
                labels: [("app".to_string(), "api".to_string())].into_iter().collect(),
                shard: Some(shard),
                lines: (0..4)
                    .map(|i| LogLine::new((shard * 10 + i) * 60_000 * NS_PER_MS, &format!("shard {} line {}", shard, i)))
                    .collect(),
            })
            .collect();

        FixtureDataSource::new(FixtureSpec {
            shards: Some((1..=5).collect()),
            streams,
            ..FixtureSpec::default()
        })
    }

    #[test]
    fn test_run_streams_until_done() {
        let source = Arc::new(fixture());
        let runner = ShardedQueryRunner::new(source.clone(), Config::default()).unwrap();
        let request = LogicalRequest::new(TimeRange::new(0, 6 * HOUR_MS), vec![Target::new("A", r#"{app="api"}"#)])
            .with_request_id("runner");

        let responses: Vec<AccumulatedResponse> = runner.run(request).collect();
        let last = responses.last().unwrap();
        assert_eq!(last.state, LoadingState::Done);
        assert_eq!(last.line_count("A"), 20);
        assert_eq!(last.key, "runner");
        assert_eq!(source.requests().len(), 4);
    }

    #[test]
    fn test_wait_returns_report() {
        let runner = ShardedQueryRunner::new(Arc::new(fixture()), Config::default()).unwrap();
        let request = LogicalRequest::new(
            TimeRange::new(0, 6 * HOUR_MS),
            vec![Target::new("A", r#"{app="api"}"#).with_max_lines(6)],
        );

        let outcome = runner.run(request).wait().unwrap();
        let response = outcome.response.unwrap();
        assert!(response.is_done());
        assert_eq!(response.line_count("A"), 6);
        assert!(outcome.report.sharded);
        assert!(!outcome.report.cancelled);
    }

    /// Yields one partial, then holds the stream open until the gate opens.
    struct GatedEvents {
        first: Option<PartialResponse>,
        second: Option<PartialResponse>,
        gate: Receiver<()>,
        finished: Sender<()>,
    }

    impl Iterator for GatedEvents {
        type Item = Result<PartialResponse, DataSourceError>;

        fn next(&mut self) -> Option<Self::Item> {
            if let Some(partial) = self.first.take() {
                return Some(Ok(partial));
            }
            if self.second.is_some() {
                let _ = self.gate.recv();
            }
            self.second.take().map(Ok)
        }
    }

    impl Drop for GatedEvents {
        fn drop(&mut self) {
            let _ = self.finished.send(());
        }
    }

    struct GatedSource {
        gate: Mutex<Option<Receiver<()>>>,
        finished: Mutex<Sender<()>>,
        requests: Mutex<Vec<SubRequest>>,
    }

    impl GatedSource {
        fn requests(&self) -> usize {
            self.requests.lock().len()
        }
    }

    impl LogDataSource for GatedSource {
        fn name(&self) -> &str {
            "gated"
        }

        fn shard_values(&self, _label: &str, _selector: Option<&str>, _range: &TimeRange) -> Result<Vec<String>, DataSourceError> {
            Ok(vec!["1".into(), "2".into(), "3".into()])
        }

        fn query(&self, request: &SubRequest, _cancel: &CancellationToken) -> Result<PartialStream, DataSourceError> {
            self.requests.lock().push(request.clone());
            let gate = self
                .gate
                .lock()
                .take()
                .ok_or_else(|| DataSourceError::Query("gate already taken".to_string()))?;

            let partial = |line: &str| PartialResponse::new(vec![Frame::logs("A", vec![LogLine::new(1, line)])]);
            Ok(Box::new(GatedEvents {
                first: Some(partial("first")),
                second: Some(partial("second")),
                gate,
                finished: self.finished.lock().clone(),
            }))
        }
    }

    /// Source whose first stream blocks mid-cycle, plus the gate sender and
    /// a receiver signalled once that stream is dropped.
    fn gated_source() -> (Arc<GatedSource>, Sender<()>, Receiver<()>) {
        let (gate_tx, gate_rx) = channel();
        let (finished_tx, finished_rx) = channel();
        let source = Arc::new(GatedSource {
            gate: Mutex::new(Some(gate_rx)),
            finished: Mutex::new(finished_tx),
            requests: Mutex::new(Vec::new()),
        });
        (source, gate_tx, finished_rx)
    }

    fn gated_request() -> LogicalRequest {
        LogicalRequest::new(TimeRange::new(0, HOUR_MS), vec![Target::new("A", r#"{app="api"}"#)])
    }

    #[test]
    fn test_cancel_mid_plan_stops_after_first_cycle() {
        let (source, gate, finished) = gated_source();
        let runner = ShardedQueryRunner::new(source.clone(), Config::default()).unwrap();

        let mut query = runner.run(gated_request());
        let first = query.next().unwrap();
        assert_eq!(first.line_count("A"), 1);
        assert!(!first.is_done());

        query.cancel();
        let _ = gate.send(());
        finished.recv_timeout(Duration::from_secs(5)).unwrap();

        let outcome = query.wait().unwrap();
        assert!(outcome.report.cancelled);
        assert_eq!(outcome.report.dispatched, 1);
        assert_eq!(outcome.report.completed_cycles, 0);
        assert_eq!(source.requests(), 1);
        assert!(outcome.response.map_or(true, |r| !r.is_done()));
    }

    #[test]
    fn test_dropping_handle_cancels_query() {
        let (source, gate, finished) = gated_source();
        let runner = ShardedQueryRunner::new(source.clone(), Config::default()).unwrap();

        let mut query = runner.run(gated_request());
        let token = query.cancellation_token();
        assert!(!query.next().unwrap().is_done());

        drop(query);
        assert!(token.is_cancelled());
        let _ = gate.send(());
        finished.recv_timeout(Duration::from_secs(5)).unwrap();

        assert_eq!(source.requests(), 1);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = ShardedQueryRunner::new(Arc::new(fixture()), Config::default().with_sentinel_shard(3));
        assert!(matches!(result, Err(OrchestratorError::InvalidConfig(_))));
    }
}
