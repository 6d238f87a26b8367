// Mon Jan 19 2026 - Alex

use crate::config::Config;
use crate::datasource::{DataSourceError, LogDataSource};
use crate::orchestrator::adjuster::TargetAdjuster;
use crate::orchestrator::aggregator::ResponseAggregator;
use crate::orchestrator::cancel::CancellationToken;
use crate::orchestrator::discovery::ShardDiscovery;
use crate::orchestrator::planner::{ShardPlan, ShardPlanner};
use crate::orchestrator::retry::{RetryDecision, RetryPolicy, RetryState};
use crate::query::selector::{add_sharding_placeholder, interpolate_shards};
use crate::query::{AccumulatedResponse, LoadingState, LogicalRequest, PartialResponse, QueryError, SubRequest, Target};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    Planning,
    Dispatching(usize),
    Merging(usize),
    Retrying(usize),
    Done,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrchestratorReport {
    pub sharded: bool,
    pub planned_cycles: usize,
    pub completed_cycles: usize,
    /// Sub-requests issued, retries included.
    pub dispatched: usize,
    pub retries: u32,
    pub abandoned_cycles: Vec<usize>,
    pub emitted: usize,
    pub cancelled: bool,
}

enum CycleOutcome {
    Completed,
    Retry,
    Cancelled,
}

/// Runs one logical query as a sequence of shard-group cycles.
pub struct Orchestrator {
    datasource: Arc<dyn LogDataSource>,
    config: Arc<Config>,
    request: LogicalRequest,
    targets: Vec<Target>,
    cancel: CancellationToken,
    accumulated: AccumulatedResponse,
    retries: RetryState,
    policy: RetryPolicy,
    adjuster: TargetAdjuster,
    aggregator: ResponseAggregator,
    plan: Option<ShardPlan>,
    state: OrchestratorState,
    report: OrchestratorReport,
}

impl Orchestrator {
    pub fn new(
        datasource: Arc<dyn LogDataSource>,
        config: Arc<Config>,
        request: LogicalRequest,
        cancel: CancellationToken,
    ) -> Self {
        let targets = request
            .targets
            .iter()
            .filter(|t| !t.expr.trim().is_empty())
            .map(|t| Target {
                expr: add_sharding_placeholder(&t.expr, &config.shard_label),
                ..t.clone()
            })
            .collect();

        let key = request.request_id.clone().unwrap_or_else(|| "shard-query".to_string());

        Self {
            policy: RetryPolicy::from_config(&config),
            datasource,
            config,
            request,
            targets,
            cancel,
            accumulated: AccumulatedResponse::new(&key),
            retries: RetryState::new(),
            adjuster: TargetAdjuster::new(),
            aggregator: ResponseAggregator::new(),
            plan: None,
            state: OrchestratorState::Idle,
            report: OrchestratorReport::default(),
        }
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn plan(&self) -> Option<&ShardPlan> {
        self.plan.as_ref()
    }

    /// Drives the operation to completion. `emit` receives every snapshot of
    /// the accumulated response and returns false once nobody is listening,
    /// which cancels the operation.
    pub fn run<E>(mut self, mut emit: E) -> OrchestratorReport
    where
        E: FnMut(&AccumulatedResponse) -> bool,
    {
        if self.targets.is_empty() {
            log::debug!("No targets with a query expression; nothing to run");
            return self.finish(&mut emit);
        }

        self.transition(OrchestratorState::Planning);
        let cycles = self.prepare_plan();
        self.report.planned_cycles = cycles;

        let mut cycle = 0;
        while cycle < cycles {
            if self.cancel.is_cancelled() {
                return self.fail();
            }

            self.transition(OrchestratorState::Dispatching(cycle));
            let targets = self.adjuster.adjust(&self.targets, &self.accumulated);
            if targets.is_empty() {
                log::debug!("All line budgets satisfied after {} cycles", cycle);
                break;
            }

            let sub_request = self.build_sub_request(cycle, targets);
            match self.run_cycle(cycle, &sub_request, &mut emit) {
                CycleOutcome::Completed => {
                    self.report.completed_cycles += 1;
                    cycle += 1;
                }
                CycleOutcome::Retry => self.transition(OrchestratorState::Retrying(cycle)),
                CycleOutcome::Cancelled => return self.fail(),
            }
        }

        if self.cancel.is_cancelled() {
            return self.fail();
        }
        self.finish(&mut emit)
    }

    /// Discovers shards and plans the groups. Returns the number of cycles;
    /// one unsharded cycle when discovery fails or finds nothing.
    fn prepare_plan(&mut self) -> usize {
        let discovery = ShardDiscovery::new(
            self.datasource.as_ref(),
            &self.config.shard_label,
            self.config.sentinel_shard,
        );

        let shards = match discovery.discover(&self.targets, &self.request.range) {
            Ok(shards) => shards,
            Err(e) => {
                log::warn!("Shard splitting not supported ({}). Issuing a regular query.", e);
                return 1;
            }
        };

        match ShardPlanner::from_config(&self.config).plan(&shards, &self.request.range) {
            Some(plan) => {
                log::info!(
                    "Querying {} shards in {} requests: {}",
                    shards.len(),
                    plan.len(),
                    plan
                );
                let cycles = plan.len();
                self.plan = Some(plan);
                self.report.sharded = true;
                cycles
            }
            None => {
                log::warn!("No shards found for {}. Issuing a regular query.", self.datasource.name());
                1
            }
        }
    }

    fn build_sub_request(&self, cycle: usize, targets: Vec<Target>) -> SubRequest {
        let group = self.plan.as_ref().and_then(|plan| plan.group(cycle));
        let targets = targets
            .into_iter()
            .map(|t| Target {
                expr: interpolate_shards(&t.expr, &self.config.shard_label, group, self.config.sentinel_shard),
                ..t
            })
            .collect();

        SubRequest {
            request_id: self.request.sub_request_id(self.plan.as_ref().map(|_| cycle)),
            range: self.request.range,
            targets,
            shards: group.cloned(),
        }
    }

    fn run_cycle<E>(&mut self, cycle: usize, sub_request: &SubRequest, emit: &mut E) -> CycleOutcome
    where
        E: FnMut(&AccumulatedResponse) -> bool,
    {
        self.report.dispatched += 1;
        match &sub_request.shards {
            Some(group) => log::debug!("Cycle {}: requesting shards {}", cycle, group),
            None => log::debug!("Cycle {}: requesting without shard filter", cycle),
        }

        let stream = match self.datasource.query(sub_request, &self.cancel) {
            Ok(stream) => stream,
            Err(DataSourceError::Cancelled) => return CycleOutcome::Cancelled,
            Err(e) => return self.handle_stream_error(cycle, e, emit),
        };

        self.transition(OrchestratorState::Merging(cycle));
        for item in stream {
            if self.cancel.is_cancelled() {
                return CycleOutcome::Cancelled;
            }

            match item {
                Ok(partial) if partial.has_errors() => {
                    match self.policy.decide(&mut self.retries, cycle, &partial.errors) {
                        RetryDecision::Retry { attempt } => {
                            log::warn!(
                                "Retrying cycle {} (attempt {}/{}): {}",
                                cycle,
                                attempt,
                                self.policy.max_attempts(),
                                partial.errors[0]
                            );
                            return CycleOutcome::Retry;
                        }
                        RetryDecision::Terminal => {
                            log::warn!("Maximum series reached on cycle {}, skipping retry", cycle);
                        }
                        RetryDecision::Exhausted => {
                            log::warn!("Cycle {} kept failing, keeping partial data and moving on", cycle);
                            self.abandon(cycle);
                        }
                    }
                    if !self.merge_and_emit(partial, emit) {
                        return CycleOutcome::Cancelled;
                    }
                }
                Ok(partial) => {
                    if !self.merge_and_emit(partial, emit) {
                        return CycleOutcome::Cancelled;
                    }
                }
                Err(DataSourceError::Cancelled) => return CycleOutcome::Cancelled,
                Err(e) => return self.handle_stream_error(cycle, e, emit),
            }
        }

        if !self.emit(emit) {
            return CycleOutcome::Cancelled;
        }
        CycleOutcome::Completed
    }

    fn handle_stream_error<E>(&mut self, cycle: usize, error: DataSourceError, emit: &mut E) -> CycleOutcome
    where
        E: FnMut(&AccumulatedResponse) -> bool,
    {
        log::error!("Cycle {} failed: {}", cycle, error);
        let errors = vec![error.to_query_error()];

        match self.policy.decide(&mut self.retries, cycle, &errors) {
            RetryDecision::Retry { attempt } => {
                log::warn!("Retrying cycle {} (attempt {}/{})", cycle, attempt, self.policy.max_attempts());
                if !self.emit(emit) {
                    return CycleOutcome::Cancelled;
                }
                CycleOutcome::Retry
            }
            decision => {
                if decision == RetryDecision::Exhausted {
                    self.abandon(cycle);
                }
                self.record_errors(errors);
                if !self.emit(emit) {
                    return CycleOutcome::Cancelled;
                }
                CycleOutcome::Completed
            }
        }
    }

    fn merge_and_emit<E>(&mut self, partial: PartialResponse, emit: &mut E) -> bool
    where
        E: FnMut(&AccumulatedResponse) -> bool,
    {
        self.aggregator.merge_into(&mut self.accumulated, partial);
        self.emit(emit)
    }

    fn record_errors(&mut self, errors: Vec<QueryError>) {
        self.accumulated.errors.extend(errors);
    }

    fn abandon(&mut self, cycle: usize) {
        if !self.report.abandoned_cycles.contains(&cycle) {
            self.report.abandoned_cycles.push(cycle);
        }
    }

    fn emit<E>(&mut self, emit: &mut E) -> bool
    where
        E: FnMut(&AccumulatedResponse) -> bool,
    {
        if self.cancel.is_cancelled() {
            return false;
        }
        if !emit(&self.accumulated) {
            log::debug!("Response receiver dropped, cancelling");
            self.cancel.cancel();
            return false;
        }
        self.report.emitted += 1;
        true
    }

    fn finish<E>(mut self, emit: &mut E) -> OrchestratorReport
    where
        E: FnMut(&AccumulatedResponse) -> bool,
    {
        self.transition(OrchestratorState::Done);
        self.accumulated.advance_state(LoadingState::Done);
        self.report.retries = self.retries.total_retries();
        if emit(&self.accumulated) {
            self.report.emitted += 1;
        }
        self.report
    }

    fn fail(mut self) -> OrchestratorReport {
        log::debug!("Shard query cancelled in state {:?}", self.state);
        self.transition(OrchestratorState::Failed);
        self.report.retries = self.retries.total_retries();
        self.report.cancelled = true;
        self.report
    }

    fn transition(&mut self, next: OrchestratorState) {
        log::trace!("{:?} -> {:?}", self.state, next);
        self.state = next;
    }
}
