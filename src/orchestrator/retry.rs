// Mon Jan 19 2026 - Alex

use crate::config::Config;
use crate::query::QueryError;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-dispatch the cycle; `attempt` is the number of the upcoming attempt.
    Retry { attempt: u32 },
    /// The cycle used all its attempts.
    Exhausted,
    /// The store reported its hard series limit.
    Terminal,
}

/// Per-cycle retry counters, owned by one operation.
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    retries: HashMap<usize, u32>,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn retries(&self, cycle: usize) -> u32 {
        self.retries.get(&cycle).copied().unwrap_or(0)
    }

    pub fn total_retries(&self) -> u32 {
        self.retries.values().sum()
    }

    fn record(&mut self, cycle: usize) -> u32 {
        let entry = self.retries.entry(cycle).or_insert(0);
        *entry += 1;
        *entry
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    terminal_marker: String,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, terminal_marker: &str) -> Self {
        Self {
            max_retries,
            terminal_marker: terminal_marker.to_lowercase(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_retries, &config.max_series_marker)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    pub fn is_terminal(&self, errors: &[QueryError]) -> bool {
        errors
            .iter()
            .any(|e| e.message.to_lowercase().contains(&self.terminal_marker))
    }

    /// Decides what to do after `cycle` failed with `errors`, counting the
    /// retry in `state` when one is granted.
    pub fn decide(&self, state: &mut RetryState, cycle: usize, errors: &[QueryError]) -> RetryDecision {
        if self.is_terminal(errors) {
            return RetryDecision::Terminal;
        }
        if state.retries(cycle) >= self.max_retries {
            return RetryDecision::Exhausted;
        }
        let retries = state.record(cycle);
        RetryDecision::Retry { attempt: retries + 1 }
    }
}
