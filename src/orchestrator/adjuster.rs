// Mon Jan 19 2026 - Alex

use crate::query::selector::is_logs_query;
use crate::query::{AccumulatedResponse, Target};

/// Shrinks line budgets by what has already been received and drops
/// targets that have nothing left to fetch.
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetAdjuster;

impl TargetAdjuster {
    pub fn new() -> Self {
        Self
    }

    /// Always computed from the operation's original targets, so applying it
    /// twice against the same response yields the same set.
    pub fn adjust(&self, targets: &[Target], response: &AccumulatedResponse) -> Vec<Target> {
        targets
            .iter()
            .map(|target| self.adjust_target(target, response))
            .filter(|target| target.max_lines.map_or(true, |remaining| remaining > 0))
            .collect()
    }

    fn adjust_target(&self, target: &Target, response: &AccumulatedResponse) -> Target {
        let Some(max_lines) = target.max_lines else {
            return target.clone();
        };
        if !is_logs_query(&target.expr) {
            return target.clone();
        }
        let Some(frame) = response.frame(&target.ref_id) else {
            return target.clone();
        };

        let received = frame.len() as u64;
        Target {
            max_lines: Some(max_lines.saturating_sub(received)),
            ..target.clone()
        }
    }
}
