// Mon Jan 19 2026 - Alex

use crate::orchestrator::{OrchestratorReport, ShardPlan};
use crate::query::{AccumulatedResponse, FrameData};
use crate::utils::pluralize;
use colored::*;
use itertools::Itertools;

/// Renders plans, responses and run reports for the terminal.
pub struct SummaryRenderer {
    use_color: bool,
    max_errors: usize,
}

impl SummaryRenderer {
    pub fn new() -> Self {
        Self {
            use_color: true,
            max_errors: 10,
        }
    }

    pub fn with_color(mut self, use_color: bool) -> Self {
        self.use_color = use_color;
        self
    }

    pub fn with_max_errors(mut self, max: usize) -> Self {
        self.max_errors = max;
        self
    }

    fn header(&self, text: &str) -> String {
        if self.use_color {
            format!("{}\n{}", text.cyan().bold(), "-".repeat(40).cyan())
        } else {
            format!("{}\n{}", text, "-".repeat(40))
        }
    }

    fn value(&self, text: String) -> String {
        if self.use_color {
            text.green().to_string()
        } else {
            text
        }
    }

    fn warning(&self, text: String) -> String {
        if self.use_color {
            text.yellow().to_string()
        } else {
            text
        }
    }

    pub fn render_plan(&self, plan: &ShardPlan, sentinel: i64) -> String {
        let mut out = self.header("Shard Plan");
        out.push('\n');

        for (cycle, group) in plan.groups().iter().enumerate() {
            let shards = if group.is_catch_all(sentinel) {
                "catch-all".to_string()
            } else {
                group.shards().iter().join(", ")
            };
            out.push_str(&format!(
                "  cycle {:>3}: {} ({})\n",
                cycle,
                self.value(shards),
                pluralize(group.len(), "shard", "shards")
            ));
        }

        let placement = if plan.catch_all_first() { "first" } else { "last" };
        out.push_str(&format!(
            "  {} requests, catch-all {}\n",
            plan.len(),
            placement
        ));
        out
    }

    pub fn render_response(&self, response: &AccumulatedResponse) -> String {
        let mut out = self.header("Results");
        out.push('\n');
        out.push_str(&format!("  Key: {}\n", response.key));
        out.push_str(&format!("  State: {}\n", self.value(response.state.to_string())));

        for (ref_id, frame) in &response.frames {
            let size = match &frame.data {
                FrameData::Logs(lines) => pluralize(lines.len(), "line", "lines"),
                FrameData::Metrics(series) => format!(
                    "{}, {}",
                    pluralize(series.len(), "series", "series"),
                    pluralize(frame.len(), "sample", "samples")
                ),
            };
            out.push_str(&format!("  {}: {}\n", ref_id, self.value(size)));
        }

        if !response.errors.is_empty() {
            out.push_str(&format!(
                "  {}\n",
                self.warning(pluralize(response.errors.len(), "error", "errors"))
            ));
            for error in response.errors.iter().take(self.max_errors) {
                out.push_str(&format!("    {}\n", self.warning(error.to_string())));
            }
            if response.errors.len() > self.max_errors {
                out.push_str(&format!("    ... and {} more\n", response.errors.len() - self.max_errors));
            }
        }
        out
    }

    pub fn render_report(&self, report: &OrchestratorReport) -> String {
        let mut out = self.header("Run Report");
        out.push('\n');

        let mode = if report.sharded { "sharded" } else { "unsharded fallback" };
        out.push_str(&format!("  Mode: {}\n", mode));
        out.push_str(&format!(
            "  Cycles: {}/{} completed\n",
            report.completed_cycles, report.planned_cycles
        ));
        out.push_str(&format!("  Sub-requests: {}\n", report.dispatched));
        out.push_str(&format!("  Retries: {}\n", report.retries));
        out.push_str(&format!("  Emissions: {}\n", report.emitted));

        if !report.abandoned_cycles.is_empty() {
            out.push_str(&format!(
                "  {}\n",
                self.warning(format!("Abandoned cycles: {}", report.abandoned_cycles.iter().join(", ")))
            ));
        }
        if report.cancelled {
            out.push_str(&format!("  {}\n", self.warning("Cancelled".to_string())));
        }
        out
    }
}

impl Default for SummaryRenderer {
    fn default() -> Self {
        Self::new()
    }
}
