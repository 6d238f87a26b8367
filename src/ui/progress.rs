// Mon Jan 19 2026 - Alex

use crate::query::AccumulatedResponse;
use crate::utils::pluralize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner that tracks a running query's snapshots.
pub struct QueryProgress {
    bar: ProgressBar,
    updates: usize,
}

impl QueryProgress {
    pub fn new(enabled: bool) -> Self {
        let bar = if enabled {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} [{elapsed_precise}] {msg}") {
                pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "));
            }
            pb.enable_steady_tick(Duration::from_millis(80));
            pb
        } else {
            ProgressBar::hidden()
        };

        bar.set_message("Discovering shards...");
        Self { bar, updates: 0 }
    }

    pub fn update(&mut self, response: &AccumulatedResponse) {
        self.updates += 1;
        self.bar.set_message(format!(
            "{} received ({}, state {})",
            pluralize(response.total_lines(), "line", "lines"),
            pluralize(self.updates, "update", "updates"),
            response.state
        ));
    }

    pub fn updates(&self) -> usize {
        self.updates
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    pub fn abandon(&self, message: &str) {
        self.bar.abandon_with_message(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_progress_counts_updates() {
        let mut progress = QueryProgress::new(false);
        let response = AccumulatedResponse::new("k");
        progress.update(&response);
        progress.update(&response);
        assert_eq!(progress.updates(), 2);
        progress.finish("done");
    }
}
