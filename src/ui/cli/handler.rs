// Mon Jan 19 2026 - Alex

use super::args::{ref_id, Args, Command, PlanArgs, RunArgs};
use crate::config::Config;
use crate::datasource::fixture::FixtureDataSource;
use crate::orchestrator::{ShardPlanner, ShardSet, ShardedQueryRunner};
use crate::query::{LogicalRequest, Target, TimeRange};
use crate::ui::display::SummaryRenderer;
use crate::ui::progress::QueryProgress;
use crate::utils::{format_duration, now_ms, parse_shard_list, pluralize};
use colored::Colorize;
use std::fs;
use std::sync::Arc;
use std::time::Instant;

pub struct CommandHandler {
    renderer: SummaryRenderer,
}

impl CommandHandler {
    pub fn new() -> Self {
        Self {
            renderer: SummaryRenderer::new(),
        }
    }

    pub fn with_renderer(renderer: SummaryRenderer) -> Self {
        Self { renderer }
    }

    pub fn execute(&self, args: Args) -> anyhow::Result<()> {
        self.setup_logging(&args)?;

        let config = match &args.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        match args.command {
            Command::Run(run_args) => self.handle_run(run_args, config, args.quiet),
            Command::Plan(plan_args) => self.handle_plan(plan_args, config),
        }
    }

    fn setup_logging(&self, args: &Args) -> anyhow::Result<()> {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => log::LevelFilter::Trace,
            "debug" => log::LevelFilter::Debug,
            "info" => log::LevelFilter::Info,
            "warn" => log::LevelFilter::Warn,
            "error" => log::LevelFilter::Error,
            "off" => log::LevelFilter::Off,
            _ => log::LevelFilter::Info,
        };
        let level = if args.quiet { log::LevelFilter::Error.min(level) } else { level };

        env_logger::Builder::new()
            .filter_level(level)
            .format_timestamp(None)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialise logging: {}", e))
    }

    fn build_range(&self, args: &RunArgs) -> TimeRange {
        match (args.from_ms, args.to_ms) {
            (Some(from), Some(to)) => TimeRange::new(from, to),
            _ => TimeRange::ending_at(now_ms(), *args.since),
        }
    }

    fn build_request(&self, args: &RunArgs) -> LogicalRequest {
        let targets = args
            .queries
            .iter()
            .enumerate()
            .map(|(index, expr)| {
                let target = Target::new(&ref_id(index), expr);
                match args.max_lines {
                    Some(limit) => target.with_max_lines(limit),
                    None => target,
                }
            })
            .collect();

        let request = LogicalRequest::new(self.build_range(args), targets);
        match &args.request_id {
            Some(id) => request.with_request_id(id),
            None => request,
        }
    }

    fn handle_run(&self, args: RunArgs, config: Config, quiet: bool) -> anyhow::Result<()> {
        args.validate().map_err(|e| anyhow::anyhow!(e))?;

        let start = Instant::now();
        let request = self.build_request(&args);
        let source = FixtureDataSource::load(&args.fixture)?
            .with_shard_label(&config.shard_label)
            .with_sentinel(config.sentinel_shard);

        if !quiet {
            println!(
                "{} Running {} against {}",
                "[*]".blue(),
                pluralize(request.targets.len(), "query", "queries"),
                args.fixture.display()
            );
        }

        let runner = ShardedQueryRunner::new(Arc::new(source), config)?;
        let mut query = runner.run(request);
        let mut progress = QueryProgress::new(!quiet);

        let mut last = None;
        for response in query.by_ref() {
            progress.update(&response);
            last = Some(response);
        }
        let outcome = query.wait()?;

        let response = match last.or(outcome.response) {
            Some(response) => response,
            None => {
                progress.abandon("No data received");
                return Err(anyhow::anyhow!("Query finished without a response"));
            }
        };
        progress.finish(&format!("Complete in {}", format_duration(start.elapsed())));

        if !quiet {
            println!();
            print!("{}", self.renderer.render_response(&response));
            println!();
            print!("{}", self.renderer.render_report(&outcome.report));
        }

        if let Some(path) = &args.output {
            let json = serde_json::to_string_pretty(&response)?;
            fs::write(path, json)?;
            if !quiet {
                println!("{} Response written to: {}", "[+]".green(), path.display());
            }
        }

        Ok(())
    }

    fn handle_plan(&self, args: PlanArgs, config: Config) -> anyhow::Result<()> {
        let ids = parse_shard_list(&args.shards).map_err(|e| anyhow::anyhow!(e))?;
        let range = TimeRange::ending_at(now_ms(), *args.since);

        let shards = ShardSet::from_ids(ids, config.sentinel_shard);
        let planner = ShardPlanner::from_config(&config);

        match planner.plan(&shards, &range) {
            Some(plan) => print!("{}", self.renderer.render_plan(&plan, config.sentinel_shard)),
            None => println!("{} No shards to plan; the query runs unsharded", "[!]".yellow()),
        }

        Ok(())
    }
}

impl Default for CommandHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn run_args(queries: &[&str]) -> RunArgs {
        RunArgs {
            fixture: PathBuf::from("unused.json"),
            queries: queries.iter().map(|q| q.to_string()).collect(),
            max_lines: Some(25),
            since: Duration::from_secs(6 * 3600).into(),
            from_ms: None,
            to_ms: None,
            request_id: Some("cli".to_string()),
            output: None,
        }
    }

    #[test]
    fn test_build_request_assigns_ref_ids() {
        let handler = CommandHandler::new();
        let request = handler.build_request(&run_args(&[r#"{a="1"}"#, r#"{b="2"}"#]));

        assert_eq!(request.targets[0].ref_id, "A");
        assert_eq!(request.targets[1].ref_id, "B");
        assert_eq!(request.targets[1].max_lines, Some(25));
        assert_eq!(request.request_id.as_deref(), Some("cli"));
        assert_eq!(request.range.duration().as_secs(), 6 * 3600);
    }

    #[test]
    fn test_build_range_prefers_explicit_bounds() {
        let handler = CommandHandler::new();
        let mut args = run_args(&["{a=\"1\"}"]);
        args.from_ms = Some(1_000);
        args.to_ms = Some(5_000);
        assert_eq!(handler.build_range(&args), TimeRange::new(1_000, 5_000));

        args.from_ms = None;
        args.to_ms = None;
        args.since = "1h30m".parse().unwrap();
        assert_eq!(handler.build_range(&args).duration(), Duration::from_secs(90 * 60));
    }
}
