// Mon Jan 19 2026 - Alex

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "shard-splitter")]
#[command(author = "Alex")]
#[command(version = "1.0.0")]
#[command(about = "Runs log queries one shard group at a time", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true, default_value = "info")]
    pub log_level: String,

    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Run(RunArgs),
    Plan(PlanArgs),
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    #[arg(short, long)]
    pub fixture: PathBuf,

    /// Query expression; repeat for several targets (A, B, ...).
    #[arg(short = 'e', long = "query", required = true)]
    pub queries: Vec<String>,

    #[arg(short, long)]
    pub max_lines: Option<u64>,

    #[arg(short, long, default_value = "1h")]
    pub since: humantime::Duration,

    #[arg(long, requires = "to_ms")]
    pub from_ms: Option<i64>,

    #[arg(long, requires = "from_ms")]
    pub to_ms: Option<i64>,

    #[arg(long)]
    pub request_id: Option<String>,

    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct PlanArgs {
    #[arg(short, long)]
    pub shards: String,

    #[arg(long, default_value = "1h")]
    pub since: humantime::Duration,
}

impl RunArgs {
    pub fn validate(&self) -> Result<(), String> {
        if !self.fixture.exists() {
            return Err(format!("Fixture file does not exist: {:?}", self.fixture));
        }
        if self.queries.iter().all(|q| q.trim().is_empty()) {
            return Err("At least one non-empty --query is required".to_string());
        }
        if let (Some(from), Some(to)) = (self.from_ms, self.to_ms) {
            if from > to {
                return Err("--from-ms must not be after --to-ms".to_string());
            }
        }
        if self.max_lines == Some(0) {
            return Err("--max-lines must be at least 1".to_string());
        }
        Ok(())
    }
}

/// `A`, `B`, ... `Z`, then `AA`, `AB`, ...
pub fn ref_id(index: usize) -> String {
    let letter = (b'A' + (index % 26) as u8) as char;
    if index < 26 {
        letter.to_string()
    } else {
        format!("{}{}", ref_id(index / 26 - 1), letter)
    }
}
