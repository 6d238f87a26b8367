// Mon Jan 19 2026 - Alex

use crate::config::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
    #[error("Query worker panicked")]
    WorkerPanicked,
}
