// Mon Jan 19 2026 - Alex

use crate::query::QueryError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataSourceError {
    #[error("Shard discovery not supported: {0}")]
    Unsupported(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Query failed: {0}")]
    Query(String),
    #[error("Request cancelled")]
    Cancelled,
}

impl DataSourceError {
    pub fn to_query_error(&self) -> QueryError {
        QueryError::new(&self.to_string())
    }
}
