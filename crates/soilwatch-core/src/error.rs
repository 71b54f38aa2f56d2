// crates/soilwatch-core/src/error.rs

use thiserror::Error;

use crate::config::ConfigError;
use crate::upstream::FetchError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Upstream fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("CSV parsing error: {0}")]
    Parser(#[from] soilwatch_parser::ParserError),

    #[error("Request cancelled before the upstream fetch completed")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, PipelineError>;
