pub mod aggregate;
pub mod config;
pub mod depth;
pub mod error;
pub mod outputs;
pub mod pipeline;
pub mod readings;
pub mod timestamp_resolver;
pub mod upstream;

pub use error::{PipelineError, Result};
pub use pipeline::{
    MoistureRequest, NoDataReason, Outcome, Pipeline, TemperatureRequest, TemperatureUnit,
};
pub use upstream::{FetchError, IrrimaxClient, ReadingSource};
