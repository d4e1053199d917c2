//! The poll-execute-parse-notify pipeline and its driver.

pub mod pipeline;
pub mod scheduler;

pub use pipeline::{CycleOutcome, Pipeline, PipelineConfig, PipelineError};
pub use scheduler::Scheduler;
