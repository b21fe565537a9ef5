//! Collects job postings from a listings site, fetches their descriptions and
//! scores each one against a resume with a language model.

pub mod cli;
pub mod core;
pub mod job_analysis;
pub mod utils;

pub use cli::Cli;
pub use job_analysis::{
    AnalyzedJobRecord, BasicJobRecord, GermanRequired, JobPipeline, PipelineSettings, RunOutcome,
};
