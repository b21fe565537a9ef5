// src/cli.rs
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default, Clone)]
#[command(name = "job-matcher")]
#[command(about = "Collect job listings and score each one against a resume")]
pub struct Cli {
    /// Path to the plain-text resume
    #[arg(long)]
    pub resume: Option<PathBuf>,

    /// Comma-separated list of search categories
    #[arg(long)]
    pub categories: Option<String>,

    /// Maximum number of listing pages to scrape per category
    #[arg(long)]
    pub max_pages: Option<u32>,

    /// Directory for the CSV report
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Directory for the run log
    #[arg(long)]
    pub logs_dir: Option<PathBuf>,

    /// YAML configuration file (defaults to ./config.yaml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Disable the pauses between requests
    #[arg(long)]
    pub no_delay: bool,
}
