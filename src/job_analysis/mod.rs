// src/job_analysis/mod.rs
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod dedup;
pub mod description_fetcher;
pub mod job_analyzer;
pub mod listing_harvester;
pub mod oracle;
pub mod page_fetcher;
pub mod pipeline;
pub mod prompts;
pub mod report;

pub use dedup::dedupe;
pub use description_fetcher::{fetch_description, DESCRIPTION_FAILED};
pub use job_analyzer::{AnalysisError, MatchAnalyzer};
pub use listing_harvester::{harvest, listings_url};
pub use oracle::{AnalysisOracle, OpenAiOracle};
pub use page_fetcher::{HttpPageFetcher, PageFetcher, RenderedPage};
pub use pipeline::{JobPipeline, PipelineSettings, RunOutcome};
pub use report::{ReportSummary, WrittenReport};

/// Job identity and metadata as scraped from a listings page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicJobRecord {
    pub search_category: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub url: String,
    /// Absent until the description fetcher has run for this job.
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GermanRequired {
    Yes,
    No,
}

impl GermanRequired {
    pub fn as_str(&self) -> &'static str {
        match self {
            GermanRequired::Yes => "Yes",
            GermanRequired::No => "No",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "yes" => Some(GermanRequired::Yes),
            "no" => Some(GermanRequired::No),
            _ => None,
        }
    }
}

impl fmt::Display for GermanRequired {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job together with the oracle's verdict. Terminal entity written to the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzedJobRecord {
    pub search_category: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub url: String,
    pub match_score: u8,
    pub german_required: GermanRequired,
    pub key_matches: Vec<String>,
    pub missing_skills: Vec<String>,
    pub recommendation: String,
}

impl AnalyzedJobRecord {
    pub fn key_matches_joined(&self) -> String {
        self.key_matches.join("; ")
    }

    pub fn missing_skills_joined(&self) -> String {
        self.missing_skills.join("; ")
    }
}
