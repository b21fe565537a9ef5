// src/job_analysis/job_analyzer.rs
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use super::description_fetcher::DESCRIPTION_FAILED;
use super::oracle::AnalysisOracle;
use super::prompts::{match_user_prompt, MATCH_SYSTEM_PROMPT};
use super::{AnalyzedJobRecord, BasicJobRecord, GermanRequired};

pub const ANALYSIS_FAILED: &str = "Analysis failed";
pub const FALLBACK_RECOMMENDATION: &str = "Analysis failed - please review manually";

const REQUIRED_FIELDS: [&str; 5] = [
    "match_score",
    "german_required",
    "key_matches",
    "missing_skills",
    "recommendation",
];

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("oracle call failed: {0}")]
    Oracle(String),

    #[error("response is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid value for {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Validated oracle answer, before it is attached to a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchVerdict {
    pub match_score: u8,
    pub german_required: GermanRequired,
    pub key_matches: Vec<String>,
    pub missing_skills: Vec<String>,
    pub recommendation: String,
}

/// Scores jobs against a resume through an [`AnalysisOracle`].
///
/// One oracle call per job. Any failure (oracle error, unparseable or
/// incomplete response) yields the fixed fallback record instead of an error.
pub struct MatchAnalyzer<O> {
    oracle: O,
}

impl<O: AnalysisOracle> MatchAnalyzer<O> {
    pub fn new(oracle: O) -> Self {
        Self { oracle }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub async fn analyze(&self, resume: &str, job: &BasicJobRecord) -> AnalyzedJobRecord {
        info!("Analyzing job: {}", job.title);

        match self.perform_analysis(resume, job).await {
            Ok(verdict) => {
                info!(
                    "Analysis complete - Score: {}, German Required: {}",
                    verdict.match_score, verdict.german_required
                );
                analyzed_record(job, verdict)
            }
            Err(e) => {
                error!("Analysis failed for {} ({}): {}", job.title, job.url, e);
                fallback_record(job)
            }
        }
    }

    async fn perform_analysis(
        &self,
        resume: &str,
        job: &BasicJobRecord,
    ) -> Result<MatchVerdict, AnalysisError> {
        let description = job.description.as_deref().unwrap_or(DESCRIPTION_FAILED);
        let user_prompt = match_user_prompt(&job.title, resume, description);

        let response = self
            .oracle
            .complete(MATCH_SYSTEM_PROMPT, &user_prompt)
            .await
            .map_err(|e| AnalysisError::Oracle(format!("{:#}", e)))?;

        parse_verdict(&response)
    }
}

/// Parse and validate the oracle's text into a [`MatchVerdict`].
pub fn parse_verdict(response: &str) -> Result<MatchVerdict, AnalysisError> {
    let value = parse_json_object(response)?;

    for field in REQUIRED_FIELDS {
        if value.get(field).is_none() {
            return Err(AnalysisError::MissingField(field));
        }
    }

    Ok(MatchVerdict {
        match_score: score_field(&value["match_score"])?,
        german_required: german_field(&value["german_required"])?,
        key_matches: string_list_field(&value["key_matches"], "key_matches")?,
        missing_skills: string_list_field(&value["missing_skills"], "missing_skills")?,
        recommendation: value["recommendation"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| invalid("recommendation", "expected a string"))?,
    })
}

/// Parse the response as JSON, recovering from a surrounding code fence or
/// chatter around the object.
fn parse_json_object(response: &str) -> Result<Value, AnalysisError> {
    let trimmed = response.trim();
    let first_error = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    let unfenced = strip_code_fence(trimmed);
    if let Ok(value) = serde_json::from_str::<Value>(unfenced) {
        return Ok(value);
    }

    if let (Some(start), Some(end)) = (unfenced.find('{'), unfenced.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<Value>(&unfenced[start..=end]) {
                warn!("Recovered JSON object from surrounding text");
                return Ok(value);
            }
        }
    }

    Err(AnalysisError::Parse(first_error))
}

fn strip_code_fence(text: &str) -> &str {
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

fn score_field(value: &Value) -> Result<u8, AnalysisError> {
    let score = match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| invalid("match_score", "not a finite number"))?,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid("match_score", format!("not a number: {:?}", s)))?,
        other => return Err(invalid("match_score", format!("expected a number, got {}", other))),
    };

    if !(0.0..=100.0).contains(&score) {
        warn!("match_score {} out of range, clamping to 0-100", score);
    }
    Ok(score.round().clamp(0.0, 100.0) as u8)
}

fn german_field(value: &Value) -> Result<GermanRequired, AnalysisError> {
    value
        .as_str()
        .and_then(GermanRequired::parse)
        .ok_or_else(|| invalid("german_required", format!("expected \"Yes\" or \"No\", got {}", value)))
}

fn string_list_field(value: &Value, field: &'static str) -> Result<Vec<String>, AnalysisError> {
    let items = value
        .as_array()
        .ok_or_else(|| invalid(field, "expected an array of strings"))?;

    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| invalid(field, format!("non-string entry {}", item)))
        })
        .collect()
}

fn invalid(field: &'static str, reason: impl Into<String>) -> AnalysisError {
    AnalysisError::InvalidField {
        field,
        reason: reason.into(),
    }
}

fn analyzed_record(job: &BasicJobRecord, verdict: MatchVerdict) -> AnalyzedJobRecord {
    AnalyzedJobRecord {
        search_category: job.search_category.clone(),
        title: job.title.clone(),
        company: job.company.clone(),
        location: job.location.clone(),
        url: job.url.clone(),
        match_score: verdict.match_score,
        german_required: verdict.german_required,
        key_matches: verdict.key_matches,
        missing_skills: verdict.missing_skills,
        recommendation: verdict.recommendation,
    }
}

/// Zero-score placeholder used whenever analysis fails.
pub fn fallback_record(job: &BasicJobRecord) -> AnalyzedJobRecord {
    AnalyzedJobRecord {
        search_category: job.search_category.clone(),
        title: job.title.clone(),
        company: job.company.clone(),
        location: job.location.clone(),
        url: job.url.clone(),
        match_score: 0,
        german_required: GermanRequired::No,
        key_matches: vec![ANALYSIS_FAILED.to_string()],
        missing_skills: vec![ANALYSIS_FAILED.to_string()],
        recommendation: FALLBACK_RECOMMENDATION.to_string(),
    }
}
