// src/job_analysis/report.rs
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{AnalyzedJobRecord, GermanRequired};

const TOP_MATCHES: usize = 5;

#[derive(Debug, Serialize)]
struct ReportRow<'a> {
    #[serde(rename = "S.No")]
    sequence: usize,
    search_category: &'a str,
    title: &'a str,
    company: &'a str,
    location: &'a str,
    url: &'a str,
    match_score: u8,
    german_required: &'static str,
    key_matches: String,
    missing_skills: String,
    recommendation: &'a str,
}

impl<'a> ReportRow<'a> {
    fn new(sequence: usize, record: &'a AnalyzedJobRecord) -> Self {
        Self {
            sequence,
            search_category: &record.search_category,
            title: &record.title,
            company: &record.company,
            location: &record.location,
            url: &record.url,
            match_score: record.match_score,
            german_required: record.german_required.as_str(),
            key_matches: record.key_matches_joined(),
            missing_skills: record.missing_skills_joined(),
            recommendation: &record.recommendation,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WrittenReport {
    pub path: PathBuf,
    pub rows: usize,
}

pub fn report_file_name(timestamp: &str) -> String {
    format!("Analyzed_Jobs_{}.csv", timestamp)
}

/// Write the analyzed jobs as CSV, one row per job with a 1-based `S.No`.
///
/// Writes nothing and returns `None` when there are no records.
pub fn write_report(
    records: &[AnalyzedJobRecord],
    output_dir: &Path,
    timestamp: &str,
) -> Result<Option<WrittenReport>> {
    if records.is_empty() {
        return Ok(None);
    }

    let path = output_dir.join(report_file_name(timestamp));
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("Failed to create report file: {}", path.display()))?;

    for (index, record) in records.iter().enumerate() {
        writer
            .serialize(ReportRow::new(index + 1, record))
            .context("Failed to write report row")?;
    }
    writer.flush().context("Failed to flush report file")?;

    info!("Results saved to {}", path.display());
    Ok(Some(WrittenReport {
        path,
        rows: records.len(),
    }))
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategorySummary {
    pub category: String,
    pub count: usize,
    pub mean_score: f64,
    pub german_required: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportSummary {
    pub total: usize,
    pub mean_score: f64,
    pub german_required: usize,
    /// Ordered by category name.
    pub categories: Vec<CategorySummary>,
    /// Highest scores first; ties keep report order.
    pub top_matches: Vec<AnalyzedJobRecord>,
}

impl ReportSummary {
    pub fn from_records(records: &[AnalyzedJobRecord]) -> Option<Self> {
        if records.is_empty() {
            return None;
        }

        let mut groups: BTreeMap<&str, Vec<&AnalyzedJobRecord>> = BTreeMap::new();
        for record in records {
            groups.entry(record.search_category.as_str()).or_default().push(record);
        }

        let categories = groups
            .into_iter()
            .map(|(category, group)| CategorySummary {
                category: category.to_string(),
                count: group.len(),
                mean_score: mean_score(group.iter().copied()),
                german_required: count_german(group.iter().copied()),
            })
            .collect();

        let mut top_matches = records.to_vec();
        top_matches.sort_by(|a, b| b.match_score.cmp(&a.match_score));
        top_matches.truncate(TOP_MATCHES);

        Some(Self {
            total: records.len(),
            mean_score: mean_score(records.iter()),
            german_required: count_german(records.iter()),
            categories,
            top_matches,
        })
    }

    pub fn log(&self) {
        info!("Analysis Summary:");
        info!("Total jobs analyzed: {}", self.total);
        info!("Average match score: {:.2}", self.mean_score);
        info!("Jobs requiring German: {}", self.german_required);

        info!("Category-wise Summary:");
        info!("{:<20} {:>6} {:>10} {:>8}", "search_category", "count", "avg_score", "german");
        for category in &self.categories {
            info!(
                "{:<20} {:>6} {:>10.2} {:>8}",
                category.category, category.count, category.mean_score, category.german_required
            );
        }

        info!("Top {} Matches Overall:", TOP_MATCHES);
        for (rank, job) in self.top_matches.iter().enumerate() {
            info!(
                "{}. [{}] {} at {} - score {}, German: {}, matches: {}",
                rank + 1,
                job.search_category,
                job.title,
                job.company,
                job.match_score,
                job.german_required,
                job.key_matches_joined()
            );
        }
    }
}

fn mean_score<'a>(records: impl Iterator<Item = &'a AnalyzedJobRecord>) -> f64 {
    let (sum, count) = records.fold((0u64, 0usize), |(sum, count), record| {
        (sum + u64::from(record.match_score), count + 1)
    });
    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}

fn count_german<'a>(records: impl Iterator<Item = &'a AnalyzedJobRecord>) -> usize {
    records
        .filter(|record| record.german_required == GermanRequired::Yes)
        .count()
}
