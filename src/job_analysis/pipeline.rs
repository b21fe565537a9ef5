// src/job_analysis/pipeline.rs
use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

use super::dedup::dedupe;
use super::description_fetcher::{fetch_description, DEFAULT_MAX_RETRIES};
use super::job_analyzer::MatchAnalyzer;
use super::listing_harvester::harvest;
use super::oracle::AnalysisOracle;
use super::page_fetcher::PageFetcher;
use super::report::{write_report, ReportSummary, WrittenReport};
use super::{AnalyzedJobRecord, BasicJobRecord};
use crate::utils::{run_timestamp, DelayRange};

pub const DEFAULT_BASE_URL: &str = "https://www.arbeitnow.com";
const DEFAULT_JOB_TIMEOUT_SECS: u64 = 300;

/// Politeness pauses. They only shape the request rate, never the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub page_delay: DelayRange,
    pub job_delay: DelayRange,
    pub retry_backoff: DelayRange,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            page_delay: DelayRange::from_secs(1, 2),
            job_delay: DelayRange::from_secs(1, 2),
            retry_backoff: DelayRange::from_secs(2, 4),
        }
    }
}

impl Pacing {
    pub fn none() -> Self {
        Self {
            page_delay: DelayRange::ZERO,
            job_delay: DelayRange::ZERO,
            retry_backoff: DelayRange::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub base_url: String,
    pub max_retries: u32,
    pub pacing: Pacing,
    /// Upper bound on fetching and analyzing a single job.
    pub job_timeout: Duration,
    pub output_dir: PathBuf,
}

impl PipelineSettings {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            pacing: Pacing::default(),
            job_timeout: Duration::from_secs(DEFAULT_JOB_TIMEOUT_SECS),
            output_dir,
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_job_timeout(mut self, job_timeout: Duration) -> Self {
        self.job_timeout = job_timeout;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub pages_fetched: usize,
    pub harvested: usize,
    pub unique: usize,
    pub skipped: usize,
    pub analyzed: Vec<AnalyzedJobRecord>,
    pub summary: Option<ReportSummary>,
    pub report: Option<WrittenReport>,
}

/// Drives a full run: harvest listings, dedupe, fetch descriptions, score, report.
///
/// Owns the page fetcher for the whole run; every request is issued sequentially.
pub struct JobPipeline<F, O> {
    fetcher: F,
    analyzer: MatchAnalyzer<O>,
    resume: String,
    settings: PipelineSettings,
}

impl<F, O> JobPipeline<F, O>
where
    F: PageFetcher,
    O: AnalysisOracle,
{
    pub fn new(fetcher: F, oracle: O, resume: String, settings: PipelineSettings) -> Self {
        Self {
            fetcher,
            analyzer: MatchAnalyzer::new(oracle),
            resume,
            settings,
        }
    }

    pub async fn run(&self, categories: &[String], max_pages: u32) -> Result<RunOutcome> {
        let (jobs, pages_fetched) = self.harvest_all(categories, max_pages).await;
        let harvested = jobs.len();

        info!("Removing duplicate job listings...");
        let unique_jobs = dedupe(jobs);
        info!("Removed {} duplicate jobs", harvested - unique_jobs.len());
        info!(
            "Collected {} unique jobs across all categories",
            unique_jobs.len()
        );
        let unique = unique_jobs.len();

        let (analyzed, skipped) = self.analyze_all(unique_jobs).await;

        let summary = ReportSummary::from_records(&analyzed);
        let report = match &summary {
            Some(summary) => {
                let written = write_report(&analyzed, &self.settings.output_dir, &run_timestamp())?;
                summary.log();
                written
            }
            None => {
                warn!("No jobs were analyzed, skipping report");
                None
            }
        };

        Ok(RunOutcome {
            pages_fetched,
            harvested,
            unique,
            skipped,
            analyzed,
            summary,
            report,
        })
    }

    /// Collect basic records for every category, stopping a category at its
    /// first empty page. Returns the records and the number of pages fetched.
    async fn harvest_all(
        &self,
        categories: &[String],
        max_pages: u32,
    ) -> (Vec<BasicJobRecord>, usize) {
        let mut all_jobs = Vec::new();
        let mut pages_fetched = 0;

        for category in categories {
            info!("Processing category: {}", category);

            for page in 1..=max_pages {
                info!("Processing page {} for {}", page, category);
                let page_jobs = harvest(&self.fetcher, &self.settings.base_url, category, page).await;
                pages_fetched += 1;

                if page_jobs.is_empty() {
                    break;
                }

                all_jobs.extend(page_jobs);
                self.settings.pacing.page_delay.pause().await;
            }
        }

        (all_jobs, pages_fetched)
    }

    async fn analyze_all(&self, jobs: Vec<BasicJobRecord>) -> (Vec<AnalyzedJobRecord>, usize) {
        let total = jobs.len();
        let mut analyzed = Vec::with_capacity(total);
        let mut skipped = 0;

        info!("Starting to fetch job descriptions and analyze...");
        for (index, mut job) in jobs.into_iter().enumerate() {
            info!("Processing job {}/{}: {}", index + 1, total, job.title);

            let outcome =
                tokio::time::timeout(self.settings.job_timeout, self.process_job(&mut job)).await;

            match outcome {
                Ok(Some(record)) => {
                    analyzed.push(record);
                    self.settings.pacing.job_delay.pause().await;
                }
                Ok(None) => {
                    warn!("No description for {}, skipping", job.url);
                    skipped += 1;
                }
                Err(_) => {
                    error!(
                        "Error processing job {}: timed out after {:?}",
                        job.title, self.settings.job_timeout
                    );
                    skipped += 1;
                }
            }
        }

        (analyzed, skipped)
    }

    async fn process_job(&self, job: &mut BasicJobRecord) -> Option<AnalyzedJobRecord> {
        let description = fetch_description(
            &self.fetcher,
            &job.url,
            self.settings.max_retries,
            self.settings.pacing.retry_backoff,
        )
        .await;

        if description.trim().is_empty() {
            return None;
        }

        job.description = Some(description);
        Some(self.analyzer.analyze(&self.resume, job).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job_analysis::page_fetcher::RenderedPage;
    use crate::job_analysis::GermanRequired;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned pages by exact URL; anything else fails.
    struct MapFetcher {
        pages: HashMap<String, String>,
        requested: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PageFetcher for MapFetcher {
        async fn render(&self, url: &str) -> anyhow::Result<RenderedPage> {
            self.requested.lock().unwrap().push(url.to_string());
            match self.pages.get(url) {
                Some(html) => Ok(RenderedPage::new(url, html.clone())),
                None => anyhow::bail!("no page for {}", url),
            }
        }
    }

    struct FixedOracle;

    #[async_trait]
    impl AnalysisOracle for FixedOracle {
        async fn complete(&self, _system: &str, user: &str) -> anyhow::Result<String> {
            let score = if user.contains("Failed to fetch description") { 5 } else { 70 };
            Ok(format!(
                r#"{{"match_score": {score}, "german_required": "No", "key_matches": ["x"], "missing_skills": [], "recommendation": "ok"}}"#
            ))
        }
    }

    struct SlowOracle;

    #[async_trait]
    impl AnalysisOracle for SlowOracle {
        async fn complete(&self, _system: &str, _user: &str) -> anyhow::Result<String> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            anyhow::bail!("unreachable")
        }
    }

    const BASE: &str = "https://jobs.test";

    fn listings(paths: &[&str]) -> String {
        let items: Vec<String> = paths
            .iter()
            .map(|path| {
                format!(
                    r#"<li class="list-none hover:shadow-sm"><h2 itemprop="title"><a itemprop="url" href="{path}">Role {path}</a></h2>
                    <a itemprop="hiringOrganization">Acme</a><span class="text-gray-600">Berlin</span></li>"#
                )
            })
            .collect();
        format!("<ul>{}</ul>", items.join(""))
    }

    fn page_url(category: &str, page: u32) -> String {
        format!("{BASE}/?search={category}&tags=&sort_by=newest&page={page}")
    }

    fn posting(text: &str) -> String {
        format!(r#"<div itemprop="description"><p>{text}</p></div>"#)
    }

    fn settings(dir: &std::path::Path) -> PipelineSettings {
        PipelineSettings::new(dir.to_path_buf())
            .with_base_url(BASE.to_string())
            .with_pacing(Pacing::none())
    }

    #[tokio::test]
    async fn test_category_stops_at_first_empty_page() {
        let dir = tempfile::tempdir().unwrap();
        let mut pages = HashMap::new();
        pages.insert(page_url("product", 1), listings(&["/jobs/1"]));
        pages.insert(page_url("product", 2), listings(&[]));
        pages.insert(page_url("product", 3), listings(&["/jobs/3"]));
        pages.insert(format!("{BASE}/jobs/1"), posting("Backlog owner"));
        let fetcher = std::sync::Arc::new(MapFetcher {
            pages,
            requested: Mutex::new(Vec::new()),
        });

        let pipeline = JobPipeline::new(fetcher.clone(), FixedOracle, "resume".into(), settings(dir.path()));
        let outcome = pipeline.run(&["product".to_string()], 5).await.unwrap();

        assert_eq!(outcome.pages_fetched, 2);
        assert!(!fetcher.requested.lock().unwrap().contains(&page_url("product", 3)));
        assert_eq!(outcome.analyzed.len(), 1);
        assert_eq!(outcome.analyzed[0].match_score, 70);
    }

    #[tokio::test]
    async fn test_failed_description_still_analyzed_and_empty_one_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut pages = HashMap::new();
        pages.insert(page_url("business", 1), listings(&["/jobs/a", "/jobs/b", "/jobs/c"]));
        pages.insert(format!("{BASE}/jobs/a"), posting("Real description"));
        pages.insert(format!("{BASE}/jobs/c"), posting(" "));
        let fetcher = MapFetcher {
            pages,
            requested: Mutex::new(Vec::new()),
        };

        let pipeline = JobPipeline::new(fetcher, FixedOracle, "resume".into(), settings(dir.path()));
        let outcome = pipeline.run(&["business".to_string()], 1).await.unwrap();

        assert_eq!(outcome.unique, 3);
        assert_eq!(outcome.skipped, 1);
        let scores: Vec<(&str, u8)> = outcome
            .analyzed
            .iter()
            .map(|r| (r.url.as_str(), r.match_score))
            .collect();
        assert_eq!(
            scores,
            vec![("https://jobs.test/jobs/a", 70), ("https://jobs.test/jobs/b", 5)]
        );
        assert_eq!(outcome.report.unwrap().rows, 2);
    }

    #[tokio::test]
    async fn test_nothing_harvested_produces_no_report() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MapFetcher {
            pages: HashMap::new(),
            requested: Mutex::new(Vec::new()),
        };

        let pipeline = JobPipeline::new(fetcher, FixedOracle, "resume".into(), settings(dir.path()));
        let outcome = pipeline
            .run(&["strategy".to_string(), "project".to_string()], 2)
            .await
            .unwrap();

        assert_eq!(outcome.pages_fetched, 2);
        assert!(outcome.analyzed.is_empty());
        assert!(outcome.summary.is_none());
        assert!(outcome.report.is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_timeout_skips_job_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let mut pages = HashMap::new();
        pages.insert(page_url("product", 1), listings(&["/jobs/1", "/jobs/2"]));
        pages.insert(format!("{BASE}/jobs/1"), posting("One"));
        pages.insert(format!("{BASE}/jobs/2"), posting("Two"));
        let fetcher = MapFetcher {
            pages,
            requested: Mutex::new(Vec::new()),
        };

        let settings = settings(dir.path()).with_job_timeout(Duration::from_secs(10));
        let pipeline = JobPipeline::new(fetcher, SlowOracle, "resume".into(), settings);
        let outcome = pipeline.run(&["product".to_string()], 1).await.unwrap();

        assert_eq!(outcome.unique, 2);
        assert_eq!(outcome.skipped, 2);
        assert!(outcome.analyzed.is_empty());
        assert!(outcome.report.is_none());
    }

    #[tokio::test]
    async fn test_fallback_records_are_reported() {
        struct BrokenOracle;

        #[async_trait]
        impl AnalysisOracle for BrokenOracle {
            async fn complete(&self, _system: &str, _user: &str) -> anyhow::Result<String> {
                Ok("not json".to_string())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let mut pages = HashMap::new();
        pages.insert(page_url("product", 1), listings(&["/jobs/1"]));
        pages.insert(format!("{BASE}/jobs/1"), posting("One"));
        let fetcher = MapFetcher {
            pages,
            requested: Mutex::new(Vec::new()),
        };

        let pipeline = JobPipeline::new(fetcher, BrokenOracle, "resume".into(), settings(dir.path()));
        let outcome = pipeline.run(&["product".to_string()], 1).await.unwrap();

        assert_eq!(outcome.analyzed.len(), 1);
        assert_eq!(outcome.analyzed[0].match_score, 0);
        assert_eq!(outcome.analyzed[0].german_required, GermanRequired::No);
        assert_eq!(outcome.analyzed[0].recommendation, "Analysis failed - please review manually");
        assert!(outcome.report.is_some());
    }
}
