// src/job_analysis/dedup.rs
use std::collections::HashSet;

use super::BasicJobRecord;

/// Keep the first record seen for each URL, preserving input order.
pub fn dedupe(records: Vec<BasicJobRecord>) -> Vec<BasicJobRecord> {
    let mut seen_urls = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|job| seen_urls.insert(job.url.clone()))
        .collect()
}
