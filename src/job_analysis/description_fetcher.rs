// src/job_analysis/description_fetcher.rs
use anyhow::{Context, Result};
use tracing::{error, info, warn};

use super::page_fetcher::{block_text, selector, PageFetcher, RenderedPage};
use crate::utils::DelayRange;

/// Placeholder stored when no attempt could retrieve the description.
pub const DESCRIPTION_FAILED: &str = "Failed to fetch description";

pub const DEFAULT_MAX_RETRIES: u32 = 3;

const DESCRIPTION_SELECTOR: &str = "div[itemprop=\"description\"]";

/// Fetch the full description of a job posting.
///
/// Makes up to `max_retries` attempts (at least one), pausing for `backoff`
/// between failed attempts. Returns [`DESCRIPTION_FAILED`] once every attempt
/// has failed; never returns an error.
pub async fn fetch_description<F>(
    fetcher: &F,
    url: &str,
    max_retries: u32,
    backoff: DelayRange,
) -> String
where
    F: PageFetcher + ?Sized,
{
    let attempts = max_retries.max(1);

    for attempt in 1..=attempts {
        info!("Fetching job description: {}", url);

        let result = match fetcher.render(url).await {
            Ok(page) => extract_description(&page),
            Err(e) => Err(e),
        };

        match result {
            Ok(description) => {
                info!("Description fetched successfully");
                return description;
            }
            Err(e) if attempt == attempts => {
                error!("Failed to get description for {}: {:#}", url, e);
            }
            Err(e) => {
                warn!("Attempt {} failed for {}: {:#}", attempt, url, e);
                backoff.pause().await;
            }
        }
    }

    DESCRIPTION_FAILED.to_string()
}

/// Text of the description container, one line per text block.
pub fn extract_description(page: &RenderedPage) -> Result<String> {
    let container = selector(DESCRIPTION_SELECTOR)?;
    let document = page.document();
    let element = document
        .select(&container)
        .next()
        .context("Description element not found")?;
    Ok(block_text(element))
}
