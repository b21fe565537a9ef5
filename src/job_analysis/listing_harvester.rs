// src/job_analysis/listing_harvester.rs
use anyhow::{Context, Result};
use reqwest::Url;
use scraper::{ElementRef, Selector};
use tracing::{error, info, warn};

use super::page_fetcher::{attribute, inline_text, select_first, selector, PageFetcher, RenderedPage};
use super::BasicJobRecord;

const LISTING_SELECTOR: &str = "li.list-none.hover\\:shadow-sm";
const TITLE_SELECTOR: &str = "h2[itemprop=\"title\"]";
const URL_SELECTOR: &str = "a[itemprop=\"url\"]";
const COMPANY_SELECTOR: &str = "a[itemprop=\"hiringOrganization\"]";
const LOCATION_SELECTOR: &str = "span.text-gray-600";

struct ListingSelectors {
    listing: Selector,
    title: Selector,
    url: Selector,
    company: Selector,
    location: Selector,
}

impl ListingSelectors {
    fn new() -> Result<Self> {
        Ok(Self {
            listing: selector(LISTING_SELECTOR)?,
            title: selector(TITLE_SELECTOR)?,
            url: selector(URL_SELECTOR)?,
            company: selector(COMPANY_SELECTOR)?,
            location: selector(LOCATION_SELECTOR)?,
        })
    }
}

/// Listings URL for one category page, newest postings first.
pub fn listings_url(base_url: &str, category: &str, page_number: u32) -> Result<String> {
    let mut url = Url::parse(base_url).with_context(|| format!("Invalid base URL: {}", base_url))?;
    url.set_path("/");
    url.query_pairs_mut()
        .clear()
        .append_pair("search", category)
        .append_pair("tags", "")
        .append_pair("sort_by", "newest")
        .append_pair("page", &page_number.to_string());
    Ok(url.to_string())
}

/// Scrape the basic job records from one listings page.
///
/// Never fails: a fetch or parse error is logged and reported as an empty page,
/// which the caller treats as the end of that category.
pub async fn harvest<F>(
    fetcher: &F,
    base_url: &str,
    category: &str,
    page_number: u32,
) -> Vec<BasicJobRecord>
where
    F: PageFetcher + ?Sized,
{
    let url = match listings_url(base_url, category, page_number) {
        Ok(url) => url,
        Err(e) => {
            error!("Error building listings URL for '{}': {:#}", category, e);
            return Vec::new();
        }
    };

    info!("Scraping URL: {}", url);

    let page = match fetcher.render(&url).await {
        Ok(page) => page,
        Err(e) => {
            error!("Error scraping page {} of '{}': {:#}", page_number, category, e);
            return Vec::new();
        }
    };

    match parse_listings(&page, category) {
        Ok(jobs) => {
            info!(
                "Extracted basic info for {} jobs from page {} of '{}'",
                jobs.len(),
                page_number,
                category
            );
            jobs
        }
        Err(e) => {
            error!("Error parsing page {} of '{}': {:#}", page_number, category, e);
            Vec::new()
        }
    }
}

/// Parse every listing element on a page, skipping the malformed ones.
pub fn parse_listings(page: &RenderedPage, category: &str) -> Result<Vec<BasicJobRecord>> {
    let selectors = ListingSelectors::new()?;
    let base = Url::parse(&page.url).ok();
    let document = page.document();

    let listings: Vec<ElementRef<'_>> = document.select(&selectors.listing).collect();
    info!("Found {} job listings", listings.len());

    let mut jobs = Vec::with_capacity(listings.len());
    for (index, listing) in listings.into_iter().enumerate() {
        match parse_listing(listing, &selectors, base.as_ref(), category) {
            Ok(job) => jobs.push(job),
            Err(e) => warn!("Skipping listing #{} on {}: {:#}", index + 1, page.url, e),
        }
    }

    Ok(jobs)
}

fn parse_listing(
    listing: ElementRef<'_>,
    selectors: &ListingSelectors,
    base: Option<&Url>,
    category: &str,
) -> Result<BasicJobRecord> {
    let title_element = select_first(listing, &selectors.title).context("missing title")?;
    let title = non_empty(inline_text(title_element), "title")?;

    let href = select_first(title_element, &selectors.url)
        .and_then(|link| attribute(link, "href"))
        .context("missing job URL")?;
    let url = resolve_url(base, &href)?;

    let company = select_first(listing, &selectors.company)
        .map(inline_text)
        .context("missing company")?;
    let company = non_empty(company, "company")?;

    let location = select_first(listing, &selectors.location)
        .map(inline_text)
        .context("missing location")?;
    let location = non_empty(location, "location")?;

    Ok(BasicJobRecord {
        search_category: category.to_string(),
        title,
        company,
        location,
        url,
        description: None,
    })
}

fn non_empty(value: String, field: &str) -> Result<String> {
    if value.is_empty() {
        anyhow::bail!("empty {}", field);
    }
    Ok(value)
}

fn resolve_url(base: Option<&Url>, href: &str) -> Result<String> {
    match Url::parse(href) {
        Ok(url) => Ok(url.to_string()),
        Err(_) => {
            let base = base.with_context(|| format!("relative job URL without base: {}", href))?;
            let url = base
                .join(href)
                .with_context(|| format!("invalid job URL: {}", href))?;
            Ok(url.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn listing(title: &str, href: &str, company: &str, location: &str) -> String {
        format!(
            r#"<li class="list-none hover:shadow-sm">
                <h2 itemprop="title"><a itemprop="url" href="{href}">{title}</a></h2>
                <a itemprop="hiringOrganization">{company}</a>
                <span class="text-gray-600">{location}</span>
            </li>"#
        )
    }

    fn listings_page(items: &[String]) -> String {
        format!("<html><body><ul>{}</ul></body></html>", items.join("\n"))
    }

    struct StaticFetcher {
        html: Option<String>,
        requested: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn render(&self, url: &str) -> Result<RenderedPage> {
            self.requested.lock().unwrap().push(url.to_string());
            match &self.html {
                Some(html) => Ok(RenderedPage::new(url, html.clone())),
                None => anyhow::bail!("navigation timeout"),
            }
        }
    }

    #[test]
    fn test_listings_url() {
        let url = listings_url("https://www.arbeitnow.com", "product", 2).unwrap();
        assert_eq!(
            url,
            "https://www.arbeitnow.com/?search=product&tags=&sort_by=newest&page=2"
        );

        let url = listings_url("https://www.arbeitnow.com/", "data science", 1).unwrap();
        assert!(url.contains("search=data+science"));
    }

    #[test]
    fn test_parse_listings_skips_malformed_elements() {
        let html = listings_page(&[
            listing("Product Manager", "/jobs/pm-1", "Acme GmbH", "Berlin"),
            listing("", "/jobs/empty-title", "Acme GmbH", "Berlin"),
            listing("Strategy Lead", "https://www.arbeitnow.com/jobs/sl-2", "Globex", "Remote"),
            r#"<li class="list-none hover:shadow-sm"><h2 itemprop="title">No link</h2></li>"#.to_string(),
            listing("Consultant", "/jobs/c-3", "", "Munich"),
        ]);
        let page = RenderedPage::new("https://www.arbeitnow.com/?search=x&page=1", html);

        let jobs = parse_listings(&page, "product").unwrap();

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].title, "Product Manager");
        assert_eq!(jobs[0].url, "https://www.arbeitnow.com/jobs/pm-1");
        assert_eq!(jobs[0].company, "Acme GmbH");
        assert_eq!(jobs[0].location, "Berlin");
        assert_eq!(jobs[0].search_category, "product");
        assert!(jobs[0].description.is_none());
        assert_eq!(jobs[1].url, "https://www.arbeitnow.com/jobs/sl-2");
    }

    #[test]
    fn test_parse_listings_empty_page() {
        let page = RenderedPage::new("https://www.arbeitnow.com/", "<html><body>No results</body></html>");
        assert!(parse_listings(&page, "product").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_harvest_fetch_failure_yields_empty_page() {
        let fetcher = StaticFetcher {
            html: None,
            requested: Mutex::new(Vec::new()),
        };

        let jobs = harvest(&fetcher, "https://www.arbeitnow.com", "business", 3).await;

        assert!(jobs.is_empty());
        assert_eq!(fetcher.requested.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_harvest_returns_well_formed_listings() {
        let html = listings_page(&[
            listing("Marketing Manager", "/jobs/mm", "Initech", "Hamburg"),
            listing("Marketing Analyst", "/jobs/ma", "Initech", ""),
        ]);
        let fetcher = StaticFetcher {
            html: Some(html),
            requested: Mutex::new(Vec::new()),
        };

        let jobs = harvest(&fetcher, "https://www.arbeitnow.com", "marketing", 1).await;

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].url, "https://www.arbeitnow.com/jobs/mm");
        assert_eq!(
            fetcher.requested.lock().unwrap()[0],
            "https://www.arbeitnow.com/?search=marketing&tags=&sort_by=newest&page=1"
        );
    }
}
