// src/job_analysis/page_fetcher.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::utils::collapse_whitespace;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Renders a URL into queryable markup.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn render(&self, url: &str) -> Result<RenderedPage>;
}

#[async_trait]
impl<T: PageFetcher + ?Sized> PageFetcher for Arc<T> {
    async fn render(&self, url: &str) -> Result<RenderedPage> {
        (**self).render(url).await
    }
}

/// Markup returned by a [`PageFetcher`], together with the URL it was served from.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub url: String,
    pub html: String,
}

impl RenderedPage {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }

    pub fn document(&self) -> Html {
        Html::parse_document(&self.html)
    }
}

pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow::anyhow!("Invalid selector '{}': {:?}", css, e))
}

/// First descendant of `element` matching `selector`.
pub fn select_first<'a>(element: ElementRef<'a>, selector: &Selector) -> Option<ElementRef<'a>> {
    element.select(selector).next()
}

/// Inline text of an element with whitespace collapsed.
pub fn inline_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

/// Text of an element keeping one line per text node, with blank nodes dropped.
pub fn block_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn attribute(element: ElementRef<'_>, name: &str) -> Option<String> {
    element
        .value()
        .attr(name)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Plain HTTP implementation of [`PageFetcher`]. Holds a single client for the run.
pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn render(&self, url: &str) -> Result<RenderedPage> {
        debug!("Rendering page: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP error {} for {}", status, url);
        }

        let final_url = response.url().to_string();
        let html = response
            .text()
            .await
            .context("Failed to read response body")?;

        Ok(RenderedPage::new(final_url, html))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_helpers() {
        let page = RenderedPage::new(
            "https://example.com",
            r#"<div id="d"><p>First   line</p>
                <ul><li> item one </li><li></li><li>item
                two</li></ul></div>"#,
        );
        let document = page.document();
        let root = document
            .select(&selector("#d").unwrap())
            .next()
            .unwrap();

        assert_eq!(block_text(root), "First line\nitem one\nitem two");
        assert_eq!(inline_text(root), "First line item one item two");
    }

    #[test]
    fn test_attribute_ignores_blank_values() {
        let page = RenderedPage::new("https://example.com", r#"<a id="x" href=" ">x</a><a id="y" href="/jobs/1">y</a>"#);
        let document = page.document();
        let x = document.select(&selector("#x").unwrap()).next().unwrap();
        let y = document.select(&selector("#y").unwrap()).next().unwrap();

        assert_eq!(attribute(x, "href"), None);
        assert_eq!(attribute(y, "href").as_deref(), Some("/jobs/1"));
    }

    #[test]
    fn test_escaped_class_selector_parses() {
        assert!(selector("li.list-none.hover\\:shadow-sm").is_ok());
        assert!(selector("li[").is_err());
    }
}
