//! The single browsing context the crawl engine drives.
//!
//! All navigation goes through a [`PageDriver`]. One driver holds one cookie
//! jar and is mutated strictly in sequence (navigate, extract, navigate), so
//! it is passed around as `&mut` and never shared between tasks.
//!
//! # Drivers
//!
//! | Driver | Module | Use |
//! |--------|--------|-----|
//! | [`HttpDriver`] | [`http`] | Live source over `reqwest` with a managed cookie jar |
//! | `ScriptedDriver` | `testing` | In-memory pages for unit tests |
//!
//! Every wait for page content is bounded: [`wait_for_any`] re-loads the
//! current page until one of the expected selectors shows up or its
//! deadline passes.

pub mod form;
pub mod http;

use crate::error::{BrowseError, NetworkError};
use crate::extractor::SelectorChain;
use crate::models::Cookie;
use scraper::Html;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout_at};
use tracing::{debug, instrument};

pub use http::HttpDriver;

/// A loaded page: the URL it ended up at and its HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub url: String,
    pub html: String,
}

impl Page {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }

    /// Parse the page. The returned document is not `Send`; keep it out of
    /// `.await` points.
    pub fn document(&self) -> Html {
        Html::parse_document(&self.html)
    }
}

/// Operations the crawl engine needs from a browsing context.
#[allow(async_fn_in_trait)]
pub trait PageDriver {
    /// Navigate to `url`.
    async fn goto(&mut self, url: &str) -> Result<Page, NetworkError>;

    /// Load the current page again.
    async fn reload(&mut self) -> Result<Page, NetworkError>;

    /// Ask the current listing for more content (scroll / next page). Returns
    /// the listing with whatever was appended, which may be nothing.
    async fn load_more(&mut self) -> Result<Page, NetworkError>;

    /// Type each `(selector, value)` into `page`'s form and submit it.
    async fn fill_and_submit(&mut self, page: &Page, fields: &[(&str, &str)]) -> Result<Page, BrowseError>;

    /// Click the first element matching `selector`.
    async fn activate(&mut self, page: &Page, selector: &str) -> Result<Page, BrowseError>;

    fn cookies(&self) -> Vec<Cookie>;

    fn set_cookies(&mut self, cookies: &[Cookie]);
}

/// How long to wait for content, and how often to look again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub poll: Duration,
}

impl WaitPolicy {
    pub fn new(timeout: Duration, poll: Duration) -> Self {
        Self { timeout, poll }
    }
}

/// Index of the first chain present on `page` and the selector that matched.
fn find_present(page: &Page, chains: &[&SelectorChain]) -> Option<(usize, String)> {
    let doc = page.document();
    chains.iter().enumerate().find_map(|(i, chain)| {
        chain
            .first_present(doc.root_element())
            .map(|s| (i, s.css().to_string()))
    })
}

/// A page on which one of the awaited chains matched.
#[derive(Debug, Clone)]
pub struct Sighting {
    pub page: Page,
    /// Position of the matching chain in the awaited list.
    pub chain: usize,
    /// The selector of that chain that matched.
    pub selector: String,
}

/// Wait until any of `chains` matches, re-loading the page between looks.
///
/// Chains are checked in order on every look, so an earlier chain wins when
/// several match the same page.
#[instrument(level = "debug", skip_all, fields(url = %page.url))]
pub async fn wait_for_any<D: PageDriver>(
    driver: &mut D,
    page: Page,
    chains: &[&SelectorChain],
    wait: WaitPolicy,
) -> Result<Sighting, BrowseError> {
    let deadline = Instant::now() + wait.timeout;
    let mut page = page;
    loop {
        if let Some((chain, selector)) = find_present(&page, chains) {
            debug!(%selector, "Found awaited element");
            return Ok(Sighting {
                page,
                chain,
                selector,
            });
        }
        if Instant::now() + wait.poll >= deadline {
            break;
        }
        sleep(wait.poll).await;
        match timeout_at(deadline, driver.reload()).await {
            Ok(reloaded) => page = reloaded?,
            Err(_) => break,
        }
    }
    Err(BrowseError::WaitTimeout {
        selectors: chains
            .iter()
            .map(|c| c.describe())
            .collect::<Vec<_>>()
            .join(" | "),
        waited: wait.timeout,
    })
}

/// [`wait_for_any`] for a single chain.
pub async fn wait_for<D: PageDriver>(
    driver: &mut D,
    page: Page,
    chain: &SelectorChain,
    wait: WaitPolicy,
) -> Result<Sighting, BrowseError> {
    wait_for_any(driver, page, &[chain], wait).await
}
