//! Previews on section listings.

use crate::browser::Page;
use crate::error::ConfigError;
use crate::extractor::chain::Strategy;
use crate::extractor::{Extractor, PreviewSpec};
use crate::models::ArticlePreview;
use crate::utils::truncate_for_log;
use chrono::Utc;
use itertools::Itertools;
use scraper::ElementRef;
use tracing::{debug, instrument};
use url::Url;

/// Headline, link and optional standfirst captures for one teaser template.
#[derive(Debug, Clone)]
pub struct PreviewStrategy {
    headline: Strategy,
    link: Strategy,
    standfirst: Option<Strategy>,
}

impl PreviewStrategy {
    pub fn parse(spec: &PreviewSpec) -> Result<Self, ConfigError> {
        Ok(Self {
            headline: Strategy::parse("previews.headline", &spec.headline)?,
            link: Strategy::parse("previews.link", &spec.link)?,
            standfirst: spec
                .standfirst
                .as_deref()
                .map(|s| Strategy::parse("previews.standfirst", s))
                .transpose()?,
        })
    }

    fn first(strategy: &Strategy, fragment: ElementRef<'_>) -> Option<String> {
        fragment
            .select(strategy.selector())
            .find_map(|el| strategy.capture(el))
    }
}

impl Extractor {
    /// Resolve a captured link against the origin; `None` for anything that
    /// leaves the source or points at the bare front page.
    fn canonical_link(&self, href: &str) -> Option<Url> {
        let mut url = self.origin.join(href).ok()?;
        url.set_fragment(None);
        (url.origin() == self.origin.origin() && url.path() != "/").then_some(url)
    }

    /// Pull one preview out of a teaser fragment.
    ///
    /// Strategies are tried in order; the first that yields both a headline
    /// and a link on the canonical origin wins. A fragment no strategy can
    /// read is logged and skipped.
    pub fn extract_preview(&self, fragment: ElementRef<'_>) -> Option<ArticlePreview> {
        let found = self.previews.iter().enumerate().find_map(|(i, strategy)| {
            let headline = PreviewStrategy::first(&strategy.headline, fragment)?;
            let href = PreviewStrategy::first(&strategy.link, fragment)?;
            let url = self.canonical_link(&href)?;
            let standfirst = strategy
                .standfirst
                .as_ref()
                .and_then(|s| PreviewStrategy::first(s, fragment))
                .filter(|s| *s != headline);
            debug!(strategy = i, headline = %headline, "Matched preview");
            Some(ArticlePreview {
                headline,
                url: url.to_string(),
                standfirst,
                discovered_at: Utc::now(),
            })
        });
        if found.is_none() {
            debug!(fragment = %truncate_for_log(&fragment.html(), 200), "No preview strategy matched fragment");
        }
        found
    }

    /// Every distinct preview on a listing, in page order.
    ///
    /// Container selectors are tried in order and the first one that yields
    /// at least one preview wins, so an empty hook sharing a class name with
    /// real teasers does not hide them.
    #[instrument(level = "debug", skip_all, fields(url = %page.url))]
    pub fn extract_previews(&self, page: &Page) -> Vec<ArticlePreview> {
        let doc = page.document();
        let root = doc.root_element();
        for container in self.containers.strategies() {
            let previews: Vec<ArticlePreview> = root
                .select(container.selector())
                .filter_map(|fragment| self.extract_preview(fragment))
                .unique_by(|p| p.url.clone())
                .collect();
            if !previews.is_empty() {
                debug!(container = container.css(), count = previews.len(), "Extracted previews");
                return previews;
            }
        }
        debug!(selectors = %self.containers.describe(), "No readable preview containers on page");
        Vec::new()
    }
}
