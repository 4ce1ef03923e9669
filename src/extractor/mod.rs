//! Content extraction under page-layout drift.
//!
//! Source templates differ by section and era (news, opinion, long-form,
//! older layouts), so every extraction point is an ordered
//! [`SelectorChain`] rather than a single selector. Chains are plain data in
//! [`ExtractorConfig`], parsed once at startup, and tried strictly in order.
//! Which strategy matched is logged but never changes the shape of the
//! result.
//!
//! # Submodules
//!
//! - [`chain`]: selector chains and capture rules
//! - [`preview`]: section listing previews
//! - [`article`]: full article pages

pub mod article;
pub mod chain;
pub mod preview;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use url::Url;

pub use chain::SelectorChain;
pub use preview::PreviewStrategy;

/// One preview strategy as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PreviewSpec {
    pub headline: String,
    /// Usually an `@href` capture.
    pub link: String,
    #[serde(default)]
    pub standfirst: Option<String>,
}

impl PreviewSpec {
    fn new(headline: &str, link: &str, standfirst: Option<&str>) -> Self {
        Self {
            headline: headline.to_string(),
            link: link.to_string(),
            standfirst: standfirst.map(String::from),
        }
    }
}

/// Selector chains for every extraction point, in priority order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Elements wrapping one preview each on a section listing.
    pub containers: Vec<String>,
    pub previews: Vec<PreviewSpec>,
    /// Any match means the article body is not accessible.
    pub paywall: Vec<String>,
    pub title: Vec<String>,
    pub published: Vec<String>,
    pub author: Vec<String>,
    /// Body containers; paragraphs inside the first non-empty one are used.
    pub body: Vec<String>,
    /// Elements signalling that an article page has rendered.
    pub ready: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            containers: strings(&[".js-teaser", ".o-teaser", "article", "li.stream__item"]),
            previews: vec![
                PreviewSpec::new(
                    ".js-teaser-heading-link",
                    ".js-teaser-heading-link@href",
                    Some(".js-teaser-standfirst"),
                ),
                PreviewSpec::new(
                    ".o-teaser__heading",
                    ".o-teaser__heading a@href",
                    Some(".o-teaser__standfirst"),
                ),
                PreviewSpec::new(
                    "a[data-trackable='heading-link']",
                    "a[data-trackable='heading-link']@href",
                    Some("[data-trackable='standfirst']"),
                ),
                PreviewSpec::new("h3, h2", "a[href]@href", Some("p")),
            ],
            paywall: strings(&[
                ".o-topper__paywall",
                ".o-topper__premium",
                ".o-topper__locked",
                "[data-trackable='barrier']",
                "#barrier-page",
            ]),
            title: strings(&[
                "h1.o-topper__headline",
                "h1[data-trackable='heading']",
                "article h1",
                "h1",
                "meta[property='og:title']@content",
            ]),
            published: strings(&[
                "time[datetime]@datetime",
                "meta[property='article:published_time']@content",
                ".article__timestamp",
                ".o-date",
            ]),
            author: strings(&[
                ".o-topper__author",
                ".article__author-name",
                "a[data-trackable='author']",
                "meta[name='author']@content",
            ]),
            body: strings(&[
                "article.n-content-body",
                "#article-body",
                ".article__content-body",
                ".article__content",
                ".article__body",
                ".n-content-layout",
                ".o-topper__content",
                ".o-topper__standfirst",
            ]),
            ready: strings(&["h1", "article", "main"]),
        }
    }
}

/// Parsed extraction chains bound to the source's canonical origin.
#[derive(Debug, Clone)]
pub struct Extractor {
    origin: Url,
    containers: SelectorChain,
    previews: Vec<PreviewStrategy>,
    paywall: SelectorChain,
    title: SelectorChain,
    published: SelectorChain,
    author: SelectorChain,
    body: SelectorChain,
    ready: SelectorChain,
}

impl Extractor {
    pub fn from_config(config: &ExtractorConfig, origin: Url) -> Result<Self, ConfigError> {
        let previews = config
            .previews
            .iter()
            .map(PreviewStrategy::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            origin,
            containers: SelectorChain::parse("containers", &config.containers)?,
            previews,
            paywall: SelectorChain::parse("paywall", &config.paywall)?,
            title: SelectorChain::parse("title", &config.title)?,
            published: SelectorChain::parse("published", &config.published)?,
            author: SelectorChain::parse("author", &config.author)?,
            body: SelectorChain::parse("body", &config.body)?,
            ready: SelectorChain::parse("ready", &config.ready)?,
        })
    }

    /// Chain to wait for before scanning a section listing.
    pub fn listing_ready(&self) -> &SelectorChain {
        &self.containers
    }

    /// Chain to wait for before extracting an article page.
    pub fn article_ready(&self) -> &SelectorChain {
        &self.ready
    }

    /// Title chain; any title the extractor can read also means the page is ready.
    pub fn title_chain(&self) -> &SelectorChain {
        &self.title
    }

    pub fn paywall_markers(&self) -> &SelectorChain {
        &self.paywall
    }
}
