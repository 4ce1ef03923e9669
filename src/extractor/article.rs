//! Full article pages.
//!
//! Extraction order is fixed: paywall markers, title, date and author, body.
//! A paywall short-circuits everything after it. Date and author are
//! optional; title and some body text are required.

use crate::browser::Page;
use crate::error::ExtractError;
use crate::extractor::Extractor;
use crate::models::Article;
use crate::utils::normalize_whitespace;
use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Node, Selector};
use tracing::{debug, instrument, warn};

static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("static selector"));
static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").expect("static selector"));

/// Elements whose text is never visible.
const INVISIBLE: [&str; 4] = ["script", "style", "noscript", "template"];

/// Parse the date formats seen in article toppers and metadata.
fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%B %d %Y", "%B %d, %Y", "%d %B %Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Non-empty paragraph texts of `container`, or its own text if it has no
/// paragraphs.
fn paragraphs(container: ElementRef<'_>) -> Vec<String> {
    let mut texts: Vec<String> = container
        .select(&PARAGRAPH)
        .map(|p| normalize_whitespace(&p.text().collect::<Vec<_>>().join(" ")))
        .filter(|t| !t.is_empty())
        .collect();
    if texts.is_empty() {
        let own = normalize_whitespace(&container.text().collect::<Vec<_>>().join(" "));
        if !own.is_empty() {
            texts.push(own);
        }
    }
    texts
}

/// All text under `<body>` that is not inside a script-like element.
fn visible_text(root: ElementRef<'_>) -> Option<String> {
    let body = root.select(&BODY).next().unwrap_or(root);
    let pieces: Vec<&str> = body
        .descendants()
        .filter_map(|node| match node.value() {
            Node::Text(text) => {
                let hidden = node
                    .ancestors()
                    .filter_map(ElementRef::wrap)
                    .any(|el| INVISIBLE.contains(&el.value().name()));
                (!hidden).then_some(&**text)
            }
            _ => None,
        })
        .collect();
    let text = normalize_whitespace(&pieces.join(" "));
    (!text.is_empty()).then_some(text)
}

impl Extractor {
    /// Body text from the first body strategy that yields anything.
    fn body_text(&self, root: ElementRef<'_>) -> Option<String> {
        self.body.strategies().iter().find_map(|strategy| {
            let texts: Vec<String> = root
                .select(strategy.selector())
                .flat_map(paragraphs)
                .collect();
            if texts.is_empty() {
                return None;
            }
            debug!(selector = strategy.css(), paragraphs = texts.len(), "Matched body");
            Some(texts.join("\n\n"))
        })
    }

    /// Extract a full article from a loaded page.
    ///
    /// # Errors
    ///
    /// * [`ExtractError::Paywalled`] when any paywall marker is present
    /// * [`ExtractError::NoTitle`] when every title strategy fails
    /// * [`ExtractError::NoContent`] when neither the body chain nor the
    ///   page's visible text yields anything
    #[instrument(level = "debug", skip_all, fields(url = %page.url))]
    pub fn extract_full_article(&self, page: &Page) -> Result<Article, ExtractError> {
        let doc = page.document();
        let root = doc.root_element();

        if let Some(marker) = self.paywall.first_present(root) {
            warn!(url = %page.url, marker = marker.css(), "Article is paywalled");
            return Err(ExtractError::Paywalled);
        }

        let (strategy, title) = self.title.first_value(root).ok_or(ExtractError::NoTitle)?;
        debug!(selector = strategy.css(), %title, "Matched title");

        let published_at = match self.published.first_value(root) {
            Some((_, raw)) => {
                let parsed = parse_published(&raw);
                if parsed.is_none() {
                    warn!(url = %page.url, %raw, "Unrecognized publication date");
                }
                parsed
            }
            None => {
                warn!(url = %page.url, "No publication date found");
                None
            }
        };

        let author = self.author.first_value(root).map(|(_, author)| author);
        if author.is_none() {
            warn!(url = %page.url, "No author found");
        }

        let full_text = match self.body_text(root) {
            Some(text) => text,
            None => {
                warn!(url = %page.url, selectors = %self.body.describe(), "No body selector matched; using visible page text");
                visible_text(root).ok_or(ExtractError::NoContent)?
            }
        };

        Ok(Article {
            title,
            url: page.url.clone(),
            full_text,
            author,
            published_at,
            standfirst: None,
            score: 0.0,
            original_position: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::ExtractorConfig;
    use chrono::TimeZone;
    use url::Url;

    fn extractor(config: &ExtractorConfig) -> Extractor {
        Extractor::from_config(config, Url::parse("https://www.ft.com").unwrap()).unwrap()
    }

    fn four_body_templates() -> ExtractorConfig {
        ExtractorConfig {
            body: vec![
                "article.n-content-body".into(),
                "#article-body".into(),
                ".article__content".into(),
                ".article__body".into(),
            ],
            ..ExtractorConfig::default()
        }
    }

    fn page_with_body(wrapper_open: &str, wrapper_close: &str) -> Page {
        let html = format!(
            r#"<html><body>
                <h1 class="o-topper__headline">Navy escorts tankers through strait</h1>
                <time datetime="2025-05-06T07:30:00Z">6 May</time>
                <a data-trackable="author">Jane Doe</a>
                {wrapper_open}
                  <p>Warships moved into position overnight.</p>
                  <p>   </p>
                  <p>Oil prices rose 3%.</p>
                {wrapper_close}
              </body></html>"#
        );
        Page::new("https://www.ft.com/content/abc", html)
    }

    #[test]
    fn test_third_of_four_body_templates_gives_identical_article() {
        let extractor = extractor(&four_body_templates());
        let first = extractor
            .extract_full_article(&page_with_body(r#"<article class="n-content-body">"#, "</article>"))
            .unwrap();
        let third = extractor
            .extract_full_article(&page_with_body(r#"<div class="article__content">"#, "</div>"))
            .unwrap();

        assert_eq!(first, third);
        assert_eq!(
            third.full_text,
            "Warships moved into position overnight.\n\nOil prices rose 3%."
        );
        assert_eq!(third.author.as_deref(), Some("Jane Doe"));
        assert_eq!(
            third.published_at,
            Some(Utc.with_ymd_and_hms(2025, 5, 6, 7, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_paywall_marker_short_circuits_body() {
        let html = r#"<html><body>
            <div class="o-topper__premium">Subscribe to read</div>
            <h1>Navy escorts tankers</h1>
            <article class="n-content-body"><p>Full text would be here.</p></article>
          </body></html>"#;
        let err = extractor(&ExtractorConfig::default())
            .extract_full_article(&Page::new("https://www.ft.com/content/abc", html))
            .unwrap_err();
        assert_eq!(err, ExtractError::Paywalled);
    }

    #[test]
    fn test_missing_title_is_reported() {
        let html = r#"<html><body><div class="article__body"><p>Text</p></div></body></html>"#;
        let err = extractor(&ExtractorConfig::default())
            .extract_full_article(&Page::new("https://www.ft.com/content/abc", html))
            .unwrap_err();
        assert_eq!(err, ExtractError::NoTitle);
    }

    #[test]
    fn test_visible_text_fallback_skips_scripts() {
        let html = r#"<html><head><title>ignored</title></head><body>
            <h1>Grain corridor reopens</h1>
            <script>var tracking = 1;</script>
            <div class="unknown-layout">Ships left Odesa on Tuesday.</div>
          </body></html>"#;
        let article = extractor(&ExtractorConfig::default())
            .extract_full_article(&Page::new("https://www.ft.com/content/abc", html))
            .unwrap();
        assert_eq!(article.full_text, "Grain corridor reopens Ships left Odesa on Tuesday.");
        assert!(article.author.is_none());
        assert!(article.published_at.is_none());
    }

    #[test]
    fn test_no_content_when_body_is_empty() {
        let html = r#"<html><head><meta property="og:title" content="Only a title"></head><body>
            <script>1</script></body></html>"#;
        let err = extractor(&ExtractorConfig::default())
            .extract_full_article(&Page::new("https://www.ft.com/content/abc", html))
            .unwrap_err();
        assert_eq!(err, ExtractError::NoContent);
    }

    #[test]
    fn test_parse_published_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 13, 0, 0, 0).unwrap();
        assert_eq!(parse_published("2024-03-13T00:00:00+00:00"), Some(expected));
        assert_eq!(parse_published("Wed, 13 Mar 2024 00:00:00 +0000"), Some(expected));
        assert_eq!(parse_published("March 13 2024"), Some(expected));
        assert_eq!(parse_published("March 13, 2024"), Some(expected));
        assert_eq!(parse_published("yesterday"), None);
    }
}
