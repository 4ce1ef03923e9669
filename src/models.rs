//! Data models shared by the crawl engine, the prioritizer and the outputs.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Cookie`] and [`Session`]: the authenticated browsing state
//! - [`ArticlePreview`]: a headline discovered while scanning a section
//! - [`Article`]: a fully extracted article, later scored
//! - [`Diagnostic`]: a `(scope, error)` pair recorded instead of aborting a run
//! - [`Briefing`]: the ranked output of one run

use crate::error::CrawlError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// A single HTTP cookie as held by the page driver.
///
/// The session record stores these verbatim, so every attribute that matters
/// for replaying the cookie (name, value, domain, path, expiry) survives a
/// process restart.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// Host the cookie belongs to, without a leading dot.
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    /// `None` for session cookies.
    pub expires: Option<DateTime<Utc>>,
    #[serde(default)]
    pub secure: bool,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

impl Cookie {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|at| at <= now)
    }

    /// Whether this cookie should be sent to `host`.
    pub fn matches_host(&self, host: &str) -> bool {
        let domain = self.domain.trim_start_matches('.');
        host == domain || host.ends_with(&format!(".{domain}"))
    }
}

/// The authenticated browsing state owned by the session manager.
///
/// `authenticated` is not persisted. A session read back from disk has to
/// pass a live probe in the current run before it counts as logged in.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Session {
    pub cookies: Vec<Cookie>,
    pub established_at: DateTime<Utc>,
    pub last_refreshed_at: DateTime<Utc>,
    #[serde(skip)]
    pub authenticated: bool,
}

impl Session {
    /// A freshly authenticated session holding `cookies`.
    pub fn established(cookies: Vec<Cookie>, now: DateTime<Utc>) -> Self {
        Self {
            cookies,
            established_at: now,
            last_refreshed_at: now,
            authenticated: true,
        }
    }
}

/// A lightweight article summary found on a section listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ArticlePreview {
    pub headline: String,
    /// Absolute URL; the unique key of the preview.
    pub url: String,
    pub standfirst: Option<String>,
    pub discovered_at: DateTime<Utc>,
}

/// A fully extracted article.
///
/// `score` is zero until the prioritizer has run. `original_position` is the
/// 1-based rank of the article in discovery order within its crawl.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Article {
    pub title: String,
    pub url: String,
    pub full_text: String,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    /// Carried over from the preview, if the listing had one.
    pub standfirst: Option<String>,
    pub score: f64,
    pub original_position: usize,
}

/// Where in a run a diagnostic was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum DiagnosticScope {
    Run,
    Session,
    Section(String),
    Article(String),
    Frontier,
}

/// A failure recorded during a run instead of aborting it.
#[derive(Debug, Serialize)]
pub struct Diagnostic {
    pub scope: DiagnosticScope,
    #[serde(serialize_with = "serialize_display")]
    pub error: CrawlError,
    /// A fatal diagnostic means the run produced nothing trustworthy.
    pub fatal: bool,
}

impl Diagnostic {
    pub fn new(scope: DiagnosticScope, error: impl Into<CrawlError>) -> Self {
        Self {
            scope,
            error: error.into(),
            fatal: false,
        }
    }

    pub fn fatal(scope: DiagnosticScope, error: impl Into<CrawlError>) -> Self {
        Self {
            scope,
            error: error.into(),
            fatal: true,
        }
    }
}

fn serialize_display<S: Serializer>(error: &CrawlError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// The ranked result of one run, written as the JSON hand-off file.
///
/// An empty `articles` list is ambiguous on its own; `diagnostics` tells
/// "nothing new" apart from "the run failed".
#[derive(Debug, Serialize)]
pub struct Briefing {
    /// The date of the run in `YYYY-MM-DD` format.
    pub local_date: String,
    /// "morning", "afternoon", or "evening".
    pub time_of_day: String,
    pub local_time: String,
    /// Whether the run rescanned every section past the seen boundary.
    pub full_scan: bool,
    /// Articles in descending score order.
    pub articles: Vec<Article>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Briefing {
    pub fn has_fatal(&self) -> bool {
        self.diagnostics.iter().any(|d| d.fatal)
    }
}
