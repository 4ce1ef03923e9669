//! The crawl orchestrator.
//!
//! Drives the session manager, the frontier and the extractor across the
//! configured sections with one page driver:
//!
//! ```text
//! Idle → SessionEstablishing → ScanningSections(i) → ExtractingArticles → Persisting → Done | Failed
//! ```
//!
//! A run is best-effort. Section and article failures become
//! [`Diagnostic`]s and the run carries on; only a session that cannot be
//! established ends it early. The frontier is persisted at the end of every
//! run that got past login, cancelled or not.

use crate::browser::{Page, PageDriver, WaitPolicy, wait_for, wait_for_any};
use crate::error::{BrowseError, CrawlError};
use crate::extractor::Extractor;
use crate::frontier::Frontier;
use crate::models::{Article, ArticlePreview, Diagnostic, DiagnosticScope, Session};
use crate::retry::RetryPolicy;
use crate::session::SessionManager;
use chrono::{TimeDelta, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Crawl limits, retry counts and waits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CrawlSettings {
    pub full_rescan_after_minutes: u64,
    /// Upper bound on "load more" requests per section.
    pub max_scroll_attempts: usize,
    /// Stop loading more after this many loads in a row add no preview.
    pub unchanged_scroll_limit: usize,
    pub article_attempts: usize,
    pub login_attempts: usize,
    pub retry_backoff_ms: u64,
    pub retry_jitter_ms: u64,
    pub page_timeout_ms: u64,
    pub section_wait_ms: u64,
    pub article_wait_ms: u64,
    pub poll_interval_ms: u64,
    pub max_articles_per_run: Option<usize>,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            full_rescan_after_minutes: 180,
            max_scroll_attempts: 8,
            unchanged_scroll_limit: 2,
            article_attempts: 3,
            login_attempts: 3,
            retry_backoff_ms: 2_000,
            retry_jitter_ms: 250,
            page_timeout_ms: 30_000,
            section_wait_ms: 10_000,
            article_wait_ms: 10_000,
            poll_interval_ms: 500,
            max_articles_per_run: None,
        }
    }
}

impl CrawlSettings {
    pub fn rescan_window(&self) -> TimeDelta {
        TimeDelta::minutes(self.full_rescan_after_minutes as i64)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_millis(self.page_timeout_ms)
    }

    fn retry(&self, attempts: usize) -> RetryPolicy {
        RetryPolicy::new(
            attempts,
            Duration::from_millis(self.retry_backoff_ms),
            Duration::from_millis(self.retry_jitter_ms),
        )
    }

    fn wait(&self, timeout_ms: u64) -> WaitPolicy {
        WaitPolicy::new(
            Duration::from_millis(timeout_ms),
            Duration::from_millis(self.poll_interval_ms),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    SessionEstablishing,
    ScanningSections(usize),
    ExtractingArticles,
    Persisting,
    Done,
    Failed,
}

/// Everything a run produced.
#[derive(Debug)]
pub struct CrawlOutcome {
    /// Extracted articles in discovery order, unscored.
    pub articles: Vec<Article>,
    pub diagnostics: Vec<Diagnostic>,
    pub full_scan: bool,
    /// `Done` or `Failed`.
    pub phase: RunPhase,
}

#[derive(Debug)]
pub struct Crawler {
    sections: Vec<String>,
    extractor: Extractor,
    sessions: SessionManager,
    settings: CrawlSettings,
}

impl Crawler {
    pub fn new(
        sections: Vec<String>,
        extractor: Extractor,
        sessions: SessionManager,
        settings: CrawlSettings,
    ) -> Self {
        Self {
            sections,
            extractor,
            sessions,
            settings,
        }
    }

    fn enter(phase: &mut RunPhase, next: RunPhase) {
        info!(from = ?*phase, to = ?next, "Crawl phase");
        *phase = next;
    }

    /// Run one crawl.
    ///
    /// # Arguments
    ///
    /// * `driver` - The single browsing context for the whole run
    /// * `frontier` - Cross-run state; mutated and persisted here
    /// * `force_full` - Ignore the early-stop boundary regardless of the rescan window
    /// * `cancel` - Checked between sections and between articles
    #[instrument(level = "info", skip_all, fields(sections = self.sections.len(), force_full = force_full))]
    pub async fn run<D: PageDriver>(
        &self,
        driver: &mut D,
        frontier: &mut Frontier,
        force_full: bool,
        cancel: &AtomicBool,
    ) -> CrawlOutcome {
        let mut phase = RunPhase::Idle;
        let mut diagnostics = Vec::new();

        Self::enter(&mut phase, RunPhase::SessionEstablishing);
        let login = self.settings.retry(self.settings.login_attempts);
        let mut session = match login.run("login", async |_| self.sessions.ensure_session(driver).await).await {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, "Could not establish a session; abandoning run");
                diagnostics.push(Diagnostic::fatal(DiagnosticScope::Session, e));
                Self::enter(&mut phase, RunPhase::Failed);
                return CrawlOutcome {
                    articles: Vec::new(),
                    diagnostics,
                    full_scan: false,
                    phase,
                };
            }
        };

        let full_scan = frontier.should_full_rescan(Utc::now()) || force_full;
        info!(full_scan, "Starting section scan");

        let mut cancelled = false;
        let mut section_failures = 0usize;
        let mut surfaced: Vec<ArticlePreview> = Vec::new();

        for (i, section) in self.sections.iter().enumerate() {
            if cancel.load(Ordering::SeqCst) {
                cancelled = true;
                break;
            }
            Self::enter(&mut phase, RunPhase::ScanningSections(i));
            if let Err(fatal) = self.keep_fresh(driver, &mut session, &mut diagnostics).await {
                diagnostics.push(fatal);
                return self.finish(frontier, Vec::new(), diagnostics, full_scan, false, RunPhase::Failed);
            }
            match self.scan_section(driver, frontier, section, full_scan).await {
                Ok(previews) => {
                    info!(section = %section, count = previews.len(), "Scanned section");
                    surfaced.extend(previews);
                }
                Err(e) => {
                    warn!(section = %section, error = %e, "Section scan failed");
                    section_failures += 1;
                    diagnostics.push(Diagnostic::new(DiagnosticScope::Section(section.clone()), e));
                }
            }
        }

        let surfaced: Vec<ArticlePreview> = surfaced.into_iter().unique_by(|p| p.url.clone()).collect();
        for preview in &surfaced {
            frontier.mark_seen(&preview.url);
        }
        let pending: Vec<&ArticlePreview> = surfaced
            .iter()
            .filter(|p| !frontier.is_visited(&p.url))
            .take(self.settings.max_articles_per_run.unwrap_or(usize::MAX))
            .collect();
        info!(surfaced = surfaced.len(), pending = pending.len(), "Collected previews");

        let mut articles = Vec::new();
        if !cancelled && !pending.is_empty() {
            Self::enter(&mut phase, RunPhase::ExtractingArticles);
            if let Err(fatal) = self.keep_fresh(driver, &mut session, &mut diagnostics).await {
                diagnostics.push(fatal);
                return self.finish(frontier, articles, diagnostics, full_scan, false, RunPhase::Failed);
            }
            let policy = self.settings.retry(self.settings.article_attempts);
            for preview in pending {
                if cancel.load(Ordering::SeqCst) {
                    cancelled = true;
                    break;
                }
                match policy
                    .run("article", async |_| self.fetch_article(driver, &preview.url).await)
                    .await
                {
                    Ok(mut article) => {
                        article.standfirst = preview.standfirst.clone();
                        article.original_position = articles.len() + 1;
                        frontier.mark_visited(&article.url);
                        info!(url = %article.url, title = %article.title, "Extracted article");
                        articles.push(article);
                    }
                    Err(e) => {
                        diagnostics.push(Diagnostic::new(DiagnosticScope::Article(preview.url.clone()), e));
                    }
                }
            }
        }

        if cancelled {
            warn!(extracted = articles.len(), "Run cancelled");
            diagnostics.push(Diagnostic::new(DiagnosticScope::Run, CrawlError::Cancelled));
        }

        let record_full = full_scan && !cancelled && section_failures == 0;
        Self::enter(&mut phase, RunPhase::Persisting);
        self.finish(frontier, articles, diagnostics, full_scan, record_full, RunPhase::Done)
    }

    /// Persist the frontier and assemble the outcome.
    fn finish(
        &self,
        frontier: &mut Frontier,
        articles: Vec<Article>,
        mut diagnostics: Vec<Diagnostic>,
        full_scan: bool,
        record_full: bool,
        end: RunPhase,
    ) -> CrawlOutcome {
        if record_full {
            frontier.record_full_crawl(Utc::now());
        }
        if let Err(e) = frontier.persist() {
            error!(error = %e, "Failed to persist frontier");
            diagnostics.push(Diagnostic::new(DiagnosticScope::Frontier, e));
        }
        let mut phase = RunPhase::Persisting;
        Self::enter(&mut phase, end);
        CrawlOutcome {
            articles,
            diagnostics,
            full_scan,
            phase,
        }
    }

    /// Re-validate a stale session. A non-fatal failure is recorded and the
    /// run continues with the old session's cookies put back in the driver;
    /// a fatal one is returned.
    async fn keep_fresh<D: PageDriver>(
        &self,
        driver: &mut D,
        session: &mut Session,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<(), Diagnostic> {
        let max_age = self.sessions.settings().refresh_after();
        match self.sessions.refresh_if_stale(driver, session.clone(), max_age).await {
            Ok(fresh) => {
                *session = fresh;
                Ok(())
            }
            Err(e) if e.is_fatal() => Err(Diagnostic::fatal(DiagnosticScope::Session, e)),
            Err(e) => {
                warn!(error = %e, "Session refresh failed; continuing with the current session");
                driver.set_cookies(&session.cookies);
                diagnostics.push(Diagnostic::new(DiagnosticScope::Session, e));
                Ok(())
            }
        }
    }

    async fn load_listing<D: PageDriver>(&self, driver: &mut D, section: &str) -> Result<Page, CrawlError> {
        let page = driver.goto(section).await?;
        let wait = self.settings.wait(self.settings.section_wait_ms);
        let seen = wait_for(driver, page, self.extractor.listing_ready(), wait).await?;
        Ok(seen.page)
    }

    /// Previews from one section, newest first.
    ///
    /// Incremental scans stop at the first already-seen preview; full scans
    /// read as far as the listing goes.
    #[instrument(level = "info", skip(self, driver, frontier))]
    async fn scan_section<D: PageDriver>(
        &self,
        driver: &mut D,
        frontier: &Frontier,
        section: &str,
        full_scan: bool,
    ) -> Result<Vec<ArticlePreview>, CrawlError> {
        let policy = self.settings.retry(self.settings.article_attempts);
        let page = policy
            .run("section", async |_| self.load_listing(driver, section).await)
            .await?;

        let mut previews = self.extractor.extract_previews(&page);
        let mut loads = 0usize;
        let mut unchanged = 0usize;

        loop {
            if !full_scan {
                let (fresh, boundary) = frontier.scan_until_known(&previews);
                if boundary {
                    info!(fresh = fresh.len(), "Reached previously seen previews");
                    return Ok(fresh.to_vec());
                }
            }
            if loads >= self.settings.max_scroll_attempts || unchanged >= self.settings.unchanged_scroll_limit {
                break;
            }
            loads += 1;
            let page = match driver.load_more().await {
                Ok(page) => page,
                Err(e) => {
                    warn!(error = %e, loads, "Loading more previews failed; keeping what was found");
                    break;
                }
            };
            let added: Vec<ArticlePreview> = self
                .extractor
                .extract_previews(&page)
                .into_iter()
                .filter(|p| previews.iter().all(|q| q.url != p.url))
                .collect();
            debug!(loads, added = added.len(), "Loaded more previews");
            if added.is_empty() {
                unchanged += 1;
            } else {
                unchanged = 0;
                previews.extend(added);
            }
        }
        Ok(previews)
    }

    /// Load one article page and extract it.
    ///
    /// The page counts as ready once the readiness chain, the title chain or
    /// a paywall marker matches. A page that never shows one is still handed
    /// to the extractor, whose own fallbacks decide whether it is readable.
    async fn fetch_article<D: PageDriver>(&self, driver: &mut D, url: &str) -> Result<Article, CrawlError> {
        let page = driver.goto(url).await?;
        let wait = self.settings.wait(self.settings.article_wait_ms);
        let signals = [
            self.extractor.article_ready(),
            self.extractor.title_chain(),
            self.extractor.paywall_markers(),
        ];
        let page = match wait_for_any(driver, page.clone(), &signals, wait).await {
            Ok(seen) => seen.page,
            Err(BrowseError::WaitTimeout { selectors, waited }) => {
                debug!(url, %selectors, ?waited, "No readiness marker; extracting the page as loaded");
                page
            }
            Err(e) => return Err(e.into()),
        };
        Ok(self.extractor.extract_full_article(&page)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::testing::ScriptedDriver;
    use crate::config::SourceConfig;
    use crate::error::{AuthError, ExtractError, NetworkError};
    use crate::extractor::ExtractorConfig;
    use crate::models::{Cookie, Session};
    use crate::session::{Credentials, LoginSelectors, SessionSettings};
    use crate::utils::write_record;
    use std::path::Path;
    use url::Url;

    const ACCOUNT: &str = "https://www.ft.com/myaccount";
    const WORLD: &str = "https://www.ft.com/world";
    const MARKETS: &str = "https://www.ft.com/markets";
    const SIGNED_IN: &str = r#"<a data-trackable="my-account" href="/myaccount">Account</a>"#;

    fn content(id: &str) -> String {
        format!("https://www.ft.com/content/{id}")
    }

    fn listing(ids: &[&str]) -> String {
        ids.iter()
            .map(|id| {
                format!(
                    r#"<div class="js-teaser"><a class="js-teaser-heading-link" href="/content/{id}">Story {id}</a>
                       <p class="js-teaser-standfirst">About {id}</p></div>"#
                )
            })
            .collect()
    }

    fn article_page(id: &str) -> String {
        format!(
            r#"<h1 class="o-topper__headline">Story {id}</h1>
               <article class="n-content-body"><p>Body of {id}.</p></article>"#
        )
    }

    fn settings() -> CrawlSettings {
        CrawlSettings {
            retry_backoff_ms: 0,
            retry_jitter_ms: 0,
            section_wait_ms: 30,
            article_wait_ms: 30,
            poll_interval_ms: 5,
            ..CrawlSettings::default()
        }
    }

    fn sessions(record: &Path, valid: bool) -> SessionManager {
        if valid {
            let cookie = Cookie {
                name: "FTSession".into(),
                value: "v".into(),
                domain: "ft.com".into(),
                path: "/".into(),
                expires: None,
                secure: true,
            };
            write_record(record, &Session::established(vec![cookie], Utc::now() - TimeDelta::hours(1))).unwrap();
        }
        SessionManager::new(
            record,
            &SourceConfig::default(),
            &LoginSelectors::default(),
            SessionSettings {
                step_timeout_ms: 20,
                probe_timeout_ms: 20,
                poll_interval_ms: 5,
                ..SessionSettings::default()
            },
            Credentials {
                email: "reader@uni.example".into(),
                institution_id: "UNI-42".into(),
                password: "hunter2".into(),
            },
        )
        .unwrap()
    }

    fn crawler(dir: &Path, sections: &[&str], valid_session: bool, settings: CrawlSettings) -> Crawler {
        Crawler::new(
            sections.iter().map(|s| s.to_string()).collect(),
            Extractor::from_config(&ExtractorConfig::default(), Url::parse("https://www.ft.com").unwrap()).unwrap(),
            sessions(&dir.join("session.json"), valid_session),
            settings,
        )
    }

    fn with_articles(mut driver: ScriptedDriver, ids: &[&str]) -> ScriptedDriver {
        for id in ids {
            driver = driver.page(&content(id), &article_page(id));
        }
        driver
    }

    fn urls(articles: &[Article]) -> Vec<String> {
        articles.iter().map(|a| a.url.clone()).collect()
    }

    #[tokio::test]
    async fn test_incremental_run_stops_at_seen_preview() {
        let dir = tempfile::tempdir().unwrap();
        let mut frontier = Frontier::empty(dir.path().join("frontier.json"), TimeDelta::hours(3));
        frontier.mark_seen(&content("k1"));
        frontier.record_full_crawl(Utc::now());
        let mut driver = with_articles(
            ScriptedDriver::new()
                .page(ACCOUNT, SIGNED_IN)
                .page(WORLD, &listing(&["n1", "n2", "k1", "n3"])),
            &["n1", "n2", "n3"],
        );

        let outcome = crawler(dir.path(), &[WORLD], true, settings())
            .run(&mut driver, &mut frontier, false, &AtomicBool::new(false))
            .await;

        assert_eq!(outcome.phase, RunPhase::Done);
        assert!(!outcome.full_scan);
        assert_eq!(urls(&outcome.articles), vec![content("n1"), content("n2")]);
        assert_eq!(outcome.articles[0].original_position, 1);
        assert_eq!(outcome.articles[1].original_position, 2);
        assert_eq!(outcome.articles[0].standfirst.as_deref(), Some("About n1"));
        assert!(outcome.diagnostics.is_empty());
        assert_eq!(driver.visit_count(&content("n3")), 0);
        assert!(frontier.is_visited(&content("n2")));
        assert!(!frontier.is_new(&content("n1")));

        let reloaded = Frontier::load(dir.path().join("frontier.json"), TimeDelta::hours(3)).unwrap();
        assert_eq!(reloaded.state(), frontier.state());
    }

    #[tokio::test]
    async fn test_full_scan_reads_past_boundary_but_skips_visited() {
        let dir = tempfile::tempdir().unwrap();
        let mut frontier = Frontier::empty(dir.path().join("frontier.json"), TimeDelta::hours(3));
        frontier.mark_seen(&content("k1"));
        frontier.mark_visited(&content("k1"));
        let mut driver = with_articles(
            ScriptedDriver::new()
                .page(ACCOUNT, SIGNED_IN)
                .page(WORLD, &listing(&["n1", "k1", "n2"])),
            &["n1", "k1", "n2"],
        );

        let outcome = crawler(dir.path(), &[WORLD], true, settings())
            .run(&mut driver, &mut frontier, true, &AtomicBool::new(false))
            .await;

        assert!(outcome.full_scan);
        assert_eq!(urls(&outcome.articles), vec![content("n1"), content("n2")]);
        assert_eq!(driver.visit_count(&content("k1")), 0);
        assert!(frontier.state().last_full_crawl_at.is_some());
    }

    #[tokio::test]
    async fn test_best_effort_across_sections_and_articles() {
        let dir = tempfile::tempdir().unwrap();
        let mut frontier = Frontier::empty(dir.path().join("frontier.json"), TimeDelta::hours(3));
        let paywalled = r#"<div class="o-topper__paywall">Subscribe</div><h1>Story a2</h1>"#;
        let mut driver = with_articles(
            ScriptedDriver::new()
                .page(ACCOUNT, SIGNED_IN)
                .page(WORLD, &listing(&["a1", "a2"]))
                .page(MARKETS, &listing(&["a2", "b1"]))
                .page(&content("a2"), paywalled)
                .fail(
                    &content("b1"),
                    vec![NetworkError::Status {
                        url: content("b1"),
                        status: 503,
                    }],
                ),
            &["a1", "b1"],
        );

        let outcome = crawler(dir.path(), &[WORLD, "https://www.ft.com/opinion", MARKETS], true, settings())
            .run(&mut driver, &mut frontier, false, &AtomicBool::new(false))
            .await;

        assert_eq!(outcome.phase, RunPhase::Done);
        assert_eq!(urls(&outcome.articles), vec![content("a1"), content("b1")]);
        assert_eq!(driver.visit_count(&content("a2")), 1, "paywalls are not retried");
        assert_eq!(driver.visit_count(&content("b1")), 2, "transient failures are retried");

        assert_eq!(outcome.diagnostics.len(), 2);
        assert!(outcome.diagnostics.iter().all(|d| !d.fatal));
        assert!(matches!(
            &outcome.diagnostics[0].scope,
            DiagnosticScope::Section(url) if url == "https://www.ft.com/opinion"
        ));
        assert!(matches!(
            (&outcome.diagnostics[1].scope, &outcome.diagnostics[1].error),
            (DiagnosticScope::Article(url), CrawlError::Extract(ExtractError::Paywalled)) if *url == content("a2")
        ));
        assert!(
            frontier.state().last_full_crawl_at.is_none(),
            "a scan with a failed section is not a complete full crawl"
        );
        assert!(!frontier.is_new(&content("a2")));
        assert!(!frontier.is_visited(&content("a2")));
    }

    #[tokio::test]
    async fn test_rejected_login_is_a_fatal_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let mut frontier = Frontier::empty(dir.path().join("frontier.json"), TimeDelta::hours(3));
        let mut driver = ScriptedDriver::new()
            .page(
                "https://www.ft.com/login",
                r#"<form action="/login/email" method="post"><input id="enter-email" name="email"></form>"#,
            )
            .page(
                "https://www.ft.com/login/email",
                r#"<form action="/login/institution" method="post"><input id="institutionId" name="institutionId"></form>"#,
            )
            .page(
                "https://www.ft.com/login/institution",
                r#"<form action="/authn" method="post"><input id="password" type="password" name="pw"></form>"#,
            )
            .page("https://www.ft.com/authn", r#"<p class="error-message">Wrong password</p>"#);

        let outcome = crawler(dir.path(), &[WORLD], false, settings())
            .run(&mut driver, &mut frontier, false, &AtomicBool::new(false))
            .await;

        assert_eq!(outcome.phase, RunPhase::Failed);
        assert!(outcome.articles.is_empty());
        assert_eq!(outcome.diagnostics.len(), 1);
        assert!(outcome.diagnostics[0].fatal);
        assert!(matches!(
            outcome.diagnostics[0].error,
            CrawlError::Auth(AuthError::CredentialsRejected)
        ));
        assert_eq!(driver.visit_count("https://www.ft.com/login"), 1, "rejections are not retried");
        assert_eq!(driver.visit_count(WORLD), 0);
    }

    #[tokio::test]
    async fn test_cancelled_run_still_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frontier.json");
        let mut frontier = Frontier::empty(&path, TimeDelta::hours(3));
        let mut driver = ScriptedDriver::new()
            .page(ACCOUNT, SIGNED_IN)
            .page(WORLD, &listing(&["n1"]));

        let outcome = crawler(dir.path(), &[WORLD], true, settings())
            .run(&mut driver, &mut frontier, false, &AtomicBool::new(true))
            .await;

        assert!(outcome.articles.is_empty());
        assert!(matches!(outcome.diagnostics[0].error, CrawlError::Cancelled));
        assert_eq!(driver.visit_count(WORLD), 0);
        assert!(path.exists());
        assert!(frontier.state().last_full_crawl_at.is_none());
    }

    #[tokio::test]
    async fn test_scrolls_until_listing_stops_growing() {
        let dir = tempfile::tempdir().unwrap();
        let mut frontier = Frontier::empty(dir.path().join("frontier.json"), TimeDelta::hours(3));
        frontier.mark_seen(&content("old"));
        frontier.record_full_crawl(Utc::now());
        let more = [listing(&["n2"]), listing(&["n3", "old", "n4"])];
        let mut driver = with_articles(
            ScriptedDriver::new()
                .page(ACCOUNT, SIGNED_IN)
                .page(WORLD, &listing(&["n1"]))
                .more(WORLD, &[more[0].as_str(), more[1].as_str()]),
            &["n1", "n2", "n3", "n4"],
        );

        let outcome = crawler(dir.path(), &[WORLD], true, settings())
            .run(&mut driver, &mut frontier, false, &AtomicBool::new(false))
            .await;

        assert_eq!(
            urls(&outcome.articles),
            vec![content("n1"), content("n2"), content("n3")]
        );
    }

    #[tokio::test]
    async fn test_article_cap() {
        let dir = tempfile::tempdir().unwrap();
        let mut frontier = Frontier::empty(dir.path().join("frontier.json"), TimeDelta::hours(3));
        let mut driver = with_articles(
            ScriptedDriver::new()
                .page(ACCOUNT, SIGNED_IN)
                .page(WORLD, &listing(&["n1", "n2", "n3"])),
            &["n1", "n2", "n3"],
        );
        let capped = CrawlSettings {
            max_articles_per_run: Some(2),
            ..settings()
        };

        let outcome = crawler(dir.path(), &[WORLD], true, capped)
            .run(&mut driver, &mut frontier, true, &AtomicBool::new(false))
            .await;

        assert_eq!(outcome.articles.len(), 2);
        assert_eq!(driver.visit_count(&content("n3")), 0);
    }

    #[tokio::test]
    async fn test_forced_full_scan_still_resets_corrupt_frontier() {
        let dir = tempfile::tempdir().unwrap();
        let mut frontier = Frontier::empty(dir.path().join("frontier.json"), TimeDelta::hours(3));
        frontier.mark_visited(&content("n1"));
        frontier.record_full_crawl(Utc::now());
        let mut driver = with_articles(
            ScriptedDriver::new()
                .page(ACCOUNT, SIGNED_IN)
                .page(WORLD, &listing(&["n1"])),
            &["n1"],
        );

        let outcome = crawler(dir.path(), &[WORLD], true, settings())
            .run(&mut driver, &mut frontier, true, &AtomicBool::new(false))
            .await;

        assert!(outcome.full_scan);
        assert_eq!(urls(&outcome.articles), vec![content("n1")]);
        assert_eq!(driver.visit_count(&content("n1")), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_restores_session_cookies() {
        let dir = tempfile::tempdir().unwrap();
        let crawler = crawler(dir.path(), &[WORLD], false, settings());
        let cookie = Cookie {
            name: "FTSession".into(),
            value: "old".into(),
            domain: "ft.com".into(),
            path: "/".into(),
            expires: None,
            secure: true,
        };
        let mut session = Session::established(vec![cookie.clone()], Utc::now() - TimeDelta::hours(13));
        // Neither the account page nor the login page loads.
        let mut driver = ScriptedDriver::new();
        driver.jar = vec![cookie.clone()];
        let mut diagnostics = Vec::new();

        crawler
            .keep_fresh(&mut driver, &mut session, &mut diagnostics)
            .await
            .unwrap();

        assert_eq!(diagnostics.len(), 1);
        assert!(!diagnostics[0].fatal);
        assert!(matches!(diagnostics[0].scope, DiagnosticScope::Session));
        assert_eq!(driver.jar, vec![cookie]);
        assert_eq!(driver.visit_count("https://www.ft.com/login"), 1);
    }

    #[tokio::test]
    async fn test_meta_title_and_bare_text_page_is_extracted() {
        let dir = tempfile::tempdir().unwrap();
        let mut frontier = Frontier::empty(dir.path().join("frontier.json"), TimeDelta::hours(3));
        let bare = r#"<html><head><meta property="og:title" content="Grain corridor reopens"></head>
            <body><div>Ships left Odesa under naval escort.</div></body></html>"#;
        let mut driver = ScriptedDriver::new()
            .page(ACCOUNT, SIGNED_IN)
            .page(WORLD, &listing(&["z1"]))
            .page(&content("z1"), bare);

        let outcome = crawler(dir.path(), &[WORLD], true, settings())
            .run(&mut driver, &mut frontier, false, &AtomicBool::new(false))
            .await;

        assert!(outcome.diagnostics.is_empty());
        assert_eq!(outcome.articles.len(), 1);
        assert_eq!(outcome.articles[0].title, "Grain corridor reopens");
        assert_eq!(outcome.articles[0].full_text, "Ships left Odesa under naval escort.");
        assert_eq!(driver.visit_count(&content("z1")), 1);
    }

    #[tokio::test]
    async fn test_page_without_any_marker_goes_to_extractor() {
        let dir = tempfile::tempdir().unwrap();
        let mut frontier = Frontier::empty(dir.path().join("frontier.json"), TimeDelta::hours(3));
        let mut driver = ScriptedDriver::new()
            .page(ACCOUNT, SIGNED_IN)
            .page(WORLD, &listing(&["z2"]))
            .page(&content("z2"), "<html><body><div>Loading</div></body></html>");

        let outcome = crawler(dir.path(), &[WORLD], true, settings())
            .run(&mut driver, &mut frontier, false, &AtomicBool::new(false))
            .await;

        assert!(outcome.articles.is_empty());
        assert_eq!(outcome.diagnostics.len(), 1);
        assert!(matches!(
            outcome.diagnostics[0].error,
            CrawlError::Extract(ExtractError::NoTitle)
        ));
        assert!(
            driver.visit_count(&content("z2")) > 1,
            "the page is re-polled while waiting"
        );
    }
}
