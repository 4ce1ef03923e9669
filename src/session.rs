//! Authenticated session lifecycle.
//!
//! The source sits behind an institutional single sign-on. Logging in is a
//! fixed sequence of page interactions against the source's sign-in pages and
//! an external identity broker:
//!
//! ```text
//! SubmitIdentifier → SelectInstitutionalRoute → SubmitInstitutionId → SubmitCredentials → VerifySuccess
//! ```
//!
//! Every step waits a bounded time for the element it needs. A timeout ends
//! the attempt with [`AuthError::Timeout`]; the state machine never retries
//! on its own, that is the orchestrator's call.
//!
//! # Persistence
//!
//! A successful login (or refresh) writes cookies and timestamps to the
//! session record. A failed attempt writes nothing, so a previously working
//! record is never replaced by partial state.

use crate::browser::{Page, PageDriver, WaitPolicy, wait_for, wait_for_any};
use crate::config::SourceConfig;
use crate::error::{AuthError, BrowseError, ConfigError, LoginStep};
use crate::extractor::SelectorChain;
use crate::models::Session;
use crate::utils::{read_record, write_record};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Session windows and per-step timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionSettings {
    /// A persisted session older than this is not even probed.
    pub validity_hours: u64,
    /// Sessions not re-validated for this long are probed again.
    pub refresh_after_hours: u64,
    pub step_timeout_ms: u64,
    pub probe_timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            validity_hours: 24,
            refresh_after_hours: 12,
            step_timeout_ms: 10_000,
            probe_timeout_ms: 5_000,
            poll_interval_ms: 500,
        }
    }
}

impl SessionSettings {
    pub fn validity(&self) -> TimeDelta {
        TimeDelta::hours(self.validity_hours as i64)
    }

    pub fn refresh_after(&self) -> TimeDelta {
        TimeDelta::hours(self.refresh_after_hours as i64)
    }

    fn step_wait(&self) -> WaitPolicy {
        WaitPolicy::new(
            Duration::from_millis(self.step_timeout_ms),
            Duration::from_millis(self.poll_interval_ms),
        )
    }

    fn probe_wait(&self) -> WaitPolicy {
        WaitPolicy::new(
            Duration::from_millis(self.probe_timeout_ms),
            Duration::from_millis(self.poll_interval_ms),
        )
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Selector chains for each element the login flow touches.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoginSelectors {
    pub identifier: Vec<String>,
    pub institutional_route: Vec<String>,
    pub institution_id: Vec<String>,
    /// The identity broker's username field; receives the e-mail identifier.
    pub username: Vec<String>,
    pub password: Vec<String>,
    pub rejected: Vec<String>,
    /// Present only for a signed-in reader.
    pub account_indicator: Vec<String>,
}

impl Default for LoginSelectors {
    fn default() -> Self {
        Self {
            identifier: strings(&["#enter-email", "input[name='email']", "input[type='email']"]),
            institutional_route: strings(&[
                "[data-trackable='institutional-login']",
                "#sso-redirect-button",
                "a[href*='sso']",
            ]),
            institution_id: strings(&[
                "#enter-institution-id",
                "#institutionId",
                "input[name='institutionId']",
            ]),
            username: strings(&[
                "#username",
                "input[name='j_username']",
                "input[type='email']",
                "input[type='text']",
            ]),
            password: strings(&["#enter-password", "#password", "input[type='password']"]),
            rejected: strings(&[
                ".o-forms-input__error",
                ".error-message",
                "#login-error",
                ".form-error",
            ]),
            account_indicator: strings(&[
                "[data-trackable='my-account']",
                "a[href='/myaccount']",
                "a[href='/myft']",
            ]),
        }
    }
}

#[derive(Debug, Clone)]
struct LoginChains {
    identifier: SelectorChain,
    institutional_route: SelectorChain,
    institution_id: SelectorChain,
    username: SelectorChain,
    password: SelectorChain,
    rejected: SelectorChain,
    account_indicator: SelectorChain,
}

impl LoginChains {
    fn parse(s: &LoginSelectors) -> Result<Self, ConfigError> {
        Ok(Self {
            identifier: SelectorChain::parse("login.identifier", &s.identifier)?,
            institutional_route: SelectorChain::parse("login.institutional_route", &s.institutional_route)?,
            institution_id: SelectorChain::parse("login.institution_id", &s.institution_id)?,
            username: SelectorChain::parse("login.username", &s.username)?,
            password: SelectorChain::parse("login.password", &s.password)?,
            rejected: SelectorChain::parse("login.rejected", &s.rejected)?,
            account_indicator: SelectorChain::parse("login.account_indicator", &s.account_indicator)?,
        })
    }
}

/// What the reader signs in with.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub institution_id: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("institution_id", &self.institution_id)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Owns login, probing and the on-disk session record.
#[derive(Debug)]
pub struct SessionManager {
    record: PathBuf,
    login_url: String,
    account_url: String,
    chains: LoginChains,
    settings: SessionSettings,
    credentials: Credentials,
}

impl SessionManager {
    pub fn new(
        record: impl AsRef<Path>,
        source: &SourceConfig,
        selectors: &LoginSelectors,
        settings: SessionSettings,
        credentials: Credentials,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            record: record.as_ref().to_path_buf(),
            login_url: source.login_url.clone(),
            account_url: source.account_url.clone(),
            chains: LoginChains::parse(selectors)?,
            settings,
            credentials,
        })
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// The persisted session, if one can be read. Unreadable records are
    /// logged and treated as absent.
    fn load_record(&self) -> Option<Session> {
        match read_record::<Session>(&self.record) {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable session record");
                None
            }
        }
    }

    fn save_record(&self, session: &Session) {
        match write_record(&self.record, session) {
            Ok(()) => info!(path = %self.record.display(), cookies = session.cookies.len(), "Saved session"),
            Err(e) => error!(error = %e, "Failed to save session record"),
        }
    }

    /// Whether the driver's current cookies reach the "my account" indicator.
    #[instrument(level = "info", skip_all)]
    async fn probe<D: PageDriver>(&self, driver: &mut D) -> bool {
        let page = match driver.goto(&self.account_url).await {
            Ok(page) => page,
            Err(e) => {
                warn!(error = %e, "Session probe could not load the account page");
                return false;
            }
        };
        match wait_for(driver, page, &self.chains.account_indicator, self.settings.probe_wait()).await {
            Ok(_) => true,
            Err(e) => {
                info!(error = %e, "Session probe did not find the account indicator");
                false
            }
        }
    }

    pub async fn ensure_session<D: PageDriver>(&self, driver: &mut D) -> Result<Session, AuthError> {
        self.ensure_session_at(driver, Utc::now()).await
    }

    /// Reuse the persisted session when it is within the validity window and
    /// passes a live probe; otherwise log in from scratch.
    #[instrument(level = "info", skip_all)]
    pub async fn ensure_session_at<D: PageDriver>(
        &self,
        driver: &mut D,
        now: DateTime<Utc>,
    ) -> Result<Session, AuthError> {
        match self.load_record() {
            Some(mut session) if now - session.established_at < self.settings.validity() => {
                driver.set_cookies(&session.cookies);
                if self.probe(driver).await {
                    info!(established_at = %session.established_at, "Reusing persisted session");
                    session.authenticated = true;
                    return Ok(session);
                }
                info!("Persisted session failed the probe; logging in again");
            }
            Some(session) => {
                info!(established_at = %session.established_at, "Persisted session is past its validity window");
            }
            None => info!("No persisted session"),
        }
        self.login(driver, now).await
    }

    pub async fn refresh_if_stale<D: PageDriver>(
        &self,
        driver: &mut D,
        session: Session,
        max_age: TimeDelta,
    ) -> Result<Session, AuthError> {
        self.refresh_if_stale_at(driver, session, max_age, Utc::now()).await
    }

    /// Re-validate `session` if it has not been checked for `max_age`; a
    /// failed check forces a fresh login.
    #[instrument(level = "info", skip_all)]
    pub async fn refresh_if_stale_at<D: PageDriver>(
        &self,
        driver: &mut D,
        mut session: Session,
        max_age: TimeDelta,
        now: DateTime<Utc>,
    ) -> Result<Session, AuthError> {
        if now - session.last_refreshed_at <= max_age {
            return Ok(session);
        }
        info!(last_refreshed_at = %session.last_refreshed_at, "Session is stale; probing");
        if self.probe(driver).await {
            session.last_refreshed_at = now;
            session.cookies = driver.cookies();
            session.authenticated = true;
            self.save_record(&session);
            return Ok(session);
        }
        warn!("Stale session failed the probe; logging in again");
        self.login(driver, now).await
    }

    /// Run the full login sequence from an empty cookie jar.
    #[instrument(level = "info", skip_all, fields(email = %self.credentials.email))]
    pub async fn login<D: PageDriver>(&self, driver: &mut D, now: DateTime<Utc>) -> Result<Session, AuthError> {
        driver.set_cookies(&[]);
        let mut step = LoginStep::SubmitIdentifier;
        let mut page = driver.goto(&self.login_url).await?;

        loop {
            info!(%step, url = %page.url, "Login step");
            page = match self.advance(driver, step, page).await {
                Ok(next) => next,
                Err(e) => {
                    warn!(%step, error = %e, "Login attempt failed");
                    return Err(e);
                }
            };
            match step.next() {
                Some(next) => step = next,
                None => break,
            }
        }

        let session = Session::established(driver.cookies(), now);
        info!(cookies = session.cookies.len(), "Logged in");
        self.save_record(&session);
        Ok(session)
    }

    /// Wait for `step`'s element on `page` and act on it.
    async fn advance<D: PageDriver>(&self, driver: &mut D, step: LoginStep, page: Page) -> Result<Page, AuthError> {
        let wait = self.settings.step_wait();
        let at = |e: BrowseError| AuthError::from_browse(step, e);
        let c = &self.chains;

        match step {
            LoginStep::SubmitIdentifier => {
                let seen = wait_for(driver, page, &c.identifier, wait).await.map_err(at)?;
                driver
                    .fill_and_submit(&seen.page, &[(seen.selector.as_str(), self.credentials.email.as_str())])
                    .await
                    .map_err(at)
            }
            LoginStep::SelectInstitutionalRoute => {
                let seen = wait_for_any(driver, page, &[&c.institutional_route, &c.institution_id], wait)
                    .await
                    .map_err(at)?;
                if seen.chain == 1 {
                    info!("Institution form shown directly; no route to select");
                    return Ok(seen.page);
                }
                driver.activate(&seen.page, &seen.selector).await.map_err(at)
            }
            LoginStep::SubmitInstitutionId => {
                let seen = wait_for(driver, page, &c.institution_id, wait).await.map_err(at)?;
                driver
                    .fill_and_submit(&seen.page, &[(seen.selector.as_str(), self.credentials.institution_id.as_str())])
                    .await
                    .map_err(at)
            }
            LoginStep::SubmitCredentials => {
                let seen = wait_for(driver, page, &c.password, wait).await.map_err(at)?;
                let username = {
                    let doc = seen.page.document();
                    c.username
                        .first_present(doc.root_element())
                        .map(|s| s.css().to_string())
                };
                let mut fields = Vec::with_capacity(2);
                if let Some(username) = &username {
                    fields.push((username.as_str(), self.credentials.email.as_str()));
                }
                fields.push((seen.selector.as_str(), self.credentials.password.as_str()));
                driver.fill_and_submit(&seen.page, &fields).await.map_err(at)
            }
            LoginStep::VerifySuccess => {
                if self.shows(&page, &c.rejected) {
                    return Err(AuthError::CredentialsRejected);
                }
                if self.shows(&page, &c.account_indicator) {
                    return Ok(page);
                }
                let account = driver.goto(&self.account_url).await?;
                let seen = wait_for_any(driver, account, &[&c.rejected, &c.account_indicator], wait)
                    .await
                    .map_err(at)?;
                if seen.chain == 0 {
                    return Err(AuthError::CredentialsRejected);
                }
                Ok(seen.page)
            }
        }
    }

    fn shows(&self, page: &Page, chain: &SelectorChain) -> bool {
        let doc = page.document();
        chain.first_present(doc.root_element()).is_some()
    }
}
