//! Typed errors for the crawl engine.
//!
//! Each component returns its own error type so the orchestrator can decide
//! between retrying, recording a diagnostic and moving on, or giving up on the
//! whole run:
//!
//! | Error | Raised by | Policy |
//! |-------|-----------|--------|
//! | [`NetworkError`] | page driver | transient ones are retried with backoff |
//! | [`BrowseError`] | page driver / waits | wait timeouts are retried |
//! | [`AuthError`] | session manager | retried, except [`AuthError::CredentialsRejected`] |
//! | [`ExtractError`] | extractor | terminal for the article |
//! | [`PersistenceError`] | session / frontier records | logged as a diagnostic |
//! | [`ConfigError`] | startup | fatal |

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Transport-level failures while loading a page.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NetworkError {
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("timed out loading {url}")]
    Timeout { url: String },

    #[error("too many redirects starting at {url}")]
    TooManyRedirects { url: String },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl NetworkError {
    /// Whether a fresh attempt has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            NetworkError::Request { .. } | NetworkError::Timeout { .. } => true,
            NetworkError::Status { status, .. } => *status == 429 || *status >= 500,
            NetworkError::TooManyRedirects { .. } | NetworkError::InvalidUrl(_) => false,
        }
    }
}

/// Failures while interacting with a loaded page.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BrowseError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("no element matches {selector}")]
    ElementNotFound { selector: String },

    #[error("element {selector} cannot be acted on: {reason}")]
    NotActionable { selector: String, reason: String },

    #[error("gave up waiting {waited:?} for {selectors}")]
    WaitTimeout { selectors: String, waited: Duration },
}

/// The fixed steps of the login flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoginStep {
    SubmitIdentifier,
    SelectInstitutionalRoute,
    SubmitInstitutionId,
    SubmitCredentials,
    VerifySuccess,
}

impl LoginStep {
    /// The step that follows this one, `None` after verification.
    pub fn next(self) -> Option<LoginStep> {
        match self {
            LoginStep::SubmitIdentifier => Some(LoginStep::SelectInstitutionalRoute),
            LoginStep::SelectInstitutionalRoute => Some(LoginStep::SubmitInstitutionId),
            LoginStep::SubmitInstitutionId => Some(LoginStep::SubmitCredentials),
            LoginStep::SubmitCredentials => Some(LoginStep::VerifySuccess),
            LoginStep::VerifySuccess => None,
        }
    }
}

impl fmt::Display for LoginStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoginStep::SubmitIdentifier => "submit-identifier",
            LoginStep::SelectInstitutionalRoute => "select-institutional-route",
            LoginStep::SubmitInstitutionId => "submit-institution-id",
            LoginStep::SubmitCredentials => "submit-credentials",
            LoginStep::VerifySuccess => "verify-success",
        };
        f.write_str(name)
    }
}

/// Errors raised while establishing an authenticated session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("login timed out at step {0}")]
    Timeout(LoginStep),

    #[error("credentials were rejected by the identity provider")]
    CredentialsRejected,

    #[error("unexpected page at step {step}: {detail}")]
    UnexpectedPage { step: LoginStep, detail: String },

    #[error("network failure during login: {0}")]
    Network(#[from] NetworkError),
}

impl AuthError {
    /// Rejected credentials will not start working on a second try.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AuthError::CredentialsRejected)
    }

    /// Wraps a page interaction failure that happened during `step`.
    pub fn from_browse(step: LoginStep, err: BrowseError) -> Self {
        match err {
            BrowseError::Network(e) => AuthError::Network(e),
            BrowseError::WaitTimeout { .. } => AuthError::Timeout(step),
            other => AuthError::UnexpectedPage {
                step,
                detail: other.to_string(),
            },
        }
    }
}

/// Terminal, per-article extraction failures.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("article is behind a paywall")]
    Paywalled,

    #[error("no title found with any selector")]
    NoTitle,

    #[error("no body text found, not even in the page body")]
    NoContent,
}

/// Failures reading or writing an on-disk record.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Invalid configuration detected at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid selector {selector:?} for {field}")]
    Selector { field: String, selector: String },

    #[error("category {name:?} has weight {weight}, expected a value in (0, 1]")]
    Weight { name: String, weight: f64 },

    #[error("invalid URL {0:?}")]
    Url(String),
}

/// Everything the orchestrator can record as a diagnostic.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Browse(#[from] BrowseError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("run cancelled")]
    Cancelled,
}

impl CrawlError {
    /// Whether the failed operation should be attempted again.
    pub fn is_retryable(&self) -> bool {
        match self {
            CrawlError::Network(e) => e.is_transient(),
            CrawlError::Browse(BrowseError::Network(e)) => e.is_transient(),
            CrawlError::Browse(BrowseError::WaitTimeout { .. }) => true,
            CrawlError::Browse(_) => false,
            CrawlError::Auth(e) => !e.is_fatal(),
            CrawlError::Extract(_) | CrawlError::Persistence(_) | CrawlError::Cancelled => false,
        }
    }
}
