//! The crawl frontier: what has been seen and fetched across runs.
//!
//! Two URL sets and a timestamp, persisted as one JSON record:
//!
//! - `seen_preview_urls`: every preview URL any section scan has surfaced.
//!   Section listings are newest-first, so the first already-seen preview
//!   marks the point below which the previous run already looked.
//! - `visited_urls`: every article that was fully extracted.
//! - `last_full_crawl_at`: when a scan last ignored the early-stop boundary.
//!
//! A [`Frontier`] has a single owner for the whole run. It is not `Clone`,
//! and [`Frontier::persist`] replaces the record atomically.

use crate::error::PersistenceError;
use crate::models::ArticlePreview;
use crate::utils::{read_record, write_record};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// The persisted frontier record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FrontierState {
    pub visited_urls: BTreeSet<String>,
    pub seen_preview_urls: BTreeSet<String>,
    pub last_full_crawl_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct Frontier {
    path: PathBuf,
    state: FrontierState,
    rescan_after: TimeDelta,
}

impl Frontier {
    /// Load the record at `path`, or start empty when there is none.
    ///
    /// # Errors
    ///
    /// An unreadable or malformed record is an error; the caller decides
    /// whether to start over with [`Frontier::empty`].
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>, rescan_after: TimeDelta) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        let state: FrontierState = read_record(path)?.unwrap_or_default();
        info!(
            visited = state.visited_urls.len(),
            seen = state.seen_preview_urls.len(),
            last_full_crawl_at = ?state.last_full_crawl_at,
            "Loaded frontier"
        );
        Ok(Self {
            path: path.to_path_buf(),
            state,
            rescan_after,
        })
    }

    pub fn empty(path: impl AsRef<Path>, rescan_after: TimeDelta) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            state: FrontierState::default(),
            rescan_after,
        }
    }

    pub fn state(&self) -> &FrontierState {
        &self.state
    }

    /// Whether this run should ignore the early-stop boundary.
    ///
    /// True when no full crawl was ever recorded, when the last one is older
    /// than the rescan window, or when the record looks corrupt (visited
    /// articles but no seen previews). The corrupt case also clears both
    /// sets.
    pub fn should_full_rescan(&mut self, now: DateTime<Utc>) -> bool {
        if self.state.seen_preview_urls.is_empty() && !self.state.visited_urls.is_empty() {
            warn!(
                visited = self.state.visited_urls.len(),
                "Frontier has visited articles but no seen previews; resetting"
            );
            self.state.visited_urls.clear();
            self.state.seen_preview_urls.clear();
            return true;
        }
        match self.state.last_full_crawl_at {
            None => true,
            Some(at) => now - at > self.rescan_after,
        }
    }

    pub fn is_new(&self, url: &str) -> bool {
        !self.state.seen_preview_urls.contains(url)
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.state.visited_urls.contains(url)
    }

    pub fn mark_seen(&mut self, url: &str) {
        self.state.seen_preview_urls.insert(url.to_string());
    }

    pub fn mark_visited(&mut self, url: &str) {
        self.state.visited_urls.insert(url.to_string());
    }

    pub fn record_full_crawl(&mut self, at: DateTime<Utc>) {
        self.state.last_full_crawl_at = Some(at);
    }

    /// The previews above the first already-seen one, in display order, and
    /// whether such a boundary was found.
    pub fn scan_until_known<'a>(&self, previews: &'a [ArticlePreview]) -> (&'a [ArticlePreview], bool) {
        match previews.iter().position(|p| !self.is_new(&p.url)) {
            Some(boundary) => {
                debug!(boundary, url = %previews[boundary].url, "Reached already-seen preview");
                (&previews[..boundary], true)
            }
            None => (previews, false),
        }
    }

    /// Atomically replace the on-disk record with the current state.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    pub fn persist(&self) -> Result<(), PersistenceError> {
        write_record(&self.path, &self.state)?;
        info!(
            visited = self.state.visited_urls.len(),
            seen = self.state.seen_preview_urls.len(),
            "Persisted frontier"
        );
        Ok(())
    }
}
