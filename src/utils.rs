//! Utility functions for time classification, text cleanup, and file system operations.
//!
//! This module provides helper functions used throughout the application:
//! - Time classification for edition naming
//! - Whitespace normalization for scraped text
//! - String truncation and safe file names
//! - Atomic JSON record reads/writes and output directory validation

use crate::error::PersistenceError;
use chrono::{Local, NaiveTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::error::Error;
use std::fs as stdfs;
use std::io::Write;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Classify the current local time into morning, afternoon, or evening.
///
/// The time boundaries are:
/// - **Morning**: 00:00 - 08:00
/// - **Afternoon**: 08:00 - 16:00
/// - **Evening**: 16:00 - 24:00
#[instrument]
pub fn time_of_day() -> String {
    let which = classify_time(Local::now().time());
    tracing::debug!(%which, "Computed time_of_day");
    which.to_string()
}

fn classify_time(tod: NaiveTime) -> &'static str {
    match tod.hour() {
        0..8 => "morning",
        8..16 => "afternoon",
        _ => "evening",
    }
}

/// Collapse every run of whitespace into a single space and trim the ends.
///
/// Scraped text nodes carry the page's indentation and line breaks; this
/// turns them into readable prose.
pub fn normalize_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (on a character boundary) with
/// an ellipsis and the number of dropped bytes appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Turn a headline into a file-name-safe stem.
///
/// Keeps alphanumerics, spaces, `-` and `_`, trims trailing whitespace and
/// limits the result to 50 characters.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(safe_title("Oil: prices jump!"), "Oil prices jump");
/// ```
pub fn safe_title(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    kept.trim_end().chars().take(50).collect::<String>().trim_end().to_string()
}

/// Write `bytes` to `path` so readers see either the old or the new content.
///
/// The data goes to a temporary sibling first, is flushed to disk, and is then
/// renamed over the destination. An interrupted write leaves the previous
/// record intact.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            stdfs::create_dir_all(parent)?;
        }
    }

    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(format!(".{}.tmp", std::process::id()));
    let temp_path = path.with_file_name(temp_name);

    let written = stdfs::File::create(&temp_path).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });
    if let Err(e) = written.and_then(|_| stdfs::rename(&temp_path, path)) {
        let _ = stdfs::remove_file(&temp_path);
        return Err(e);
    }
    Ok(())
}

/// Read a JSON record; `Ok(None)` when the file does not exist yet.
pub fn read_record<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PersistenceError> {
    let raw = match stdfs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(PersistenceError::Io {
                path: path.display().to_string(),
                source,
            });
        }
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| PersistenceError::Json {
            path: path.display().to_string(),
            source,
        })
}

/// Pretty-print `value` as JSON and [`write_atomic`] it to `path`.
pub fn write_record<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    let json = serde_json::to_vec_pretty(value).map_err(|source| PersistenceError::Json {
        path: path.display().to_string(),
        source,
    })?;
    write_atomic(path, &json).map_err(|source| PersistenceError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Ensure a directory exists and is writable.
///
/// This function creates the directory if it doesn't exist, then performs
/// a write test by creating and immediately deleting a probe file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    // A small sync write using std fs has the simpler error surface
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_time() {
        let at = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        assert_eq!(classify_time(at(0, 0)), "morning");
        assert_eq!(classify_time(at(7, 59)), "morning");
        assert_eq!(classify_time(at(8, 0)), "afternoon");
        assert_eq!(classify_time(at(15, 59)), "afternoon");
        assert_eq!(classify_time(at(16, 0)), "evening");
        assert_eq!(classify_time(at(23, 59)), "evening");
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  Oil\n\t prices   rise "), "Oil prices rise");
        assert_eq!(normalize_whitespace("\n\n"), "");
    }

    #[test]
    fn test_truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundaries() {
        let s = "é".repeat(10);
        let result = truncate_for_log(&s, 3);
        assert!(result.starts_with('é'));
        assert!(result.contains("(+18 bytes)"));
    }

    #[test]
    fn test_safe_title() {
        assert_eq!(safe_title("Oil: prices jump!"), "Oil prices jump");
        assert_eq!(safe_title("US-China trade_talks "), "US-China trade_talks");
        assert_eq!(safe_title(&"x".repeat(80)).len(), 50);
    }

    #[test]
    fn test_write_atomic_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("record.json");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(stdfs::read_to_string(&path).unwrap(), "second");
        let leftovers: Vec<_> = stdfs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_records_missing_and_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        assert_eq!(read_record::<Vec<String>>(&path).unwrap(), None);

        stdfs::write(&path, "{not json").unwrap();
        assert!(matches!(
            read_record::<Vec<String>>(&path),
            Err(PersistenceError::Json { .. })
        ));

        write_record(&path, &vec!["a".to_string()]).unwrap();
        assert_eq!(read_record::<Vec<String>>(&path).unwrap(), Some(vec!["a".to_string()]));
    }
}
