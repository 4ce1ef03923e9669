//! JSON briefing output.
//!
//! One file per run, grouped by local date and named for the part of the day
//! the run happened in:
//!
//! ```text
//! output_dir/
//! └── 2025-05-06/
//!     ├── morning.json
//!     ├── afternoon.json
//!     └── evening.json
//! ```
//!
//! A later run in the same part of the day replaces the earlier file.

use crate::models::Briefing;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// Write a [`Briefing`] to `{output_dir}/{local_date}/{time_of_day}.json`.
///
/// # Arguments
///
/// * `briefing` - The ranked articles and diagnostics of one run
/// * `output_dir` - Base directory for JSON output
///
/// # Returns
///
/// The path written, or an error if directory creation or file writing fails.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir))]
pub async fn write_briefing(briefing: &Briefing, output_dir: &str) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(briefing)?;

    let date_dir = Path::new(output_dir).join(&briefing.local_date);
    info!(dir = %date_dir.display(), "Ensuring JSON directory exists");
    if let Err(e) = fs::create_dir_all(&date_dir).await {
        error!(dir = %date_dir.display(), error = %e, "Failed to create JSON dir");
        return Err(e.into());
    }

    let path = date_dir.join(format!("{}.json", briefing.time_of_day));
    fs::write(&path, json).await?;
    info!(
        path = %path.display(),
        articles = briefing.articles.len(),
        diagnostics = briefing.diagnostics.len(),
        "Wrote briefing"
    );
    Ok(path)
}
