//! Plain-text article files for the script generator.
//!
//! Each ranked article becomes `article_<rank>_<safe title>.txt`:
//!
//! ```text
//! Title: ...
//! Date: ...
//! Author: ...
//! URL: ...
//!
//! ==================================================
//!
//! <full text>
//! ```

use crate::models::Article;
use crate::utils::safe_title;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument, warn};

const RULE_WIDTH: usize = 50;

fn render(article: &Article) -> String {
    let date = article
        .published_at
        .map(|d| d.to_rfc3339())
        .unwrap_or_else(|| "Unknown".to_string());
    format!(
        "Title: {}\nDate: {}\nAuthor: {}\nURL: {}\n\n{}\n\n{}",
        article.title,
        date,
        article.author.as_deref().unwrap_or("Unknown"),
        article.url,
        "=".repeat(RULE_WIDTH),
        article.full_text,
    )
}

/// Remove article files left by an earlier run.
async fn clear_previous(articles_dir: &str) -> std::io::Result<usize> {
    let mut removed = 0;
    let mut entries = fs::read_dir(articles_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with("article_") && name.ends_with(".txt") {
            fs::remove_file(entry.path()).await?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Write one file per article, ranked from 1 in the given order. Files from
/// a previous run are replaced.
#[instrument(level = "info", skip_all, fields(articles_dir = %articles_dir, count = articles.len()))]
pub async fn write_article_texts(articles: &[Article], articles_dir: &str) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    fs::create_dir_all(articles_dir).await?;
    let removed = clear_previous(articles_dir).await?;
    if removed > 0 {
        info!(removed, "Removed previous article texts");
    }
    let mut written = Vec::with_capacity(articles.len());
    for (i, article) in articles.iter().enumerate() {
        let mut title = safe_title(&article.title);
        if title.is_empty() {
            warn!(url = %article.url, "Title has no file-safe characters");
            title = "untitled".to_string();
        }
        let path = Path::new(articles_dir).join(format!("article_{}_{}.txt", i + 1, title));
        fs::write(&path, render(article)).await?;
        written.push(path);
    }
    info!(count = written.len(), "Wrote article texts");
    Ok(written)
}
