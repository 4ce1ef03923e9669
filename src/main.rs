//! # Geo Briefing
//!
//! Crawls a paywalled news source through an institutional login, ranks the
//! new articles by geopolitical relevance, and writes the ranked briefing for
//! downstream script and audio generation.
//!
//! ## Usage
//!
//! ```sh
//! geo_briefing -o ./briefings -a ./scraped_articles
//! ```
//!
//! ## Architecture
//!
//! 1. **Session**: reuse the persisted login if it still probes as signed in,
//!    otherwise walk the single sign-on flow
//! 2. **Scan**: read each section's previews down to the already-seen boundary
//! 3. **Extract**: fetch each new article with bounded retries
//! 4. **Rank**: score by weighted keyword categories and discovery order
//! 5. **Output**: JSON briefing with diagnostics, plus text files for the top articles
//!
//! A run never aborts on a single section or article. Failures are collected
//! as diagnostics in the briefing; only a fatal one (no session) makes the
//! process exit non-zero.

use chrono::Local;
use clap::Parser;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod browser;
mod cli;
mod config;
mod crawler;
mod error;
mod extractor;
mod frontier;
mod models;
mod outputs;
mod prioritizer;
mod retry;
mod session;
mod utils;

use browser::HttpDriver;
use cli::Cli;
use config::AppConfig;
use crawler::Crawler;
use extractor::Extractor;
use frontier::Frontier;
use models::Briefing;
use outputs::{articles, json};
use prioritizer::Prioritizer;
use session::{Credentials, SessionManager};
use utils::{ensure_writable_dir, time_of_day, truncate_for_log};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("geo_briefing starting up");

    let args = Cli::parse();
    debug!(
        output_dir = %args.output_dir,
        articles_dir = %args.articles_dir,
        state_dir = %args.state_dir,
        full = args.full,
        "Parsed CLI arguments"
    );

    let config = AppConfig::load(args.config.as_deref())?;

    for dir in [&args.output_dir, &args.articles_dir, &args.state_dir] {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(dir = %dir, error = %e, "Directory is not writable");
            return Err(e);
        }
    }

    let prioritizer = match &config.categories {
        Some(rules) => Prioritizer::new(rules.clone())?,
        None => Prioritizer::geopolitical(),
    };
    let extractor = Extractor::from_config(&config.extractor, config.source.origin_url()?)?;

    let state_dir = Path::new(&args.state_dir);
    let sessions = SessionManager::new(
        state_dir.join("session.json"),
        &config.source,
        &config.login,
        config.session,
        Credentials {
            email: args.email.clone(),
            institution_id: args.institution_id.clone(),
            password: args.password.clone(),
        },
    )?;

    let frontier_path = state_dir.join("frontier.json");
    let rescan_window = config.crawl.rescan_window();
    let mut frontier = match Frontier::load(&frontier_path, rescan_window) {
        Ok(frontier) => frontier,
        Err(e) => {
            warn!(error = %e, "Frontier record unusable; starting from an empty frontier");
            Frontier::empty(&frontier_path, rescan_window)
        }
    };

    let mut driver = HttpDriver::new(config.crawl.page_timeout())?;
    let crawler = Crawler::new(
        config.source.sections.clone(),
        extractor,
        sessions,
        config.crawl.clone(),
    );

    // Ctrl-C stops the run after the article in flight
    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received; stopping after the current article");
                cancel.store(true, Ordering::SeqCst);
            }
        });
    }

    let outcome = crawler.run(&mut driver, &mut frontier, args.full, &cancel).await;
    info!(
        articles = outcome.articles.len(),
        diagnostics = outcome.diagnostics.len(),
        phase = ?outcome.phase,
        "Crawl finished"
    );
    debug!(
        visited = frontier.state().visited_urls.len(),
        seen = frontier.state().seen_preview_urls.len(),
        "Frontier after run"
    );

    let ranked = prioritizer.prioritize(outcome.articles);
    for (rank, article) in ranked.iter().take(args.top).enumerate() {
        info!(
            rank = rank + 1,
            score = article.score,
            title = %truncate_for_log(&article.title, 80),
            "Ranked article"
        );
    }

    let now = Local::now();
    let briefing = Briefing {
        local_date: now.date_naive().to_string(),
        time_of_day: time_of_day(),
        local_time: now.format("%H:%M:%S").to_string(),
        full_scan: outcome.full_scan,
        articles: ranked,
        diagnostics: outcome.diagnostics,
    };

    for d in &briefing.diagnostics {
        warn!(scope = ?d.scope, fatal = d.fatal, error = %d.error, "Run diagnostic");
    }

    if let Err(e) = json::write_briefing(&briefing, &args.output_dir).await {
        error!(error = %e, "Failed to write briefing");
        return Err(e);
    }

    let top: Vec<_> = briefing.articles.iter().take(args.top).cloned().collect();
    if let Err(e) = articles::write_article_texts(&top, &args.articles_dir).await {
        error!(error = %e, "Failed to write article texts");
        return Err(e);
    }

    let elapsed = start_time.elapsed();
    if briefing.has_fatal() {
        error!(elapsed_secs = elapsed.as_secs(), "Run failed");
        return Err("run ended with a fatal diagnostic; see the briefing".into());
    }
    info!(
        elapsed_secs = elapsed.as_secs(),
        articles = briefing.articles.len(),
        written = top.len(),
        "geo_briefing completed successfully"
    );
    Ok(())
}
