//! Command-line interface definitions.
//!
//! Credentials may come from flags or from the environment, so they never
//! have to appear in shell history.

use clap::Parser;

/// Crawl the source, rank what is new, and write the briefing.
///
/// # Examples
///
/// ```sh
/// # Incremental run with credentials from the environment
/// FT_USERNAME=reader@uni.example FT_UNI_ID=UNI-42 FT_PASSWORD=... \
///     geo_briefing -o ./briefings -a ./scraped_articles
///
/// # Force a full rescan and keep the top five
/// geo_briefing -o ./briefings -a ./scraped_articles --full --top 5
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Output directory for the JSON briefing
    #[arg(short, long)]
    pub output_dir: String,

    /// Output directory for ranked article text files
    #[arg(short, long)]
    pub articles_dir: String,

    /// Directory holding the session and frontier records
    #[arg(short, long, default_value = ".geo_briefing")]
    pub state_dir: String,

    /// Optional path to config.yaml file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Rescan every section past the already-seen boundary
    #[arg(long)]
    pub full: bool,

    /// Number of top-ranked articles written as text files
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// E-mail identifier for the source account
    #[arg(long, env = "FT_USERNAME")]
    pub email: String,

    /// Institution identifier for single sign-on
    #[arg(long, env = "FT_UNI_ID")]
    pub institution_id: String,

    /// Password at the identity broker
    #[arg(long, env = "FT_PASSWORD", hide_env_values = true)]
    pub password: String,
}
