//! Runtime configuration loaded from an optional YAML file.
//!
//! Every field has a default matching the reference source, so the program
//! runs without a config file. A file only needs the keys it overrides:
//!
//! ```yaml
//! source:
//!   sections:
//!     - https://www.ft.com/world
//!     - https://www.ft.com/markets
//! crawl:
//!   max_articles_per_run: 10
//! extractor:
//!   paywall:
//!     - .o-topper__paywall
//! ```

use crate::crawler::CrawlSettings;
use crate::error::ConfigError;
use crate::extractor::ExtractorConfig;
use crate::prioritizer::CategoryRule;
use crate::session::{LoginSelectors, SessionSettings};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use url::Url;

/// The single authenticated source the crawler works against.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Canonical origin; preview links outside it are ignored.
    pub origin: String,
    pub login_url: String,
    /// Page carrying the "my account" indicator, used as the live probe.
    pub account_url: String,
    /// Section listings scanned in order, each assumed newest-first.
    pub sections: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            origin: "https://www.ft.com".to_string(),
            login_url: "https://www.ft.com/login".to_string(),
            account_url: "https://www.ft.com/myaccount".to_string(),
            sections: [
                "https://www.ft.com/myft/following",
                "https://www.ft.com/markets",
                "https://www.ft.com/technology",
                "https://www.ft.com/opinion",
                "https://www.ft.com/world",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl SourceConfig {
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.origin).map_err(|_| ConfigError::Url(self.origin.clone()))
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub session: SessionSettings,
    pub login: LoginSelectors,
    pub crawl: CrawlSettings,
    pub extractor: ExtractorConfig,
    /// Replaces the built-in geopolitical category table when present.
    pub categories: Option<Vec<CategoryRule>>,
}

impl AppConfig {
    /// Load configuration from `path`, or the defaults when no path is given.
    #[instrument(level = "info")]
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            info!("No config file given; using defaults");
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config = Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?;
        info!(
            sections = config.source.sections.len(),
            custom_categories = config.categories.is_some(),
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_the_reference_source() {
        let config = AppConfig::default();
        assert_eq!(config.source.sections.len(), 5);
        assert_eq!(config.source.origin_url().unwrap().host_str(), Some("www.ft.com"));
        assert_eq!(config.session.validity_hours, 24);
        assert_eq!(config.session.refresh_after_hours, 12);
        assert_eq!(config.crawl.full_rescan_after_minutes, 180);
        assert_eq!(config.crawl.article_attempts, 3);
        assert!(config.categories.is_none());
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let yaml = r#"
source:
  sections:
    - https://www.ft.com/world
crawl:
  max_articles_per_run: 10
categories:
  - name: Military
    weight: 1.0
    keywords: [war, missile]
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.source.sections, vec!["https://www.ft.com/world"]);
        assert_eq!(config.source.login_url, "https://www.ft.com/login");
        assert_eq!(config.crawl.max_articles_per_run, Some(10));
        assert_eq!(config.crawl.article_attempts, 3);
        assert_eq!(config.categories.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = AppConfig::load(Some("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_invalid_origin() {
        let source = SourceConfig {
            origin: "not a url".into(),
            ..SourceConfig::default()
        };
        assert!(matches!(source.origin_url(), Err(ConfigError::Url(_))));
    }
}
