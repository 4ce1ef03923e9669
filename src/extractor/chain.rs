//! Ordered, data-driven selector fallback chains.
//!
//! A chain is a list of strategies tried in order. Each strategy is a CSS
//! selector plus what to capture from the matched element, written in
//! configuration as `"css"` (element text) or `"css@attr"` (attribute value):
//!
//! ```text
//! title:
//!   - h1.o-topper__headline
//!   - article h1
//!   - meta[property='og:title']@content
//! ```

use crate::error::ConfigError;
use crate::utils::normalize_whitespace;
use scraper::{ElementRef, Selector};

/// What a strategy takes from the element it matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    Text,
    Attr(String),
}

/// One entry of a [`SelectorChain`].
#[derive(Debug, Clone)]
pub struct Strategy {
    css: String,
    selector: Selector,
    capture: Capture,
}

impl Strategy {
    /// Parse a `"css"` or `"css@attr"` specification.
    pub fn parse(field: &str, spec: &str) -> Result<Self, ConfigError> {
        let (css, capture) = match spec.rsplit_once('@') {
            Some((css, attr))
                if !attr.is_empty()
                    && attr.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') =>
            {
                (css.trim(), Capture::Attr(attr.to_string()))
            }
            _ => (spec.trim(), Capture::Text),
        };
        let selector = Selector::parse(css).map_err(|_| ConfigError::Selector {
            field: field.to_string(),
            selector: spec.to_string(),
        })?;
        Ok(Self {
            css: css.to_string(),
            selector,
            capture,
        })
    }

    pub fn css(&self) -> &str {
        &self.css
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// The captured value of `element`, whitespace-normalized; `None` if empty.
    pub fn capture(&self, element: ElementRef<'_>) -> Option<String> {
        let raw = match &self.capture {
            Capture::Text => element.text().collect::<Vec<_>>().join(" "),
            Capture::Attr(name) => element.value().attr(name)?.to_string(),
        };
        let value = normalize_whitespace(&raw);
        (!value.is_empty()).then_some(value)
    }
}

/// An ordered list of strategies for one extraction point.
#[derive(Debug, Clone)]
pub struct SelectorChain {
    strategies: Vec<Strategy>,
}

impl SelectorChain {
    pub fn parse<S: AsRef<str>>(field: &str, specs: &[S]) -> Result<Self, ConfigError> {
        let strategies = specs
            .iter()
            .map(|spec| Strategy::parse(field, spec.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { strategies })
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    /// Comma-joined selectors, for log lines and error messages.
    pub fn describe(&self) -> String {
        self.strategies
            .iter()
            .map(Strategy::css)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// The first strategy whose selector matches anything below `root`.
    pub fn first_present(&self, root: ElementRef<'_>) -> Option<&Strategy> {
        self.strategies
            .iter()
            .find(|s| root.select(&s.selector).next().is_some())
    }

    /// The first non-empty captured value, with the strategy that produced it.
    pub fn first_value(&self, root: ElementRef<'_>) -> Option<(&Strategy, String)> {
        self.strategies.iter().find_map(|s| {
            root.select(&s.selector)
                .find_map(|el| s.capture(el))
                .map(|value| (s, value))
        })
    }
}
