//! Geopolitical relevance scoring.
//!
//! A fixed, auditable keyword table. Every [`CategoryRule`] contributes
//! `weight × occurrences` of its keywords in the lowercased
//! `title + " " + full_text`, and the sum is blended with the article's
//! position in the batch:
//!
//! ```text
//! position_score = 1 - (original_position - 1) / (n - 1)      (1.0 when n == 1)
//! score          = 0.8 × category_score + 0.2 × position_score
//! ```
//!
//! Scoring is a pure function of the article's text and position: no state,
//! no randomness, no I/O.

use crate::error::ConfigError;
use crate::models::Article;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

pub const CATEGORY_WEIGHT: f64 = 0.8;
pub const POSITION_WEIGHT: f64 = 0.2;

/// One weighted keyword category.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CategoryRule {
    pub name: String,
    /// In (0, 1].
    pub weight: f64,
    /// Matched case-insensitively as substrings.
    pub keywords: Vec<String>,
}

const GEOPOLITICAL: &[(&str, f64, &[&str])] = &[
    (
        "Military",
        1.0,
        &[
            "military", "defense", "armed forces", "security", "militia", "war", "conflict", "combat",
            "battle", "hostilities", "invasion", "attack", "strike", "operation", "troop movements",
            "cyberwarfare", "cyber warfare", "army", "navy", "air force", "troops", "soldiers", "soldier",
            "weapon", "weapons", "missile", "missiles", "tank", "tanks", "artillery", "howitzer", "drone",
            "drones", "unmanned aerial vehicle", "UAV", "fighter jet", "helicopter", "submarine",
            "anti-aircraft gun", "anti-tank missile", "guided missile", "rifle", "assault rifle", "AK-47",
            "M16", "sniper rifle", "machine gun", "grenade", "rocket launcher", "bazooka", "pistol",
            "handgun", "carbine", "machine pistol", "nuclear weapon", "chemical weapon",
            "biological weapon", "explosive", "cluster bomb", "landmine", "bomb", "torpedo",
            "surface-to-air missile", "SAM", "intercontinental ballistic missile", "ICBM",
            "grenade launcher",
        ],
    ),
    (
        "Energy",
        0.9,
        &[
            "energy", "power", "electricity", "electric grid", "energy security", "energy supply",
            "energy crisis", "energy prices", "energy independence", "oil", "gas", "natural gas",
            "fossil fuel", "fossil fuels", "coal", "nuclear", "renewable", "solar", "wind power",
            "hydropower", "pipeline", "power plant", "refinery", "drilling", "OPEC", "ExxonMobil",
            "Chevron", "BP", "Shell", "TotalEnergies", "Gazprom", "Saudi Aramco", "PetroChina",
            "Rosneft", "Equinor", "CNOOC", "Repsol",
        ],
    ),
    (
        "Food & Mineral Supply",
        0.8,
        &[
            "wheat", "grain", "food security", "agriculture", "minerals", "rare earth", "lithium",
            "cobalt", "nickel", "copper", "natural resources", "mining", "supply chain", "commodities",
            "exports", "imports",
        ],
    ),
    (
        "Tech & Innovation",
        0.7,
        &[
            "technology", "tech", "innovation", "R&D", "startup", "digital", "automation", "AI",
            "artificial intelligence", "machine learning", "quantum computing", "semiconductor", "chip",
            "chips", "robotics", "blockchain", "big data", "software", "hardware", "cloud computing",
            "cybersecurity", "data center", "5G", "6G", "tech giants", "Intel", "AMD", "NVIDIA", "TSMC",
            "Qualcomm", "Samsung Electronics", "IBM", "Google", "Microsoft", "Apple", "Facebook", "Meta",
            "Amazon", "Tesla", "ASML", "Broadcom", "Micron",
        ],
    ),
    (
        "Economy",
        0.6,
        &[
            "GDP", "inflation", "inflation rate", "deflation", "unemployment", "economic growth",
            "economic downturn", "economic recovery", "recession", "fiscal policy", "monetary policy",
            "trade balance", "stimulus", "consumer spending", "investment", "economic indicators",
            "supply chain", "manufacturing output", "retail sales",
        ],
    ),
    (
        "Elections & Regime Change",
        0.5,
        &[
            "election", "vote", "ballot", "poll", "campaign", "democratic process", "regime",
            "regime change", "government", "transition", "parliament", "prime minister", "president",
            "governance", "political", "political party", "political instability", "political unrest",
            "protest", "revolution", "civil unrest", "coup", "authoritarian",
        ],
    ),
    (
        "Bond Markets",
        0.4,
        &[
            "bonds", "bond market", "yield", "yield curve", "treasury", "government bonds",
            "corporate bonds", "junk bonds", "investment grade", "liquidity", "credit risk",
            "default risk", "interest rate", "bond yields", "spread", "fixed income", "debt market",
            "bond issuance", "coupon", "maturity",
        ],
    ),
    (
        "Central Banks",
        0.3,
        &[
            "central bank", "monetary policy", "inflation target", "policy statement", "balance sheet",
            "open market operations", "interest rate", "rate hike", "rate cut", "repo rate",
            "discount rate", "quantitative easing", "QE", "monetary tightening", "Federal Reserve", "ECB",
            "Bank of England", "Bank of Japan",
        ],
    ),
    (
        "Currency/Crypto/Commodity Shocks",
        0.2,
        &[
            "currency", "forex", "exchange rate", "foreign exchange market", "currency devaluation",
            "USD", "EUR", "JPY", "GBP", "CNY", "CHF", "CAD", "AUD", "crypto", "cryptocurrency", "bitcoin",
            "ethereum", "digital asset", "crypto regulation", "crypto market", "Ripple", "Litecoin",
            "Cardano", "Polkadot", "Dogecoin", "Binance Coin", "Tether", "Solana", "commodity",
            "commodities", "gold", "silver", "crude oil", "natural gas", "copper", "platinum", "palladium",
            "commodity prices", "volatility", "hedging", "price shock", "market turbulence",
        ],
    ),
    (
        "Sanctions & Trade Policy",
        0.15,
        &[
            "trade policy", "trade agreement", "WTO", "customs", "quota", "trade war", "trade barriers",
            "import tariffs", "export restrictions", "retaliatory tariffs", "geopolitical sanctions",
            "sanctions", "embargo", "export control", "import restrictions", "economic sanctions",
            "blacklist", "economic pressure",
        ],
    ),
    (
        "Diplomacy & Alliances",
        0.1,
        &[
            "diplomacy", "alliance", "coalition", "treaty", "summit", "negotiation", "foreign policy",
            "international relations", "power bloc", "bilateral relations", "multilateral",
            "strategic partnership", "diplomatic talks", "diplomatic mission", "peace talks", "UN",
            "NATO", "G7", "G20", "ambassador",
        ],
    ),
    (
        "Big Tech",
        0.05,
        &[
            "big tech", "Facebook", "Meta", "Google", "Alphabet", "Apple", "Amazon", "Microsoft", "Tesla",
            "Netflix", "Twitter", "LinkedIn", "YouTube", "cloud services", "AI platform", "social media",
            "digital advertising", "data privacy", "antitrust", "platform regulation",
        ],
    ),
];

/// The built-in twelve-category geopolitical table.
pub fn geopolitical_rules() -> Vec<CategoryRule> {
    GEOPOLITICAL
        .iter()
        .map(|(name, weight, keywords)| CategoryRule {
            name: name.to_string(),
            weight: *weight,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        })
        .collect()
}

/// A validated rule with keywords lowercased and de-duplicated.
#[derive(Debug, Clone)]
struct CompiledRule {
    name: String,
    weight: f64,
    keywords: Vec<String>,
}

/// Scores and orders articles against a fixed category table.
#[derive(Debug, Clone)]
pub struct Prioritizer {
    rules: Vec<CompiledRule>,
}

impl Prioritizer {
    /// Build a prioritizer from `rules`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Weight`] when a weight falls outside (0, 1].
    pub fn new(rules: Vec<CategoryRule>) -> Result<Self, ConfigError> {
        let rules = rules
            .into_iter()
            .map(|rule| {
                if !(rule.weight > 0.0 && rule.weight <= 1.0) {
                    return Err(ConfigError::Weight {
                        name: rule.name,
                        weight: rule.weight,
                    });
                }
                let keywords = rule
                    .keywords
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .unique()
                    .collect();
                Ok(CompiledRule {
                    name: rule.name,
                    weight: rule.weight,
                    keywords,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn geopolitical() -> Self {
        Self::new(geopolitical_rules()).expect("built-in weights are within (0, 1]")
    }

    /// Weighted keyword occurrences in `text`.
    pub fn category_score(&self, text: &str) -> f64 {
        let text = text.to_lowercase();
        self.rules
            .iter()
            .map(|rule| {
                let hits: usize = rule.keywords.iter().map(|k| text.matches(k.as_str()).count()).sum();
                if hits > 0 {
                    debug!(category = %rule.name, hits, "Category matched");
                }
                hits as f64 * rule.weight
            })
            .sum()
    }

    /// Position term for the `original_position`-th (1-based) of `total`.
    pub fn position_score(original_position: usize, total: usize) -> f64 {
        if total <= 1 {
            return 1.0;
        }
        let index = original_position.saturating_sub(1).min(total - 1);
        1.0 - index as f64 / (total - 1) as f64
    }

    /// Score one article within a batch of `total`.
    pub fn score(&self, article: &Article, total: usize) -> f64 {
        let text = format!("{} {}", article.title, article.full_text);
        CATEGORY_WEIGHT * self.category_score(&text)
            + POSITION_WEIGHT * Self::position_score(article.original_position, total)
    }

    /// Score every article and sort by descending score, earlier discovery
    /// first on ties.
    #[instrument(level = "info", skip_all, fields(count = articles.len()))]
    pub fn prioritize(&self, mut articles: Vec<Article>) -> Vec<Article> {
        let total = articles.len();
        for article in &mut articles {
            article.score = self.score(article, total);
        }
        articles.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.original_position.cmp(&b.original_position))
        });
        if let Some(top) = articles.first() {
            info!(top_score = top.score, top_title = %top.title, "Prioritized articles");
        }
        articles
    }
}
