use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::processing::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Ko,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ko => "ko",
        }
    }
}

/// One RSS endpoint the fetcher should read during an aggregation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
    pub language: Language,
    pub priority: i32,
    /// Hint that item links point straight at the publisher. Not enforced.
    #[serde(default)]
    pub direct_access: bool,
}

impl FeedSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>, language: Language, priority: i32) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            language,
            priority,
            direct_access: false,
        }
    }

    pub fn with_direct_access(mut self, direct_access: bool) -> Self {
        self.direct_access = direct_access;
        self
    }
}

/// A normalized news item. Records are never edited in place: scoring and
/// enrichment consume the record and hand back a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub title: String,
    pub link: String,
    pub original_link: Option<String>,
    pub pub_date: DateTime<Utc>,
    pub description: String,
    pub source: String,
    pub language: Language,
    pub priority: i32,
    pub relevance_score: f64,
    pub full_content: Option<String>,
    pub byline: Option<String>,
    pub content_length: Option<usize>,
    pub has_full_content: bool,
}

impl Article {
    pub fn new(title: String, link: String, pub_date: DateTime<Utc>, description: String, source: &FeedSource) -> Self {
        Self {
            title,
            link,
            original_link: None,
            pub_date,
            description,
            source: source.name.clone(),
            language: source.language,
            priority: source.priority,
            relevance_score: 0.0,
            full_content: None,
            byline: None,
            content_length: None,
            has_full_content: false,
        }
    }

    /// Text the keyword scorer and categorizer look at.
    pub fn searchable_text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }

    pub fn with_score(self, score: f64) -> Self {
        Self {
            relevance_score: score.max(0.0),
            ..self
        }
    }

    pub fn with_extracted(self, extracted: &ExtractedArticle) -> Self {
        let original_link = if extracted.url != self.link {
            Some(self.original_link.unwrap_or_else(|| self.link.clone()))
        } else {
            self.original_link
        };

        Self {
            link: extracted.url.clone(),
            original_link,
            full_content: Some(extracted.content.clone()),
            byline: extracted.byline.clone(),
            content_length: Some(extracted.length),
            has_full_content: true,
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedArticle {
    pub title: String,
    pub content: String,
    pub byline: Option<String>,
    pub length: usize,
    pub site_name: String,
    pub url: String,
    pub extracted_at: DateTime<Utc>,
}

/// A feed that contributed nothing because fetching or parsing it failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedFailure {
    pub source: String,
    pub url: String,
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateOptions {
    pub extract_full_articles: bool,
    pub max_full_articles: usize,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            extract_full_articles: false,
            max_full_articles: 5,
        }
    }
}

/// Location names used to parameterize the search feeds. Accepts a single
/// comma separated string or a list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Locations(Vec<String>);

impl Locations {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Stable cache key, independent of input order and case.
    pub fn cache_key(&self) -> String {
        let mut keys: Vec<String> = self.0.iter().map(|l| l.to_lowercase()).collect();
        keys.sort();
        keys.join("|")
    }

    fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = Vec::new();
        for part in parts {
            let trimmed = part.as_ref().trim();
            if trimmed.is_empty() {
                continue;
            }
            if !seen.iter().any(|s: &String| s.eq_ignore_ascii_case(trimmed)) {
                seen.push(trimmed.to_string());
            }
        }
        Self(seen)
    }
}

impl From<&str> for Locations {
    fn from(value: &str) -> Self {
        Self::from_parts(value.split(','))
    }
}

impl From<String> for Locations {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<Vec<String>> for Locations {
    fn from(value: Vec<String>) -> Self {
        Self::from_parts(value)
    }
}

impl From<&[&str]> for Locations {
    fn from(value: &[&str]) -> Self {
        Self::from_parts(value.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationResult {
    pub run_id: Uuid,
    pub total_articles: usize,
    pub selected_articles: usize,
    pub categorized: BTreeMap<Category, Vec<Article>>,
    pub articles: Vec<Article>,
    pub has_full_content: bool,
    pub feeds_attempted: usize,
    pub feed_failures: Vec<FeedFailure>,
    pub generated_at: DateTime<Utc>,
}

impl AggregationResult {
    /// True when every attempted feed failed, as opposed to feeds answering
    /// with nothing relevant.
    pub fn all_feeds_failed(&self) -> bool {
        self.feeds_attempted > 0 && self.feed_failures.len() >= self.feeds_attempted
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("General error: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
