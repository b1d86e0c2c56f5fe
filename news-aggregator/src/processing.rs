use crate::config::{CategoryRule, ScoringConfig};
use crate::rss_utils::time::age_in_days;
use crate::types::{Article, Language, Result};
use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

const KOREAN_LANGUAGE_BONUS: f64 = 3.0;
const PRIORITY_BASELINE: i32 = 5;
const PRIORITY_STEP: f64 = 2.0;

/// Display buckets, declared in the order they are checked and rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    KoreanCommunity,
    Korea,
    Emergency,
    Education,
    Business,
    Culture,
    Community,
    Politics,
    Other,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::KoreanCommunity,
        Category::Korea,
        Category::Emergency,
        Category::Education,
        Category::Business,
        Category::Culture,
        Category::Community,
        Category::Politics,
        Category::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::KoreanCommunity => "Korean Community",
            Category::Korea => "Korea",
            Category::Emergency => "Emergency & Safety",
            Category::Education => "Education",
            Category::Business => "Business & Economy",
            Category::Culture => "Culture & Events",
            Category::Community => "Local Community",
            Category::Politics => "Politics & Government",
            Category::Other => "Other News",
        }
    }

    /// How many summaries of this bucket the prompt shows.
    pub fn prompt_cap(&self) -> usize {
        match self {
            Category::KoreanCommunity | Category::Emergency | Category::Culture | Category::Community => 3,
            Category::Korea | Category::Education | Category::Business | Category::Politics | Category::Other => 2,
        }
    }
}

fn recency_bonus(age_days: f64) -> f64 {
    if age_days < 1.0 {
        5.0
    } else if age_days < 3.0 {
        3.0
    } else if age_days < 7.0 {
        1.0
    } else {
        0.0
    }
}

/// Weighted keyword, recency, language and source-priority scoring.
pub struct RelevanceScorer {
    keywords: Vec<(String, f64)>,
    excludes: Vec<String>,
    exclude_penalty: f64,
}

impl RelevanceScorer {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            keywords: config
                .keywords
                .iter()
                .map(|k| (k.keyword.to_lowercase(), k.weight))
                .collect(),
            excludes: config.exclude_keywords.iter().map(|k| k.to_lowercase()).collect(),
            exclude_penalty: config.exclude_penalty,
        }
    }

    /// Deterministic in `(article, now)`; never below zero.
    pub fn score(&self, article: &Article, now: DateTime<Utc>) -> f64 {
        let text = article.searchable_text().to_lowercase();

        let keyword_score: f64 = self
            .keywords
            .iter()
            .filter(|(keyword, _)| text.contains(keyword.as_str()))
            .map(|(_, weight)| weight)
            .sum();

        let penalty = self.excludes.iter().filter(|k| text.contains(k.as_str())).count() as f64 * self.exclude_penalty;

        let language_bonus = if article.language == Language::Ko {
            KOREAN_LANGUAGE_BONUS
        } else {
            0.0
        };

        let priority_bonus = f64::from(PRIORITY_BASELINE - article.priority) * PRIORITY_STEP;

        let raw = keyword_score - penalty + recency_bonus(age_in_days(article.pub_date, now)) + language_bonus + priority_bonus;
        raw.max(0.0)
    }

    pub fn score_all(&self, articles: Vec<Article>, now: DateTime<Utc>) -> Vec<Article> {
        articles
            .into_iter()
            .map(|article| {
                let score = self.score(&article, now);
                article.with_score(score)
            })
            .collect()
    }
}

/// Highest scores first, keeping the incoming order for ties, truncated to
/// `limit`.
pub fn select_top(mut articles: Vec<Article>, limit: usize) -> Vec<Article> {
    articles.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    articles.truncate(limit);
    articles
}

/// First-match regex classifier over title and description.
pub struct Categorizer {
    rules: Vec<(Category, Regex)>,
}

impl Categorizer {
    pub fn new(rules: &[CategoryRule]) -> Result<Self> {
        let rules = rules
            .iter()
            .map(|rule| -> Result<(Category, Regex)> {
                let regex = RegexBuilder::new(&rule.pattern).case_insensitive(true).build()?;
                Ok((rule.category, regex))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn categorize(&self, article: &Article) -> Category {
        let text = article.searchable_text();
        self.rules
            .iter()
            .find(|(_, regex)| regex.is_match(&text))
            .map(|(category, _)| *category)
            .unwrap_or(Category::Other)
    }

    /// Every bucket is present, possibly empty. Articles keep their order.
    pub fn group(&self, articles: &[Article]) -> BTreeMap<Category, Vec<Article>> {
        let mut buckets: BTreeMap<Category, Vec<Article>> = Category::ALL.iter().map(|c| (*c, Vec::new())).collect();
        for article in articles {
            let category = self.categorize(article);
            debug!("{:?} <- {}", category, article.title);
            buckets.entry(category).or_default().push(article.clone());
        }
        buckets
    }
}
