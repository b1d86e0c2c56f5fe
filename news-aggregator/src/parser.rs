use crate::rss_utils::feed::{collapse_whitespace, extract_text_from_html};
use crate::types::{AggregatorError, Article, FeedSource, Result};
use chrono::{DateTime, Utc};
use feed_rs::parser;
use std::collections::HashSet;
use tracing::{debug, info};

/// Title given to items that arrive without one.
pub const UNTITLED: &str = "Untitled";

/// Turns raw RSS/Atom documents into [`Article`] records.
pub struct FeedParser;

impl FeedParser {
    /// Parse one feed document. `now` stands in for items without dates.
    pub fn parse_feed(content: &str, source: &FeedSource, now: DateTime<Utc>) -> Result<Vec<Article>> {
        debug!("Parsing feed {} ({} bytes)", source.name, content.len());

        let feed = parser::parse(content.as_bytes())
            .map_err(|e| AggregatorError::Parse(format!("Failed to parse feed {}: {}", source.url, e)))?;

        let articles: Vec<Article> = feed
            .entries
            .into_iter()
            .filter_map(|entry| Self::parse_entry(entry, source, now))
            .collect();

        info!("Parsed {} entries from {}", articles.len(), source.name);
        Ok(articles)
    }

    fn parse_entry(entry: feed_rs::model::Entry, source: &FeedSource, now: DateTime<Utc>) -> Option<Article> {
        let link = entry.links.first()?.href.trim().to_string();
        if link.is_empty() {
            return None;
        }

        let title = entry
            .title
            .map(|t| collapse_whitespace(&t.content))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNTITLED.to_string());

        let description = entry
            .summary
            .map(|s| extract_text_from_html(&s.content))
            .unwrap_or_default();

        let pub_date = entry
            .published
            .or(entry.updated)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(now);

        Some(Article::new(title, link, pub_date, description, source))
    }

    /// Drop later duplicates. Two articles are the same when their trimmed,
    /// lowercased titles match or their links match. Untitled items are
    /// compared by link only.
    pub fn deduplicate_articles(articles: Vec<Article>) -> Vec<Article> {
        let total = articles.len();
        let mut seen_titles = HashSet::new();
        let mut seen_links = HashSet::new();
        let mut unique = Vec::with_capacity(total);

        for article in articles {
            let title_key = (article.title != UNTITLED).then(|| article.title.trim().to_lowercase());
            let title_seen = title_key.as_ref().is_some_and(|t| seen_titles.contains(t));
            if title_seen || seen_links.contains(&article.link) {
                debug!("Removing duplicate entry: {} ({})", article.title, article.link);
                continue;
            }
            seen_titles.extend(title_key);
            seen_links.insert(article.link.clone());
            unique.push(article);
        }

        let removed_count = total - unique.len();
        if removed_count > 0 {
            info!("Removed {} duplicate entries", removed_count);
        }

        unique
    }

    /// Newest first. Stable, so equal dates keep feed order.
    pub fn sort_by_date(articles: &mut [Article]) {
        articles.sort_by(|a, b| b.pub_date.cmp(&a.pub_date));
    }

    pub fn is_valid_feed_content(content: &str) -> bool {
        let content_lower = content.to_lowercase();
        content_lower.contains("<rss") || content_lower.contains("<feed") || content_lower.contains("<rdf")
    }
}
