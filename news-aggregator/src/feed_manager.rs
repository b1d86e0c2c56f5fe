use crate::cache::TtlCache;
use crate::config::SourcesConfig;
use crate::fetcher::{PageFetcher, RequestKind};
use crate::parser::FeedParser;
use crate::sources::search_feeds_for;
use crate::types::{AggregatorError, Article, FeedFailure, FeedSource, Result};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything the fetch stage produced in one run.
#[derive(Debug, Clone, Default)]
pub struct FeedBatch {
    /// Deduplicated, newest first.
    pub articles: Vec<Article>,
    pub failures: Vec<FeedFailure>,
    pub feeds_attempted: usize,
}

/// Builds the feed list for a run and fetches it.
pub struct FeedManager {
    fetcher: Arc<dyn PageFetcher>,
    cache: Arc<TtlCache<Vec<Article>>>,
    sources: SourcesConfig,
}

impl FeedManager {
    pub fn new(fetcher: Arc<dyn PageFetcher>, cache: Arc<TtlCache<Vec<Article>>>, sources: SourcesConfig) -> Self {
        Self { fetcher, cache, sources }
    }

    /// Default outlets followed by the location search feeds. Falls back to
    /// the configured default locations when none are given. Duplicate URLs
    /// keep their first descriptor.
    pub fn sources_for(&self, locations: &[String]) -> Vec<FeedSource> {
        let locations = if locations.is_empty() {
            self.sources.default_locations.as_slice()
        } else {
            locations
        };

        let mut feeds = self.sources.default_feeds.clone();
        feeds.extend(search_feeds_for(&self.sources.search_feeds, locations));

        let mut seen = std::collections::HashSet::new();
        feeds.retain(|f| seen.insert(f.url.clone()));

        debug!("Built {} feed sources for {} locations", feeds.len(), locations.len());
        feeds
    }

    /// Fetch every source concurrently and wait for all of them. A failing
    /// source is logged and reported; it never aborts the batch.
    pub async fn fetch_all(&self, sources: &[FeedSource]) -> FeedBatch {
        info!("Fetching {} feeds", sources.len());

        let results = join_all(sources.iter().map(|source| self.fetch_source(source))).await;

        let mut merged = Vec::new();
        let mut failures = Vec::new();
        for (source, result) in sources.iter().zip(results) {
            match result {
                Ok(articles) => merged.extend(articles),
                Err(e) => {
                    warn!("Feed {} contributed no articles: {}", source.name, e);
                    failures.push(FeedFailure {
                        source: source.name.clone(),
                        url: source.url.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let mut articles = FeedParser::deduplicate_articles(merged);
        FeedParser::sort_by_date(&mut articles);

        info!(
            "Fetched {} unique articles from {}/{} feeds",
            articles.len(),
            sources.len() - failures.len(),
            sources.len()
        );

        FeedBatch {
            articles,
            failures,
            feeds_attempted: sources.len(),
        }
    }

    async fn fetch_source(&self, source: &FeedSource) -> Result<Vec<Article>> {
        if let Some(cached) = self.cache.get(&source.url).await {
            return Ok(cached);
        }

        let page = self.fetcher.get(&source.url, RequestKind::Feed).await?;
        if !FeedParser::is_valid_feed_content(&page.body) {
            return Err(AggregatorError::Parse(format!("{} did not return a feed", source.url)));
        }

        let articles = FeedParser::parse_feed(&page.body, source, Utc::now())?;
        self.cache.insert(source.url.clone(), articles.clone()).await;
        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourcesConfig;
    use crate::fetcher::MockPageFetcher;
    use crate::types::Language;
    use std::time::Duration;

    fn manager(mock: MockPageFetcher, sources: SourcesConfig) -> FeedManager {
        FeedManager::new(
            Arc::new(mock),
            Arc::new(TtlCache::new("feed", Duration::from_secs(60))),
            sources,
        )
    }

    #[test]
    fn sources_combine_defaults_and_locations() {
        let config = SourcesConfig::default();
        let default_count = config.default_feeds.len();
        let template_count = config.search_feeds.len();
        let manager = manager(MockPageFetcher::new(), config);

        let feeds = manager.sources_for(&["Jericho".to_string(), "Syosset".to_string()]);
        assert_eq!(feeds.len(), default_count + 2 * template_count);
        assert!(feeds.iter().any(|f| f.name.contains("Jericho")));

        let fallback = manager.sources_for(&[]);
        assert!(fallback.iter().any(|f| f.name.contains("Great Neck")));
    }

    #[test]
    fn duplicate_feed_urls_are_dropped() {
        let feed = FeedSource::new("A", "https://example.com/rss", Language::En, 1);
        let config = SourcesConfig {
            default_locations: vec![],
            default_feeds: vec![feed.clone(), FeedSource { name: "B".into(), ..feed }],
            search_feeds: vec![],
        };
        let feeds = manager(MockPageFetcher::new(), config).sources_for(&[]);
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].name, "A");
    }

    #[tokio::test]
    async fn caches_feeds_and_records_non_feed_responses() {
        let rss = r#"<rss version="2.0"><channel><title>T</title>
            <item><title>Manhasset library event</title><link>https://patch.com/a</link></item>
        </channel></rss>"#;
        let good = FeedSource::new("Good", "https://patch.com/feed", Language::En, 2);
        let html = FeedSource::new("Html", "https://example.com/not-a-feed", Language::En, 2);
        let mock = Arc::new(
            MockPageFetcher::new()
                .with_page(&good.url, rss)
                .with_page(&html.url, "<html><body>Sorry</body></html>"),
        );
        let manager = FeedManager::new(
            mock.clone(),
            Arc::new(TtlCache::new("feed", Duration::from_secs(60))),
            SourcesConfig::default(),
        );
        let sources = vec![good.clone(), html.clone()];

        let first = manager.fetch_all(&sources).await;
        assert_eq!(first.articles.len(), 1);
        assert_eq!(first.feeds_attempted, 2);
        assert_eq!(first.failures.len(), 1);
        assert_eq!(first.failures[0].source, "Html");

        let second = manager.fetch_all(&sources).await;
        assert_eq!(second.articles, first.articles);
        assert_eq!(mock.request_count("GET", &good.url), 1);
        assert_eq!(mock.request_count("GET", &html.url), 2);
    }
}
