use crate::cache::NewsCaches;
use crate::config::AggregatorConfig;
use crate::digest::PromptFormatter;
use crate::extractor::ArticleExtractor;
use crate::feed_manager::FeedManager;
use crate::fetcher::{Fetcher, PageFetcher};
use crate::processing::{select_top, Categorizer, RelevanceScorer};
use crate::resolver::UrlResolver;
use crate::types::{AggregateOptions, AggregationResult, Article, Locations, Result};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Runs the whole pipeline: feeds, scoring, optional extraction,
/// categorization.
pub struct NewsAggregator {
    feed_manager: FeedManager,
    extractor: ArticleExtractor,
    scorer: RelevanceScorer,
    categorizer: Categorizer,
    caches: NewsCaches,
    max_selected: usize,
}

impl NewsAggregator {
    pub fn new(config: AggregatorConfig) -> Result<Self> {
        let fetcher = Fetcher::new(config.fetch.clone())?;
        let caches = NewsCaches::new(&config.cache);
        Self::with_fetcher(config, Arc::new(fetcher), caches)
    }

    /// Build on any [`PageFetcher`], with caches supplied by the caller.
    pub fn with_fetcher(config: AggregatorConfig, fetcher: Arc<dyn PageFetcher>, caches: NewsCaches) -> Result<Self> {
        let categorizer = Categorizer::new(&config.scoring.category_rules)?;
        let scorer = RelevanceScorer::new(&config.scoring);

        let resolver = Arc::new(UrlResolver::new(
            fetcher.clone(),
            caches.resolved_urls.clone(),
            Duration::from_millis(config.extraction.resolve_delay_ms),
        ));
        let extractor = ArticleExtractor::new(
            fetcher.clone(),
            resolver,
            caches.articles.clone(),
            config.extraction.clone(),
        );
        let feed_manager = FeedManager::new(fetcher, caches.feeds.clone(), config.sources.clone());

        Ok(Self {
            feed_manager,
            extractor,
            scorer,
            categorizer,
            caches,
            max_selected: config.scoring.max_selected,
        })
    }

    pub fn caches(&self) -> &NewsCaches {
        &self.caches
    }

    pub async fn aggregate(&self, locations: impl Into<Locations>, options: AggregateOptions) -> Result<AggregationResult> {
        let locations = locations.into();
        let cache_key = format!(
            "{}|full={}|max={}",
            locations.cache_key(),
            options.extract_full_articles,
            options.max_full_articles
        );

        if let Some(cached) = self.caches.results.get(&cache_key).await {
            info!("Returning cached aggregation {}", cached.run_id);
            return Ok(cached);
        }

        let run_id = Uuid::new_v4();
        info!("Aggregation {} started for [{}]", run_id, locations.as_slice().join(", "));

        let sources = self.feed_manager.sources_for(locations.as_slice());
        let batch = self.feed_manager.fetch_all(&sources).await;

        let total_articles = batch.articles.len();
        let scored = self.scorer.score_all(batch.articles, Utc::now());
        let mut selected = select_top(scored, self.max_selected);

        if options.extract_full_articles && options.max_full_articles > 0 {
            selected = self.enrich(selected, options.max_full_articles).await;
        }

        let has_full_content = selected.iter().any(|a| a.has_full_content);
        let categorized = self.categorizer.group(&selected);

        let result = AggregationResult {
            run_id,
            total_articles,
            selected_articles: selected.len(),
            categorized,
            articles: selected,
            has_full_content,
            feeds_attempted: batch.feeds_attempted,
            feed_failures: batch.failures,
            generated_at: Utc::now(),
        };

        info!(
            "Aggregation {} finished: {} of {} articles selected, {} feeds failed",
            run_id,
            result.selected_articles,
            result.total_articles,
            result.feed_failures.len()
        );

        // total outages stay out of the result cache
        if result.all_feeds_failed() {
            warn!("Every one of {} feeds failed", result.feeds_attempted);
        } else {
            self.caches.results.insert(cache_key, result.clone()).await;
        }
        Ok(result)
    }

    pub fn format_for_prompt(&self, result: &AggregationResult) -> String {
        PromptFormatter::format(result)
    }

    /// Extract the top `limit` articles and fold the text back in. Articles
    /// that fail keep their summary.
    ///
    /// Resolution can map two aggregator links onto the same publisher page,
    /// so links are made unique again afterwards; the higher-ranked article
    /// wins.
    async fn enrich(&self, selected: Vec<Article>, limit: usize) -> Vec<Article> {
        let links: Vec<String> = selected.iter().take(limit).map(|a| a.link.clone()).collect();
        let mut extracted = self.extractor.extract_each(&links).await.into_iter();

        let mut seen_links = HashSet::new();
        selected
            .into_iter()
            .map(|article| match extracted.next().flatten() {
                Some(full) => article.with_extracted(&full),
                None => article,
            })
            .filter(|article| {
                let kept = seen_links.insert(article.link.clone());
                if !kept {
                    debug!("Dropping {} after resolution, link already selected", article.title);
                }
                kept
            })
            .collect()
    }
}
