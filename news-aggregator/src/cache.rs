use crate::config::CacheConfig;
use crate::types::{AggregationResult, Article, ExtractedArticle};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-process key-value store whose entries expire a fixed time after they
/// were written.
pub struct TtlCache<V> {
    name: &'static str,
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if entry.is_fresh(Instant::now()) => {
                debug!("{} cache hit: {}", self.name, key);
                Some(entry.value.clone())
            }
            _ => None,
        }
    }

    pub async fn insert(&self, key: impl Into<String>, value: V) {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        // drop expired entries on write so the map does not grow without bound
        entries.retain(|_, entry| entry.is_fresh(now));
        entries.insert(
            key.into(),
            CacheEntry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }

    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.read().await.values().filter(|e| e.is_fresh(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

/// The four caches the pipeline uses. Built once and shared by every stage.
#[derive(Clone)]
pub struct NewsCaches {
    pub feeds: Arc<TtlCache<Vec<Article>>>,
    pub resolved_urls: Arc<TtlCache<String>>,
    pub articles: Arc<TtlCache<ExtractedArticle>>,
    pub results: Arc<TtlCache<AggregationResult>>,
}

impl NewsCaches {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            feeds: Arc::new(TtlCache::new("feed", Duration::from_secs(config.feed_ttl_secs))),
            resolved_urls: Arc::new(TtlCache::new("resolved-url", Duration::from_secs(config.resolved_url_ttl_secs))),
            articles: Arc::new(TtlCache::new("article", Duration::from_secs(config.article_ttl_secs))),
            results: Arc::new(TtlCache::new("result", Duration::from_secs(config.result_ttl_secs))),
        }
    }

    pub async fn clear_all(&self) {
        self.feeds.clear().await;
        self.resolved_urls.clear().await;
        self.articles.clear().await;
        self.results.clear().await;
    }
}

impl Default for NewsCaches {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}
