use crate::cache::TtlCache;
use crate::fetcher::{PageFetcher, RequestKind};
use crate::html;
use crate::rss_utils::url as url_utils;
use crate::types::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Finds where indirect article links really point.
pub struct UrlResolver {
    fetcher: Arc<dyn PageFetcher>,
    cache: Arc<TtlCache<String>>,
    batch_delay: Duration,
}

impl UrlResolver {
    pub fn new(fetcher: Arc<dyn PageFetcher>, cache: Arc<TtlCache<String>>, batch_delay: Duration) -> Self {
        Self {
            fetcher,
            cache,
            batch_delay,
        }
    }

    /// Best guess at the destination of `url`. Never fails: when nothing
    /// works the input comes back unchanged. Links that are not aggregator
    /// redirects are returned without touching the network.
    pub async fn resolve_url(&self, url: &str) -> String {
        if !url_utils::is_valid_feed_url(url) || !url_utils::is_aggregator_redirect(url) {
            return url.to_string();
        }

        if let Some(cached) = self.cache.get(url).await {
            return cached;
        }

        let resolved = match url_utils::unwrap_query_redirect(url) {
            Some(target) => Some(target),
            None => match self.try_resolve(url).await {
                Ok(found) => found,
                Err(e) => {
                    debug!("Resolution of {} failed: {}", url, e);
                    None
                }
            },
        };

        match resolved {
            Some(target) => {
                info!("Resolved {} -> {}", url, target);
                self.cache.insert(url, target.clone()).await;
                target
            }
            None => url.to_string(),
        }
    }

    /// Resolve one after another with a fixed pause between requests.
    pub async fn resolve_batch(&self, urls: &[String]) -> Vec<String> {
        let mut resolved = Vec::with_capacity(urls.len());
        for (i, url) in urls.iter().enumerate() {
            if i > 0 && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }
            resolved.push(self.resolve_url(url).await);
        }
        resolved
    }

    async fn try_resolve(&self, url: &str) -> Result<Option<String>> {
        let accept = |candidate: &str| candidate != url && !url_utils::is_aggregator_redirect(candidate);

        match self.fetcher.head(url).await {
            Ok(head) if head.is_redirect() => {
                if let Some(target) = head.location.as_deref().and_then(|loc| url_utils::absolutize(url, loc)) {
                    if accept(target.as_str()) {
                        return Ok(Some(target));
                    }
                }
            }
            Ok(head) => debug!("HEAD {} answered {}", url, head.status),
            Err(e) => debug!("HEAD {} failed: {}", url, e),
        }

        let page = self.fetcher.get(url, RequestKind::Resolve).await?;
        if accept(page.url.as_str()) {
            return Ok(Some(page.url));
        }

        if let Some(canonical) = html::canonical_link(&page.body, &page.url) {
            if accept(canonical.as_str()) {
                return Ok(Some(canonical));
            }
        }

        Ok(html::meta_refresh_target(&page.body, &page.url).filter(|t| accept(t.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::MockPageFetcher;

    const GOOGLE: &str = "https://news.google.com/rss/articles/CBMiXYZ?oc=5";

    fn resolver(mock: MockPageFetcher) -> (UrlResolver, Arc<MockPageFetcher>) {
        let mock = Arc::new(mock);
        let resolver = UrlResolver::new(
            mock.clone(),
            Arc::new(TtlCache::new("resolved-url", Duration::from_secs(60))),
            Duration::ZERO,
        );
        (resolver, mock)
    }

    #[tokio::test]
    async fn uses_head_location_and_caches_it() {
        let (resolver, mock) = resolver(
            MockPageFetcher::new().with_head(GOOGLE, 302, Some("https://www.newsday.com/story")),
        );

        assert_eq!(resolver.resolve_url(GOOGLE).await, "https://www.newsday.com/story");
        assert_eq!(resolver.resolve_url(GOOGLE).await, "https://www.newsday.com/story");
        assert_eq!(mock.request_count("HEAD", GOOGLE), 1);
    }

    #[tokio::test]
    async fn falls_back_to_get_final_url() {
        let (resolver, _) = resolver(
            MockPageFetcher::new()
                .with_head(GOOGLE, 200, None)
                .with_redirected_page(GOOGLE, "https://qns.com/story", "<html></html>"),
        );
        assert_eq!(resolver.resolve_url(GOOGLE).await, "https://qns.com/story");
    }

    #[tokio::test]
    async fn falls_back_to_canonical_then_meta_refresh() {
        let canonical = r#"<html><head><link rel="canonical" href="https://liherald.com/a"></head></html>"#;
        let (resolver, _) = resolver(MockPageFetcher::new().with_page(GOOGLE, canonical));
        assert_eq!(resolver.resolve_url(GOOGLE).await, "https://liherald.com/a");

        let refresh = r#"<html><head><meta http-equiv="refresh" content="0;url=https://liherald.com/b"></head></html>"#;
        let (resolver, _) = self::resolver(MockPageFetcher::new().with_page(GOOGLE, refresh));
        assert_eq!(resolver.resolve_url(GOOGLE).await, "https://liherald.com/b");
    }

    #[tokio::test]
    async fn unwraps_google_url_wrappers_without_network() {
        let wrapped = "https://www.google.com/url?url=https%3A%2F%2Fqns.com%2Fx";
        let (resolver, mock) = resolver(MockPageFetcher::new());
        assert_eq!(resolver.resolve_url(wrapped).await, "https://qns.com/x");
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn publisher_links_pass_through() {
        let (resolver, mock) = resolver(MockPageFetcher::new());
        assert_eq!(resolver.resolve_url("https://qns.com/story").await, "https://qns.com/story");
        assert_eq!(resolver.resolve_url("not a url").await, "not a url");
        assert!(mock.requests().is_empty());
    }
}
