use crate::cache::TtlCache;
use crate::config::ExtractionConfig;
use crate::fetcher::{PageFetcher, RequestKind};
use crate::html;
use crate::parser::UNTITLED;
use crate::resolver::UrlResolver;
use crate::rss_utils::url as url_utils;
use crate::types::ExtractedArticle;
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const ELLIPSIS: &str = " ...";
const EDGE_SHARE: f64 = 0.3;

/// Fetches article pages and pulls out their main text.
pub struct ArticleExtractor {
    fetcher: Arc<dyn PageFetcher>,
    resolver: Arc<UrlResolver>,
    cache: Arc<TtlCache<ExtractedArticle>>,
    config: ExtractionConfig,
}

impl ArticleExtractor {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        resolver: Arc<UrlResolver>,
        cache: Arc<TtlCache<ExtractedArticle>>,
        config: ExtractionConfig,
    ) -> Self {
        Self {
            fetcher,
            resolver,
            cache,
            config,
        }
    }

    /// Full text of the article behind `url`, or `None` when the page could
    /// not be fetched or had no readable content. Never fails.
    pub async fn extract_article(&self, url: &str) -> Option<ExtractedArticle> {
        let target = if url_utils::is_aggregator_redirect(url) {
            self.resolver.resolve_url(url).await
        } else {
            url.to_string()
        };

        if let Some(cached) = self.cache.get(&target).await {
            return Some(cached);
        }

        let mirror = format!("{}{}", self.config.cache_mirror_prefix, target);
        let attempts = [target.as_str(), mirror.as_str()];

        for (attempt, fetch_url) in attempts.iter().enumerate() {
            if attempt > 0 {
                debug!("Retrying {} through the cache mirror", target);
            }

            let page = match self.fetcher.get(fetch_url, RequestKind::Article).await {
                Ok(page) => page,
                Err(e) => {
                    debug!("Fetching {} failed: {}", fetch_url, e);
                    continue;
                }
            };

            if let Some(article) = self.extract_from_html(&page.body, &target) {
                info!("Extracted {} chars from {}", article.length, target);
                self.cache.insert(target.clone(), article.clone()).await;
                return Some(article);
            }
        }

        warn!("No readable content at {}", target);
        None
    }

    /// Extract in chunks of `batch_size`, pausing between chunks. The output
    /// lines up with `urls`.
    pub async fn extract_each(&self, urls: &[String]) -> Vec<Option<ExtractedArticle>> {
        let chunk_size = self.config.batch_size.max(1);
        let delay = Duration::from_millis(self.config.batch_delay_ms);
        let mut results = Vec::with_capacity(urls.len());

        for (i, chunk) in urls.chunks(chunk_size).enumerate() {
            if i > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            results.extend(join_all(chunk.iter().map(|url| self.extract_article(url))).await);
        }

        results
    }

    /// Successful extractions only.
    pub async fn extract_batch(&self, urls: &[String]) -> Vec<ExtractedArticle> {
        let results: Vec<ExtractedArticle> = self.extract_each(urls).await.into_iter().flatten().collect();
        info!("Extracted {}/{} articles", results.len(), urls.len());
        results
    }

    /// `article_url` is what the result reports, even when the HTML came from
    /// the mirror.
    fn extract_from_html(&self, body: &str, article_url: &str) -> Option<ExtractedArticle> {
        let parsed_url = Url::parse(article_url).ok()?;
        let host = parsed_url.host_str().unwrap_or_default().to_string();

        let readable = match html::readability_extract(body, &parsed_url) {
            Ok(readable) => Some(readable),
            Err(e) => {
                debug!("{}", e);
                None
            }
        };

        let readable_title = readable
            .as_ref()
            .map(|r| r.title.clone())
            .filter(|t| !t.is_empty());

        let content = readable
            .map(|r| r.text)
            .filter(|text| text.chars().count() >= self.config.min_readability_chars)
            .or_else(|| self.selector_fallback(body, &host))?;

        let metadata = html::page_metadata(body);
        let title = readable_title
            .or(metadata.title)
            .unwrap_or_else(|| UNTITLED.to_string());

        Some(ExtractedArticle {
            title,
            length: content.chars().count(),
            content,
            byline: metadata.byline,
            site_name: metadata.site_name.unwrap_or(host),
            url: article_url.to_string(),
            extracted_at: Utc::now(),
        })
    }

    fn selector_fallback(&self, body: &str, host: &str) -> Option<String> {
        let mut selectors = Vec::with_capacity(2);
        if let Some(domain_selector) = self.config.selector_for_host(host) {
            selectors.push(domain_selector);
        }
        selectors.push(self.config.generic_selector.as_str());

        selectors
            .into_iter()
            .filter_map(|css| html::selector_text(body, css))
            .find(|text| text.chars().count() >= self.config.min_selector_chars)
    }
}

/// Shorten `text` to roughly `max_len` chars, keeping the opening and
/// closing sentences and as much of the middle as fits. The result never
/// exceeds `max_len + 4` chars.
pub fn summarize_for_token_limit(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }

    let sentences = split_sentences(text);
    let first = sentences.first().map(String::as_str).unwrap_or(text);
    if sentences.is_empty() || first.chars().count() > max_len {
        let truncated: String = first.chars().take(max_len).collect();
        return format!("{}{}", truncated.trim_end(), ELLIPSIS);
    }

    // opening and closing sentences alternate so both ends survive a tight
    // budget; the middle only backfills
    let count = sentences.len();
    let edge = ((count as f64 * EDGE_SHARE).ceil() as usize).clamp(1, count);
    let head: Vec<usize> = (0..edge).collect();
    let tail: Vec<usize> = (count.saturating_sub(edge)..count).rev().collect();

    let mut order = Vec::with_capacity(count);
    for (h, t) in head.iter().zip(&tail) {
        order.push(*h);
        order.push(*t);
    }
    order.extend(edge..count.saturating_sub(edge));

    let mut chosen = vec![false; count];
    let mut used = 0usize;
    let mut picked = 0usize;

    for i in order {
        if chosen[i] {
            continue;
        }
        let cost = sentences[i].chars().count() + usize::from(picked > 0);
        if used + cost <= max_len {
            chosen[i] = true;
            used += cost;
            picked += 1;
        }
    }

    let kept: Vec<&str> = sentences
        .iter()
        .zip(chosen)
        .filter(|(_, keep)| *keep)
        .map(|(s, _)| s.as_str())
        .collect();

    format!("{}{}", kept.join(" "), ELLIPSIS)
}

/// Sentences end at `.`, `!` or `?`; trailing text without a terminator
/// counts as a sentence too.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            let sentence = current.split_whitespace().collect::<Vec<_>>().join(" ");
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            current.clear();
        }
    }

    let rest = current.split_whitespace().collect::<Vec<_>>().join(" ");
    if !rest.is_empty() {
        sentences.push(rest);
    }

    sentences
}
