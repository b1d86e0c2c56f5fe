use crate::config::FetchConfig;
use crate::types::{AggregatorError, Result};
use async_trait::async_trait;
use reqwest::{header, redirect, Client, StatusCode};
use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

/// What a request is for. Decides the timeout and the User-Agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Feed,
    Resolve,
    Article,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeadResponse {
    pub status: u16,
    pub location: Option<String>,
}

impl HeadResponse {
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }
}

/// A successful GET after redirects were followed.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    /// URL of the last response in the redirect chain.
    pub url: String,
    pub status: u16,
    pub body: String,
}

/// Outbound HTTP used by every pipeline stage.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// HEAD without following redirects.
    async fn head(&self, url: &str) -> Result<HeadResponse>;

    /// GET following redirects. Non-2xx statuses are errors.
    async fn get(&self, url: &str, kind: RequestKind) -> Result<FetchedPage>;
}

/// Keeps a minimum gap between request starts to the same host. Slots are
/// reserved under the lock and slept outside it, so other hosts never wait.
pub struct HostThrottle {
    min_interval: Duration,
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl HostThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    pub async fn wait(&self, url: &str) -> Result<()> {
        if self.min_interval.is_zero() {
            return Ok(());
        }

        let parsed_url = Url::parse(url)?;
        let host = parsed_url.host_str().unwrap_or("").to_string();

        let wait_time = {
            let mut slots = self.next_slot.lock().await;
            let now = Instant::now();
            // hosts whose next slot has already passed need no entry
            slots.retain(|_, next| *next > now);
            let slot = slots.get(&host).copied().unwrap_or(now);
            slots.insert(host.clone(), slot + self.min_interval);
            slot.saturating_duration_since(now)
        };

        if !wait_time.is_zero() {
            debug!("Throttling {}: waiting {:?}", host, wait_time);
            tokio::time::sleep(wait_time).await;
        }

        Ok(())
    }
}

/// reqwest-backed [`PageFetcher`].
pub struct Fetcher {
    client: Client,
    no_redirect_client: Client,
    config: FetchConfig,
    throttle: HostThrottle,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.article_timeout_seconds.max(config.feed_timeout_seconds)))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(redirect::Policy::limited(config.max_redirects))
            .build()?;

        let no_redirect_client = Client::builder()
            .user_agent(&config.browser_user_agent)
            .timeout(Duration::from_secs(config.head_timeout_seconds))
            .redirect(redirect::Policy::none())
            .build()?;

        let throttle = HostThrottle::new(Duration::from_millis(config.per_host_interval_ms));

        Ok(Self {
            client,
            no_redirect_client,
            config,
            throttle,
        })
    }

    fn timeout_for(&self, kind: RequestKind) -> Duration {
        Duration::from_secs(match kind {
            RequestKind::Feed => self.config.feed_timeout_seconds,
            RequestKind::Resolve => self.config.get_timeout_seconds,
            RequestKind::Article => self.config.article_timeout_seconds,
        })
    }

    fn user_agent_for(&self, kind: RequestKind) -> &str {
        match kind {
            RequestKind::Feed => &self.config.user_agent,
            RequestKind::Resolve | RequestKind::Article => &self.config.browser_user_agent,
        }
    }
}

#[async_trait]
impl PageFetcher for Fetcher {
    async fn head(&self, url: &str) -> Result<HeadResponse> {
        self.throttle.wait(url).await?;
        debug!("HEAD {}", url);

        let response = self.no_redirect_client.head(url).send().await?;
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        Ok(HeadResponse {
            status: response.status().as_u16(),
            location,
        })
    }

    async fn get(&self, url: &str, kind: RequestKind) -> Result<FetchedPage> {
        self.throttle.wait(url).await?;
        debug!("GET {} ({:?})", url, kind);

        let response = self
            .client
            .get(url)
            .timeout(self.timeout_for(kind))
            .header(header::USER_AGENT, self.user_agent_for(kind))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AggregatorError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        if kind == RequestKind::Feed {
            if let Some(content_length) = response.content_length() {
                let size_mb = content_length as usize / (1024 * 1024);
                if size_mb > self.config.max_feed_size_mb {
                    return Err(AggregatorError::General(format!("Feed too large: {}MB", size_mb)));
                }
            }
        }

        let final_url = response.url().to_string();
        let body = response.text().await?;

        Ok(FetchedPage {
            url: final_url,
            status: status.as_u16(),
            body,
        })
    }
}

/// Canned-response fetcher for development and tests. Any URL without a
/// registered response fails as if the connection was refused.
#[derive(Default)]
pub struct MockPageFetcher {
    pages: HashMap<String, FetchedPage>,
    heads: HashMap<String, HeadResponse>,
    statuses: HashMap<String, u16>,
    requests: StdMutex<Vec<String>>,
}

impl MockPageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, body: &str) -> Self {
        self.with_redirected_page(url, url, body)
    }

    /// GET `url` lands on `final_url` after redirects.
    pub fn with_redirected_page(mut self, url: &str, final_url: &str, body: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            FetchedPage {
                url: final_url.to_string(),
                status: StatusCode::OK.as_u16(),
                body: body.to_string(),
            },
        );
        self
    }

    pub fn with_head(mut self, url: &str, status: u16, location: Option<&str>) -> Self {
        self.heads.insert(
            url.to_string(),
            HeadResponse {
                status,
                location: location.map(|s| s.to_string()),
            },
        );
        self
    }

    /// GET `url` answers with a non-success status.
    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.statuses.insert(url.to_string(), status);
        self
    }

    /// Every request seen so far, as `"HEAD <url>"` or `"GET <url>"`.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn request_count(&self, method: &str, url: &str) -> usize {
        let needle = format!("{} {}", method, url);
        self.requests().iter().filter(|r| **r == needle).count()
    }

    fn record(&self, method: &str, url: &str) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(format!("{} {}", method, url));
        }
    }
}

#[async_trait]
impl PageFetcher for MockPageFetcher {
    async fn head(&self, url: &str) -> Result<HeadResponse> {
        self.record("HEAD", url);
        self.heads
            .get(url)
            .cloned()
            .ok_or_else(|| AggregatorError::General(format!("connection refused: {}", url)))
    }

    async fn get(&self, url: &str, _kind: RequestKind) -> Result<FetchedPage> {
        self.record("GET", url);
        if let Some(status) = self.statuses.get(url) {
            return Err(AggregatorError::Status {
                status: *status,
                url: url.to_string(),
            });
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| AggregatorError::General(format!("connection refused: {}", url)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn throttle_spaces_requests_to_same_host() {
        let throttle = HostThrottle::new(Duration::from_millis(80));
        let start = Instant::now();

        throttle.wait("https://example.com/a").await.unwrap();
        throttle.wait("https://example.com/b").await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn throttle_does_not_delay_other_hosts() {
        let throttle = HostThrottle::new(Duration::from_millis(500));
        let start = Instant::now();

        throttle.wait("https://one.example.com/").await.unwrap();
        throttle.wait("https://two.example.com/").await.unwrap();

        assert!(start.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn throttle_forgets_hosts_once_their_slot_passes() {
        let throttle = HostThrottle::new(Duration::from_millis(20));

        for host in ["a", "b", "c"] {
            throttle.wait(&format!("https://{}.example.com/", host)).await.unwrap();
        }
        assert_eq!(throttle.next_slot.lock().await.len(), 3);

        tokio::time::sleep(Duration::from_millis(40)).await;
        throttle.wait("https://d.example.com/").await.unwrap();
        assert_eq!(throttle.next_slot.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn mock_records_requests_and_refuses_unknown_urls() {
        let mock = MockPageFetcher::new()
            .with_page("https://example.com/", "<html></html>")
            .with_status("https://example.com/missing", 404);

        assert!(mock.get("https://example.com/", RequestKind::Article).await.is_ok());
        assert!(matches!(
            mock.get("https://example.com/missing", RequestKind::Article).await,
            Err(AggregatorError::Status { status: 404, .. })
        ));
        assert!(mock.head("https://nowhere.example/").await.is_err());
        assert_eq!(mock.request_count("GET", "https://example.com/"), 1);
        assert_eq!(mock.requests().len(), 3);
    }
}
