/// News-feed specific helper functions

/// URL utilities for feeds and article links
pub mod url {
    use url::Url;

    const AGGREGATOR_PATH_PREFIXES: [&str; 3] = ["/rss/articles/", "/articles/", "/read/"];

    /// Validate feed URL format
    pub fn is_valid_feed_url(url_str: &str) -> bool {
        if let Ok(url) = Url::parse(url_str) {
            url.scheme() == "http" || url.scheme() == "https"
        } else {
            false
        }
    }

    /// True for news-aggregator links that only redirect to the real article.
    pub fn is_aggregator_redirect(url_str: &str) -> bool {
        let Ok(url) = Url::parse(url_str) else {
            return false;
        };
        let host = url.host_str().unwrap_or("");

        if host == "news.google.com" {
            return AGGREGATOR_PATH_PREFIXES.iter().any(|p| url.path().starts_with(p));
        }

        is_google_url_wrapper(&url)
    }

    fn is_google_url_wrapper(url: &Url) -> bool {
        let host = url.host_str().unwrap_or("");
        (host == "google.com" || host == "www.google.com") && url.path() == "/url"
    }

    /// The destination carried in a `google.com/url?url=...` wrapper, if any.
    pub fn unwrap_query_redirect(url_str: &str) -> Option<String> {
        let url = Url::parse(url_str).ok()?;
        if !is_google_url_wrapper(&url) {
            return None;
        }
        url.query_pairs()
            .find(|(k, _)| k == "url" || k == "q")
            .map(|(_, v)| v.into_owned())
            .filter(|v| is_valid_feed_url(v))
    }

    /// Resolve `href` relative to `base`, returning an absolute http(s) URL.
    pub fn absolutize(base: &str, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }
        let joined = match Url::parse(href) {
            Ok(url) => url,
            Err(_) => Url::parse(base).ok()?.join(href).ok()?,
        };
        if joined.scheme() == "http" || joined.scheme() == "https" {
            Some(joined.to_string())
        } else {
            None
        }
    }

    /// Percent-encode a search query for use in a query string.
    pub fn encode_query(query: &str) -> String {
        url::form_urlencoded::byte_serialize(query.as_bytes()).collect()
    }
}

/// Time utilities for article ages
pub mod time {
    use chrono::{DateTime, Utc};

    const MS_PER_DAY: f64 = 86_400_000.0;

    /// Fractional days between `published` and `now`; negative for future dates.
    pub fn age_in_days(published: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        now.signed_duration_since(published).num_milliseconds() as f64 / MS_PER_DAY
    }
}

/// Feed text utilities
pub mod feed {
    use scraper::Html;

    /// Plain text of an HTML fragment with whitespace collapsed.
    pub fn extract_text_from_html(html: &str) -> String {
        if !html.contains('<') && !html.contains('&') {
            return collapse_whitespace(html);
        }
        let fragment = Html::parse_fragment(html);
        let text: Vec<&str> = fragment.root_element().text().collect();
        collapse_whitespace(&text.join(" "))
    }

    pub fn collapse_whitespace(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}
