use crate::processing::Category;
use crate::types::{FeedSource, Language, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Environment variables with this prefix override configuration values,
/// e.g. `NEWS_AGG__FETCH__USER_AGENT`.
pub const ENV_PREFIX: &str = "NEWS_AGG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub fetch: FetchConfig,
    pub cache: CacheConfig,
    pub sources: SourcesConfig,
    pub scoring: ScoringConfig,
    pub extraction: ExtractionConfig,
}

impl AggregatorConfig {
    /// Built-in defaults, then the optional file, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&AggregatorConfig::default())?);

        if let Some(path) = path {
            info!("Loading configuration from {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub user_agent: String,
    /// Sent when fetching article pages; some publishers refuse bot agents.
    pub browser_user_agent: String,
    pub feed_timeout_seconds: u64,
    pub head_timeout_seconds: u64,
    pub get_timeout_seconds: u64,
    pub article_timeout_seconds: u64,
    pub max_redirects: usize,
    pub per_host_interval_ms: u64,
    pub max_feed_size_mb: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "LongIslandKorea-NewsAggregator/1.0".to_string(),
            browser_user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            feed_timeout_seconds: 10,
            head_timeout_seconds: 5,
            get_timeout_seconds: 8,
            article_timeout_seconds: 10,
            max_redirects: 10,
            per_host_interval_ms: 250,
            max_feed_size_mb: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub feed_ttl_secs: u64,
    pub resolved_url_ttl_secs: u64,
    pub article_ttl_secs: u64,
    pub result_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            feed_ttl_secs: 30 * 60,
            resolved_url_ttl_secs: 24 * 60 * 60,
            article_ttl_secs: 2 * 60 * 60,
            result_ttl_secs: 60 * 60,
        }
    }
}

/// A search feed parameterized by location. `{query}` in `url_template` is
/// replaced by the url-encoded `query_template`, whose `{location}` is
/// replaced by the location name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchFeedTemplate {
    pub name_template: String,
    pub url_template: String,
    pub query_template: String,
    pub language: Language,
    pub priority: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub default_locations: Vec<String>,
    pub default_feeds: Vec<FeedSource>,
    pub search_feeds: Vec<SearchFeedTemplate>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            default_locations: vec![
                "Great Neck".to_string(),
                "Manhasset".to_string(),
                "Long Island".to_string(),
            ],
            default_feeds: crate::sources::regional::default_feeds(),
            search_feeds: crate::sources::google_news::default_templates(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedKeyword {
    pub keyword: String,
    pub weight: f64,
}

impl WeightedKeyword {
    fn new(keyword: &str, weight: f64) -> Self {
        Self {
            keyword: keyword.to_string(),
            weight,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub category: Category,
    pub pattern: String,
}

impl CategoryRule {
    fn new(category: Category, pattern: &str) -> Self {
        Self {
            category,
            pattern: pattern.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub keywords: Vec<WeightedKeyword>,
    pub exclude_keywords: Vec<String>,
    pub exclude_penalty: f64,
    pub max_selected: usize,
    /// Checked in order; the first match wins. Articles matching none land
    /// in `Category::Other`.
    pub category_rules: Vec<CategoryRule>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
            exclude_keywords: [
                "sponsored",
                "advertisement",
                "advertorial",
                "promo code",
                "coupon",
                "casino",
                "paid content",
                "광고",
                "협찬",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            exclude_penalty: 10.0,
            max_selected: 20,
            category_rules: default_category_rules(),
        }
    }
}

fn default_keywords() -> Vec<WeightedKeyword> {
    vec![
        // locations
        WeightedKeyword::new("great neck", 10.0),
        WeightedKeyword::new("long island", 10.0),
        WeightedKeyword::new("manhasset", 9.0),
        WeightedKeyword::new("jericho", 8.0),
        WeightedKeyword::new("syosset", 8.0),
        WeightedKeyword::new("roslyn", 8.0),
        WeightedKeyword::new("port washington", 7.0),
        WeightedKeyword::new("plainview", 7.0),
        WeightedKeyword::new("hicksville", 7.0),
        WeightedKeyword::new("nassau", 7.0),
        WeightedKeyword::new("suffolk", 6.0),
        WeightedKeyword::new("flushing", 6.0),
        WeightedKeyword::new("bayside", 6.0),
        WeightedKeyword::new("롱아일랜드", 10.0),
        WeightedKeyword::new("그레잇넥", 10.0),
        WeightedKeyword::new("그레이트넥", 10.0),
        WeightedKeyword::new("맨해셋", 9.0),
        WeightedKeyword::new("낫소", 7.0),
        WeightedKeyword::new("플러싱", 6.0),
        // community identity
        WeightedKeyword::new("korean", 9.0),
        WeightedKeyword::new("한인", 10.0),
        WeightedKeyword::new("교민", 8.0),
        WeightedKeyword::new("asian american", 6.0),
        // emergency
        WeightedKeyword::new("emergency", 7.0),
        WeightedKeyword::new("evacuation", 7.0),
        WeightedKeyword::new("storm", 6.0),
        WeightedKeyword::new("flood", 6.0),
        WeightedKeyword::new("power outage", 6.0),
        WeightedKeyword::new("closure", 5.0),
        WeightedKeyword::new("긴급", 7.0),
        // events
        WeightedKeyword::new("festival", 8.0),
        WeightedKeyword::new("celebration", 6.0),
        WeightedKeyword::new("parade", 6.0),
        WeightedKeyword::new("concert", 5.0),
        WeightedKeyword::new("축제", 8.0),
        WeightedKeyword::new("행사", 6.0),
        // everyday life
        WeightedKeyword::new("business", 6.0),
        WeightedKeyword::new("school", 5.0),
        WeightedKeyword::new("restaurant", 5.0),
        WeightedKeyword::new("church", 4.0),
        WeightedKeyword::new("library", 4.0),
    ]
}

fn default_category_rules() -> Vec<CategoryRule> {
    vec![
        CategoryRule::new(
            Category::KoreanCommunity,
            r"한인|교민|한인회|korean[- ]american|korean community|korean (church|association|center|school|festival|restaurant|business|residents?|families|seniors)|koreatown|k-town",
        ),
        CategoryRule::new(Category::Korea, r"korea|한국|seoul|서울|k-pop|kpop|k-drama|hallyu"),
        CategoryRule::new(
            Category::Emergency,
            r"emergency|evacuat|storm|flood|\bfire\b|shooting|crash|warning|\balert|power outage|snow|hurricane|긴급|폭우|폭설|화재|사고",
        ),
        CategoryRule::new(
            Category::Education,
            r"school|student|education|college|university|teacher|campus|학교|교육|학생|대학",
        ),
        CategoryRule::new(
            Category::Business,
            r"business|restaurant|\bstores?\b|\bshop|grand opening|econom|\bjobs?\b|hiring|real estate|비즈니스|업소|경제|부동산",
        ),
        CategoryRule::new(
            Category::Culture,
            r"festival|concert|\barts?\b|museum|cultur|music|\bfilm|exhibit|performance|축제|공연|문화|전시",
        ),
        CategoryRule::new(
            Category::Community,
            r"community|church|volunteer|library|\bparks?\b|neighbor|residents|charity|fundrais|커뮤니티|교회|봉사",
        ),
        CategoryRule::new(
            Category::Politics,
            r"election|mayor|council|senator|congress|governor|legislat|\bvot(e|ers?|ing)\b|politic|선거|의회|정치",
        ),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainSelector {
    pub domain: String,
    pub selector: String,
}

impl DomainSelector {
    fn new(domain: &str, selector: &str) -> Self {
        Self {
            domain: domain.to_string(),
            selector: selector.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub min_readability_chars: usize,
    pub min_selector_chars: usize,
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub resolve_delay_ms: u64,
    pub domain_selectors: Vec<DomainSelector>,
    pub generic_selector: String,
    /// The original URL is appended to this prefix for the last-resort fetch.
    pub cache_mirror_prefix: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_readability_chars: 500,
            min_selector_chars: 200,
            batch_size: 3,
            batch_delay_ms: 1000,
            resolve_delay_ms: 500,
            domain_selectors: vec![
                DomainSelector::new("newsday.com", "div.contentAccess, div[data-testid='article-body'], .article-body"),
                DomainSelector::new("patch.com", "div[class*='HTMLContent'], article"),
                DomainSelector::new("nytimes.com", "section[name='articleBody']"),
                DomainSelector::new("ny1.com", ".article-body, .article__body"),
                DomainSelector::new("longislandpress.com", ".entry-content"),
                DomainSelector::new("liherald.com", ".article-body, #article-body"),
                DomainSelector::new("qns.com", ".entry-content"),
                DomainSelector::new("koreatimes.com", "#print_arti, .article_body"),
                DomainSelector::new("koreadaily.com", "#article_body, .article_body"),
                DomainSelector::new("koreaherald.com", ".news_content, #articleText"),
                DomainSelector::new("yna.co.kr", ".story-news"),
                DomainSelector::new("news.naver.com", "#dic_area, #newsct_article"),
            ],
            generic_selector: "article, main, [role=main]".to_string(),
            cache_mirror_prefix: "https://webcache.googleusercontent.com/search?q=cache:".to_string(),
        }
    }
}

impl ExtractionConfig {
    /// Selector for a host, matching the configured domain or any subdomain.
    pub fn selector_for_host(&self, host: &str) -> Option<&str> {
        let host = host.trim_start_matches("www.");
        self.domain_selectors
            .iter()
            .find(|ds| host == ds.domain || host.ends_with(&format!(".{}", ds.domain)))
            .map(|ds| ds.selector.as_str())
    }
}
