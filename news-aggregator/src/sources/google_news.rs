use crate::config::SearchFeedTemplate;
use crate::rss_utils::url::encode_query;
use crate::types::{FeedSource, Language};

const GOOGLE_NEWS_EN: &str = "https://news.google.com/rss/search?q={query}&hl=en-US&gl=US&ceid=US:en";
const GOOGLE_NEWS_KO: &str = "https://news.google.com/rss/search?q={query}&hl=ko&gl=KR&ceid=KR:ko";

/// Google News search feeds, one English and one Korean query per location
/// plus a plain local-news query.
pub fn default_templates() -> Vec<SearchFeedTemplate> {
    vec![
        SearchFeedTemplate {
            name_template: "Google News: {location} Korean".to_string(),
            url_template: GOOGLE_NEWS_EN.to_string(),
            query_template: "\"{location}\" Korean".to_string(),
            language: Language::En,
            priority: 2,
        },
        SearchFeedTemplate {
            name_template: "Google News KR: {location} 한인".to_string(),
            url_template: GOOGLE_NEWS_KO.to_string(),
            query_template: "{location} 한인".to_string(),
            language: Language::Ko,
            priority: 1,
        },
        SearchFeedTemplate {
            name_template: "Google News: {location}".to_string(),
            url_template: GOOGLE_NEWS_EN.to_string(),
            query_template: "\"{location}\" when:7d".to_string(),
            language: Language::En,
            priority: 3,
        },
    ]
}

impl SearchFeedTemplate {
    pub fn build(&self, location: &str) -> FeedSource {
        let query = self.query_template.replace("{location}", location);
        FeedSource::new(
            self.name_template.replace("{location}", location),
            self.url_template.replace("{query}", &encode_query(&query)),
            self.language,
            self.priority,
        )
    }
}

/// Expand every template for every location, in location order.
pub fn search_feeds_for(templates: &[SearchFeedTemplate], locations: &[String]) -> Vec<FeedSource> {
    locations
        .iter()
        .flat_map(|location| templates.iter().map(move |t| t.build(location)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_encoded_search_urls() {
        let feeds = search_feeds_for(&default_templates(), &["Great Neck".to_string()]);
        assert_eq!(feeds.len(), 3);

        let english = &feeds[0];
        assert_eq!(english.name, "Google News: Great Neck Korean");
        assert_eq!(
            english.url,
            "https://news.google.com/rss/search?q=%22Great+Neck%22+Korean&hl=en-US&gl=US&ceid=US:en"
        );
        assert_eq!(english.language, Language::En);

        let korean = &feeds[1];
        assert_eq!(korean.language, Language::Ko);
        assert!(korean.url.contains("%ED%95%9C%EC%9D%B8"));
        assert!(!korean.direct_access);
    }
}
