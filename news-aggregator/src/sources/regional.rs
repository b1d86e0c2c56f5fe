use crate::types::{FeedSource, Language};

/// Fixed regional outlets read on every run, whatever the locations.
pub fn default_feeds() -> Vec<FeedSource> {
    vec![
        FeedSource::new(
            "Korea Times New York",
            "https://www.koreatimes.com/rss/ny",
            Language::Ko,
            1,
        )
        .with_direct_access(true),
        FeedSource::new(
            "Korea Daily New York",
            "https://www.koreadaily.com/rss/ny",
            Language::Ko,
            1,
        )
        .with_direct_access(true),
        FeedSource::new(
            "Patch Great Neck",
            "https://patch.com/feeds/new-york/greatneck",
            Language::En,
            2,
        )
        .with_direct_access(true),
        FeedSource::new(
            "Patch Manhasset",
            "https://patch.com/feeds/new-york/manhasset",
            Language::En,
            2,
        )
        .with_direct_access(true),
        FeedSource::new(
            "Long Island Press",
            "https://www.longislandpress.com/feed/",
            Language::En,
            3,
        )
        .with_direct_access(true),
    ]
}
