use chrono::{Duration, TimeZone, Utc};
use news_aggregator::config::ScoringConfig;
use news_aggregator::rss_utils::{time, url};
use news_aggregator::{
    select_top, summarize_for_token_limit, Article, FeedParser, FeedSource, Language, Locations, RelevanceScorer,
};
use std::sync::Once;
use tracing::info;

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .try_init()
            .ok();
    });
}

fn article(title: &str, link: &str, age: Duration, language: Language, priority: i32) -> Article {
    let now = Utc.with_ymd_and_hms(2024, 9, 10, 12, 0, 0).unwrap();
    let source = FeedSource::new("Test Source", "https://example.com/rss", language, priority);
    Article::new(title.to_string(), link.to_string(), now - age, String::new(), &source)
}

#[test]
fn korean_festival_outranks_unrelated_news() {
    init_tracing();
    let now = Utc.with_ymd_and_hms(2024, 9, 10, 12, 0, 0).unwrap();
    let scorer = RelevanceScorer::new(&ScoringConfig::default());

    let festival = article("Great Neck Korean Festival", "https://a.example/1", Duration::zero(), Language::Ko, 3);
    let unrelated = article("Random unrelated local news", "https://a.example/2", Duration::days(10), Language::En, 3);

    let festival_score = scorer.score(&festival, now);
    let unrelated_score = scorer.score(&unrelated, now);
    info!("festival={} unrelated={}", festival_score, unrelated_score);

    assert!(festival_score > unrelated_score);
    // 10 + 9 + 8 keywords, 5 recency, 3 language, 4 priority
    assert_eq!(festival_score, 39.0);
}

#[test]
fn scores_are_idempotent_and_never_negative() {
    let now = Utc.with_ymd_and_hms(2024, 9, 10, 12, 0, 0).unwrap();
    let scorer = RelevanceScorer::new(&ScoringConfig::default());

    let samples = [
        article("Sponsored coupon casino advertisement", "https://a.example/1", Duration::days(40), Language::En, 9),
        article("한인회 축제 광고", "https://a.example/2", Duration::hours(2), Language::Ko, 1),
        article("Future dated storm warning", "https://a.example/3", Duration::hours(-5), Language::En, 2),
        article("", "https://a.example/4", Duration::days(3), Language::En, 5),
    ];

    for sample in &samples {
        let first = scorer.score(sample, now);
        assert_eq!(first, scorer.score(sample, now));
        assert!(first >= 0.0, "{} scored {}", sample.title, first);
    }
}

#[test]
fn selection_is_score_descending_with_stable_ties() {
    let scored: Vec<Article> = [3.0, 7.0, 3.0, 7.0, 1.0]
        .iter()
        .enumerate()
        .map(|(i, score)| {
            article(&format!("Story {}", i), &format!("https://a.example/{}", i), Duration::hours(i as i64), Language::En, 3)
                .with_score(*score)
        })
        .collect();

    let top = select_top(scored, 4);
    let titles: Vec<&str> = top.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["Story 1", "Story 3", "Story 0", "Story 2"]);
}

#[test]
fn same_link_different_titles_collapse_to_one() {
    let articles = vec![
        article("Flushing business district grows", "https://qns.com/story", Duration::zero(), Language::En, 2),
        article("Business boom in Flushing", "https://qns.com/story", Duration::zero(), Language::En, 3),
    ];

    let unique = FeedParser::deduplicate_articles(articles);
    assert_eq!(unique.len(), 1);
    assert_eq!(unique[0].title, "Flushing business district grows");
}

#[test]
fn summarizer_stays_within_bound() {
    let text = "The Long Island Korean association met on Tuesday. Members discussed the autumn festival. \
                A new scholarship fund was announced! Who will lead the parade this year? \
                Volunteers are still needed for the food stalls. The meeting ended at nine."
        .repeat(5);

    for max_len in [20, 80, 200, 500] {
        let summary = summarize_for_token_limit(&text, max_len);
        assert!(summary.chars().count() <= max_len + 4, "max_len {} gave {}", max_len, summary.chars().count());
        assert!(summary.ends_with(" ..."));
    }

    assert_eq!(summarize_for_token_limit("Short text.", 500), "Short text.");
}

#[test]
fn locations_accept_strings_and_lists() {
    let from_str = Locations::from("Great Neck, Manhasset ,great neck,");
    assert_eq!(from_str.as_slice(), &["Great Neck".to_string(), "Manhasset".to_string()]);

    let from_list = Locations::from(vec!["Manhasset".to_string(), "Great Neck".to_string()]);
    assert_eq!(from_str.cache_key(), from_list.cache_key());
    assert!(Locations::from("").is_empty());
}

#[test]
fn url_and_time_helpers() {
    assert!(url::is_aggregator_redirect("https://news.google.com/rss/articles/CBMi?oc=5"));
    assert!(!url::is_aggregator_redirect("https://news.google.com/rss/search?q=x"));
    assert_eq!(
        url::unwrap_query_redirect("https://www.google.com/url?q=https://qns.com/a&sa=U"),
        Some("https://qns.com/a".to_string())
    );
    assert!(url::is_valid_feed_url("https://www.newsday.com/rss"));
    assert!(!url::is_valid_feed_url("ftp://www.newsday.com/rss"));

    let now = Utc.with_ymd_and_hms(2024, 9, 10, 12, 0, 0).unwrap();
    assert_eq!(time::age_in_days(now - Duration::hours(36), now), 1.5);
}
