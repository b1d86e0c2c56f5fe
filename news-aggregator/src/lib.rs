pub mod aggregator;
pub mod cache;
pub mod config;
pub mod digest;
pub mod extractor;
pub mod feed_manager;
pub mod fetcher;
pub mod html;
pub mod parser;
pub mod processing;
pub mod resolver;
pub mod rss_utils;
pub mod sources;
pub mod types;

pub use crate::aggregator::NewsAggregator;
pub use crate::cache::{NewsCaches, TtlCache};
pub use crate::config::AggregatorConfig;
pub use crate::digest::PromptFormatter;
pub use crate::extractor::{summarize_for_token_limit, ArticleExtractor};
pub use crate::feed_manager::{FeedBatch, FeedManager};
pub use crate::fetcher::{Fetcher, MockPageFetcher, PageFetcher, RequestKind};
pub use crate::parser::FeedParser;
pub use crate::processing::{select_top, Categorizer, Category, RelevanceScorer};
pub use crate::resolver::UrlResolver;
pub use crate::types::*;
