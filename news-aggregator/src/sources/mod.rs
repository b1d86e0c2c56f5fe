pub mod google_news;
pub mod regional;

pub use google_news::search_feeds_for;
pub use regional::default_feeds;
