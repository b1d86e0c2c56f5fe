use crate::extractor::summarize_for_token_limit;
use crate::processing::Category;
use crate::types::{AggregationResult, Article};
use tracing::debug;

const MAX_FULL_ARTICLES: usize = 7;
const MAX_SUMMARY_ONLY_ARTICLES: usize = 10;
const FULL_CONTENT_CHARS: usize = 2000;
const DESCRIPTION_CHARS: usize = 300;

const AUTHORING_INSTRUCTIONS: &str = "\
## Instructions
- Write a news briefing for the Korean community of Long Island using only the articles above.
- Put stories that directly affect Korean residents first, followed by emergency and safety notices.
- Give each story two or three sentences and name its source.
- Do not add facts, dates, numbers or quotes that are not in the articles.
- Write in Korean. Keep place names and organization names in English.
";

/// Renders an aggregation as the text block handed to the content
/// generator. Pure and deterministic.
pub struct PromptFormatter;

impl PromptFormatter {
    pub fn format(result: &AggregationResult) -> String {
        let mut prompt = String::new();
        prompt.push_str(&format!(
            "# Local news for Long Island Korean residents ({})\n",
            result.generated_at.format("%Y-%m-%d")
        ));
        prompt.push_str(&format!(
            "{} articles selected from {} collected.\n\n",
            result.selected_articles, result.total_articles
        ));

        if result.articles.is_empty() {
            prompt.push_str("No relevant articles were found.\n\n");
        } else if result.has_full_content {
            Self::compose_full(result, &mut prompt);
        } else {
            Self::compose_by_category(result, &mut prompt);
        }

        prompt.push_str(AUTHORING_INSTRUCTIONS);
        debug!("Formatted prompt of {} chars", prompt.chars().count());
        prompt
    }

    fn compose_full(result: &AggregationResult, prompt: &mut String) {
        let full: Vec<&Article> = result
            .articles
            .iter()
            .filter(|a| a.has_full_content && a.full_content.is_some())
            .take(MAX_FULL_ARTICLES)
            .collect();
        let rest: Vec<&Article> = result
            .articles
            .iter()
            .filter(|a| !full.iter().any(|f| std::ptr::eq(*f, *a)))
            .take(MAX_SUMMARY_ONLY_ARTICLES)
            .collect();
        debug!("Full-content prompt: {} full, {} summary-only", full.len(), rest.len());

        prompt.push_str("## Full articles\n\n");
        for (i, article) in full.iter().enumerate() {
            prompt.push_str(&format!("### {}. {}\n", i + 1, article.title));
            prompt.push_str(&Self::article_meta(article));
            if let Some(byline) = &article.byline {
                prompt.push_str(&format!("Byline: {}\n", byline));
            }
            let content = article.full_content.as_deref().unwrap_or_default();
            prompt.push_str(&format!("\n{}\n\n", summarize_for_token_limit(content, FULL_CONTENT_CHARS)));
        }

        if !rest.is_empty() {
            prompt.push_str("## Additional articles (summary only)\n\n");
            for (i, article) in rest.iter().enumerate() {
                Self::push_summary(prompt, i + 1, article);
            }
        }
    }

    fn compose_by_category(result: &AggregationResult, prompt: &mut String) {
        for category in Category::ALL {
            let Some(articles) = result.categorized.get(&category).filter(|a| !a.is_empty()) else {
                continue;
            };

            prompt.push_str(&format!("## {}\n\n", category.label()));
            for (i, article) in articles.iter().take(category.prompt_cap()).enumerate() {
                Self::push_summary(prompt, i + 1, article);
            }
        }
    }

    fn push_summary(prompt: &mut String, index: usize, article: &Article) {
        prompt.push_str(&format!("{}. {}\n", index, article.title));
        prompt.push_str(&Self::article_meta(article));
        if !article.description.is_empty() {
            prompt.push_str(&format!(
                "{}\n",
                summarize_for_token_limit(&article.description, DESCRIPTION_CHARS)
            ));
        }
        prompt.push('\n');
    }

    fn article_meta(article: &Article) -> String {
        format!(
            "Source: {} | Published: {} | Relevance: {:.1}\nLink: {}\n",
            article.source,
            article.pub_date.format("%Y-%m-%d %H:%M UTC"),
            article.relevance_score,
            article.link
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExtractedArticle, FeedSource, Language};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn article(title: &str) -> Article {
        let source = FeedSource::new("Korea Daily NY", "https://example.com/rss", Language::Ko, 1);
        let date = Utc.with_ymd_and_hms(2024, 9, 10, 12, 0, 0).unwrap();
        Article::new(title.to_string(), format!("https://example.com/{}", title.replace(' ', "-")), date, "Description.".into(), &source)
            .with_score(12.0)
    }

    fn result(articles: Vec<Article>, categorized: BTreeMap<Category, Vec<Article>>) -> AggregationResult {
        AggregationResult {
            run_id: Uuid::nil(),
            total_articles: 40,
            selected_articles: articles.len(),
            has_full_content: articles.iter().any(|a| a.has_full_content),
            categorized,
            articles,
            feeds_attempted: 12,
            feed_failures: vec![],
            generated_at: Utc.with_ymd_and_hms(2024, 9, 10, 13, 0, 0).unwrap(),
        }
    }

    #[test]
    fn category_mode_caps_and_skips_empty_buckets() {
        let korea: Vec<Article> = (0..4).map(|i| article(&format!("Seoul story {}", i))).collect();
        let mut categorized: BTreeMap<Category, Vec<Article>> = Category::ALL.iter().map(|c| (*c, vec![])).collect();
        categorized.insert(Category::Korea, korea.clone());

        let prompt = PromptFormatter::format(&result(korea, categorized));

        assert!(prompt.contains("## Korea\n"));
        assert!(prompt.contains("Seoul story 1"));
        assert!(!prompt.contains("Seoul story 2"));
        assert!(!prompt.contains("## Education"));
        assert!(prompt.ends_with(AUTHORING_INSTRUCTIONS));
    }

    #[test]
    fn full_mode_lists_extracted_then_summary_only() {
        let extracted = ExtractedArticle {
            title: "Festival".into(),
            content: "The festival drew thousands. ".repeat(200),
            byline: Some("Jane Kim".into()),
            length: 5800,
            site_name: "qns.com".into(),
            url: "https://qns.com/festival".into(),
            extracted_at: Utc::now(),
        };
        let articles = vec![article("Korean Festival").with_extracted(&extracted), article("School news")];
        let prompt = PromptFormatter::format(&result(articles, BTreeMap::new()));

        let full_at = prompt.find("## Full articles").unwrap();
        let rest_at = prompt.find("## Additional articles").unwrap();
        assert!(full_at < rest_at);
        assert!(prompt.contains("Byline: Jane Kim"));
        assert!(prompt.contains("Link: https://qns.com/festival"));
        assert!(prompt[rest_at..].contains("School news"));
        assert!(prompt.contains(" ..."));
    }

    #[test]
    fn output_is_deterministic() {
        let r = result(vec![], BTreeMap::new());
        assert_eq!(PromptFormatter::format(&r), PromptFormatter::format(&r));
        assert!(PromptFormatter::format(&r).contains("No relevant articles"));
    }
}
