//! HTML inspection helpers shared by the URL resolver and the article
//! extractor. Everything here is synchronous: parsed documents are not
//! `Send` and must not live across an `.await`.

use crate::rss_utils::url::absolutize;
use crate::types::{AggregatorError, Result};
use scraper::node::Element;
use scraper::{ElementRef, Html, Node, Selector};
use std::io::Cursor;
use tracing::debug;
use url::Url;

const BLOCK_TAGS: [&str; 14] = [
    "p", "div", "br", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "section",
];

const SKIPPED_TAGS: [&str; 13] = [
    "script", "style", "nav", "aside", "footer", "header", "form", "iframe", "noscript", "button", "svg",
    "template", "select",
];

const BOILERPLATE_MARKERS: [&str; 10] = [
    "advert", "comment", "share", "social", "related", "newsletter", "sponsor", "promo", "subscribe", "recommend",
];

/// Main text found by the readability pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadableContent {
    pub title: String,
    pub text: String,
}

/// Page-level metadata used to fill in an extracted article.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub byline: Option<String>,
    pub site_name: Option<String>,
}

fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(s) => Some(s),
        Err(e) => {
            debug!("Invalid selector {:?}: {:?}", css, e);
            None
        }
    }
}

fn first_attr(document: &Html, css: &str, attr: &str) -> Option<String> {
    let sel = selector(css)?;
    document
        .select(&sel)
        .filter_map(|el| el.value().attr(attr))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

fn first_text(document: &Html, css: &str) -> Option<String> {
    let sel = selector(css)?;
    document
        .select(&sel)
        .map(|el| normalize_text(&el.text().collect::<Vec<_>>().join(" ")))
        .find(|t| !t.is_empty())
}

/// `<link rel="canonical">` target, made absolute against `base`.
pub fn canonical_link(html: &str, base: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let href = first_attr(&document, "link[rel='canonical']", "href")?;
    absolutize(base, &href)
}

/// Target of `<meta http-equiv="refresh" content="0; url=...">`.
pub fn meta_refresh_target(html: &str, base: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let sel = selector("meta[http-equiv]")?;
    let content = document
        .select(&sel)
        .find(|el| {
            el.value()
                .attr("http-equiv")
                .map(|v| v.eq_ignore_ascii_case("refresh"))
                .unwrap_or(false)
        })?
        .value()
        .attr("content")?;

    parse_refresh_content(content).and_then(|target| absolutize(base, &target))
}

fn parse_refresh_content(content: &str) -> Option<String> {
    let (_, rest) = content.split_once(';')?;
    let rest = rest.trim();
    match rest.get(..3) {
        Some(prefix) if prefix.eq_ignore_ascii_case("url") => {}
        _ => return None,
    }
    let target = rest[3..].trim_start().strip_prefix('=')?.trim();
    let target = target.trim_matches(|c| c == '\'' || c == '"').trim();
    if target.is_empty() {
        None
    } else {
        Some(target.to_string())
    }
}

pub fn page_metadata(html: &str) -> PageMetadata {
    let document = Html::parse_document(html);

    let title = first_attr(&document, "meta[property='og:title']", "content")
        .or_else(|| first_text(&document, "title"));

    let byline = first_attr(&document, "meta[name='author']", "content")
        .or_else(|| first_text(&document, "[rel='author']"))
        .or_else(|| first_text(&document, ".byline"));

    let site_name = first_attr(&document, "meta[property='og:site_name']", "content");

    PageMetadata { title, byline, site_name }
}

/// Generic readability pass over a whole page.
pub fn readability_extract(html: &str, url: &Url) -> Result<ReadableContent> {
    let mut reader = Cursor::new(html.as_bytes());
    let product = readability::extractor::extract(&mut reader, url)
        .map_err(|e| AggregatorError::Extraction(format!("Readability extract error: {:?}", e)))?;

    // With no scoring block readability hands back the whole document.
    if serializes_document_root(&product.content) {
        return Err(AggregatorError::Extraction(format!("No main content block found on {}", url)));
    }

    Ok(ReadableContent {
        title: normalize_text(&product.title),
        text: normalize_text(&product.text),
    })
}

fn serializes_document_root(content: &str) -> bool {
    let head: String = content.trim_start().chars().take(9).collect::<String>().to_lowercase();
    head.starts_with("<html") || head.starts_with("<!doctype")
}

/// Text under the elements matching `css`, skipping navigation, scripts,
/// ads and similar boilerplate. The longest match wins.
pub fn selector_text(html: &str, css: &str) -> Option<String> {
    let sel = selector(css)?;
    let document = Html::parse_document(html);

    document
        .select(&sel)
        .map(|el| {
            let mut raw = String::new();
            collect_text(el, &mut raw);
            normalize_text(&raw)
        })
        .filter(|text| !text.is_empty())
        .max_by_key(|text| text.chars().count())
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                if is_boilerplate(el) {
                    continue;
                }
                let block = BLOCK_TAGS.contains(&el.name());
                if block {
                    out.push('\n');
                }
                if let Some(child_element) = ElementRef::wrap(child) {
                    collect_text(child_element, out);
                }
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

fn is_boilerplate(el: &Element) -> bool {
    if SKIPPED_TAGS.contains(&el.name()) {
        return true;
    }

    let is_marker = |token: &str| {
        let token = token.to_lowercase();
        token == "ad"
            || token == "ads"
            || token.starts_with("ad-")
            || token.starts_with("ad_")
            || BOILERPLATE_MARKERS.iter().any(|m| token.contains(m))
    };

    el.classes().any(is_marker) || el.id().map(is_marker).unwrap_or(false)
}

/// Collapse runs of whitespace inside lines and separate non-empty lines
/// with a blank line.
pub fn normalize_text(raw: &str) -> String {
    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readability_takes_the_scoring_block() {
        let story: String = (0..10)
            .map(|i| format!("<p>Paragraph {}, the Manhasset school board approved a new budget, with changes.</p>", i))
            .collect();
        let html = format!(
            r#"<html><head><title>Budget vote</title></head><body><nav><a href="/">Home</a></nav><div id="story">{}</div></body></html>"#,
            story
        );
        let url = Url::parse("https://example.com/budget").unwrap();

        let readable = readability_extract(&html, &url).unwrap();
        assert_eq!(readable.title, "Budget vote");
        assert!(readable.text.chars().count() >= 500);
        assert!(readable.text.contains("Paragraph 9"));
        assert!(!readable.text.contains("Home"));
    }

    #[test]
    fn readability_rejects_pages_without_a_content_block() {
        let spans: String = (0..30).map(|i| format!("<span>Link text number {} </span>", i)).collect();
        let html = format!(
            "<!DOCTYPE html><html><head><title>Directory</title></head><body>{}</body></html>",
            spans
        );
        let url = Url::parse("https://example.com/directory").unwrap();

        assert!(matches!(
            readability_extract(&html, &url),
            Err(AggregatorError::Extraction(_))
        ));
        assert!(serializes_document_root("\n<HTML><head></head></html>"));
        assert!(!serializes_document_root("<p>Body text</p>"));
    }

    #[test]
    fn finds_canonical_and_refresh_targets() {
        let html = r#"<html><head>
            <link rel="canonical" href="/news/story-1">
            <meta http-equiv="Refresh" content="0; URL='https://www.newsday.com/story-2'">
        </head><body></body></html>"#;

        assert_eq!(
            canonical_link(html, "https://www.newsday.com/amp/x"),
            Some("https://www.newsday.com/news/story-1".to_string())
        );
        assert_eq!(
            meta_refresh_target(html, "https://news.google.com/x"),
            Some("https://www.newsday.com/story-2".to_string())
        );
        assert_eq!(canonical_link("<html></html>", "https://a.example/"), None);
    }

    #[test]
    fn refresh_content_variants() {
        assert_eq!(parse_refresh_content("5;url=https://a.example/"), Some("https://a.example/".into()));
        assert_eq!(parse_refresh_content("0; URL = \"/b\""), Some("/b".into()));
        assert_eq!(parse_refresh_content("30"), None);
        assert_eq!(parse_refresh_content("0; url="), None);
    }

    #[test]
    fn selector_text_skips_boilerplate() {
        let html = r#"<html><body><article>
            <h1>Headline</h1>
            <nav>Home | News</nav>
            <p>First   paragraph.</p>
            <div class="ad-slot">Buy now</div>
            <div id="comments">Nice post</div>
            <script>var x = 1;</script>
            <p>Second paragraph.</p>
        </article></body></html>"#;

        let text = selector_text(html, "article").unwrap();
        assert_eq!(text, "Headline\n\nFirst paragraph.\n\nSecond paragraph.");
        assert_eq!(selector_text(html, ".missing"), None);
        assert_eq!(selector_text(html, "[[bad"), None);
    }

    #[test]
    fn metadata_prefers_meta_tags() {
        let html = r#"<html><head><title>Fallback</title>
            <meta property="og:site_name" content="Newsday">
            <meta name="author" content="Jane Kim">
        </head><body><span class="byline">By Someone</span></body></html>"#;

        let meta = page_metadata(html);
        assert_eq!(meta.title.as_deref(), Some("Fallback"));
        assert_eq!(meta.byline.as_deref(), Some("Jane Kim"));
        assert_eq!(meta.site_name.as_deref(), Some("Newsday"));
    }
}
