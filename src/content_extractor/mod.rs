//! Content extraction: cleaned text and an optional structured tree from raw HTML.
//!
//! Built on the same `scraper` crate already used for link and title
//! extraction. Structured extraction never blocks the caller: a parser
//! failure or an empty result falls back to a regex-based strip-tags pass.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("selector construction failed: {0}")]
    Selector(String),
}

pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// A block-level node pulled out of the document body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuredNode {
    /// Heading text at `depth` 1..6 (h1..h6).
    Heading { depth: u8, text: String },
    Paragraph(String),
    List(Vec<String>),
}

static SCRIPT_STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</\1>").unwrap());
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Extracts cleaned, human-readable text from `html`: strips `script` and
/// `style` content, then all remaining tags, then collapses whitespace.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let body_selector = Selector::parse("body").unwrap();
    let text = if let Some(body) = document.select(&body_selector).next() {
        body.text().collect::<Vec<_>>().join(" ")
    } else {
        document.root_element().text().collect::<Vec<_>>().join(" ")
    };

    let collapsed = WHITESPACE.replace_all(text.trim(), " ").to_string();
    if collapsed.is_empty() {
        strip_tags_fallback(html)
    } else {
        collapsed
    }
}

/// Regex-only fallback used when the DOM walk above yields nothing (e.g. a
/// non-HTML body that still arrived with an HTML content type).
fn strip_tags_fallback(html: &str) -> String {
    let without_scripts = SCRIPT_STYLE.replace_all(html, " ");
    let without_tags = TAG.replace_all(&without_scripts, " ");
    WHITESPACE.replace_all(without_tags.trim(), " ").to_string()
}

/// Extracts a structured tree of headings, paragraphs and lists, in document
/// order. Returns an empty vector rather than an error on a parser failure
/// or when the document has no matching elements.
pub fn extract_structured(html: &str) -> ExtractionResult<Vec<StructuredNode>> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("h1, h2, h3, h4, h5, h6, p, ul, ol")
        .map_err(|e| ExtractionError::Selector(format!("{:?}", e)))?;

    let mut nodes = Vec::new();
    for element in document.select(&selector) {
        let tag = element.value().name();
        match tag {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let depth = tag[1..].parse::<u8>().unwrap_or(1);
                let text = normalize_inline_text(&element.text().collect::<Vec<_>>().join(" "));
                if !text.is_empty() {
                    nodes.push(StructuredNode::Heading { depth, text });
                }
            }
            "p" => {
                let text = normalize_inline_text(&element.text().collect::<Vec<_>>().join(" "));
                if !text.is_empty() {
                    nodes.push(StructuredNode::Paragraph(text));
                }
            }
            "ul" | "ol" => {
                let item_selector = Selector::parse("li")
                    .map_err(|e| ExtractionError::Selector(format!("{:?}", e)))?;
                let items: Vec<String> = element
                    .select(&item_selector)
                    .map(|li| normalize_inline_text(&li.text().collect::<Vec<_>>().join(" ")))
                    .filter(|s| !s.is_empty())
                    .collect();
                if !items.is_empty() {
                    nodes.push(StructuredNode::List(items));
                }
            }
            _ => {}
        }
    }

    Ok(nodes)
}

fn normalize_inline_text(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_text_strips_script_and_style() {
        let html = "<html><head><style>.x{}</style></head><body><script>evil()</script><p>Hello  world</p></body></html>";
        assert_eq!(extract_text(html), "Hello world");
    }

    #[test]
    fn extract_text_falls_back_on_non_html() {
        let text = extract_text("not html at all");
        assert_eq!(text, "not html at all");
    }

    #[test]
    fn extract_structured_collects_headings_paragraphs_and_lists() {
        let html = "<html><body><h1>Title</h1><p>Body text</p><ul><li>one</li><li>two</li></ul></body></html>";
        let nodes = extract_structured(html).unwrap();
        assert_eq!(
            nodes,
            vec![
                StructuredNode::Heading {
                    depth: 1,
                    text: "Title".to_string()
                },
                StructuredNode::Paragraph("Body text".to_string()),
                StructuredNode::List(vec!["one".to_string(), "two".to_string()]),
            ]
        );
    }

    #[test]
    fn extract_structured_empty_on_no_matches() {
        let nodes = extract_structured("<html><body><div>no matches here</div></body></html>").unwrap();
        assert!(nodes.is_empty());
    }

    #[test]
    fn heading_depth_parses_from_tag_name() {
        let html = "<h3>third level</h3>";
        let nodes = extract_structured(html).unwrap();
        assert_eq!(
            nodes[0],
            StructuredNode::Heading {
                depth: 3,
                text: "third level".to_string()
            }
        );
    }
}
