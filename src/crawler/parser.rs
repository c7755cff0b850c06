//! Extracts a page's title and its followable links from fetched HTML.
//!
//! Link admission proper (scope, blacklist, dedup) happens downstream in
//! [`crate::crawler::admission`]; this module only decides which anchors are
//! even candidates — same-page anchors and non-navigational schemes never
//! reach the frontier no matter what the admission rules say.

use scraper::{Html, Selector};
use url::Url;

/// A page's title plus every link worth re-admitting through
/// [`crate::crawler::admission::admit`].
#[derive(Debug, Clone)]
pub struct ParsedPage {
    pub title: Option<String>,
    pub links: Vec<String>,
}

/// Link-source elements that can carry a followable `href`, checked in this
/// order so a page without a `<link rel="canonical">` still yields its body
/// anchors: anchor tags first, then the canonical link if present.
const LINK_SELECTORS: &[&str] = &["a[href]", "link[rel='canonical'][href]"];

/// Parses `html` relative to `base_url`, returning its title and its
/// resolved, scheme-filtered link set. Never fails on malformed markup —
/// `scraper`'s parser degrades to a best-effort tree rather than erroring,
/// so the only failure mode here would be a selector that doesn't compile,
/// which can't happen for the fixed selectors below.
pub fn parse_html(html: &str, base_url: &Url) -> Result<ParsedPage, String> {
    let document = Html::parse_document(html);
    let title = extract_title(&document);
    let links = LINK_SELECTORS
        .iter()
        .filter_map(|raw| Selector::parse(raw).ok())
        .flat_map(|selector| {
            document
                .select(&selector)
                .filter(|el| el.value().attr("download").is_none())
                .filter_map(|el| el.value().attr("href"))
                .filter_map(|href| resolve_link(href, base_url))
                .collect::<Vec<_>>()
        })
        .collect();

    Ok(ParsedPage { title, links })
}

fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;
    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Schemes that are syntactically valid `href` values but never belong on
/// the frontier: they name an action, not a navigable resource.
const NON_NAVIGATIONAL_SCHEMES: &[&str] = &["javascript:", "mailto:", "tel:", "data:"];

/// Resolves `href` against `base_url` and drops it unless it resolves to an
/// http(s) URL. `rel="nofollow"` is not checked here — this crawler treats
/// it as a hint, not an exclusion, so those links still reach admission.
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    if NON_NAVIGATIONAL_SCHEMES
        .iter()
        .any(|scheme| href.starts_with(scheme))
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    matches!(absolute.scheme(), "http" | "https").then(|| absolute.to_string())
}
