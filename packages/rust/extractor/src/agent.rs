//! Extraction agent trait and the built-in magnet agent.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::trace;
use url::Url;

use tabharvest_shared::{ExtractedIdentifier, PageContent, SCHEME_PREFIX};

use crate::text::visible_text;

/// Shortest and longest accepted hash token.
const TOKEN_MIN: usize = 32;
const TOKEN_MAX: usize = 40;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Logic executed against a single context's materialized content.
///
/// Implementations must be pure with respect to process state: the only input
/// is the page they are handed. Returned sequences may contain duplicates;
/// deduplication happens when results are merged.
pub trait ExtractionAgent: Send + Sync {
    /// Extract every identifier found in `page`.
    fn extract(&self, page: &PageContent) -> Vec<ExtractedIdentifier>;

    /// Human-readable agent name for tracing.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// MagnetAgent
// ---------------------------------------------------------------------------

/// Harvests `magnet:?xt=urn:btih` locators from hyperlinks and visible text.
#[derive(Debug, Clone, Copy, Default)]
pub struct MagnetAgent;

impl ExtractionAgent for MagnetAgent {
    fn extract(&self, page: &PageContent) -> Vec<ExtractedIdentifier> {
        let doc = Html::parse_document(&page.html);
        let base = Url::parse(&page.address).ok();

        let mut found = scan_links(&doc, base.as_ref());
        let link_count = found.len();
        found.extend(scan_text(&visible_text(&doc)));

        trace!(
            address = %page.address,
            from_links = link_count,
            from_text = found.len() - link_count,
            "scanned page"
        );

        found
    }

    fn name(&self) -> &str {
        "magnet"
    }
}

/// Structural scan: hyperlinks whose resolved address starts with the prefix.
fn scan_links(doc: &Html, base: Option<&Url>) -> Vec<ExtractedIdentifier> {
    static LINK_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));

    let mut found = Vec::new();

    for el in doc.select(&LINK_SEL) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        // Resolution lowercases the scheme and percent-encodes the query,
        // matching the address a browser reports for the link.
        let resolved = match base {
            Some(base) => base.join(href.trim()),
            None => Url::parse(href.trim()),
        };
        if let Ok(resolved) = resolved {
            if resolved.as_str().starts_with(SCHEME_PREFIX) {
                found.push(ExtractedIdentifier::new(resolved.as_str()));
            }
        }
    }

    found
}

/// Textual scan: every non-overlapping prefix + 32..=40 alphanumeric match.
fn scan_text(text: &str) -> Vec<ExtractedIdentifier> {
    // The token is matched greedily and length-checked afterwards so that
    // tokens longer than the bound are rejected instead of truncated.
    static MAGNET_RE: LazyLock<Regex> = LazyLock::new(|| {
        // Case folding applies to the prefix only: a folded ASCII class would
        // also accept U+212A and U+017F inside the token.
        Regex::new(r"(?i:magnet:\?xt=urn:btih:)[a-zA-Z0-9]{32,}").expect("valid regex")
    });

    let prefix_len = SCHEME_PREFIX.len() + 1;

    MAGNET_RE
        .find_iter(text)
        .filter(|m| {
            let token = m.as_str().get(prefix_len..).unwrap_or_default();
            (TOKEN_MIN..=TOKEN_MAX).contains(&token.chars().count())
        })
        .map(|m| ExtractedIdentifier::new(m.as_str()))
        .collect()
}
