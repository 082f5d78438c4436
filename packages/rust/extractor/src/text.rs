//! Approximate rendered text of a document.
//!
//! Mirrors what a user would see: non-rendered subtrees are dropped and block
//! boundaries become line breaks so adjacent blocks never glue together.

use scraper::{ElementRef, Html, node::Element};

/// Elements whose content is never rendered as text.
const NON_RENDERED: &[&str] = &[
    "head", "script", "style", "noscript", "template", "iframe", "object", "svg",
];

/// Elements followed by a line break in rendered text.
const BLOCK_LEVEL: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "li", "main", "nav", "ol", "p", "pre", "section", "table", "tr", "ul",
];

/// Collect the visible text of a parsed document.
pub fn visible_text(doc: &Html) -> String {
    let mut out = String::new();
    collect(doc.root_element(), &mut out);
    out
}

fn collect(el: ElementRef<'_>, out: &mut String) {
    if is_hidden(el.value()) {
        return;
    }

    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_el) = ElementRef::wrap(child) {
            let name = child_el.value().name();
            if name == "br" {
                out.push('\n');
                continue;
            }

            collect(child_el, out);

            if BLOCK_LEVEL.contains(&name) {
                out.push('\n');
            } else if name == "td" || name == "th" {
                out.push('\t');
            }
        }
    }
}

fn is_hidden(el: &Element) -> bool {
    if NON_RENDERED.contains(&el.name()) || el.attr("hidden").is_some() {
        return true;
    }

    el.attr("style").is_some_and(|style| {
        let compact: String = style
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        compact.contains("display:none") || compact.contains("visibility:hidden")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_are_separated() {
        let doc = Html::parse_document("<html><body><p>one</p><p>two</p>three<br>four</body></html>");
        let text = visible_text(&doc);
        assert!(text.contains("one\ntwo\nthree\nfour"));
    }

    #[test]
    fn inline_elements_are_joined() {
        let doc = Html::parse_document("<html><body><p>ab<b>cd</b>ef</p></body></html>");
        assert_eq!(visible_text(&doc).trim(), "abcdef");
    }

    #[test]
    fn non_rendered_content_is_dropped() {
        let doc = Html::parse_document(
            r#"<html><head><title>T</title><style>p{}</style></head><body>
                <p>shown</p>
                <p hidden>gone</p>
                <div style="DISPLAY : none">gone</div>
                <script>gone()</script>
            </body></html>"#,
        );
        let text = visible_text(&doc);
        assert!(text.contains("shown"));
        assert!(!text.contains("gone"));
        assert!(!text.contains('T'));
    }
}
