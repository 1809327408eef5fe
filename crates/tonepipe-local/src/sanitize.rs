//! HTML → analyzable plain text.

/// Hard cap on sanitized sample length (chars).
pub const MAX_SAMPLE_CHARS: usize = 8_000;

const NON_TEXT_ELEMENTS: [&str; 3] = ["script", "style", "noscript"];

/// Elements whose boundaries separate words. `br` has no content but still breaks a line.
const BLOCK_ELEMENTS: [&str; 37] = [
    "address", "article", "aside", "blockquote", "body", "br", "dd", "details", "div", "dl",
    "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5",
    "h6", "header", "hr", "li", "main", "nav", "ol", "p", "pre", "section", "summary", "table",
    "td", "th", "tr", "ul",
];

fn norm_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Take at most `max_chars` characters. Returns the text and whether anything was dropped.
pub fn truncate_chars(s: &str, max_chars: usize) -> (String, bool) {
    match s.char_indices().nth(max_chars) {
        Some((cut, _)) => (s[..cut].to_string(), true),
        None => (s.to_string(), false),
    }
}

/// Visible text of an HTML document.
///
/// Text under `script`, `style` and `noscript` never reaches the output. Text in different
/// block-level elements is separated by a space; inline markup joins as written. Whitespace runs
/// (newlines included) collapse to one space and the result is capped at
/// [`MAX_SAMPLE_CHARS`]. Malformed markup degrades to whatever text the parser recovers.
pub fn sanitize(html: &str) -> String {
    let doc = html_scraper::Html::parse_document(html);
    let body = html_scraper::Selector::parse("body")
        .ok()
        .and_then(|sel| doc.select(&sel).next());
    let root = body.unwrap_or_else(|| doc.root_element());

    let mut raw = String::with_capacity(html.len().min(64 * 1024));
    let mut last_block = None;
    let mut pending_break = false;
    for node in root.descendants() {
        if let Some(el) = node.value().as_element() {
            if BLOCK_ELEMENTS.contains(&el.name()) {
                pending_break = true;
            }
            continue;
        }
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|el| NON_TEXT_ELEMENTS.contains(&el.name()))
        });
        if hidden {
            continue;
        }
        // Words only split at block boundaries; inline markup ("<b>br</b>own") stays fused.
        let block = node
            .ancestors()
            .find(|a| {
                a.value()
                    .as_element()
                    .is_some_and(|el| BLOCK_ELEMENTS.contains(&el.name()))
            })
            .map(|a| a.id());
        if pending_break || block != last_block {
            raw.push(' ');
        }
        raw.push_str(text);
        last_block = block;
        pending_break = false;
    }

    truncate_chars(&norm_ws(&raw), MAX_SAMPLE_CHARS).0
}
