//! Client-rendered shell detection.

use scraper::{Html, Node};

/// Pages with less visible text than this are treated as empty shells.
pub const MIN_VISIBLE_TEXT: usize = 500;

/// Framework mount points and hydration globals, matched case-insensitively
/// against the raw HTML.
const FRAMEWORK_MARKERS: &[&str] = &[
    r#"id="root""#,
    "id='root'",
    r#"id="app""#,
    "id='app'",
    r#"id="__next""#,
    "__next_data__",
    r#"id="__nuxt""#,
    "window.__nuxt__",
    r#"id="___gatsby""#,
    "data-reactroot",
    "data-server-rendered",
    "ng-version",
    "<app-root",
];

/// Elements whose text never renders.
const INVISIBLE: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Whether `html` is a client-rendered shell that needs a browser to fill in.
///
/// True only when a framework marker is present AND the visible text is
/// shorter than [`MIN_VISIBLE_TEXT`].
pub fn needs_rendering(html: &str) -> bool {
    has_framework_marker(html) && visible_text_len(html) < MIN_VISIBLE_TEXT
}

pub fn has_framework_marker(html: &str) -> bool {
    let lower = html.to_ascii_lowercase();
    FRAMEWORK_MARKERS.iter().any(|m| lower.contains(m))
}

/// Character count of the page's rendered text, whitespace-collapsed.
pub fn visible_text_len(html: &str) -> usize {
    let doc = Html::parse_document(html);
    let mut len = 0;
    let mut prev_space = true;

    for node in doc.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| INVISIBLE.contains(&e.name()))
        });
        if hidden {
            continue;
        }
        for c in text.chars() {
            if c.is_whitespace() {
                if !prev_space {
                    len += 1;
                    prev_space = true;
                }
            } else {
                len += 1;
                prev_space = false;
            }
        }
    }

    // Trailing collapsed space.
    if prev_space && len > 0 { len - 1 } else { len }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(mount: &str, words: usize) -> String {
        let body = "lorem ".repeat(words);
        format!(
            "<html><head><title>Conf</title><script>var x = '{}';</script></head>\
             <body>{mount}<p>{body}</p></body></html>",
            "y".repeat(2000)
        )
    }

    #[test]
    fn empty_react_shell_needs_rendering() {
        let html = r#"<html><body><div id="root"></div><script src="/app.js"></script></body></html>"#;
        assert!(needs_rendering(html));
    }

    #[test]
    fn marker_with_enough_text_is_static() {
        // 100 words of 6 chars is ~600 visible chars.
        let html = page(r#"<div id="__next"></div>"#, 100);
        assert!(visible_text_len(&html) > MIN_VISIBLE_TEXT);
        assert!(!needs_rendering(&html));
    }

    #[test]
    fn marker_with_little_text_needs_rendering() {
        let html = page(r#"<div id="app"></div>"#, 10);
        assert!(visible_text_len(&html) < MIN_VISIBLE_TEXT);
        assert!(needs_rendering(&html));
    }

    #[test]
    fn short_page_without_marker_is_static() {
        let html = "<html><body><h1>Tiny CFP</h1><p>Submit by May 1.</p></body></html>";
        assert!(!needs_rendering(html));
    }

    #[test]
    fn script_and_style_text_is_not_counted() {
        let html = "<html><head><style>body{}</style></head><body><script>abc</script>hi  there</body></html>";
        assert_eq!(visible_text_len(html), "hi there".len());
    }

    #[test]
    fn markers_match_case_insensitively() {
        assert!(has_framework_marker(r#"<script>window.__NUXT__={}</script>"#));
        assert!(has_framework_marker(r#"<script id="__NEXT_DATA__"></script>"#));
    }

    #[test]
    fn create_react_app_shell_fixture() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../../fixtures/html/spa_shell.html");
        let html = std::fs::read_to_string(path).unwrap();
        assert!(needs_rendering(&html));
    }
}
