//! Small DOM helpers shared by the strategies.

use scraper::{ElementRef, Html, Node, Selector};

/// Collapse runs of whitespace to single spaces and trim.
pub fn clean_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cleaned text of an element, `None` when empty.
pub fn element_text(el: ElementRef<'_>) -> Option<String> {
    let text = clean_text(&el.text().collect::<String>());
    (!text.is_empty()).then_some(text)
}

/// Text of the first element matching `css` that has any.
pub fn first_text(doc: &Html, css: &str) -> Option<String> {
    let sel = Selector::parse(css).ok()?;
    doc.select(&sel).find_map(element_text)
}

/// Texts of every element matching `css`.
pub fn all_texts(doc: &Html, css: &str) -> Vec<String> {
    let Ok(sel) = Selector::parse(css) else {
        return Vec::new();
    };
    doc.select(&sel).filter_map(element_text).collect()
}

/// `content` of the first `<meta>` whose `property` or `name` is `key`.
pub fn meta_content(doc: &Html, key: &str) -> Option<String> {
    let css = format!(r#"meta[property="{key}"], meta[name="{key}"]"#);
    let sel = Selector::parse(&css).ok()?;
    doc.select(&sel)
        .filter_map(|el| el.value().attr("content"))
        .map(clean_text)
        .find(|s| !s.is_empty())
}

/// Visible text of the document with `skip` subtrees removed. Block-level
/// boundaries become newlines so line-oriented patterns keep working.
pub fn visible_text(doc: &Html, skip: &[&str]) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for node in doc.root_element().descendants() {
        match node.value() {
            Node::Element(el) if is_block(el.name()) => {
                flush(&mut current, &mut lines);
            }
            Node::Text(text) => {
                let hidden = node.ancestors().any(|a| {
                    a.value()
                        .as_element()
                        .is_some_and(|e| skip.contains(&e.name()))
                });
                if !hidden {
                    current.push_str(text);
                    current.push(' ');
                }
            }
            _ => {}
        }
    }
    flush(&mut current, &mut lines);
    lines.join("\n")
}

fn flush(current: &mut String, lines: &mut Vec<String>) {
    let line = clean_text(current);
    if !line.is_empty() {
        lines.push(line);
    }
    current.clear();
}

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "p" | "div"
            | "section"
            | "article"
            | "main"
            | "li"
            | "ul"
            | "ol"
            | "tr"
            | "td"
            | "th"
            | "table"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "br"
            | "dt"
            | "dd"
            | "dl"
            | "header"
            | "footer"
            | "nav"
            | "aside"
            | "blockquote"
            | "form"
    )
}

/// Byte slice of `text` around `start..end`, widened by up to `radius`
/// bytes each side and snapped to char boundaries.
pub fn window(text: &str, start: usize, end: usize, radius: usize) -> &str {
    let (lo, hi) = window_bounds(text, start, end, radius);
    &text[lo..hi]
}

/// Byte bounds used by [`window`].
pub fn window_bounds(text: &str, start: usize, end: usize, radius: usize) -> (usize, usize) {
    let mut lo = start.saturating_sub(radius);
    while lo > 0 && !text.is_char_boundary(lo) {
        lo -= 1;
    }
    let mut hi = (end + radius).min(text.len());
    while hi < text.len() && !text.is_char_boundary(hi) {
        hi += 1;
    }
    (lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visible_text_skips_and_breaks_lines() {
        let doc = Html::parse_document(
            "<html><body><nav>Home About</nav><h1>RustConf</h1>\
             <p>Location:   Montréal,\n Canada</p><script>var a</script></body></html>",
        );
        let text = visible_text(&doc, &["script", "nav"]);
        assert_eq!(text, "RustConf\nLocation: Montréal, Canada");
    }

    #[test]
    fn meta_by_property_or_name() {
        let doc = Html::parse_document(
            r#"<head><meta property="og:title" content=" Conf "><meta name="description" content="Desc"></head>"#,
        );
        assert_eq!(meta_content(&doc, "og:title").as_deref(), Some("Conf"));
        assert_eq!(meta_content(&doc, "description").as_deref(), Some("Desc"));
        assert_eq!(meta_content(&doc, "og:image"), None);
    }

    #[test]
    fn window_respects_char_boundaries() {
        let text = "é deadline é";
        let w = window(text, 3, 11, 2);
        assert!(w.contains("deadline"));
    }
}
