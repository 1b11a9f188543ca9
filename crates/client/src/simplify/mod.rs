//! HTML simplification for model consumption.
//!
//! ### Stripping
//! - `script`, `style`, `meta` and `link` elements are detached from the
//!   tree together with their subtrees.
//!
//! ### Serialization
//! - One node per line, indented one space per depth level.
//! - Text is trimmed; whitespace-only text nodes are dropped.
//! - Attributes are sorted by name, so output is stable for a given input.
//! - Void elements have no closing tag; comments and the doctype are kept.

pub mod chunk;

pub use chunk::{Chunk, chunk};

use ego_tree::iter::Edge;
use scraper::node::Element;
use scraper::{ElementRef, Html, Node};
use std::fmt::Write;

/// Elements removed with their whole subtree.
const STRIPPED_ELEMENTS: &[&str] = &["script", "style", "meta", "link"];

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source", "track", "wbr",
];

/// Simplify raw page bytes (decoded as lossy UTF-8).
pub fn simplify(content: &[u8]) -> String {
    simplify_html(&String::from_utf8_lossy(content))
}

/// Strip non-content nodes from `html` and pretty-print what remains.
///
/// Walks the tree with an explicit open/close edge iterator, so nesting depth
/// is bounded by memory rather than by the call stack.
pub fn simplify_html(html: &str) -> String {
    let mut document = Html::parse_document(html);
    strip_elements(&mut document);

    let mut out = String::new();
    let mut depth = 0usize;
    for edge in document.tree.root().traverse() {
        match edge {
            Edge::Open(node) => match node.value() {
                Node::Element(element) => {
                    write_open_tag(element, depth, &mut out);
                    depth += 1;
                }
                leaf => write_leaf(leaf, depth, &mut out),
            },
            Edge::Close(node) => {
                if let Node::Element(element) = node.value() {
                    depth = depth.saturating_sub(1);
                    if !VOID_ELEMENTS.contains(&element.name()) {
                        let _ = writeln!(out, "{}</{}>", " ".repeat(depth), element.name());
                    }
                }
            }
        }
    }
    out
}

fn strip_elements(document: &mut Html) {
    let doomed: Vec<_> = document
        .tree
        .root()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| STRIPPED_ELEMENTS.contains(&el.value().name()))
        .map(|el| el.id())
        .collect();

    for id in doomed {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

/// Write a non-element node. The document root itself produces nothing.
fn write_leaf(node: &Node, depth: usize, out: &mut String) {
    let indent = " ".repeat(depth);
    match node {
        Node::Doctype(doctype) => {
            let _ = writeln!(out, "{indent}<!DOCTYPE {}>", doctype.name());
        }
        Node::Comment(comment) => {
            let _ = writeln!(out, "{indent}<!--{}-->", &**comment);
        }
        Node::Text(text) => {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                let _ = writeln!(out, "{indent}{}", escape_text(trimmed));
            }
        }
        _ => {}
    }
}

fn write_open_tag(element: &Element, depth: usize, out: &mut String) {
    let mut attrs: Vec<(&str, &str)> = element.attrs().collect();
    attrs.sort_unstable();

    out.push_str(&" ".repeat(depth));
    out.push('<');
    out.push_str(element.name());
    for (key, value) in attrs {
        let _ = write!(out, " {key}=\"{}\"", escape_attr(value));
    }
    out.push_str(">\n");
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Releases</title>
    <meta charset="utf-8">
    <link rel="stylesheet" href="/style.css">
    <style>body { color: red; }</style>
    <script>window.tracker = 1;</script>
</head>
<body>
    <div class="list" id="main">
        <a href="/a?x=1&y=2" class="item">First &amp; best</a>
        <script type="application/ld+json">{"@type": "Thing"}</script>
        <img src="/a.png" alt="a">
    </div>
</body>
</html>"#;

    #[test]
    fn test_strips_script_style_meta_link() {
        let out = simplify_html(PAGE);
        assert!(!out.contains("<script"));
        assert!(!out.contains("tracker"));
        assert!(!out.contains("@type"));
        assert!(!out.contains("<style"));
        assert!(!out.contains("color: red"));
        assert!(!out.contains("<meta"));
        assert!(!out.contains("<link"));
        assert!(out.contains("Releases"));
        assert!(out.contains("First &amp; best"));
    }

    #[test]
    fn test_pretty_layout() {
        let out = simplify_html("<html><body><p>Hi <b>there</b></p></body></html>");
        let expected = "<html>\n <head>\n </head>\n <body>\n  <p>\n   Hi\n   <b>\n    there\n   </b>\n  </p>\n </body>\n</html>\n";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_attributes_sorted_and_escaped() {
        let out = simplify_html(PAGE);
        assert!(out.contains(r#"<a class="item" href="/a?x=1&amp;y=2">"#));
        assert!(out.contains(r#"<div class="list" id="main">"#));
    }

    #[test]
    fn test_void_elements_not_closed() {
        let out = simplify_html(PAGE);
        assert!(out.contains(r#"<img alt="a" src="/a.png">"#));
        assert!(!out.contains("</img>"));
    }

    #[test]
    fn test_doctype_and_comments_kept() {
        let out = simplify_html("<!DOCTYPE html><html><body><!-- keep me --><p>x</p></body></html>");
        assert!(out.starts_with("<!DOCTYPE html>\n"));
        assert!(out.contains("<!-- keep me -->"));
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(simplify_html(PAGE), simplify_html(PAGE));
    }

    #[test]
    fn test_deep_nesting_does_not_overflow() {
        let depth = 5_000;
        let html = format!("{}deep{}", "<div>".repeat(depth), "</div>".repeat(depth));

        let out = simplify_html(&html);

        assert!(out.contains("deep"));
        assert_eq!(out.matches("<div>").count(), depth);
        assert_eq!(out.matches("</div>").count(), depth);
        assert!(out.ends_with("</html>\n"));
    }

    #[test]
    fn test_simplify_bytes_lossy() {
        let mut bytes = b"<p>caf".to_vec();
        bytes.push(0xff);
        bytes.extend_from_slice(b"</p>");
        let out = simplify(&bytes);
        assert!(out.contains("caf\u{fffd}"));
    }
}
