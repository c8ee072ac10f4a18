//! Structural HTML.
//!
//! Reformatted papers are restricted to `h1, h2, h3, p, ul, li` with no
//! attributes and no document shell. [`sanitize`] enforces that on whatever
//! the generation service returns.

use std::fmt;

use scraper::{ElementRef, Html, Node};
use serde::Serialize;

/// Tags that survive sanitizing, attribute-free.
pub const ALLOWED_TAGS: [&str; 6] = ["h1", "h2", "h3", "p", "ul", "li"];

/// Elements removed together with everything inside them.
const DROPPED_TAGS: [&str; 8] = [
    "style", "script", "head", "title", "meta", "link", "template", "noscript",
];

/// Document-shell tags, which the fragment parser silently discards.
const SHELL_TAGS: [&str; 4] = ["html", "head", "body", "style"];

/// Structural HTML of a reformatted paper. Only [`sanitize`] builds one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ReformatResult(String);

impl ReformatResult {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// True when no visible text survives (tags alone don't count).
    pub fn text_is_blank(&self) -> bool {
        let fragment = Html::parse_fragment(&self.0);
        fragment
            .root_element()
            .text()
            .all(|t| t.trim().is_empty())
    }
}

impl fmt::Display for ReformatResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

enum Disposition {
    Keep(&'static str),
    Drop,
    Unwrap,
}

fn disposition(tag: &str) -> Disposition {
    match tag {
        "h1" => Disposition::Keep("h1"),
        "h2" => Disposition::Keep("h2"),
        "h3" | "h4" | "h5" | "h6" => Disposition::Keep("h3"),
        "p" => Disposition::Keep("p"),
        "ul" | "ol" => Disposition::Keep("ul"),
        "li" => Disposition::Keep("li"),
        t if DROPPED_TAGS.contains(&t) => Disposition::Drop,
        _ => Disposition::Unwrap,
    }
}

/// Reduce an HTML fragment to structural HTML.
///
/// Whitelisted tags lose their attributes, `h4`–`h6` become `h3`, `ol`
/// becomes `ul`, style/script/head content is removed, and every other
/// element is replaced by its children. Text is re-escaped.
pub fn sanitize(html: &str) -> ReformatResult {
    let fragment = Html::parse_fragment(html);
    let mut out = String::with_capacity(html.len());
    write_children(fragment.root_element(), &mut out);
    ReformatResult(out.trim().to_string())
}

fn write_children(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => push_escaped(out, text),
            Node::Element(_) => {
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                match disposition(child_el.value().name()) {
                    Disposition::Keep(tag) => {
                        out.push('<');
                        out.push_str(tag);
                        out.push('>');
                        write_children(child_el, out);
                        out.push_str("</");
                        out.push_str(tag);
                        out.push('>');
                    }
                    Disposition::Drop => {}
                    Disposition::Unwrap => write_children(child_el, out),
                }
            }
            _ => {}
        }
    }
}

fn push_escaped(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

/// Whether `html` already satisfies the structural invariant.
pub fn is_structural(html: &str) -> bool {
    let lower = html.to_ascii_lowercase();
    if SHELL_TAGS.iter().any(|tag| contains_open_tag(&lower, tag)) {
        return false;
    }
    let fragment = Html::parse_fragment(html);
    children_structural(fragment.root_element())
}

fn children_structural(el: ElementRef<'_>) -> bool {
    el.children().filter_map(ElementRef::wrap).all(|child| {
        let value = child.value();
        ALLOWED_TAGS.contains(&value.name())
            && value.attrs().next().is_none()
            && children_structural(child)
    })
}

fn contains_open_tag(lower: &str, tag: &str) -> bool {
    let needle = format!("<{}", tag);
    lower.match_indices(&needle).any(|(i, _)| {
        matches!(
            lower[i + needle.len()..].chars().next(),
            None | Some('>' | '/' | ' ' | '\t' | '\n' | '\r')
        )
    })
}
