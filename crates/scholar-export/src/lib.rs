//! Export of a reformatted paper.
//!
//! The structural HTML of a [`ReformatResult`] is read into a flat list of
//! [`Block`]s, which every output format renders from. PDF rendering is not
//! done here.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use scraper::{ElementRef, Html, Node};
use thiserror::Error;

use scholar_core::ReformatResult;

mod docx;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to write DOCX package: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("document has no content to export")]
    EmptyDocument,
}

/// Output format for [`export_document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Docx,
    Html,
    Markdown,
    Text,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 4] = [
        ExportFormat::Docx,
        ExportFormat::Html,
        ExportFormat::Markdown,
        ExportFormat::Text,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Docx => "docx",
            ExportFormat::Html => "html",
            ExportFormat::Markdown => "md",
            ExportFormat::Text => "txt",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Docx => scholar_core::DOCX_MIME,
            ExportFormat::Html => "text/html; charset=utf-8",
            ExportFormat::Markdown => "text/markdown; charset=utf-8",
            ExportFormat::Text => "text/plain; charset=utf-8",
        }
    }

    /// `<stem>.<extension>`, with characters unsafe in filenames replaced.
    pub fn file_name(&self, stem: &str) -> String {
        let cleaned: String = stem
            .trim()
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let stem = if cleaned.trim().is_empty() {
            "reformatted-paper"
        } else {
            cleaned.trim()
        };
        format!("{}.{}", stem, self.extension())
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_lowercase().as_str() {
            "docx" | "word" => Ok(ExportFormat::Docx),
            "html" | "htm" => Ok(ExportFormat::Html),
            "md" | "markdown" => Ok(ExportFormat::Markdown),
            "txt" | "text" => Ok(ExportFormat::Text),
            other => {
                let expected: Vec<&str> = ExportFormat::ALL.iter().map(|f| f.extension()).collect();
                Err(format!(
                    "unknown export format '{}' (expected one of: {})",
                    other,
                    expected.join(", ")
                ))
            }
        }
    }
}

/// One unit of a structural document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Level 1 to 3.
    Heading(u8, String),
    Paragraph(String),
    ListItem(String),
}

/// Read structural HTML into blocks. Whitespace inside a block is collapsed.
pub fn blocks(html: &str) -> Vec<Block> {
    let fragment = Html::parse_fragment(html);
    let mut out = Vec::new();
    let mut loose = String::new();
    collect(fragment.root_element(), &mut out, &mut loose);
    flush_loose(&mut out, &mut loose);
    out
}

fn collect(el: ElementRef<'_>, out: &mut Vec<Block>, loose: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => loose.push_str(text),
            Node::Element(_) => {
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                let make: Option<fn(String) -> Block> = match child_el.value().name() {
                    "h1" => Some(|t| Block::Heading(1, t)),
                    "h2" => Some(|t| Block::Heading(2, t)),
                    "h3" => Some(|t| Block::Heading(3, t)),
                    "p" => Some(Block::Paragraph),
                    "li" => Some(Block::ListItem),
                    _ => None,
                };
                match make {
                    Some(make) => {
                        flush_loose(out, loose);
                        let text = collapse(&child_el.text().collect::<String>());
                        if !text.is_empty() {
                            out.push(make(text));
                        }
                    }
                    None => collect(child_el, out, loose),
                }
            }
            _ => {}
        }
    }
}

fn flush_loose(out: &mut Vec<Block>, loose: &mut String) {
    let text = collapse(loose);
    if !text.is_empty() {
        out.push(Block::Paragraph(text));
    }
    loose.clear();
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Render a reformatted paper in `format`.
pub fn export_document(
    result: &ReformatResult,
    title: &str,
    format: ExportFormat,
) -> Result<Vec<u8>, ExportError> {
    let blocks = blocks(result.as_str());
    if blocks.is_empty() {
        return Err(ExportError::EmptyDocument);
    }
    let bytes = match format {
        ExportFormat::Docx => docx::write_package(&blocks, title)?,
        ExportFormat::Html => render_html(result, title).into_bytes(),
        ExportFormat::Markdown => render_markdown(&blocks).into_bytes(),
        ExportFormat::Text => render_text(&blocks).into_bytes(),
    };
    tracing::debug!(
        format = %format,
        blocks = blocks.len(),
        bytes = bytes.len(),
        "exported document"
    );
    Ok(bytes)
}

/// [`export_document`] written to `path`.
pub fn export_to_path(
    result: &ReformatResult,
    title: &str,
    format: ExportFormat,
    path: &Path,
) -> Result<(), ExportError> {
    let bytes = export_document(result, title, format)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

fn render_html(result: &ReformatResult, title: &str) -> String {
    let title = if title.trim().is_empty() {
        "Reformatted Paper"
    } else {
        title.trim()
    };
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n\
         <style>body{{font-family:Georgia,serif;max-width:42em;margin:2em auto;line-height:1.5}}</style>\n\
         </head>\n<body>\n{}\n</body>\n</html>\n",
        quick_xml::escape::escape(title),
        result.as_str()
    )
}

fn render_markdown(blocks: &[Block]) -> String {
    let mut out = String::new();
    let mut prev_list = false;
    for block in blocks {
        let is_list = matches!(block, Block::ListItem(_));
        if !out.is_empty() {
            out.push_str(if is_list && prev_list { "\n" } else { "\n\n" });
        }
        match block {
            Block::Heading(level, text) => {
                out.push_str(&"#".repeat(*level as usize));
                out.push(' ');
                out.push_str(text);
            }
            Block::Paragraph(text) => out.push_str(text),
            Block::ListItem(text) => {
                out.push_str("- ");
                out.push_str(text);
            }
        }
        prev_list = is_list;
    }
    out.push('\n');
    out
}

fn render_text(blocks: &[Block]) -> String {
    let mut out = String::new();
    let mut prev_list = false;
    for block in blocks {
        let is_list = matches!(block, Block::ListItem(_));
        if !out.is_empty() {
            out.push_str(if is_list && prev_list { "\n" } else { "\n\n" });
        }
        match block {
            Block::Heading(_, text) | Block::Paragraph(text) => out.push_str(text),
            Block::ListItem(text) => {
                out.push_str("• ");
                out.push_str(text);
            }
        }
        prev_list = is_list;
    }
    out.push('\n');
    out
}
