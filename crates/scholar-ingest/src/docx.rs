//! Raw text of a Word (.docx) document.
//!
//! Reads `word/document.xml` from the package and keeps only the text runs:
//! each paragraph ends with a blank line, tabs and breaks inside runs become
//! `\t` and `\n`. Formatting, tables, headers and footers are not rendered.

use std::io::Read;

use quick_xml::Reader;
use quick_xml::events::Event;

/// Main document part inside the OOXML package.
pub const DOCUMENT_PART: &str = "word/document.xml";

/// Extract the raw text of a DOCX package.
pub fn extract_raw_text(data: &[u8]) -> Result<String, String> {
    let cursor = std::io::Cursor::new(data);
    let mut archive =
        zip::ZipArchive::new(cursor).map_err(|e| format!("Failed to open DOCX package: {}", e))?;
    let mut part = archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| format!("Failed to find {}: {}", DOCUMENT_PART, e))?;

    let mut xml = Vec::new();
    part.read_to_end(&mut xml)
        .map_err(|e| format!("Failed to read {}: {}", DOCUMENT_PART, e))?;

    document_text(&xml)
}

/// Text of a WordprocessingML `document.xml` body.
pub fn document_text(xml: &[u8]) -> Result<String, String> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut out = String::new();

    let mut in_run = false;
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"r" => in_run = true,
                b"t" if in_run => in_text = true,
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"r" => in_run = false,
                b"t" => in_text = false,
                b"p" => out.push_str("\n\n"),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                // Tab stops in paragraph properties are also `w:tab`.
                b"tab" if in_run => out.push('\t'),
                b"br" | b"cr" if in_run => out.push('\n'),
                b"p" => out.push_str("\n\n"),
                _ => {}
            },
            Ok(Event::Text(ref e)) if in_text => {
                let text = e
                    .unescape()
                    .map_err(|e| format!("Malformed text in {}: {}", DOCUMENT_PART, e))?;
                out.push_str(&text);
            }
            Ok(Event::CData(ref e)) if in_text => {
                out.push_str(&String::from_utf8_lossy(e));
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "Malformed {} at byte {}: {}",
                    DOCUMENT_PART,
                    reader.error_position(),
                    e
                ));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main""#;

    fn body(inner: &str) -> Vec<u8> {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document {NS}><w:body>{inner}</w:body></w:document>"#
        )
        .into_bytes()
    }

    #[test]
    fn paragraphs_end_with_blank_line() {
        let xml = body(
            "<w:p><w:r><w:t>Title</w:t></w:r></w:p>\
             <w:p><w:r><w:t xml:space=\"preserve\">Hello </w:t></w:r><w:r><w:t>world</w:t></w:r></w:p>",
        );
        assert_eq!(document_text(&xml).unwrap(), "Title\n\nHello world\n\n");
    }

    #[test]
    fn tabs_and_breaks_inside_runs() {
        let xml = body(
            "<w:p><w:pPr><w:tabs><w:tab w:val=\"left\" w:pos=\"720\"/></w:tabs></w:pPr>\
             <w:r><w:t>a</w:t><w:tab/><w:t>b</w:t><w:br/><w:t>c</w:t></w:r></w:p>",
        );
        assert_eq!(document_text(&xml).unwrap(), "a\tb\nc\n\n");
    }

    #[test]
    fn entities_are_unescaped() {
        let xml = body("<w:p><w:r><w:t>A &amp; B &lt;C&gt;</w:t></w:r></w:p>");
        assert_eq!(document_text(&xml).unwrap(), "A & B <C>\n\n");
    }

    #[test]
    fn empty_paragraph_and_deleted_text() {
        let xml = body(
            "<w:p/><w:p><w:r><w:delText>gone</w:delText></w:r><w:r><w:t>kept</w:t></w:r></w:p>",
        );
        assert_eq!(document_text(&xml).unwrap(), "\n\nkept\n\n");
    }

    #[test]
    fn not_a_zip_is_an_error() {
        let err = extract_raw_text(b"plain bytes").unwrap_err();
        assert!(err.contains("DOCX"));
    }
}
