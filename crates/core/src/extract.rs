use crate::error::ExtractError;
use lopdf::Document;
use std::io::Read;

const MAX_DOCX_XML_BYTES: u64 = 50 * 1024 * 1024;

/// Extracts plain text from an uploaded file, dispatching on the filename
/// extension. Supported: pdf, docx, txt, md.
pub fn extract_text(filename: &str, bytes: &[u8]) -> Result<String, ExtractError> {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    let text = match extension.as_str() {
        "pdf" => extract_pdf(bytes)?,
        "docx" => extract_docx(bytes)?,
        "txt" | "md" => String::from_utf8(bytes.to_vec())?,
        other => return Err(ExtractError::UnsupportedFormat(other.to_string())),
    };

    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(ExtractError::EmptyText(filename.to_string()));
    }
    Ok(text)
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    let document =
        Document::load_mem(bytes).map_err(|error| ExtractError::PdfParse(error.to_string()))?;

    let mut pages = Vec::new();
    for (page_no, _page_id) in document.get_pages() {
        let text = document
            .extract_text(&[page_no])
            .map_err(|error| ExtractError::PdfParse(error.to_string()))?;
        if !text.trim().is_empty() {
            pages.push(text);
        }
    }

    Ok(pages.join("\n\n"))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|error| ExtractError::DocxParse(error.to_string()))?;

    let mut document_xml = Vec::new();
    {
        let entry = archive
            .by_name("word/document.xml")
            .map_err(|error| ExtractError::DocxParse(error.to_string()))?;
        entry
            .take(MAX_DOCX_XML_BYTES)
            .read_to_end(&mut document_xml)
            .map_err(|error| ExtractError::DocxParse(error.to_string()))?;
    }

    text_runs_from_xml(&document_xml)
}

/// Collects the `<w:t>` text runs, inserting paragraph breaks at `<w:p>`.
fn text_runs_from_xml(xml: &[u8]) -> Result<String, ExtractError> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buffer = Vec::new();
    let mut output = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event_into(&mut buffer) {
            Ok(Event::Start(element)) => match element.local_name().as_ref() {
                b"t" => in_text_run = true,
                b"p" if !output.is_empty() => output.push_str("\n\n"),
                _ => {}
            },
            Ok(Event::End(element)) => {
                if element.local_name().as_ref() == b"t" {
                    in_text_run = false;
                }
            }
            Ok(Event::Text(text)) if in_text_run => {
                let run = text
                    .unescape()
                    .map_err(|error| ExtractError::DocxParse(error.to_string()))?;
                output.push_str(&run);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(error) => return Err(ExtractError::DocxParse(error.to_string())),
        }
        buffer.clear();
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_roundtrips() {
        let text = extract_text("notes.txt", "Valve maintenance notes.".as_bytes())
            .expect("txt extraction");
        assert_eq!(text, "Valve maintenance notes.");
    }

    #[test]
    fn markdown_is_read_as_utf8() {
        let text = extract_text("readme.md", "# Heading\n\nBody".as_bytes()).expect("md");
        assert_eq!(text, "# Heading\n\nBody");
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let error = extract_text("image.png", b"\x89PNG").unwrap_err();
        assert!(matches!(error, ExtractError::UnsupportedFormat(ref ext) if ext == "png"));
    }

    #[test]
    fn empty_text_file_is_rejected() {
        let error = extract_text("blank.txt", b"   \n ").unwrap_err();
        assert!(matches!(error, ExtractError::EmptyText(_)));
    }

    #[test]
    fn invalid_pdf_bytes_fail_with_parse_error() {
        let error = extract_text("broken.pdf", b"not a pdf").unwrap_err();
        assert!(matches!(error, ExtractError::PdfParse(_)));
    }

    #[test]
    fn invalid_docx_bytes_fail_with_parse_error() {
        let error = extract_text("broken.docx", b"not a zip").unwrap_err();
        assert!(matches!(error, ExtractError::DocxParse(_)));
    }

    #[test]
    fn docx_text_runs_are_joined_with_paragraph_breaks() {
        let xml = br#"<w:document xmlns:w="ns"><w:body>
            <w:p><w:r><w:t>First line</w:t></w:r></w:p>
            <w:p><w:r><w:t>Second line</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let text = text_runs_from_xml(xml).expect("xml runs");
        assert_eq!(text, "First line\n\nSecond line");
    }
}
