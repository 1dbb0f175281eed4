//! PDF text extraction via lopdf.

use crate::errors::AppError;

/// Extracted text of a single page, 1-indexed.
#[derive(Debug, Clone)]
pub struct PageText {
    pub number: i32,
    pub text: String,
}

/// Extract per-page text from raw PDF bytes.
///
/// Pages whose content streams cannot be decoded are kept as empty pages so
/// page numbering stays aligned with the source document.
pub fn extract_pages(data: &[u8]) -> Result<Vec<PageText>, AppError> {
    let doc = lopdf::Document::load_mem(data)
        .map_err(|e| AppError::Extraction(format!("failed to load PDF: {e}")))?;

    let mut pages = Vec::new();
    for (number, _) in doc.get_pages() {
        let text = match doc.extract_text(&[number]) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(page = number, error = %e, "Failed to extract page text");
                String::new()
            }
        };
        pages.push(PageText {
            number: number as i32,
            text,
        });
    }

    if pages.is_empty() {
        return Err(AppError::Extraction("PDF contains no pages".to_string()));
    }

    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// Build a minimal single-page PDF with the given text.
    fn minimal_pdf(text: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![50.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().unwrap(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn rejects_non_pdf_bytes() {
        let err = extract_pages(b"this is not a pdf").unwrap_err();
        assert!(matches!(err, AppError::Extraction(_)));
    }

    #[test]
    fn extracts_text_from_single_page() {
        let bytes = minimal_pdf("Hello agentchat");
        let pages = extract_pages(&bytes).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].number, 1);
        assert!(pages[0].text.contains("Hello agentchat"));
    }
}
