//! PDF text extraction.

use crate::extract::notebook::truncate_chars;

/// Extract text page by page until the character budget is reached. A
/// page that fails to extract is skipped; a document that fails to load
/// yields an empty string.
pub fn extract_pdf_text(bytes: &[u8], char_budget: usize) -> String {
    let doc = match lopdf::Document::load_mem(bytes) {
        Ok(d) => d,
        Err(e) => {
            tracing::debug!("pdf load failed: {e}");
            return String::new();
        }
    };

    let mut out = String::new();
    for page_number in doc.get_pages().keys() {
        match doc.extract_text(&[*page_number]) {
            Ok(text) => {
                out.push_str(text.trim_end());
                out.push_str("\n\n");
            }
            Err(e) => {
                tracing::debug!(page = page_number, "pdf page extraction failed: {e}");
            }
        }
        if out.chars().count() >= char_budget {
            break;
        }
    }

    truncate_chars(out.trim_end().to_string(), char_budget)
}
