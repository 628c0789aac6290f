//! PDF text extraction (§4.1 expansion: the Chunker's upstream source for
//! `document_type == pdf`).
//!
//! The base crate's multi-format extractor covered PDF, DOCX, PPTX and
//! XLSX; this engine's [`crate::models::DocumentType`] closed set only
//! includes `pdf`, so only that path survives here.

/// PDF extraction error; the pipeline skips the document rather than panic.
#[derive(Debug)]
pub struct PdfExtractError(String);

impl std::fmt::Display for PdfExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PDF extraction failed: {}", self.0)
    }
}

impl std::error::Error for PdfExtractError {}

/// Extracts plain UTF-8 text from PDF bytes.
pub fn extract_text(bytes: &[u8]) -> Result<String, PdfExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| PdfExtractError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_text(b"not a pdf").unwrap_err();
        assert!(err.to_string().contains("PDF extraction failed"));
    }
}
