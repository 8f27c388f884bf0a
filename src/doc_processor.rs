use serde::{Deserialize, Serialize};
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

/// One page of extracted text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfChunk {
    pub page_number: u32,
    pub content: String,
}

impl PdfChunk {
    pub fn new(page_number: u32, content: impl Into<String>) -> Self {
        Self {
            page_number,
            content: content.into(),
        }
    }
}

/// A file split into page chunks, held in memory for the session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedDocument {
    pub file_name: String,
    pub chunks: Vec<PdfChunk>,
}

impl LoadedDocument {
    pub fn page_count(&self) -> u32 {
        self.chunks.len() as u32
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(String),
    #[error("Document has no pages")]
    NoPages,
}

impl Serialize for ExtractionError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Read a PDF from disk and split it into page chunks. The file name is
/// not consulted: whatever the bytes are, they go to the PDF parser.
pub fn load_document(path: &Path) -> Result<LoadedDocument, ExtractionError> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    let bytes = fs::read(path)?;
    let chunks = extract_pages(&bytes)?;

    log::info!("Extracted {} pages from {}", chunks.len(), file_name);
    Ok(LoadedDocument { file_name, chunks })
}

/// Extract one chunk per page from in-memory PDF bytes.
///
/// Pages without extractable text yield an empty chunk. Any failure to parse
/// the file as a whole (corrupt, encrypted, not a PDF) is a single error.
pub fn extract_pages(bytes: &[u8]) -> Result<Vec<PdfChunk>, ExtractionError> {
    // pdf-extract panics instead of erroring on some malformed inputs
    let pages = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    }))
    .map_err(|_| ExtractionError::Parse("extractor aborted on malformed input".into()))?
    .map_err(|e| ExtractionError::Parse(e.to_string()))?;

    into_chunks(pages)
}

fn into_chunks(pages: Vec<String>) -> Result<Vec<PdfChunk>, ExtractionError> {
    if pages.is_empty() {
        return Err(ExtractionError::NoPages);
    }
    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(i, text)| PdfChunk::new(i as u32 + 1, text.trim()))
        .collect())
}
