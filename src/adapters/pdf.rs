use crate::domain::ports::Storage;
use crate::utils::error::{EtlError, Result};

/// Plain text of a PDF read through a [`Storage`], pages concatenated.
pub struct PdfTextSource<'a, S: Storage> {
    storage: &'a S,
}

impl<'a, S: Storage> PdfTextSource<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    pub fn read_text(&self, path: &str) -> Result<String> {
        let bytes = self.storage.read_file(path)?;
        tracing::debug!("Extracting text from {} ({} bytes)", path, bytes.len());
        extract_text(&bytes)
    }
}

pub fn extract_text(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| EtlError::PdfError {
        message: e.to_string(),
    })
}
