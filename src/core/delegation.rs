//! Delegation rosters from UNGA session reports.
//!
//! Text comes out of the PDF with [`PdfTextSource`]; turning it into rows is
//! the job of a [`DelegationExtractor`] the caller builds and hands in.

use crate::adapters::{excel, PdfTextSource};
use crate::config::toml_config::DelegationConfig;
use crate::domain::model::DelegationEntry;
use crate::domain::ports::{DelegationExtractor, Storage};
use crate::utils::error::{EtlError, Result};

pub const DEFAULT_DELEGATION_FILE: &str = "delegation_data.xlsx";

#[derive(Debug, Clone, PartialEq)]
pub struct DelegationSummary {
    pub entries: Vec<DelegationEntry>,
    pub output_path: String,
}

pub struct DelegationPipeline<'a, S: Storage, E: DelegationExtractor> {
    storage: &'a S,
    extractor: &'a E,
    output_file: String,
}

impl<'a, S: Storage, E: DelegationExtractor> DelegationPipeline<'a, S, E> {
    pub fn new(storage: &'a S, extractor: &'a E) -> Self {
        Self {
            storage,
            extractor,
            output_file: DEFAULT_DELEGATION_FILE.to_string(),
        }
    }

    /// Applies the `[delegation]` section of a configuration file.
    pub fn with_config(self, config: &DelegationConfig) -> Self {
        self.with_output_file(config.output_file.as_str())
    }

    pub fn with_output_file(mut self, output_file: impl Into<String>) -> Self {
        self.output_file = output_file.into();
        self
    }

    /// Extracts the report at `pdf_path` and writes the rows as a workbook.
    pub fn run(&self, pdf_path: &str) -> Result<DelegationSummary> {
        let text = PdfTextSource::new(self.storage).read_text(pdf_path)?;
        self.run_text(&text)
    }

    /// Same as [`run`](Self::run) for text that is already extracted.
    pub fn run_text(&self, text: &str) -> Result<DelegationSummary> {
        if text.trim().is_empty() {
            return Err(EtlError::ProcessingError {
                message: "no text extracted from report".to_string(),
            });
        }

        let entries = self.extractor.extract(text)?;
        for entry in &entries {
            if u64::from(entry.attendees) != entry.role_total() {
                tracing::warn!(
                    "{} {}: attendees {} but roles add up to {}",
                    entry.country,
                    entry.year,
                    entry.attendees,
                    entry.role_total()
                );
            }
        }
        tracing::info!("Extracted {} delegation entries", entries.len());

        let data = excel::delegations_to_xlsx(&entries)?;
        self.storage.write_file(&self.output_file, &data)?;

        Ok(DelegationSummary {
            entries,
            output_path: self.output_file.clone(),
        })
    }
}
