use crate::adapters::excel;
use crate::config::toml_config::TablesConfig;
use crate::domain::model::ExtractedTable;
use crate::domain::ports::{Storage, TableExtractor};
use crate::utils::error::Result;

/// Report body starts on page 6; earlier pages are front matter.
pub const DEFAULT_FIRST_PAGE: usize = 6;
pub const DEFAULT_TABLES_FILE: &str = "docling_extracted_tables_by_sheet.xlsx";

pub fn sheet_name(table: &ExtractedTable) -> String {
    excel::truncate_sheet_name(&format!("Page{}_Table{}", table.page, table.index))
}

/// Tables from `first_page` on, named for their sheet, in document order.
pub fn select_tables(
    tables: Vec<ExtractedTable>,
    first_page: usize,
) -> Vec<(String, Vec<Vec<String>>)> {
    tables
        .into_iter()
        .filter(|t| t.page >= first_page)
        .map(|t| (sheet_name(&t), t.rows))
        .collect()
}

/// Writes every table of a PDF to its own sheet.
pub struct TableExport<'a, S: Storage, T: TableExtractor> {
    storage: &'a S,
    extractor: &'a T,
    first_page: usize,
    output_file: String,
}

impl<'a, S: Storage, T: TableExtractor> TableExport<'a, S, T> {
    pub fn new(storage: &'a S, extractor: &'a T) -> Self {
        Self {
            storage,
            extractor,
            first_page: DEFAULT_FIRST_PAGE,
            output_file: DEFAULT_TABLES_FILE.to_string(),
        }
    }

    /// Applies the `[tables]` section of a configuration file.
    pub fn with_config(self, config: &TablesConfig) -> Self {
        self.with_first_page(config.first_page)
            .with_output_file(config.output_file.as_str())
    }

    pub fn with_first_page(mut self, first_page: usize) -> Self {
        self.first_page = first_page;
        self
    }

    pub fn with_output_file(mut self, output_file: impl Into<String>) -> Self {
        self.output_file = output_file.into();
        self
    }

    /// Returns the workbook path, or `None` when no table qualified.
    pub fn run(&self, pdf_path: &str) -> Result<Option<String>> {
        let pdf = self.storage.read_file(pdf_path)?;
        let tables = self.extractor.extract_tables(&pdf)?;
        self.export(tables)
    }

    pub fn export(&self, tables: Vec<ExtractedTable>) -> Result<Option<String>> {
        let sheets = select_tables(tables, self.first_page);
        if sheets.is_empty() {
            tracing::warn!("No tables found starting from page {}", self.first_page);
            return Ok(None);
        }

        let data = excel::sheets_to_xlsx(&sheets)?;
        self.storage.write_file(&self.output_file, &data)?;
        tracing::info!(
            "{} tables saved to {} (one per sheet)",
            sheets.len(),
            self.output_file
        );
        Ok(Some(self.output_file.clone()))
    }
}
