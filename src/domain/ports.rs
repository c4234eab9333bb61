use crate::domain::model::{
    DelegationEntry, ExtractResult, ExtractedTable, SourceTable, TransformResult,
};
use crate::utils::error::Result;
use std::path::Path;

pub trait Storage {
    fn read_file(&self, path: &str) -> Result<Vec<u8>>;
    fn write_file(&self, path: &str, data: &[u8]) -> Result<()>;
}

pub trait ConfigProvider {
    /// Directory holding the per-year contribution workbooks.
    fn input_dir(&self) -> &str;
    fn output_path(&self) -> &str;
    /// File name of the merged workbook, relative to `output_path`.
    fn output_file(&self) -> &str;
    /// Output formats: "xlsx" is always written, "csv" and "json" on request.
    fn output_formats(&self) -> &[String];
    /// Source file extensions considered by the merger, lowercase, no dot.
    fn source_extensions(&self) -> &[String];
    /// When set, every output is written into one zip archive of this name.
    fn bundle_name(&self) -> Option<&str> {
        None
    }
}

/// Reads the first worksheet of a workbook into a [`SourceTable`].
///
/// Implementations must release the file before returning.
pub trait SheetReader {
    fn read_table(&self, path: &Path) -> Result<SourceTable>;
}

/// Pulls delegation rows out of report text, e.g. with a language model.
pub trait DelegationExtractor {
    fn extract(&self, text: &str) -> Result<Vec<DelegationEntry>>;
}

/// Detects tables in a PDF document.
pub trait TableExtractor {
    fn extract_tables(&self, pdf: &[u8]) -> Result<Vec<ExtractedTable>>;
}

pub trait Pipeline {
    fn extract(&self) -> Result<ExtractResult>;
    fn transform(&self, data: ExtractResult) -> Result<TransformResult>;
    fn load(&self, result: TransformResult) -> Result<String>;
}
