// Adapters layer: concrete implementations for external formats (spreadsheets, PDF).

pub mod excel;
pub mod pdf;

pub use excel::CalamineReader;
pub use pdf::PdfTextSource;
