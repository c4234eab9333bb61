use crate::adapters::excel;
use crate::core::merger::ContributionMerger;
use crate::core::{ConfigProvider, ExtractResult, Pipeline, Storage, TransformResult};
use crate::domain::model::{MergedDataset, RunSummary};
use crate::domain::ports::SheetReader;
use crate::utils::error::{EtlError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::{SimpleFileOptions, ZipWriter};

pub const SUMMARY_FILE: &str = "summary.json";

/// Merges a directory of yearly contribution workbooks into one output table.
pub struct ContributionsPipeline<S: Storage, C: ConfigProvider, R: SheetReader> {
    storage: S,
    config: C,
    merger: ContributionMerger<R>,
}

impl<S: Storage, C: ConfigProvider, R: SheetReader> ContributionsPipeline<S, C, R> {
    pub fn new(storage: S, config: C, reader: R) -> Self {
        let merger = ContributionMerger::new(reader).with_extensions(config.source_extensions());
        Self {
            storage,
            config,
            merger,
        }
    }

    fn wants(&self, format: &str) -> bool {
        self.config.output_formats().iter().any(|f| f == format)
    }

    /// File name next to the workbook, e.g. `contributions.xlsx` -> `contributions.csv`.
    fn sibling_name(&self, extension: &str) -> String {
        Path::new(self.config.output_file())
            .with_extension(extension)
            .to_string_lossy()
            .into_owned()
    }

    fn output_location(&self, file_name: &str) -> String {
        let path: PathBuf = Path::new(self.config.output_path()).join(file_name);
        path.to_string_lossy().into_owned()
    }

    /// Every requested output as `(file name, bytes)`, workbook first.
    fn render_outputs(&self, result: &TransformResult) -> Result<Vec<(String, Vec<u8>)>> {
        let mut outputs = vec![(
            self.config.output_file().to_string(),
            excel::dataset_to_xlsx(&result.dataset)?,
        )];

        if self.wants("csv") {
            outputs.push((self.sibling_name("csv"), result.csv_output.clone().into_bytes()));
        }

        if self.wants("json") {
            outputs.push((
                self.sibling_name("json"),
                serde_json::to_vec_pretty(&result.dataset.records)?,
            ));
            outputs.push((
                SUMMARY_FILE.to_string(),
                serde_json::to_vec_pretty(&result.summary)?,
            ));
        }

        Ok(outputs)
    }
}

/// CSV with the fixed column order; missing values are empty fields.
pub fn dataset_to_csv(dataset: &MergedDataset) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    // serde only emits the header with the first record.
    if dataset.is_empty() {
        writer.write_record(MergedDataset::COLUMNS)?;
    }
    for record in &dataset.records {
        writer.serialize(record)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| EtlError::ProcessingError {
            message: format!("CSV buffer flush failed: {}", e),
        })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

impl<S: Storage, C: ConfigProvider, R: SheetReader> Pipeline for ContributionsPipeline<S, C, R> {
    fn extract(&self) -> Result<ExtractResult> {
        let input_dir = Path::new(self.config.input_dir());
        tracing::info!("Reading contribution workbooks from {}", input_dir.display());

        let result = self.merger.merge_with_report(input_dir)?;
        tracing::info!(
            "{} sources loaded, {} skipped",
            result.report.loaded(),
            result.report.skipped()
        );
        Ok(result)
    }

    fn transform(&self, data: ExtractResult) -> Result<TransformResult> {
        let ExtractResult { dataset, report } = data;

        let csv_output = dataset_to_csv(&dataset)?;
        let summary = RunSummary {
            generated_at: chrono::Utc::now(),
            total_records: dataset.len(),
            records_per_year: dataset.records_per_year(),
            sources_loaded: report.loaded(),
            sources_skipped: report.skipped(),
            sources: report.sources,
        };

        for (year, count) in &summary.records_per_year {
            tracing::debug!("{}: {} records", year, count);
        }

        Ok(TransformResult {
            dataset,
            csv_output,
            summary,
        })
    }

    fn load(&self, result: TransformResult) -> Result<String> {
        let outputs = self.render_outputs(&result)?;

        let Some(bundle) = self.config.bundle_name() else {
            for (name, data) in &outputs {
                tracing::debug!("Writing {} ({} bytes)", name, data.len());
                self.storage.write_file(name, data)?;
            }
            return Ok(self.output_location(self.config.output_file()));
        };

        tracing::debug!("Creating ZIP file with {} files", outputs.len());
        let zip_data = {
            let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
            for (name, data) in &outputs {
                zip.start_file(name.as_str(), SimpleFileOptions::default())?;
                zip.write_all(data)?;
            }
            zip.finish()?.into_inner()
        };

        tracing::debug!("Writing ZIP file ({} bytes) to storage", zip_data.len());
        self.storage.write_file(bundle, &zip_data)?;
        Ok(self.output_location(bundle))
    }
}
