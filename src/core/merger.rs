use crate::adapters::CalamineReader;
use crate::core::extractor;
use crate::domain::model::{
    ContributionRecord, Era, ExtractResult, MergeReport, MergedDataset, SkipReason, SourceOutcome,
    SourceReport,
};
use crate::domain::ports::SheetReader;
use crate::utils::error::Result;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Name prefixes of office-suite lock and temporary files.
pub const LOCK_FILE_PREFIXES: [&str; 2] = ["~$", ".~lock."];

pub const DEFAULT_SOURCE_EXTENSIONS: [&str; 1] = ["xlsx"];

/// Year tag of a source that would be read, or why it is skipped.
pub type SourceDecision = std::result::Result<i32, SkipReason>;

fn year_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[0-9]{4}").expect("static year pattern is valid"))
}

/// First run of four digits in a file name, e.g. `contributions_2005.xlsx` -> 2005.
pub fn year_from_file_name(file_name: &str) -> Option<i32> {
    year_pattern()
        .find(file_name)
        .and_then(|m| m.as_str().parse().ok())
}

pub fn is_lock_file(file_name: &str) -> bool {
    LOCK_FILE_PREFIXES
        .iter()
        .any(|prefix| file_name.starts_with(prefix))
}

fn has_extension(file_name: &str, extensions: &[String]) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// A directory entry; `is_file` follows symlinks.
struct SourceEntry {
    file_name: String,
    path: PathBuf,
    is_file: bool,
}

/// Every entry of `dir`, sorted by file name.
fn sorted_entries(dir: &Path) -> Result<Vec<SourceEntry>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        // Broken links and unreadable targets count as non-files.
        let is_file = fs::metadata(&path).map(|m| m.is_file()).unwrap_or(false);
        entries.push(SourceEntry {
            file_name: entry.file_name().to_string_lossy().into_owned(),
            path,
            is_file,
        });
    }
    entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(entries)
}

/// Merges every contribution workbook in a directory into one dataset.
pub struct ContributionMerger<R: SheetReader> {
    reader: R,
    extensions: Vec<String>,
}

impl<R: SheetReader> ContributionMerger<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            extensions: DEFAULT_SOURCE_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }

    pub fn with_extensions(mut self, extensions: &[String]) -> Self {
        self.extensions = extensions.to_vec();
        self
    }

    /// Classifies a file without opening it.
    ///
    /// Returns the year tag, or the reason the file is skipped outright.
    /// Years outside every era are rejected here so the file is never read.
    pub fn screen(&self, file_name: &str) -> SourceDecision {
        if is_lock_file(file_name) {
            return Err(SkipReason::LockFile);
        }
        if !has_extension(file_name, &self.extensions) {
            return Err(SkipReason::UnsupportedExtension);
        }
        let year = year_from_file_name(file_name).ok_or(SkipReason::MissingYear)?;
        match Era::for_year(year) {
            Some(_) => Ok(year),
            None => Err(SkipReason::YearOutOfRange(year)),
        }
    }

    /// Screens an entry by name, then rejects candidates that are not files.
    fn classify(&self, entry: &SourceEntry) -> SourceDecision {
        let year = self.screen(&entry.file_name)?;
        if !entry.is_file {
            return Err(SkipReason::NotAFile);
        }
        Ok(year)
    }

    /// What a merge of `dir` would do with each entry, without reading any of them.
    pub fn plan(&self, dir: &Path) -> Result<Vec<(String, SourceDecision)>> {
        Ok(sorted_entries(dir)?
            .into_iter()
            .map(|entry| {
                let decision = self.classify(&entry);
                (entry.file_name, decision)
            })
            .collect())
    }

    fn process_file(
        &self,
        entry: &SourceEntry,
    ) -> (Option<i32>, SourceOutcome, Vec<ContributionRecord>) {
        let file_name = entry.file_name.as_str();
        let year = match self.classify(entry) {
            Ok(year) => year,
            Err(reason) => {
                let year = year_from_file_name(file_name);
                return (year, SourceOutcome::Skipped { reason }, Vec::new());
            }
        };

        tracing::info!("Processing {} for year {}", file_name, year);

        // The reader owns the file handle only for the duration of this call.
        let table = match self.reader.read_table(&entry.path) {
            Ok(table) => table,
            Err(e) => {
                let reason = SkipReason::Unreadable(e.to_string());
                return (Some(year), SourceOutcome::Skipped { reason }, Vec::new());
            }
        };

        match extractor::try_extract(&table, Some(year)) {
            Ok(records) => {
                let outcome = SourceOutcome::Loaded {
                    records: records.len(),
                };
                (Some(year), outcome, records)
            }
            Err(reason) => (Some(year), SourceOutcome::Skipped { reason }, Vec::new()),
        }
    }

    /// Merges the directory and reports what happened to every file.
    pub fn merge_with_report(&self, dir: &Path) -> Result<ExtractResult> {
        let mut records = Vec::new();
        let mut report = MergeReport::default();

        for entry in sorted_entries(dir)? {
            let (year, outcome, file_records) = self.process_file(&entry);
            let file_name = entry.file_name;
            match &outcome {
                SourceOutcome::Loaded { records: n } => {
                    tracing::debug!("{}: {} records", file_name, n);
                }
                SourceOutcome::Skipped {
                    reason: SkipReason::LockFile | SkipReason::UnsupportedExtension,
                } => {
                    tracing::debug!("Ignoring {}", file_name);
                }
                SourceOutcome::Skipped { reason } => {
                    tracing::warn!("Skipping {}: {}", file_name, reason);
                }
            }
            records.extend(file_records);
            report.sources.push(SourceReport {
                file_name,
                year,
                outcome,
            });
        }

        if records.is_empty() {
            tracing::warn!("No data found in {}", dir.display());
        }

        Ok(ExtractResult {
            dataset: MergedDataset::new(records),
            report,
        })
    }

    pub fn merge(&self, dir: &Path) -> Result<MergedDataset> {
        Ok(self.merge_with_report(dir)?.dataset)
    }
}

/// Merges a directory with the default calamine reader.
pub fn merge<P: AsRef<Path>>(dir: P) -> Result<MergedDataset> {
    ContributionMerger::new(CalamineReader::new()).merge(dir.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::SourceTable;
    use crate::utils::error::EtlError;
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// Serves canned tables keyed by file name; unknown names fail to read.
    struct MockReader {
        tables: HashMap<String, SourceTable>,
    }

    impl SheetReader for MockReader {
        fn read_table(&self, path: &Path) -> Result<SourceTable> {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            self.tables
                .get(&name)
                .cloned()
                .ok_or_else(|| EtlError::ProcessingError {
                    message: format!("corrupt workbook {}", name),
                })
        }
    }

    fn late_table(country: &str, assessed: &str) -> SourceTable {
        let mut header: Vec<String> = (0..9).map(|i| format!("c{}", i)).collect();
        header[0] = "Member State".into();
        let mut data = vec![String::new(); 9];
        data[0] = country.into();
        data[8] = assessed.into();
        SourceTable::new(vec![header, data])
    }

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn test_year_from_file_name() {
        assert_eq!(year_from_file_name("contributions_2005.xlsx"), Some(2005));
        assert_eq!(year_from_file_name("2012 status.xlsx"), Some(2012));
        assert_eq!(year_from_file_name("report_12345.xlsx"), Some(1234));
        assert_eq!(year_from_file_name("a1_b22_2014.xlsx"), Some(2014));
        assert_eq!(year_from_file_name("contributions.xlsx"), None);
        // Only ASCII digits form a year tag.
        assert_eq!(
            year_from_file_name("report_\u{0662}\u{0660}\u{0661}\u{0669}_2005.xlsx"),
            Some(2005)
        );
        assert_eq!(year_from_file_name("\u{0662}\u{0660}\u{0661}\u{0669}.xlsx"), None);
    }

    #[test]
    fn test_is_lock_file() {
        assert!(is_lock_file("~$contributions_2005.xlsx"));
        assert!(is_lock_file(".~lock.contributions_2005.xlsx#"));
        assert!(!is_lock_file("contributions_2005.xlsx"));
    }

    #[test]
    fn test_screen() {
        let merger = ContributionMerger::new(MockReader {
            tables: HashMap::new(),
        });
        assert_eq!(merger.screen("un_2005.xlsx"), Ok(2005));
        assert_eq!(merger.screen("UN_2005.XLSX"), Ok(2005));
        assert_eq!(merger.screen("~$un_2005.xlsx"), Err(SkipReason::LockFile));
        assert_eq!(
            merger.screen("un_2005.csv"),
            Err(SkipReason::UnsupportedExtension)
        );
        assert_eq!(merger.screen("summary.xlsx"), Err(SkipReason::MissingYear));
        assert_eq!(
            merger.screen("un_2017.xlsx"),
            Err(SkipReason::YearOutOfRange(2017))
        );
    }

    #[test]
    fn test_plan_lists_every_entry_without_reading() {
        let dir = TempDir::new().unwrap();
        for name in ["un_2005.xlsx", "~$un_2005.xlsx", "notes.txt", "un_1999.xlsx"] {
            touch(dir.path(), name);
        }
        fs::create_dir(dir.path().join("un_2006.xlsx")).unwrap();

        // The reader has no tables, so any read would fail.
        let plan = ContributionMerger::new(MockReader {
            tables: HashMap::new(),
        })
        .plan(dir.path())
        .unwrap();

        assert_eq!(
            plan,
            vec![
                ("notes.txt".to_string(), Err(SkipReason::UnsupportedExtension)),
                ("un_1999.xlsx".to_string(), Err(SkipReason::YearOutOfRange(1999))),
                ("un_2005.xlsx".to_string(), Ok(2005)),
                ("un_2006.xlsx".to_string(), Err(SkipReason::NotAFile)),
                ("~$un_2005.xlsx".to_string(), Err(SkipReason::LockFile)),
            ]
        );
    }

    #[test]
    fn test_plan_of_missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = ContributionMerger::new(MockReader {
            tables: HashMap::new(),
        })
        .plan(&dir.path().join("nope"));

        assert!(matches!(result, Err(EtlError::IoError(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_workbooks_are_merged() {
        let dir = TempDir::new().unwrap();
        let elsewhere = TempDir::new().unwrap();
        touch(elsewhere.path(), "status_2012.xlsx");
        std::os::unix::fs::symlink(
            elsewhere.path().join("status_2012.xlsx"),
            dir.path().join("un_2012.xlsx"),
        )
        .unwrap();
        std::os::unix::fs::symlink(
            elsewhere.path().join("missing_2013.xlsx"),
            dir.path().join("un_2013.xlsx"),
        )
        .unwrap();
        let tables = HashMap::from([("un_2012.xlsx".to_string(), late_table("Botswana", "4"))]);

        let result = ContributionMerger::new(MockReader { tables })
            .merge_with_report(dir.path())
            .unwrap();

        assert_eq!(result.dataset.len(), 1);
        assert_eq!(result.dataset.records[0].country, "Botswana");
        assert_eq!(result.report.sources.len(), 2);
        assert_eq!(
            result.report.sources[1].outcome,
            SourceOutcome::Skipped {
                reason: SkipReason::NotAFile
            }
        );
    }

    #[test]
    fn test_merge_concatenates_in_file_name_order() {
        let dir = TempDir::new().unwrap();
        for name in ["b_2013.xlsx", "a_2012.xlsx", "c_2011.xlsx"] {
            touch(dir.path(), name);
        }
        let tables = HashMap::from([
            ("a_2012.xlsx".to_string(), late_table("Belarus", "1")),
            ("b_2013.xlsx".to_string(), late_table("Belize", "2")),
            ("c_2011.xlsx".to_string(), late_table("Benin", "3")),
        ]);

        let dataset = ContributionMerger::new(MockReader { tables })
            .merge(dir.path())
            .unwrap();

        let rows: Vec<(i32, &str)> = dataset
            .records
            .iter()
            .map(|r| (r.year, r.country.as_str()))
            .collect();
        assert_eq!(rows, vec![(2012, "Belarus"), (2013, "Belize"), (2011, "Benin")]);
    }

    #[test]
    fn test_corrupt_and_lock_files_do_not_abort_the_batch() {
        let dir = TempDir::new().unwrap();
        for name in ["~$valid_2012.xlsx", "corrupt_2013.xlsx", "valid_2012.xlsx"] {
            touch(dir.path(), name);
        }
        let tables = HashMap::from([
            ("valid_2012.xlsx".to_string(), late_table("Bhutan", "9")),
            // Would load if the lock file were ever opened.
            ("~$valid_2012.xlsx".to_string(), late_table("Lock", "1")),
        ]);

        let result = ContributionMerger::new(MockReader { tables })
            .merge_with_report(dir.path())
            .unwrap();

        assert_eq!(result.dataset.len(), 1);
        assert_eq!(result.dataset.records[0].country, "Bhutan");
        assert_eq!(result.report.loaded(), 1);
        assert_eq!(result.report.skipped(), 2);
        assert!(matches!(
            result.report.sources[0].outcome,
            SourceOutcome::Skipped {
                reason: SkipReason::Unreadable(_)
            }
        ));
        assert_eq!(result.report.sources[2].file_name, "~$valid_2012.xlsx");
        assert_eq!(
            result.report.sources[2].outcome,
            SourceOutcome::Skipped {
                reason: SkipReason::LockFile
            }
        );
    }

    #[test]
    fn test_out_of_range_years_are_skipped() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "un_1999.xlsx");
        touch(dir.path(), "un_2020.xlsx");
        let tables = HashMap::from([
            ("un_1999.xlsx".to_string(), late_table("Bolivia", "1")),
            ("un_2020.xlsx".to_string(), late_table("Bolivia", "2")),
        ]);

        let result = ContributionMerger::new(MockReader { tables })
            .merge_with_report(dir.path())
            .unwrap();

        assert!(result.dataset.is_empty());
        assert_eq!(
            result.report.sources[0].outcome,
            SourceOutcome::Skipped {
                reason: SkipReason::YearOutOfRange(1999)
            }
        );
    }

    #[test]
    fn test_empty_directory_yields_empty_dataset() {
        let dir = TempDir::new().unwrap();
        let dataset = ContributionMerger::new(MockReader {
            tables: HashMap::new(),
        })
        .merge(dir.path())
        .unwrap();

        assert!(dataset.is_empty());
        assert_eq!(dataset.columns(), &MergedDataset::COLUMNS);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let result = ContributionMerger::new(MockReader {
            tables: HashMap::new(),
        })
        .merge(&missing);

        assert!(matches!(result, Err(EtlError::IoError(_))));
    }
}
