use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Raw cells of one worksheet, row-major, every cell rendered as a string.
///
/// Column positions match the sheet: leading blank rows and columns are
/// kept as empty cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceTable {
    pub rows: Vec<Vec<String>>,
}

impl SourceTable {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }
}

/// Reporting era. Each era has its own fixed column layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Era {
    /// 2000 through 2010: annual and outstanding figures reported separately.
    Early,
    /// 2011 through 2016: one assessed figure per country.
    Late,
}

/// Positional layout of a source sheet. Indices are zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EraLayout {
    pub first_year: i32,
    pub last_year: i32,
    /// Rows above the column-label row.
    pub header_skip: usize,
    pub annual_column: Option<usize>,
    pub outstanding_column: Option<usize>,
    pub assessed_column: Option<usize>,
}

pub const EARLY_LAYOUT: EraLayout = EraLayout {
    first_year: 2000,
    last_year: 2010,
    header_skip: 2,
    annual_column: Some(5),
    outstanding_column: Some(8),
    assessed_column: None,
};

pub const LATE_LAYOUT: EraLayout = EraLayout {
    first_year: 2011,
    last_year: 2016,
    header_skip: 0,
    annual_column: None,
    outstanding_column: None,
    assessed_column: Some(8),
};

impl Era {
    pub const ALL: [Era; 2] = [Era::Early, Era::Late];

    pub fn for_year(year: i32) -> Option<Era> {
        Era::ALL.into_iter().find(|era| {
            let layout = era.layout();
            (layout.first_year..=layout.last_year).contains(&year)
        })
    }

    pub fn layout(self) -> &'static EraLayout {
        match self {
            Era::Early => &EARLY_LAYOUT,
            Era::Late => &LATE_LAYOUT,
        }
    }
}

/// One country-year row of the merged output.
///
/// Field order is the output column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributionRecord {
    pub year: i32,
    pub country: String,
    pub annual_contributions: Option<f64>,
    pub total_outstanding_contributions: Option<f64>,
    pub assessed_contributions: Option<f64>,
}

/// All records of one run, in file-processing order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergedDataset {
    pub records: Vec<ContributionRecord>,
}

impl MergedDataset {
    pub const COLUMNS: [&'static str; 5] = [
        "year",
        "country",
        "annual_contributions",
        "total_outstanding_contributions",
        "assessed_contributions",
    ];

    pub fn new(records: Vec<ContributionRecord>) -> Self {
        Self { records }
    }

    pub fn columns(&self) -> &'static [&'static str] {
        &Self::COLUMNS
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records_per_year(&self) -> BTreeMap<i32, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.year).or_insert(0) += 1;
        }
        counts
    }
}

/// Why a source file contributed no records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    LockFile,
    UnsupportedExtension,
    MissingYear,
    YearOutOfRange(i32),
    NotAFile,
    Unreadable(String),
    TooFewColumns(usize),
    NoDataRows,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::LockFile => write!(f, "lock or temporary file"),
            SkipReason::UnsupportedExtension => write!(f, "unsupported file extension"),
            SkipReason::MissingYear => write!(f, "no 4-digit year in file name"),
            SkipReason::YearOutOfRange(year) => write!(f, "year {} out of range", year),
            SkipReason::NotAFile => write!(f, "not a regular file"),
            SkipReason::Unreadable(message) => write!(f, "unreadable: {}", message),
            SkipReason::TooFewColumns(n) => write!(f, "only {} columns, need at least 3", n),
            SkipReason::NoDataRows => write!(f, "no data rows"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceOutcome {
    Loaded { records: usize },
    Skipped { reason: SkipReason },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReport {
    pub file_name: String,
    pub year: Option<i32>,
    pub outcome: SourceOutcome,
}

/// Per-file outcomes of one merge, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeReport {
    pub sources: Vec<SourceReport>,
}

impl MergeReport {
    pub fn loaded(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| matches!(s.outcome, SourceOutcome::Loaded { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.sources.len() - self.loaded()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExtractResult {
    pub dataset: MergedDataset,
    pub report: MergeReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub generated_at: DateTime<Utc>,
    pub total_records: usize,
    pub records_per_year: BTreeMap<i32, usize>,
    pub sources_loaded: usize,
    pub sources_skipped: usize,
    pub sources: Vec<SourceReport>,
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub dataset: MergedDataset,
    pub csv_output: String,
    pub summary: RunSummary,
}

/// One country's delegation to a UNGA session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationEntry {
    pub country: String,
    pub year: i32,
    /// Officials listed before the representatives.
    pub officials: u32,
    /// 1 when a head of state or government is among the officials.
    pub leader_present: u8,
    pub representatives: u32,
    pub alternate_representatives: u32,
    pub advisers: u32,
    pub attendees: u32,
}

impl DelegationEntry {
    pub const COLUMNS: [&'static str; 8] = [
        "country",
        "year",
        "officials",
        "leader_present",
        "representatives",
        "alternate_representatives",
        "advisers",
        "attendees",
    ];

    /// Sum of the role counts, widened so extractor output cannot overflow it.
    pub fn role_total(&self) -> u64 {
        [
            self.officials,
            self.representatives,
            self.alternate_representatives,
            self.advisers,
        ]
        .iter()
        .map(|&n| u64::from(n))
        .sum()
    }
}

/// A table pulled out of a PDF page.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedTable {
    /// 1-based page number in the document.
    pub page: usize,
    /// 1-based position of the table on its page.
    pub index: usize,
    /// First row is the header.
    pub rows: Vec<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_era_boundaries() {
        assert_eq!(Era::for_year(1999), None);
        assert_eq!(Era::for_year(2000), Some(Era::Early));
        assert_eq!(Era::for_year(2010), Some(Era::Early));
        assert_eq!(Era::for_year(2011), Some(Era::Late));
        assert_eq!(Era::for_year(2016), Some(Era::Late));
        assert_eq!(Era::for_year(2017), None);
        assert_eq!(Era::for_year(2020), None);
    }

    #[test]
    fn test_records_per_year() {
        let record = |year| ContributionRecord {
            year,
            country: "Chad".into(),
            annual_contributions: None,
            total_outstanding_contributions: None,
            assessed_contributions: None,
        };
        let dataset = MergedDataset::new(vec![record(2005), record(2012), record(2005)]);
        let counts = dataset.records_per_year();
        assert_eq!(counts.get(&2005), Some(&2));
        assert_eq!(counts.get(&2012), Some(&1));
    }

    #[test]
    fn test_role_total() {
        let entry = DelegationEntry {
            country: "Ethiopia".into(),
            year: 2019,
            officials: 2,
            leader_present: 1,
            representatives: 5,
            alternate_representatives: 5,
            advisers: 3,
            attendees: 15,
        };
        assert_eq!(entry.role_total(), 15);
    }

    #[test]
    fn test_role_total_does_not_overflow() {
        let entry = DelegationEntry {
            country: "Fiji".into(),
            year: 2019,
            officials: u32::MAX,
            leader_present: 0,
            representatives: 1,
            alternate_representatives: u32::MAX,
            advisers: 0,
            attendees: 3,
        };
        assert_eq!(entry.role_total(), 2 * u64::from(u32::MAX) + 1);
    }
}
