use crate::domain::model::{ContributionRecord, Era, SkipReason, SourceTable};

/// Sources with fewer columns than this are not contribution tables.
pub const MIN_COLUMNS: usize = 3;

/// Coerces a cell to a number.
///
/// Spaces and thousands separators are dropped first. Empty or
/// unparseable cells are missing, never zero.
pub fn clean_numeric(cell: &str) -> Option<f64> {
    let cleaned: String = cell.chars().filter(|c| *c != ' ' && *c != ',').collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|value| !value.is_nan())
}

/// Assessed figure for the early era.
///
/// A single present side is taken as is; both missing stays missing.
pub fn combine_assessed(annual: Option<f64>, outstanding: Option<f64>) -> Option<f64> {
    match (annual, outstanding) {
        (Some(annual), Some(outstanding)) => Some(annual + outstanding),
        (Some(annual), None) => Some(annual),
        (None, Some(outstanding)) => Some(outstanding),
        (None, None) => None,
    }
}

fn cell(row: &[String], column: usize) -> &str {
    row.get(column).map(String::as_str).unwrap_or("")
}

fn is_blank(row: &[String]) -> bool {
    row.iter().all(|c| c.trim().is_empty())
}

/// Extracts contribution records, or the reason the source was rejected.
pub fn try_extract(
    table: &SourceTable,
    year: Option<i32>,
) -> std::result::Result<Vec<ContributionRecord>, SkipReason> {
    let year = year.ok_or(SkipReason::MissingYear)?;
    let era = Era::for_year(year).ok_or(SkipReason::YearOutOfRange(year))?;
    let layout = era.layout();

    let rows = table.rows.get(layout.header_skip..).unwrap_or(&[]);
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    if width < MIN_COLUMNS {
        return Err(SkipReason::TooFewColumns(width));
    }

    let Some((header, data)) = rows.split_first() else {
        return Err(SkipReason::NoDataRows);
    };
    tracing::debug!("{:?} era layout for {}, header: {:?}", era, year, header);

    let records: Vec<ContributionRecord> = data
        .iter()
        .filter(|row| !is_blank(row))
        .map(|row| {
            let annual = layout
                .annual_column
                .and_then(|c| clean_numeric(cell(row, c)));
            let outstanding = layout
                .outstanding_column
                .and_then(|c| clean_numeric(cell(row, c)));
            let assessed = match layout.assessed_column {
                Some(c) => clean_numeric(cell(row, c)),
                None => combine_assessed(annual, outstanding),
            };

            ContributionRecord {
                year,
                country: cell(row, 0).trim().to_string(),
                annual_contributions: annual,
                total_outstanding_contributions: outstanding,
                assessed_contributions: assessed,
            }
        })
        .collect();

    if records.is_empty() {
        return Err(SkipReason::NoDataRows);
    }
    Ok(records)
}

/// Extracts contribution records from one source table.
///
/// Rejected sources yield no records; the reason is logged.
pub fn extract(table: &SourceTable, year: Option<i32>) -> Vec<ContributionRecord> {
    match try_extract(table, year) {
        Ok(records) => records,
        Err(reason) => {
            tracing::warn!("Skipping source for year {:?}: {}", year, reason);
            Vec::new()
        }
    }
}
