use crate::domain::model::{DelegationEntry, MergedDataset, SourceTable};
use crate::domain::ports::SheetReader;
use crate::utils::error::Result;
use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use std::collections::HashSet;
use std::path::Path;

/// Excel sheet names are limited to 31 characters.
pub const MAX_SHEET_NAME_LEN: usize = 31;

const DEFAULT_SHEET_NAME: &str = "Sheet1";

/// Reads `.xlsx`, `.xls` and `.ods` workbooks with calamine.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalamineReader;

impl CalamineReader {
    pub fn new() -> Self {
        Self
    }
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::Error(e) => e.to_string(),
    }
}

impl SheetReader for CalamineReader {
    fn read_table(&self, path: &Path) -> Result<SourceTable> {
        let mut workbook = open_workbook_auto(path)?;
        let range = match workbook.worksheet_range_at(0) {
            Some(range) => range?,
            None => return Ok(SourceTable::default()),
        };

        // calamine trims leading blank rows and columns; pad them back so
        // column positions match the sheet.
        let (row_offset, col_offset) = range
            .start()
            .map(|(r, c)| (r as usize, c as usize))
            .unwrap_or((0, 0));
        let width = col_offset + range.width();

        let mut rows = vec![vec![String::new(); width]; row_offset];
        for sheet_row in range.rows() {
            let mut cells = vec![String::new(); col_offset];
            cells.extend(sheet_row.iter().map(cell_to_string));
            rows.push(cells);
        }

        Ok(SourceTable::new(rows))
    }
}

fn write_header(worksheet: &mut Worksheet, columns: &[&str], format: &Format) -> Result<()> {
    for (col, name) in columns.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *name, format)?;
    }
    Ok(())
}

fn write_optional_number(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: Option<f64>,
) -> Result<()> {
    // Missing values stay blank cells.
    if let Some(value) = value {
        worksheet.write_number(row, col, value)?;
    }
    Ok(())
}

/// Renders the merged dataset as a single-sheet workbook.
pub fn dataset_to_xlsx(dataset: &MergedDataset) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(DEFAULT_SHEET_NAME)?;
    write_header(worksheet, dataset.columns(), &header_format)?;

    for (i, record) in dataset.records.iter().enumerate() {
        let row = (i + 1) as u32;
        worksheet.write_number(row, 0, record.year)?;
        worksheet.write_string(row, 1, record.country.as_str())?;
        write_optional_number(worksheet, row, 2, record.annual_contributions)?;
        write_optional_number(worksheet, row, 3, record.total_outstanding_contributions)?;
        write_optional_number(worksheet, row, 4, record.assessed_contributions)?;
    }

    Ok(workbook.save_to_buffer()?)
}

pub fn delegations_to_xlsx(entries: &[DelegationEntry]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(DEFAULT_SHEET_NAME)?;
    write_header(worksheet, &DelegationEntry::COLUMNS, &header_format)?;

    for (i, entry) in entries.iter().enumerate() {
        let row = (i + 1) as u32;
        worksheet.write_string(row, 0, entry.country.as_str())?;
        worksheet.write_number(row, 1, entry.year)?;
        worksheet.write_number(row, 2, entry.officials)?;
        worksheet.write_number(row, 3, entry.leader_present)?;
        worksheet.write_number(row, 4, entry.representatives)?;
        worksheet.write_number(row, 5, entry.alternate_representatives)?;
        worksheet.write_number(row, 6, entry.advisers)?;
        worksheet.write_number(row, 7, entry.attendees)?;
    }

    Ok(workbook.save_to_buffer()?)
}

/// Cuts a sheet name down to what Excel accepts.
pub fn truncate_sheet_name(name: &str) -> String {
    name.chars().take(MAX_SHEET_NAME_LEN).collect()
}

/// Truncated sheet names, with `_2`, `_3`, ... appended to repeats.
///
/// Excel compares sheet names case-insensitively.
pub fn unique_sheet_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut used = HashSet::new();
    names
        .into_iter()
        .map(|name| {
            let mut candidate = truncate_sheet_name(name);
            let mut n = 1;
            while !used.insert(candidate.to_lowercase()) {
                n += 1;
                let suffix = format!("_{}", n);
                let base: String = name
                    .chars()
                    .take(MAX_SHEET_NAME_LEN - suffix.len())
                    .collect();
                candidate = format!("{}{}", base, suffix);
            }
            if n > 1 {
                tracing::warn!("Sheet name {} already used, writing as {}", name, candidate);
            }
            candidate
        })
        .collect()
}

/// One sheet per `(name, rows)` pair, first row of each written as the header.
pub fn sheets_to_xlsx(sheets: &[(String, Vec<Vec<String>>)]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let names = unique_sheet_names(sheets.iter().map(|(name, _)| name.as_str()));

    for ((_, rows), name) in sheets.iter().zip(names) {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(name)?;
        for (r, cells) in rows.iter().enumerate() {
            for (c, value) in cells.iter().enumerate() {
                if r == 0 {
                    worksheet.write_string_with_format(0, c as u16, value.as_str(), &header_format)?;
                } else {
                    worksheet.write_string(r as u32, c as u16, value.as_str())?;
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::ContributionRecord;
    use calamine::{open_workbook_from_rs, Xlsx};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn read_back(bytes: &[u8]) -> SourceTable {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roundtrip.xlsx");
        std::fs::write(&path, bytes).unwrap();
        CalamineReader::new().read_table(&path).unwrap()
    }

    #[test]
    fn test_dataset_missing_values_are_blank_cells() {
        let dataset = MergedDataset::new(vec![ContributionRecord {
            year: 2005,
            country: "Belgium".into(),
            annual_contributions: None,
            total_outstanding_contributions: Some(50.0),
            assessed_contributions: Some(50.0),
        }]);

        let table = read_back(&dataset_to_xlsx(&dataset).unwrap());

        assert_eq!(table.rows[0], MergedDataset::COLUMNS.map(String::from).to_vec());
        assert_eq!(table.rows[1], vec!["2005", "Belgium", "", "50", "50"]);
    }

    #[test]
    fn test_reader_keeps_leading_blank_rows_and_columns() {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.write_string(2, 1, "Member State").unwrap();
        worksheet.write_number(3, 1, 7).unwrap();
        let table = read_back(&workbook.save_to_buffer().unwrap());

        assert_eq!(table.rows.len(), 4);
        assert_eq!(table.rows[2], vec!["", "Member State"]);
        assert_eq!(table.rows[3], vec!["", "7"]);
    }

    #[test]
    fn test_sheet_names_are_truncated() {
        let long = "Page123456789_Table123456789_extra";
        assert_eq!(truncate_sheet_name(long).chars().count(), MAX_SHEET_NAME_LEN);
        assert_eq!(truncate_sheet_name("Page6_Table1"), "Page6_Table1");

        let bytes = sheets_to_xlsx(&[(long.to_string(), vec![vec!["h".to_string()]])]).unwrap();
        assert!(!bytes.is_empty());
    }

    #[test]
    fn test_repeated_sheet_names_get_suffixes() {
        let long = "Page123456789_Table123456789_extra";
        let names =
            unique_sheet_names(["Page7_Table1", "page7_table1", "Page7_Table1", long, long]);

        assert_eq!(
            names,
            vec![
                "Page7_Table1",
                "page7_table1_2",
                "Page7_Table1_3",
                "Page123456789_Table123456789_ex",
                "Page123456789_Table123456789__2",
            ]
        );
        assert!(names.iter().all(|n| n.chars().count() <= MAX_SHEET_NAME_LEN));
    }

    #[test]
    fn test_repeated_tables_are_all_written() {
        let rows = vec![vec!["Donor".to_string()], vec!["Norway".to_string()]];
        let sheets = vec![
            ("Page7_Table1".to_string(), rows.clone()),
            ("Page7_Table1".to_string(), rows),
        ];

        let bytes = sheets_to_xlsx(&sheets).unwrap();
        let workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes)).unwrap();

        assert_eq!(workbook.sheet_names(), vec!["Page7_Table1", "Page7_Table1_2"]);
    }
}
