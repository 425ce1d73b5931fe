//! Tabular import sources
//!
//! CSV text or the first sheet of a spreadsheet workbook, reduced to a header
//! row plus trimmed data rows. Fully blank rows are dropped.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;

use super::ImportError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// One data row and the 1-based line it came from (header is line 1)
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub line: usize,
    pub cells: Vec<String>,
}

impl Record {
    pub fn cell(&self, column: usize) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub records: Vec<Record>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceFormat {
    Csv,
    Workbook,
}

fn detect_format(filename: &str, bytes: &[u8]) -> SourceFormat {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => SourceFormat::Workbook,
        "csv" | "txt" => SourceFormat::Csv,
        // Zip (xlsx/ods) or OLE2 (xls) magic
        _ if bytes.starts_with(b"PK\x03\x04") || bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0]) => {
            SourceFormat::Workbook
        }
        _ => SourceFormat::Csv,
    }
}

/// Parse an uploaded file into a table
pub fn read_table(filename: &str, bytes: &[u8]) -> Result<Table, ImportError> {
    let rows = match detect_format(filename, bytes) {
        SourceFormat::Csv => read_csv_rows(bytes)?,
        SourceFormat::Workbook => read_workbook_rows(bytes)?,
    };
    build_table(rows)
}

/// Source rows tagged with their 1-based line number
type NumberedRows = Vec<(usize, Vec<String>)>;

fn read_csv_rows(bytes: &[u8]) -> Result<NumberedRows, ImportError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| ImportError::Unreadable(format!("invalid CSV: {}", e)))?;
        let line = record.position().map(|p| p.line() as usize).unwrap_or(index + 1);
        rows.push((line, record.iter().map(str::to_string).collect()));
    }
    Ok(rows)
}

fn read_workbook_rows(bytes: &[u8]) -> Result<NumberedRows, ImportError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ImportError::Unreadable(format!("invalid spreadsheet: {}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ImportError::Unreadable("workbook has no sheets".to_string()))?
        .map_err(|e| ImportError::Unreadable(format!("cannot read first sheet: {}", e)))?;

    Ok(range
        .rows()
        .enumerate()
        .map(|(index, row)| (index + 1, row.iter().map(cell_text).collect()))
        .collect())
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::Float(f) => float_text(*f),
        // Date cells keep their day serial; date-aware fields normalise it later
        Data::DateTime(dt) => float_text(dt.as_f64()),
        other => other.to_string().trim().to_string(),
    }
}

/// Whole floats print without a fractional part ("42", not "42.0")
fn float_text(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn build_table(rows: NumberedRows) -> Result<Table, ImportError> {
    let mut numbered = rows
        .into_iter()
        .filter(|(_, cells)| cells.iter().any(|c| !c.trim().is_empty()));

    let (_, header_cells) = numbered
        .next()
        .ok_or_else(|| ImportError::Unreadable("file has no header row".to_string()))?;
    let headers: Vec<String> = header_cells
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let records: Vec<Record> = numbered
        .map(|(line, mut cells)| {
            cells.resize(headers.len(), String::new());
            Record {
                line,
                cells: cells.into_iter().map(|c| c.trim().to_string()).collect(),
            }
        })
        .collect();

    if records.is_empty() {
        return Err(ImportError::NoDataRows);
    }

    Ok(Table { headers, records })
}
