//! Record extraction from `.xlsx` / `.xlsm` / `.xls` workbooks via calamine.

use std::path::PathBuf;

use calamine::{Data, Range, Reader, open_workbook_auto};
use tracing::{debug, info};

use crate::writer::XlsxSink;
use crate::{ColumnSelector, Record, Result, SheetError, SheetSource, validate_input_path};

/// The first worksheet of a workbook on disk.
#[derive(Debug, Clone)]
pub struct XlsxSource {
    path: PathBuf,
}

impl XlsxSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the first worksheet as `(sheet name, used range)`.
    pub(crate) fn load_first_sheet(&self) -> Result<(String, Range<Data>)> {
        let mut workbook = open_workbook_auto(&self.path)?;
        let name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or(SheetError::NoWorksheet)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or(SheetError::NoWorksheet)??;
        debug!(sheet = %name, path = %self.path.display(), "Loaded worksheet");
        Ok((name, range))
    }
}

impl SheetSource for XlsxSource {
    type Sink = XlsxSink;

    fn validate(&self) -> Result<()> {
        validate_input_path(&self.path)
    }

    fn read_column(&self, column: &ColumnSelector) -> Result<Vec<Record>> {
        let (_, range) = self.load_first_sheet()?;
        let col = resolve_column(&range, column);
        let records = column_records(&range, col);
        info!(
            column = col + 1,
            records = records.len(),
            "Read source column"
        );
        Ok(records)
    }

    fn open_sink(&self) -> Result<XlsxSink> {
        let (name, range) = self.load_first_sheet()?;
        XlsxSink::from_range(&name, range)
    }
}

/// Zero-based column index for `selector`.
fn resolve_column(range: &Range<Data>, selector: &ColumnSelector) -> u32 {
    let fallback = u32::from(selector.fallback_position().saturating_sub(1));
    let ColumnSelector::Header { name, .. } = selector else {
        return fallback;
    };

    let Some((_, last_col)) = range.end() else {
        return fallback;
    };
    let first_col = range.start().map_or(0, |(_, c)| c);
    let wanted = name.trim();

    (first_col..=last_col)
        .find(|&c| {
            range
                .get_value((0, c))
                .is_some_and(|v| cell_text(v).trim().eq_ignore_ascii_case(wanted))
        })
        .unwrap_or_else(|| {
            debug!(header = wanted, "Header not found, using configured position");
            fallback
        })
}

/// Records for every data row up to the last used row of the sheet.
fn column_records(range: &Range<Data>, col: u32) -> Vec<Record> {
    let Some((last_row, _)) = range.end() else {
        return Vec::new();
    };

    (1..=last_row)
        .map(|row| {
            let text = range.get_value((row, col)).map(cell_text).unwrap_or_default();
            Record::new((row - 1) as usize, text)
        })
        .collect()
}

/// Text form of a cell, as used for QR payloads and artifact names.
///
/// Whole numbers print without a fractional part so `123` stays `123`.
pub fn cell_text(value: &Data) -> String {
    match value {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => number_text(*f),
        Data::DateTime(dt) => number_text(dt.as_f64()),
        Data::Bool(b) => b.to_string(),
        Data::Error(e) => e.to_string(),
    }
}

fn number_text(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}
