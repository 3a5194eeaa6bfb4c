//! Workbook access for the QR pipeline.
//!
//! Two narrow operations are exposed: extracting `(row_index, text)` records
//! for one column of the first worksheet, and writing a copy of that worksheet
//! with images anchored to cells. Everything else about the workbook is out
//! of scope.

pub mod reader;
pub mod writer;

use std::path::{Path, PathBuf};

pub use reader::XlsxSource;
pub use writer::XlsxSink;

/// Rows above the first data row.
pub const HEADER_ROWS: u32 = 1;

/// Extensions accepted as input workbooks (lowercase, without dot).
pub const SUPPORTED_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls"];

/// Errors raised by workbook reading or writing.
#[derive(Debug, thiserror::Error)]
pub enum SheetError {
    #[error("Input file not found: {0}")]
    NotFound(PathBuf),

    #[error("Unsupported workbook extension '{0}' (expected .xlsx, .xlsm or .xls)")]
    UnsupportedExtension(String),

    #[error("Failed to read workbook: {0}")]
    Read(#[from] calamine::Error),

    #[error("Workbook has no worksheets")]
    NoWorksheet,

    #[error("Cell out of range: row {row}, column {column}")]
    InvalidCell { row: u32, column: u32 },

    #[error("Failed to write workbook: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),
}

/// Result type alias for sheet-io operations.
pub type Result<T> = std::result::Result<T, SheetError>;

/// One data row of the source column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Zero-based index among data rows (the header is not counted).
    pub row_index: usize,
    pub raw_text: String,
}

impl Record {
    pub fn new(row_index: usize, raw_text: impl Into<String>) -> Self {
        Self {
            row_index,
            raw_text: raw_text.into(),
        }
    }

    /// One-based worksheet row holding this record.
    pub fn sheet_row(&self) -> u32 {
        self.row_index as u32 + HEADER_ROWS + 1
    }
}

/// How the source column is located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSelector {
    /// One-based column position.
    Position(u16),
    /// Header text in the first row (case-insensitive); `fallback` is used
    /// when no header matches.
    Header { name: String, fallback: u16 },
}

impl ColumnSelector {
    pub fn fallback_position(&self) -> u16 {
        match self {
            Self::Position(p) => *p,
            Self::Header { fallback, .. } => *fallback,
        }
    }
}

/// An image bound to one cell, plus the cell geometry to apply.
#[derive(Debug, Clone, PartialEq)]
pub struct CellImage {
    /// One-based worksheet row.
    pub row: u32,
    /// One-based worksheet column.
    pub column: u16,
    pub image_path: PathBuf,
    pub width_px: u32,
    pub height_px: u32,
    pub x_offset: u32,
    pub y_offset: u32,
    /// Row height in points.
    pub row_height: f64,
    /// Column width in character units.
    pub column_width: f64,
}

/// Source of records and of the writable copy.
pub trait SheetSource {
    type Sink: ImageSink;

    /// Check that the input can be processed at all.
    fn validate(&self) -> Result<()>;

    /// Read the column's records in row order. Every call re-reads the input.
    fn read_column(&self, column: &ColumnSelector) -> Result<Vec<Record>>;

    /// Open a writable copy of the worksheet.
    fn open_sink(&self) -> Result<Self::Sink>;
}

/// Receives cell images in order and persists the result.
pub trait ImageSink {
    fn attach(&mut self, image: &CellImage) -> Result<()>;

    fn save(self, path: &Path) -> Result<()>
    where
        Self: Sized;
}

/// Validate an input path: it must exist and carry a supported extension.
pub fn validate_input_path(path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(SheetError::UnsupportedExtension(ext));
    }
    if !path.is_file() {
        return Err(SheetError::NotFound(path.to_path_buf()));
    }
    Ok(())
}

/// Convert a one-based coordinate to rust_xlsxwriter's zero-based one.
pub(crate) fn zero_based(row: u32, column: u16) -> Result<(u32, u16)> {
    match (row.checked_sub(1), column.checked_sub(1)) {
        (Some(r), Some(c)) => Ok((r, c)),
        _ => Err(SheetError::InvalidCell {
            row,
            column: u32::from(column),
        }),
    }
}
