//! Workbook copy with cell-anchored images, written through rust_xlsxwriter.

use std::collections::HashMap;
use std::path::Path;

use calamine::{Data, Range};
use rust_xlsxwriter::{Format, FormatAlign, Image, ObjectMovement, Workbook, Worksheet};
use tracing::{debug, info, warn};

use crate::{CellImage, ImageSink, Result, zero_based};

/// A copy of one worksheet that images can be attached to.
pub struct XlsxSink {
    workbook: Workbook,
    source: Range<Data>,
    centered: Format,
    column_widths: HashMap<u16, f64>,
    attached: usize,
}

impl XlsxSink {
    /// Copy every used cell of `range` into a new worksheet named `sheet_name`.
    pub fn from_range(sheet_name: &str, range: Range<Data>) -> Result<Self> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        if let Err(e) = worksheet.set_name(sheet_name) {
            warn!(sheet = sheet_name, "Keeping default sheet name: {e}");
        }

        let (row0, col0) = range.start().unwrap_or((0, 0));
        let mut copied = 0usize;
        for (r, c, value) in range.used_cells() {
            let row = row0 + r as u32;
            let Ok(col) = u16::try_from(col0 as usize + c) else {
                warn!(row, "Skipping cell beyond the last writable column");
                continue;
            };
            write_value(worksheet, row, col, value, None)?;
            copied += 1;
        }
        debug!(cells = copied, "Copied worksheet cells");

        Ok(Self {
            workbook,
            source: range,
            centered: Format::new()
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter),
            column_widths: HashMap::new(),
            attached: 0,
        })
    }

    /// Width currently set for a one-based column, if any.
    pub fn column_width(&self, column: u16) -> Option<f64> {
        self.column_widths.get(&column).copied()
    }

    /// Number of images attached so far.
    pub fn attached(&self) -> usize {
        self.attached
    }
}

impl ImageSink for XlsxSink {
    fn attach(&mut self, image: &CellImage) -> Result<()> {
        let (row, col) = zero_based(image.row, image.column)?;
        let worksheet = self.workbook.worksheet_from_index(0)?;

        worksheet.set_row_height(row, image.row_height)?;

        // Never shrink a column that an earlier image made wider.
        let current = self.column_widths.get(&image.column).copied();
        if current.is_none_or(|w| image.column_width > w) {
            worksheet.set_column_width(col, image.column_width)?;
            self.column_widths.insert(image.column, image.column_width);
        }

        // Rewrite the anchor cell centered, keeping any existing value.
        let existing = self.source.get_value((row, u32::from(col)));
        match existing {
            Some(value) if !matches!(value, Data::Empty) => {
                write_value(worksheet, row, col, value, Some(&self.centered))?;
            }
            _ => {
                worksheet.write_blank(row, col, &self.centered)?;
            }
        }

        let picture = Image::new(&image.image_path)?
            .set_scale_to_size(f64::from(image.width_px), f64::from(image.height_px), false)
            .set_object_movement(ObjectMovement::MoveButDontSizeWithCells);
        worksheet.insert_image_with_offset(row, col, &picture, image.x_offset, image.y_offset)?;

        self.attached += 1;
        debug!(
            row = image.row,
            column = image.column,
            path = %image.image_path.display(),
            "Attached image"
        );
        Ok(())
    }

    fn save(mut self, path: &Path) -> Result<()> {
        self.workbook.save(path)?;
        info!(
            path = %path.display(),
            images = self.attached,
            "Saved workbook"
        );
        Ok(())
    }
}

fn write_value(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &Data,
    format: Option<&Format>,
) -> Result<()> {
    match (value, format) {
        (Data::Empty, _) => {}
        (Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s), None) => {
            worksheet.write_string(row, col, s)?;
        }
        (Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s), Some(f)) => {
            worksheet.write_string_with_format(row, col, s, f)?;
        }
        (Data::Int(i), None) => {
            worksheet.write_number(row, col, *i as f64)?;
        }
        (Data::Int(i), Some(f)) => {
            worksheet.write_number_with_format(row, col, *i as f64, f)?;
        }
        (Data::Float(n), None) => {
            worksheet.write_number(row, col, *n)?;
        }
        (Data::Float(n), Some(f)) => {
            worksheet.write_number_with_format(row, col, *n, f)?;
        }
        (Data::DateTime(dt), None) => {
            worksheet.write_number(row, col, dt.as_f64())?;
        }
        (Data::DateTime(dt), Some(f)) => {
            worksheet.write_number_with_format(row, col, dt.as_f64(), f)?;
        }
        (Data::Bool(b), None) => {
            worksheet.write_boolean(row, col, *b)?;
        }
        (Data::Bool(b), Some(f)) => {
            worksheet.write_boolean_with_format(row, col, *b, f)?;
        }
        (Data::Error(e), None) => {
            worksheet.write_string(row, col, e.to_string())?;
        }
        (Data::Error(e), Some(f)) => {
            worksheet.write_string_with_format(row, col, e.to_string(), f)?;
        }
    }
    Ok(())
}
