//! Placement planning: which stored artifact goes into which cell, and how.

use std::fmt;
use std::path::PathBuf;

use qr_engine::{LayoutProfile, NameSanitizer};
use serde::Serialize;
use sheet_io::{CellImage, Record};
use tracing::debug;

use super::artifact_store::{RunDirectory, exists};

/// One-based worksheet coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CellRef {
    pub row: u32,
    pub column: u16,
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.column), self.row)
    }
}

/// `1 -> A`, `26 -> Z`, `27 -> AA`.
pub fn column_letters(column: u16) -> String {
    let mut n = u32::from(column);
    let mut letters = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push(char::from(b'A' + rem));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Center,
}

/// Cell alignment applied to the anchor cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Alignment {
    pub horizontal: Align,
    pub vertical: Align,
    pub wrap_text: bool,
}

impl Alignment {
    pub const CENTERED: Self = Self {
        horizontal: Align::Center,
        vertical: Align::Center,
        wrap_text: false,
    };
}

/// Instruction to bind one artifact to one cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacementInstruction {
    pub row_index: usize,
    pub target_column: u16,
    pub anchor_cell: CellRef,
    pub file_path: PathBuf,
    pub layout: LayoutProfile,
    pub alignment: Alignment,
}

impl From<&PlacementInstruction> for CellImage {
    fn from(p: &PlacementInstruction) -> Self {
        Self {
            row: p.anchor_cell.row,
            column: p.anchor_cell.column,
            image_path: p.file_path.clone(),
            width_px: p.layout.image_width_px,
            height_px: p.layout.image_height_px,
            x_offset: p.layout.horizontal_offset,
            y_offset: p.layout.vertical_offset,
            row_height: p.layout.cell_height,
            column_width: p.layout.cell_width,
        }
    }
}

/// Planned placements plus the rows that had no artifact.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub instructions: Vec<PlacementInstruction>,
    /// Row indices skipped because no artifact was found.
    pub missing: Vec<usize>,
}

/// Plan placements for `records` in row order.
///
/// Names are re-derived from `records` (the re-read source column); rows
/// whose artifact does not exist in `run_dir` are skipped, never errors.
pub fn plan(
    records: &[Record],
    sanitizer: &NameSanitizer,
    run_dir: &RunDirectory,
    layout: &LayoutProfile,
    target_column: u16,
    extension: &str,
) -> Plan {
    let mut out = Plan::default();

    for record in records {
        let name = sanitizer.sanitize_row(record.row_index, &record.raw_text);
        if !exists(run_dir, &name, extension) {
            debug!(row = record.row_index, name = %name, "No artifact, skipping placement");
            out.missing.push(record.row_index);
            continue;
        }

        out.instructions.push(PlacementInstruction {
            row_index: record.row_index,
            target_column,
            anchor_cell: CellRef {
                row: record.sheet_row(),
                column: target_column,
            },
            file_path: run_dir.artifact_path(&name, extension),
            layout: *layout,
            alignment: Alignment::CENTERED,
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::artifact_store::{make_run_directory_at, store};
    use chrono::NaiveDate;
    use qr_engine::select_layout;
    use tempfile::TempDir;

    fn setup() -> (TempDir, RunDirectory, NameSanitizer) {
        let base = TempDir::new().unwrap();
        let at = NaiveDate::from_ymd_opt(2025, 6, 1)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .unwrap();
        let dir = make_run_directory_at(base.path(), at).unwrap();
        (base, dir, NameSanitizer::with_timestamp(at))
    }

    #[test]
    fn column_letters_convert() {
        assert_eq!(column_letters(1), "A");
        assert_eq!(column_letters(14), "N");
        assert_eq!(column_letters(26), "Z");
        assert_eq!(column_letters(27), "AA");
        assert_eq!(column_letters(16_384), "XFD");
        assert_eq!(CellRef { row: 2, column: 14 }.to_string(), "N2");
    }

    #[test]
    fn one_instruction_per_existing_artifact_in_row_order() {
        let (_base, dir, sanitizer) = setup();
        let records = vec![
            Record::new(0, "first"),
            Record::new(1, "no-artifact"),
            Record::new(2, "third"),
        ];
        for r in [&records[0], &records[2]] {
            let name = sanitizer.sanitize_row(r.row_index, &r.raw_text);
            store(&dir, &name, b"img", "png").unwrap();
        }

        let layout = select_layout(records.len());
        let plan = plan(&records, &sanitizer, &dir, &layout, 5, "png");

        let rows: Vec<_> = plan.instructions.iter().map(|p| p.row_index).collect();
        assert_eq!(rows, [0, 2]);
        assert_eq!(plan.missing, [1]);

        let first = &plan.instructions[0];
        assert_eq!(first.anchor_cell, CellRef { row: 2, column: 5 });
        assert_eq!(first.file_path, dir.path().join("first.png"));
        assert_eq!(first.layout, layout);
        assert_eq!(first.alignment, Alignment::CENTERED);
        assert_eq!(plan.instructions[1].anchor_cell.to_string(), "E4");
    }

    #[test]
    fn extension_must_match() {
        let (_base, dir, sanitizer) = setup();
        let records = vec![Record::new(0, "x")];
        store(&dir, &sanitizer.sanitize("x"), b"img", "png").unwrap();
        let plan = plan(&records, &sanitizer, &dir, &select_layout(1), 2, "jpg");
        assert!(plan.instructions.is_empty());
        assert_eq!(plan.missing, [0]);
    }

    #[test]
    fn cell_image_carries_the_layout() {
        let (_base, dir, sanitizer) = setup();
        let records = vec![Record::new(0, "x")];
        store(&dir, &sanitizer.sanitize("x"), b"img", "png").unwrap();
        let layout = select_layout(1200);
        let plan = plan(&records, &sanitizer, &dir, &layout, 24, "png");

        let image = CellImage::from(&plan.instructions[0]);
        assert_eq!((image.row, image.column), (2, 24));
        assert_eq!((image.width_px, image.height_px), (95, 95));
        assert_eq!((image.x_offset, image.y_offset), (3, 3));
        assert_eq!(image.row_height, 75.0);
        assert_eq!(image.column_width, 12.0);
    }
}
