//! Cell layout tiers keyed by record count.
//!
//! Large sheets get smaller cells so the workbook stays responsive; small
//! sheets get larger cells for legibility.

use serde::{Deserialize, Serialize};

/// Cell and image geometry applied to every embedded artifact of one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutProfile {
    /// Row height in points.
    pub cell_height: f64,
    /// Column width in character units.
    pub cell_width: f64,
    pub image_width_px: u32,
    pub image_height_px: u32,
    /// Image offset from the cell's left edge, in pixels.
    pub horizontal_offset: u32,
    /// Image offset from the cell's top edge, in pixels.
    pub vertical_offset: u32,
}

impl LayoutProfile {
    const LARGE: Self = Self::tier(75.0, 12.0, 95, 3);
    const MEDIUM: Self = Self::tier(80.0, 13.0, 100, 4);
    const SMALL: Self = Self::tier(90.0, 15.0, 110, 5);

    const fn tier(cell_height: f64, cell_width: f64, image_px: u32, offset: u32) -> Self {
        Self {
            cell_height,
            cell_width,
            image_width_px: image_px,
            image_height_px: image_px,
            horizontal_offset: offset,
            vertical_offset: offset,
        }
    }
}

/// Select the layout tier for a run with `total_records` rows.
///
/// | records   | row height | col width | image   | offset |
/// |-----------|-----------:|----------:|---------|-------:|
/// | > 1000    | 75         | 12        | 95×95   | 3      |
/// | 501–1000  | 80         | 13        | 100×100 | 4      |
/// | ≤ 500     | 90         | 15        | 110×110 | 5      |
pub fn select_layout(total_records: usize) -> LayoutProfile {
    match total_records {
        n if n > 1000 => LayoutProfile::LARGE,
        n if n > 500 => LayoutProfile::MEDIUM,
        _ => LayoutProfile::SMALL,
    }
}
