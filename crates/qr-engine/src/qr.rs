//! QR code rasterization for spreadsheet artifacts.

use std::fmt;
use std::str::FromStr;

use image::{DynamicImage, GrayImage, Luma, RgbImage};
use qrcode::types::QrError;
use qrcode::{EcLevel, QrCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{QrEngineError, Result};

/// QR redundancy tier. Higher tiers survive more damage but hold less data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCorrection {
    #[default]
    Low,
    Medium,
    Quartile,
    High,
}

impl ErrorCorrection {
    fn ec_level(self) -> EcLevel {
        match self {
            Self::Low => EcLevel::L,
            Self::Medium => EcLevel::M,
            Self::Quartile => EcLevel::Q,
            Self::High => EcLevel::H,
        }
    }
}

impl fmt::Display for ErrorCorrection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "L",
            Self::Medium => "M",
            Self::Quartile => "Q",
            Self::High => "H",
        };
        f.write_str(s)
    }
}

impl FromStr for ErrorCorrection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "l" | "low" => Ok(Self::Low),
            "m" | "medium" => Ok(Self::Medium),
            "q" | "quartile" => Ok(Self::Quartile),
            "h" | "high" => Ok(Self::High),
            other => Err(format!("unknown error correction level '{other}'")),
        }
    }
}

/// Rendering parameters for [`encode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrParams {
    pub error_correction: ErrorCorrection,
    /// Edge length of one module in pixels (must be > 0).
    pub module_size: u32,
    /// Quiet-zone width in modules on each side.
    pub border_modules: u32,
}

impl Default for QrParams {
    fn default() -> Self {
        Self {
            error_correction: ErrorCorrection::Low,
            module_size: 10,
            border_modules: 4,
        }
    }
}

/// A rendered QR symbol: black modules on white, stored as 3-channel RGB.
#[derive(Debug, Clone)]
pub struct QrImage {
    image: RgbImage,
    module_count: u32,
    params: QrParams,
}

impl QrImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Number of modules along one side of the symbol, quiet zone excluded.
    pub fn module_count(&self) -> u32 {
        self.module_count
    }

    pub fn params(&self) -> &QrParams {
        &self.params
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.image
    }

    /// Single-channel view of the raster (exact 0/255 values).
    pub fn to_luma(&self) -> GrayImage {
        DynamicImage::ImageRgb8(self.image.clone()).to_luma8()
    }
}

/// Encode `text` as a QR symbol at the smallest version that fits.
///
/// Fails with [`QrEngineError::EmptyInput`] for empty text and
/// [`QrEngineError::DataTooLong`] when the text exceeds the capacity of the
/// largest symbol at the requested error-correction level.
pub fn encode(text: &str, params: &QrParams) -> Result<QrImage> {
    if text.is_empty() {
        return Err(QrEngineError::EmptyInput);
    }
    if params.module_size == 0 {
        return Err(QrEngineError::InvalidParams(
            "module size must be greater than zero".into(),
        ));
    }

    let level = params.error_correction;
    let code = QrCode::with_error_correction_level(text.as_bytes(), level.ec_level()).map_err(
        |e| match e {
            QrError::DataTooLong => QrEngineError::DataTooLong {
                len: text.len(),
                level,
            },
            other => QrEngineError::Encode(other.to_string()),
        },
    )?;

    let module_count = code.width() as u32;
    let scale = params.module_size;
    let border = params.border_modules;
    let img_size = module_count
        .checked_add(border.saturating_mul(2))
        .and_then(|m| m.checked_mul(scale))
        .ok_or_else(|| QrEngineError::InvalidParams("rendered image size overflows".into()))?;

    let mut img = GrayImage::from_pixel(img_size, img_size, Luma([255u8]));

    for (i, color) in code.to_colors().iter().enumerate() {
        if *color != qrcode::Color::Dark {
            continue;
        }
        let x = (i as u32) % module_count + border;
        let y = (i as u32) / module_count + border;
        for dy in 0..scale {
            for dx in 0..scale {
                img.put_pixel(x * scale + dx, y * scale + dy, Luma([0u8]));
            }
        }
    }

    debug!(
        modules = module_count,
        size = img_size,
        level = %level,
        "Rendered QR symbol"
    );

    // Normalize to RGB so every container (including JPEG) accepts it.
    let image = DynamicImage::ImageLuma8(img).to_rgb8();

    Ok(QrImage {
        image,
        module_count,
        params: *params,
    })
}
