//! Byte encoding of rendered QR images.
//!
//! Neither container carries auxiliary metadata: PNG output holds only
//! `IHDR`/`IDAT`/`IEND`, JPEG output only the JFIF header and image data.

use std::fmt;
use std::str::FromStr;

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder};
use jpeg_encoder::{ColorType, Encoder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::qr::QrImage;
use crate::{QrEngineError, Result};

/// Output container for artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    /// PNG.
    #[default]
    Lossless,
    /// Progressive JPEG with configurable quality.
    Lossy,
}

impl ContainerFormat {
    /// File extension (without dot) used for stored artifacts.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Lossless => "png",
            Self::Lossy => "jpg",
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lossless => f.write_str("lossless"),
            Self::Lossy => f.write_str("lossy"),
        }
    }
}

impl FromStr for ContainerFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lossless" | "png" => Ok(Self::Lossless),
            "lossy" | "jpeg" | "jpg" => Ok(Self::Lossy),
            other => Err(format!("unknown container format '{other}'")),
        }
    }
}

/// Encode `image` into `container`. `quality` (1..=100) is only read for
/// the lossy container.
pub fn to_bytes(image: &QrImage, container: ContainerFormat, quality: u8) -> Result<Vec<u8>> {
    let bytes = match container {
        ContainerFormat::Lossless => encode_png(image)?,
        ContainerFormat::Lossy => {
            if !(1..=100).contains(&quality) {
                return Err(QrEngineError::InvalidQuality(quality));
            }
            encode_jpeg(image, quality)?
        }
    };

    debug!(
        format = %container,
        bytes = bytes.len(),
        width = image.width(),
        "Encoded QR image"
    );
    Ok(bytes)
}

fn encode_png(image: &QrImage) -> Result<Vec<u8>> {
    // The content is monochrome, so a single gray channel loses nothing.
    let gray = image.to_luma();
    let mut buf = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut buf, CompressionType::Best, FilterType::Adaptive);
    encoder.write_image(
        gray.as_raw(),
        gray.width(),
        gray.height(),
        ExtendedColorType::L8,
    )?;
    Ok(buf)
}

fn encode_jpeg(image: &QrImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = image.as_rgb();
    let (width, height) = match (u16::try_from(rgb.width()), u16::try_from(rgb.height())) {
        (Ok(w), Ok(h)) => (w, h),
        _ => {
            return Err(QrEngineError::InvalidParams(format!(
                "{}x{} exceeds the JPEG size limit",
                rgb.width(),
                rgb.height()
            )));
        }
    };

    let mut buf = Vec::new();
    let mut encoder = Encoder::new(&mut buf, quality);
    encoder.set_progressive(true);
    encoder.set_optimized_huffman_tables(true);
    encoder.encode(rgb.as_raw(), width, height, ColorType::Rgb)?;
    Ok(buf)
}
