//! QR artifact engine: file-safe naming, QR rasterization, container
//! encoding, and the cell layout tiers used when images are embedded.
//!
//! Everything in this crate is pure (no filesystem access) so it can be
//! exercised without touching a workbook or a run directory.

pub mod container;
pub mod layout;
pub mod qr;
pub mod sanitize;

// Re-exports for convenience
pub use container::{ContainerFormat, to_bytes};
pub use layout::{LayoutProfile, select_layout};
pub use qr::{ErrorCorrection, QrImage, QrParams, encode};
pub use sanitize::{MAX_NAME_LEN, NameSanitizer, SanitizedName};

/// Default JPEG quality for the lossy container.
pub const DEFAULT_QUALITY: u8 = 85;

/// Errors that can occur while turning text into image bytes.
#[derive(Debug, thiserror::Error)]
pub enum QrEngineError {
    #[error("QR input text is empty")]
    EmptyInput,

    #[error("QR input of {len} bytes exceeds capacity at error correction {level}")]
    DataTooLong { len: usize, level: ErrorCorrection },

    #[error("QR encode error: {0}")]
    Encode(String),

    #[error("Quality must be between 1 and 100, got {0}")]
    InvalidQuality(u8),

    #[error("Invalid QR parameters: {0}")]
    InvalidParams(String),

    #[error("Image encode error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JPEG encode error: {0}")]
    Jpeg(#[from] jpeg_encoder::EncodingError),
}

/// Result type alias for qr-engine operations.
pub type Result<T> = std::result::Result<T, QrEngineError>;
