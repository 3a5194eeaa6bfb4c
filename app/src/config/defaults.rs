//! Setting keys, presets and their default values.

use std::fmt;
use std::str::FromStr;

use qr_engine::{ContainerFormat, DEFAULT_QUALITY, ErrorCorrection, QrParams};
use serde::Serialize;

/// Base directory for run directories when `QR_OUTPUT_DIR` is unset.
pub const DEFAULT_OUTPUT_DIR: &str = "codigos_qr";

/// A single setting definition.
#[derive(Debug, Clone, Copy)]
pub struct SettingDef {
    pub key: &'static str,
    /// Long command-line flag overriding the key.
    pub flag: &'static str,
    pub description: &'static str,
}

/// Every setting read from the environment (or the matching CLI flag).
pub const SETTINGS: &[SettingDef] = &[
    SettingDef {
        key: "QR_PRESET",
        flag: "preset",
        description: "Base profile: identifier, catalog or optimized",
    },
    SettingDef {
        key: "QR_SOURCE_COLUMN",
        flag: "source-column",
        description: "Column holding the text to encode (number or letter)",
    },
    SettingDef {
        key: "QR_SOURCE_HEADER",
        flag: "source-header",
        description: "Header text that selects the source column when present",
    },
    SettingDef {
        key: "QR_TARGET_COLUMN",
        flag: "target-column",
        description: "Column that receives the images (number or letter)",
    },
    SettingDef {
        key: "QR_FORMAT",
        flag: "format",
        description: "Artifact container: lossless (png) or lossy (jpeg)",
    },
    SettingDef {
        key: "QR_QUALITY",
        flag: "quality",
        description: "JPEG quality 1-100 (lossy only)",
    },
    SettingDef {
        key: "QR_ERROR_CORRECTION",
        flag: "error-correction",
        description: "QR error correction: L, M, Q or H",
    },
    SettingDef {
        key: "QR_MODULE_SIZE",
        flag: "module-size",
        description: "Pixels per QR module",
    },
    SettingDef {
        key: "QR_BORDER",
        flag: "border",
        description: "Quiet-zone width in modules",
    },
    SettingDef {
        key: "QR_OUTPUT_DIR",
        flag: "output-dir",
        description: "Base directory for timestamped run directories",
    },
];

/// Deployment profiles. They differ in columns and container; every preset
/// renders with the same QR parameters and JPEG quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Identifier in column A, images in column N, PNG.
    #[default]
    Identifier,
    /// Identifier in column L, images in column M, PNG.
    Catalog,
    /// URL in column W, images in column X, JPEG at quality 85.
    Optimized,
}

impl Preset {
    pub const ALL: [Self; 3] = [Self::Identifier, Self::Catalog, Self::Optimized];

    pub fn source_column(self) -> u16 {
        match self {
            Self::Identifier => 1,
            Self::Catalog => 12,
            Self::Optimized => 23,
        }
    }

    pub fn target_column(self) -> u16 {
        match self {
            Self::Identifier => 14,
            Self::Catalog => 13,
            Self::Optimized => 24,
        }
    }

    pub fn container(self) -> ContainerFormat {
        match self {
            Self::Identifier | Self::Catalog => ContainerFormat::Lossless,
            Self::Optimized => ContainerFormat::Lossy,
        }
    }

    pub fn source_header(self) -> Option<&'static str> {
        match self {
            Self::Identifier => Some("ID_Unico"),
            Self::Catalog | Self::Optimized => None,
        }
    }

    pub const QR_PARAMS: QrParams = QrParams {
        error_correction: ErrorCorrection::Low,
        module_size: 10,
        border_modules: 4,
    };

    pub const QUALITY: u8 = DEFAULT_QUALITY;
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Identifier => "identifier",
            Self::Catalog => "catalog",
            Self::Optimized => "optimized",
        };
        f.write_str(s)
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| "must be 'identifier', 'catalog' or 'optimized'".to_string())
    }
}

/// Look up a setting definition by key.
pub fn get_setting(key: &str) -> Option<&'static SettingDef> {
    SETTINGS.iter().find(|d| d.key == key)
}
