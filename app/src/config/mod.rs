//! Pipeline configuration: presets, environment overrides, validation.

pub mod defaults;
pub mod validation;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use qr_engine::{ContainerFormat, QrParams};
use serde::Serialize;
use sheet_io::ColumnSelector;

pub use defaults::{DEFAULT_OUTPUT_DIR, Preset, SETTINGS, SettingDef, get_setting};
pub use validation::{parse_column, validate_setting};

/// A setting that failed validation.
#[derive(Debug, thiserror::Error)]
#[error("invalid setting {key}='{value}': {reason}")]
pub struct ConfigError {
    pub key: String,
    pub value: String,
    pub reason: String,
}

/// Everything that varies between deployments of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineConfig {
    pub preset: Preset,
    /// One-based source column.
    pub source_column: u16,
    /// Header text that overrides `source_column` when found.
    pub source_header: Option<String>,
    /// One-based column receiving the images.
    pub target_column: u16,
    pub container: ContainerFormat,
    /// JPEG quality (ignored for the lossless container).
    pub quality: u8,
    pub qr: QrParams,
    /// Base directory for run directories.
    pub output_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_preset(Preset::default())
    }
}

impl PipelineConfig {
    pub fn from_preset(preset: Preset) -> Self {
        Self {
            preset,
            source_column: preset.source_column(),
            source_header: preset.source_header().map(str::to_string),
            target_column: preset.target_column(),
            container: preset.container(),
            quality: Preset::QUALITY,
            qr: Preset::QR_PARAMS,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }

    /// Load with `overrides` (keyed by setting name) taking precedence over
    /// the process environment.
    pub fn load(overrides: &HashMap<&str, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| overrides.get(key).cloned().or_else(|| std::env::var(key).ok()))
    }

    /// Load from an arbitrary key lookup: `QR_PRESET` picks the base,
    /// every other key overrides one field. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let g = |key: &str| -> Result<Option<String>, ConfigError> {
            let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) else {
                return Ok(None);
            };
            validate_setting(key, &value).map_err(|reason| ConfigError {
                key: key.to_string(),
                value: value.clone(),
                reason,
            })?;
            Ok(Some(value.trim().to_string()))
        };

        let preset = match g("QR_PRESET")? {
            Some(p) => p.parse::<Preset>().unwrap_or_default(),
            None => Preset::default(),
        };
        let mut config = Self::from_preset(preset);

        if let Some(v) = g("QR_SOURCE_COLUMN")? {
            config.source_column = parse_column(&v).unwrap_or(config.source_column);
            // An explicit position replaces the preset's header heuristic.
            config.source_header = None;
        }
        if let Some(v) = g("QR_SOURCE_HEADER")? {
            config.source_header = Some(v);
        }
        if let Some(v) = g("QR_TARGET_COLUMN")? {
            config.target_column = parse_column(&v).unwrap_or(config.target_column);
        }
        if let Some(v) = g("QR_FORMAT")? {
            config.container = v.parse().unwrap_or(config.container);
        }
        if let Some(v) = g("QR_QUALITY")? {
            config.quality = v.parse().unwrap_or(config.quality);
        }
        if let Some(v) = g("QR_ERROR_CORRECTION")? {
            config.qr.error_correction = v.parse().unwrap_or(config.qr.error_correction);
        }
        if let Some(v) = g("QR_MODULE_SIZE")? {
            config.qr.module_size = v.parse().unwrap_or(config.qr.module_size);
        }
        if let Some(v) = g("QR_BORDER")? {
            config.qr.border_modules = v.parse().unwrap_or(config.qr.border_modules);
        }
        if let Some(v) = g("QR_OUTPUT_DIR")? {
            config.output_dir = PathBuf::from(v);
        }

        config.check()?;
        Ok(config)
    }

    /// Cross-field checks that single-key validation cannot express.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.source_column == self.target_column && self.source_header.is_none() {
            return Err(ConfigError {
                key: "QR_TARGET_COLUMN".into(),
                value: self.target_column.to_string(),
                reason: "must differ from the source column".into(),
            });
        }
        Ok(())
    }

    pub fn column_selector(&self) -> ColumnSelector {
        match &self.source_header {
            Some(name) => ColumnSelector::Header {
                name: name.clone(),
                fallback: self.source_column,
            },
            None => ColumnSelector::Position(self.source_column),
        }
    }

    /// Artifact file extension for the configured container.
    pub fn extension(&self) -> &'static str {
        self.container.extension()
    }

    /// `<stem>_con_QR.xlsx` (or `_con_QR_optimizado.xlsx` for the lossy
    /// container) next to `input`. Legacy `.xls`/`.xlsm` inputs are written
    /// as `.xlsx`.
    pub fn output_workbook_path(&self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "workbook".to_string());
        let suffix = match self.container {
            ContainerFormat::Lossless => "_con_QR",
            ContainerFormat::Lossy => "_con_QR_optimizado",
        };
        input.with_file_name(format!("{stem}{suffix}.xlsx"))
    }
}
