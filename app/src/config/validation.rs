//! Setting value validation.

use std::sync::LazyLock;

use regex::Regex;

static RE_COLUMN_LETTERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]{1,3}$").unwrap());
static RE_COLUMN_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{1,5}$").unwrap());
static RE_EC_LEVEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(l|m|q|h|low|medium|quartile|high)$").unwrap());

/// Largest column index in an OOXML worksheet (`XFD`).
pub const MAX_COLUMN: u16 = 16_384;

/// Validate a setting value. Returns `Ok(())` if valid, or an error message.
pub fn validate_setting(key: &str, value: &str) -> Result<(), String> {
    if super::get_setting(key).is_none() {
        return Err(format!("unknown setting {key}"));
    }
    let value = value.trim();
    match key {
        "QR_PRESET" => {
            value.parse::<super::Preset>()?;
        }
        "QR_SOURCE_COLUMN" | "QR_TARGET_COLUMN" => {
            parse_column(value)?;
        }
        "QR_SOURCE_HEADER" => {
            if value.len() > 255 {
                return Err("header must be at most 255 characters".into());
            }
        }
        "QR_FORMAT" => {
            value.parse::<qr_engine::ContainerFormat>()?;
        }
        "QR_QUALITY" => validate_int_range(value, 1, 100)?,
        "QR_ERROR_CORRECTION" => {
            if !RE_EC_LEVEL.is_match(value) {
                return Err("must be L, M, Q or H".into());
            }
        }
        "QR_MODULE_SIZE" => validate_int_range(value, 1, 100)?,
        "QR_BORDER" => validate_int_range(value, 0, 50)?,
        "QR_OUTPUT_DIR" => {
            if value.is_empty() {
                return Err("must not be empty".into());
            }
        }
        _ => {}
    }
    Ok(())
}

/// Parse a one-based column given as a number (`14`) or letters (`N`).
pub fn parse_column(value: &str) -> Result<u16, String> {
    let value = value.trim();
    let column = if RE_COLUMN_NUMBER.is_match(value) {
        value.parse::<u32>().map_err(|_| "must be a column number")?
    } else if RE_COLUMN_LETTERS.is_match(value) {
        value
            .bytes()
            .map(|b| u32::from(b.to_ascii_uppercase() - b'A') + 1)
            .fold(0, |acc, d| acc * 26 + d)
    } else {
        return Err("must be a column number or letters (e.g. 14 or N)".into());
    };

    if column == 0 || column > u32::from(MAX_COLUMN) {
        return Err(format!("must be between 1 and {MAX_COLUMN}"));
    }
    Ok(column as u16)
}

fn validate_int_range(value: &str, min: i64, max: i64) -> Result<(), String> {
    let v: i64 = value.parse().map_err(|_| "must be an integer")?;
    if v < min || v > max {
        return Err(format!("must be between {min} and {max}"));
    }
    Ok(())
}
