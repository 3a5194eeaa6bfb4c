//! Run directories and the artifacts written into them.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use qr_engine::SanitizedName;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{PipelineError, RowError};

/// Directory name format of a run directory.
pub const RUN_DIR_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// The timestamped directory owned by one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDirectory {
    path: PathBuf,
}

impl RunDirectory {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path an artifact named `name` would have.
    pub fn artifact_path(&self, name: &SanitizedName, extension: &str) -> PathBuf {
        self.path.join(format!("{name}.{extension}"))
    }
}

/// A stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactRecord {
    pub sanitized_name: String,
    pub file_path: PathBuf,
    pub byte_size: u64,
}

/// Create `base/<YYYY-MM-DD_HH-MM-SS>` for the current local time.
pub fn make_run_directory(base: &Path) -> Result<RunDirectory, PipelineError> {
    make_run_directory_at(base, Local::now().naive_local())
}

/// Create the run directory for a given time. An existing directory with the
/// same name (two runs in one second) is an error, not reused.
pub fn make_run_directory_at(base: &Path, at: NaiveDateTime) -> Result<RunDirectory, PipelineError> {
    let path = base.join(at.format(RUN_DIR_FORMAT).to_string());
    let dir_error = |source| PipelineError::Directory {
        path: path.clone(),
        source,
    };

    fs::create_dir_all(base).map_err(dir_error)?;
    fs::create_dir(&path).map_err(dir_error)?;

    info!(path = %path.display(), "Created run directory");
    Ok(RunDirectory { path })
}

/// Write `bytes` as `run_dir/name.extension`, replacing any earlier artifact
/// with the same name.
pub fn store(
    run_dir: &RunDirectory,
    name: &SanitizedName,
    bytes: &[u8],
    extension: &str,
) -> Result<ArtifactRecord, RowError> {
    let file_path = run_dir.artifact_path(name, extension);
    if file_path.exists() {
        debug!(name = %name, "Overwriting artifact with colliding name");
    }
    fs::write(&file_path, bytes).map_err(|source| RowError::Store {
        path: file_path.clone(),
        source,
    })?;

    Ok(ArtifactRecord {
        sanitized_name: name.to_string(),
        file_path,
        byte_size: bytes.len() as u64,
    })
}

/// Whether an artifact named `name` exists in `run_dir`.
pub fn exists(run_dir: &RunDirectory, name: &SanitizedName, extension: &str) -> bool {
    run_dir.artifact_path(name, extension).is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use qr_engine::NameSanitizer;
    use tempfile::TempDir;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 31)
            .and_then(|d| d.and_hms_opt(8, 0, 59))
            .unwrap()
    }

    #[test]
    fn run_directory_is_named_by_timestamp() {
        let base = TempDir::new().unwrap();
        let dir = make_run_directory_at(&base.path().join("codigos_qr"), at()).unwrap();
        assert!(dir.path().is_dir());
        assert_eq!(
            dir.path().file_name().unwrap().to_str().unwrap(),
            "2025-01-31_08-00-59"
        );
    }

    #[test]
    fn same_second_collision_is_fatal() {
        let base = TempDir::new().unwrap();
        make_run_directory_at(base.path(), at()).unwrap();
        let err = make_run_directory_at(base.path(), at()).unwrap_err();
        assert!(matches!(err, PipelineError::Directory { .. }));
    }

    #[test]
    fn unwritable_base_is_a_directory_error() {
        let base = TempDir::new().unwrap();
        let file = base.path().join("not_a_dir");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(
            make_run_directory_at(&file, at()),
            Err(PipelineError::Directory { .. })
        ));
    }

    #[test]
    fn store_writes_and_reports_size() {
        let base = TempDir::new().unwrap();
        let dir = make_run_directory_at(base.path(), at()).unwrap();
        let name = NameSanitizer::new().sanitize("ABC-123");

        assert!(!exists(&dir, &name, "png"));
        let record = store(&dir, &name, b"12345", "png").unwrap();
        assert_eq!(record.byte_size, 5);
        assert_eq!(record.file_path, dir.path().join("abc-123.png"));
        assert!(exists(&dir, &name, "png"));
        assert!(!exists(&dir, &name, "jpg"));
    }

    #[test]
    fn colliding_names_overwrite() {
        let base = TempDir::new().unwrap();
        let dir = make_run_directory_at(base.path(), at()).unwrap();
        let sanitizer = NameSanitizer::new();

        store(&dir, &sanitizer.sanitize("A!B"), b"first", "png").unwrap();
        store(&dir, &sanitizer.sanitize("A?B"), b"second!", "png").unwrap();

        let entries = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
        assert_eq!(fs::read(dir.path().join("ab.png")).unwrap(), b"second!");
    }
}
