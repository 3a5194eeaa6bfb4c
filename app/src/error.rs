//! Error taxonomy of a pipeline run.
//!
//! [`PipelineError`] aborts the run. [`RowError`] affects one record only;
//! the row is counted unsuccessful and processing continues.

use std::path::PathBuf;

use qr_engine::QrEngineError;
use sheet_io::SheetError;

/// Unrecoverable failures. The run moves to its failed state.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid input workbook: {0}")]
    Validation(#[source] SheetError),

    #[error("Cannot create run directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Record count changed between passes: {expected} rows encoded, {found} rows on re-read")]
    RecordCountMismatch { expected: usize, found: usize },

    #[error("Cannot write output workbook: {0}")]
    Output(#[source] SheetError),

    #[error("Pipeline has already finished")]
    Exhausted,
}

/// Per-row failures.
#[derive(Debug, thiserror::Error)]
pub enum RowError {
    #[error("encoding failed: {0}")]
    Encoding(#[from] QrEngineError),

    #[error("cannot write {path}: {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
