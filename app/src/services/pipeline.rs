//! The run state machine.
//!
//! A [`Pipeline`] is an iterator of progress events. Each call to `next`
//! advances the run by one step (one record while encoding, one placement
//! while embedding), so the caller decides how progress is presented.
//! A fatal error is yielded once, after which the iterator is exhausted.

use std::mem;
use std::path::PathBuf;
use std::time::Instant;
use std::vec;

use qr_engine::sanitize::is_missing;
use qr_engine::{LayoutProfile, NameSanitizer, select_layout, to_bytes};
use sheet_io::{CellImage, ImageSink, Record, SheetSource};
use tracing::{error, info, warn};

use super::artifact_store::{RunDirectory, make_run_directory, store};
use super::embedding::{self, PlacementInstruction};
use super::progress::{ProgressEvent, RowFailure, RowOutcome, RunReport};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, RowError};

/// Externally visible run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    Validating,
    Encoding,
    Planning,
    Embedding,
    Done,
    Failed,
}

enum Stage<K> {
    Init,
    Validating,
    Encoding {
        run_dir: RunDirectory,
        records: vec::IntoIter<Record>,
    },
    Planning {
        run_dir: RunDirectory,
    },
    Embedding {
        run_dir: RunDirectory,
        layout: LayoutProfile,
        sink: K,
        pending: vec::IntoIter<PlacementInstruction>,
        planned: usize,
    },
    Done,
    Failed,
}

/// One execution of the QR pipeline over one workbook.
pub struct Pipeline<S: SheetSource> {
    config: PipelineConfig,
    source: S,
    input: PathBuf,
    output_path: PathBuf,
    sanitizer: NameSanitizer,
    stage: Stage<S::Sink>,
    started: Instant,
    total: usize,
    successful: usize,
    placed: usize,
    failures: Vec<RowFailure>,
}

impl<S: SheetSource> Pipeline<S> {
    /// `input` is only used for reporting; the data comes from `source`.
    pub fn new(
        config: PipelineConfig,
        source: S,
        input: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config,
            source,
            input: input.into(),
            output_path: output_path.into(),
            sanitizer: NameSanitizer::new(),
            stage: Stage::Init,
            started: Instant::now(),
            total: 0,
            successful: 0,
            placed: 0,
            failures: Vec::new(),
        }
    }

    /// Replace the name sanitizer (fixes the missing-value timestamp).
    pub fn with_sanitizer(mut self, sanitizer: NameSanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    pub fn state(&self) -> RunState {
        match self.stage {
            Stage::Init => RunState::Init,
            Stage::Validating => RunState::Validating,
            Stage::Encoding { .. } => RunState::Encoding,
            Stage::Planning { .. } => RunState::Planning,
            Stage::Embedding { .. } => RunState::Embedding,
            Stage::Done => RunState::Done,
            Stage::Failed => RunState::Failed,
        }
    }

    /// Drive the run to completion, passing every event to `on_event`.
    pub fn run_to_end<F>(mut self, mut on_event: F) -> Result<RunReport, PipelineError>
    where
        F: FnMut(&ProgressEvent),
    {
        let mut report = None;
        for event in self.by_ref() {
            let event = event?;
            on_event(&event);
            if let ProgressEvent::Finished(r) = event {
                report = Some(r);
            }
        }
        report.ok_or(PipelineError::Exhausted)
    }

    fn step(&mut self) -> Result<Option<ProgressEvent>, PipelineError> {
        loop {
            // Any early return through `?` leaves the stage as `Failed`.
            match mem::replace(&mut self.stage, Stage::Failed) {
                Stage::Init => {
                    info!(input = %self.input.display(), "Starting QR pipeline");
                    self.started = Instant::now();
                    self.stage = Stage::Validating;
                    return Ok(Some(ProgressEvent::Validating {
                        input: self.input.clone(),
                    }));
                }
                Stage::Validating => {
                    self.source.validate().map_err(PipelineError::Validation)?;
                    let records = self
                        .source
                        .read_column(&self.config.column_selector())
                        .map_err(PipelineError::Validation)?;
                    let run_dir = make_run_directory(&self.config.output_dir)?;

                    self.total = records.len();
                    info!(total = self.total, "Processing records");
                    let event = ProgressEvent::Started {
                        total: self.total,
                        run_dir: run_dir.path().to_path_buf(),
                    };
                    self.stage = Stage::Encoding {
                        run_dir,
                        records: records.into_iter(),
                    };
                    return Ok(Some(event));
                }
                Stage::Encoding {
                    run_dir,
                    mut records,
                } => {
                    let Some(record) = records.next() else {
                        self.stage = Stage::Planning { run_dir };
                        continue;
                    };
                    let outcome = self.encode_record(&run_dir, &record);
                    self.stage = Stage::Encoding { run_dir, records };
                    return Ok(Some(ProgressEvent::Encoded {
                        row: record.row_index,
                        total: self.total,
                        outcome,
                    }));
                }
                Stage::Planning { run_dir } => {
                    // Names are re-derived from what the workbook holds now.
                    let records = self
                        .source
                        .read_column(&self.config.column_selector())
                        .map_err(PipelineError::Validation)?;
                    if records.len() != self.total {
                        return Err(PipelineError::RecordCountMismatch {
                            expected: self.total,
                            found: records.len(),
                        });
                    }

                    let layout = select_layout(self.total);
                    let plan = embedding::plan(
                        &records,
                        &self.sanitizer,
                        &run_dir,
                        &layout,
                        self.config.target_column,
                        self.config.extension(),
                    );
                    for &row_index in &plan.missing {
                        if !self.failures.iter().any(|f| f.row_index == row_index) {
                            self.failures.push(RowFailure {
                                row_index,
                                message: "no artifact to place".into(),
                            });
                        }
                    }
                    let sink = self.source.open_sink().map_err(PipelineError::Output)?;

                    let planned = plan.instructions.len();
                    info!(
                        instructions = planned,
                        missing = plan.missing.len(),
                        cell_height = layout.cell_height,
                        image_px = layout.image_width_px,
                        "Planned placements"
                    );
                    let event = ProgressEvent::Planned {
                        instructions: planned,
                        missing: plan.missing.len(),
                        layout,
                    };
                    self.stage = Stage::Embedding {
                        run_dir,
                        layout,
                        sink,
                        pending: plan.instructions.into_iter(),
                        planned,
                    };
                    return Ok(Some(event));
                }
                Stage::Embedding {
                    run_dir,
                    layout,
                    mut sink,
                    mut pending,
                    planned,
                } => {
                    let Some(instruction) = pending.next() else {
                        sink.save(&self.output_path)
                            .map_err(PipelineError::Output)?;
                        let report = self.report(&run_dir, layout);
                        info!(
                            successful = report.successful,
                            total = report.total,
                            placed = report.placed,
                            "QR pipeline finished"
                        );
                        self.stage = Stage::Done;
                        return Ok(Some(ProgressEvent::Finished(report)));
                    };

                    let attached = match sink.attach(&CellImage::from(&instruction)) {
                        Ok(()) => {
                            self.placed += 1;
                            true
                        }
                        Err(e) => {
                            warn!(row = instruction.row_index, "Image not attached: {e}");
                            self.failures.push(RowFailure {
                                row_index: instruction.row_index,
                                message: e.to_string(),
                            });
                            false
                        }
                    };
                    let position = planned - pending.len();
                    self.stage = Stage::Embedding {
                        run_dir,
                        layout,
                        sink,
                        pending,
                        planned,
                    };
                    return Ok(Some(ProgressEvent::Embedded {
                        position,
                        total: planned,
                        row: instruction.row_index,
                        attached,
                    }));
                }
                Stage::Done => {
                    self.stage = Stage::Done;
                    return Ok(None);
                }
                Stage::Failed => return Ok(None),
            }
        }
    }

    fn encode_record(&mut self, run_dir: &RunDirectory, record: &Record) -> RowOutcome {
        let name = self.sanitizer.sanitize_row(record.row_index, &record.raw_text);
        // Missing values have no text of their own; their QR carries the name.
        let payload = if is_missing(&record.raw_text) {
            name.as_str()
        } else {
            record.raw_text.as_str()
        };

        let result = qr_engine::encode(payload, &self.config.qr)
            .and_then(|img| to_bytes(&img, self.config.container, self.config.quality))
            .map_err(RowError::from)
            .and_then(|bytes| store(run_dir, &name, &bytes, self.config.extension()));

        match result {
            Ok(artifact) => {
                self.successful += 1;
                RowOutcome::Stored(artifact)
            }
            Err(e) => {
                warn!(row = record.row_index, name = %name, "Row skipped: {e}");
                self.failures.push(RowFailure {
                    row_index: record.row_index,
                    message: e.to_string(),
                });
                RowOutcome::Failed(e.to_string())
            }
        }
    }

    fn report(&self, run_dir: &RunDirectory, layout: LayoutProfile) -> RunReport {
        let mut failures = self.failures.clone();
        failures.sort_by_key(|f| f.row_index);
        RunReport {
            total: self.total,
            successful: self.successful,
            placed: self.placed,
            unplaced: self.total - self.placed,
            layout,
            run_dir: run_dir.path().to_path_buf(),
            output_path: self.output_path.clone(),
            elapsed_secs: self.started.elapsed().as_secs_f64(),
            failures,
        }
    }
}

impl<S: SheetSource> Iterator for Pipeline<S> {
    type Item = Result<ProgressEvent, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.step() {
            Ok(event) => event.map(Ok),
            Err(e) => {
                error!("QR pipeline failed: {e}");
                self.stage = Stage::Failed;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Preset;
    use crate::services::progress::Phase;
    use chrono::NaiveDate;
    use qr_engine::{ContainerFormat, QrParams};
    use sheet_io::{ColumnSelector, SheetError};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::fs;
    use std::path::Path;
    use std::rc::Rc;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Written {
        images: Vec<CellImage>,
        saved: Option<PathBuf>,
    }

    /// Serves one column per read; the last one repeats.
    struct MemorySource {
        reads: RefCell<VecDeque<Vec<Record>>>,
        valid: bool,
        written: Rc<RefCell<Written>>,
    }

    impl MemorySource {
        fn new(values: &[&str]) -> Self {
            Self::with_reads(vec![records(values)])
        }

        fn with_reads(reads: Vec<Vec<Record>>) -> Self {
            Self {
                reads: RefCell::new(reads.into()),
                valid: true,
                written: Rc::default(),
            }
        }
    }

    struct MemorySink {
        written: Rc<RefCell<Written>>,
    }

    impl SheetSource for MemorySource {
        type Sink = MemorySink;

        fn validate(&self) -> sheet_io::Result<()> {
            if self.valid {
                Ok(())
            } else {
                Err(SheetError::NotFound(PathBuf::from("missing.xlsx")))
            }
        }

        fn read_column(&self, _column: &ColumnSelector) -> sheet_io::Result<Vec<Record>> {
            let mut reads = self.reads.borrow_mut();
            if reads.len() > 1 {
                Ok(reads.pop_front().unwrap_or_default())
            } else {
                Ok(reads.front().cloned().unwrap_or_default())
            }
        }

        fn open_sink(&self) -> sheet_io::Result<MemorySink> {
            Ok(MemorySink {
                written: Rc::clone(&self.written),
            })
        }
    }

    impl ImageSink for MemorySink {
        fn attach(&mut self, image: &CellImage) -> sheet_io::Result<()> {
            if !image.image_path.is_file() {
                return Err(SheetError::InvalidCell {
                    row: image.row,
                    column: u32::from(image.column),
                });
            }
            self.written.borrow_mut().images.push(image.clone());
            Ok(())
        }

        fn save(self, path: &Path) -> sheet_io::Result<()> {
            self.written.borrow_mut().saved = Some(path.to_path_buf());
            Ok(())
        }
    }

    fn records(values: &[&str]) -> Vec<Record> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Record::new(i, *v))
            .collect()
    }

    fn config(dir: &TempDir) -> PipelineConfig {
        let mut config = PipelineConfig::from_preset(Preset::Identifier);
        config.source_header = None;
        config.target_column = 5;
        config.output_dir = dir.path().join("codigos_qr");
        config
    }

    fn pipeline(config: PipelineConfig, source: MemorySource) -> Pipeline<MemorySource> {
        let at = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 7)
            .unwrap();
        Pipeline::new(config, source, "input.xlsx", "input_con_QR.xlsx")
            .with_sanitizer(NameSanitizer::with_timestamp(at))
    }

    fn artifact_names(run_dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(run_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn three_rows_end_to_end() {
        let dir = TempDir::new().unwrap();
        let source = MemorySource::new(&["ABC-123", "", "weird!@#chars"]);
        let written = Rc::clone(&source.written);

        let mut phases = Vec::new();
        let report = pipeline(config(&dir), source)
            .run_to_end(|e| phases.push(e.phase()))
            .unwrap();

        assert_eq!(report.total, 3);
        assert_eq!(report.successful, 3);
        assert_eq!(report.placed, 3);
        assert_eq!(report.unplaced, 0);
        assert!(report.failures.is_empty());
        assert_eq!(report.layout, select_layout(3));
        assert_eq!(phases.len(), 10);
        assert_eq!(phases.first(), Some(&Phase::Validating));
        assert_eq!(phases.last(), Some(&Phase::Done));

        assert_eq!(
            artifact_names(&report.run_dir),
            vec![
                "abc-123.png".to_string(),
                "sin_id_20240309_140507_r1.png".to_string(),
                "weirdchars.png".to_string(),
            ]
        );

        let written = written.borrow();
        assert_eq!(written.saved, Some(PathBuf::from("input_con_QR.xlsx")));
        let rows: Vec<u32> = written.images.iter().map(|i| i.row).collect();
        assert_eq!(rows, vec![2, 3, 4]);
        for image in &written.images {
            assert_eq!(image.column, 5);
            assert_eq!((image.width_px, image.height_px), (110, 110));
            assert_eq!((image.x_offset, image.y_offset), (5, 5));
            assert_eq!(image.row_height, 90.0);
            assert_eq!(image.column_width, 15.0);
        }
    }

    #[test]
    fn large_run_uses_smallest_tier() {
        let dir = TempDir::new().unwrap();
        let values: Vec<String> = (0..1200).map(|i| format!("ID-{i:05}")).collect();
        let refs: Vec<&str> = values.iter().map(String::as_str).collect();
        let source = MemorySource::new(&refs);
        let written = Rc::clone(&source.written);

        let mut config = config(&dir);
        config.qr = QrParams {
            module_size: 1,
            border_modules: 0,
            ..QrParams::default()
        };
        let report = pipeline(config, source).run_to_end(|_| {}).unwrap();

        assert_eq!(report.successful, 1200);
        assert_eq!(report.placed, 1200);
        let written = written.borrow();
        assert_eq!(written.images.len(), 1200);
        assert!(written.images.iter().all(|i| i.width_px == 95 && i.row_height == 75.0));
        assert_eq!(written.images.last().map(|i| i.row), Some(1201));
    }

    #[test]
    fn colliding_names_share_one_artifact() {
        let dir = TempDir::new().unwrap();
        let source = MemorySource::new(&["A!B", "A?B"]);
        let written = Rc::clone(&source.written);

        let report = pipeline(config(&dir), source).run_to_end(|_| {}).unwrap();

        assert_eq!(artifact_names(&report.run_dir), vec!["ab.png".to_string()]);
        assert_eq!(report.placed, 2);
        let written = written.borrow();
        assert_eq!(written.images[0].image_path, written.images[1].image_path);
    }

    #[test]
    fn record_count_change_fails_the_run() {
        let dir = TempDir::new().unwrap();
        let source = MemorySource::with_reads(vec![
            records(&["a", "b", "c"]),
            records(&["a", "b"]),
        ]);
        let written = Rc::clone(&source.written);
        let mut run = pipeline(config(&dir), source);

        let last = run.by_ref().last().unwrap();
        assert!(matches!(
            last,
            Err(PipelineError::RecordCountMismatch { expected: 3, found: 2 })
        ));
        assert_eq!(run.state(), RunState::Failed);
        assert!(run.next().is_none());
        assert!(written.borrow().saved.is_none());
    }

    #[test]
    fn invalid_input_creates_no_run_directory() {
        let dir = TempDir::new().unwrap();
        let mut source = MemorySource::new(&["a"]);
        source.valid = false;
        let config = config(&dir);
        let base = config.output_dir.clone();

        let err = pipeline(config, source).run_to_end(|_| {}).unwrap_err();

        assert!(matches!(err, PipelineError::Validation(SheetError::NotFound(_))));
        assert!(!base.exists());
    }

    #[test]
    fn oversized_row_is_counted_and_skipped() {
        let dir = TempDir::new().unwrap();
        let long = "x".repeat(3000);
        let source = MemorySource::new(&["first", long.as_str(), "third"]);
        let written = Rc::clone(&source.written);

        let report = pipeline(config(&dir), source).run_to_end(|_| {}).unwrap();

        assert_eq!(report.total, 3);
        assert_eq!(report.successful, 2);
        assert_eq!(report.placed, 2);
        assert_eq!(report.unplaced, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].row_index, 1);
        let rows: Vec<u32> = written.borrow().images.iter().map(|i| i.row).collect();
        assert_eq!(rows, vec![2, 4]);
    }

    #[test]
    fn artifact_removed_before_planning_is_skipped() {
        let dir = TempDir::new().unwrap();
        let source = MemorySource::new(&["keep", "drop"]);
        let written = Rc::clone(&source.written);
        let mut run = pipeline(config(&dir), source);

        let mut report = None;
        for event in run.by_ref() {
            match event.unwrap() {
                ProgressEvent::Encoded {
                    row: 1,
                    outcome: RowOutcome::Stored(artifact),
                    ..
                } => fs::remove_file(&artifact.file_path).unwrap(),
                ProgressEvent::Planned { instructions, missing, .. } => {
                    assert_eq!((instructions, missing), (1, 1));
                }
                ProgressEvent::Finished(r) => report = Some(r),
                _ => {}
            }
        }

        let report = report.unwrap();
        assert_eq!(report.successful, 2);
        assert_eq!(report.placed, 1);
        assert_eq!(report.failures[0].message, "no artifact to place");
        assert_eq!(written.borrow().images.len(), 1);
        assert_eq!(run.state(), RunState::Done);
    }

    #[test]
    fn lossy_container_stores_jpeg() {
        let dir = TempDir::new().unwrap();
        let source = MemorySource::new(&["one", "two"]);
        let mut config = config(&dir);
        config.container = ContainerFormat::Lossy;

        let report = pipeline(config, source).run_to_end(|_| {}).unwrap();

        assert_eq!(
            artifact_names(&report.run_dir),
            vec!["one.jpg".to_string(), "two.jpg".to_string()]
        );
        let bytes = fs::read(report.run_dir.join("one.jpg")).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn finished_pipeline_yields_nothing() {
        let dir = TempDir::new().unwrap();
        let mut run = pipeline(config(&dir), MemorySource::new(&["a"]));
        assert_eq!(run.state(), RunState::Init);

        assert_eq!(run.by_ref().filter(|e| e.is_ok()).count(), 6);
        assert_eq!(run.state(), RunState::Done);
        assert!(matches!(
            run.run_to_end(|_| {}),
            Err(PipelineError::Exhausted)
        ));
    }
}
