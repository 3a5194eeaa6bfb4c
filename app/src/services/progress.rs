//! Progress events emitted by a pipeline run, and a console reporter.

use std::io::{self, Write};
use std::path::PathBuf;

use qr_engine::LayoutProfile;
use serde::Serialize;

use super::artifact_store::ArtifactRecord;

/// Run phase an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Validating,
    Encoding,
    Planning,
    Embedding,
    Done,
}

/// Result of encoding and storing one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Stored(ArtifactRecord),
    Failed(String),
}

/// A row that produced no artifact, or whose artifact was not placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    pub row_index: usize,
    pub message: String,
}

/// Final tally of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub total: usize,
    /// Records with a stored artifact.
    pub successful: usize,
    /// Images attached to the output workbook.
    pub placed: usize,
    /// Records without an image in the output workbook.
    pub unplaced: usize,
    pub layout: LayoutProfile,
    pub run_dir: PathBuf,
    pub output_path: PathBuf,
    pub elapsed_secs: f64,
    pub failures: Vec<RowFailure>,
}

/// One step of a run, yielded in order.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Validating { input: PathBuf },
    Started { total: usize, run_dir: PathBuf },
    Encoded { row: usize, total: usize, outcome: RowOutcome },
    Planned { instructions: usize, missing: usize, layout: LayoutProfile },
    Embedded { position: usize, total: usize, row: usize, attached: bool },
    Finished(RunReport),
}

impl ProgressEvent {
    pub fn phase(&self) -> Phase {
        match self {
            Self::Validating { .. } => Phase::Validating,
            Self::Started { .. } | Self::Encoded { .. } => Phase::Encoding,
            Self::Planned { .. } => Phase::Planning,
            Self::Embedded { .. } => Phase::Embedding,
            Self::Finished(_) => Phase::Done,
        }
    }
}

/// Renders progress as a single rewritten console line per phase.
pub struct ConsoleReporter<W: Write> {
    out: W,
    in_line: bool,
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            in_line: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn handle(&mut self, event: &ProgressEvent) -> io::Result<()> {
        match event {
            ProgressEvent::Validating { input } => {
                writeln!(self.out, "Reading {}...", input.display())?;
            }
            ProgressEvent::Started { total, .. } => {
                writeln!(self.out, "Processing {total} records...")?;
            }
            ProgressEvent::Encoded { row, total, .. } => {
                self.progress_line("Generating QR", row + 1, *total)?;
            }
            ProgressEvent::Planned { .. } => {
                self.end_line()?;
                writeln!(self.out, "Inserting QR codes into the workbook...")?;
            }
            ProgressEvent::Embedded {
                position, total, ..
            } => {
                self.progress_line("Inserting", *position, *total)?;
            }
            ProgressEvent::Finished(_) => {
                self.end_line()?;
            }
        }
        self.out.flush()
    }

    /// Print the closing summary.
    pub fn summary(&mut self, report: &RunReport) -> io::Result<()> {
        self.end_line()?;
        writeln!(self.out, "\nDone:")?;
        writeln!(
            self.out,
            "- {}/{} QR codes generated.",
            report.successful, report.total
        )?;
        if report.unplaced > 0 {
            writeln!(self.out, "- {} rows without an image.", report.unplaced)?;
        }
        let run_dir = std::path::absolute(&report.run_dir).unwrap_or_else(|_| report.run_dir.clone());
        writeln!(self.out, "- QR files saved in: {}", run_dir.display())?;
        writeln!(
            self.out,
            "- Workbook with QR codes saved as: {}",
            report.output_path.display()
        )?;
        writeln!(
            self.out,
            "Total processing time: {:.2} seconds",
            report.elapsed_secs
        )?;
        self.out.flush()
    }

    fn progress_line(&mut self, label: &str, done: usize, total: usize) -> io::Result<()> {
        let pct = if total == 0 {
            100.0
        } else {
            done as f64 / total as f64 * 100.0
        };
        write!(self.out, "\r{label}: {done}/{total} ({pct:.1}%)   ")?;
        self.in_line = true;
        Ok(())
    }

    fn end_line(&mut self) -> io::Result<()> {
        if self.in_line {
            writeln!(self.out)?;
            self.in_line = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qr_engine::select_layout;

    fn report() -> RunReport {
        RunReport {
            total: 3,
            successful: 2,
            placed: 2,
            unplaced: 1,
            layout: select_layout(3),
            run_dir: PathBuf::from("/tmp/codigos_qr/2025-01-01_00-00-00"),
            output_path: PathBuf::from("/tmp/in_con_QR.xlsx"),
            elapsed_secs: 1.5,
            failures: vec![RowFailure {
                row_index: 1,
                message: "encoding failed".into(),
            }],
        }
    }

    #[test]
    fn progress_lines_are_rewritten_in_place() {
        let mut reporter = ConsoleReporter::new(Vec::new());
        for row in 0..2 {
            reporter
                .handle(&ProgressEvent::Encoded {
                    row,
                    total: 4,
                    outcome: RowOutcome::Failed("x".into()),
                })
                .unwrap();
        }
        reporter
            .handle(&ProgressEvent::Planned {
                instructions: 0,
                missing: 2,
                layout: select_layout(4),
            })
            .unwrap();

        let out = String::from_utf8(reporter.into_inner()).unwrap();
        assert!(out.starts_with("\rGenerating QR: 1/4 (25.0%)"));
        assert!(out.contains("\rGenerating QR: 2/4 (50.0%)   \nInserting QR codes"));
    }

    #[test]
    fn summary_lists_counts_and_paths() {
        let mut reporter = ConsoleReporter::new(Vec::new());
        reporter.summary(&report()).unwrap();
        let out = String::from_utf8(reporter.into_inner()).unwrap();
        assert!(out.contains("- 2/3 QR codes generated."));
        assert!(out.contains("- 1 rows without an image."));
        assert!(out.contains("in_con_QR.xlsx"));
        assert!(out.contains("1.50 seconds"));
    }

    #[test]
    fn phases_follow_event_kinds() {
        let ev = ProgressEvent::Finished(report());
        assert_eq!(ev.phase(), Phase::Done);
        let ev = ProgressEvent::Started {
            total: 1,
            run_dir: PathBuf::new(),
        };
        assert_eq!(ev.phase(), Phase::Encoding);
    }

    #[test]
    fn report_serializes_to_json() {
        let json = serde_json::to_value(report()).unwrap();
        assert_eq!(json["successful"], 2);
        assert_eq!(json["layout"]["image_width_px"], 110);
        assert_eq!(json["failures"][0]["row_index"], 1);
    }
}
