pub mod config;
pub mod error;
pub mod services;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

/// Install the stderr log subscriber. `RUST_LOG` overrides the `warn` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Load .env from multiple candidate paths. Returns the file that was read.
///
/// Nothing is logged here: the subscriber is installed afterwards so that a
/// `RUST_LOG` from the file takes effect.
pub fn load_dotenv() -> Option<&'static str> {
    load_dotenv_from(&[".env", "../.env"])
}

fn load_dotenv_from<'a>(candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .copied()
        .find(|path| dotenvy::from_filename(path).is_ok())
}

/// Ask for the workbook path on `output` and read one line from `input`.
/// Surrounding quotes (as pasted from a file manager) are stripped.
pub fn prompt_input_path<R: BufRead, W: Write>(mut input: R, mut output: W) -> io::Result<Option<PathBuf>> {
    write!(output, "Enter the path of the Excel file: ")?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let path = line.trim().trim_matches(|c| c == '"' || c == '\'');
    if path.is_empty() {
        Ok(None)
    } else {
        Ok(Some(PathBuf::from(path)))
    }
}
