use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Arg, ArgMatches, Command, CommandFactory, FromArgMatches, Parser};

use qr_sheet_lib::config::{ConfigError, PipelineConfig, SETTINGS, get_setting};
use qr_sheet_lib::services::pipeline::Pipeline;
use qr_sheet_lib::services::progress::ConsoleReporter;
use sheet_io::XlsxSource;

/// Positional input and output switches. Every `QR_*` setting also gets a
/// `--<flag>` option, added from the settings table in [`command`].
#[derive(Parser)]
#[command(
    name = "qr-sheet",
    version,
    about = "Generate QR codes for a spreadsheet column and embed them into a copy of the workbook."
)]
struct Cli {
    /// Input workbook (.xlsx, .xlsm or .xls). Prompted for when omitted.
    input: Option<PathBuf>,

    /// Print the final report as JSON instead of the text summary.
    #[arg(long)]
    json: bool,
}

fn command() -> Command {
    Cli::command().args(SETTINGS.iter().map(|def| {
        Arg::new(def.flag)
            .long(def.flag)
            .value_name("VALUE")
            .help(def.description)
    }))
}

/// Flag values keyed by their setting name.
fn overrides(matches: &ArgMatches) -> HashMap<&'static str, String> {
    SETTINGS
        .iter()
        .filter_map(|def| {
            matches
                .get_one::<String>(def.flag)
                .map(|value| (def.key, value.clone()))
        })
        .collect()
}

fn run(cli: Cli, overrides: &HashMap<&str, String>) -> Result<()> {
    let config = PipelineConfig::load(overrides)?;
    tracing::debug!(?config, "Resolved configuration");

    let input = match cli.input {
        Some(path) => path,
        None => match qr_sheet_lib::prompt_input_path(io::stdin().lock(), io::stdout())? {
            Some(path) => path,
            None => bail!("No input file given"),
        },
    };

    let output_path = config.output_workbook_path(&input);
    let pipeline = Pipeline::new(config, XlsxSource::new(&input), &input, output_path);

    let mut reporter = ConsoleReporter::new(io::stdout());
    let report = pipeline.run_to_end(|event| {
        if let Err(e) = reporter.handle(event) {
            tracing::warn!("Failed to write progress: {e}");
        }
    })?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
    } else {
        reporter.summary(&report)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    // .env may carry RUST_LOG, so it is loaded before the subscriber.
    let dotenv = qr_sheet_lib::load_dotenv();
    qr_sheet_lib::init_tracing();
    match dotenv {
        Some(path) => tracing::info!("Loaded .env from: {path}"),
        None => tracing::debug!("No .env file found, using system environment variables"),
    }

    let matches = command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    match run(cli, &overrides(&matches)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\nError: {e:#}");
            if let Some(def) = e.downcast_ref::<ConfigError>().and_then(|c| get_setting(&c.key)) {
                eprintln!("  {} (--{}): {}", def.key, def.flag, def.description);
            }
            ExitCode::FAILURE
        }
    }
}
