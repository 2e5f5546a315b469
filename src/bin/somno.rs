//! Somno CLI - command-line interface for the Somnolog ingestion engine
//!
//! Commands:
//! - parse: run the batch pipeline over device log files
//! - detect: print the detected vendor format per path

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use somnolog::batch::{parse_all_parallel_with, CancelToken};
use somnolog::{detect_file, WaveformNormalizer, SOMNOLOG_VERSION};

/// Somnolog - normalize vendor sleep-therapy device logs
#[derive(Parser)]
#[command(name = "somno")]
#[command(version = SOMNOLOG_VERSION)]
#[command(about = "Normalize vendor sleep-therapy device logs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse device log files into session records
    Parse {
        /// Input log files, processed in order
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        format: OutputFormat,

        /// Worker threads for the batch
        #[arg(long, default_value = "4")]
        jobs: usize,

        /// Canonical waveform sample interval in minutes
        #[arg(long)]
        interval: Option<f64>,
    },

    /// Print the detected vendor format for each path
    Detect {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("somno: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Parse {
            paths,
            output,
            format,
            jobs,
            interval,
        } => {
            let normalizer = match interval {
                Some(minutes) if minutes.is_finite() && minutes > 0.0 => {
                    WaveformNormalizer::with_interval(minutes)
                }
                Some(minutes) => {
                    return Err(format!("--interval must be positive, got {minutes}").into());
                }
                None => WaveformNormalizer::new(),
            };

            let cancel = CancelToken::new();
            let outcome = parse_all_parallel_with(&paths, jobs, &cancel, &normalizer);

            let rendered = match format {
                OutputFormat::Ndjson => outcome.records_to_ndjson()?,
                OutputFormat::Json => outcome.records_to_json()?,
            };
            write_output(&output, &rendered)?;

            let summary = outcome.summary();
            eprintln!(
                "parsed {} record(s), downgraded {}, skipped {}",
                summary.parsed, summary.downgraded, summary.skipped
            );
            for (kind, count) in &summary.skip_reasons {
                eprintln!("  skipped {count}: {kind}");
            }
            for diag in &outcome.diagnostics {
                eprintln!("  {}: {}", diag.kind, diag.detail);
            }

            // Nothing parsed at all is a failure for scripting callers
            if summary.parsed == 0 {
                return Ok(ExitCode::FAILURE);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Detect { paths } => {
            let mut stdout = io::stdout().lock();
            for path in &paths {
                let format = detect_file(path);
                writeln!(stdout, "{}\t{}", path.display(), format.as_str())?;
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn write_output(path: &PathBuf, rendered: &str) -> io::Result<()> {
    if path.as_os_str() == "-" {
        let mut stdout = io::stdout().lock();
        stdout.write_all(rendered.as_bytes())?;
        stdout.flush()
    } else {
        fs::write(path, rendered)
    }
}
