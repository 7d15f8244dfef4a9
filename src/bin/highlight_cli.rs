use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use highlight_analyzer::config::AnalysisConfig;
use highlight_analyzer::export::AnalysisReport;
use highlight_analyzer::fixtures::{ExpectationDiff, FixtureCatalog};
use highlight_analyzer::pipeline::{Analyzer, CancellationToken};
use highlight_analyzer::telemetry::{NullObserver, ProgressEvent, ProgressObserver};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "highlight_cli",
    about = "Deterministic highlight analysis harness over novelty fixtures"
)]
struct Cli {
    /// Override directory containing fixture assets (defaults to ./fixtures)
    #[arg(long)]
    fixtures_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a fixture and optionally compare against expectations
    Analyze {
        /// Fixture name or path to an input JSON file
        #[arg(long)]
        fixture: String,
        /// JSON configuration file (missing fields use defaults)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Number of clips to select
        #[arg(long)]
        clips: Option<usize>,
        /// Must-include moment in seconds (repeatable)
        #[arg(long = "seed")]
        seeds: Vec<f64>,
        /// Snap clips to the beat grid when the fixture has beats
        #[arg(long)]
        align_to_beat: bool,
        #[arg(long)]
        expect: Option<PathBuf>,
        /// Write the JSON report here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
        /// Also write the clips as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Stream progress events as JSON lines on stderr
        #[arg(long)]
        progress: bool,
    },
    /// List available fixtures on disk
    DumpFixtures,
}

/// Writes each progress event to stderr as one JSON line.
struct StderrProgress;

impl ProgressObserver for StderrProgress {
    fn on_event(&self, event: &ProgressEvent) {
        if let Ok(line) = serde_json::to_string(event) {
            eprintln!("{line}");
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let catalog = cli
        .fixtures_dir
        .map(FixtureCatalog::new)
        .unwrap_or_else(FixtureCatalog::default);

    match cli.command {
        Commands::Analyze {
            fixture,
            config,
            clips,
            seeds,
            align_to_beat,
            expect,
            output,
            csv,
            progress,
        } => {
            let mut config = match config {
                Some(path) => AnalysisConfig::try_load_from_file(&path)?,
                None => AnalysisConfig::default(),
            };
            if let Some(clips) = clips {
                config.clips_count = clips;
            }
            if !seeds.is_empty() {
                config.seed_timestamps = seeds;
            }
            if align_to_beat {
                config.align_to_beat = true;
            }
            run_analyze(&catalog, &fixture, config, expect, output, csv, progress)
        }
        Commands::DumpFixtures => run_dump(&catalog),
    }
}

fn run_analyze(
    catalog: &FixtureCatalog,
    fixture: &str,
    config: AnalysisConfig,
    override_expect: Option<PathBuf>,
    output_path: Option<PathBuf>,
    csv_path: Option<PathBuf>,
    progress: bool,
) -> Result<ExitCode> {
    let analyzer = Analyzer::new(config).context("invalid analysis configuration")?;
    let data = catalog.load(fixture, override_expect)?;

    let observer: &dyn ProgressObserver = if progress {
        &StderrProgress
    } else {
        &NullObserver
    };
    let outcome = analyzer
        .analyze(&data.input, observer, &CancellationToken::new())
        .with_context(|| format!("analyzing fixture {}", fixture))?;

    let audio_duration = analyzer
        .config()
        .audio_duration
        .or(data.input.audio_duration);
    let report = AnalysisReport::from_outcome(
        &outcome,
        analyzer.config(),
        data.metadata.name.as_str(),
        audio_duration,
    );

    match output_path {
        Some(path) => report.write_json(&path)?,
        None => println!("{}", report.to_json_pretty()?),
    }
    if let Some(path) = csv_path {
        report.write_csv(&path)?;
    }

    if let Some(expectations) = data.expectations {
        match expectations.verify(&outcome.segments) {
            Ok(()) => Ok(ExitCode::from(0)),
            Err(diff) => {
                emit_diff(&diff)?;
                Ok(ExitCode::from(2))
            }
        }
    } else {
        Ok(ExitCode::from(0))
    }
}

fn run_dump(catalog: &FixtureCatalog) -> Result<ExitCode> {
    let fixtures = catalog.discover()?;
    if fixtures.is_empty() {
        println!("No fixtures found under {}", catalog.root().display());
        return Ok(ExitCode::from(0));
    }

    for metadata in fixtures {
        if let Some(expect) = metadata.expect_path {
            println!("{} -> {}", metadata.name, expect.display());
        } else {
            println!("{}", metadata.name);
        }
    }
    Ok(ExitCode::from(0))
}

fn emit_diff(diff: &ExpectationDiff) -> Result<()> {
    let json = serde_json::to_string_pretty(&diff.to_json())?;
    eprintln!("{json}");
    Ok(())
}
