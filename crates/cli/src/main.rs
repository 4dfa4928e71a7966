//! zonestat CLI - batch zonal statistics of OHM and slope rasters

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, Dispatch};

use zonestat_batch::{
    BatchConfig, BatchOrchestrator, CoverageRule, LogConfig, LogSink, ProgressEvent,
    RasterPrecedence, RunOutcome, RunSummary, DEFAULT_NODATA,
};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "zonestat")]
#[command(
    author,
    version,
    about = "Batch zonal statistics of an OHM and a slope raster over folders of vector files",
    long_about = None
)]
struct Cli {
    /// Organic horizon thickness raster
    #[arg(short = 'o', long)]
    ohm_raster: PathBuf,

    /// Slope raster
    #[arg(short = 's', long)]
    slope_raster: PathBuf,

    /// Folder searched recursively for vector files
    #[arg(short = 'i', long)]
    input_folder: PathBuf,

    /// Folder for results and processing_summary.json (created if absent)
    #[arg(long, visible_alias = "out")]
    output_folder: PathBuf,

    /// Target EPSG code; overrides the CRS decided from the inputs
    #[arg(long)]
    epsg: Option<u32>,

    /// Count every pixel touched by a geometry, not only pixels whose center is inside
    #[arg(long)]
    all_touched: bool,

    /// Raster whose CRS wins when the two rasters disagree
    #[arg(long, value_enum, default_value_t = Prefer::Ohm)]
    prefer: Prefer,

    /// Nodata value for rasters that do not declare one
    #[arg(long, default_value_t = DEFAULT_NODATA, allow_negative_numbers = true)]
    nodata: f64,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Do not draw a progress bar
    #[arg(long)]
    no_progress: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Prefer {
    Ohm,
    Slope,
}

impl From<Prefer> for RasterPrecedence {
    fn from(prefer: Prefer) -> Self {
        match prefer {
            Prefer::Ohm => RasterPrecedence::LayerA,
            Prefer::Slope => RasterPrecedence::LayerB,
        }
    }
}

impl Cli {
    fn config(&self) -> BatchConfig {
        let coverage = if self.all_touched {
            CoverageRule::AllTouched
        } else {
            CoverageRule::CenterPoint
        };

        let mut config = BatchConfig::new(
            &self.ohm_raster,
            &self.slope_raster,
            &self.input_folder,
            &self.output_folder,
        )
        .with_epsg(self.epsg)
        .with_coverage(coverage)
        .with_precedence(self.prefer.into())
        .with_nodata_fallback(Some(self.nodata));
        config.verbose = self.verbose;
        config
    }

    fn log_config(&self) -> LogConfig {
        let sink = match &self.log_file {
            Some(path) => LogSink::File(path.clone()),
            None => LogSink::Stderr,
        };
        LogConfig::from_verbosity(self.verbose, sink)
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn progress_bar() -> Result<ProgressBar> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("Invalid progress template")?
            .progress_chars("=> "),
    );
    Ok(pb)
}

fn report(summary: &RunSummary, output_folder: &std::path::Path) {
    println!(
        "Processed {} files: {} succeeded, {} failed, {} skipped ({:.1}% success)",
        summary.total_files(),
        summary.successful_files(),
        summary.failed_files(),
        summary.skipped_files(),
        summary.success_rate()
    );
    for record in summary.failures() {
        println!("  failed: {}", record.input.display());
    }
    println!("Results saved to: {}", output_folder.display());
}

/// 0 when no file failed, 1 otherwise
fn exit_status(outcome: RunOutcome) -> u8 {
    match outcome {
        RunOutcome::Success => 0,
        RunOutcome::PartialFailure | RunOutcome::Failure => 1,
    }
}

// ─── Main ───────────────────────────────────────────────────────────────

fn execute(cli: &Cli, dispatch: Dispatch) -> Result<ExitCode> {
    let config = cli.config();
    let output_folder = config.output_folder.clone();

    let orchestrator = BatchOrchestrator::new(config)
        .context("Failed to start batch run")?
        .with_dispatch(dispatch);

    let pb = if cli.no_progress {
        None
    } else {
        Some(progress_bar()?)
    };

    let start = Instant::now();
    let summary = match &pb {
        Some(pb) => {
            let mut sink = |event: ProgressEvent| match event {
                ProgressEvent::Discovered { total } => pb.set_length(total as u64),
                ProgressEvent::FileStarted { path, .. } => {
                    let name = path.file_name().unwrap_or(path.as_os_str());
                    pb.set_message(name.to_string_lossy().into_owned());
                }
                ProgressEvent::FileFinished { .. } => pb.inc(1),
                ProgressEvent::Finished { .. } => pb.finish_and_clear(),
            };
            orchestrator.run(&mut sink)
        }
        None => orchestrator.run(&mut zonestat_batch::NoProgress),
    }
    .context("Batch run failed")?;

    report(&summary, &output_folder);
    info!("Processing time: {:.2?}", start.elapsed());
    Ok(ExitCode::from(exit_status(summary.outcome())))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let dispatch = match cli.log_config().dispatch() {
        Ok(dispatch) => dispatch,
        Err(e) => {
            eprintln!("Error: failed to set up logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    tracing::dispatcher::with_default(&dispatch, || match execute(&cli, dispatch.clone()) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    })
}
