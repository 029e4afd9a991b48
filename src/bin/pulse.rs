//! Pulse CLI - Command-line interface for Aadhaar Pulse
//!
//! Commands:
//! - run: Aggregate the datasets, compute every indicator and export JSON artifacts
//! - doctor: Diagnose the data directory layout and contents

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use aadhaar_pulse::encoder::SummaryStats;
use aadhaar_pulse::{
    aggregate_datasets, ComputeError, DatasetKind, DatasetLoader, Granularity, MetricsReport,
    PipelineConfig, PulseProcessor, ReportEncoder, PRODUCER_NAME, PULSE_VERSION,
};

/// Pulse - Regional enrolment and update indicators
#[derive(Parser)]
#[command(name = "pulse")]
#[command(version = PULSE_VERSION)]
#[command(about = "Compute regional stress, demand and backlog indicators", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute all indicators and write the JSON artifacts
    Run {
        /// Directory holding the api_data_aadhar_* dataset directories
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,

        /// Directory receiving metrics.json, summary.json, states.json and run.json
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Period bucket size
        #[arg(long, default_value = "monthly")]
        granularity: GranularityArg,

        /// Insights kept per state and period
        #[arg(long, default_value = "10")]
        top_n: usize,

        /// MBU baseline window in periods (default: every period seen)
        #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
        baseline_window: Option<usize>,

        /// Continue from a previously saved run state
        #[arg(long)]
        load_state: Option<PathBuf>,

        /// Save run state after processing
        #[arg(long)]
        save_state: Option<PathBuf>,
    },

    /// Diagnose the data directory
    Doctor {
        /// Directory holding the api_data_aadhar_* dataset directories
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum GranularityArg {
    /// Calendar months (YYYY-MM)
    Monthly,
    /// Calendar quarters (YYYY-Qn)
    Quarterly,
}

impl From<GranularityArg> for Granularity {
    fn from(arg: GranularityArg) -> Self {
        match arg {
            GranularityArg::Monthly => Granularity::Monthly,
            GranularityArg::Quarterly => Granularity::Quarterly,
        }
    }
}

fn main() -> ExitCode {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), PulseCliError> {
    match cli.command {
        Commands::Run {
            data_dir,
            output,
            granularity,
            top_n,
            baseline_window,
            load_state,
            save_state,
        } => {
            let config = PipelineConfig {
                granularity: granularity.into(),
                insights_top_n: top_n,
                baseline_window,
            };
            cmd_run(
                &data_dir,
                &output,
                config,
                load_state.as_deref(),
                save_state.as_deref(),
            )
        }
        Commands::Doctor { data_dir, json } => cmd_doctor(&data_dir, json),
    }
}

fn cmd_run(
    data_dir: &Path,
    output: &Path,
    config: PipelineConfig,
    load_state: Option<&Path>,
    save_state: Option<&Path>,
) -> Result<(), PulseCliError> {
    config.validate()?;
    let granularity = config.granularity;
    let mut processor = PulseProcessor::new(config);

    // Load existing state if provided
    if let Some(state_path) = load_state {
        let state_json = fs::read_to_string(state_path)?;
        processor.load_state(&state_json)?;
        log::info!("Loaded run state from {}", state_path.display());
    }

    let loader = DatasetLoader::new(data_dir);
    log::info!(
        "Aggregating {} into {} periods",
        loader.base_dir().display(),
        granularity.as_str()
    );
    let datasets = aggregate_datasets(&loader, granularity)?;

    log::info!("Computing indicators...");
    let new_periods = processor.process(&datasets)?;
    if new_periods.is_empty() {
        return Err(PulseCliError::NoPeriods);
    }

    // A resumed run only computes new periods; keep the exported earlier ones
    let report = match load_state {
        Some(_) => match MetricsReport::read_from_dir(output)? {
            Some(mut existing) => {
                log::info!(
                    "Appending {} periods to the existing report",
                    new_periods.periods().len()
                );
                existing.merge(new_periods);
                existing
            }
            None => new_periods,
        },
        None => new_periods,
    };

    // Serialize state before any artifact lands on disk
    let state_json = match save_state {
        Some(_) => Some(processor.save_state()?),
        None => None,
    };

    let encoder = ReportEncoder::new();
    let written = encoder.write_to_dir(&report, granularity, output)?;

    if let (Some(state_path), Some(state_json)) = (save_state, state_json) {
        fs::write(state_path, state_json)?;
        log::info!("Saved run state to {}", state_path.display());
    }

    let summary = SummaryStats::from_report(&report);
    println!("Pulse Run Complete");
    println!("==================");
    println!("Periods:        {}", report.periods().len());
    println!("Latest period:  {}", summary.latest_period);
    println!("Regions:        {}", summary.total_regions);
    println!("  Critical:     {}", summary.critical_regions);
    println!("  Watch:        {}", summary.watch_regions);
    println!("  Stable:       {}", summary.stable_regions);
    println!("High MBU load:  {}", summary.high_mbu_regions);
    println!("\nArtifacts:");
    for path in &written {
        println!("  {}", path.display());
    }

    Ok(())
}

fn cmd_doctor(data_dir: &Path, json: bool) -> Result<(), PulseCliError> {
    let loader = DatasetLoader::new(data_dir);

    let mut checks = vec![DoctorCheck {
        name: "data_dir".to_string(),
        status: if data_dir.is_dir() {
            CheckStatus::Ok
        } else {
            CheckStatus::Error
        },
        message: format!("Data directory {}", data_dir.display()),
        files: None,
        rows: None,
        date_range: None,
    }];

    for kind in DatasetKind::ALL {
        checks.push(check_dataset(&loader, kind));
    }

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: PULSE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Pulse Doctor Report");
        println!("===================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");
        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(PulseCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn check_dataset(loader: &DatasetLoader, kind: DatasetKind) -> DoctorCheck {
    let mut check = DoctorCheck {
        name: kind.to_string(),
        status: CheckStatus::Ok,
        message: String::new(),
        files: None,
        rows: None,
        date_range: None,
    };

    let files = match loader.discover_files(kind) {
        Ok(files) => files,
        Err(e) => {
            check.status = CheckStatus::Error;
            check.message = e.to_string();
            return check;
        }
    };
    check.files = Some(files.len());

    if files.is_empty() {
        check.status = CheckStatus::Warning;
        check.message = "No CSV files found".to_string();
        return check;
    }

    let rows = match loader.load_dataset(kind) {
        Ok(rows) => rows,
        Err(e) => {
            check.status = CheckStatus::Error;
            check.message = format!("Cannot read dataset: {}", e);
            return check;
        }
    };
    check.rows = Some(rows.len());

    let dates = rows.iter().filter_map(|r| r.date);
    let range = dates.clone().min().zip(dates.max());

    match range {
        Some((first, last)) => {
            check.message = format!(
                "{} files, {} rows, {} to {}",
                files.len(),
                rows.len(),
                first,
                last
            );
            check.date_range = Some([first.to_string(), last.to_string()]);
        }
        None => {
            check.status = CheckStatus::Warning;
            check.message = format!("{} files, {} rows, no parsable dates", files.len(), rows.len());
        }
    }

    check
}

// Error handling

#[derive(Debug)]
enum PulseCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    NoPeriods,
    DoctorFailed,
}

impl From<io::Error> for PulseCliError {
    fn from(e: io::Error) -> Self {
        PulseCliError::Io(e)
    }
}

impl From<ComputeError> for PulseCliError {
    fn from(e: ComputeError) -> Self {
        PulseCliError::Compute(e)
    }
}

impl From<serde_json::Error> for PulseCliError {
    fn from(e: serde_json::Error) -> Self {
        PulseCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PulseCliError> for CliError {
    fn from(e: PulseCliError) -> Self {
        match e {
            PulseCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PulseCliError::Compute(e) => compute_error(e),
            PulseCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check the run state file".to_string()),
            },
            PulseCliError::NoPeriods => CliError {
                code: "NO_PERIODS".to_string(),
                message: "No new periods to process".to_string(),
                hint: Some(
                    "Check that rows carry parsable dates, or drop --load-state".to_string(),
                ),
            },
            PulseCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

fn compute_error(e: ComputeError) -> CliError {
    let (code, hint) = match &e {
        ComputeError::DatasetNotFound(_) => (
            "DATASET_NOT_FOUND",
            "Place the api_data_aadhar_* directories under --data-dir",
        ),
        ComputeError::UnknownDataset(_) => (
            "UNKNOWN_DATASET",
            "Use enrolment, demographic or biometric",
        ),
        ComputeError::OutOfOrderPeriod { .. } => (
            "OUT_OF_ORDER_PERIOD",
            "Periods must be processed in chronological order",
        ),
        ComputeError::InvalidConfig(_) => ("INVALID_CONFIG", "Check the command-line flags"),
        ComputeError::InvalidPeriod(_) | ComputeError::InvalidRegionKey(_) => {
            ("STATE_ERROR", "Check the run state file")
        }
        ComputeError::Csv(_) => ("CSV_ERROR", "Check the dataset files for malformed rows"),
        ComputeError::Io(_) => ("IO_ERROR", "Check file paths and permissions"),
        ComputeError::JsonError(_) => ("JSON_ERROR", "Check the run state file"),
    };

    CliError {
        code: code.to_string(),
        message: e.to_string(),
        hint: Some(hint.to_string()),
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    files: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_range: Option<[String; 2]>,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
