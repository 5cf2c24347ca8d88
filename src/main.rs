//! Supervised Lag CLI
//!
//! Turn longitudinal compositional data into lag-1 supervised pairs.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use supervised_lag::{
    config::Config, BuildReport, DatasetExporter, ElapsedUnit, ExportFormat, FeatureLayout,
    LagPairBuilder, MissingPolicy, SupervisedData, TimestampKind, VERSION,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "supervised-lag")]
#[command(version = VERSION)]
#[command(about = "Turn longitudinal compositional data into lag-1 supervised pairs", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build X and Y from a CSV file and export them
    Build {
        #[command(flatten)]
        pairing: PairingArgs,

        /// Output file (json/jsonl) or directory (csv)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Export format (json, jsonl or csv)
        #[arg(long)]
        format: Option<ExportFormat>,

        /// Also write the build report to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Print the build report without exporting
    Inspect {
        #[command(flatten)]
        pairing: PairingArgs,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show configuration
    Config,

    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Options shared by commands that read and pair a table.
#[derive(Args)]
struct PairingArgs {
    /// Input CSV file
    #[arg(long, short)]
    input: PathBuf,

    /// Subject identifier column
    #[arg(long)]
    subject_column: Option<String>,

    /// Timestamp column
    #[arg(long)]
    timestamp_column: Option<String>,

    /// Timestamp encoding (datetime or numeric)
    #[arg(long)]
    timestamp_kind: Option<TimestampKind>,

    /// Comma-separated feature columns (default: all remaining columns)
    #[arg(long, value_delimiter = ',')]
    features: Option<Vec<String>>,

    /// Layout of X (elapsed_previous, lagged_current or previous_only)
    #[arg(long)]
    layout: Option<FeatureLayout>,

    /// Unit for elapsed time between datetimes (seconds, minutes, hours, days)
    #[arg(long)]
    elapsed_unit: Option<ElapsedUnit>,

    /// Drop pairs touching rows with missing values instead of failing
    #[arg(long)]
    drop_missing: bool,

    /// Fail when no subject has two or more observations
    #[arg(long)]
    strict: bool,
}

impl PairingArgs {
    /// Apply command-line overrides on top of the loaded configuration.
    fn apply(&self, config: &mut Config) {
        let pairing = &mut config.pairing;
        if let Some(ref name) = self.subject_column {
            pairing.subject_column = name.clone();
        }
        if let Some(ref name) = self.timestamp_column {
            pairing.timestamp_column = name.clone();
        }
        if let Some(ref features) = self.features {
            pairing.feature_columns = Some(features.clone());
        }
        if let Some(layout) = self.layout {
            pairing.layout = layout;
        }
        if let Some(unit) = self.elapsed_unit {
            pairing.elapsed_unit = unit;
        }
        if self.drop_missing {
            pairing.missing_values = MissingPolicy::DropPair;
        }
        if self.strict {
            pairing.allow_empty = false;
        }
        if let Some(kind) = self.timestamp_kind {
            config.input.timestamp_kind = kind;
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Build {
            pairing,
            output,
            format,
            report,
        } => cmd_build(cli.config.as_deref(), &pairing, output, format, report),
        Commands::Inspect { pairing, json } => cmd_inspect(cli.config.as_deref(), &pairing, json),
        Commands::Config => cmd_config(cli.config.as_deref()),
        Commands::InitConfig { force } => cmd_init_config(cli.config.as_deref(), force),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(Config::config_path);
    Config::load_from(&path).with_context(|| format!("Failed to load config from {path:?}"))
}

/// Load the input table and pair it.
fn build(config_path: Option<&Path>, args: &PairingArgs) -> Result<(Config, SupervisedData)> {
    let mut config = load_config(config_path)?;
    args.apply(&mut config);

    let loader = config.csv_loader().context("Invalid input configuration")?;
    let table = loader
        .load(&args.input)
        .with_context(|| format!("Failed to read {:?}", args.input))?;

    let data = LagPairBuilder::new(config.pairing.clone())
        .build(&table)
        .with_context(|| format!("Failed to build pairs from {:?}", args.input))?;

    Ok((config, data))
}

fn cmd_build(
    config_path: Option<&Path>,
    args: &PairingArgs,
    output: Option<PathBuf>,
    format: Option<ExportFormat>,
    report_path: Option<PathBuf>,
) -> Result<()> {
    let (config, data) = build(config_path, args)?;

    let format = format.unwrap_or(config.export.format);
    let output = output.unwrap_or_else(|| config.export.output_path.clone());

    let exporter = DatasetExporter::new().with_source(args.input.display().to_string());
    let written = exporter
        .write(&data, format, &output)
        .with_context(|| format!("Failed to export to {output:?}"))?;

    let report = BuildReport::from_data(&data);
    println!("Supervised Lag v{VERSION}");
    println!();
    println!("{}", report.summary());
    println!();
    println!("Wrote:");
    for path in &written {
        println!("  {}", path.display());
    }

    if let Some(path) = report_path {
        report
            .save(&path)
            .with_context(|| format!("Failed to write report to {path:?}"))?;
        println!("  {}", path.display());
    }

    Ok(())
}

fn cmd_inspect(config_path: Option<&Path>, args: &PairingArgs, json: bool) -> Result<()> {
    let (_, data) = build(config_path, args)?;
    let report = BuildReport::from_data(&data);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.summary());
        if !report.has_pairs() {
            println!();
            println!("No subject has two or more observations; X and Y are empty.");
        }
    }

    Ok(())
}

fn cmd_config(config_path: Option<&Path>) -> Result<()> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::config_path);
    let config = load_config(Some(&path))?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {path:?}");
    if !path.exists() {
        println!("  (not found, using defaults)");
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);

    Ok(())
}

fn cmd_init_config(config_path: Option<&Path>, force: bool) -> Result<()> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::config_path);

    if path.exists() && !force {
        anyhow::bail!("{path:?} already exists (use --force to overwrite)");
    }

    Config::default()
        .save_to(&path)
        .with_context(|| format!("Failed to write {path:?}"))?;
    println!("Wrote default configuration to {path:?}");

    Ok(())
}
