//! Hobart CLI binary.
//!
//! Runs factor attribution over a CSV panel with the built-in signal-tilt
//! optimizer and writes the per-period report.

mod integration;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use hobart::attribution::{AttributionEngine, Execution, RebalanceCalendar, StrategyKind};
use hobart::data::{AttributionPanel, schema};
use hobart::output::{ExportFormat, Exporter, ReportSummary};
use indicatif::{ProgressBar, ProgressStyle};
use integration::config::RunConfig;
use integration::tilt::TiltOptimizer;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hobart")]
#[command(about = "Hobart: factor-based performance attribution", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an attribution over a panel
    Run {
        /// Input panel (CSV)
        #[arg(long)]
        data: PathBuf,

        /// Ordered factor names, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        factors: Vec<String>,

        /// Attribution strategy (loo, aoi, focus-loo, focus-aoi)
        #[arg(long)]
        strategy: Option<StrategyKind>,

        /// Rebalance on every n-th application date
        #[arg(long, conflicts_with = "rebalance_dates")]
        rebalance_every: Option<usize>,

        /// Explicit rebalance dates (YYYY-MM-DD), comma separated
        #[arg(long, value_delimiter = ',')]
        rebalance_dates: Vec<NaiveDate>,

        /// Run the per-factor optimizer calls in parallel
        #[arg(long)]
        parallel: bool,

        /// Holding below which focus strategies mask an asset
        #[arg(long)]
        focus_threshold: Option<f64>,

        /// JSON run configuration
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the report to this file instead of printing a summary
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Report format (csv, json or pretty-json)
        #[arg(long, default_value = "csv")]
        format: ExportFormat,

        /// Print the summary as Markdown
        #[arg(long)]
        markdown: bool,
    },

    /// Show the input columns required for a factor list
    Columns {
        /// Ordered factor names, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        factors: Vec<String>,
    },

    /// List the attribution strategies
    Strategies,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            data,
            factors,
            strategy,
            rebalance_every,
            rebalance_dates,
            parallel,
            focus_threshold,
            config,
            output,
            format,
            markdown,
        } => {
            let mut config = match config {
                Some(path) => RunConfig::load(&path)?,
                None => RunConfig::default(),
            };
            if let Some(kind) = strategy {
                config.strategy.kind = kind;
            }
            if parallel {
                config.strategy.execution = Execution::Parallel;
            }
            if let Some(threshold) = focus_threshold {
                config.strategy.focus_threshold = threshold;
            }

            let panel = AttributionPanel::read_csv(&data, &factors)?;
            let calendar = if rebalance_dates.is_empty() {
                RebalanceCalendar::every_nth(
                    panel.iter().map(|p| p.period().apply_date),
                    rebalance_every.unwrap_or(1),
                )
            } else {
                RebalanceCalendar::dates(rebalance_dates)
            };

            run_attribution(&panel, config, calendar, output, format, markdown)?;
        }
        Commands::Columns { factors } => {
            for column in schema::required_columns(&factors) {
                println!("{column}");
            }
            println!("{} (rebalance dates only)", schema::EVOLVED_PRE_HOLDING);
        }
        Commands::Strategies => {
            for kind in StrategyKind::ALL {
                println!("{kind}");
            }
        }
    }

    Ok(())
}

fn run_attribution(
    panel: &AttributionPanel,
    config: RunConfig,
    calendar: RebalanceCalendar,
    output: Option<PathBuf>,
    format: ExportFormat,
    markdown: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let strategy = config.strategy.build();
    let optimizer = TiltOptimizer::new(panel.factor_names().to_vec(), calendar, config.tilt);

    let pb = ProgressBar::new(panel.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("█▓░"),
    );
    let tick = pb.clone();
    let mut engine = AttributionEngine::new().with_progress(move |period, status| {
        tick.set_message(format!("{} {:?}", period.apply_date, status));
        tick.inc(1);
    });

    let report = match engine.run(strategy.as_ref(), &optimizer, panel) {
        Ok(report) => {
            pb.finish_with_message(format!("Attributed {} periods", report.len()));
            report
        }
        Err(e) => {
            pb.abandon_with_message("Failed!");
            return Err(e.into());
        }
    };

    match output {
        Some(path) => {
            report.export_to_file(&path, format)?;
            tracing::info!(path = %path.display(), rows = report.len(), "report written");
        }
        None => {
            let summary = ReportSummary::from_report(strategy.name(), &report);
            if markdown {
                println!("{}", summary.to_markdown());
            } else {
                println!("{}", summary.to_ascii_table());
            }
        }
    }

    Ok(())
}
