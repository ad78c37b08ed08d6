use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, Args, ValueEnum};
use gapscan::prelude::*;
use gapscan::export::exporter_for;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gapcli")]
#[command(about = "Registry gap analysis - reconcile refused drug registrations against the active license registry", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the sheets of a workbook
    Sheets(SheetsArgs),
    /// Reconcile refusals against the active registry
    Analyze(AnalyzeArgs),
}

#[derive(Args)]
struct SheetsArgs {
    /// Workbook or CSV file
    file: PathBuf,
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Workbook (or CSV with refusals when --active-file is given)
    file: PathBuf,
    /// Refusal sheet name (requires --active-sheet)
    #[arg(long, requires = "active_sheet")]
    refusal_sheet: Option<String>,
    /// Active registry sheet name (requires --refusal-sheet)
    #[arg(long, requires = "refusal_sheet")]
    active_sheet: Option<String>,
    /// Separate file holding the active registry
    #[arg(long, conflicts_with_all = ["refusal_sheet", "active_sheet"])]
    active_file: Option<PathBuf>,
    /// Evaluate validity dates as of this day (YYYY-MM-DD) instead of today
    #[arg(long)]
    as_of: Option<NaiveDate>,
    /// Manufacturer prefix length (10 primary workflow, 15 alternate)
    #[arg(long, env = "GAPSCAN_MANUFACTURER_PREFIX_LEN")]
    prefix_len: Option<usize>,
    /// Configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Show the full register instead of the action list
    #[arg(long)]
    all: bool,
    /// Number of manufacturers in the gap ranking
    #[arg(long)]
    top: Option<usize>,
    /// Write the gap subset to this file
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Export format
    #[arg(long, value_enum, default_value_t = ExportFormatOpt::Csv)]
    format: ExportFormatOpt,
    /// Show a progress bar while reconciling
    #[arg(long)]
    progress: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum ExportFormatOpt {
    Csv,
    Json,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let outcome = match cli.command {
        Commands::Sheets(args) => cmd_sheets(args),
        Commands::Analyze(args) => cmd_analyze(args),
    };

    if let Err(e) = outcome {
        match e.downcast_ref::<GapError>() {
            Some(gap_error) => eprintln!("Error: {}", gap_error.user_message()),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gapscan={level},gapcli={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn cmd_sheets(args: SheetsArgs) -> anyhow::Result<()> {
    let workbook = WorkbookReader::new()
        .open(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    for (idx, name) in workbook.sheet_names().iter().enumerate() {
        println!("{}: {}", idx + 1, name);
    }
    Ok(())
}

fn cmd_analyze(args: AnalyzeArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => GapConfig::layered(Some(path.as_path()))?,
        None => GapConfig::load(),
    };
    if let Some(len) = args.prefix_len {
        config.manufacturer_prefix_len = len;
    }
    if args.progress {
        config.enable_progress_bar = true;
    }
    let top = args.top.unwrap_or(config.top_manufacturers);

    let mut builder = GapAnalysisBuilder::new().config(config);
    builder = match (&args.active_file, &args.refusal_sheet, &args.active_sheet) {
        (Some(active_file), _, _) => builder.refusal_file(&args.file).active_file(active_file),
        (None, Some(refusal), Some(active)) => builder.workbook(&args.file).selection(SheetSelection::Named {
            refusal: refusal.clone(),
            active: active.clone(),
        }),
        (None, None, None) => builder.workbook(&args.file),
        _ => bail!("--refusal-sheet and --active-sheet must be given together"),
    };
    if let Some(day) = args.as_of {
        if let Some(midnight) = day.and_hms_opt(0, 0, 0) {
            builder = builder.reference_time(midnight);
        }
    }

    let report = builder.build()?.run()?;

    report.summary.print_summary();
    println!();

    if args.all {
        println!("=== Full Register ===");
        print_rows(report.results.iter());
    } else {
        println!("=== Action List ===");
        if report.summary.gaps == 0 {
            println!("No gaps: every refused drug has a valid registration.");
        } else {
            print_rows(report.gaps().into_iter());
        }
    }

    let ranking = report.top_manufacturers(top);
    if !ranking.is_empty() {
        println!();
        println!("=== Top manufacturers by open positions ===");
        let widest = ranking.iter().map(|(_, count)| *count).max().unwrap_or(1);
        for (manufacturer, count) in &ranking {
            let bar = "#".repeat((count * 40).div_ceil(widest));
            println!("{:<40} {:>4} {}", truncate(manufacturer, 40), count, bar);
        }
    }

    if let Some(output) = &args.output {
        let format = match args.format {
            ExportFormatOpt::Csv => ExportFormat::Csv,
            ExportFormatOpt::Json => ExportFormat::Json,
        };
        let payload = exporter_for(format).to_bytes(&report.gap_results())?;
        std::fs::write(output, payload)
            .with_context(|| format!("writing {}", output.display()))?;
        println!();
        println!("Exported {} gap rows to {}", report.summary.gaps, output.display());
    }

    Ok(())
}

fn print_rows<'a>(rows: impl Iterator<Item = &'a ReconciliationResult>) {
    for result in rows {
        println!(
            "{} | {} | {} | {}",
            result.manufacturer, result.refused_drug, result.classification, result.detail
        );
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}
