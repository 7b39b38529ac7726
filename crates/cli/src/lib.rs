use anyhow::{Context, Result};
use auditmap_protocol::MappingRow;
use clap::{Args, Parser, Subcommand};
use config::FileConfig;
use pipeline::MapRequest;
use serde::Serialize;
use std::io;
use std::path::PathBuf;

mod config;
mod fetch;
mod pipeline;
mod report;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    print_stdout(&serde_json::to_string_pretty(value)?)
}

#[derive(Parser)]
#[command(name = "auditmap")]
#[command(about = "Map audit evidence files to controls and tests", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,

    /// TOML file with [matching], [sheets] and [source] sections
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile an evidence archive against the taxonomy and update the workbook
    Map(MapArgs),

    /// List the files of an extracted evidence directory
    Index(IndexArgs),

    /// Download evidence records of one audit from the auditor API
    #[command(name = "fetch-evidence")]
    FetchEvidence(FetchArgs),

    /// List audits visible to the configured credentials (JSON)
    #[command(name = "list-audits")]
    ListAudits,
}

#[derive(Args)]
struct MapArgs {
    /// Evidence archive (.zip) or extracted directory
    #[arg(long)]
    archive: PathBuf,

    /// Audit workbook to update
    #[arg(long)]
    workbook: PathBuf,

    /// Where to write the updated workbook
    #[arg(long)]
    out: PathBuf,

    /// Control taxonomy CSV (ID, Test name, ...)
    #[arg(long)]
    controls: Option<PathBuf>,

    /// Test taxonomy CSV; defaults to the workbook's tests sheet
    #[arg(long)]
    tests: Option<PathBuf>,

    /// Name of the workbook sheet holding the test taxonomy
    #[arg(long)]
    tests_sheet: Option<String>,

    /// Evidence export (.csv, or .json as written by fetch-evidence)
    #[arg(long)]
    evidence: Option<PathBuf>,

    /// Skip the control-ID join and match folders against tests only
    #[arg(long)]
    no_control_taxonomy: bool,

    /// Minimum similarity for fuzzy matches (0..=1)
    #[arg(long)]
    threshold: Option<f64>,

    /// Print the first N mapping rows
    #[arg(long, default_value_t = 0)]
    preview: usize,

    /// Output summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct IndexArgs {
    /// Extracted evidence directory
    path: PathBuf,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct FetchArgs {
    #[arg(long)]
    audit_id: String,

    /// JSON file receiving the raw evidence records
    #[arg(long)]
    out: PathBuf,

    /// Also download linked evidence files into this directory
    #[arg(long)]
    download_dir: Option<PathBuf>,
}

pub fn main_entry() -> Result<()> {
    let mut cli = Cli::parse();

    // Keep stdout clean for JSON consumers
    let json_output = match &cli.command {
        Commands::Map(args) => args.json,
        Commands::Index(args) => args.json,
        Commands::FetchEvidence(_) => false,
        Commands::ListAudits => true,
    };
    if json_output {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = FileConfig::load(cli.config.as_deref()).context("configuration load failed")?;

    match cli.command {
        Commands::Map(args) => run_map(args, config)?,
        Commands::Index(args) => run_index(args)?,
        Commands::FetchEvidence(args) => run_fetch(args, &config)?,
        Commands::ListAudits => print_json(&fetch::list_audits(&config.source)?)?,
    }

    Ok(())
}

fn run_map(args: MapArgs, mut config: FileConfig) -> Result<()> {
    if let Some(sheet) = args.tests_sheet {
        config.sheets.tests = sheet;
    }
    if let Some(threshold) = args.threshold {
        config.matching.threshold = threshold;
    }
    if args.no_control_taxonomy {
        config.matching.use_control_taxonomy = false;
    }

    let request = MapRequest {
        archive: args.archive,
        workbook: args.workbook,
        out: args.out,
        controls: args.controls,
        tests: args.tests,
        evidence: args.evidence,
        config,
    };
    let outcome = pipeline::run_map(&request)?;

    if args.json {
        #[derive(Serialize)]
        struct MapOutput<'a> {
            #[serde(flatten)]
            outcome: &'a pipeline::MapOutcome,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            preview: Vec<&'a MappingRow>,
        }
        print_json(&MapOutput {
            outcome: &outcome,
            preview: outcome.rows.iter().take(args.preview).collect(),
        })?;
    } else {
        print_stdout(&report::render_map_summary(&outcome))?;
        if args.preview > 0 {
            print_stdout(&report::render_preview(&outcome.rows, args.preview))?;
        }
    }
    Ok(())
}

fn run_index(args: IndexArgs) -> Result<()> {
    let index = pipeline::index_archive(&args.path).context("archive indexing failed")?;
    if args.json {
        print_json(&index)
    } else {
        print_stdout(&report::render_index(&index))
    }
}

fn run_fetch(args: FetchArgs, config: &FileConfig) -> Result<()> {
    let outcome = fetch::fetch_evidence(
        &config.source,
        &args.audit_id,
        &args.out,
        args.download_dir.as_deref(),
    )?;
    print_stdout(&format!(
        "Fetched {} evidence records for audit {} into {}{}",
        outcome.records,
        outcome.audit_id,
        outcome.out.display(),
        if outcome.downloaded.is_empty() {
            String::new()
        } else {
            format!("; downloaded {} files", outcome.downloaded.len())
        }
    ))
}
