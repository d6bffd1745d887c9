use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing::info;
use tracing_subscriber::EnvFilter;

use datastore_lint::app::App;
use datastore_lint::config::{ConfigLoader, ResolvedConfig};
use datastore_lint::doi::DoiHttpClient;
use datastore_lint::error::DatastoreError;
use datastore_lint::normalize::{Normalizer, TaxonNaming};
use datastore_lint::output::{JsonOutput, NormalizeResult, OutputMode, TextOutput, TracingSink};
use datastore_lint::target::TargetGraph;
use datastore_lint::tools::SystemToolchain;

#[derive(Parser)]
#[command(name = "ds-lint")]
#[command(about = "Validate and normalize datastore genome and annotation files")]
#[command(version, author)]
struct Cli {
    /// Config file (default: ./ds-lint.json, then the user config directory)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Log filter, e.g. `info` or `datastore_lint=debug` (default: RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Print the report as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Check a file, an organism directory or a data directory")]
    Check(CheckArgs),
    #[command(about = "Normalize a FASTA or GFF3 file into the canonical layout")]
    Normalize(NormalizeArgs),
}

#[derive(Args)]
struct CheckArgs {
    target: Utf8PathBuf,

    /// Rewrite files that fail their checks
    #[arg(long)]
    normalize: bool,

    /// Also prefix Name= attributes when normalizing GFF3
    #[arg(long)]
    prefix_names: bool,

    #[arg(long)]
    skip_checksums: bool,

    #[arg(long)]
    skip_validator: bool,

    /// Resolve README publication/dataset DOIs
    #[arg(long)]
    check_dois: bool,

    #[arg(long)]
    output_dir: Option<PathBuf>,

    #[arg(long)]
    report_dir: Option<PathBuf>,

    /// Directory holding the `gt` binary
    #[arg(long)]
    gt_path: Option<PathBuf>,
}

#[derive(Args)]
struct NormalizeArgs {
    file: PathBuf,

    #[arg(long)]
    genus: String,

    #[arg(long)]
    species: String,

    #[arg(long)]
    infra_id: String,

    #[arg(long)]
    gnm: u32,

    /// Annotation version, required for GFF3 input
    #[arg(long)]
    ann: Option<u32>,

    /// Unique key of the collection
    #[arg(long)]
    key: String,

    #[arg(long)]
    prefix_names: bool,

    #[arg(long)]
    output_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(error) = report.downcast_ref::<DatastoreError>() {
                return ExitCode::from(map_exit_code(error));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &DatastoreError) -> u8 {
    match error.kind() {
        "naming" | "reference" | "checksum" => 2,
        "collaborator" => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<ExitCode> {
    let cli = Cli::parse();

    let filter = match &cli.log_level {
        Some(level) => EnvFilter::try_new(level).into_diagnostic()?,
        None => EnvFilter::from_default_env(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    let mut config = ConfigLoader::resolve(cli.config.as_deref())?;
    if let Some(source) = &config.source {
        info!(config = %source.display(), "using config");
    }

    match cli.command {
        Commands::Check(args) => run_check(args, &mut config, output_mode),
        Commands::Normalize(args) => run_normalize(args, &mut config, output_mode),
    }
}

fn run_check(
    args: CheckArgs,
    config: &mut ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<ExitCode> {
    config.normalize |= args.normalize;
    config.prefix_names |= args.prefix_names;
    config.check_dois |= args.check_dois;
    if args.skip_checksums {
        config.verify_checksums = false;
    }
    if args.skip_validator {
        config.gff3_validator = false;
    }
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if let Some(dir) = args.report_dir {
        config.report_dir = dir;
    }
    if let Some(dir) = args.gt_path {
        config.tools.gt = Some(dir);
    }

    let graph = TargetGraph::discover(&args.target)?;
    let tools = SystemToolchain::new(&config.tools);
    let doi = DoiHttpClient::new()?;
    let app = App::new(tools, doi, config.run_options());

    let report = match output_mode {
        OutputMode::Json => {
            let report = app.run(&graph, &JsonOutput);
            JsonOutput::print_report(&report).into_diagnostic()?;
            report
        }
        OutputMode::Text => {
            let report = app.run(&graph, &TracingSink);
            TextOutput::print_report(&report);
            report
        }
    };

    if report.success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(1))
    }
}

fn run_normalize(
    args: NormalizeArgs,
    config: &mut ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<ExitCode> {
    config.prefix_names |= args.prefix_names;
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    let naming = TaxonNaming {
        genus: args.genus,
        species: args.species,
        infra_id: args.infra_id,
        gnm: args.gnm,
        ann: args.ann,
        key: args.key,
    };

    let tools = SystemToolchain::new(&config.tools);
    let normalizer = Normalizer::new(&tools).with_prefix_names(config.prefix_names);
    let output = normalizer.normalize_taxon(&args.file, &naming, &config.output_dir)?;
    let result = NormalizeResult {
        input: args.file.display().to_string(),
        output: output.display().to_string(),
    };
    match output_mode {
        OutputMode::Json => JsonOutput::print_normalized(&result).into_diagnostic()?,
        OutputMode::Text => TextOutput::print_normalized(&result),
    }
    Ok(ExitCode::SUCCESS)
}
