use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use hfdownload::app::{App, ProgressSink, RunResult};
use hfdownload::config::{ConfigLoader, Settings};
use hfdownload::domain::{DEFAULT_CONFIG, DEFAULT_SPLIT, DownloadRequest};
use hfdownload::error::HfdlError;
use hfdownload::hub::HubHttpClient;
use hfdownload::output::{JsonOutput, OutputMode, StatusLines};
use hfdownload::query::{QueryEngine, TableSummary};
use hfdownload::store::Store;

#[derive(Parser)]
#[command(name = "hfdownload")]
#[command(about = "Download datasets from Hugging Face. Saved to datasets/.")]
#[command(version)]
struct Cli {
    #[arg(help = "Dataset name (e.g., MathArena/aime_2025)")]
    dataset: String,

    #[arg(default_value = DEFAULT_SPLIT, help = "Dataset split")]
    split: String,

    #[arg(default_value = DEFAULT_CONFIG, help = "Dataset configuration")]
    config: String,

    #[arg(long, help = "Load the downloaded split into DuckDB and print a summary")]
    load: bool,

    #[arg(long, alias = "non-interactive", help = "Print the result as JSON")]
    json: bool,

    #[arg(long, help = "Directory that holds datasets/ (defaults to the current directory)")]
    root: Option<PathBuf>,

    #[arg(long, help = "Catalog base URL (defaults to https://huggingface.co)")]
    endpoint: Option<String>,

    #[arg(long, help = "Settings file (defaults to ./hfdownload.json when present)")]
    config_file: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        StatusLines::failure();
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<HfdlError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &HfdlError) -> u8 {
    match error {
        HfdlError::InvalidInput(_) => 2,
        HfdlError::MetadataFetch { .. }
        | HfdlError::MetadataHttp(_)
        | HfdlError::MetadataDecode(_)
        | HfdlError::EmptyResult { .. }
        | HfdlError::MalformedEntry { .. }
        | HfdlError::Download { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let settings = resolve_settings(&cli)?;
    let store = match &cli.root {
        Some(root) => Store::in_dir(root.clone(), &settings.datasets_dir),
        None => Store::new(&settings.datasets_dir),
    }?;
    let catalog = HubHttpClient::new(&settings)?;

    let request = build_request(&cli);

    if matches!(output_mode, OutputMode::Interactive) {
        StatusLines::header(&request.dataset, &request.split, &request.config);
    }

    run_with_engine(App::new(store, catalog, engine()), &request, output_mode)
}

fn build_request(cli: &Cli) -> DownloadRequest {
    DownloadRequest::new(cli.dataset.clone())
        .with_split(cli.split.clone())
        .with_config(cli.config.clone())
        .download_only(!cli.load)
}

fn resolve_settings(cli: &Cli) -> miette::Result<Settings> {
    let settings = ConfigLoader::resolve(cli.config_file.as_deref())?
        .apply_env(|key| std::env::var(key).ok())?;
    Ok(match &cli.endpoint {
        Some(endpoint) => settings.with_endpoint(endpoint),
        None => settings,
    })
}

#[cfg(feature = "duckdb-backend")]
fn engine() -> hfdownload::query::DuckDbEngine {
    hfdownload::query::DuckDbEngine
}

#[cfg(not(feature = "duckdb-backend"))]
fn engine() -> hfdownload::query::NoQueryEngine {
    hfdownload::query::NoQueryEngine
}

fn run_with_engine<Q>(
    app: App<HubHttpClient, Q>,
    request: &DownloadRequest,
    output_mode: OutputMode,
) -> miette::Result<()>
where
    Q: QueryEngine,
    Q::Table: Summarize,
{
    let sink: &dyn ProgressSink = match output_mode {
        OutputMode::Interactive => &StatusLines,
        OutputMode::NonInteractive => &JsonOutput,
    };
    let RunResult { fetch, table } = app.run(request, sink)?;
    let summary = table.as_ref().map(Summarize::summarize).transpose()?;

    match output_mode {
        OutputMode::NonInteractive => {
            JsonOutput::print_run(&fetch, summary.as_ref()).into_diagnostic()?;
        }
        OutputMode::Interactive => {
            StatusLines::summary(&fetch);
            if let Some(summary) = &summary {
                StatusLines::table(summary);
            }
            println!();
        }
    }
    Ok(())
}

trait Summarize {
    fn summarize(&self) -> Result<TableSummary, HfdlError>;
}

#[cfg(feature = "duckdb-backend")]
impl Summarize for hfdownload::query::ParquetTable {
    fn summarize(&self) -> Result<TableSummary, HfdlError> {
        self.summary()
    }
}

impl Summarize for () {
    fn summarize(&self) -> Result<TableSummary, HfdlError> {
        Err(HfdlError::QueryEngine(
            "built without the duckdb-backend feature".to_string(),
        ))
    }
}
