// Division Votes - CLI
//
//   division-votes --divisions 1001,1002 [--schema legacy] [--source-dir snapshot/]
//   division-votes --from-annotations --output votesNew.json

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use division_votes::{
    gather_snapshot, write_atomic, DirectorySource, DivisionSelection, PipelineConfig,
    Snapshot, SourceSchema,
};

const FAILURE_MESSAGE: &str =
    "Something went wrong fetching the data. Make sure you have entered valid divisions ids.";

/// Reconcile Commons division votes against the member roster
#[derive(Parser, Debug)]
#[command(name = "division-votes")]
#[command(version)]
struct Args {
    /// Comma-separated division ids, e.g. "1001,1002"
    #[arg(short, long, conflicts_with = "from_annotations", required_unless_present = "from_annotations")]
    divisions: Option<String>,

    /// Take the division ids from the annotation sheet, in sheet order
    #[arg(long)]
    from_annotations: bool,

    /// Source schema: legacy or current (overrides the config file)
    #[arg(long)]
    schema: Option<SourceSchema>,

    /// JSON pipeline configuration
    #[arg(short, long, env = "DIVISION_VOTES_CONFIG")]
    config: Option<PathBuf>,

    /// Read roster.json, divisions/{id}.json and annotations from a directory instead of HTTP
    #[arg(long)]
    source_dir: Option<PathBuf>,

    /// Output document
    #[arg(short, long, default_value = "votesNew.json")]
    output: PathBuf,

    #[arg(long)]
    no_annotations: bool,

    #[arg(long)]
    no_tellers: bool,

    #[arg(long)]
    no_party_breakdown: bool,

    /// Abort when a division's abstain count comes out negative
    #[arg(long)]
    strict: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "division_votes=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("{:#}", e);
        eprintln!("{}", FAILURE_MESSAGE);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    // Validate the request before touching any source
    let selection = match &args.divisions {
        Some(raw) => DivisionSelection::explicit(raw)?,
        None => DivisionSelection::FromAnnotations,
    };

    let config = build_config(&args)?;
    info!(
        schema = config.schema_version.code(),
        annotations = config.include_annotations,
        tellers = config.include_tellers,
        "starting run"
    );

    let snapshot = match &args.source_dir {
        Some(dir) => {
            let source = DirectorySource::new(dir);
            gather_snapshot(&source, &selection, &config)
                .await
                .with_context(|| format!("Failed to read snapshot from {}", dir.display()))?
        }
        None => fetch_http(&selection, &config).await?,
    };

    let output = division_votes::run(&config, &snapshot).context("Reconciliation failed")?;
    output.quality.log();

    write_atomic(&args.output, &output.document)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    info!(
        path = %args.output.display(),
        "{}",
        output.document.summary()
    );
    Ok(())
}

/// Config file (or defaults), then CLI overrides
fn build_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(schema) = args.schema {
        config.schema_version = schema;
    }
    if args.no_annotations {
        config.include_annotations = false;
    }
    if args.no_tellers {
        config.include_tellers = false;
    }
    if args.no_party_breakdown {
        config.include_party_breakdown = false;
    }
    if args.strict {
        config.strict_integrity = true;
    }

    Ok(config)
}

#[cfg(feature = "http")]
async fn fetch_http(selection: &DivisionSelection, config: &PipelineConfig) -> Result<Snapshot> {
    let source = division_votes::HttpSource::new(config.endpoints.clone())?;
    let snapshot = gather_snapshot(&source, selection, config)
        .await
        .context("Failed to fetch division data")?;
    Ok(snapshot)
}

#[cfg(not(feature = "http"))]
async fn fetch_http(_selection: &DivisionSelection, _config: &PipelineConfig) -> Result<Snapshot> {
    anyhow::bail!("HTTP source not available: rebuild with --features http, or pass --source-dir")
}
