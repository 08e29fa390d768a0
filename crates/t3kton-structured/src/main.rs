//! structured daemon entry point.
//!
//! Loads configuration, connects to Contractor and keeps one Structure
//! reconciled until interrupted.

use anyhow::Context;
use clap::Parser;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use t3kton_contractor::{CinpTransport, Contractor, HttpTransport, MemoryTransport};
use t3kton_structured::admission::{apply_defaults, validate_create, validate_update};
use t3kton_structured::{
    daemon, FileStructureStore, LogEventSink, ReconcileSettings, Reconciler, StructureStore,
    StructuredConfig, DEFAULT_CONFIG_PATH,
};
use t3kton_types::Structure;

#[derive(Parser, Debug)]
#[command(name = "structured")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Name of the Structure to reconcile
    #[arg(short = 's', long)]
    structure: String,

    /// Log level used when RUST_LOG is not set
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Run a single pass, print the directive and exit
    #[arg(long)]
    once: bool,

    /// Talk to an in-memory Contractor seeded from this JSON file
    /// (locator URI -> object) instead of the configured host
    #[arg(long, value_name = "SEED")]
    dry_run: Option<PathBuf>,

    /// Default, validate and store this manifest, then exit
    #[arg(long, value_name = "MANIFEST")]
    apply: Option<PathBuf>,
}

/// Initialize tracing/logging.
fn init_logging(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn build_transport(args: &Args, config: &StructuredConfig) -> anyhow::Result<Arc<dyn CinpTransport>> {
    let Some(seed) = &args.dry_run else {
        info!(host = %config.contractor.host, "Using Contractor over HTTP");
        return Ok(Arc::new(HttpTransport::new(config.http_config())?));
    };

    let content = std::fs::read_to_string(seed)
        .with_context(|| format!("reading dry-run seed {}", seed.display()))?;
    let objects: BTreeMap<String, serde_json::Value> = serde_json::from_str(&content)
        .with_context(|| format!("parsing dry-run seed {}", seed.display()))?;

    warn!(seed = %seed.display(), objects = objects.len(), "Dry run: using in-memory Contractor");
    let transport = MemoryTransport::new();
    for (uri, object) in objects {
        transport.insert(uri, object);
    }
    Ok(Arc::new(transport))
}

/// Admits a manifest the way the external actor would write it.
async fn apply_manifest(
    path: &Path,
    name: &str,
    store: &dyn StructureStore,
    contractor: &Contractor,
) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading manifest {}", path.display()))?;
    let mut manifest: Structure = serde_yaml::from_str(&content)
        .with_context(|| format!("parsing manifest {}", path.display()))?;
    if manifest.metadata.name.is_empty() {
        manifest.metadata.name = name.to_string();
    }

    contractor.refresh_session().await?;
    apply_defaults(&mut manifest.spec, contractor).await?;

    match store.get(manifest.name()).await? {
        Some(existing) => {
            let mut updated = existing.clone();
            updated.spec = manifest.spec.clone();
            validate_update(&updated, &existing, contractor).await?;
        }
        None => validate_create(&manifest, contractor).await?,
    }

    let stored = store.put(manifest).await?;
    info!(
        structure = %stored.name(),
        version = stored.metadata.resource_version,
        "Structure stored"
    );
    Ok(())
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = StructuredConfig::load_or_default(&args.config)?;
    config.validate()?;

    let contractor = Contractor::new(build_transport(&args, &config)?);
    let store = Arc::new(FileStructureStore::new(&config.store.directory));

    if let Some(manifest) = &args.apply {
        let result = apply_manifest(manifest, &args.structure, store.as_ref(), &contractor).await;
        if let Err(e) = contractor.close().await {
            warn!(error = %e, "Failed to log out of Contractor");
        }
        return result;
    }

    let reconciler = Reconciler::new(
        contractor.clone(),
        store,
        Arc::new(LogEventSink),
        ReconcileSettings {
            job_poll_interval: config.job_poll_interval(),
        },
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, shutting down");
                cancel.cancel();
            }
        });
    }

    let result = if args.once {
        match reconciler.reconcile(&args.structure, &cancel).await {
            Ok(directive) => {
                println!("{directive}");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    } else {
        daemon::run(&reconciler, &args.structure, &config, &cancel).await;
        Ok(())
    };

    if let Err(e) = contractor.close().await {
        warn!(error = %e, "Failed to log out of Contractor");
    }
    result
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(&args.log_level) {
        eprintln!("structured: failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    info!("--- Starting structured ---");

    if args.structure.is_empty() {
        error!("--structure must not be empty");
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(()) => {
            info!("--- structured stopped ---");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("structured failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}
