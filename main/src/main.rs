use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use common::{
    storage::{kv::KeyValueStore, store::StorageManager},
    utils::config::get_config,
};
use ingestion_pipeline::{
    fetcher::{build_http_client, DatasetRowsSource},
    overrides::source_from_config,
    LoadPipeline, LoadTuning,
};
use retrieval_pipeline::KnowledgeBase;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Query the university guidance knowledge base.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Question to look up. Without one, the digest is printed.
    query: Option<String>,

    /// Number of entries to retrieve (defaults to `default_top_k`)
    #[arg(long)]
    top_k: Option<usize>,

    /// Discard the cached snapshot and load from the source again
    #[arg(long, action = clap::ArgAction::SetTrue, default_value_t = false)]
    refresh: bool,

    /// Print a topic digest of the first N entries
    #[arg(long)]
    digest: Option<usize>,
}

const DEFAULT_DIGEST_ENTRIES: usize = 100;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let config = get_config().context("loading configuration")?;

    let storage = StorageManager::new(&config)
        .await
        .context("opening knowledge base storage")?;
    info!(
        backend = ?storage.backend_kind(),
        base = ?storage.local_base_path(),
        "storage ready"
    );
    let kv: Arc<dyn KeyValueStore> = Arc::new(storage);

    let client = build_http_client(&config)?;
    let pages = Arc::new(DatasetRowsSource::from_config(&config, client.clone())?);
    let overrides = source_from_config(&config, client);
    let pipeline = LoadPipeline::new(kv, pages, overrides, LoadTuning::from_app_config(&config));
    let kb = KnowledgeBase::new(
        pipeline,
        config.default_top_k,
        config.knowledge_base_title.clone(),
    );

    let corpus = if cli.refresh {
        kb.force_refresh().await
    } else {
        kb.ensure_loaded().await
    };
    info!(
        entries = corpus.len(),
        verified = corpus.verified_count(),
        "knowledge base loaded"
    );

    let output = match (cli.query.as_deref(), cli.digest) {
        (_, Some(max_entries)) => kb.digest(max_entries).await,
        (Some(query), None) => kb.augmented_message(query, cli.top_k).await,
        (None, None) => kb.digest(DEFAULT_DIGEST_ENTRIES).await,
    };
    println!("{output}");

    Ok(())
}
