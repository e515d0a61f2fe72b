//! kernhash binary: build the fingerprint index from the corpus, then serve
//! melodic queries over HTTP.

use std::sync::Arc;

use kernhash::{ingest_corpus, FingerprintIndex, IngestSettings, RedbBackend, SearchEngine};
use server::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let server_config = ServerConfig::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(server_config.log_level.as_str())
        .with_target(false)
        .json()
        .init();

    // Configuration problems are fatal here, before any request is accepted.
    let settings = IngestSettings::load()?;

    let backend = RedbBackend::open(&settings.db_path)?;
    let index = Arc::new(FingerprintIndex::new(Box::new(backend)));

    let stats = ingest_corpus(&settings, &index)?;
    tracing::info!(
        documents = stats.documents,
        records = stats.records,
        skipped = stats.skipped,
        "index ready"
    );

    let engine = Arc::new(SearchEngine::new(
        index,
        settings.token_filter()?,
        settings.search_config(),
    )?);

    server::start_server(server_config, engine).await
}
