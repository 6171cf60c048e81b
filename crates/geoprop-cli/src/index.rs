//! Search index maintenance commands.

use std::path::Path;

use anyhow::Context;
use geoprop_core::{AppConfig, PropertyDocument};
use geoprop_search::SearchService;

pub(crate) async fn run_init_index(config: &AppConfig) -> anyhow::Result<()> {
    let service = SearchService::from_config(config)?;
    service
        .index()
        .initialize()
        .await
        .with_context(|| format!("initializing index {:?}", config.search_index_name))?;
    println!("index {:?} ready", config.search_index_name);
    Ok(())
}

/// Parses a JSON array of property documents, rejecting blank ids up front.
pub(crate) fn parse_documents(raw: &str) -> anyhow::Result<Vec<PropertyDocument>> {
    let documents: Vec<PropertyDocument> =
        serde_json::from_str(raw).context("expected a JSON array of property documents")?;
    if let Some(position) = documents.iter().position(|d| d.id.trim().is_empty()) {
        anyhow::bail!("document at position {position} has an empty id");
    }
    Ok(documents)
}

pub(crate) async fn run_reindex(
    config: &AppConfig,
    file: &Path,
    batch_size: usize,
    dry_run: bool,
) -> anyhow::Result<()> {
    if batch_size == 0 {
        anyhow::bail!("--batch-size must be at least 1");
    }
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let documents = parse_documents(&raw)?;

    if dry_run {
        println!(
            "[dry-run] {} documents in {} would be indexed in {} batches",
            documents.len(),
            file.display(),
            documents.len().div_ceil(batch_size)
        );
        return Ok(());
    }

    let service = SearchService::from_config(config)?;
    let index = service.index();
    index.initialize().await?;

    let mut indexed = 0usize;
    for (batch, chunk) in documents.chunks(batch_size).enumerate() {
        index
            .index_properties(chunk)
            .await
            .with_context(|| format!("indexing batch {batch}"))?;
        indexed += chunk.len();
        tracing::info!(batch, indexed, total = documents.len(), "batch indexed");
    }

    println!("indexed {indexed} documents into {:?}", config.search_index_name);
    Ok(())
}
