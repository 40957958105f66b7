//! Ingestion pipeline: PDF directory scan, layout parse, graph load.
//!
//! Each file is processed independently; one bad PDF never stops the run.
//! Processed files move to the loaded directory so re-running the command
//! only touches new material, and every graph write is an idempotent MERGE,
//! so a crash mid-file is repaired by simply running again.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{info, warn};

use crate::config::Config;
use crate::embed::Embedder;
use crate::error::AppError;
use crate::graph::plan::{PlanCounts, build_plan};
use crate::graph::GraphStore;
use crate::layout::LayoutClient;

#[derive(Debug, Default, Clone, Copy)]
pub struct IngestStats {
    pub loaded: usize,
    pub failed: usize,
    pub counts: PlanCounts,
}

/// Ingest every PDF in the configured input directory, then backfill
/// embeddings for whatever the load added.
pub async fn run(config: &Config, store: &mut GraphStore) -> Result<IngestStats, AppError> {
    let started = Instant::now();
    let layout = LayoutClient::new(&config.layout.api_url)?;

    let pdfs = scan_pdfs(&config.layout.input_dir)?;
    if pdfs.is_empty() {
        info!(dir = %config.layout.input_dir.display(), "no new pdf files to ingest");
        return Ok(IngestStats::default());
    }
    info!(files = pdfs.len(), "starting ingest run");

    store
        .ensure_schema(&config.embedding.index_name, config.embedding.dimension)
        .await?;

    let mut stats = IngestStats::default();
    for path in &pdfs {
        match ingest_file(&layout, store, path, &config.layout.loaded_dir).await {
            Ok(counts) => {
                stats.loaded += 1;
                stats.counts.sections += counts.sections;
                stats.counts.chunks += counts.chunks;
                stats.counts.tables += counts.tables;
                stats.counts.orphan_chunks += counts.orphan_chunks;
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "file skipped");
                stats.failed += 1;
            }
        }
    }

    let mut embedder = Embedder::new(&config.embedding)?;
    let backfill = crate::embed::backfill::run(store, &mut embedder, config.embedding.refresh_every)
        .await?;

    info!(
        loaded = stats.loaded,
        failed = stats.failed,
        embedded = backfill.embedded,
        elapsed_s = started.elapsed().as_secs(),
        "ingest run finished"
    );
    Ok(stats)
}

async fn ingest_file(
    layout: &LayoutClient,
    store: &GraphStore,
    path: &Path,
    loaded_dir: &Path,
) -> Result<PlanCounts, AppError> {
    info!(file = %path.display(), "ingesting");

    let (parsed, raw_json) = layout.parse_pdf(path).await?;

    // Sidecar with the raw layout response. It survives a crash between
    // parse and load, and is deleted once the file is fully in the graph.
    let sidecar = path.with_extension("pdf.json");
    tokio::fs::write(&sidecar, &raw_json).await?;

    let source_url = path.to_string_lossy();
    let plan = build_plan(&parsed, &source_url);
    store.load_plan(&plan).await?;

    move_to_loaded(path, loaded_dir).await?;
    tokio::fs::remove_file(&sidecar).await?;

    Ok(plan.counts)
}

fn scan_pdfs(dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    let mut pdfs = Vec::new();
    for entry in std::fs::read_dir(dir)
        .map_err(|e| AppError::Config(format!("cannot read input dir {}: {e}", dir.display())))?
    {
        let path = entry?.path();
        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if path.is_file() && is_pdf {
            pdfs.push(path);
        }
    }
    pdfs.sort();
    Ok(pdfs)
}

/// Move a processed file out of the input directory. Falls back to
/// copy-and-remove when the two directories sit on different filesystems.
async fn move_to_loaded(path: &Path, loaded_dir: &Path) -> Result<(), AppError> {
    tokio::fs::create_dir_all(loaded_dir).await?;
    let file_name = path
        .file_name()
        .ok_or_else(|| AppError::Config(format!("bad file name: {}", path.display())))?;
    let target = loaded_dir.join(file_name);

    if tokio::fs::rename(path, &target).await.is_err() {
        tokio::fs::copy(path, &target).await?;
        tokio::fs::remove_file(path).await?;
    }
    info!(to = %target.display(), "file archived");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_finds_only_pdfs_sorted() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["b.pdf", "a.PDF", "notes.txt", "c.pdf.json"] {
            std::fs::write(dir.path().join(name), b"x").expect("write");
        }
        std::fs::create_dir(dir.path().join("sub.pdf")).expect("mkdir");

        let pdfs = scan_pdfs(dir.path()).expect("scan");
        let names: Vec<_> = pdfs
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, ["a.PDF", "b.pdf"]);
    }

    #[test]
    fn scan_missing_dir_is_a_config_error() {
        let err = scan_pdfs(Path::new("/nonexistent/newdata"));
        assert!(matches!(err, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn move_to_loaded_relocates_the_file() {
        let input = tempfile::tempdir().expect("tempdir");
        let loaded = tempfile::tempdir().expect("tempdir");
        let pdf = input.path().join("contrato.pdf");
        std::fs::write(&pdf, b"%PDF-").expect("write");

        move_to_loaded(&pdf, loaded.path()).await.expect("move");
        assert!(!pdf.exists());
        assert!(loaded.path().join("contrato.pdf").exists());
    }
}
