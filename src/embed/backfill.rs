//! Embedding backfill over the document graph.
//!
//! Finds nodes that have a `HAS_PARENT` section but no embedding yet, embeds
//! `"{section title} >> {node text}"` so the vector carries hierarchy context,
//! and attaches an `Embedding` node. Progress is marked per node with
//! `has_embedding`, so an interrupted run resumes where it stopped.

use neo4rs::query;
use tracing::{info, warn};

use crate::error::AppError;
use crate::graph::{GraphStore, valid_identifier};

use super::Embedder;

/// Label and text property of each node kind that gets a vector.
pub const DEFAULT_TARGETS: [(&str, &str); 2] = [("Chunk", "sentences"), ("Table", "name")];

#[derive(Debug, Clone, Copy, Default)]
pub struct BackfillStats {
    pub embedded: usize,
    pub failed: usize,
}

struct PendingNode {
    id: i64,
    title: String,
    text: String,
}

/// Only unmarked nodes are selected, so a rerun after an abort resumes
/// where the last run stopped.
fn select_query(label: &str, property: &str) -> String {
    format!(
        "MATCH (n:{label})-[:HAS_PARENT]->(s:Section)
         WHERE coalesce(n.has_embedding, false) = false
         RETURN id(n) AS id, s.title AS title, n.{property} AS text"
    )
}

/// The `key` param carries the source property name, so an Embedding node
/// records which text it was computed from.
const WRITE_QUERY: &str = "MATCH (n) WHERE id(n) = $id
     CREATE (e:Embedding {key: $key})
     SET e.value = $value
     CREATE (n)-[:HAS_EMBEDDING]->(e)
     SET n.has_embedding = true";

/// Backfill every target label. Any failure inside one label pair abandons
/// the rest of that pair; the run carries on with the next pair and is never
/// fatal, since already-written vectors are retained and a rerun re-queries
/// for whatever is still missing.
pub async fn run(
    store: &GraphStore,
    embedder: &mut Embedder,
    refresh_every: usize,
) -> Result<BackfillStats, AppError> {
    let mut stats = BackfillStats::default();
    for (label, property) in DEFAULT_TARGETS {
        match backfill_label(store, embedder, label, property, refresh_every).await {
            Ok(batch) => {
                stats.embedded += batch.embedded;
                stats.failed += batch.failed;
            }
            Err(e) => {
                warn!(label, property, error = %e, "backfill pair aborted");
                stats.failed += 1;
            }
        }
    }
    info!(
        embedded = stats.embedded,
        failed = stats.failed,
        "embedding backfill finished"
    );
    Ok(stats)
}

async fn backfill_label(
    store: &GraphStore,
    embedder: &mut Embedder,
    label: &str,
    property: &str,
    refresh_every: usize,
) -> Result<BackfillStats, AppError> {
    // Label and property are interpolated into the query text; Cypher has no
    // parameter form for either.
    if !valid_identifier(label) || !valid_identifier(property) {
        return Err(AppError::Embedding(format!(
            "invalid backfill target: {label}.{property}"
        )));
    }

    let select = select_query(label, property);

    // Collect before writing so the write transactions never race the open
    // read stream.
    let mut pending = Vec::new();
    let mut rows = store.graph().execute(query(&select)).await?;
    while let Some(row) = rows.next().await? {
        let Some(id) = row.get::<i64>("id") else {
            continue;
        };
        pending.push(PendingNode {
            id,
            title: row.get::<String>("title").unwrap_or_default(),
            text: row.get::<String>("text").unwrap_or_default(),
        });
    }
    info!(label, property, pending = pending.len(), "backfill targets selected");

    let mut stats = BackfillStats::default();
    for (done, node) in pending.iter().enumerate() {
        if done > 0 && done % refresh_every == 0 {
            embedder.refresh()?;
        }

        let payload = format!("{} >> {}", node.title, node.text);
        let vector = match embedder.embed(&payload).await {
            Ok(v) => v,
            Err(e) => {
                // The rest of this pair is abandoned; nodes not yet marked
                // are picked up again by the next run's re-query.
                warn!(label, id = node.id, error = %e, "embedding failed, pair aborted");
                stats.failed += 1;
                break;
            }
        };

        let write = query(WRITE_QUERY)
            .param("id", node.id)
            .param("key", property)
            .param("value", vector);
        store.graph().run(write).await?;
        stats.embedded += 1;
    }

    info!(
        label,
        embedded = stats.embedded,
        failed = stats.failed,
        "label backfill done"
    );
    Ok(stats)
}
