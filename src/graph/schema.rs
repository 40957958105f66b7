//! Constraints and the vector index.

use neo4rs::query;
use tracing::{debug, info};

use crate::error::AppError;

use super::GraphStore;

const CONSTRAINTS: [&str; 4] = [
    "CREATE CONSTRAINT document_url_hash IF NOT EXISTS
     FOR (d:Document)
     REQUIRE d.url_hash IS UNIQUE",
    "CREATE CONSTRAINT section_key IF NOT EXISTS
     FOR (s:Section)
     REQUIRE s.key IS UNIQUE",
    "CREATE CONSTRAINT chunk_key IF NOT EXISTS
     FOR (c:Chunk)
     REQUIRE c.key IS UNIQUE",
    "CREATE CONSTRAINT table_key IF NOT EXISTS
     FOR (t:Table)
     REQUIRE t.key IS UNIQUE",
];

impl GraphStore {
    /// Ensure constraints and the vector index exist. Safe to call before
    /// every load; only the first call on a handle touches the database.
    pub async fn ensure_schema(
        &mut self,
        index_name: &str,
        dimension: usize,
    ) -> Result<(), AppError> {
        if self.schema_ready {
            return Ok(());
        }
        if !super::valid_identifier(index_name) {
            return Err(AppError::Config(format!(
                "invalid vector index name: {index_name:?}"
            )));
        }

        for stmt in CONSTRAINTS {
            self.graph.run(query(stmt)).await?;
        }

        // No IF NOT EXISTS form for this procedure; a second run fails with
        // an equivalent-index error, which just means the work is done.
        let create_index = format!(
            "CALL db.index.vector.createNodeIndex('{index_name}', 'Embedding', 'value', {dimension}, 'COSINE')"
        );
        match self.graph.run(query(&create_index)).await {
            Ok(()) => info!(index = index_name, dimension, "vector index created"),
            Err(e) if index_already_exists(&e.to_string()) => {
                debug!(index = index_name, "vector index already present");
            }
            Err(e) => return Err(e.into()),
        }

        self.schema_ready = true;
        info!("graph schema ensured");
        Ok(())
    }
}

/// The create procedure has no IF NOT EXISTS form; the server reports a
/// re-create as an equivalent/already-exists failure. Anything else (lost
/// connection, bad syntax) is a real error and must surface.
fn index_already_exists(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("already exists") || (message.contains("equivalent") && message.contains("index"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equivalent_index_errors_are_benign() {
        assert!(index_already_exists(
            "An equivalent index already exists, 'Index( … NODE:Embedding(value) )'"
        ));
        assert!(index_already_exists(
            "There already exists an index (:Embedding {value})."
        ));
    }

    #[test]
    fn other_schema_errors_are_not() {
        assert!(!index_already_exists("connection reset by peer"));
        assert!(!index_already_exists("Invalid input 'CREAT': expected …"));
        assert!(!index_already_exists("authentication failure"));
    }
}
