//! Vector retrieval over the document graph.

use neo4rs::query;
use tracing::debug;

use crate::embed::Embedder;
use crate::error::AppError;
use crate::graph::GraphStore;

/// Similarity search plus ancestry. The vector index holds `Embedding`
/// nodes; each hit is walked back to its chunk, enclosing section, and the
/// owning document so answers can cite where a fragment came from.
const RETRIEVAL_QUERY: &str = "CALL db.index.vector.queryNodes($index, $k, $embedding)
     YIELD node, score
     MATCH (chunk:Chunk)-[:HAS_EMBEDDING]->(node)
     OPTIONAL MATCH (chunk)-[:HAS_PARENT]->(s:Section)
     OPTIONAL MATCH (s)-[:UNDER_SECTION*0..]->(root:Section)-[:HAS_DOCUMENT]->(d:Document)
     RETURN chunk.sentences AS text, s.title AS section, d.name AS document, score
     ORDER BY score DESC";

#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub text: String,
    pub section: Option<String>,
    pub document: Option<String>,
    pub score: f64,
}

impl RetrievedChunk {
    /// Context block for the prompt: provenance header plus the fragment.
    pub fn render(&self) -> String {
        let document = self.document.as_deref().unwrap_or("documento desconocido");
        match &self.section {
            Some(section) => format!("[{document} / {section}]\n{}", self.text),
            None => format!("[{document}]\n{}", self.text),
        }
    }
}

/// Embed the question and return the `top_k` closest chunks.
pub async fn top_chunks(
    store: &GraphStore,
    embedder: &Embedder,
    index_name: &str,
    question: &str,
    top_k: usize,
) -> Result<Vec<RetrievedChunk>, AppError> {
    let embedding = embedder.embed(question).await?;

    let q = query(RETRIEVAL_QUERY)
        .param("index", index_name)
        .param("k", top_k as i64)
        .param("embedding", embedding);

    let mut chunks = Vec::new();
    let mut rows = store.graph().execute(q).await?;
    while let Some(row) = rows.next().await? {
        let Some(text) = row.get::<String>("text") else {
            continue;
        };
        chunks.push(RetrievedChunk {
            text,
            section: row.get::<String>("section"),
            document: row.get::<String>("document"),
            score: row.get::<f64>("score").unwrap_or(0.0),
        });
    }

    debug!(hits = chunks.len(), top_k, "retrieval done");
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_provenance() {
        let chunk = RetrievedChunk {
            text: "El plazo sera de un ano.".to_string(),
            section: Some("CLAUSULA PRIMERA".to_string()),
            document: Some("contrato.pdf".to_string()),
            score: 0.91,
        };
        assert_eq!(
            chunk.render(),
            "[contrato.pdf / CLAUSULA PRIMERA]\nEl plazo sera de un ano."
        );
    }

    #[test]
    fn render_degrades_without_ancestry() {
        let chunk = RetrievedChunk {
            text: "Texto suelto.".to_string(),
            section: None,
            document: None,
            score: 0.5,
        };
        assert_eq!(chunk.render(), "[documento desconocido]\nTexto suelto.");
    }
}
