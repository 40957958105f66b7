//! Plan execution against Neo4j.
//!
//! Every statement is a MERGE keyed on a content-addressed property, so
//! replaying a plan (or re-ingesting an unchanged file) touches nothing.
//! Links use MERGE too; a MATCH that finds no endpoint simply writes no
//! relationship, which covers orphan chunks without special casing.

use neo4rs::query;
use tracing::{debug, info};

use crate::error::AppError;

use super::GraphStore;
use super::plan::{DocumentPlan, UpsertOp};

const MERGE_DOCUMENT: &str = "MERGE (d:Document {url_hash: $url_hash})
     ON CREATE SET d.name = $name, d.url = $url";

const MERGE_SECTION: &str = "MERGE (s:Section {key: $key})
     ON CREATE SET s.title = $title, s.title_hash = $title_hash,
                   s.tag = $tag, s.level = $level,
                   s.page_idx = $page_idx, s.block_idx = $block_idx";

const LINK_SECTION_DOCUMENT: &str = "MATCH (s:Section {key: $section_key})
     MATCH (d:Document {url_hash: $url_hash})
     MERGE (s)-[:HAS_DOCUMENT]->(d)";

const LINK_SECTION_PARENT: &str = "MATCH (s:Section {key: $section_key})
     MATCH (p:Section {key: $parent_key})
     MERGE (s)-[:UNDER_SECTION]->(p)";

const MERGE_CHUNK: &str = "MERGE (c:Chunk {key: $key})
     ON CREATE SET c.sentences = $text, c.sentences_hash = $text_hash,
                   c.tag = $tag, c.level = $level,
                   c.page_idx = $page_idx, c.block_idx = $block_idx";

const LINK_CHUNK_SECTION: &str = "MATCH (c:Chunk {key: $chunk_key})
     MATCH (s:Section {key: $section_key})
     MERGE (c)-[:HAS_PARENT]->(s)";

const MERGE_TABLE: &str = "MERGE (t:Table {key: $key})
     ON CREATE SET t.name = $name, t.html = $html, t.rows = $rows,
                   t.page_idx = $page_idx, t.block_idx = $block_idx";

const LINK_TABLE_SECTION: &str = "MATCH (t:Table {key: $table_key})
     MATCH (s:Section {key: $section_key})
     MERGE (t)-[:HAS_PARENT]->(s)";

const LINK_TABLE_DOCUMENT: &str = "MATCH (t:Table {key: $table_key})
     MATCH (d:Document {url_hash: $url_hash})
     MERGE (t)-[:HAS_PARENT]->(d)";

impl GraphStore {
    /// Replay a document plan in order.
    pub async fn load_plan(&self, plan: &DocumentPlan) -> Result<(), AppError> {
        debug!(doc = %plan.doc_name, ops = plan.ops.len(), "loading plan");

        for op in &plan.ops {
            let q = match op {
                UpsertOp::MergeDocument {
                    url_hash,
                    name,
                    url,
                } => query(MERGE_DOCUMENT)
                    .param("url_hash", url_hash.as_str())
                    .param("name", name.as_str())
                    .param("url", url.as_str()),
                UpsertOp::MergeSection {
                    key,
                    title,
                    title_hash,
                    tag,
                    level,
                    page_idx,
                    block_idx,
                } => query(MERGE_SECTION)
                    .param("key", key.as_str())
                    .param("title", title.as_str())
                    .param("title_hash", title_hash.as_str())
                    .param("tag", tag.as_str())
                    .param("level", *level)
                    .param("page_idx", *page_idx)
                    .param("block_idx", *block_idx),
                UpsertOp::LinkSectionToDocument {
                    section_key,
                    url_hash,
                } => query(LINK_SECTION_DOCUMENT)
                    .param("section_key", section_key.as_str())
                    .param("url_hash", url_hash.as_str()),
                UpsertOp::LinkSectionToParent {
                    section_key,
                    parent_key,
                } => query(LINK_SECTION_PARENT)
                    .param("section_key", section_key.as_str())
                    .param("parent_key", parent_key.as_str()),
                UpsertOp::MergeChunk {
                    key,
                    text,
                    text_hash,
                    tag,
                    level,
                    page_idx,
                    block_idx,
                } => query(MERGE_CHUNK)
                    .param("key", key.as_str())
                    .param("text", text.as_str())
                    .param("text_hash", text_hash.as_str())
                    .param("tag", tag.as_str())
                    .param("level", *level)
                    .param("page_idx", *page_idx)
                    .param("block_idx", *block_idx),
                UpsertOp::LinkChunkToSection {
                    chunk_key,
                    section_key,
                } => query(LINK_CHUNK_SECTION)
                    .param("chunk_key", chunk_key.as_str())
                    .param("section_key", section_key.as_str()),
                UpsertOp::MergeTable {
                    key,
                    name,
                    html,
                    rows,
                    page_idx,
                    block_idx,
                } => query(MERGE_TABLE)
                    .param("key", key.as_str())
                    .param("name", name.as_str())
                    .param("html", html.as_str())
                    .param("rows", *rows)
                    .param("page_idx", *page_idx)
                    .param("block_idx", *block_idx),
                UpsertOp::LinkTableToSection {
                    table_key,
                    section_key,
                } => query(LINK_TABLE_SECTION)
                    .param("table_key", table_key.as_str())
                    .param("section_key", section_key.as_str()),
                UpsertOp::LinkTableToDocument {
                    table_key,
                    url_hash,
                } => query(LINK_TABLE_DOCUMENT)
                    .param("table_key", table_key.as_str())
                    .param("url_hash", url_hash.as_str()),
            };
            self.graph.run(q).await?;
        }

        info!(
            doc = %plan.doc_name,
            sections = plan.counts.sections,
            chunks = plan.counts.chunks,
            tables = plan.counts.tables,
            orphan_chunks = plan.counts.orphan_chunks,
            "document loaded"
        );
        Ok(())
    }
}
