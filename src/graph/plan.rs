//! Pure upsert planning.
//!
//! Turns a [`ParsedDocument`] into an ordered list of [`UpsertOp`]s. Nothing
//! here touches the database, so every keying and linking rule is testable
//! without a running Neo4j. Ops are ordered so that every link references
//! nodes merged earlier in the same plan.

use tracing::warn;

use crate::keys;
use crate::layout::{ParentRef, ParsedDocument};

#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOp {
    MergeDocument {
        url_hash: String,
        name: String,
        url: String,
    },
    MergeSection {
        key: String,
        title: String,
        title_hash: String,
        tag: String,
        level: i64,
        page_idx: i64,
        block_idx: i64,
    },
    /// Root section, attached directly under the document.
    LinkSectionToDocument {
        section_key: String,
        url_hash: String,
    },
    LinkSectionToParent {
        section_key: String,
        parent_key: String,
    },
    MergeChunk {
        key: String,
        text: String,
        text_hash: String,
        tag: String,
        level: i64,
        page_idx: i64,
        block_idx: i64,
    },
    LinkChunkToSection {
        chunk_key: String,
        section_key: String,
    },
    MergeTable {
        key: String,
        name: String,
        html: String,
        rows: i64,
        page_idx: i64,
        block_idx: i64,
    },
    LinkTableToSection {
        table_key: String,
        section_key: String,
    },
    /// Table outside any section hangs off the document itself.
    LinkTableToDocument {
        table_key: String,
        url_hash: String,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlanCounts {
    pub sections: usize,
    pub chunks: usize,
    pub tables: usize,
    pub orphan_chunks: usize,
}

#[derive(Debug, Clone)]
pub struct DocumentPlan {
    pub doc_name: String,
    pub url_hash: String,
    pub ops: Vec<UpsertOp>,
    pub counts: PlanCounts,
}

/// Build the upsert plan for one parsed document. `source_url` is the
/// document's stable identity (its ingest path); the same bytes at the same
/// path always produce the same keys, which is what makes re-runs idempotent.
pub fn build_plan(doc: &ParsedDocument, source_url: &str) -> DocumentPlan {
    let url_hash = keys::document_key(source_url);
    let mut ops = Vec::new();
    let mut counts = PlanCounts::default();

    ops.push(UpsertOp::MergeDocument {
        url_hash: url_hash.clone(),
        name: doc.name.clone(),
        url: source_url.to_string(),
    });

    let parent_section_key = |parent: &ParentRef| {
        keys::section_key(
            &doc.name,
            &url_hash,
            parent.block_idx,
            &keys::sha256_hex(&parent.title),
        )
    };

    for section in &doc.sections {
        if section.tag == "table" {
            continue;
        }
        let title_hash = keys::sha256_hex(&section.title);
        let key = keys::section_key(&doc.name, &url_hash, section.block_idx, &title_hash);
        ops.push(UpsertOp::MergeSection {
            key: key.clone(),
            title: section.title.clone(),
            title_hash,
            tag: section.tag.clone(),
            level: section.level,
            page_idx: section.page_idx,
            block_idx: section.block_idx,
        });
        match &section.parent {
            None => ops.push(UpsertOp::LinkSectionToDocument {
                section_key: key,
                url_hash: url_hash.clone(),
            }),
            Some(parent) => ops.push(UpsertOp::LinkSectionToParent {
                section_key: key,
                parent_key: parent_section_key(parent),
            }),
        }
        counts.sections += 1;
    }

    for chunk in &doc.chunks {
        if chunk.tag == "table" {
            continue;
        }
        let text_hash = keys::sha256_hex(&chunk.text);
        let key = keys::chunk_key(&doc.name, &url_hash, chunk.block_idx, &text_hash);
        ops.push(UpsertOp::MergeChunk {
            key: key.clone(),
            text: chunk.text.clone(),
            text_hash,
            tag: chunk.tag.clone(),
            level: chunk.level,
            page_idx: chunk.page_idx,
            block_idx: chunk.block_idx,
        });
        match &chunk.parent {
            Some(parent) => {
                ops.push(UpsertOp::LinkChunkToSection {
                    chunk_key: key,
                    section_key: parent_section_key(parent),
                });
            }
            None => {
                // Kept in the graph but unlinked. Backfill walks HAS_PARENT,
                // so orphans never get a vector either.
                warn!(
                    doc = %doc.name,
                    block_idx = chunk.block_idx,
                    "chunk has no enclosing section"
                );
                counts.orphan_chunks += 1;
            }
        }
        counts.chunks += 1;
    }

    for table in &doc.tables {
        let key = keys::table_key(&doc.name, &url_hash, table.block_idx, &table.name);
        ops.push(UpsertOp::MergeTable {
            key: key.clone(),
            name: table.name.clone(),
            html: table.html.clone(),
            rows: table.row_count,
            page_idx: table.page_idx,
            block_idx: table.block_idx,
        });
        match &table.parent {
            Some(parent) => ops.push(UpsertOp::LinkTableToSection {
                table_key: key,
                section_key: parent_section_key(parent),
            }),
            None => ops.push(UpsertOp::LinkTableToDocument {
                table_key: key,
                url_hash: url_hash.clone(),
            }),
        }
        counts.tables += 1;
    }

    DocumentPlan {
        doc_name: doc.name.clone(),
        url_hash,
        ops,
        counts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{Chunk, Section, Table};

    fn parent(title: &str, block_idx: i64) -> ParentRef {
        ParentRef {
            title: title.to_string(),
            block_idx,
            page_idx: 0,
        }
    }

    fn sample_doc() -> ParsedDocument {
        ParsedDocument {
            name: "contrato.pdf".to_string(),
            sections: vec![
                Section {
                    title: "PORTADA".to_string(),
                    tag: "header".to_string(),
                    level: 0,
                    page_idx: 0,
                    block_idx: 0,
                    parent: None,
                },
                Section {
                    title: "CLAUSULAS".to_string(),
                    tag: "header".to_string(),
                    level: 1,
                    page_idx: 1,
                    block_idx: 2,
                    parent: Some(parent("PORTADA", 0)),
                },
            ],
            chunks: vec![
                Chunk {
                    text: "Texto introductorio.".to_string(),
                    tag: "para".to_string(),
                    level: 1,
                    page_idx: 0,
                    block_idx: 1,
                    parent: Some(parent("PORTADA", 0)),
                },
                Chunk {
                    text: "Texto suelto.".to_string(),
                    tag: "para".to_string(),
                    level: 0,
                    page_idx: 3,
                    block_idx: 9,
                    parent: None,
                },
            ],
            tables: vec![Table {
                name: "block#4_rentas".to_string(),
                html: "<table></table>".to_string(),
                row_count: 3,
                page_idx: 2,
                block_idx: 4,
                parent: Some(parent("CLAUSULAS", 2)),
            }],
        }
    }

    #[test]
    fn plan_counts_and_ordering() {
        let doc = sample_doc();
        let plan = build_plan(&doc, "newdata/contrato.pdf");

        assert_eq!(plan.counts.sections, 2);
        assert_eq!(plan.counts.chunks, 2);
        assert_eq!(plan.counts.tables, 1);
        assert_eq!(plan.counts.orphan_chunks, 1);

        // Document first, then every merge precedes its link.
        assert!(matches!(plan.ops[0], UpsertOp::MergeDocument { .. }));
        let merge_at = |key: &str| {
            plan.ops.iter().position(|op| match op {
                UpsertOp::MergeSection { key: k, .. } => k == key,
                _ => false,
            })
        };
        for op in &plan.ops {
            if let UpsertOp::LinkSectionToParent {
                section_key,
                parent_key,
            } = op
            {
                let parent = merge_at(parent_key).expect("parent merged");
                let child = merge_at(section_key).expect("child merged");
                assert!(parent < child);
            }
        }
    }

    #[test]
    fn plans_are_deterministic() {
        let doc = sample_doc();
        let a = build_plan(&doc, "newdata/contrato.pdf");
        let b = build_plan(&doc, "newdata/contrato.pdf");
        assert_eq!(a.ops, b.ops);
        assert_eq!(a.url_hash, b.url_hash);
    }

    #[test]
    fn child_link_targets_parent_section_key() {
        let doc = sample_doc();
        let plan = build_plan(&doc, "newdata/contrato.pdf");

        let portada_key = plan
            .ops
            .iter()
            .find_map(|op| match op {
                UpsertOp::MergeSection { key, title, .. } if title == "PORTADA" => {
                    Some(key.clone())
                }
                _ => None,
            })
            .expect("portada section");

        let chunk_link = plan
            .ops
            .iter()
            .find_map(|op| match op {
                UpsertOp::LinkChunkToSection { section_key, .. } => Some(section_key.clone()),
                _ => None,
            })
            .expect("chunk link");
        assert_eq!(chunk_link, portada_key);

        let section_link = plan
            .ops
            .iter()
            .find_map(|op| match op {
                UpsertOp::LinkSectionToParent { parent_key, .. } => Some(parent_key.clone()),
                _ => None,
            })
            .expect("section link");
        assert_eq!(section_link, portada_key);
    }

    #[test]
    fn orphan_chunk_is_merged_but_never_linked() {
        let doc = sample_doc();
        let plan = build_plan(&doc, "newdata/contrato.pdf");

        let chunk_merges = plan
            .ops
            .iter()
            .filter(|op| matches!(op, UpsertOp::MergeChunk { .. }))
            .count();
        let chunk_links = plan
            .ops
            .iter()
            .filter(|op| matches!(op, UpsertOp::LinkChunkToSection { .. }))
            .count();
        assert_eq!(chunk_merges, 2);
        assert_eq!(chunk_links, 1);
    }

    #[test]
    fn table_tagged_blocks_are_not_sections_or_chunks() {
        let mut doc = sample_doc();
        doc.sections.push(Section {
            title: "fila".to_string(),
            tag: "table".to_string(),
            level: 2,
            page_idx: 2,
            block_idx: 5,
            parent: None,
        });
        doc.chunks.push(Chunk {
            text: "celda".to_string(),
            tag: "table".to_string(),
            level: 2,
            page_idx: 2,
            block_idx: 6,
            parent: None,
        });

        let plan = build_plan(&doc, "newdata/contrato.pdf");
        assert_eq!(plan.counts.sections, 2);
        assert_eq!(plan.counts.chunks, 2);
    }

    #[test]
    fn url_identity_changes_every_key() {
        let doc = sample_doc();
        let a = build_plan(&doc, "newdata/contrato.pdf");
        let b = build_plan(&doc, "otherdir/contrato.pdf");
        assert_ne!(a.url_hash, b.url_hash);

        let section_keys = |plan: &DocumentPlan| {
            plan.ops
                .iter()
                .filter_map(|op| match op {
                    UpsertOp::MergeSection { key, .. } => Some(key.clone()),
                    _ => None,
                })
                .collect::<Vec<_>>()
        };
        for (ka, kb) in section_keys(&a).iter().zip(section_keys(&b).iter()) {
            assert_ne!(ka, kb);
        }
    }
}
