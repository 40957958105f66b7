//! End-to-end planning tests: layout JSON in, upsert plan out.
//!
//! Exercises the public pipeline up to the point where a live Neo4j would
//! take over, using a fixture shaped like a real layout-service response.

use lexgraf::graph::plan::{UpsertOp, build_plan};
use lexgraf::keys;
use lexgraf::layout::parse_layout_json;

const FIXTURE: &str = r#"{
  "return_dict": {
    "result": {
      "blocks": [
        {"tag": "header", "level": 0, "page_idx": 0, "block_idx": 0,
         "sentences": ["CONTRATO DE PRESTACION DE SERVICIOS"]},
        {"tag": "para", "level": 1, "page_idx": 0, "block_idx": 1,
         "sentences": ["Entre las partes que se indican."]},
        {"tag": "header", "level": 1, "page_idx": 1, "block_idx": 2,
         "sentences": ["PRIMERA. OBJETO"]},
        {"tag": "para", "level": 2, "page_idx": 1, "block_idx": 3,
         "sentences": ["El prestador realizara los servicios descritos.",
                       "El cliente abonara la tarifa pactada."]},
        {"tag": "table", "level": 2, "page_idx": 1, "block_idx": 4,
         "name": "tarifas",
         "table_rows": [
           {"cells": [{"cell_value": "Servicio"}, {"cell_value": "Precio"}]},
           {"cells": [{"cell_value": "Mantenimiento"}, {"cell_value": "1200"}]}
         ]},
        {"tag": "header", "level": 1, "page_idx": 2, "block_idx": 5,
         "sentences": ["SEGUNDA. DURACION"]},
        {"tag": "list_item", "level": 2, "page_idx": 2, "block_idx": 6,
         "sentences": ["Un ano prorrogable."]}
      ]
    }
  }
}"#;

#[test]
fn fixture_parses_into_the_expected_shape() {
    let doc = parse_layout_json("servicios", FIXTURE).expect("parse");
    assert_eq!(doc.sections.len(), 3);
    assert_eq!(doc.chunks.len(), 3);
    assert_eq!(doc.tables.len(), 1);
}

#[test]
fn plan_keys_are_content_addressed() {
    let doc = parse_layout_json("servicios", FIXTURE).expect("parse");
    let plan = build_plan(&doc, "newdata/servicios.pdf");

    assert_eq!(plan.url_hash, keys::sha256_hex("newdata/servicios.pdf"));

    for op in &plan.ops {
        if let UpsertOp::MergeChunk { key, text, text_hash, block_idx, .. } = op {
            assert_eq!(*text_hash, keys::sha256_hex(text));
            assert_eq!(
                *key,
                format!("servicios_{}|{block_idx}|{text_hash}", plan.url_hash)
            );
        }
    }
}

#[test]
fn every_link_references_a_merged_node() {
    let doc = parse_layout_json("servicios", FIXTURE).expect("parse");
    let plan = build_plan(&doc, "newdata/servicios.pdf");

    let merged: Vec<&str> = plan
        .ops
        .iter()
        .filter_map(|op| match op {
            UpsertOp::MergeSection { key, .. }
            | UpsertOp::MergeChunk { key, .. }
            | UpsertOp::MergeTable { key, .. } => Some(key.as_str()),
            _ => None,
        })
        .collect();

    for op in &plan.ops {
        match op {
            UpsertOp::LinkSectionToParent {
                section_key,
                parent_key,
            } => {
                assert!(merged.contains(&section_key.as_str()));
                assert!(merged.contains(&parent_key.as_str()));
            }
            UpsertOp::LinkChunkToSection {
                chunk_key,
                section_key,
            } => {
                assert!(merged.contains(&chunk_key.as_str()));
                assert!(merged.contains(&section_key.as_str()));
            }
            UpsertOp::LinkTableToSection {
                table_key,
                section_key,
            } => {
                assert!(merged.contains(&table_key.as_str()));
                assert!(merged.contains(&section_key.as_str()));
            }
            _ => {}
        }
    }
}

#[test]
fn reingesting_the_same_file_yields_the_same_plan() {
    let doc = parse_layout_json("servicios", FIXTURE).expect("parse");
    let first = build_plan(&doc, "newdata/servicios.pdf");
    let second = build_plan(&doc, "newdata/servicios.pdf");
    assert_eq!(first.ops, second.ops);
}

#[test]
fn table_attaches_under_its_clause() {
    let doc = parse_layout_json("servicios", FIXTURE).expect("parse");
    let plan = build_plan(&doc, "newdata/servicios.pdf");

    let clause_key = plan
        .ops
        .iter()
        .find_map(|op| match op {
            UpsertOp::MergeSection { key, title, .. } if title == "PRIMERA. OBJETO" => {
                Some(key.clone())
            }
            _ => None,
        })
        .expect("clause section");

    let table_link = plan
        .ops
        .iter()
        .find_map(|op| match op {
            UpsertOp::LinkTableToSection { section_key, .. } => Some(section_key.clone()),
            _ => None,
        })
        .expect("table link");
    assert_eq!(table_link, clause_key);
    assert!(!plan
        .ops
        .iter()
        .any(|op| matches!(op, UpsertOp::LinkTableToDocument { .. })));
}
