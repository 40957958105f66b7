//! Content-addressed key derivation for graph nodes.
//!
//! Every node's natural key is derived deterministically from its content, so
//! each create is an idempotent MERGE: re-ingesting the same file never
//! duplicates nodes. The digest-to-string contract is SHA-256 rendered as 64
//! lowercase hex characters; composite keys concatenate the document identity,
//! the block index, and a content digest with `_` and `|` separators.

use sha2::{Digest, Sha256};

/// SHA-256 of `text`, lowercase hex. Stable across runs; the empty string is
/// valid input and hashes to the digest of zero bytes.
pub fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Document natural key: digest of the source path.
pub fn document_key(source_path: &str) -> String {
    sha256_hex(source_path)
}

/// Section key: `{doc_name}_{doc_key}|{block_idx}|{title_hash}`.
pub fn section_key(doc_name: &str, doc_key: &str, block_idx: i64, title_hash: &str) -> String {
    format!("{doc_name}_{doc_key}|{block_idx}|{title_hash}")
}

/// Chunk key: `{doc_name}_{doc_key}|{block_idx}|{sentences_hash}`.
pub fn chunk_key(doc_name: &str, doc_key: &str, block_idx: i64, sentences_hash: &str) -> String {
    format!("{doc_name}_{doc_key}|{block_idx}|{sentences_hash}")
}

/// Table key: `{doc_name}_{doc_key}|{block_idx}|{table_name}`.
///
/// The table name already embeds the block index (`block#N_...`), so unnamed
/// tables still key uniquely within a document.
pub fn table_key(doc_name: &str, doc_key: &str, block_idx: i64, table_name: &str) -> String {
    format!("{doc_name}_{doc_key}|{block_idx}|{table_name}")
}
