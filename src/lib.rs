//! Graph-backed RAG assistant for Spanish legal contracts.
//!
//! Pipeline: PDF contracts go through a layout service, become a hierarchical
//! document graph in Neo4j keyed by content hashes, get vector embeddings
//! backfilled, and are then queryable through a retrieval-augmented chat
//! assistant.

pub mod config;
pub mod embed;
pub mod error;
pub mod graph;
pub mod ingest;
pub mod keys;
pub mod layout;
pub mod llm;
pub mod logger;
pub mod rag;
pub mod reports;

pub use config::Config;
pub use error::AppError;
