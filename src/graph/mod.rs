//! Neo4j-backed document graph.
//!
//! ## Layout
//!
//! - [`plan`] turns a parsed document into a pure list of upsert operations,
//!   with no database involved.
//! - [`loader`] replays a plan against Neo4j with idempotent MERGE writes.
//! - [`schema`] owns constraints and the vector index.
//!
//! [`GraphStore`] is the single connection handle the rest of the crate uses.

pub mod loader;
pub mod plan;
pub mod schema;

use neo4rs::{ConfigBuilder, Graph, query};
use tracing::{debug, info};

use crate::config::GraphConfig;
use crate::error::AppError;

pub struct GraphStore {
    graph: Graph,
    schema_ready: bool,
}

impl GraphStore {
    /// Connect using the bolt address from config. Accepts both bare
    /// `host:port` and `bolt://host:port` forms.
    pub async fn connect(config: &GraphConfig) -> Result<Self, AppError> {
        let addr = bolt_addr(&config.uri);
        debug!(%addr, user = %config.user, db = %config.database, "connecting to neo4j");

        let graph_config = ConfigBuilder::default()
            .uri(&addr)
            .user(&config.user)
            .password(&config.password)
            .db(&config.database)
            .build()?;
        let graph = Graph::connect(graph_config).await?;
        info!(%addr, "neo4j connection established");

        Ok(Self {
            graph,
            schema_ready: false,
        })
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Total node count. Used by the connectivity probe.
    pub async fn node_count(&self) -> Result<i64, AppError> {
        let mut rows = self
            .graph
            .execute(query("MATCH (n) RETURN count(n) AS total"))
            .await?;
        Ok(rows
            .next()
            .await?
            .and_then(|row| row.get::<i64>("total"))
            .unwrap_or(0))
    }
}

/// Labels, property names and index names interpolated into Cypher text must
/// look like plain identifiers. Everything else goes through `$params`.
pub(crate) fn valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Strip an optional scheme prefix and default the port to 7687.
fn bolt_addr(uri: &str) -> String {
    let rest = uri
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(uri);
    if rest.contains(':') {
        rest.to_string()
    } else {
        format!("{rest}:7687")
    }
}
