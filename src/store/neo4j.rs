use async_trait::async_trait;
use log::{debug, info};
use neo4rs::{query, Graph, Row, RowStream, Txn};
use tokio::sync::Mutex;

use super::records::{EntityRecord, Properties, PropertyValue, RelationshipRecord, TraversalRecord};
use super::{GraphSession, GraphStore, TeardownError, TRAVERSAL_QUERY};
use crate::fetch::FetchError;
use crate::persistence::settings::ConnectionConfig;

/// Neo4j-backed store. The connection pool is created lazily by the first
/// session so a store that cannot be reached fails that fetch, not the mount.
pub struct Neo4jStore {
    config: ConnectionConfig,
    graph: Mutex<Option<Graph>>,
}

impl Neo4jStore {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config, graph: Mutex::new(None) }
    }

    async fn graph(&self) -> Result<Graph, FetchError> {
        let mut slot = self.graph.lock().await;
        if let Some(graph) = slot.as_ref() {
            return Ok(graph.clone());
        }
        info!("connecting to graph store at {}", self.config.uri);
        let graph = Graph::new(&self.config.uri, &self.config.user, self.config.password())
            .await
            .map_err(|e| FetchError::Connection(e.to_string()))?;
        *slot = Some(graph.clone());
        Ok(graph)
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn open_session(&self) -> Result<Box<dyn GraphSession>, FetchError> {
        let graph = self.graph().await?;
        // The transaction reserves a pooled connection until it is dropped
        let txn = graph
            .start_txn()
            .await
            .map_err(|e| FetchError::Connection(e.to_string()))?;
        debug!("session opened");
        Ok(Box::new(Neo4jSession { txn: Some(txn), stream: None }))
    }

    async fn close(&self) -> Result<(), TeardownError> {
        // Dropping the last handle shuts the pool down
        if self.graph.lock().await.take().is_some() {
            info!("graph store connection closed");
        }
        Ok(())
    }
}

// Read-only transaction plus the row stream pulled through it
struct Neo4jSession {
    txn: Option<Txn>,
    stream: Option<RowStream>,
}

#[async_trait]
impl GraphSession for Neo4jSession {
    async fn run_traversal(&mut self) -> Result<(), FetchError> {
        let Some(txn) = self.txn.as_mut() else {
            return Err(FetchError::Query("session already closed".into()));
        };
        let stream = txn
            .execute(query(TRAVERSAL_QUERY))
            .await
            .map_err(|e| FetchError::Query(e.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }

    async fn next_record(&mut self) -> Result<Option<TraversalRecord>, FetchError> {
        let (Some(txn), Some(stream)) = (self.txn.as_mut(), self.stream.as_mut()) else {
            return Err(FetchError::Query("traversal was not started".into()));
        };
        match stream.next(txn).await.map_err(|e| FetchError::Query(e.to_string()))? {
            Some(row) => row_to_record(&row).map(Some),
            None => Ok(None),
        }
    }

    async fn close(&mut self) -> Result<(), TeardownError> {
        self.stream.take();
        if let Some(txn) = self.txn.take() {
            // Nothing was written; rollback just ends the transaction
            txn.rollback().await.map_err(|e| TeardownError {
                resource: "session",
                reason: e.to_string(),
            })?;
        }
        debug!("session closed");
        Ok(())
    }
}

impl Drop for Neo4jSession {
    fn drop(&mut self) {
        self.stream.take();
        if self.txn.take().is_some() {
            debug!("session dropped before close, connection returned to pool");
        }
    }
}

fn column_error(column: &str, e: impl std::fmt::Display) -> FetchError {
    FetchError::Query(format!("column {}: {}", column, e))
}

fn row_to_record(row: &Row) -> Result<TraversalRecord, FetchError> {
    let head: neo4rs::Node = row.get("n").map_err(|e| column_error("n", e))?;
    let rel: neo4rs::Relation = row.get("r").map_err(|e| column_error("r", e))?;
    let tail: neo4rs::Node = row.get("m").map_err(|e| column_error("m", e))?;
    Ok(TraversalRecord {
        head: entity_from_node(&head),
        relationship: RelationshipRecord { rel_type: rel.typ().to_string() },
        tail: entity_from_node(&tail),
    })
}

fn entity_from_node(node: &neo4rs::Node) -> EntityRecord {
    let mut properties = Properties::new();
    for key in node.keys() {
        match node.get::<PropertyValue>(key) {
            Ok(value) => {
                properties.insert(key.to_string(), value);
            }
            Err(e) => debug!("skipping non-scalar property {} on entity {}: {}", key, node.id(), e),
        }
    }
    EntityRecord {
        identity: node.id(),
        labels: node.labels().into_iter().map(str::to_string).collect(),
        properties,
    }
}
