//! Access to the remote property-graph store.
//!
//! Only one traversal shape is ever issued: every `(head)-[rel]->(tail)`
//! triple in the database. A [`GraphStore`] stands for one connection owned
//! by a visualization instance; a [`GraphSession`] is scoped to one fetch.

pub mod neo4j;
pub mod records;

use async_trait::async_trait;
use thiserror::Error;

use crate::fetch::FetchError;
use records::TraversalRecord;

pub const TRAVERSAL_QUERY: &str = "MATCH (n)-[r]->(m) RETURN n, r, m";

/// Failure while releasing a session or connection. Logged, never surfaced.
#[derive(Debug, Error)]
#[error("failed to close {resource}: {reason}")]
pub struct TeardownError {
    pub resource: &'static str,
    pub reason: String,
}

#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn open_session(&self) -> Result<Box<dyn GraphSession>, FetchError>;

    /// Release the underlying connection. Called once, on unmount.
    async fn close(&self) -> Result<(), TeardownError>;
}

/// One fetch-scoped session.
///
/// Implementations must give their resources back when dropped, so an
/// aborted fetch that never reaches [`GraphSession::close`] still releases
/// them.
#[async_trait]
pub trait GraphSession: Send {
    async fn run_traversal(&mut self) -> Result<(), FetchError>;
    async fn next_record(&mut self) -> Result<Option<TraversalRecord>, FetchError>;
    async fn close(&mut self) -> Result<(), TeardownError>;
}
