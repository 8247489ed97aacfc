use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};

use log::{debug, info, warn};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::{FetchError, FetchOutcome};
use crate::graph_utils::graph::{GraphModel, GraphModelBuilder};
use crate::store::{GraphSession, GraphStore};

/// Run one fetch attempt: open a session, stream the traversal into a model,
/// close the session. The session is closed on success and on error; if the
/// future is dropped midway, dropping the boxed session releases it instead.
pub async fn fetch_graph(store: &dyn GraphStore) -> Result<GraphModel, FetchError> {
    let mut session = store.open_session().await?;
    let streamed = stream_into(session.as_mut()).await;
    if let Err(e) = session.close().await {
        warn!("{}", e);
    }
    let builder = streamed?;
    Ok(builder.finish())
}

async fn stream_into(session: &mut dyn GraphSession) -> Result<GraphModelBuilder, FetchError> {
    session.run_traversal().await?;
    let mut builder = GraphModelBuilder::default();
    let mut records = 0usize;
    while let Some(record) = session.next_record().await? {
        builder.push_record(record);
        records += 1;
    }
    debug!("consumed {} record(s) into {} node(s)", records, builder.node_count());
    Ok(builder)
}

/// Single-flight fetch driver for one visualization instance.
///
/// Every attempt is tagged with a generation number. Starting a new attempt
/// aborts the previous task and bumps the generation, so a result that still
/// arrives for an older generation is dropped instead of applied.
pub struct GraphDataFetcher {
    store: Arc<dyn GraphStore>,
    runtime: Handle,
    generation: Arc<AtomicU64>,
    in_flight: Option<JoinHandle<()>>,
    tx: Sender<FetchOutcome>,
    rx: Receiver<FetchOutcome>,
}

impl GraphDataFetcher {
    pub fn new(store: Arc<dyn GraphStore>, runtime: Handle) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            store,
            runtime,
            generation: Arc::new(AtomicU64::new(0)),
            in_flight: None,
            tx,
            rx,
        }
    }

    pub fn generation(&self) -> u64 { self.generation.load(Ordering::SeqCst) }

    /// Start a new attempt, superseding any outstanding one. Returns its generation.
    pub fn start(&mut self) -> u64 {
        self.abort_in_flight();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let store = Arc::clone(&self.store);
        let current = Arc::clone(&self.generation);
        let tx = self.tx.clone();
        info!("fetch #{} started", generation);
        let handle = self.runtime.spawn(async move {
            let result = fetch_graph(store.as_ref()).await;
            if current.load(Ordering::SeqCst) != generation {
                debug!("fetch #{} superseded, result discarded", generation);
                return;
            }
            // Receiver gone means the instance was torn down
            let _ = tx.send(FetchOutcome { generation, result });
        });
        self.in_flight = Some(handle);
        generation
    }

    /// Abandon the outstanding attempt, if any. Its result will never be applied.
    pub fn cancel(&mut self) {
        if self.in_flight.is_some() {
            self.generation.fetch_add(1, Ordering::SeqCst);
        }
        self.abort_in_flight();
    }

    fn abort_in_flight(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            if !handle.is_finished() {
                debug!("aborting fetch #{}", self.generation());
                handle.abort();
            }
        }
    }

    /// Drain delivered outcomes, returning the one for the current generation.
    pub fn poll(&mut self) -> Option<FetchOutcome> {
        let mut latest = None;
        while let Ok(outcome) = self.rx.try_recv() {
            if let Some(accepted) = self.accept(outcome) {
                latest = Some(accepted);
            }
        }
        if latest.is_some() {
            self.in_flight = None;
        }
        latest
    }

    // Generation gate; anything older than the newest attempt is stale
    pub fn accept(&self, outcome: FetchOutcome) -> Option<FetchOutcome> {
        if outcome.generation == self.generation() {
            Some(outcome)
        } else {
            debug!(
                "discarding stale fetch #{} (current #{})",
                outcome.generation,
                self.generation()
            );
            None
        }
    }
}

impl Drop for GraphDataFetcher {
    fn drop(&mut self) {
        self.cancel();
    }
}
