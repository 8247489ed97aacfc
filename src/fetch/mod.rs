pub mod fetcher;

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::runtime::{Handle, Runtime};

use crate::graph_utils::graph::GraphModel;

/// Terminal failure of one fetch attempt. No partial graph survives either kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("query failed: {0}")]
    Query(String),
}

#[derive(Debug)]
pub struct FetchOutcome {
    pub generation: u64,
    pub result: Result<GraphModel, FetchError>,
}

// Background runtime that executes fetches off the UI thread
pub struct FetchRuntime {
    runtime: Option<Runtime>,
    handle: Handle,
}

impl FetchRuntime {
    pub fn new() -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("crawl-loom-fetch")
            .enable_all()
            .build()?;
        let handle = runtime.handle().clone();
        Ok(Self { runtime: Some(runtime), handle })
    }

    pub fn handle(&self) -> Handle { self.handle.clone() }

    pub fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.handle.block_on(fut)
    }
}

impl Drop for FetchRuntime {
    fn drop(&mut self) {
        if let Some(rt) = self.runtime.take() {
            rt.shutdown_timeout(Duration::from_millis(100));
        }
    }
}
