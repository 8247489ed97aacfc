//! One mounted graph view: connection, fetcher, layout and drag handling.

use std::sync::Arc;

use log::{info, warn};
use tokio::runtime::Handle;

use crate::fetch::FetchError;
use crate::fetch::fetcher::GraphDataFetcher;
use crate::graph_utils::graph::GraphModel;
use crate::layout::interaction::{InteractionController, PointerQueue};
use crate::layout::render::RenderFrame;
use crate::layout::simulation::{ForceSimulation, SimulationConfig};
use crate::persistence::settings::VizSettings;
use crate::store::GraphStore;

// Pointer hit radius around a node centre, in layout units
pub const HIT_RADIUS: f64 = 12.0;

#[derive(Clone, Debug, PartialEq)]
pub struct VizConfig {
    pub width: f64,
    pub height: f64,
    pub simulation: SimulationConfig,
    pub retain_on_failure: bool,
}

impl Default for VizConfig {
    fn default() -> Self {
        Self::from_settings(&VizSettings::default())
    }
}

impl VizConfig {
    pub fn from_settings(settings: &VizSettings) -> Self {
        Self {
            width: settings.viewport_width,
            height: settings.viewport_height,
            simulation: settings.simulation.clone(),
            retain_on_failure: settings.retain_on_failure,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FetchStatus {
    Idle,
    Loading { generation: u64 },
    Ready { nodes: usize, links: usize, dropped_links: usize },
    Failed { error: FetchError },
}

pub struct Visualization {
    store: Arc<dyn GraphStore>,
    runtime: Handle,
    fetcher: GraphDataFetcher,
    model: GraphModel,
    simulation: ForceSimulation,
    interaction: InteractionController,
    config: VizConfig,
    status: FetchStatus,
    mounted: bool,
}

impl Visualization {
    /// Take ownership of the store connection for the lifetime of this view.
    pub fn mount(store: Arc<dyn GraphStore>, runtime: Handle, config: VizConfig) -> Self {
        let model = GraphModel::new();
        let simulation =
            ForceSimulation::new(&model, config.simulation.clone(), config.width, config.height);
        info!("visualization mounted ({}x{})", config.width, config.height);
        Self {
            fetcher: GraphDataFetcher::new(Arc::clone(&store), runtime.clone()),
            store,
            runtime,
            model,
            simulation,
            interaction: InteractionController::new(HIT_RADIUS),
            config,
            status: FetchStatus::Idle,
            mounted: true,
        }
    }

    /// Start a fetch, superseding one still in flight.
    pub fn refresh(&mut self) -> u64 {
        let generation = self.fetcher.start();
        self.status = FetchStatus::Loading { generation };
        generation
    }

    pub fn status(&self) -> &FetchStatus { &self.status }
    pub fn model(&self) -> &GraphModel { &self.model }
    pub fn simulation(&self) -> &ForceSimulation { &self.simulation }
    pub fn interaction(&self) -> &InteractionController { &self.interaction }

    /// Input sources push here; events are applied at the start of the next step.
    pub fn pointer_queue(&self) -> PointerQueue { self.interaction.queue() }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.simulation.resize(width, height);
    }

    /// One frame: apply a finished fetch, then queued input, then one tick.
    pub fn step(&mut self) -> RenderFrame {
        self.poll_fetch();
        self.interaction.apply_pending(&mut self.simulation);
        self.simulation.tick();
        RenderFrame::project(&self.simulation)
    }

    fn poll_fetch(&mut self) {
        let Some(outcome) = self.fetcher.poll() else {
            return;
        };
        match outcome.result {
            Ok(model) => {
                info!(
                    "fetch #{} applied: {} node(s), {} link(s), {} dropped",
                    outcome.generation,
                    model.node_count(),
                    model.link_count(),
                    model.dropped_links()
                );
                self.status = FetchStatus::Ready {
                    nodes: model.node_count(),
                    links: model.link_count(),
                    dropped_links: model.dropped_links(),
                };
                self.replace_model(model);
            }
            Err(error) => {
                warn!("fetch #{} failed: {}", outcome.generation, error);
                if !self.config.retain_on_failure {
                    self.replace_model(GraphModel::new());
                }
                self.status = FetchStatus::Failed { error };
            }
        }
    }

    // Whole-model swap; node slots of the old simulation are meaningless afterwards
    fn replace_model(&mut self, model: GraphModel) {
        self.interaction.forget_sessions();
        let (width, height) = self.simulation.viewport();
        self.simulation = ForceSimulation::new(&model, self.config.simulation.clone(), width, height);
        self.model = model;
    }

    pub fn unmount(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        self.fetcher.cancel();
        let store = Arc::clone(&self.store);
        // Closing happens in the background; a failure is only logged
        self.runtime.spawn(async move {
            if let Err(e) = store.close().await {
                warn!("{}", e);
            }
        });
        info!("visualization unmounted");
    }
}

impl Drop for Visualization {
    fn drop(&mut self) {
        self.teardown();
    }
}
