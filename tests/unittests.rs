use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::sync::Notify;

use crawl_loom::fetch::fetcher::{GraphDataFetcher, fetch_graph};
use crawl_loom::fetch::{FetchError, FetchOutcome, FetchRuntime};
use crawl_loom::graph_utils::graph::GraphModel;
use crawl_loom::layout::interaction::PointerEvent;
use crawl_loom::store::records::{EntityRecord, PropertyValue, TraversalRecord};
use crawl_loom::store::{GraphSession, GraphStore, TeardownError};
use crawl_loom::viz::{FetchStatus, Visualization, VizConfig};

#[derive(Default)]
struct Counters {
    opened: AtomicUsize,
    released: AtomicUsize,
    store_closed: AtomicUsize,
}

enum Outcome {
    Records(Vec<TraversalRecord>),
    FailConnect,
    FailQuery,
}

// One entry per session the store will hand out, consumed in order
struct Script {
    outcome: Outcome,
    gate: Option<Arc<Notify>>,
}

impl Script {
    fn records(records: Vec<TraversalRecord>) -> Self {
        Self { outcome: Outcome::Records(records), gate: None }
    }

    fn failing(outcome: Outcome) -> Self {
        Self { outcome, gate: None }
    }

    fn gated(records: Vec<TraversalRecord>, gate: &Arc<Notify>) -> Self {
        Self { outcome: Outcome::Records(records), gate: Some(Arc::clone(gate)) }
    }
}

struct ScriptedStore {
    scripts: Mutex<VecDeque<Script>>,
    counters: Arc<Counters>,
}

impl ScriptedStore {
    fn new(scripts: Vec<Script>) -> (Arc<Self>, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let store = Arc::new(Self { scripts: Mutex::new(scripts.into()), counters: Arc::clone(&counters) });
        (store, counters)
    }
}

#[async_trait]
impl GraphStore for ScriptedStore {
    async fn open_session(&self) -> Result<Box<dyn GraphSession>, FetchError> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Script::records(Vec::new()));
        let (records, fail_query) = match script.outcome {
            Outcome::FailConnect => return Err(FetchError::Connection("scripted refusal".into())),
            Outcome::FailQuery => (Vec::new(), true),
            Outcome::Records(records) => (records, false),
        };
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            records: records.into(),
            fail_query,
            gate: script.gate,
            counters: Arc::clone(&self.counters),
        }))
    }

    async fn close(&self) -> Result<(), TeardownError> {
        self.counters.store_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct ScriptedSession {
    records: VecDeque<TraversalRecord>,
    fail_query: bool,
    gate: Option<Arc<Notify>>,
    counters: Arc<Counters>,
}

#[async_trait]
impl GraphSession for ScriptedSession {
    async fn run_traversal(&mut self) -> Result<(), FetchError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail_query {
            return Err(FetchError::Query("scripted syntax error".into()));
        }
        Ok(())
    }

    async fn next_record(&mut self) -> Result<Option<TraversalRecord>, FetchError> {
        Ok(self.records.pop_front())
    }

    async fn close(&mut self) -> Result<(), TeardownError> {
        Ok(())
    }
}

impl Drop for ScriptedSession {
    fn drop(&mut self) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

fn page(id: i64) -> EntityRecord {
    EntityRecord::new(id, &["Page"])
}

fn link(a: i64, b: i64) -> TraversalRecord {
    TraversalRecord::new(page(a), "LINKS_TO", page(b))
}

fn star() -> Vec<TraversalRecord> {
    vec![link(1, 2), link(1, 3)]
}

async fn wait_for(what: &str, cond: impl Fn() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("timed out waiting for {}", what);
}

async fn step_until(viz: &mut Visualization, what: &str, done: impl Fn(&Visualization) -> bool) {
    for _ in 0..1000 {
        viz.step();
        if done(viz) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("timed out waiting for {}", what);
}

fn is_ready(viz: &Visualization) -> bool {
    matches!(viz.status(), FetchStatus::Ready { .. })
}

fn is_failed(viz: &Visualization) -> bool {
    matches!(viz.status(), FetchStatus::Failed { .. })
}

#[tokio::test]
async fn fetch_keeps_last_duplicate_and_first_seen_order() {
    let (store, counters) = ScriptedStore::new(vec![Script::records(vec![
        TraversalRecord::new(page(1).with_property("title", "old"), "LINKS_TO", page(2)),
        TraversalRecord::new(page(2), "LINKS_TO", page(1).with_property("title", "new")),
    ])]);
    let model = fetch_graph(store.as_ref()).await.expect("fetch succeeds");

    let ids: Vec<&str> = model.nodes().iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2"]);
    assert_eq!(model.link_count(), 2);
    let title = model.get_node("1").and_then(|n| n.properties.get("title"));
    assert_eq!(title, Some(&PropertyValue::from("new")));
    assert_eq!(counters.opened.load(Ordering::SeqCst), 1);
    assert_eq!(counters.released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_fetches_report_the_right_error_and_release_sessions() {
    let (store, counters) = ScriptedStore::new(vec![
        Script::failing(Outcome::FailConnect),
        Script::failing(Outcome::FailQuery),
    ]);
    assert!(matches!(fetch_graph(store.as_ref()).await, Err(FetchError::Connection(_))));
    assert_eq!(counters.opened.load(Ordering::SeqCst), 0);

    assert!(matches!(fetch_graph(store.as_ref()).await, Err(FetchError::Query(_))));
    assert_eq!(counters.opened.load(Ordering::SeqCst), 1);
    assert_eq!(counters.released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_result_is_an_empty_model() {
    let (store, _) = ScriptedStore::new(vec![Script::records(Vec::new())]);
    let model = fetch_graph(store.as_ref()).await.expect("fetch succeeds");
    assert!(model.is_empty());
    assert_eq!(model.link_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn superseded_fetch_is_never_applied() {
    let gate = Arc::new(Notify::new());
    let (store, counters) = ScriptedStore::new(vec![
        Script::gated(vec![link(10, 11)], &gate),
        Script::records(star()),
    ]);
    let mut fetcher = GraphDataFetcher::new(store, Handle::current());

    let first = fetcher.start();
    wait_for("first session", || counters.opened.load(Ordering::SeqCst) == 1).await;
    let second = fetcher.start();
    assert!(second > first);
    gate.notify_one();

    let mut outcome = None;
    for _ in 0..500 {
        outcome = fetcher.poll();
        if outcome.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    let outcome = outcome.expect("second fetch delivers");
    assert_eq!(outcome.generation, second);
    let model = outcome.result.expect("second fetch succeeds");
    assert!(model.contains_node("1") && !model.contains_node("10"));

    // A late result tagged with the old generation is refused
    let stale = FetchOutcome { generation: first, result: Ok(GraphModel::new()) };
    assert!(fetcher.accept(stale).is_none());

    wait_for("both sessions released", || counters.released.load(Ordering::SeqCst) == 2).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelled_fetch_releases_its_session() {
    let gate = Arc::new(Notify::new());
    let (store, counters) = ScriptedStore::new(vec![Script::gated(star(), &gate)]);
    let mut fetcher = GraphDataFetcher::new(store, Handle::current());

    fetcher.start();
    wait_for("session opened", || counters.opened.load(Ordering::SeqCst) == 1).await;
    fetcher.cancel();
    wait_for("session released", || counters.released.load(Ordering::SeqCst) == 1).await;

    gate.notify_one();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(fetcher.poll().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failure_clears_the_graph_by_default() {
    let (store, _) = ScriptedStore::new(vec![
        Script::records(star()),
        Script::failing(Outcome::FailQuery),
    ]);
    let mut viz = Visualization::mount(store, Handle::current(), VizConfig::default());
    viz.refresh();
    step_until(&mut viz, "first fetch", is_ready).await;
    assert_eq!(viz.model().node_count(), 3);

    viz.refresh();
    step_until(&mut viz, "failing fetch", is_failed).await;
    assert!(viz.model().is_empty());
    assert!(viz.simulation().is_empty());
    assert_eq!(
        viz.status(),
        &FetchStatus::Failed { error: FetchError::Query("scripted syntax error".into()) }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failure_can_retain_the_previous_graph() {
    let (store, _) = ScriptedStore::new(vec![
        Script::records(star()),
        Script::failing(Outcome::FailConnect),
    ]);
    let config = VizConfig { retain_on_failure: true, ..VizConfig::default() };
    let mut viz = Visualization::mount(store, Handle::current(), config);
    viz.refresh();
    step_until(&mut viz, "first fetch", is_ready).await;

    viz.refresh();
    step_until(&mut viz, "failing fetch", is_failed).await;
    assert_eq!(viz.model().node_count(), 3);
    assert_eq!(viz.simulation().len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn simultaneous_drags_stay_independent() {
    let (store, _) = ScriptedStore::new(vec![Script::records(star())]);
    let mut viz = Visualization::mount(store, Handle::current(), VizConfig::default());
    viz.refresh();
    step_until(&mut viz, "settled layout", |v| is_ready(v) && v.simulation().is_settled()).await;

    let sim = viz.simulation();
    let (b, c) = (sim.index_of("2").expect("node 2"), sim.index_of("3").expect("node 3"));
    let (bx, by) = (sim.nodes()[b].x, sim.nodes()[b].y);
    let (cx, cy) = (sim.nodes()[c].x, sim.nodes()[c].y);

    let queue = viz.pointer_queue();
    queue.push(PointerEvent::Down { pointer: 1, x: bx, y: by });
    queue.push(PointerEvent::Down { pointer: 2, x: cx, y: cy });
    queue.push(PointerEvent::Move { pointer: 1, x: 100.0, y: 100.0 });
    queue.push(PointerEvent::Move { pointer: 2, x: 600.0, y: 400.0 });
    let frame = viz.step();
    assert_eq!(viz.interaction().dragged_node(1), Some(b));
    assert_eq!(viz.interaction().dragged_node(2), Some(c));
    let (pb, pc) = (frame.point("2").expect("2"), frame.point("3").expect("3"));
    assert_eq!((pb.x, pb.y), (100.0, 100.0));
    assert_eq!((pc.x, pc.y), (600.0, 400.0));
    assert!((viz.simulation().energy() - 0.3).abs() < 0.01);

    queue.push(PointerEvent::Up { pointer: 1 });
    let frame = viz.step();
    assert!(!frame.point("2").expect("2").pinned);
    let pc = frame.point("3").expect("3");
    assert!(pc.pinned);
    assert_eq!((pc.x, pc.y), (600.0, 400.0));
    assert_eq!(viz.simulation().energy_target(), 0.3);

    queue.push(PointerEvent::Up { pointer: 2 });
    viz.step();
    assert_eq!(viz.simulation().energy_target(), 0.0);
    assert!(!viz.interaction().is_dragging());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn released_node_moves_under_forces() {
    let (store, _) = ScriptedStore::new(vec![Script::records(star())]);
    let mut viz = Visualization::mount(store, Handle::current(), VizConfig::default());
    viz.refresh();
    step_until(&mut viz, "settled layout", |v| is_ready(v) && v.simulation().is_settled()).await;

    let sim = viz.simulation();
    let b = sim.index_of("2").expect("node 2");
    let (bx, by) = (sim.nodes()[b].x, sim.nodes()[b].y);
    let queue = viz.pointer_queue();
    queue.push(PointerEvent::Down { pointer: 9, x: bx, y: by });
    queue.push(PointerEvent::Move { pointer: 9, x: 20.0, y: 20.0 });
    viz.step();
    queue.push(PointerEvent::Up { pointer: 9 });
    for _ in 0..10 {
        viz.step();
    }
    let moved = &viz.simulation().nodes()[b];
    assert!(moved.pin.is_none());
    assert!((moved.x - 20.0).abs() + (moved.y - 20.0).abs() > 1.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unmount_closes_the_store_once() {
    let gate = Arc::new(Notify::new());
    let (store, counters) = ScriptedStore::new(vec![Script::gated(star(), &gate)]);
    let mut viz = Visualization::mount(store, Handle::current(), VizConfig::default());
    viz.refresh();
    wait_for("session opened", || counters.opened.load(Ordering::SeqCst) == 1).await;

    viz.unmount();
    wait_for("store closed", || counters.store_closed.load(Ordering::SeqCst) == 1).await;
    wait_for("session released", || counters.released.load(Ordering::SeqCst) == 1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(counters.store_closed.load(Ordering::SeqCst), 1);
}

// Hosts keep the view ahead of the runtime so its drop still reaches a live executor
#[test]
fn dropped_view_closes_the_store_on_its_fetch_runtime() {
    let runtime = FetchRuntime::new().expect("runtime");
    let (store, counters) = ScriptedStore::new(vec![]);
    let viz = Visualization::mount(store, runtime.handle(), VizConfig::default());
    drop(viz);
    runtime.block_on(wait_for("store closed", || counters.store_closed.load(Ordering::SeqCst) == 1));
    assert_eq!(counters.opened.load(Ordering::SeqCst), 0);
    drop(runtime);
}
