// loomctl: fetch the crawl graph once, lay it out headless and print the frame as JSON
// Build with: cargo build --features cli --bin loomctl

use clap::{Arg, ArgAction, Command, value_parser};
use log::warn;

use crawl_loom::fetch::FetchRuntime;
use crawl_loom::fetch::fetcher::fetch_graph;
use crawl_loom::layout::render::RenderFrame;
use crawl_loom::layout::simulation::ForceSimulation;
use crawl_loom::persistence::settings::VizSettings;
use crawl_loom::store::GraphStore;
use crawl_loom::store::neo4j::Neo4jStore;

struct RunOptions {
    uri: Option<String>,
    ticks: u64,
    width: Option<f64>,
    height: Option<f64>,
    pretty: bool,
}

fn run(opts: RunOptions) -> anyhow::Result<()> {
    let mut settings = VizSettings::load().unwrap_or_else(|e| {
        warn!("settings unavailable, using defaults: {:#}", e);
        VizSettings::default()
    });
    if let Some(uri) = opts.uri {
        settings.store_uri = Some(uri);
    }
    let connection = settings.connection_config()?;
    let runtime = FetchRuntime::new()?;
    let store = Neo4jStore::new(connection);

    let fetched = runtime.block_on(fetch_graph(&store));
    if let Err(e) = runtime.block_on(store.close()) {
        warn!("{}", e);
    }
    let model = fetched?;

    let width = opts.width.unwrap_or(settings.viewport_width);
    let height = opts.height.unwrap_or(settings.viewport_height);
    let mut sim = ForceSimulation::new(&model, settings.simulation.clone(), width, height);
    while sim.tick_count() < opts.ticks && !sim.is_settled() {
        sim.tick();
    }

    let frame = RenderFrame::project(&sim);
    let out = if opts.pretty {
        serde_json::to_string_pretty(&frame)?
    } else {
        serde_json::to_string(&frame)?
    };
    println!("{}", out);
    Ok(())
}

fn main() {
    env_logger::init();
    let matches = Command::new("loomctl")
        .about("Crawl-Loom headless layout: fetch the graph, run the simulation, print the render frame")
        .arg(Arg::new("uri").long("uri").value_name("URI").help("Graph store URI (overrides settings and CRAWL_LOOM_URI)"))
        .arg(
            Arg::new("ticks")
                .short('t')
                .long("ticks")
                .value_parser(value_parser!(u64))
                .default_value("1000")
                .help("Maximum ticks to run; stops early once settled"),
        )
        .arg(Arg::new("width").long("width").value_parser(value_parser!(f64)).help("Viewport width"))
        .arg(Arg::new("height").long("height").value_parser(value_parser!(f64)).help("Viewport height"))
        .arg(Arg::new("pretty").short('p').long("pretty").action(ArgAction::SetTrue).help("Pretty-print the JSON frame"))
        .get_matches();

    let opts = RunOptions {
        uri: matches.get_one::<String>("uri").cloned(),
        ticks: matches.get_one::<u64>("ticks").copied().unwrap_or(1000),
        width: matches.get_one::<f64>("width").copied(),
        height: matches.get_one::<f64>("height").copied(),
        pretty: matches.get_flag("pretty"),
    };

    if let Err(e) = run(opts) {
        eprintln!("loomctl: {:#}", e);
        std::process::exit(1);
    }
}
