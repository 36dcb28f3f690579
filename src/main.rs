use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, anyhow};
use clap::Parser;
use log::warn;

use mindmapper::app::{LaunchOptions, MindMapApp};
use mindmapper::layout::{ForceConfig, LayoutUpdate, LayoutWorker};
use mindmapper::store::{MindMapStore, OpenOptions};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Directory holding nodes.json, settings.json and session.json.
    #[arg(long, default_value = "mindmap-data")]
    data_dir: PathBuf,
    /// Keep everything in memory; nothing is written to disk.
    #[arg(long)]
    memory: bool,
    #[arg(long)]
    god_mode: bool,
    /// Import a mind map document on startup (merges unless --replace).
    #[arg(long, value_name = "FILE")]
    import: Option<PathBuf>,
    #[arg(long, requires = "import")]
    replace: bool,
    /// Print the current view and its layout instead of opening a window.
    #[arg(long)]
    headless: bool,
    /// Start an empty map with a small example tree.
    #[arg(long)]
    seed_demo: bool,
}

impl Args {
    fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            data_dir: (!self.memory).then(|| self.data_dir.clone()),
            open: OpenOptions {
                seed_demo: self.seed_demo,
                rng_seed: None,
            },
            import: self.import.clone(),
            replace_on_import: self.replace,
            god_mode: self.god_mode,
        }
    }
}

const HEADLESS_TIMEOUT: Duration = Duration::from_secs(10);

fn run_headless(store: &mut MindMapStore) -> anyhow::Result<()> {
    println!("breadcrumb: {}", store.breadcrumb().join(" › "));
    println!(
        "mode: {}",
        if store.god_mode() { "god" } else { "normal" }
    );

    let visible = store.visible_nodes();
    println!("visible nodes: {}", visible.len());
    for node in &visible {
        let marker = if store.root_id() == Some(node.id.as_str()) {
            "*"
        } else {
            "-"
        };
        println!("  {marker} {} ({})", node.title, node.id);
    }
    println!("visible edges: {}", store.visible_edges().len());

    let mut worker = LayoutWorker::spawn()?;
    if store.god_mode() {
        let (root_id, nodes) = store.god_input().ok_or_else(|| anyhow!("nothing to lay out"))?;
        worker.request_god(&root_id, nodes);
    } else {
        let (nodes, links) = store.simulation_input();
        let config = ForceConfig::from_settings(&store.settings().layout_defaults);
        worker.request_normal(nodes, links, config);
    }

    loop {
        let update = worker
            .wait(HEADLESS_TIMEOUT)
            .context("layout did not finish in time")?;
        match update {
            LayoutUpdate::God { layout, .. } => {
                let extent = layout.bounds.extent();
                println!(
                    "god layout: {} nodes, extent {:.2} x {:.2} x {:.2}",
                    layout.len(),
                    extent[0],
                    extent[1],
                    extent[2]
                );
                return Ok(());
            }
            LayoutUpdate::GodError { message, .. } => {
                return Err(anyhow!("god layout failed: {message}"));
            }
            LayoutUpdate::Positions {
                positions, settled, ..
            } => {
                store.apply_positions(&positions);
                if settled {
                    println!("force layout settled for {} nodes", positions.len());
                    let mut rows = positions.iter().collect::<Vec<_>>();
                    rows.sort_by(|a, b| a.0.cmp(b.0));
                    for (id, p) in rows {
                        println!("  {id}: ({:.2}, {:.2}, {:.2})", p.x, p.y, p.z);
                    }
                    return Ok(());
                }
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    if let Err(error) = env_logger::builder().format_timestamp(None).try_init() {
        eprintln!("logger already initialised: {error}");
    }

    let args = Args::parse();
    let launch = args.launch_options();

    if args.headless {
        let mut store = launch.open_store()?;
        return run_headless(&mut store);
    }

    if args.memory {
        warn!("running with an in-memory store; changes are lost on exit");
    }
    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    eframe::run_native(
        "mindmapper",
        options,
        Box::new(move |cc| Ok(Box::new(MindMapApp::new(cc, launch)))),
    )
    .map_err(|error| anyhow!("window closed with an error: {error}"))
}
