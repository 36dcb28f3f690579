use std::fs;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::thread;

use anyhow::Context as _;
use eframe::egui::{self, Context, Vec2};
use log::info;

use crate::camera::{Animator, CameraRig, ViewportPose};
use crate::layout::{GodLayout, LayoutWorker};
use crate::store::{
    JsonFilePersistence, MemoryPersistence, MindMapStore, OpenOptions, Persistence, SearchHit,
    StoreEvent,
};

mod graph;
mod render_utils;
mod ui;

/// How to open the store at startup.
#[derive(Clone, Debug, Default)]
pub struct LaunchOptions {
    /// JSON file store directory; in-memory when `None`.
    pub data_dir: Option<PathBuf>,
    pub open: OpenOptions,
    pub import: Option<PathBuf>,
    pub replace_on_import: bool,
    pub god_mode: bool,
}

impl LaunchOptions {
    pub fn open_store(&self) -> anyhow::Result<MindMapStore> {
        let persistence: Box<dyn Persistence + Send> = match &self.data_dir {
            Some(dir) => Box::new(JsonFilePersistence::open(dir)?),
            None => Box::new(MemoryPersistence::new()),
        };
        let mut store = MindMapStore::open(persistence, self.open)?;

        if let Some(path) = &self.import {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let summary = store
                .import_json(&raw, self.replace_on_import)
                .with_context(|| format!("failed to import {}", path.display()))?;
            info!(
                "imported {} nodes from {} ({} skipped)",
                summary.imported,
                path.display(),
                summary.skipped
            );
        }
        if self.god_mode {
            store.set_god_mode(true);
        }
        Ok(store)
    }
}

pub struct MindMapApp {
    launch: LaunchOptions,
    state: AppState,
}

enum AppState {
    Loading {
        rx: Receiver<Result<MindMapStore, String>>,
    },
    Ready(Box<ViewModel>),
    Error(String),
}

struct ViewModel {
    store: MindMapStore,
    events: Receiver<StoreEvent>,
    worker: LayoutWorker,
    layout_dirty: bool,
    layout_settled: bool,
    layout_error: Option<String>,
    god_layout: Option<GodLayout>,
    viewport: Animator<ViewportPose>,
    saved_viewport: Option<ViewportPose>,
    camera: CameraRig,
    fit_pending: bool,
    canvas_size: Vec2,
    search: String,
    search_hits: Vec<SearchHit>,
    new_child_title: String,
    draft: Option<NodeDraft>,
    pending_delete: Option<String>,
    document_name: String,
    export_path: String,
    import_path: String,
    replace_on_import: bool,
    status: Option<String>,
    visible_node_count: usize,
    visible_edge_count: usize,
}

/// Edit buffers for the selected node.
struct NodeDraft {
    id: String,
    title: String,
    body: String,
    tags: String,
}

impl MindMapApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, launch: LaunchOptions) -> Self {
        let state = Self::start_load(launch.clone());
        Self { launch, state }
    }

    fn spawn_load(launch: LaunchOptions) -> Receiver<Result<MindMapStore, String>> {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let result = launch.open_store().map_err(|error| format!("{error:#}"));
            let _ = tx.send(result);
        });

        rx
    }

    fn start_load(launch: LaunchOptions) -> AppState {
        AppState::Loading {
            rx: Self::spawn_load(launch),
        }
    }
}

impl eframe::App for MindMapApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut transition = None;

        match &mut self.state {
            AppState::Loading { rx } => {
                if let Ok(result) = rx.try_recv() {
                    transition = Some(match result.and_then(|store| {
                        ViewModel::new(store).map_err(|error| format!("{error:#}"))
                    }) {
                        Ok(model) => AppState::Ready(Box::new(model)),
                        Err(error) => AppState::Error(error),
                    });
                }

                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Opening mind map...");
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
                ctx.request_repaint();
            }
            AppState::Error(error) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to open the mind map");
                    ui.add_space(6.0);
                    ui.label(error.as_str());
                    ui.add_space(10.0);
                    if ui.button("Retry").clicked() {
                        transition = Some(Self::start_load(self.launch.clone()));
                    }
                });
            }
            AppState::Ready(model) => model.show(ctx),
        }

        if let Some(next_state) = transition {
            self.state = next_state;
        }
    }
}
