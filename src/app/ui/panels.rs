use eframe::egui::{self, Align, Context, Layout, Vec2};

use crate::camera::{Animator, CameraRig, ViewportPose};
use crate::layout::LayoutWorker;
use crate::model::interchange::export_file_name;
use crate::model::node::Theme;
use crate::navigation::ancestor_path;
use crate::store::MindMapStore;

use super::super::ViewModel;

const DEFAULT_DOCUMENT_NAME: &str = "My Mind Map";

impl ViewModel {
    pub(in crate::app) fn new(mut store: MindMapStore) -> anyhow::Result<Self> {
        let events = store.subscribe();
        let worker = LayoutWorker::spawn()?;
        let camera = CameraRig::new(store.camera_pose());

        Ok(Self {
            store,
            events,
            worker,
            layout_dirty: true,
            layout_settled: false,
            layout_error: None,
            god_layout: None,
            viewport: Animator::new(ViewportPose::default()),
            saved_viewport: None,
            camera,
            fit_pending: true,
            canvas_size: Vec2::ZERO,
            search: String::new(),
            search_hits: Vec::new(),
            new_child_title: String::new(),
            draft: None,
            pending_delete: None,
            document_name: DEFAULT_DOCUMENT_NAME.to_owned(),
            export_path: export_file_name(DEFAULT_DOCUMENT_NAME),
            import_path: String::new(),
            replace_on_import: false,
            status: None,
            visible_node_count: 0,
            visible_edge_count: 0,
        })
    }

    pub(in crate::app) fn show(&mut self, ctx: &Context) {
        let now = ctx.input(|input| input.time);
        self.sync_layout(now);

        let visuals = match self.store.settings().theme {
            Theme::Dark => egui::Visuals::dark(),
            Theme::Light => egui::Visuals::light(),
        };
        ctx.set_visuals(visuals);

        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("mindmapper");
                    ui.separator();
                    self.draw_breadcrumb(ui);
                    ui.separator();

                    let at_top = self
                        .store
                        .root_id()
                        .and_then(|id| self.store.node(id))
                        .is_none_or(|root| root.is_structural_root());
                    if ui
                        .add_enabled(!at_top, egui::Button::new("Up"))
                        .on_hover_text("Go to the parent node")
                        .clicked()
                    {
                        self.store.go_to_parent();
                    }

                    let god_label = if self.store.god_mode() {
                        "Leave God Mode"
                    } else {
                        "God Mode"
                    };
                    if ui.button(god_label).clicked() {
                        self.store.toggle_god_mode();
                    }
                    if ui.button("Recenter").clicked() {
                        self.recenter(now);
                    }

                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        ui.label(format!(
                            "nodes: {} / {}  edges: {}",
                            self.visible_node_count,
                            self.store.len(),
                            self.visible_edge_count
                        ));
                        let layout_state = if self.layout_error.is_some() {
                            "layout failed"
                        } else if self.layout_settled {
                            "layout settled"
                        } else {
                            "laying out..."
                        };
                        ui.label(layout_state);
                        if let Some(layout) = &self.god_layout {
                            let extent = layout.bounds.extent();
                            ui.label(format!(
                                "radial: {} nodes, {:.0} x {:.0}",
                                layout.len(),
                                extent[0],
                                extent[1]
                            ));
                        }
                        if self.store.link_source().is_some() {
                            ui.colored_label(
                                egui::Color32::from_rgb(103, 196, 255),
                                "link mode: click a node",
                            );
                        }
                    });
                });
            });

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(300.0)
            .show(ctx, |ui| self.draw_controls(ui, now));

        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| self.draw_details(ui));

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                if self.store.is_empty() {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("The mind map is empty");
                        ui.add_space(8.0);
                        ui.label("Create a node or import a document from the left panel.");
                    });
                } else {
                    self.draw_graph(ui);
                }
            });

        if ctx.input(|input| input.key_pressed(egui::Key::Escape)) {
            if let Some(source) = self.store.link_source().map(str::to_owned) {
                self.store.toggle_link_mode(&source);
            } else {
                self.store.select_node(None);
            }
        }
    }

    fn draw_breadcrumb(&mut self, ui: &mut egui::Ui) {
        let Some(root_id) = self.store.root_id() else {
            ui.label("(empty)");
            return;
        };
        let crumbs = ancestor_path(self.store.nodes(), root_id)
            .into_iter()
            .map(|node| (node.id.clone(), node.title.clone()))
            .collect::<Vec<_>>();

        let last = crumbs.len().saturating_sub(1);
        let mut target = None;
        for (index, (id, title)) in crumbs.iter().enumerate() {
            if index > 0 {
                ui.label("›");
            }
            if index == last {
                ui.strong(title.as_str());
            } else if ui.link(title.as_str()).clicked() {
                target = Some(id.clone());
            }
        }

        if let Some(id) = target {
            self.store.navigate_to(&id);
        }
    }
}
