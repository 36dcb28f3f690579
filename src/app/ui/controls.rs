use std::fs;

use eframe::egui::{self, Key, RichText, Ui};
use log::info;

use crate::model::interchange::export_file_name;
use crate::model::node::{EdgeThickness, LabelMode, Theme};

use super::super::ViewModel;

const SEARCH_ROWS: usize = 30;

impl ViewModel {
    pub(in crate::app) fn draw_controls(&mut self, ui: &mut Ui, now: f64) {
        egui::ScrollArea::vertical()
            .id_salt("controls_scroll")
            .auto_shrink([false, false])
            .show(ui, |ui| {
                self.draw_create_section(ui);
                ui.separator();
                self.draw_search_section(ui);
                ui.separator();
                self.draw_layout_section(ui, now);
                ui.separator();
                self.draw_display_section(ui);
                ui.separator();
                self.draw_file_section(ui);

                if let Some(status) = &self.status {
                    ui.separator();
                    ui.label(status.as_str());
                }
            });
    }

    fn draw_create_section(&mut self, ui: &mut Ui) {
        ui.label(RichText::new("New node").strong());

        let parent_id = self
            .store
            .view()
            .selected_node_id
            .clone()
            .or_else(|| self.store.root_id().map(str::to_owned));
        let parent_title = parent_id
            .as_deref()
            .and_then(|id| self.store.node(id))
            .map(|node| node.title.clone());
        match &parent_title {
            Some(title) => ui.small(format!("under: {title}")),
            None => ui.small("becomes the root"),
        };

        let mut submit = false;
        ui.horizontal(|ui| {
            let response = ui.add(
                egui::TextEdit::singleline(&mut self.new_child_title)
                    .hint_text("Title")
                    .desired_width(180.0),
            );
            if response.lost_focus() && ui.input(|input| input.key_pressed(Key::Enter)) {
                submit = true;
            }
            if ui.button("Add").clicked() {
                submit = true;
            }
        });

        if submit {
            match self
                .store
                .create_node(&self.new_child_title, parent_id.as_deref(), None)
            {
                Ok(id) => {
                    self.new_child_title.clear();
                    self.store.select_node(Some(&id));
                    self.status = None;
                }
                Err(error) => self.status = Some(error.to_string()),
            }
        }
    }

    fn draw_search_section(&mut self, ui: &mut Ui) {
        ui.label(RichText::new("Search").strong());
        let response = ui.add(
            egui::TextEdit::singleline(&mut self.search)
                .hint_text("Title, body or tag")
                .desired_width(f32::INFINITY),
        );
        if response.changed() {
            self.search_hits = self.store.search_nodes(&self.search);
        }
        if self.search.trim().is_empty() {
            return;
        }

        if self.search_hits.is_empty() {
            ui.small("No matches.");
            return;
        }

        let rows = self
            .search_hits
            .iter()
            .take(SEARCH_ROWS)
            .filter_map(|hit| {
                self.store
                    .node(&hit.id)
                    .map(|node| (node.id.clone(), node.title.clone(), node.parent_id.clone()))
            })
            .collect::<Vec<_>>();

        let mut picked = None;
        for (id, title, parent_id) in rows {
            if ui.link(title).clicked() {
                picked = Some((id, parent_id));
            }
        }
        if self.search_hits.len() > SEARCH_ROWS {
            ui.small(format!("{} more", self.search_hits.len() - SEARCH_ROWS));
        }

        if let Some((id, parent_id)) = picked {
            self.reveal(&id, parent_id.as_deref());
        }
    }

    /// Navigates so that `id` is on screen, then selects it.
    fn reveal(&mut self, id: &str, parent_id: Option<&str>) {
        let on_screen = self.store.visible_nodes().iter().any(|node| node.id == id);
        if !on_screen {
            self.store.navigate_to(parent_id.unwrap_or(id));
        }
        self.store.select_node(Some(id));
    }

    fn draw_layout_section(&mut self, ui: &mut Ui, now: f64) {
        ui.label(RichText::new("Layout").strong());

        let mut god_mode = self.store.god_mode();
        if ui.checkbox(&mut god_mode, "God Mode").changed() {
            self.store.set_god_mode(god_mode);
        }

        let mut auto_layout = self.store.auto_layout();
        if ui
            .checkbox(&mut auto_layout, "Auto layout")
            .on_hover_text("Run the force simulation in normal mode")
            .changed()
        {
            self.store.toggle_auto_layout();
            self.layout_dirty = true;
        }

        let mut settings = self.store.settings().clone();
        let defaults = &mut settings.layout_defaults;
        let mut changed = false;
        changed |= ui
            .add(egui::Slider::new(&mut defaults.link_strength, 0.0..=1.0).text("link strength"))
            .changed();
        changed |= ui
            .add(
                egui::Slider::new(&mut defaults.collision_radius, 0.5..=5.0)
                    .text("collision radius"),
            )
            .changed();
        changed |= ui
            .add(
                egui::Slider::new(&mut defaults.center_strength, 0.0..=0.2)
                    .text("center strength"),
            )
            .changed();
        if changed {
            self.store.update_settings(settings);
            self.layout_dirty = true;
        }

        ui.horizontal(|ui| {
            if ui.button("Re-run layout").clicked() {
                self.layout_dirty = true;
            }
            if ui.button("Recenter").clicked() {
                self.recenter(now);
            }
        });
    }

    fn draw_display_section(&mut self, ui: &mut Ui) {
        ui.label(RichText::new("Display").strong());

        let mut settings = self.store.settings().clone();
        let before = settings.clone();

        ui.horizontal(|ui| {
            ui.label("Theme");
            ui.selectable_value(&mut settings.theme, Theme::Dark, "dark");
            ui.selectable_value(&mut settings.theme, Theme::Light, "light");
        });

        let cap = &mut settings.performance_cap;
        egui::ComboBox::from_label("labels")
            .selected_text(match cap.node_labels {
                LabelMode::Always => "always",
                LabelMode::Hover => "hover",
                LabelMode::Never => "never",
            })
            .show_ui(ui, |ui| {
                ui.selectable_value(&mut cap.node_labels, LabelMode::Always, "always");
                ui.selectable_value(&mut cap.node_labels, LabelMode::Hover, "hover");
                ui.selectable_value(&mut cap.node_labels, LabelMode::Never, "never");
            });
        egui::ComboBox::from_label("edges")
            .selected_text(match cap.edge_thickness {
                EdgeThickness::Thick => "thick",
                EdgeThickness::Normal => "normal",
                EdgeThickness::Thin => "thin",
            })
            .show_ui(ui, |ui| {
                ui.selectable_value(&mut cap.edge_thickness, EdgeThickness::Thick, "thick");
                ui.selectable_value(&mut cap.edge_thickness, EdgeThickness::Normal, "normal");
                ui.selectable_value(&mut cap.edge_thickness, EdgeThickness::Thin, "thin");
            });
        ui.add(
            egui::Slider::new(&mut cap.max_visible_nodes, 10..=5000)
                .logarithmic(true)
                .text("max nodes"),
        );
        ui.checkbox(&mut settings.motion_reduced, "Reduce motion");

        if settings != before {
            self.store.update_settings(settings);
        }
    }

    fn draw_file_section(&mut self, ui: &mut Ui) {
        ui.label(RichText::new("Import / export").strong());

        ui.horizontal(|ui| {
            ui.label("Name");
            if ui.text_edit_singleline(&mut self.document_name).changed() {
                self.export_path = export_file_name(&self.document_name);
            }
        });
        ui.horizontal(|ui| {
            ui.text_edit_singleline(&mut self.export_path);
            if ui.button("Export").clicked() {
                self.status = Some(match self.export_to_file() {
                    Ok(message) => message,
                    Err(error) => format!("Export failed: {error:#}"),
                });
            }
        });

        ui.add_space(4.0);
        ui.horizontal(|ui| {
            ui.add(egui::TextEdit::singleline(&mut self.import_path).hint_text("path/to/map.json"));
            if ui.button("Import").clicked() {
                self.status = Some(match self.import_from_file() {
                    Ok(message) => message,
                    Err(error) => format!("Import failed: {error:#}"),
                });
            }
        });
        ui.checkbox(&mut self.replace_on_import, "Replace current map");
    }

    fn export_to_file(&self) -> anyhow::Result<String> {
        let document = self.store.export_document(&self.document_name, None)?;
        let json = document.to_json()?;
        fs::write(&self.export_path, json)?;
        info!("exported {} nodes to {}", document.nodes.len(), self.export_path);
        Ok(format!(
            "Exported {} nodes to {}",
            document.nodes.len(),
            self.export_path
        ))
    }

    fn import_from_file(&mut self) -> anyhow::Result<String> {
        let raw = fs::read_to_string(self.import_path.trim())?;
        let summary = self.store.import_json(&raw, self.replace_on_import)?;
        self.search_hits.clear();
        self.search.clear();
        Ok(format!(
            "Imported {} nodes ({} skipped)",
            summary.imported, summary.skipped
        ))
    }
}
