use eframe::egui::{self, Color32, RichText, Sense, Ui, vec2};

use crate::model::{ChildIndex, NodePatch};

use super::super::render_utils::node_fill;
use super::super::{NodeDraft, ViewModel};

impl ViewModel {
    pub(in crate::app) fn draw_details(&mut self, ui: &mut Ui) {
        ui.heading("Node");
        ui.add_space(6.0);

        let target_id = self
            .store
            .view()
            .selected_node_id
            .clone()
            .or_else(|| self.store.root_id().map(str::to_owned));
        let Some(target_id) = target_id else {
            ui.label("Nothing to show yet.");
            return;
        };
        let Some(node) = self.store.node(&target_id).cloned() else {
            ui.label("Selected node no longer exists.");
            return;
        };

        if self.draft.as_ref().is_none_or(|draft| draft.id != node.id) {
            self.draft = Some(NodeDraft {
                id: node.id.clone(),
                title: node.title.clone(),
                body: node.body.clone().unwrap_or_default(),
                tags: node.tags.join(", "),
            });
            self.pending_delete = None;
        }

        let is_view_root = self.store.root_id() == Some(node.id.as_str());
        let (child_count, subtree_size) = {
            let index = ChildIndex::new(self.store.nodes());
            (
                index.children_of(&node.id).len(),
                index.descendants(&node.id).len() + 1,
            )
        };

        ui.horizontal(|ui| {
            let (swatch, _) = ui.allocate_exact_size(vec2(16.0, 16.0), Sense::hover());
            ui.painter().circle_filled(swatch.center(), 7.0, node_fill(node.oklch()));
            ui.label(RichText::new(node.title.as_str()).strong());
        });
        ui.small(node.id.as_str());
        ui.label(format!("children: {child_count}  subtree: {subtree_size}"));
        if is_view_root {
            ui.small("current navigation root");
        }
        ui.add_space(6.0);

        let mut save = false;
        if let Some(draft) = self.draft.as_mut() {
            ui.label("Title");
            ui.text_edit_singleline(&mut draft.title);
            ui.label("Body");
            ui.add(
                egui::TextEdit::multiline(&mut draft.body)
                    .desired_rows(5)
                    .desired_width(f32::INFINITY),
            );
            ui.label("Tags");
            ui.add(egui::TextEdit::singleline(&mut draft.tags).hint_text("comma, separated"));
            save = ui.button("Save").clicked();
        }
        if save {
            self.save_draft();
        }

        ui.separator();
        ui.horizontal(|ui| {
            if !is_view_root && ui.button("Open").clicked() {
                self.store.navigate_to(&node.id);
            }
            if ui
                .button("Recolor subtree")
                .on_hover_text("Pick a new color and re-derive every descendant")
                .clicked()
            {
                if let Err(error) = self.store.recolor_subtree(&node.id) {
                    self.status = Some(error.to_string());
                }
            }
        });

        ui.separator();
        ui.label(RichText::new("Links").strong());
        let linking_from_here = self.store.link_source() == Some(node.id.as_str());
        let link_label = if linking_from_here {
            "Cancel linking"
        } else {
            "Link to..."
        };
        if ui
            .button(link_label)
            .on_hover_text("Then click another node in the graph")
            .clicked()
        {
            self.store.toggle_link_mode(&node.id);
        }

        let links = node
            .links
            .iter()
            .map(|target| {
                let title = self
                    .store
                    .node(target)
                    .map(|linked| linked.title.clone())
                    .unwrap_or_else(|| target.clone());
                (target.clone(), title)
            })
            .collect::<Vec<_>>();
        if links.is_empty() {
            ui.small("No links.");
        }
        let mut unlink = None;
        for (target, title) in &links {
            ui.horizontal(|ui| {
                ui.label(title.as_str());
                if ui.small_button("x").on_hover_text("Remove link").clicked() {
                    unlink = Some(target.clone());
                }
            });
        }
        if let Some(target) = unlink {
            if let Err(error) = self.store.remove_link(&node.id, &target) {
                self.status = Some(error.to_string());
            }
        }

        ui.separator();
        if self.pending_delete.as_deref() == Some(node.id.as_str()) {
            let warning = if node.is_structural_root() {
                "This clears the whole map.".to_owned()
            } else {
                format!("This removes {subtree_size} nodes.")
            };
            ui.colored_label(Color32::from_rgb(241, 146, 94), warning);
            ui.horizontal(|ui| {
                if ui.button("Delete").clicked() {
                    self.pending_delete = None;
                    self.draft = None;
                    if let Err(error) = self.store.delete_node(&node.id) {
                        self.status = Some(error.to_string());
                    }
                }
                if ui.button("Cancel").clicked() {
                    self.pending_delete = None;
                }
            });
        } else if ui.button("Delete...").clicked() {
            self.pending_delete = Some(node.id.clone());
        }
    }

    fn save_draft(&mut self) {
        let Some(draft) = &self.draft else {
            return;
        };
        let body = draft.body.trim();
        let patch = NodePatch {
            title: Some(draft.title.clone()),
            body: Some((!body.is_empty()).then(|| body.to_owned())),
            tags: Some(
                draft
                    .tags
                    .split(',')
                    .map(str::trim)
                    .filter(|tag| !tag.is_empty())
                    .map(str::to_owned)
                    .collect(),
            ),
            links: None,
        };
        let id = draft.id.clone();
        self.status = match self.store.update_node(&id, patch) {
            Ok(()) => None,
            Err(error) => Some(error.to_string()),
        };
    }
}
