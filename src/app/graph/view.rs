use std::collections::HashMap;

use eframe::egui::{self, Align2, Color32, FontId, Pos2, Sense, Shape, Stroke, Ui, vec2};

use crate::layout::node_radius;
use crate::model::node::{LabelMode, Theme};
use crate::navigation::EdgeKind;
use crate::util::truncate_label;

use super::super::ViewModel;
use super::super::render_utils::{
    blend_color, circle_visible, dim_color, draw_background, edge_visible, node_fill, node_text,
    screen_radius, world_to_screen,
};

const LABEL_CHARS: usize = 28;

struct DrawNode {
    id: String,
    title: String,
    fill: Color32,
    text: Color32,
    position: Pos2,
    radius: f32,
    is_root: bool,
    is_selected: bool,
}

impl ViewModel {
    pub(in crate::app) fn draw_graph(&mut self, ui: &mut Ui) {
        let now = ui.input(|input| input.time);
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        self.canvas_size = rect.size();
        let painter = ui.painter_at(rect);

        self.handle_graph_zoom(ui, rect, &response, now);
        self.handle_graph_pan(&response, now);

        let pose = self.viewport.sample(now);
        let camera_moving = self.camera.is_animating();
        self.camera.sample(now);

        let settings = self.store.settings().clone();
        draw_background(&painter, rect, pose, settings.theme == Theme::Dark);

        let view = self.store.view().clone();
        let mut visible = self.store.visible_nodes();
        let cap = settings.performance_cap.max_visible_nodes.max(1);
        if visible.len() > cap {
            visible.truncate(cap);
        }

        let nodes = visible
            .iter()
            .map(|node| {
                let is_selected = view.selected_node_id.as_deref() == Some(node.id.as_str());
                let world = Self::world_position(node.position);
                DrawNode {
                    id: node.id.clone(),
                    title: node.title.clone(),
                    fill: node_fill(node.oklch()),
                    text: node_text(node.oklch()),
                    position: world_to_screen(rect, pose, world),
                    radius: screen_radius(node_radius(&node.title, is_selected), pose.zoom),
                    is_root: view.root_id.as_deref() == Some(node.id.as_str()),
                    is_selected,
                }
            })
            .collect::<Vec<_>>();
        let index_by_id = nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id.as_str(), index))
            .collect::<HashMap<_, _>>();

        let screen_positions = nodes.iter().map(|node| node.position).collect::<Vec<_>>();
        let screen_radii = nodes.iter().map(|node| node.radius).collect::<Vec<_>>();
        let hovered = Self::hovered_index(ui, &screen_positions, &screen_radii);
        let hovered_index = hovered.map(|(index, _)| index);
        if hovered.is_some() {
            ui.output_mut(|output| {
                output.cursor_icon = egui::CursorIcon::PointingHand;
            });
        }

        let edge_width = settings.performance_cap.edge_thickness.stroke_width();
        let (hierarchy_color, link_color) = match settings.theme {
            Theme::Dark => (
                Color32::from_rgba_unmultiplied(150, 156, 168, 170),
                Color32::from_rgb(103, 196, 255),
            ),
            Theme::Light => (
                Color32::from_rgba_unmultiplied(90, 96, 108, 170),
                Color32::from_rgb(36, 118, 196),
            ),
        };

        let mut visible_edge_count = 0usize;
        for edge in self.store.visible_edges() {
            let (Some(&src), Some(&dst)) = (
                index_by_id.get(edge.source.as_str()),
                index_by_id.get(edge.target.as_str()),
            ) else {
                continue;
            };
            let start = nodes[src].position;
            let end = nodes[dst].position;
            if !edge_visible(rect, start, end, 2.5) {
                continue;
            }

            let touches_hover = hovered_index.is_some_and(|index| index == src || index == dst);
            let width = if touches_hover { edge_width * 1.8 } else { edge_width };
            match edge.kind {
                EdgeKind::Hierarchy => {
                    painter.line_segment([start, end], Stroke::new(width, hierarchy_color));
                }
                EdgeKind::Link => {
                    painter.extend(Shape::dashed_line(
                        &[start, end],
                        Stroke::new(width, link_color),
                        7.0,
                        5.0,
                    ));
                }
            }
            visible_edge_count += 1;
        }
        self.visible_edge_count = visible_edge_count;

        if let Some(source) = self.store.link_source() {
            if let (Some(&index), Some(pointer)) = (
                index_by_id.get(source),
                ui.input(|input| input.pointer.hover_pos()),
            ) {
                painter.extend(Shape::dashed_line(
                    &[nodes[index].position, pointer],
                    Stroke::new(edge_width, link_color),
                    4.0,
                    4.0,
                ));
            }
        }

        let search_hits = self
            .search_hits
            .iter()
            .map(|hit| hit.id.as_str())
            .collect::<Vec<_>>();
        let searching = !search_hits.is_empty();
        let selected_color = Color32::from_rgb(245, 206, 93);
        let mut selection_animating = false;
        let mut visible_node_count = 0usize;

        for (index, node) in nodes.iter().enumerate() {
            if !circle_visible(rect, node.position, node.radius) {
                continue;
            }
            visible_node_count += 1;

            let is_hovered = hovered_index == Some(index);
            let is_match = search_hits.contains(&node.id.as_str());
            let base = if is_hovered {
                blend_color(node.fill, Color32::WHITE, 0.25)
            } else if searching && !is_match {
                dim_color(node.fill, 0.45)
            } else {
                node.fill
            };

            let selection_mix = ui.ctx().animate_bool(
                ui.make_persistent_id(("node-selection", node.id.as_str())),
                node.is_selected,
            );
            if selection_mix > 0.0 && selection_mix < 1.0 {
                selection_animating = true;
            }

            painter.circle_filled(node.position, node.radius, base);
            if selection_mix > 0.0 {
                painter.circle_stroke(
                    node.position,
                    node.radius + 4.0 + ((1.0 - selection_mix) * 6.0),
                    Stroke::new(1.0 + selection_mix * 1.6, selected_color),
                );
            }
            let outline = if node.is_root {
                Stroke::new(2.2, Color32::from_gray(235))
            } else if is_match {
                Stroke::new(1.8, link_color)
            } else {
                Stroke::new(1.0, Color32::from_rgba_unmultiplied(15, 15, 15, 190))
            };
            painter.circle_stroke(node.position, node.radius, outline);

            let should_draw_label = match settings.performance_cap.node_labels {
                LabelMode::Always => true,
                LabelMode::Hover => {
                    is_hovered || node.is_selected || node.is_root || !self.store.god_mode()
                }
                LabelMode::Never => is_hovered,
            };
            if should_draw_label {
                let label = truncate_label(&node.title, LABEL_CHARS);
                if node.radius > 28.0 {
                    painter.text(
                        node.position,
                        Align2::CENTER_CENTER,
                        label,
                        FontId::proportional(12.0),
                        node.text,
                    );
                } else {
                    painter.text(
                        node.position + vec2(node.radius + 5.0, 0.0),
                        Align2::LEFT_CENTER,
                        label,
                        FontId::proportional(12.0),
                        ui.visuals().strong_text_color(),
                    );
                }
            }
        }
        self.visible_node_count = visible_node_count;

        if let Some(message) = &self.layout_error {
            painter.text(
                rect.left_bottom() + vec2(10.0, -10.0),
                Align2::LEFT_BOTTOM,
                format!("layout failed: {message}"),
                FontId::proportional(13.0),
                Color32::from_rgb(241, 146, 94),
            );
        }

        if let Some((index, _)) = hovered {
            if let Some(node) = nodes.get(index) {
                painter.text(
                    rect.left_top() + vec2(10.0, 10.0),
                    Align2::LEFT_TOP,
                    node.title.as_str(),
                    FontId::proportional(13.0),
                    ui.visuals().strong_text_color(),
                );
            }
        }

        let hovered_id = hovered_index.and_then(|index| nodes.get(index).map(|node| node.id.clone()));
        if self.store.view().hovered_node_id != hovered_id {
            self.store.hover_node(hovered_id.as_deref());
        }
        self.apply_graph_click(&response, hovered_id);

        if selection_animating
            || self.viewport.is_active()
            || camera_moving
            || !self.layout_settled
            || response.dragged()
        {
            ui.ctx().request_repaint();
        }
    }
}
