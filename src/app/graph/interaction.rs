use eframe::egui::{self, Pos2, Rect, Ui};

use crate::camera::{ViewportPose, clamp_zoom};

use super::super::ViewModel;
use super::super::render_utils::screen_to_world;

impl ViewModel {
    /// Wheel zoom around the pointer. Cancels any running viewport transition.
    pub(in crate::app) fn handle_graph_zoom(
        &mut self,
        ui: &Ui,
        rect: Rect,
        response: &egui::Response,
        now: f64,
    ) {
        if !response.hovered() {
            return;
        }

        let scroll = ui.input(|input| input.raw_scroll_delta.y);
        if scroll.abs() <= f32::EPSILON {
            return;
        }

        let pose = self.viewport.sample(now);
        let pointer = ui
            .input(|input| input.pointer.hover_pos())
            .unwrap_or_else(|| rect.center());
        let world_before = screen_to_world(rect, pose, pointer);

        let zoom_factor = (1.0 + (scroll * 0.0018)).clamp(0.85, 1.15);
        let zoom = clamp_zoom(pose.zoom * zoom_factor);
        self.viewport.jump(ViewportPose {
            pan: pointer - rect.center() - (world_before * zoom),
            zoom,
        });
    }

    pub(in crate::app) fn handle_graph_pan(&mut self, response: &egui::Response, now: f64) {
        let dragging = response.dragged_by(egui::PointerButton::Secondary)
            || response.dragged_by(egui::PointerButton::Middle)
            || response.dragged_by(egui::PointerButton::Primary);
        if !dragging {
            return;
        }

        let delta = response.drag_delta();
        if delta.length_sq() <= f32::EPSILON {
            return;
        }
        let mut pose = self.viewport.sample(now);
        pose.pan += delta;
        self.viewport.jump(pose);
    }

    /// Closest node under the pointer, by screen distance.
    pub(in crate::app) fn hovered_index(
        ui: &Ui,
        screen_positions: &[Pos2],
        screen_radii: &[f32],
    ) -> Option<(usize, f32)> {
        let pointer_pos = ui.input(|input| input.pointer.hover_pos());
        pointer_pos.and_then(|pointer| {
            screen_positions
                .iter()
                .zip(screen_radii)
                .enumerate()
                .filter_map(|(index, (position, radius))| {
                    let distance = position.distance(pointer);
                    if distance <= *radius {
                        Some((index, distance))
                    } else {
                        None
                    }
                })
                .min_by(|a, b| a.1.total_cmp(&b.1))
        })
    }

    /// Single click selects (or links, in link mode); double click drills in.
    pub(in crate::app) fn apply_graph_click(
        &mut self,
        response: &egui::Response,
        hovered_id: Option<String>,
    ) {
        if response.double_clicked() {
            if let Some(id) = hovered_id {
                self.store.navigate_to(&id);
            }
            return;
        }

        if response.clicked_by(egui::PointerButton::Primary) {
            self.store.select_node(hovered_id.as_deref());
        }
    }
}
