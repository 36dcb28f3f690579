use std::collections::HashMap;

use eframe::egui::{Vec2, vec2};
use log::{debug, warn};

use crate::camera::{
    DRILL_DURATION_SECS, Easing, FIT_DURATION_SECS, RESTORE_DURATION_SECS, fit_viewport,
};
use crate::layout::{ForceConfig, GodLayout, LayoutUpdate};
use crate::model::Position3;
use crate::store::StoreEvent;

use super::super::ViewModel;

impl ViewModel {
    /// Drains store events, re-requests layouts when the visible set changed
    /// and applies whatever the worker has finished.
    pub(in crate::app) fn sync_layout(&mut self, now: f64) {
        let mut god_mode_changed = None;
        for event in self.events.try_iter() {
            if event.invalidates_layout() {
                self.layout_dirty = true;
            }
            match event {
                StoreEvent::RootChanged { .. } => self.fit_pending = true,
                StoreEvent::GodModeChanged(enabled) => god_mode_changed = Some(enabled),
                _ => {}
            }
        }

        match god_mode_changed {
            Some(true) => self.fit_pending = true,
            Some(false) => self.leave_god_mode(now),
            None => {}
        }

        if self.layout_dirty {
            self.layout_dirty = false;
            self.request_layout();
        }

        for update in self.worker.poll() {
            self.apply_update(update, now);
        }
    }

    pub(in crate::app) fn request_layout(&mut self) {
        self.layout_error = None;
        self.layout_settled = false;

        if self.store.god_mode() {
            match self.store.god_input() {
                Some((root_id, nodes)) => {
                    self.worker.request_god(&root_id, nodes);
                }
                None => self.worker.stop(),
            }
            return;
        }

        self.god_layout = None;
        if !self.store.auto_layout() {
            self.worker.stop();
            self.layout_settled = true;
            return;
        }

        let (nodes, links) = self.store.simulation_input();
        if nodes.is_empty() {
            self.worker.stop();
            return;
        }
        let config = ForceConfig::from_settings(&self.store.settings().layout_defaults);
        self.worker.request_normal(nodes, links, config);
    }

    fn apply_update(&mut self, update: LayoutUpdate, now: f64) {
        match update {
            LayoutUpdate::God { layout, .. } => {
                let positions = layout
                    .positions
                    .iter()
                    .map(|(id, p)| (id.clone(), Position3::new(p.x, p.y, p.z)))
                    .collect::<HashMap<_, _>>();
                self.store.apply_positions(&positions);
                if self.fit_pending {
                    self.enter_god_mode(&layout, now);
                }
                self.god_layout = Some(layout);
                self.layout_settled = true;
            }
            LayoutUpdate::GodError { message, .. } => {
                warn!("god mode layout failed: {message}");
                self.layout_error = Some(message);
                self.layout_settled = true;
            }
            LayoutUpdate::Positions {
                positions, settled, ..
            } => {
                self.store.apply_positions(&positions);
                self.layout_settled = settled;
                if self.fit_pending {
                    self.fit_pending = false;
                    self.focus_camera(positions.values().copied(), now);
                    self.fit_to(positions.values().copied(), DRILL_DURATION_SECS, now);
                }
            }
        }
    }

    fn enter_god_mode(&mut self, layout: &GodLayout, now: f64) {
        self.fit_pending = false;
        self.camera.enter_god_mode(layout, now);
        if let Some(pose) = self.camera.saved_pose() {
            self.store.remember_camera(pose);
        }
        if self.saved_viewport.is_none() {
            self.saved_viewport = Some(self.viewport.sample(now));
        }
        let points = layout
            .positions
            .values()
            .map(|p| Position3::new(p.x, p.y, p.z));
        self.fit_to(points, FIT_DURATION_SECS, now);
    }

    fn leave_god_mode(&mut self, now: f64) {
        self.camera.leave_god_mode(now);
        self.god_layout = None;
        match self.saved_viewport.take() {
            Some(saved) => {
                self.viewport
                    .start(saved, RESTORE_DURATION_SECS, Easing::EaseOutCubic, now);
            }
            None => self.fit_pending = true,
        }
        debug!("left god mode");
    }

    fn focus_camera(&mut self, points: impl Iterator<Item = Position3>, now: f64) {
        let points = points.collect::<Vec<_>>();
        if points.is_empty() {
            return;
        }
        let count = points.len() as f32;
        let center = points.iter().fold(Position3::ZERO, |sum, p| {
            Position3::new(sum.x + p.x / count, sum.y + p.y / count, sum.z + p.z / count)
        });
        let radius = points
            .iter()
            .map(|p| ((p.x - center.x).powi(2) + (p.y - center.y).powi(2)).sqrt())
            .fold(0.0_f32, f32::max);
        self.camera.focus(center, radius, now);
    }

    /// Animates the canvas so every point is in view.
    pub(in crate::app) fn fit_to(
        &mut self,
        points: impl IntoIterator<Item = Position3>,
        duration_secs: f64,
        now: f64,
    ) {
        let size = if self.canvas_size.x > 0.0 && self.canvas_size.y > 0.0 {
            self.canvas_size
        } else {
            vec2(800.0, 600.0)
        };
        let points = points.into_iter().map(|p| vec2(p.x, p.y));
        if let Some(pose) = fit_viewport(points, size) {
            self.viewport
                .start(pose, duration_secs, Easing::EaseOutCubic, now);
        }
    }

    /// Re-fits whatever is on screen right now.
    pub(in crate::app) fn recenter(&mut self, now: f64) {
        let points = self
            .store
            .visible_nodes()
            .iter()
            .filter_map(|node| node.position)
            .collect::<Vec<_>>();
        self.fit_to(points, DRILL_DURATION_SECS, now);
    }

    pub(in crate::app) fn world_position(position: Option<Position3>) -> Vec2 {
        position.map(|p| vec2(p.x, p.y)).unwrap_or(Vec2::ZERO)
    }
}
