//! Camera and viewport transitions.
//!
//! A transition is a pure function of elapsed time. The animator owns at most
//! one transition: starting a new one samples the current pose and replaces
//! the old transition, so two animations never fight over the same camera.

use eframe::egui::Vec2;

use crate::layout::GodLayout;
use crate::model::Position3;

pub const FIT_DURATION_SECS: f64 = 1.0;
pub const RESTORE_DURATION_SECS: f64 = 0.8;
pub const DRILL_DURATION_SECS: f64 = 0.6;
pub const DEFAULT_FOV_DEGREES: f32 = 60.0;

const MIN_FIT_DISTANCE: f32 = 10.0;
const FIT_MARGIN: f32 = 1.2;
const MIN_ZOOM: f32 = 0.05;
const MAX_ZOOM: f32 = 400.0;

pub trait Lerp: Copy {
    fn lerp(self, other: Self, t: f32) -> Self;
}

impl Lerp for f32 {
    fn lerp(self, other: Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

impl Lerp for Vec2 {
    fn lerp(self, other: Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

impl Lerp for Position3 {
    fn lerp(self, other: Self, t: f32) -> Self {
        Position3::new(
            self.x.lerp(other.x, t),
            self.y.lerp(other.y, t),
            self.z.lerp(other.z, t),
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraPose {
    pub position: Position3,
    pub target: Position3,
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            position: Position3::new(5.0, 5.0, 5.0),
            target: Position3::ZERO,
        }
    }
}

impl Lerp for CameraPose {
    fn lerp(self, other: Self, t: f32) -> Self {
        Self {
            position: self.position.lerp(other.position, t),
            target: self.target.lerp(other.target, t),
        }
    }
}

/// Pan/zoom of the 2D canvas: `screen = rect.center + pan + world * zoom`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportPose {
    pub pan: Vec2,
    pub zoom: f32,
}

impl Default for ViewportPose {
    fn default() -> Self {
        Self {
            pan: Vec2::ZERO,
            zoom: 60.0,
        }
    }
}

impl Lerp for ViewportPose {
    fn lerp(self, other: Self, t: f32) -> Self {
        Self {
            pan: self.pan.lerp(other.pan, t),
            // zoom interpolates geometrically so halving and doubling feel alike
            zoom: (self.zoom.ln().lerp(other.zoom.ln(), t)).exp(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Easing {
    Linear,
    #[default]
    EaseOutCubic,
    EaseInOutCubic,
}

impl Easing {
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::EaseOutCubic => 1.0 - (1.0 - t).powi(3),
            Self::EaseInOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transition<P> {
    pub from: P,
    pub to: P,
    pub duration_secs: f64,
    pub easing: Easing,
}

impl<P: Lerp> Transition<P> {
    pub fn progress(&self, elapsed_secs: f64) -> f32 {
        if self.duration_secs <= 0.0 {
            return 1.0;
        }
        (elapsed_secs / self.duration_secs).clamp(0.0, 1.0) as f32
    }

    pub fn sample(&self, elapsed_secs: f64) -> P {
        let progress = self.progress(elapsed_secs);
        if progress >= 1.0 {
            return self.to;
        }
        self.from.lerp(self.to, self.easing.apply(progress))
    }

    pub fn is_finished(&self, elapsed_secs: f64) -> bool {
        elapsed_secs >= self.duration_secs
    }
}

/// Frame-driven owner of a single pose. Time is whatever clock the caller
/// samples with, in seconds.
#[derive(Clone, Debug)]
pub struct Animator<P> {
    current: P,
    active: Option<(Transition<P>, f64)>,
}

impl<P: Lerp> Animator<P> {
    pub fn new(pose: P) -> Self {
        Self {
            current: pose,
            active: None,
        }
    }

    /// Cancels any running transition and animates from where it was towards `to`.
    pub fn start(&mut self, to: P, duration_secs: f64, easing: Easing, now: f64) {
        let from = self.sample(now);
        self.active = Some((
            Transition {
                from,
                to,
                duration_secs,
                easing,
            },
            now,
        ));
    }

    /// Cancels any running transition and places the pose directly.
    pub fn jump(&mut self, pose: P) {
        self.active = None;
        self.current = pose;
    }

    pub fn sample(&mut self, now: f64) -> P {
        if let Some((transition, started)) = self.active {
            let elapsed = now - started;
            self.current = transition.sample(elapsed);
            if transition.is_finished(elapsed) {
                self.active = None;
            }
        }
        self.current
    }

    pub fn current(&self) -> P {
        self.current
    }

    pub fn target(&self) -> P {
        self.active
            .map(|(transition, _)| transition.to)
            .unwrap_or(self.current)
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }
}

/// 3D camera with the God Mode fit / restore behaviour.
#[derive(Clone, Debug)]
pub struct CameraRig {
    animator: Animator<CameraPose>,
    saved_pose: Option<CameraPose>,
    pub fov_degrees: f32,
}

impl CameraRig {
    pub fn new(pose: CameraPose) -> Self {
        Self {
            animator: Animator::new(pose),
            saved_pose: None,
            fov_degrees: DEFAULT_FOV_DEGREES,
        }
    }

    /// Saves the current pose (once) and flies to frame the whole layout.
    pub fn enter_god_mode(&mut self, layout: &GodLayout, now: f64) {
        if self.saved_pose.is_none() {
            self.saved_pose = Some(self.animator.sample(now));
        }
        if let Some(fit) = fit_pose_for_layout(layout, self.fov_degrees) {
            self.animator
                .start(fit, FIT_DURATION_SECS, Easing::EaseOutCubic, now);
        }
    }

    /// Flies back to the pose saved on entry, if any.
    pub fn leave_god_mode(&mut self, now: f64) {
        if let Some(saved) = self.saved_pose.take() {
            self.animator
                .start(saved, RESTORE_DURATION_SECS, Easing::EaseOutCubic, now);
        }
    }

    pub fn focus(&mut self, target: Position3, bounding_radius: f32, now: f64) {
        let pose = optimal_camera_position(target, bounding_radius);
        self.animator
            .start(pose, RESTORE_DURATION_SECS, Easing::EaseInOutCubic, now);
    }

    pub fn sample(&mut self, now: f64) -> CameraPose {
        self.animator.sample(now)
    }

    pub fn saved_pose(&self) -> Option<CameraPose> {
        self.saved_pose
    }

    pub fn is_animating(&self) -> bool {
        self.animator.is_active()
    }
}

/// Centroid, and the farthest distance from it, of every laid-out node.
pub fn layout_sphere(layout: &GodLayout) -> Option<(Position3, f32)> {
    if layout.is_empty() {
        return None;
    }

    let count = layout.len() as f32;
    let (sx, sy, sz) = layout
        .positions
        .values()
        .fold((0.0, 0.0, 0.0), |(x, y, z), p| (x + p.x, y + p.y, z + p.z));
    let center = Position3::new(sx / count, sy / count, sz / count);

    let max_distance = layout
        .positions
        .values()
        .map(|p| {
            ((p.x - center.x).powi(2) + (p.y - center.y).powi(2) + (p.z - center.z).powi(2)).sqrt()
        })
        .fold(0.0_f32, f32::max);

    Some((center, max_distance))
}

/// Camera straight above the layout centroid, far enough back for the whole
/// layout to fit in the field of view.
pub fn fit_pose_for_layout(layout: &GodLayout, fov_degrees: f32) -> Option<CameraPose> {
    let (center, max_distance) = layout_sphere(layout)?;
    let half_fov = (fov_degrees.to_radians() * 0.5).max(0.01);
    let distance = (max_distance * FIT_MARGIN / half_fov.tan()).max(MIN_FIT_DISTANCE);

    Some(CameraPose {
        position: Position3::new(center.x, center.y, center.z + distance),
        target: center,
    })
}

/// Thirty degrees of elevation, at least 8 units away.
pub fn optimal_camera_position(target: Position3, bounding_radius: f32) -> CameraPose {
    let distance = (bounding_radius * 2.0).max(8.0);
    let angle = std::f32::consts::PI / 6.0;
    CameraPose {
        position: Position3::new(
            target.x + distance * angle.cos(),
            target.y + distance * angle.sin(),
            target.z + distance * 0.5,
        ),
        target,
    }
}

/// Pan/zoom that centers `points` in a viewport of `size` pixels.
pub fn fit_viewport(points: impl IntoIterator<Item = Vec2>, size: Vec2) -> Option<ViewportPose> {
    let points = points.into_iter().collect::<Vec<_>>();
    if points.is_empty() {
        return None;
    }

    let center = points.iter().fold(Vec2::ZERO, |sum, point| sum + *point) / points.len() as f32;
    let max_distance = points
        .iter()
        .map(|point| (*point - center).length())
        .fold(0.0_f32, f32::max)
        .max(1.0);

    let half_extent = (size.x.min(size.y) * 0.5).max(1.0);
    let zoom = (half_extent / (max_distance * FIT_MARGIN)).clamp(MIN_ZOOM, MAX_ZOOM);
    Some(ViewportPose {
        pan: -center * zoom,
        zoom,
    })
}

pub fn clamp_zoom(zoom: f32) -> f32 {
    zoom.clamp(MIN_ZOOM, MAX_ZOOM)
}

pub fn world_offset(pose: ViewportPose, world: Vec2) -> Vec2 {
    pose.pan + world * pose.zoom
}

pub fn world_from_offset(pose: ViewportPose, offset: Vec2) -> Vec2 {
    (offset - pose.pan) / pose.zoom
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use std::f32::consts::TAU;

    use eframe::egui::vec2;

    use super::*;
    use crate::layout::GodLayoutPosition;
    use crate::layout::god::Bounds3;

    fn layout(points: &[(f32, f32, f32)]) -> GodLayout {
        let positions = points
            .iter()
            .enumerate()
            .map(|(index, &(x, y, z))| {
                (
                    format!("n{index}"),
                    GodLayoutPosition {
                        x,
                        y,
                        z,
                        depth: index,
                        theta: 0.0,
                        radius: 0.0,
                        sector_start: 0.0,
                        sector_end: TAU,
                    },
                )
            })
            .collect::<HashMap<_, _>>();
        GodLayout {
            positions,
            bounds: Bounds3::ZERO,
        }
    }

    #[test]
    fn easing_hits_endpoints() {
        for easing in [Easing::Linear, Easing::EaseOutCubic, Easing::EaseInOutCubic] {
            assert_eq!(easing.apply(0.0), 0.0);
            assert_eq!(easing.apply(1.0), 1.0);
            assert_eq!(easing.apply(3.0), 1.0);
        }
        assert!(Easing::EaseOutCubic.apply(0.5) > 0.5);
    }

    #[test]
    fn transition_is_pure_in_elapsed_time() {
        let transition = Transition {
            from: 0.0_f32,
            to: 10.0,
            duration_secs: 2.0,
            easing: Easing::Linear,
        };
        assert_eq!(transition.sample(1.0), 5.0);
        assert_eq!(transition.sample(1.0), 5.0);
        assert_eq!(transition.sample(5.0), 10.0);
        assert_eq!(transition.sample(-1.0), 0.0);
    }

    #[test]
    fn restarting_cancels_previous_transition() {
        let mut animator = Animator::new(0.0_f32);
        animator.start(10.0, 1.0, Easing::Linear, 0.0);
        assert_eq!(animator.sample(0.5), 5.0);

        animator.start(-10.0, 1.0, Easing::Linear, 0.5);
        assert_eq!(animator.sample(0.5), 5.0);
        assert_eq!(animator.sample(1.0), -2.5);
        assert_eq!(animator.sample(2.0), -10.0);
        assert!(!animator.is_active());
    }

    #[test]
    fn fit_distance_has_floor() {
        let tight = fit_pose_for_layout(&layout(&[(0.0, 0.0, 0.0), (1.0, 0.0, 0.0)]), 60.0)
            .unwrap();
        assert!((tight.position.z - tight.target.z - MIN_FIT_DISTANCE).abs() < 1e-4);
        assert!((tight.target.x - 0.5).abs() < 1e-6);

        let wide = fit_pose_for_layout(&layout(&[(-50.0, 0.0, 0.0), (50.0, 0.0, 0.0)]), 60.0)
            .unwrap();
        let expected = 50.0 * FIT_MARGIN / 30.0_f32.to_radians().tan();
        assert!((wide.position.z - expected).abs() < 1e-2);

        assert!(fit_pose_for_layout(&GodLayout::empty(), 60.0).is_none());
    }

    #[test]
    fn god_mode_restores_saved_pose() {
        let start = CameraPose::default();
        let mut rig = CameraRig::new(start);
        let wide = layout(&[(-50.0, 0.0, 0.0), (50.0, 0.0, 0.0)]);

        rig.enter_god_mode(&wide, 0.0);
        assert_eq!(rig.saved_pose(), Some(start));
        let fitted = rig.sample(FIT_DURATION_SECS);
        assert_ne!(fitted, start);

        rig.leave_god_mode(2.0);
        assert_eq!(rig.saved_pose(), None);
        assert_eq!(rig.sample(2.0 + RESTORE_DURATION_SECS), start);
    }

    #[test]
    fn viewport_fit_centers_points() {
        let size = vec2(800.0, 600.0);
        let pose = fit_viewport([vec2(10.0, 10.0), vec2(14.0, 10.0)], size).unwrap();
        let center_offset = world_offset(pose, vec2(12.0, 10.0));
        assert!(center_offset.length() < 1e-3);
        let back = world_from_offset(pose, center_offset);
        assert!((back - vec2(12.0, 10.0)).length() < 1e-3);
        assert!(fit_viewport(Vec::new(), size).is_none());
    }
}
