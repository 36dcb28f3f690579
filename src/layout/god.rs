//! God Mode radial ("sunburst") layout of a whole subtree.
//!
//! Each node gets an angular sector proportional to its leaf count; its
//! position sits near the sector midpoint on a ring whose radius grows
//! sub-linearly with depth. Children always partition their parent's sector,
//! so subtrees never overlap. Angles and radii are a pure function of the
//! tree snapshot. Only `z` carries random jitter.

use std::collections::HashMap;
use std::f32::consts::{PI, TAU};

use rand::Rng;

use crate::model::{Node, build_tree};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GodLayoutConfig {
    /// `R0`: ring radius at depth 1.
    pub base_radius: f32,
    /// Exponent applied to depth, expected in `(0, 1)`.
    pub gamma: f32,
    pub z_step: f32,
    /// Floor on a child's angular span, in radians. When the floored spans
    /// no longer fit, every sibling shrinks by the same factor.
    pub min_separation: f32,
    /// Added per sibling index to a node's own angle to break collinearity,
    /// in radians. Never moves a node more than a quarter of its sector.
    pub sibling_offset: f32,
    /// Full width of the uniform z jitter.
    pub jitter: f32,
}

impl Default for GodLayoutConfig {
    fn default() -> Self {
        Self {
            base_radius: 6.0,
            gamma: 0.95,
            z_step: 0.15,
            min_separation: 0.002 * PI,
            sibling_offset: 0.015,
            jitter: 0.1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GodLayoutPosition {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub depth: usize,
    /// Angle in `[0, 2pi)`.
    pub theta: f32,
    pub radius: f32,
    /// Sector `[sector_start, sector_end)` shared by this node's subtree.
    pub sector_start: f32,
    pub sector_end: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds3 {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Bounds3 {
    pub const ZERO: Self = Self {
        min: [0.0; 3],
        max: [0.0; 3],
    };

    pub fn center(&self) -> [f32; 3] {
        std::array::from_fn(|axis| (self.min[axis] + self.max[axis]) * 0.5)
    }

    pub fn extent(&self) -> [f32; 3] {
        std::array::from_fn(|axis| self.max[axis] - self.min[axis])
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GodLayout {
    pub positions: HashMap<String, GodLayoutPosition>,
    pub bounds: Bounds3,
}

impl GodLayout {
    pub fn empty() -> Self {
        Self {
            positions: HashMap::new(),
            bounds: Bounds3::ZERO,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }
}

pub fn radius_for_depth(depth: usize, config: &GodLayoutConfig) -> f32 {
    if depth == 0 {
        return 0.0;
    }
    config.base_radius * (depth as f32).powf(config.gamma)
}

const MAX_OFFSET_SHARE: f32 = 0.25;

/// Default constants, thread-local randomness for the z jitter.
pub fn compute_god_layout(root_id: &str, nodes: &[Node]) -> GodLayout {
    compute_god_layout_with(
        root_id,
        nodes,
        &GodLayoutConfig::default(),
        &mut rand::thread_rng(),
    )
}

/// Unknown root ids produce an empty layout with a zero bounding box.
pub fn compute_god_layout_with<R: Rng + ?Sized>(
    root_id: &str,
    nodes: &[Node],
    config: &GodLayoutConfig,
    rng: &mut R,
) -> GodLayout {
    let Some(tree) = build_tree(root_id, nodes) else {
        return GodLayout::empty();
    };

    let mut positions = HashMap::with_capacity(tree.len());
    // (slot, sector start, sector end, index among siblings)
    let mut pending = vec![(0, 0.0, TAU, 0)];

    while let Some((slot, start_angle, end_angle, sibling_index)) = pending.pop() {
        let Some(entry) = tree.get(slot) else {
            continue;
        };
        let span = end_angle - start_angle;
        let radius = radius_for_depth(entry.depth, config);
        let offset = (config.sibling_offset * sibling_index as f32).min(span * MAX_OFFSET_SHARE);
        let theta = ((start_angle + end_angle) * 0.5 + offset).rem_euclid(TAU);
        let jitter = (rng.gen_range(0.0..1.0_f32) - 0.5) * config.jitter;

        positions.insert(
            entry.id.clone(),
            GodLayoutPosition {
                x: finite_or_zero(radius * theta.cos()),
                y: finite_or_zero(radius * theta.sin()),
                z: finite_or_zero(entry.depth as f32 * config.z_step + jitter),
                depth: entry.depth,
                theta,
                radius,
                sector_start: start_angle,
                sector_end: end_angle,
            },
        );

        if entry.is_leaf() {
            continue;
        }

        let total_leaves = tree
            .children(entry)
            .map(|child| child.leaf_count)
            .sum::<usize>()
            .max(1) as f32;
        let spans = tree
            .children(entry)
            .map(|child| (child.leaf_count as f32 / total_leaves * span).max(config.min_separation))
            .collect::<Vec<_>>();
        let claimed = spans.iter().sum::<f32>();
        let scale = if claimed > span { span / claimed } else { 1.0 };

        let mut current_angle = start_angle;
        for (index, (&child, child_span)) in entry.children.iter().zip(spans).enumerate() {
            let child_end = (current_angle + child_span * scale).min(end_angle);
            pending.push((child, current_angle, child_end, index));
            current_angle = child_end;
        }
    }

    let bounds = bounds_of(positions.values());
    GodLayout { positions, bounds }
}

fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() { value } else { 0.0 }
}

fn bounds_of<'a>(positions: impl Iterator<Item = &'a GodLayoutPosition>) -> Bounds3 {
    let mut min = [f32::INFINITY; 3];
    let mut max = [f32::NEG_INFINITY; 3];
    let mut any = false;

    for position in positions {
        any = true;
        for (axis, value) in [position.x, position.y, position.z].into_iter().enumerate() {
            min[axis] = min[axis].min(value);
            max[axis] = max[axis].max(value);
        }
    }

    if any { Bounds3 { min, max } } else { Bounds3::ZERO }
}
