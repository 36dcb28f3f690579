//! Normal-mode force simulation.
//!
//! Springs along hierarchy and user links, many-body charge, a weak centering
//! pull and radius-aware collision relax a small node set in the x/y plane.
//! Each tick cools `alpha`; once it falls below `alpha_min` the simulation is
//! settled and further ticks are no-ops until it is reseeded.

mod forces;
mod quadtree;

use std::collections::HashMap;
use std::time::Duration;

use eframe::egui::{Vec2, vec2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::node_radius;
use crate::model::{LayoutDefaults, Node, Position3};
use crate::util::stable_pair;
use forces::{
    ChargeParams, CollisionParams, accumulate_charge_for_node, accumulate_collision_pairs,
    fallback_direction,
};
use quadtree::QuadNode;

const INITIAL_SPREAD: f32 = 10.0;
const CHILD_SPAWN_DISTANCE: f32 = 1.5;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ForceConfig {
    pub link_strength: f32,
    pub link_distance: f32,
    /// Negative values repel.
    pub charge_strength: f32,
    pub charge_distance_max: f32,
    pub center_strength: f32,
    pub collide_strength: f32,
    /// Collision radius as a multiple of the rendered node radius.
    pub collide_radius_scale: f32,
    pub alpha_decay: f32,
    pub alpha_min: f32,
    pub velocity_decay: f32,
    /// Full width of the per-tick z perturbation.
    pub z_jitter: f32,
    pub initial_ticks: usize,
    pub tick_interval: Duration,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            link_strength: 0.3,
            link_distance: 2.0,
            charge_strength: -30.0,
            charge_distance_max: 10.0,
            center_strength: 0.05,
            collide_strength: 0.7,
            collide_radius_scale: 2.0,
            alpha_decay: 0.02,
            alpha_min: 0.001,
            velocity_decay: 0.4,
            z_jitter: 0.01,
            initial_ticks: 100,
            tick_interval: Duration::from_millis(16),
        }
    }
}

impl ForceConfig {
    pub fn from_settings(defaults: &LayoutDefaults) -> Self {
        let fallback = Self::default();
        Self {
            link_strength: non_negative_or(defaults.link_strength, fallback.link_strength),
            collide_radius_scale: non_negative_or(
                defaults.collision_radius,
                fallback.collide_radius_scale,
            ),
            center_strength: non_negative_or(defaults.center_strength, fallback.center_strength),
            ..fallback
        }
    }
}

fn non_negative_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        fallback
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SimNode {
    pub id: String,
    pub position: Vec2,
    pub z: f32,
    pub velocity: Vec2,
    pub radius: f32,
}

impl SimNode {
    pub fn position3(&self) -> Position3 {
        Position3::new(self.position.x, self.position.y, self.z)
    }
}

#[derive(Clone, Copy, Debug)]
struct SimLink {
    source: usize,
    target: usize,
    bias: f32,
}

pub struct ForceSimulation {
    nodes: Vec<SimNode>,
    index_by_id: HashMap<String, usize>,
    links: Vec<SimLink>,
    config: ForceConfig,
    alpha: f32,
    rng: StdRng,
    // scratch buffers reused across ticks
    positions: Vec<Vec2>,
    radii: Vec<f32>,
}

impl ForceSimulation {
    /// Nodes keep a stored position when they have one; the rest start at a
    /// random point inside a 10-unit box.
    pub fn new(nodes: &[Node], links: &[(String, String)], config: ForceConfig, seed: u64) -> Self {
        let mut simulation = Self {
            nodes: Vec::new(),
            index_by_id: HashMap::new(),
            links: Vec::new(),
            config,
            alpha: 1.0,
            rng: StdRng::seed_from_u64(seed),
            positions: Vec::new(),
            radii: Vec::new(),
        };
        simulation.reseed(nodes, links);
        simulation
    }

    /// Replaces the node and link sets and reheats.
    ///
    /// Nodes already in the simulation keep their current position; new nodes
    /// spawn next to their parent when the parent is simulated.
    pub fn reseed(&mut self, nodes: &[Node], links: &[(String, String)]) {
        let previous = std::mem::take(&mut self.nodes)
            .into_iter()
            .map(|node| (node.id.clone(), node))
            .collect::<HashMap<_, _>>();

        let mut next = Vec::with_capacity(nodes.len());
        let mut index_by_id = HashMap::with_capacity(nodes.len());
        for node in nodes {
            if index_by_id.contains_key(&node.id) {
                continue;
            }
            let radius = node_radius(&node.title, false) * self.config.collide_radius_scale;
            let (position, z, velocity) = match previous.get(&node.id) {
                Some(existing) => (existing.position, existing.z, existing.velocity),
                None => {
                    let (position, z) = self.spawn_position(node, &previous);
                    (position, z, Vec2::ZERO)
                }
            };
            index_by_id.insert(node.id.clone(), next.len());
            next.push(SimNode {
                id: node.id.clone(),
                position,
                z,
                velocity,
                radius,
            });
        }

        self.nodes = next;
        self.index_by_id = index_by_id;
        self.links = self.resolve_links(links);
        self.alpha = 1.0;
    }

    fn spawn_position(&mut self, node: &Node, previous: &HashMap<String, SimNode>) -> (Vec2, f32) {
        if let Some(stored) = node.position.filter(|p| p.is_finite() && !p.is_origin()) {
            return (vec2(stored.x, stored.y), stored.z);
        }

        let parent = node
            .parent_id
            .as_deref()
            .and_then(|parent_id| previous.get(parent_id));
        if let Some(parent) = parent {
            let (a, b) = stable_pair(&node.id);
            let angle = a * std::f32::consts::TAU;
            let offset = vec2(angle.cos(), angle.sin()) * CHILD_SPAWN_DISTANCE * (0.75 + b * 0.5);
            return (parent.position + offset, parent.z);
        }

        let x = (self.rng.gen_range(0.0..1.0_f32) - 0.5) * INITIAL_SPREAD;
        let y = (self.rng.gen_range(0.0..1.0_f32) - 0.5) * INITIAL_SPREAD;
        let z = (self.rng.gen_range(0.0..1.0_f32) - 0.5) * INITIAL_SPREAD;
        (vec2(x, y), z)
    }

    fn resolve_links(&self, links: &[(String, String)]) -> Vec<SimLink> {
        let mut pairs = Vec::with_capacity(links.len());
        for (source, target) in links {
            let (Some(&source), Some(&target)) =
                (self.index_by_id.get(source), self.index_by_id.get(target))
            else {
                log::debug!("skipping link {source} -> {target} outside the simulated set");
                continue;
            };
            if source != target {
                pairs.push((source, target));
            }
        }

        let mut degree = vec![0usize; self.nodes.len()];
        for &(source, target) in &pairs {
            degree[source] += 1;
            degree[target] += 1;
        }

        pairs
            .into_iter()
            .map(|(source, target)| SimLink {
                source,
                target,
                bias: degree[source] as f32 / (degree[source] + degree[target]) as f32,
            })
            .collect()
    }

    /// Takes effect for forces immediately and for radii at the next reseed.
    pub fn set_config(&mut self, config: ForceConfig) {
        self.config = config;
    }

    pub fn config(&self) -> &ForceConfig {
        &self.config
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn is_settled(&self) -> bool {
        self.alpha < self.config.alpha_min
    }

    pub fn nodes(&self) -> &[SimNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn positions(&self) -> HashMap<String, Position3> {
        self.nodes
            .iter()
            .map(|node| (node.id.clone(), node.position3()))
            .collect()
    }

    /// Runs the synchronous burst used before the first frame.
    pub fn warm_up(&mut self) {
        self.tick_n(self.config.initial_ticks);
    }

    pub fn tick_n(&mut self, ticks: usize) {
        for _ in 0..ticks {
            if !self.tick() {
                break;
            }
        }
    }

    /// Advances one step. Returns `false` once the simulation has settled.
    pub fn tick(&mut self) -> bool {
        if self.is_settled() || self.nodes.is_empty() {
            return false;
        }

        self.alpha += (0.0 - self.alpha) * self.config.alpha_decay;

        self.apply_links();
        self.apply_charge_and_collision();
        self.apply_center();

        let retain = 1.0 - self.config.velocity_decay;
        for node in &mut self.nodes {
            node.velocity *= retain;
            node.position += node.velocity;
            if !node.position.x.is_finite() || !node.position.y.is_finite() {
                log::warn!("force simulation produced a non-finite position for {}", node.id);
                node.position = Vec2::ZERO;
                node.velocity = Vec2::ZERO;
            }
        }

        let jitter = self.config.z_jitter;
        if jitter > 0.0 {
            for node in &mut self.nodes {
                node.z += (self.rng.gen_range(0.0..1.0_f32) - 0.5) * jitter;
            }
        }

        true
    }

    fn apply_links(&mut self) {
        let strength = self.config.link_strength * self.alpha;
        let distance = self.config.link_distance;

        for link in &self.links {
            let source = &self.nodes[link.source];
            let target = &self.nodes[link.target];
            let mut delta =
                (target.position + target.velocity) - (source.position + source.velocity);
            if delta.length_sq() <= 1e-12 {
                delta = fallback_direction(link.source, link.target) * 1e-3;
            }

            let length = delta.length();
            let correction = delta * ((length - distance) / length * strength);

            self.nodes[link.target].velocity -= correction * link.bias;
            self.nodes[link.source].velocity += correction * (1.0 - link.bias);
        }
    }

    fn apply_charge_and_collision(&mut self) {
        self.positions.clear();
        self.radii.clear();
        let mut max_radius = 0.0_f32;
        for node in &self.nodes {
            self.positions.push(node.position);
            self.radii.push(node.radius);
            max_radius = max_radius.max(node.radius);
        }

        let Some(quadtree) = QuadNode::build(&self.positions) else {
            return;
        };

        let charge = ChargeParams {
            strength: self.config.charge_strength,
            distance_max_sq: self.config.charge_distance_max * self.config.charge_distance_max,
            alpha: self.alpha,
        };
        let mut deltas = vec![Vec2::ZERO; self.nodes.len()];
        for (index, delta) in deltas.iter_mut().enumerate() {
            accumulate_charge_for_node(&quadtree, index, &self.positions, charge, delta);
        }

        let reach = max_radius * 2.0;
        if reach > 0.0 && self.config.collide_strength > 0.0 {
            // Collision sees positions after this tick's charge, like a predicted step.
            for (index, position) in self.positions.iter_mut().enumerate() {
                *position += self.nodes[index].velocity + deltas[index];
            }
            if let Some(predicted) = QuadNode::build(&self.positions) {
                accumulate_collision_pairs(
                    &predicted,
                    &predicted,
                    true,
                    &self.positions,
                    &self.radii,
                    CollisionParams {
                        strength: self.config.collide_strength,
                        max_collision_distance_sq: reach * reach,
                    },
                    &mut deltas,
                );
            }
        }

        for (node, delta) in self.nodes.iter_mut().zip(deltas) {
            node.velocity += delta;
        }
    }

    fn apply_center(&mut self) {
        let count = self.nodes.len() as f32;
        let mut mean = Vec2::ZERO;
        let mut mean_z = 0.0;
        for node in &self.nodes {
            mean += node.position;
            mean_z += node.z;
        }
        let shift = mean / count * self.config.center_strength;
        let shift_z = mean_z / count * self.config.center_strength;

        for node in &mut self.nodes {
            node.position -= shift;
            node.z -= shift_z;
        }
    }
}

/// Hierarchy edges among `nodes` followed by their user links.
pub fn simulation_links(nodes: &[Node]) -> Vec<(String, String)> {
    let mut links = Vec::new();
    for node in nodes {
        if let Some(parent_id) = &node.parent_id {
            links.push((parent_id.clone(), node.id.clone()));
        }
    }
    for node in nodes {
        for target in &node.links {
            links.push((node.id.clone(), target.clone()));
        }
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::default_root_color;

    fn node(id: &str, parent: Option<&str>, title: &str) -> Node {
        Node::new(
            id.to_owned(),
            parent.map(str::to_owned),
            title.to_owned(),
            default_root_color(),
            0,
        )
    }

    fn star(children: usize) -> Vec<Node> {
        let mut nodes = vec![node("root", None, "Root")];
        for index in 0..children {
            nodes.push(node(&format!("c{index}"), Some("root"), &format!("Child {index}")));
        }
        nodes
    }

    #[test]
    fn settles_within_expected_tick_budget() {
        let nodes = star(6);
        let links = simulation_links(&nodes);
        let mut simulation = ForceSimulation::new(&nodes, &links, ForceConfig::default(), 3);
        simulation.warm_up();
        assert!(!simulation.is_settled());

        let mut ticks = 0;
        while simulation.tick() {
            ticks += 1;
            assert!(ticks < 1000, "simulation never cooled");
        }
        assert!(simulation.is_settled());
        assert!(!simulation.tick());
    }

    #[test]
    fn collisions_keep_children_apart() {
        let nodes = star(8);
        let links = simulation_links(&nodes);
        let mut simulation = ForceSimulation::new(&nodes, &links, ForceConfig::default(), 11);
        simulation.tick_n(400);

        let sim_nodes = simulation.nodes();
        for (index, a) in sim_nodes.iter().enumerate() {
            for b in &sim_nodes[index + 1..] {
                let distance = (a.position - b.position).length();
                assert!(distance > 0.3, "{} and {} at {distance}", a.id, b.id);
            }
        }
    }

    #[test]
    fn isolated_nodes_converge_near_origin() {
        let nodes = vec![node("a", None, "A"), node("b", None, "B"), node("c", None, "C")];
        let mut simulation = ForceSimulation::new(&nodes, &[], ForceConfig::default(), 5);
        simulation.tick_n(500);

        let positions = simulation.positions();
        let mut centroid = Vec2::ZERO;
        for position in positions.values() {
            assert!(position.is_finite());
            assert!(position.x.abs() < 20.0 && position.y.abs() < 20.0);
            centroid += vec2(position.x, position.y);
        }
        assert!((centroid / 3.0).length() < 0.5);
    }

    #[test]
    fn reseed_keeps_converged_positions() {
        let nodes = star(3);
        let links = simulation_links(&nodes);
        let mut simulation = ForceSimulation::new(&nodes, &links, ForceConfig::default(), 8);
        simulation.tick_n(300);
        let before = simulation.positions();

        let mut grown = nodes.clone();
        grown.push(node("new", Some("c0"), "New"));
        simulation.reseed(&grown, &simulation_links(&grown));

        assert_eq!(simulation.len(), 5);
        assert_eq!(simulation.alpha(), 1.0);
        let after = simulation.positions();
        for (id, position) in &before {
            assert_eq!(after[id], *position);
        }
        let parent = after["c0"];
        let spawned = after["new"];
        let gap = ((spawned.x - parent.x).powi(2) + (spawned.y - parent.y).powi(2)).sqrt();
        assert!(gap <= CHILD_SPAWN_DISTANCE * 1.25 + 1e-4);
    }

    #[test]
    fn stored_positions_seed_the_simulation() {
        let mut nodes = star(1);
        nodes[1].position = Some(Position3::new(4.0, -2.0, 1.0));
        let simulation = ForceSimulation::new(&nodes, &[], ForceConfig::default(), 1);
        assert_eq!(simulation.nodes()[1].position, vec2(4.0, -2.0));
        assert_eq!(simulation.nodes()[1].z, 1.0);
    }

    #[test]
    fn links_to_unknown_nodes_are_ignored() {
        let nodes = star(1);
        let links = vec![
            ("root".to_owned(), "c0".to_owned()),
            ("root".to_owned(), "ghost".to_owned()),
        ];
        let mut simulation = ForceSimulation::new(&nodes, &links, ForceConfig::default(), 2);
        simulation.tick_n(10);
        assert!(simulation.positions().values().all(|p| p.is_finite()));
    }

    #[test]
    fn settings_override_force_constants() {
        let config = ForceConfig::from_settings(&LayoutDefaults {
            link_strength: 0.5,
            collision_radius: 3.0,
            center_strength: f32::NAN,
        });
        assert_eq!(config.link_strength, 0.5);
        assert_eq!(config.collide_radius_scale, 3.0);
        assert_eq!(config.center_strength, ForceConfig::default().center_strength);
    }

    #[test]
    fn empty_simulation_is_inert() {
        let mut simulation = ForceSimulation::new(&[], &[], ForceConfig::default(), 0);
        assert!(!simulation.tick());
        assert!(simulation.positions().is_empty());
    }
}
