use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::graph_utils::graph::{GraphModel, NodeId};
use crate::store::records::Properties;

// Positions are kept inside this box no matter what the forces or pins say
const COORD_LIMIT: f64 = 1.0e6;
// Floor on squared distance in the repulsion term
const MIN_DISTANCE2: f64 = 1.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub link_distance: f64,
    pub repulsion: f64,
    pub centering: f64,
    // Fraction of the gap to the energy target closed each tick
    pub energy_decay: f64,
    pub energy_min: f64,
    pub velocity_decay: f64,
    // Cap on the displacement one pair's repulsion adds per tick
    pub max_repulsion: f64,
    pub reheat_energy: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            link_distance: 100.0,
            repulsion: 3000.0,
            centering: 0.1,
            // 1 - 0.001^(1/300): reaches energy_min from 1.0 in about 300 ticks
            energy_decay: 0.0228,
            energy_min: 0.001,
            velocity_decay: 0.4,
            max_repulsion: 50.0,
            reheat_energy: 0.3,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SimNode {
    pub id: NodeId,
    pub label: String,
    pub properties: Properties,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    // Forced position while dragged
    pub pin: Option<(f64, f64)>,
}

// Link resolved to node slots, with precomputed spring parameters
#[derive(Clone, Debug)]
pub struct SimLink {
    pub source: usize,
    pub target: usize,
    pub rel_type: String,
    strength: f64,
    bias: f64,
}

/// Iterative force-directed layout over one [`GraphModel`].
///
/// Each [`tick`](ForceSimulation::tick) combines many-body repulsion, link
/// springs and a centering pull, all scaled by the current energy. Energy
/// moves geometrically toward its target (0 unless a drag holds it up), so
/// the layout settles without the loop ever stopping: a reheat brings motion
/// straight back.
#[derive(Clone, Debug)]
pub struct ForceSimulation {
    nodes: Vec<SimNode>,
    links: Vec<SimLink>,
    index: HashMap<NodeId, usize>,
    config: SimulationConfig,
    width: f64,
    height: f64,
    energy: f64,
    energy_target: f64,
    ticks: u64,
}

impl ForceSimulation {
    pub fn new(model: &GraphModel, config: SimulationConfig, width: f64, height: f64) -> Self {
        let (width, height) = sanitize_viewport(width, height);
        let center = (width / 2.0, height / 2.0);
        let spacing = (width.min(height) * 0.02).max(10.0);

        let mut index = HashMap::with_capacity(model.node_count());
        let nodes: Vec<SimNode> = model
            .nodes()
            .iter()
            .enumerate()
            .map(|(i, n)| {
                index.insert(n.id.clone(), i);
                let (x, y) = golden_spiral_position(center, i, spacing);
                SimNode {
                    id: n.id.clone(),
                    label: n.label.clone(),
                    properties: n.properties.clone(),
                    x,
                    y,
                    vx: 0.0,
                    vy: 0.0,
                    pin: None,
                }
            })
            .collect();

        // One-time id -> slot resolution; the model guarantees both ends exist
        let degrees = model.degrees();
        let degree_of = |id: &str| degrees.get(id).copied().unwrap_or(1).max(1) as f64;
        let links = model
            .links()
            .iter()
            .filter_map(|link| {
                let (&source, &target) = (index.get(&link.source_id)?, index.get(&link.target_id)?);
                let (ds, dt) = (degree_of(&link.source_id), degree_of(&link.target_id));
                Some(SimLink {
                    source,
                    target,
                    rel_type: link.rel_type.clone(),
                    strength: 1.0 / ds.min(dt),
                    bias: ds / (ds + dt),
                })
            })
            .collect();

        debug!("simulation built with {} node(s)", nodes.len());
        Self {
            nodes,
            links,
            index,
            config,
            width,
            height,
            energy: 1.0,
            energy_target: 0.0,
            ticks: 0,
        }
    }

    pub fn nodes(&self) -> &[SimNode] { &self.nodes }
    pub fn links(&self) -> &[SimLink] { &self.links }
    pub fn index_of(&self, id: &str) -> Option<usize> { self.index.get(id).copied() }
    pub fn len(&self) -> usize { self.nodes.len() }
    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }
    pub fn config(&self) -> &SimulationConfig { &self.config }
    pub fn energy(&self) -> f64 { self.energy }
    pub fn energy_target(&self) -> f64 { self.energy_target }
    pub fn tick_count(&self) -> u64 { self.ticks }
    pub fn viewport(&self) -> (f64, f64) { (self.width, self.height) }

    pub fn is_settled(&self) -> bool {
        self.energy < self.config.energy_min && self.energy_target < self.config.energy_min
    }

    /// Raise the energy to at least `energy` without rebuilding anything.
    pub fn reheat(&mut self, energy: f64) {
        let energy = clamp_unit(energy);
        if energy > self.energy {
            self.energy = energy;
        }
    }

    pub fn set_energy_target(&mut self, target: f64) {
        self.energy_target = clamp_unit(target);
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        let (width, height) = sanitize_viewport(width, height);
        self.width = width;
        self.height = height;
    }

    /// Move a node directly, dropping its velocity. Pinned nodes stay pinned.
    pub fn place(&mut self, idx: usize, x: f64, y: f64) {
        if let Some(node) = self.nodes.get_mut(idx) {
            node.x = sanitize_coord(x, node.x);
            node.y = sanitize_coord(y, node.y);
            node.vx = 0.0;
            node.vy = 0.0;
        }
    }

    pub fn pin(&mut self, idx: usize, x: f64, y: f64) {
        if let Some(node) = self.nodes.get_mut(idx) {
            let (px, py) = node.pin.unwrap_or((node.x, node.y));
            node.pin = Some((sanitize_coord(x, px), sanitize_coord(y, py)));
        }
    }

    pub fn unpin(&mut self, idx: usize) {
        if let Some(node) = self.nodes.get_mut(idx) {
            node.pin = None;
        }
    }

    // Last node drawn wins, matching what is visually on top
    pub fn node_at(&self, x: f64, y: f64, radius: f64) -> Option<usize> {
        let r2 = radius * radius;
        self.nodes
            .iter()
            .enumerate()
            .rev()
            .find(|(_, n)| {
                let (dx, dy) = (n.x - x, n.y - y);
                dx * dx + dy * dy <= r2
            })
            .map(|(i, _)| i)
    }

    pub fn tick(&mut self) {
        let alpha = self.energy;
        let n = self.nodes.len();
        let mut force = vec![(0.0_f64, 0.0_f64); n];

        // Forces stay on after settling; at that energy their deltas are negligible
        self.accumulate_repulsion(alpha, &mut force);
        self.accumulate_links(alpha, &mut force);
        self.accumulate_centering(alpha, &mut force);

        let keep = 1.0 - self.config.velocity_decay;
        for (node, (fx, fy)) in self.nodes.iter_mut().zip(force) {
            if let Some((px, py)) = node.pin {
                node.x = px;
                node.y = py;
                node.vx = 0.0;
                node.vy = 0.0;
                continue;
            }
            node.vx = (node.vx + fx) * keep;
            node.vy = (node.vy + fy) * keep;
            if !(node.vx.is_finite() && node.vy.is_finite()) {
                node.vx = 0.0;
                node.vy = 0.0;
            }
            node.x = sanitize_coord(node.x + node.vx, node.x);
            node.y = sanitize_coord(node.y + node.vy, node.y);
        }

        self.energy += (self.energy_target - self.energy) * self.config.energy_decay;
        self.ticks += 1;
    }

    fn accumulate_repulsion(&self, alpha: f64, force: &mut [(f64, f64)]) {
        let strength = self.config.repulsion * alpha;
        let cap = self.config.max_repulsion;
        if strength == 0.0 {
            return;
        }
        for i in 0..self.nodes.len() {
            for j in (i + 1)..self.nodes.len() {
                let (a, b) = (&self.nodes[i], &self.nodes[j]);
                let (mut dx, mut dy) = (b.x - a.x, b.y - a.y);
                let mut d2 = dx * dx + dy * dy;
                if d2 < 1e-12 {
                    (dx, dy) = jiggle(i, j);
                    d2 = dx * dx + dy * dy;
                }
                let d = d2.sqrt();
                // Only near-coincident pairs hit the cap; springs stay uncapped
                let f = (strength / d2.max(MIN_DISTANCE2)).min(cap);
                let (ux, uy) = (dx / d * f, dy / d * f);
                force[i].0 -= ux;
                force[i].1 -= uy;
                force[j].0 += ux;
                force[j].1 += uy;
            }
        }
    }

    fn accumulate_links(&self, alpha: f64, force: &mut [(f64, f64)]) {
        let rest = self.config.link_distance;
        for link in &self.links {
            if link.source == link.target {
                continue;
            }
            let (s, t) = (&self.nodes[link.source], &self.nodes[link.target]);
            let (mut dx, mut dy) = (t.x - s.x, t.y - s.y);
            let mut d = (dx * dx + dy * dy).sqrt();
            if d < 1e-6 {
                (dx, dy) = jiggle(link.source, link.target);
                d = (dx * dx + dy * dy).sqrt();
            }
            // Positive k pulls the ends together, negative pushes them apart
            let k = (d - rest) / d * alpha * link.strength;
            let (px, py) = (dx * k, dy * k);
            force[link.target].0 -= px * link.bias;
            force[link.target].1 -= py * link.bias;
            force[link.source].0 += px * (1.0 - link.bias);
            force[link.source].1 += py * (1.0 - link.bias);
        }
    }

    fn accumulate_centering(&self, alpha: f64, force: &mut [(f64, f64)]) {
        let n = self.nodes.len();
        if n == 0 || self.config.centering == 0.0 {
            return;
        }
        let (sx, sy) = self.nodes.iter().fold((0.0, 0.0), |(sx, sy), node| (sx + node.x, sy + node.y));
        let (mx, my) = (sx / n as f64, sy / n as f64);
        let k = self.config.centering * alpha;
        let (cx, cy) = ((self.width / 2.0 - mx) * k, (self.height / 2.0 - my) * k);
        for f in force.iter_mut() {
            f.0 += cx;
            f.1 += cy;
        }
    }
}

// Golden-angle spiral placement around the provided center.
// k is the 0-based index along the spiral.
fn golden_spiral_position(center: (f64, f64), k: usize, spacing: f64) -> (f64, f64) {
    let golden_angle = std::f64::consts::PI * (3.0 - 5.0_f64.sqrt());
    let t = k as f64;
    let r = spacing * (t + 0.5).sqrt();
    let theta = t * golden_angle;
    (center.0 + r * theta.cos(), center.1 + r * theta.sin())
}

// Small deterministic offset that separates coincident nodes
fn jiggle(i: usize, j: usize) -> (f64, f64) {
    let seed = (i * 31 + j * 17 + 1) as f64;
    let angle = seed * 2.399_963_229_728_653;
    (angle.cos() * 1e-3, angle.sin() * 1e-3)
}

fn sanitize_coord(v: f64, fallback: f64) -> f64 {
    let v = if v.is_finite() { v } else { fallback };
    if v.is_finite() { v.clamp(-COORD_LIMIT, COORD_LIMIT) } else { 0.0 }
}

fn sanitize_viewport(width: f64, height: f64) -> (f64, f64) {
    let fix = |v: f64| if v.is_finite() && v >= 1.0 { v } else { 1.0 };
    (fix(width), fix(height))
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 }
}
