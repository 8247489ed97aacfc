use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};

use log::debug;

use super::simulation::ForceSimulation;

pub type PointerId = u64;

/// Pointer input in simulation coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    Down { pointer: PointerId, x: f64, y: f64 },
    Move { pointer: PointerId, x: f64, y: f64 },
    Up { pointer: PointerId },
    // Pointer lost (left the window, focus change); ends a drag like Up
    Cancel { pointer: PointerId },
}

/// Sending half handed to the input source. Events only take effect when
/// the tick loop drains them.
#[derive(Clone, Debug)]
pub struct PointerQueue {
    tx: Sender<PointerEvent>,
}

impl PointerQueue {
    /// Returns false once the owning controller is gone.
    pub fn push(&self, event: PointerEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragState {
    Idle,
    Dragging { pointer: PointerId },
}

pub struct InteractionController {
    tx: Sender<PointerEvent>,
    rx: Receiver<PointerEvent>,
    // pointer -> node slot; a node appears at most once
    sessions: HashMap<PointerId, usize>,
    hit_radius: f64,
}

impl InteractionController {
    pub fn new(hit_radius: f64) -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx, sessions: HashMap::new(), hit_radius }
    }

    pub fn queue(&self) -> PointerQueue {
        PointerQueue { tx: self.tx.clone() }
    }

    pub fn is_dragging(&self) -> bool { !self.sessions.is_empty() }

    pub fn dragged_node(&self, pointer: PointerId) -> Option<usize> {
        self.sessions.get(&pointer).copied()
    }

    pub fn state_of(&self, node: usize) -> DragState {
        self.sessions
            .iter()
            .find(|&(_, &n)| n == node)
            .map(|(&pointer, _)| DragState::Dragging { pointer })
            .unwrap_or(DragState::Idle)
    }

    /// Apply every queued event, in arrival order. Call at the start of a tick.
    pub fn apply_pending(&mut self, sim: &mut ForceSimulation) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.rx.try_recv() {
            self.apply(event, sim);
            applied += 1;
        }
        applied
    }

    pub fn apply(&mut self, event: PointerEvent, sim: &mut ForceSimulation) {
        match event {
            PointerEvent::Down { pointer, x, y } => self.begin(pointer, x, y, sim),
            PointerEvent::Move { pointer, x, y } => {
                if let Some(&node) = self.sessions.get(&pointer) {
                    sim.pin(node, x, y);
                }
            }
            PointerEvent::Up { pointer } | PointerEvent::Cancel { pointer } => self.end(pointer, sim),
        }
    }

    fn begin(&mut self, pointer: PointerId, x: f64, y: f64, sim: &mut ForceSimulation) {
        if self.sessions.contains_key(&pointer) {
            debug!("pointer {} already dragging, ignoring press", pointer);
            return;
        }
        let Some(node) = sim.node_at(x, y, self.hit_radius) else {
            return;
        };
        if self.sessions.values().any(|&n| n == node) {
            debug!("node {} already held by another pointer", node);
            return;
        }
        self.sessions.insert(pointer, node);
        sim.pin(node, x, y);
        let reheat = sim.config().reheat_energy;
        sim.set_energy_target(reheat);
        sim.reheat(reheat);
    }

    fn end(&mut self, pointer: PointerId, sim: &mut ForceSimulation) {
        let Some(node) = self.sessions.remove(&pointer) else {
            return;
        };
        sim.unpin(node);
        if self.sessions.is_empty() {
            // No forced cooling; energy decays naturally from here
            sim.set_energy_target(0.0);
        }
    }

    /// Forget sessions whose node slots belonged to a replaced simulation.
    /// Queued events stay queued; releases for forgotten pointers are no-ops.
    pub fn forget_sessions(&mut self) {
        if !self.sessions.is_empty() {
            debug!("dropping {} drag session(s) on graph replacement", self.sessions.len());
        }
        self.sessions.clear();
    }
}
