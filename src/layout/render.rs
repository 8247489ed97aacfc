use serde::Serialize;

use super::simulation::ForceSimulation;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PointPrimitive {
    pub id: String,
    pub label: String,
    pub x: f64,
    pub y: f64,
    pub pinned: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LinePrimitive {
    pub source_id: String,
    pub target_id: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

/// Drawable snapshot of one tick.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RenderFrame {
    pub tick: u64,
    pub energy: f64,
    pub settled: bool,
    pub width: f64,
    pub height: f64,
    pub points: Vec<PointPrimitive>,
    pub lines: Vec<LinePrimitive>,
}

impl RenderFrame {
    // Takes `&ForceSimulation`: projection can never disturb the layout
    pub fn project(sim: &ForceSimulation) -> Self {
        let nodes = sim.nodes();
        let points = nodes
            .iter()
            .map(|n| PointPrimitive {
                id: n.id.clone(),
                label: n.label.clone(),
                x: n.x,
                y: n.y,
                pinned: n.pin.is_some(),
            })
            .collect();
        let lines = sim
            .links()
            .iter()
            .map(|l| {
                let (s, t) = (&nodes[l.source], &nodes[l.target]);
                LinePrimitive {
                    source_id: s.id.clone(),
                    target_id: t.id.clone(),
                    rel_type: l.rel_type.clone(),
                    x1: s.x,
                    y1: s.y,
                    x2: t.x,
                    y2: t.y,
                }
            })
            .collect();
        let (width, height) = sim.viewport();
        RenderFrame {
            tick: sim.tick_count(),
            energy: sim.energy(),
            settled: sim.is_settled(),
            width,
            height,
            points,
            lines,
        }
    }

    pub fn is_empty(&self) -> bool { self.points.is_empty() }

    pub fn point(&self, id: &str) -> Option<&PointPrimitive> {
        self.points.iter().find(|p| p.id == id)
    }
}
