use std::collections::HashMap;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::store::records::{EntityRecord, Properties, TraversalRecord};

// Basic type aliases for clarity
pub type NodeId = String;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub label: String,
    pub properties: Properties,
}

impl Node {
    pub fn from_entity(entity: &EntityRecord) -> Self {
        Node {
            id: entity.identity.to_string(),
            label: entity.primary_label().to_string(),
            properties: entity.properties.clone(),
        }
    }
}

// Links keep endpoint ids only; the simulation resolves them to node slots
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub source_id: NodeId,
    pub target_id: NodeId,
    #[serde(rename = "type")]
    pub rel_type: String,
}

/// Canonical, deduplicated graph built from one fetch.
///
/// Nodes keep first-seen order so layouts are reproducible for the same
/// record stream, while their label and properties follow the last record
/// that mentioned them.
#[derive(Clone, Debug, Default, Serialize)]
pub struct GraphModel {
    nodes: Vec<Node>,
    links: Vec<Link>,
    #[serde(skip)]
    index: HashMap<NodeId, usize>,
    dropped_links: usize,
}

impl GraphModel {
    pub fn new() -> Self { Self::default() }

    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = TraversalRecord>,
    {
        let mut builder = GraphModelBuilder::default();
        for record in records {
            builder.push_record(record);
        }
        builder.finish()
    }

    pub fn nodes(&self) -> &[Node] { &self.nodes }
    pub fn links(&self) -> &[Link] { &self.links }
    pub fn node_count(&self) -> usize { self.nodes.len() }
    pub fn link_count(&self) -> usize { self.links.len() }
    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

    /// Links discarded during construction because an endpoint was missing.
    pub fn dropped_links(&self) -> usize { self.dropped_links }

    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn contains_node(&self, id: &str) -> bool { self.index.contains_key(id) }

    // Number of links touching each node, keyed by id
    pub fn degrees(&self) -> HashMap<&str, usize> {
        let mut deg: HashMap<&str, usize> = HashMap::new();
        for link in &self.links {
            *deg.entry(link.source_id.as_str()).or_insert(0) += 1;
            *deg.entry(link.target_id.as_str()).or_insert(0) += 1;
        }
        deg
    }
}

/// Accumulates candidate nodes and links while a record stream is consumed.
#[derive(Debug, Default)]
pub struct GraphModelBuilder {
    nodes: Vec<Node>,
    index: HashMap<NodeId, usize>,
    candidate_links: Vec<Link>,
}

impl GraphModelBuilder {
    pub fn push_record(&mut self, record: TraversalRecord) {
        let head = Node::from_entity(&record.head);
        let tail = Node::from_entity(&record.tail);
        let link = Link {
            source_id: head.id.clone(),
            target_id: tail.id.clone(),
            rel_type: record.relationship.rel_type,
        };
        self.push_node(head);
        self.push_node(tail);
        self.push_link(link);
    }

    // Last-seen wins: a repeated id replaces label and properties in place
    pub fn push_node(&mut self, node: Node) {
        match self.index.get(&node.id) {
            Some(&slot) => {
                if self.nodes[slot] != node {
                    debug!("node {} seen again, replacing its properties", node.id);
                }
                self.nodes[slot] = node;
            }
            None => {
                self.index.insert(node.id.clone(), self.nodes.len());
                self.nodes.push(node);
            }
        }
    }

    pub fn push_link(&mut self, link: Link) {
        self.candidate_links.push(link);
    }

    pub fn node_count(&self) -> usize { self.nodes.len() }

    /// Resolve candidate links against the final node set.
    pub fn finish(self) -> GraphModel {
        let GraphModelBuilder { nodes, index, candidate_links } = self;
        let total = candidate_links.len();
        let links: Vec<Link> = candidate_links
            .into_iter()
            .filter(|l| index.contains_key(&l.source_id) && index.contains_key(&l.target_id))
            .collect();
        let dropped_links = total - links.len();
        if dropped_links > 0 {
            warn!("dropped {} link(s) with a missing endpoint", dropped_links);
        }
        GraphModel { nodes, links, index, dropped_links }
    }
}
