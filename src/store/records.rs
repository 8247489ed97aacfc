use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Scalar property value carried by a stored entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Null => write!(f, "null"),
            PropertyValue::Bool(b) => write!(f, "{}", b),
            PropertyValue::Int(i) => write!(f, "{}", i),
            PropertyValue::Float(x) => write!(f, "{}", x),
            PropertyValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self { PropertyValue::Text(s.to_string()) }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self { PropertyValue::Text(s) }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self { PropertyValue::Int(i) }
}

impl From<f64> for PropertyValue {
    fn from(x: f64) -> Self { PropertyValue::Float(x) }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self { PropertyValue::Bool(b) }
}

pub type Properties = BTreeMap<String, PropertyValue>;

// One side of a traversal triple, as the store reports it
#[derive(Clone, Debug, PartialEq)]
pub struct EntityRecord {
    pub identity: i64,
    pub labels: Vec<String>,
    pub properties: Properties,
}

impl EntityRecord {
    pub fn new(identity: i64, labels: &[&str]) -> Self {
        Self {
            identity,
            labels: labels.iter().map(|l| l.to_string()).collect(),
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    // Primary classification: first label, empty when the entity carries none
    pub fn primary_label(&self) -> &str {
        self.labels.first().map(String::as_str).unwrap_or("")
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RelationshipRecord {
    pub rel_type: String,
}

/// A single `(head)-[relationship]->(tail)` row of the traversal.
#[derive(Clone, Debug, PartialEq)]
pub struct TraversalRecord {
    pub head: EntityRecord,
    pub relationship: RelationshipRecord,
    pub tail: EntityRecord,
}

impl TraversalRecord {
    pub fn new(head: EntityRecord, rel_type: &str, tail: EntityRecord) -> Self {
        Self {
            head,
            relationship: RelationshipRecord { rel_type: rel_type.to_string() },
            tail,
        }
    }
}
