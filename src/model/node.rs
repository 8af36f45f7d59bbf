//! Node in the property graph (§3).

use super::{LabelId, NodeId, PropertyMap, Value};
use serde::{Deserialize, Serialize};

/// A node's caller-visible attributes. The engine's own bookkeeping (which
/// `L_k` label matrices are set for this node) is kept in sync by `Graph`;
/// `Node` itself is a plain DTO returned from reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub labels: Vec<LabelId>,
    pub properties: PropertyMap,
}

impl Node {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            labels: Vec::new(),
            properties: PropertyMap::new(),
        }
    }

    pub fn with_labels(mut self, labels: impl IntoIterator<Item = LabelId>) -> Self {
        self.labels = labels.into_iter().collect();
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn has_label(&self, label: LabelId) -> bool {
        self.labels.contains(&label)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}
