//! Edge in the property graph (§3).

use super::{EdgeId, NodeId, PropertyMap, RelationId, Value};
use serde::{Deserialize, Serialize};

/// Traversal direction used by `GetEdgesConnecting`/`GetNodeEdges` (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Out,
    In,
    Both,
}

/// An edge (directed, single relation type) in the property graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub src: NodeId,
    pub dst: NodeId,
    pub relation: RelationId,
    pub properties: PropertyMap,
}

impl Edge {
    pub fn new(id: EdgeId, src: NodeId, dst: NodeId, relation: RelationId) -> Self {
        Self {
            id,
            src,
            dst,
            relation,
            properties: PropertyMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// The "other" end of the edge from the given node (`None` if `from`
    /// is neither endpoint).
    pub fn other_node(&self, from: NodeId) -> Option<NodeId> {
        if from == self.src {
            Some(self.dst)
        } else if from == self.dst {
            Some(self.src)
        } else {
            None
        }
    }
}
