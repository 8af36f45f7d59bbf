//! # Persistence codec (C6, §4.6, §6)
//!
//! Encodes a graph to, and reconstructs it from, a sequence of fixed-size
//! shard records suitable for a host snapshot mechanism. Grounded on the
//! meta-key lifecycle in `examples/original_source/src/module_event_handlers.c`
//! (`_GraphContext_RequiredMetaKeys`, `_CreateGraphMetaKeys`,
//! `_DeleteGraphMetaKeys`) for the shard-count arithmetic and key-naming
//! scheme.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::config::{EngineConfig, VKEY_ENTITY_COUNT_UNLIMITED};
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::model::{EdgeId, LabelId, NodeId, PropertyMap, RelationId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub labels: Vec<String>,
    pub properties: PropertyMap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: EdgeId,
    pub src: NodeId,
    pub dst: NodeId,
    pub relation: String,
    pub properties: PropertyMap,
}

/// Per-record header (§6 "Persisted-state layout"). `label_names` and
/// `relation_names` carry the full schema snapshot, in id order; only the
/// primary shard's copy is consulted on decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardHeader {
    pub shard_index: u64,
    pub total_shards: u64,
    pub node_count: usize,
    pub edge_count: usize,
    pub deleted_node_count: usize,
    pub deleted_edge_count: usize,
    pub label_names: Vec<String>,
    pub relation_names: Vec<String>,
}

/// A node or edge, used only to chunk the two kinds together into one
/// combined entity stream before sharding (§C.2: each shard holds at most
/// `vkey_entity_count` entities total, not per kind).
#[derive(Debug, Clone)]
enum Entity {
    Node(NodeRecord),
    Edge(EdgeRecord),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardRecord {
    pub graph_name: String,
    pub header: ShardHeader,
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}

impl ShardRecord {
    pub fn is_primary(&self) -> bool {
        self.header.shard_index == 0
    }
}

/// `ceil(entity_count / vkey_entity_count)`, with the `UNLIMITED` sentinel
/// collapsing everything into a single shard (§C.2).
fn shard_count(entity_count: usize, vkey_entity_count: u64) -> usize {
    if entity_count == 0 {
        return 1;
    }
    if vkey_entity_count == VKEY_ENTITY_COUNT_UNLIMITED {
        return 1;
    }
    let per_shard = vkey_entity_count.max(1) as usize;
    (entity_count + per_shard - 1) / per_shard
}

/// Meta-key name for the `nth` (1-based) meta shard of `graph_name`,
/// co-located with the primary key per the tag scheme in §6: if the
/// graph's name already carries a `{...}` routing tag, the meta key reuses
/// it; otherwise the meta key wraps the name in one of its own.
pub fn meta_key_name(graph_name: &str, uuid: Uuid) -> String {
    if graph_name.contains('{') && graph_name.contains('}') {
        format!("{graph_name}_{uuid}")
    } else {
        format!("{{{graph_name}}}{graph_name}_{uuid}")
    }
}

/// Encoder state: tracks how many shards have been produced and the
/// meta-key names minted for cleanup, mirroring the bookkeeping the
/// retrieved original keeps per graph across an encode.
#[derive(Debug, Default)]
pub struct Encoder {
    meta_keys: Vec<String>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn meta_keys(&self) -> &[String] {
        &self.meta_keys
    }

    /// **Encode** (§4.6): reads the graph only, splits its entities into
    /// shards of at most `vkey_entity_count`, and mints one meta-key name
    /// per shard after the primary.
    #[instrument(skip(self, graph, config))]
    pub fn encode(&mut self, graph: &Graph, config: &EngineConfig) -> Vec<ShardRecord> {
        self.meta_keys.clear();

        let label_names = graph.label_names_ordered();
        let relation_names = graph.relation_names_ordered();
        let mut nodes = graph.all_nodes();
        let mut edges = graph.all_edges();
        nodes.sort_by_key(|n| n.id.0);
        edges.sort_by_key(|e| e.id.0);

        let total_entities = nodes.len() + edges.len();
        let total_shards = shard_count(total_entities, config.vkey_entity_count);
        let per_shard = if config.vkey_entity_count == VKEY_ENTITY_COUNT_UNLIMITED {
            total_entities.max(1)
        } else {
            config.vkey_entity_count.max(1) as usize
        };

        let mut entities: Vec<Entity> = Vec::with_capacity(total_entities);
        entities.extend(nodes.into_iter().map(|n| {
            Entity::Node(NodeRecord {
                id: n.id,
                labels: n
                    .labels
                    .iter()
                    .filter_map(|&l| graph.schema_label_name(l))
                    .collect(),
                properties: n.properties,
            })
        }));
        entities.extend(edges.into_iter().map(|e| {
            Entity::Edge(EdgeRecord {
                id: e.id,
                src: e.src,
                dst: e.dst,
                relation: graph.schema_relation_name(e.relation).unwrap_or_default(),
                properties: e.properties,
            })
        }));

        // Node and edge records are chunked together, not independently,
        // so a shard never holds more than `per_shard` entities total.
        let mut entity_chunks: Vec<Vec<Entity>> =
            entities.chunks(per_shard.max(1)).map(|c| c.to_vec()).collect();
        entity_chunks.resize(total_shards, Vec::new());

        let node_count = graph.node_count();
        let edge_count = graph.edge_count();
        let deleted_node_count = graph.deleted_node_count();
        let deleted_edge_count = graph.deleted_edge_count();

        let mut records = Vec::with_capacity(total_shards);
        for shard_index in 0..total_shards {
            let header = ShardHeader {
                shard_index: shard_index as u64,
                total_shards: total_shards as u64,
                node_count,
                edge_count,
                deleted_node_count,
                deleted_edge_count,
                label_names: if shard_index == 0 { label_names.clone() } else { Vec::new() },
                relation_names: if shard_index == 0 { relation_names.clone() } else { Vec::new() },
            };
            if shard_index > 0 {
                self.meta_keys.push(meta_key_name(&graph.name(), Uuid::new_v4()));
            }
            let mut shard_nodes = Vec::new();
            let mut shard_edges = Vec::new();
            for entity in std::mem::take(&mut entity_chunks[shard_index]) {
                match entity {
                    Entity::Node(n) => shard_nodes.push(n),
                    Entity::Edge(e) => shard_edges.push(e),
                }
            }
            records.push(ShardRecord {
                graph_name: graph.name(),
                header,
                nodes: shard_nodes,
                edges: shard_edges,
            });
        }
        records
    }
}

/// Decoder state: current shard index and entities seen so far, reset on
/// a completed decode or a host flush event (§C.1, mirrors
/// `_ResetDecodeStates`).
#[derive(Debug, Default)]
pub struct Decoder {
    shards_seen: usize,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset on a host flush event, matching `_ResetDecodeStates` in the
    /// retrieved original.
    pub fn reset(&mut self) {
        self.shards_seen = 0;
    }

    /// **Decode** (§4.6): order-independent across meta shards, but must
    /// see exactly the primary plus `N-1` meta shards. Any missing or
    /// duplicate shard fails `Consistency` and discards the partial graph.
    #[instrument(skip(self, shards, config))]
    pub fn decode(&mut self, shards: Vec<ShardRecord>, config: EngineConfig) -> Result<Graph> {
        self.shards_seen = 0;
        if shards.is_empty() {
            return Err(Error::Consistency("no shards supplied".into()));
        }

        let primary = shards
            .iter()
            .find(|s| s.is_primary())
            .ok_or_else(|| Error::Consistency("missing primary shard".into()))?
            .clone();

        let total_shards = primary.header.total_shards as usize;
        if total_shards != shards.len() {
            return Err(Error::Consistency(format!(
                "expected {total_shards} shards, got {}",
                shards.len()
            )));
        }

        let mut seen_indices = HashSet::with_capacity(shards.len());
        for shard in &shards {
            if !seen_indices.insert(shard.header.shard_index) {
                return Err(Error::Consistency(format!(
                    "duplicate shard index {}",
                    shard.header.shard_index
                )));
            }
        }
        for i in 0..total_shards as u64 {
            if !seen_indices.contains(&i) {
                return Err(Error::Consistency(format!("missing shard index {i}")));
            }
        }

        let graph = Graph::new(primary.graph_name.clone(), config);
        for name in &primary.header.label_names {
            graph.get_or_add_label(name);
        }
        for name in &primary.header.relation_names {
            graph.get_or_add_relation(name);
        }

        for shard in &shards {
            for node in &shard.nodes {
                let labels: Vec<LabelId> = node
                    .labels
                    .iter()
                    .map(|name| {
                        graph
                            .get_label(name)
                            .ok_or_else(|| Error::Consistency(format!("undeclared label {name}")))
                    })
                    .collect::<Result<_>>()?;
                graph.restore_node(node.id, labels, node.properties.clone());
            }
        }
        for shard in &shards {
            for edge in &shard.edges {
                let relation = graph
                    .get_relation(&edge.relation)
                    .ok_or_else(|| Error::Consistency(format!("undeclared relation {}", edge.relation)))?;
                graph.restore_edge(edge.id, edge.src, edge.dst, relation, edge.properties.clone());
            }
        }
        graph.finalize_restore();
        self.shards_seen = total_shards;

        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Direction, PropertyMap, property_map};

    fn sample_graph() -> Graph {
        let g = Graph::new("demo", EngineConfig::default());
        let person = g.get_or_add_label("Person");
        let knows = g.get_or_add_relation("KNOWS");
        let n0 = g.create_node(vec![person], property_map([("name", "Ada")]));
        let n1 = g.create_node(vec![person], property_map([("name", "Grace")]));
        g.create_edge(n0, n1, knows, property_map([("since", 1843)])).unwrap();
        g
    }

    #[test]
    fn meta_key_naming_wraps_untagged_names() {
        let id = Uuid::new_v4();
        let name = meta_key_name("mygraph", id);
        assert_eq!(name, format!("{{mygraph}}mygraph_{id}"));
    }

    #[test]
    fn meta_key_naming_reuses_existing_tag() {
        let id = Uuid::new_v4();
        let name = meta_key_name("{shard1}mygraph", id);
        assert_eq!(name, format!("{{shard1}}mygraph_{id}"));
    }

    #[test]
    fn shard_count_handles_unlimited_and_zero() {
        assert_eq!(shard_count(0, 10), 1);
        assert_eq!(shard_count(5, VKEY_ENTITY_COUNT_UNLIMITED), 1);
        assert_eq!(shard_count(5, 2), 3);
        assert_eq!(shard_count(4, 2), 2);
    }

    #[test]
    fn encode_with_small_vkey_produces_multiple_shards() {
        let g = sample_graph();
        let mut encoder = Encoder::new();
        let config = EngineConfig {
            vkey_entity_count: 1,
            ..EngineConfig::default()
        };
        let shards = encoder.encode(&g, &config);
        assert!(shards.len() >= 2);
        assert_eq!(encoder.meta_keys().len(), shards.len() - 1);
        assert_eq!(shards.iter().filter(|s| s.is_primary()).count(), 1);
    }

    #[test]
    fn round_trip_preserves_entities_and_properties() {
        let g = sample_graph();
        let mut encoder = Encoder::new();
        let config = EngineConfig {
            vkey_entity_count: 2,
            ..EngineConfig::default()
        };
        let shards = encoder.encode(&g, &config);

        let mut decoder = Decoder::new();
        let restored = decoder.decode(shards, config).unwrap();

        assert_eq!(restored.node_count(), g.node_count());
        assert_eq!(restored.edge_count(), g.edge_count());

        let person = restored.get_label("Person").unwrap();
        let nodes = restored.all_nodes();
        assert!(nodes.iter().any(|n| n.has_label(person) && n.get("name").unwrap().as_str() == Some("Ada")));

        let edges = restored.all_edges();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].get("since").unwrap().as_int(), Some(1843));

        let knows = restored.get_relation("KNOWS").unwrap();
        let from_ada = restored.get_node_edges(edges[0].src, Direction::Out, Some(&[knows]));
        assert_eq!(from_ada.len(), 1);
    }

    #[test]
    fn shard_entity_cap_is_enforced_on_the_combined_node_and_edge_count() {
        let g = Graph::new("demo", EngineConfig::default());
        let person = g.get_or_add_label("Person");
        let knows = g.get_or_add_relation("KNOWS");
        let nodes: Vec<_> = (0..3).map(|_| g.create_node(vec![person], PropertyMap::new())).collect();
        for &n in &nodes {
            g.create_edge(n, nodes[0], knows, PropertyMap::new()).unwrap();
        }

        let mut encoder = Encoder::new();
        let config = EngineConfig {
            vkey_entity_count: 2,
            ..EngineConfig::default()
        };
        let shards = encoder.encode(&g, &config);
        for shard in &shards {
            assert!(
                shard.nodes.len() + shard.edges.len() <= 2,
                "shard {} holds {} nodes + {} edges, exceeding vkey_entity_count",
                shard.header.shard_index,
                shard.nodes.len(),
                shard.edges.len()
            );
        }
    }

    #[test]
    fn decode_rejects_missing_shard() {
        let g = sample_graph();
        let mut encoder = Encoder::new();
        let config = EngineConfig {
            vkey_entity_count: 1,
            ..EngineConfig::default()
        };
        let mut shards = encoder.encode(&g, &config);
        shards.pop();

        let mut decoder = Decoder::new();
        let err = decoder.decode(shards, config).unwrap_err();
        assert!(matches!(err, Error::Consistency(_)));
    }
}
