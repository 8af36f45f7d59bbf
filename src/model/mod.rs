//! # Property Graph Model
//!
//! Clean DTOs that define the property graph: nodes, edges, values, paths.
//! This module is pure data — no I/O, no locking, no matrix internals.

pub mod ids;
pub mod node;
pub mod path;
pub mod property_map;
pub mod relationship;
pub mod value;

pub use ids::{EdgeId, LabelId, NodeId, RelationId};
pub use node::Node;
pub use path::Path;
pub use property_map::PropertyMap;
pub use relationship::{Direction, Edge};
pub use value::Value;
