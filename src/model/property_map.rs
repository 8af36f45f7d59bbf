//! PropertyMap — the key-value store on nodes and edges (§3: "a property
//! bag (set of name→value pairs)").

use super::Value;
use std::collections::HashMap;

/// A map of property names to values.
pub type PropertyMap = HashMap<String, Value>;

/// Build a `PropertyMap` from an iterator of (key, value) pairs — the
/// common shape for constructing test fixtures and for decoding a shard's
/// property block (§6).
pub fn property_map<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> PropertyMap
where
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
