//! Node ID generation and the derived-ID scheme

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a node in a program tree.
///
/// IDs originating from a block description are opaque strings chosen by the
/// editor. IDs for synthesized nodes (sequences, inputs, fields, literals)
/// are derived from the ID of an anchor node, so that loading the same
/// program twice yields the same IDs. Nodes created by edits receive fresh
/// random IDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Create a NodeId from an existing string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create a fresh random NodeId
    pub fn fresh() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The fixed ID of a program root
    pub fn program() -> Self {
        Self("PROGRAM".to_string())
    }

    /// The ID of the sequence whose first block has the given ID
    pub fn sequence_at(first_block: &NodeId) -> Self {
        Self(format!(":seq@{first_block}"))
    }

    /// A fresh ID for a sequence created by an edit
    pub fn fresh_sequence() -> Self {
        Self(format!(":seq@{}", Uuid::new_v4()))
    }

    /// The ID of the named input slot on the given block
    pub fn input_on(block: &NodeId, name: &str) -> Self {
        Self(format!(":input[{name}]@{block}"))
    }

    /// The ID of the named field on the given block
    pub fn field_on(block: &NodeId, name: &str) -> Self {
        Self(format!(":field[{name}]@{block}"))
    }

    /// The ID of the literal stored in the given input
    pub fn literal_in(input: &NodeId) -> Self {
        Self(format!(":literal@{input}"))
    }

    /// View the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
