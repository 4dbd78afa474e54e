//! Core node types for the program tree

use crate::NodeId;
use serde::{Deserialize, Serialize};

/// Visualization annotations attached to nodes touched by edits.
///
/// Tags never participate in equivalence; they exist so that external
/// renderers can highlight what an edit script did to a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tag {
    Added,
    Deleted,
    Moved,
    Updated,
}

/// Payload of a node, one variant per syntactic shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Root of a program; owns the top-level sequences in author order
    Program { top_level: Vec<NodeId> },
    /// Straight-line run of blocks, in execution order
    Sequence { blocks: Vec<NodeId> },
    /// A statement or expression unit
    Block {
        opcode: String,
        /// Sorted lexicographically by field name
        fields: Vec<NodeId>,
        /// Sorted lexicographically by input name
        inputs: Vec<NodeId>,
        is_shadow: bool,
    },
    /// Named expression slot on a block, holding at most one expression
    Input {
        name: String,
        expression: Option<NodeId>,
    },
    /// Named terminal holding a picker value
    Field { name: String, value: String },
    /// Scalar stored inline in an input
    Literal { value: String },
}

impl NodeKind {
    /// Short label for diagnostics and errors
    pub fn label(&self) -> &'static str {
        match self {
            Self::Program { .. } => "program",
            Self::Sequence { .. } => "sequence",
            Self::Block { .. } => "block",
            Self::Input { .. } => "input",
            Self::Field { .. } => "field",
            Self::Literal { .. } => "literal",
        }
    }

    /// Whether two payloads are the same variant, ignoring their contents
    pub fn same_kind(&self, other: &NodeKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Whether this variant can never have children
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Field { .. } | Self::Literal { .. })
    }
}

/// A node in the tree: identity, parent back-reference, annotations, payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AstNode {
    /// Stable identifier, unique within a tree
    pub id: NodeId,
    /// The owning parent (None for the root)
    pub parent: Option<NodeId>,
    /// Visualization annotations; never part of equivalence
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    /// Variant payload
    pub kind: NodeKind,
}

impl AstNode {
    /// Create a detached node
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            parent: None,
            tags: Vec::new(),
            kind,
        }
    }

    /// The IDs of this node's children, in tree order.
    ///
    /// Blocks list their fields before their inputs, each run sorted by
    /// name; sequences and programs keep semantic order.
    pub fn child_ids(&self) -> Vec<NodeId> {
        match &self.kind {
            NodeKind::Program { top_level } => top_level.clone(),
            NodeKind::Sequence { blocks } => blocks.clone(),
            NodeKind::Block { fields, inputs, .. } => {
                fields.iter().chain(inputs.iter()).cloned().collect()
            }
            NodeKind::Input { expression, .. } => expression.iter().cloned().collect(),
            NodeKind::Field { .. } | NodeKind::Literal { .. } => Vec::new(),
        }
    }

    /// Whether this node has any children
    pub fn has_children(&self) -> bool {
        match &self.kind {
            NodeKind::Program { top_level } => !top_level.is_empty(),
            NodeKind::Sequence { blocks } => !blocks.is_empty(),
            NodeKind::Block { fields, inputs, .. } => !fields.is_empty() || !inputs.is_empty(),
            NodeKind::Input { expression, .. } => expression.is_some(),
            NodeKind::Field { .. } | NodeKind::Literal { .. } => false,
        }
    }
}
