//! Deletion

use crate::Result;
use ast_model::{AstTree, NodeId, Tag};
use serde::{Deserialize, Serialize};

/// Remove a childless node from the tree.
///
/// Deleting a node that still has children is an invariant violation; the
/// synthesizer always deletes in postorder so leaves go first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Delete {
    pub node_id: NodeId,
}

impl Delete {
    pub fn apply(&self, tree: &mut AstTree) -> Result<Option<NodeId>> {
        tracing::debug!(node = %self.node_id, "delete node");
        tree.remove_leaf(&self.node_id)?;
        Ok(None)
    }

    /// Dry-run variant: tag the node `Deleted` and keep it in place
    pub fn mark_only(&self, tree: &mut AstTree) -> Result<Option<NodeId>> {
        tree.push_tag(&self.node_id, Tag::Deleted)?;
        Ok(None)
    }
}
