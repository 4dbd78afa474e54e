//! Move edits

use crate::{DiffError, Result};
use ast_model::{AstTree, NodeId, Tag};
use serde::{Deserialize, Serialize};

fn check_parent(tree: &AstTree, node: &NodeId, expected: &NodeId) -> Result<()> {
    if tree.parent(node) != Some(expected) {
        return Err(DiffError::InvariantViolation(format!(
            "node {node} is not a child of {expected}",
        )));
    }
    Ok(())
}

/// Reorder a block among its sequence siblings.
///
/// The target position is interpreted against the sequence before removal;
/// moving right therefore lands one slot earlier than the raw index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MoveBlockInSequence {
    pub sequence_id: NodeId,
    pub block_id: NodeId,
    pub position: usize,
}

impl MoveBlockInSequence {
    pub fn apply(&self, tree: &mut AstTree) -> Result<Option<NodeId>> {
        tracing::debug!(block = %self.block_id, sequence = %self.sequence_id, position = self.position, "move block in sequence");
        check_parent(tree, &self.block_id, &self.sequence_id)?;
        tree.move_child_within(&self.sequence_id, &self.block_id, self.position)?;
        tree.push_tag(&self.block_id, Tag::Moved)?;
        Ok(Some(self.block_id.clone()))
    }
}

/// Move a block into a different sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MoveBlockToSequence {
    pub block_id: NodeId,
    pub sequence_id: NodeId,
    pub position: usize,
}

impl MoveBlockToSequence {
    pub fn apply(&self, tree: &mut AstTree) -> Result<Option<NodeId>> {
        tracing::debug!(block = %self.block_id, sequence = %self.sequence_id, position = self.position, "move block to sequence");
        tree.detach(&self.block_id)?;
        tree.attach_block_to_sequence(&self.block_id, &self.sequence_id, self.position)?;
        tree.push_tag(&self.block_id, Tag::Moved)?;
        Ok(Some(self.block_id.clone()))
    }
}

/// Reorder a sequence among the program's top-level sequences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MoveSequenceInProgram {
    pub sequence_id: NodeId,
    pub position: usize,
}

impl MoveSequenceInProgram {
    pub fn apply(&self, tree: &mut AstTree) -> Result<Option<NodeId>> {
        tracing::debug!(sequence = %self.sequence_id, position = self.position, "move sequence in program");
        let root = tree.root().clone();
        check_parent(tree, &self.sequence_id, &root)?;
        tree.move_child_within(&root, &self.sequence_id, self.position)?;
        tree.push_tag(&self.sequence_id, Tag::Moved)?;
        Ok(Some(self.sequence_id.clone()))
    }
}

/// Move a sequence from elsewhere (an input) to the program's top level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MoveSequenceToProgram {
    pub sequence_id: NodeId,
    pub position: usize,
}

impl MoveSequenceToProgram {
    pub fn apply(&self, tree: &mut AstTree) -> Result<Option<NodeId>> {
        tracing::debug!(sequence = %self.sequence_id, position = self.position, "move sequence to program");
        tree.detach(&self.sequence_id)?;
        tree.attach_sequence_to_program(&self.sequence_id, self.position)?;
        tree.push_tag(&self.sequence_id, Tag::Moved)?;
        Ok(Some(self.sequence_id.clone()))
    }
}

/// Relocate an input slot from one block to another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MoveInputToBlock {
    pub move_from_block_id: NodeId,
    pub move_to_block_id: NodeId,
    pub input_id: NodeId,
}

impl MoveInputToBlock {
    pub fn apply(&self, tree: &mut AstTree) -> Result<Option<NodeId>> {
        tracing::debug!(input = %self.input_id, from = %self.move_from_block_id, to = %self.move_to_block_id, "move input to block");
        check_parent(tree, &self.input_id, &self.move_from_block_id)?;
        tree.detach(&self.input_id)?;
        tree.attach_input_to_block(&self.input_id, &self.move_to_block_id)?;
        tree.push_tag(&self.input_id, Tag::Moved)?;
        Ok(Some(self.input_id.clone()))
    }
}

/// Relocate a field from one block to another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MoveFieldToBlock {
    pub move_from_block_id: NodeId,
    pub move_to_block_id: NodeId,
    pub field_id: NodeId,
}

impl MoveFieldToBlock {
    pub fn apply(&self, tree: &mut AstTree) -> Result<Option<NodeId>> {
        tracing::debug!(field = %self.field_id, from = %self.move_from_block_id, to = %self.move_to_block_id, "move field to block");
        check_parent(tree, &self.field_id, &self.move_from_block_id)?;
        tree.detach(&self.field_id)?;
        tree.attach_field_to_block(&self.field_id, &self.move_to_block_id)?;
        tree.push_tag(&self.field_id, Tag::Moved)?;
        Ok(Some(self.field_id.clone()))
    }
}

/// Make an existing node (block, sequence or literal) the expression of a
/// named input on another block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MoveNodeToInput {
    pub node_id: NodeId,
    pub parent_block_id: NodeId,
    pub input_name: String,
}

impl MoveNodeToInput {
    pub fn apply(&self, tree: &mut AstTree) -> Result<Option<NodeId>> {
        tracing::debug!(node = %self.node_id, block = %self.parent_block_id, input = %self.input_name, "move node to input");
        let input = tree
            .find_input(&self.parent_block_id, &self.input_name)
            .ok_or_else(|| {
                DiffError::InvariantViolation(format!(
                    "block {} has no input named {}",
                    self.parent_block_id, self.input_name,
                ))
            })?;
        tree.detach(&self.node_id)?;
        tree.attach_expression(&input, &self.node_id)?;
        tree.push_tag(&self.node_id, Tag::Moved)?;
        Ok(Some(self.node_id.clone()))
    }
}
