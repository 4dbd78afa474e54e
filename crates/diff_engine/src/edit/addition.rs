//! Additive edits

use crate::{DiffError, Result};
use ast_model::{AstTree, NodeId, Tag};
use serde::{Deserialize, Serialize};

fn named_input(tree: &AstTree, block: &NodeId, name: &str) -> Result<NodeId> {
    tree.find_input(block, name).ok_or_else(|| {
        DiffError::InvariantViolation(format!("block {block} has no input named {name}"))
    })
}

/// Insert a fresh empty sequence into the program's top level.
///
/// The created sequence's ID travels with the edit so that later edits in
/// the same script can address it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AddSequenceToProgram {
    pub sequence_id: NodeId,
    pub position: usize,
}

impl AddSequenceToProgram {
    pub fn apply(&self, tree: &mut AstTree) -> Result<Option<NodeId>> {
        tracing::debug!(sequence = %self.sequence_id, position = self.position, "add sequence to program");
        let id = tree.insert_sequence_into_program(self.sequence_id.clone(), self.position)?;
        tree.push_tag(&id, Tag::Added)?;
        Ok(Some(id))
    }
}

/// Make a fresh empty sequence the expression of a named input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AddSequenceToInput {
    pub sequence_id: NodeId,
    pub block_id: NodeId,
    pub input_name: String,
}

impl AddSequenceToInput {
    pub fn apply(&self, tree: &mut AstTree) -> Result<Option<NodeId>> {
        tracing::debug!(sequence = %self.sequence_id, block = %self.block_id, input = %self.input_name, "add sequence to input");
        let input = named_input(tree, &self.block_id, &self.input_name)?;
        let id = tree.insert_sequence_into_input(&input, self.sequence_id.clone())?;
        tree.push_tag(&id, Tag::Added)?;
        Ok(Some(id))
    }
}

/// Insert a bare named input into a block, preserving name order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AddInputToBlock {
    pub block_id: NodeId,
    pub name: String,
}

impl AddInputToBlock {
    pub fn apply(&self, tree: &mut AstTree) -> Result<Option<NodeId>> {
        tracing::debug!(block = %self.block_id, name = %self.name, "add input to block");
        let id = tree.add_input_to_block(&self.block_id, &self.name)?;
        tree.push_tag(&id, Tag::Added)?;
        Ok(Some(id))
    }
}

/// Insert a literal into an input that has no expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AddLiteralToInput {
    pub input_id: NodeId,
    pub value: String,
}

impl AddLiteralToInput {
    pub fn apply(&self, tree: &mut AstTree) -> Result<Option<NodeId>> {
        tracing::debug!(input = %self.input_id, value = %self.value, "add literal to input");
        let id = tree.add_literal_to_input(&self.input_id, &self.value)?;
        tree.push_tag(&id, Tag::Added)?;
        Ok(Some(id))
    }
}

/// Insert a childless block into a sequence at a position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AddBlockToSequence {
    pub sequence_id: NodeId,
    pub block_id: NodeId,
    pub position: usize,
    pub opcode: String,
    pub is_shadow: bool,
}

impl AddBlockToSequence {
    pub fn apply(&self, tree: &mut AstTree) -> Result<Option<NodeId>> {
        tracing::debug!(sequence = %self.sequence_id, block = %self.block_id, position = self.position, "add block to sequence");
        let id = tree.insert_block_into_sequence(
            &self.sequence_id,
            self.block_id.clone(),
            &self.opcode,
            self.is_shadow,
            self.position,
        )?;
        tree.push_tag(&id, Tag::Added)?;
        Ok(Some(id))
    }
}

/// Make a childless block the expression of an empty input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AddBlockToInput {
    pub input_id: NodeId,
    pub block_id: NodeId,
    pub opcode: String,
    pub is_shadow: bool,
}

impl AddBlockToInput {
    pub fn apply(&self, tree: &mut AstTree) -> Result<Option<NodeId>> {
        tracing::debug!(input = %self.input_id, block = %self.block_id, "add block to input");
        let id = tree.insert_block_into_input(
            &self.input_id,
            self.block_id.clone(),
            &self.opcode,
            self.is_shadow,
        )?;
        tree.push_tag(&id, Tag::Added)?;
        Ok(Some(id))
    }
}

/// Insert a named field into a block, preserving name order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AddFieldToBlock {
    pub block_id: NodeId,
    pub name: String,
    pub value: String,
}

impl AddFieldToBlock {
    pub fn apply(&self, tree: &mut AstTree) -> Result<Option<NodeId>> {
        tracing::debug!(block = %self.block_id, name = %self.name, "add field to block");
        let id = tree.add_field_to_block(&self.block_id, &self.name, &self.value)?;
        tree.push_tag(&id, Tag::Added)?;
        Ok(Some(id))
    }
}
