//! Weighted distance over edit scripts

use crate::{Delete, Edit, EditScript, Result, Update};
use ast_model::{AstTree, NodeKind};
use serde::{Deserialize, Serialize};

/// Per-kind edit costs.
///
/// Structural blocks and sequences dominate the distance; fields and
/// inputs ride along with their blocks and cost nothing to create, drop or
/// relink. Intra-sequence reorders count half a cross-sequence move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceWeights {
    pub delete_block: f64,
    pub delete_sequence: f64,
    pub delete_literal: f64,
    pub delete_field: f64,
    pub delete_input: f64,

    pub insert_block: f64,
    pub insert_sequence: f64,
    pub insert_literal: f64,
    pub insert_field: f64,
    pub insert_input: f64,

    pub move_block_in_sequence: f64,
    pub move_block_to_sequence: f64,
    pub move_field_to_block: f64,
    pub move_input_to_block: f64,
    pub move_node_to_input: f64,
    pub move_sequence_in_program: f64,
    pub move_sequence_to_program: f64,

    pub update_block: f64,
    pub update_literal: f64,
    pub update_field: f64,
    pub update_input: f64,
}

impl Default for DistanceWeights {
    fn default() -> Self {
        Self {
            delete_block: 0.5,
            delete_sequence: 0.5,
            delete_literal: 0.5,
            delete_field: 0.0,
            delete_input: 0.0,

            insert_block: 1.0,
            insert_sequence: 1.0,
            insert_literal: 0.0,
            insert_field: 0.0,
            insert_input: 0.0,

            move_block_in_sequence: 0.5,
            move_block_to_sequence: 1.0,
            move_field_to_block: 0.0,
            move_input_to_block: 0.0,
            move_node_to_input: 0.5,
            move_sequence_in_program: 0.5,
            move_sequence_to_program: 1.0,

            update_block: 1.0,
            update_literal: 0.5,
            update_field: 0.5,
            update_input: 0.0,
        }
    }
}

/// Weighted distance of an edit script under default weights.
///
/// `tree_after` may carry an already-applied destination; when absent the
/// script is applied to `tree_from` first, which also validates it.
pub fn compute_distance(
    tree_from: &AstTree,
    script: &EditScript,
    tree_after: Option<&AstTree>,
) -> Result<f64> {
    compute_distance_with_weights(tree_from, script, tree_after, &DistanceWeights::default())
}

/// Weighted distance of an edit script
pub fn compute_distance_with_weights(
    tree_from: &AstTree,
    script: &EditScript,
    tree_after: Option<&AstTree>,
    weights: &DistanceWeights,
) -> Result<f64> {
    if tree_after.is_none() {
        script.apply(tree_from)?;
    }

    let mut cost = 0.0;
    for edit in script {
        cost += match edit {
            Edit::AddSequenceToProgram(_) | Edit::AddSequenceToInput(_) => weights.insert_sequence,
            Edit::AddBlockToSequence(_) | Edit::AddBlockToInput(_) => weights.insert_block,
            Edit::AddFieldToBlock(_) => weights.insert_field,
            Edit::AddInputToBlock(_) => weights.insert_input,
            Edit::AddLiteralToInput(_) => weights.insert_literal,

            Edit::MoveBlockInSequence(_) => weights.move_block_in_sequence,
            Edit::MoveBlockToSequence(_) => weights.move_block_to_sequence,
            Edit::MoveFieldToBlock(_) => weights.move_field_to_block,
            Edit::MoveInputToBlock(_) => weights.move_input_to_block,
            Edit::MoveNodeToInput(_) => weights.move_node_to_input,
            Edit::MoveSequenceInProgram(_) => weights.move_sequence_in_program,
            Edit::MoveSequenceToProgram(_) => weights.move_sequence_to_program,

            Edit::Update(update) => update_cost(tree_from, update, weights)?,
            Edit::Delete(delete) => delete_cost(tree_from, delete, weights)?,
        };
    }
    Ok(cost)
}

fn update_cost(tree_from: &AstTree, update: &Update, weights: &DistanceWeights) -> Result<f64> {
    Ok(match &tree_from.node(&update.node_id)?.kind {
        NodeKind::Block { .. } => weights.update_block,
        NodeKind::Literal { .. } => weights.update_literal,
        NodeKind::Field { .. } => weights.update_field,
        NodeKind::Input { .. } => weights.update_input,
        NodeKind::Program { .. } | NodeKind::Sequence { .. } => 0.0,
    })
}

fn delete_cost(tree_from: &AstTree, delete: &Delete, weights: &DistanceWeights) -> Result<f64> {
    Ok(match &tree_from.node(&delete.node_id)?.kind {
        NodeKind::Block { .. } => weights.delete_block,
        NodeKind::Sequence { .. } => weights.delete_sequence,
        NodeKind::Literal { .. } => weights.delete_literal,
        NodeKind::Field { .. } => weights.delete_field,
        NodeKind::Input { .. } => weights.delete_input,
        NodeKind::Program { .. } => 0.0,
    })
}
