//! Edit-script synthesis
//!
//! Two phases over a working copy of the source tree: a breadth-first pass
//! over the destination that inserts, updates, moves and aligns, then a
//! postorder sweep that deletes everything without a destination image.
//! The working copy must end up equivalent to the destination; anything
//! else is a bug surfaced as [`DiffError::PostConditionFailed`].

use crate::{
    compute_gumtree_mappings_with_config, longest_common_subsequence, AddBlockToInput,
    AddBlockToSequence, AddFieldToBlock, AddInputToBlock, AddLiteralToInput, AddSequenceToInput,
    AddSequenceToProgram, Delete, DiffError, Edit, EditScript, GumTreeConfig, MoveBlockInSequence,
    MoveBlockToSequence, MoveFieldToBlock, MoveInputToBlock, MoveNodeToInput,
    MoveSequenceInProgram, MoveSequenceToProgram, NodeMappings, Result, Update,
};
use ast_model::{AstTree, NodeId, NodeKind};
use std::collections::HashSet;

/// Compute an edit script turning `tree_from` into `tree_to`.
///
/// Neither input is modified; matching and application happen on a deep
/// copy. Applying the returned script to `tree_from` yields a tree
/// equivalent to `tree_to`.
pub fn compute_edit_script(tree_from: &AstTree, tree_to: &AstTree) -> Result<EditScript> {
    compute_edit_script_with_config(tree_from, tree_to, GumTreeConfig::default())
}

/// Compute an edit script under explicit matcher parameters
pub fn compute_edit_script_with_config(
    tree_from: &AstTree,
    tree_to: &AstTree,
    config: GumTreeConfig,
) -> Result<EditScript> {
    let mut work = tree_from.clone();
    let mut mappings = compute_gumtree_mappings_with_config(&work, tree_to, config)?;
    let mut script = EditScript::new();

    for y in tree_to.breadth_first(tree_to.root()) {
        match mappings.destination_is_mapped_to(&y).cloned() {
            None => synthesize_insert(&mut work, tree_to, &mut mappings, &mut script, &y)?,
            Some(x) => {
                if !work.surface_equivalent(&x, tree_to, &y) {
                    if let Some(update) = Update::compute(&work, &x, tree_to, &y) {
                        update.apply(&mut work)?;
                        script.push(update);
                    }
                }

                let parent_x = work.parent(&x).cloned();
                let parent_y = tree_to.parent(&y).cloned();
                if let (Some(parent_x), Some(parent_y)) = (parent_x, parent_y) {
                    if mappings.source_is_mapped_to(&parent_x) != Some(&parent_y) {
                        synthesize_move(&mut work, tree_to, &mappings, &mut script, &x, &y, &parent_y)?;
                    }
                }

                if matches!(
                    tree_to.node(&y)?.kind,
                    NodeKind::Sequence { .. } | NodeKind::Program { .. }
                ) {
                    align_children(&mut work, tree_to, &mappings, &mut script, &x, &y)?;
                }
            }
        }
    }

    let order = {
        let root = work.root().clone();
        work.postorder(&root)
    };
    for node in order {
        if !mappings.source_is_mapped(&node) {
            let delete = Delete { node_id: node };
            delete.apply(&mut work)?;
            script.push(delete);
        }
    }

    if !work.equivalent_trees(tree_to) {
        return Err(DiffError::PostConditionFailed);
    }
    tracing::debug!(edits = script.len(), "synthesized edit script");
    Ok(script)
}

/// Insertion index for `y`'s image under `target_parent`: one past the
/// image of the nearest left sibling that already lives there, else 0.
fn find_insertion_position(
    work: &AstTree,
    tree_to: &AstTree,
    mappings: &NodeMappings,
    y: &NodeId,
    target_parent: &NodeId,
) -> Result<usize> {
    let Some(parent_y) = tree_to.parent(y) else {
        return Ok(0);
    };
    let siblings = tree_to.children(parent_y);
    let index = siblings
        .iter()
        .position(|sibling| sibling == y)
        .ok_or_else(|| {
            DiffError::InvariantViolation(format!("{y} is not among its parent's children"))
        })?;

    for left in siblings[..index].iter().rev() {
        if let Some(image) = mappings.destination_is_mapped_to(left) {
            if work.parent(image) == Some(target_parent) {
                return Ok(work.position_of_child(target_parent, image)? + 1);
            }
        }
    }
    Ok(0)
}

fn synthesize_insert(
    work: &mut AstTree,
    tree_to: &AstTree,
    mappings: &mut NodeMappings,
    script: &mut EditScript,
    y: &NodeId,
) -> Result<()> {
    let parent_y = tree_to.parent(y).cloned().ok_or_else(|| {
        DiffError::InvariantViolation("destination root is unmapped".to_string())
    })?;
    // BFS order guarantees the parent was inserted or matched already
    let parent_image = mappings
        .destination_is_mapped_to(&parent_y)
        .cloned()
        .ok_or_else(|| {
            DiffError::InvariantViolation(format!("parent of {y} has no image in the source"))
        })?;

    let edit: Edit = match (&tree_to.node(y)?.kind, &work.node(&parent_image)?.kind) {
        (NodeKind::Sequence { .. }, NodeKind::Program { .. }) => AddSequenceToProgram {
            sequence_id: NodeId::fresh_sequence(),
            position: find_insertion_position(work, tree_to, mappings, y, &parent_image)?,
        }
        .into(),
        (NodeKind::Sequence { .. }, NodeKind::Input { name, .. }) => {
            let block = work.parent(&parent_image).cloned().ok_or_else(|| {
                DiffError::InvariantViolation(format!("input {parent_image} has no owning block"))
            })?;
            AddSequenceToInput {
                sequence_id: NodeId::fresh_sequence(),
                block_id: block,
                input_name: name.clone(),
            }
            .into()
        }
        (NodeKind::Block { opcode, is_shadow, .. }, NodeKind::Sequence { .. }) => {
            AddBlockToSequence {
                sequence_id: parent_image.clone(),
                block_id: NodeId::fresh(),
                position: find_insertion_position(work, tree_to, mappings, y, &parent_image)?,
                opcode: opcode.clone(),
                is_shadow: *is_shadow,
            }
            .into()
        }
        (NodeKind::Block { opcode, is_shadow, .. }, NodeKind::Input { .. }) => AddBlockToInput {
            input_id: parent_image.clone(),
            block_id: NodeId::fresh(),
            opcode: opcode.clone(),
            is_shadow: *is_shadow,
        }
        .into(),
        (NodeKind::Input { name, .. }, NodeKind::Block { .. }) => AddInputToBlock {
            block_id: parent_image.clone(),
            name: name.clone(),
        }
        .into(),
        (NodeKind::Field { name, value }, NodeKind::Block { .. }) => AddFieldToBlock {
            block_id: parent_image.clone(),
            name: name.clone(),
            value: value.clone(),
        }
        .into(),
        (NodeKind::Literal { value }, NodeKind::Input { .. }) => AddLiteralToInput {
            input_id: parent_image.clone(),
            value: value.clone(),
        }
        .into(),
        (kind, parent_kind) => {
            return Err(DiffError::UnsupportedInsertion {
                kind: kind.label(),
                parent_kind: parent_kind.label(),
            })
        }
    };

    let added = edit.apply(work)?.ok_or_else(|| {
        DiffError::InvariantViolation("addition did not produce a node".to_string())
    })?;
    mappings.add(work, tree_to, &added, y)?;
    script.push(edit);
    Ok(())
}

fn synthesize_move(
    work: &mut AstTree,
    tree_to: &AstTree,
    mappings: &NodeMappings,
    script: &mut EditScript,
    x: &NodeId,
    y: &NodeId,
    parent_y: &NodeId,
) -> Result<()> {
    let new_parent = mappings
        .destination_is_mapped_to(parent_y)
        .cloned()
        .ok_or_else(|| {
            DiffError::InvariantViolation(format!("parent of {y} has no image in the source"))
        })?;

    let edit: Edit = match (&work.node(x)?.kind, &work.node(&new_parent)?.kind) {
        (NodeKind::Input { .. }, NodeKind::Block { .. }) => MoveInputToBlock {
            move_from_block_id: work.parent(x).cloned().ok_or_else(|| {
                DiffError::InvariantViolation(format!("moved input {x} has no parent"))
            })?,
            move_to_block_id: new_parent.clone(),
            input_id: x.clone(),
        }
        .into(),
        (NodeKind::Field { .. }, NodeKind::Block { .. }) => MoveFieldToBlock {
            move_from_block_id: work.parent(x).cloned().ok_or_else(|| {
                DiffError::InvariantViolation(format!("moved field {x} has no parent"))
            })?,
            move_to_block_id: new_parent.clone(),
            field_id: x.clone(),
        }
        .into(),
        (NodeKind::Block { .. }, NodeKind::Sequence { .. }) => MoveBlockToSequence {
            block_id: x.clone(),
            sequence_id: new_parent.clone(),
            position: find_insertion_position(work, tree_to, mappings, y, &new_parent)?,
        }
        .into(),
        (NodeKind::Sequence { .. }, NodeKind::Program { .. }) => MoveSequenceToProgram {
            sequence_id: x.clone(),
            position: find_insertion_position(work, tree_to, mappings, y, &new_parent)?,
        }
        .into(),
        (
            NodeKind::Block { .. } | NodeKind::Sequence { .. } | NodeKind::Literal { .. },
            NodeKind::Input { name, .. },
        ) => {
            let block = work.parent(&new_parent).cloned().ok_or_else(|| {
                DiffError::InvariantViolation(format!("input {new_parent} has no owning block"))
            })?;
            MoveNodeToInput {
                node_id: x.clone(),
                parent_block_id: block,
                input_name: name.clone(),
            }
            .into()
        }
        (kind, parent_kind) => {
            return Err(DiffError::UnsupportedMove {
                kind: kind.label(),
                parent_kind: parent_kind.label(),
            })
        }
    };

    edit.apply(work)?;
    script.push(edit);
    Ok(())
}

/// Reorder the mapped children of a matched container pair.
///
/// Children paired in the mappings act as equal for the LCS; pairs outside
/// it are moved to the slot right after their nearest stable left
/// neighbour.
fn align_children(
    work: &mut AstTree,
    tree_to: &AstTree,
    mappings: &NodeMappings,
    script: &mut EditScript,
    x: &NodeId,
    y: &NodeId,
) -> Result<()> {
    let mapped_x: Vec<NodeId> = work
        .children(x)
        .into_iter()
        .filter(|child| mappings.source_is_mapped(child))
        .collect();
    let mapped_y: Vec<NodeId> = tree_to
        .children(y)
        .into_iter()
        .filter(|child| mappings.destination_is_mapped(child))
        .collect();
    if mapped_x.is_empty() || mapped_y.is_empty() {
        return Ok(());
    }

    let aligned: HashSet<NodeId> =
        longest_common_subsequence(&mapped_x, &mapped_y, |a, b| mappings.contains_pair(a, b))
            .into_iter()
            .map(|(_, b)| b)
            .collect();

    for child_y in &mapped_y {
        if aligned.contains(child_y) {
            continue;
        }
        let Some(child_x) = mappings.destination_is_mapped_to(child_y).cloned() else {
            continue;
        };
        if !mapped_x.contains(&child_x) {
            continue;
        }

        let position = find_insertion_position(work, tree_to, mappings, child_y, x)?;
        let edit: Edit = match work.node(x)?.kind {
            NodeKind::Sequence { .. } => MoveBlockInSequence {
                sequence_id: x.clone(),
                block_id: child_x,
                position,
            }
            .into(),
            NodeKind::Program { .. } => MoveSequenceInProgram {
                sequence_id: child_x,
                position,
            }
            .into(),
            _ => {
                return Err(DiffError::InvariantViolation(format!(
                    "alignment on non-positional parent {x}",
                )))
            }
        };
        edit.apply(work)?;
        script.push(edit);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack_program(blocks: &[(&str, &str)]) -> AstTree {
        let mut tree = AstTree::new_program();
        let head = blocks.first().expect("at least one block").0;
        let seq = tree
            .insert_sequence_into_program(NodeId::sequence_at(&NodeId::new(head)), 0)
            .unwrap();
        for (index, (id, opcode)) in blocks.iter().enumerate() {
            tree.insert_block_into_sequence(&seq, NodeId::new(*id), opcode, false, index)
                .unwrap();
        }
        tree
    }

    #[test]
    fn test_identity_diff_is_empty() {
        let tree = stack_program(&[
            ("a", "event_whenprogramstarts"),
            ("b", "spike_movement_startMoving"),
        ]);
        let script = compute_edit_script(&tree, &tree.clone()).unwrap();
        assert!(script.is_empty());
    }

    #[test]
    fn test_insert_block_at_position() {
        let before = stack_program(&[
            ("a", "event_whenprogramstarts"),
            ("b", "spike_movement_startMoving"),
            ("c", "spike_movement_stopMoving"),
            ("d", "spike_sound_playuntildone"),
        ]);
        let after = stack_program(&[
            ("a", "event_whenprogramstarts"),
            ("b", "spike_movement_startMoving"),
            ("n", "spike_play_beep"),
            ("c", "spike_movement_stopMoving"),
            ("d", "spike_sound_playuntildone"),
        ]);

        let script = compute_edit_script(&before, &after).unwrap();
        assert_eq!(script.len(), 1);
        let Edit::AddBlockToSequence(add) = &script.edits()[0] else {
            panic!("expected AddBlockToSequence, got {:?}", script.edits()[0]);
        };
        assert_eq!(add.position, 2);
        assert_eq!(add.opcode, "spike_play_beep");

        let edited = script.apply(&before).unwrap();
        assert!(edited.equivalent_trees(&after));
    }

    #[test]
    fn test_reorder_two_blocks_is_one_move() {
        let before = stack_program(&[
            ("a", "spike_movement_startMoving"),
            ("b", "spike_movement_stopMoving"),
        ]);
        let after = stack_program(&[
            ("b", "spike_movement_stopMoving"),
            ("a", "spike_movement_startMoving"),
        ]);

        let script = compute_edit_script(&before, &after).unwrap();
        assert_eq!(script.len(), 1);
        assert!(matches!(script.edits()[0], Edit::MoveBlockInSequence(_)));
        assert!(script.apply(&before).unwrap().equivalent_trees(&after));
    }

    #[test]
    fn test_opcode_change_is_one_update() {
        let build = |opcode: &str| {
            let mut tree = stack_program(&[("a", "event_whenprogramstarts")]);
            let seq = NodeId::new(":seq@a");
            let b = tree
                .insert_block_into_sequence(&seq, NodeId::new("b"), opcode, false, 1)
                .unwrap();
            tree.add_field_to_block(&b, "UNITS", "rotations").unwrap();
            tree
        };
        let before = build("spike_movement_startMoving");
        let after = build("spike_movement_stopMoving");

        let script = compute_edit_script(&before, &after).unwrap();
        assert_eq!(script.len(), 1);
        let Edit::Update(update) = &script.edits()[0] else {
            panic!("expected Update, got {:?}", script.edits()[0]);
        };
        assert_eq!(update.node_id, NodeId::new("b"));
        assert_eq!(update.value, "spike_movement_stopMoving");
        assert!(script.apply(&before).unwrap().equivalent_trees(&after));
    }

    #[test]
    fn test_delete_trailing_block() {
        let before = stack_program(&[
            ("a", "event_whenprogramstarts"),
            ("b", "spike_movement_startMoving"),
            ("c", "spike_movement_stopMoving"),
        ]);
        let after = stack_program(&[
            ("a", "event_whenprogramstarts"),
            ("b", "spike_movement_startMoving"),
        ]);

        let script = compute_edit_script(&before, &after).unwrap();
        assert_eq!(script.len(), 1);
        assert!(matches!(
            &script.edits()[0],
            Edit::Delete(delete) if delete.node_id == NodeId::new("c"),
        ));
        assert!(script.apply(&before).unwrap().equivalent_trees(&after));
    }

    #[test]
    fn test_unmapped_root_children_insert_and_delete() {
        let before = stack_program(&[("a", "spike_movement_startMoving")]);
        let after = stack_program(&[("z", "spike_sound_playuntildone")]);

        let script = compute_edit_script(&before, &after).unwrap();
        let edited = script.apply(&before).unwrap();
        assert!(edited.equivalent_trees(&after));
    }
}
