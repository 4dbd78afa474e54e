//! Program tree storage and operations

use crate::{AstNode, BlockCategory, ModelError, NodeId, NodeKind, Result, Tag};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// A rooted, ordered program tree.
///
/// Nodes live in an ID-keyed arena; structure is expressed through child ID
/// lists and parent back-references. Every non-root node is owned by exactly
/// one parent. `Clone` produces a deep copy with identical IDs and tags that
/// shares no storage with the original.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AstTree {
    root: NodeId,
    nodes: HashMap<NodeId, AstNode>,
}

impl AstTree {
    /// Create a tree holding an empty program root
    pub fn new_program() -> Self {
        let root = NodeId::program();
        let mut nodes = HashMap::new();
        nodes.insert(
            root.clone(),
            AstNode::new(root.clone(), NodeKind::Program { top_level: Vec::new() }),
        );
        Self { root, nodes }
    }

    /// The root node's ID
    pub fn root(&self) -> &NodeId {
        &self.root
    }

    /// Number of nodes in the tree
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a node by ID
    pub fn get(&self, id: &NodeId) -> Option<&AstNode> {
        self.nodes.get(id)
    }

    /// Look up a node by ID, failing if it does not exist
    pub fn node(&self, id: &NodeId) -> Result<&AstNode> {
        self.nodes
            .get(id)
            .ok_or_else(|| ModelError::NodeNotFound(id.clone()))
    }

    fn node_mut(&mut self, id: &NodeId) -> Result<&mut AstNode> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| ModelError::NodeNotFound(id.clone()))
    }

    /// Whether a node with the given ID exists
    pub fn contains_id(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Find the node with the given ID, if any.
    ///
    /// IDs are unique within a tree, so this is a direct arena lookup.
    pub fn find(&self, id: &NodeId) -> Option<&AstNode> {
        self.nodes.get(id)
    }

    /// Whether `id` lies in the subtree rooted at `ancestor` (inclusive)
    pub fn contains(&self, ancestor: &NodeId, id: &NodeId) -> bool {
        let mut current = Some(id.clone());
        while let Some(node_id) = current {
            if &node_id == ancestor {
                return true;
            }
            current = self.get(&node_id).and_then(|n| n.parent.clone());
        }
        false
    }

    /// The parent of a node (None for the root or an unknown ID)
    pub fn parent(&self, id: &NodeId) -> Option<&NodeId> {
        self.get(id).and_then(|n| n.parent.as_ref())
    }

    /// Ordered child IDs of a node
    pub fn children(&self, id: &NodeId) -> Vec<NodeId> {
        self.get(id).map(|n| n.child_ids()).unwrap_or_default()
    }

    /// Whether a node has any children
    pub fn has_children(&self, id: &NodeId) -> bool {
        self.get(id).is_some_and(|n| n.has_children())
    }

    /// Position of `child` among the ordered children of a program or
    /// sequence node. Fails for other parent kinds or a non-child.
    pub fn position_of_child(&self, parent: &NodeId, child: &NodeId) -> Result<usize> {
        let list = match &self.node(parent)?.kind {
            NodeKind::Program { top_level } => top_level,
            NodeKind::Sequence { blocks } => blocks,
            kind => {
                return Err(ModelError::InvalidOperation(format!(
                    "children of {} ({}) are not positional",
                    parent,
                    kind.label(),
                )))
            }
        };
        list.iter()
            .position(|id| id == child)
            .ok_or_else(|| ModelError::NotAChild {
                parent: parent.clone(),
                child: child.clone(),
            })
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    /// Height of the subtree rooted at `id`: 1 at leaves
    pub fn height(&self, id: &NodeId) -> usize {
        self.children(id)
            .iter()
            .map(|child| self.height(child))
            .max()
            .unwrap_or(0)
            + 1
    }

    /// Number of nodes in the subtree rooted at `id` (inclusive)
    pub fn size(&self, id: &NodeId) -> usize {
        1 + self.children(id).iter().map(|c| self.size(c)).sum::<usize>()
    }

    /// All strict descendants of `id`, depth-first pre-order
    pub fn descendants(&self, id: &NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        for child in self.children(id) {
            let nested = self.descendants(&child);
            out.push(child);
            out.extend(nested);
        }
        out
    }

    /// `id` followed by its descendants, depth-first pre-order
    pub fn subtree_nodes(&self, id: &NodeId) -> Vec<NodeId> {
        let mut out = vec![id.clone()];
        out.extend(self.descendants(id));
        out
    }

    /// Post-order traversal of the subtree rooted at `id`
    pub fn postorder(&self, id: &NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        for child in self.children(id) {
            out.extend(self.postorder(&child));
        }
        out.push(id.clone());
        out
    }

    /// Breadth-first traversal of the subtree rooted at `id`
    pub fn breadth_first(&self, id: &NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut queue = VecDeque::from([id.clone()]);
        while let Some(next) = queue.pop_front() {
            queue.extend(self.children(&next));
            out.push(next);
        }
        out
    }

    // =========================================================================
    // Equivalence
    // =========================================================================

    /// Surface equivalence: same variant and same scalar attributes,
    /// ignoring children. Shadow flags are not part of block identity.
    pub fn surface_equivalent(&self, a: &NodeId, other: &AstTree, b: &NodeId) -> bool {
        let (Some(node_a), Some(node_b)) = (self.get(a), other.get(b)) else {
            return false;
        };
        match (&node_a.kind, &node_b.kind) {
            (NodeKind::Program { .. }, NodeKind::Program { .. }) => true,
            (NodeKind::Sequence { .. }, NodeKind::Sequence { .. }) => true,
            (NodeKind::Block { opcode: oa, .. }, NodeKind::Block { opcode: ob, .. }) => oa == ob,
            (NodeKind::Input { name: na, .. }, NodeKind::Input { name: nb, .. }) => na == nb,
            (
                NodeKind::Field { name: na, value: va },
                NodeKind::Field { name: nb, value: vb },
            ) => na == nb && va == vb,
            (NodeKind::Literal { value: va }, NodeKind::Literal { value: vb }) => va == vb,
            _ => false,
        }
    }

    /// Deep equivalence: surface equivalence plus matching arity and
    /// positionally equivalent children.
    pub fn equivalent(&self, a: &NodeId, other: &AstTree, b: &NodeId) -> bool {
        if !self.surface_equivalent(a, other, b) {
            return false;
        }
        let children_a = self.children(a);
        let children_b = other.children(b);
        if children_a.len() != children_b.len() {
            return false;
        }
        children_a
            .iter()
            .zip(children_b.iter())
            .all(|(ca, cb)| self.equivalent(ca, other, cb))
    }

    /// Whether the two trees are equivalent from their roots
    pub fn equivalent_trees(&self, other: &AstTree) -> bool {
        self.equivalent(&self.root, other, &other.root)
    }

    /// Deep copy of the subtree rooted at `id` as a standalone tree.
    /// IDs and tags are preserved; storage is disjoint.
    pub fn copy_subtree(&self, id: &NodeId) -> Result<AstTree> {
        let mut nodes = HashMap::new();
        for node_id in self.subtree_nodes(id) {
            nodes.insert(node_id.clone(), self.node(&node_id)?.clone());
        }
        let root_node = nodes
            .get_mut(id)
            .ok_or_else(|| ModelError::NodeNotFound(id.clone()))?;
        root_node.parent = None;
        Ok(AstTree {
            root: id.clone(),
            nodes,
        })
    }

    // =========================================================================
    // Block and input accessors
    // =========================================================================

    /// The opcode of a block
    pub fn opcode(&self, block: &NodeId) -> Result<&str> {
        match &self.node(block)?.kind {
            NodeKind::Block { opcode, .. } => Ok(opcode),
            kind => Err(ModelError::InvalidOperation(format!(
                "node {} is a {}, not a block",
                block,
                kind.label(),
            ))),
        }
    }

    /// The palette category encoded in a block's opcode prefix
    pub fn category(&self, block: &NodeId) -> Result<BlockCategory> {
        Ok(BlockCategory::from_opcode(self.opcode(block)?))
    }

    /// Find the named input slot on a block
    pub fn find_input(&self, block: &NodeId, name: &str) -> Option<NodeId> {
        let NodeKind::Block { inputs, .. } = &self.get(block)?.kind else {
            return None;
        };
        for id in inputs {
            if let Some(NodeKind::Input { name: existing, .. }) = self.get(id).map(|n| &n.kind) {
                if existing.as_str() == name {
                    return Some(id.clone());
                }
            }
        }
        None
    }

    /// Find the named field on a block
    pub fn find_field(&self, block: &NodeId, name: &str) -> Option<NodeId> {
        let NodeKind::Block { fields, .. } = &self.get(block)?.kind else {
            return None;
        };
        for id in fields {
            if let Some(NodeKind::Field { name: existing, .. }) = self.get(id).map(|n| &n.kind) {
                if existing.as_str() == name {
                    return Some(id.clone());
                }
            }
        }
        None
    }

    /// The expression held by an input, if any
    pub fn expression(&self, input: &NodeId) -> Option<NodeId> {
        match &self.get(input)?.kind {
            NodeKind::Input { expression, .. } => expression.clone(),
            _ => None,
        }
    }

    // =========================================================================
    // Node creation
    // =========================================================================

    fn insert_node(&mut self, node: AstNode) -> Result<NodeId> {
        let id = node.id.clone();
        if self.nodes.contains_key(&id) {
            return Err(ModelError::DuplicateId(id));
        }
        self.nodes.insert(id.clone(), node);
        Ok(id)
    }

    /// Create an empty sequence and insert it into the program's top level.
    /// Positions past the end append.
    pub fn insert_sequence_into_program(&mut self, id: NodeId, position: usize) -> Result<NodeId> {
        let root = self.root.clone();
        let id = self.insert_node(AstNode::new(id, NodeKind::Sequence { blocks: Vec::new() }))?;
        self.node_mut(&id)?.parent = Some(root.clone());
        match &mut self.node_mut(&root)?.kind {
            NodeKind::Program { top_level } => {
                let at = position.min(top_level.len());
                top_level.insert(at, id.clone());
            }
            _ => unreachable!("tree root is always a program"),
        }
        Ok(id)
    }

    /// Create an empty sequence as the expression of an input
    pub fn insert_sequence_into_input(&mut self, input: &NodeId, id: NodeId) -> Result<NodeId> {
        self.ensure_input_empty(input)?;
        let id = self.insert_node(AstNode::new(id, NodeKind::Sequence { blocks: Vec::new() }))?;
        self.node_mut(&id)?.parent = Some(input.clone());
        if let NodeKind::Input { expression, .. } = &mut self.node_mut(input)?.kind {
            *expression = Some(id.clone());
        }
        Ok(id)
    }

    /// Create a childless block and insert it into a sequence.
    /// Positions past the end append.
    pub fn insert_block_into_sequence(
        &mut self,
        sequence: &NodeId,
        id: NodeId,
        opcode: &str,
        is_shadow: bool,
        position: usize,
    ) -> Result<NodeId> {
        match &self.node(sequence)?.kind {
            NodeKind::Sequence { .. } => {}
            kind => {
                return Err(ModelError::WrongChildKind {
                    parent: sequence.clone(),
                    child: id,
                    expected: "sequence",
                    found: kind.label(),
                })
            }
        }
        let id = self.insert_node(AstNode::new(
            id,
            NodeKind::Block {
                opcode: opcode.to_string(),
                fields: Vec::new(),
                inputs: Vec::new(),
                is_shadow,
            },
        ))?;
        self.node_mut(&id)?.parent = Some(sequence.clone());
        if let NodeKind::Sequence { blocks } = &mut self.node_mut(sequence)?.kind {
            let at = position.min(blocks.len());
            blocks.insert(at, id.clone());
        }
        Ok(id)
    }

    /// Create a childless block as the expression of an input
    pub fn insert_block_into_input(
        &mut self,
        input: &NodeId,
        id: NodeId,
        opcode: &str,
        is_shadow: bool,
    ) -> Result<NodeId> {
        self.ensure_input_empty(input)?;
        let id = self.insert_node(AstNode::new(
            id,
            NodeKind::Block {
                opcode: opcode.to_string(),
                fields: Vec::new(),
                inputs: Vec::new(),
                is_shadow,
            },
        ))?;
        self.node_mut(&id)?.parent = Some(input.clone());
        if let NodeKind::Input { expression, .. } = &mut self.node_mut(input)?.kind {
            *expression = Some(id.clone());
        }
        Ok(id)
    }

    /// Create a bare named input on a block, keeping inputs sorted by name
    pub fn add_input_to_block(&mut self, block: &NodeId, name: &str) -> Result<NodeId> {
        let id = NodeId::input_on(block, name);
        match &self.node(block)?.kind {
            NodeKind::Block { .. } => {}
            kind => {
                return Err(ModelError::WrongChildKind {
                    parent: block.clone(),
                    child: id,
                    expected: "block",
                    found: kind.label(),
                })
            }
        }
        let id = self.insert_node(AstNode::new(
            id,
            NodeKind::Input {
                name: name.to_string(),
                expression: None,
            },
        ))?;
        self.node_mut(&id)?.parent = Some(block.clone());
        let at = self.sorted_input_position(block, name)?;
        if let NodeKind::Block { inputs, .. } = &mut self.node_mut(block)?.kind {
            inputs.insert(at, id.clone());
        }
        Ok(id)
    }

    /// Create a named field on a block, keeping fields sorted by name
    pub fn add_field_to_block(&mut self, block: &NodeId, name: &str, value: &str) -> Result<NodeId> {
        let id = NodeId::field_on(block, name);
        match &self.node(block)?.kind {
            NodeKind::Block { .. } => {}
            kind => {
                return Err(ModelError::WrongChildKind {
                    parent: block.clone(),
                    child: id,
                    expected: "block",
                    found: kind.label(),
                })
            }
        }
        let id = self.insert_node(AstNode::new(
            id,
            NodeKind::Field {
                name: name.to_string(),
                value: value.to_string(),
            },
        ))?;
        self.node_mut(&id)?.parent = Some(block.clone());
        let at = self.sorted_field_position(block, name)?;
        if let NodeKind::Block { fields, .. } = &mut self.node_mut(block)?.kind {
            fields.insert(at, id.clone());
        }
        Ok(id)
    }

    /// Create a literal as the expression of an empty input
    pub fn add_literal_to_input(&mut self, input: &NodeId, value: &str) -> Result<NodeId> {
        self.ensure_input_empty(input)?;
        let id = NodeId::literal_in(input);
        let id = self.insert_node(AstNode::new(
            id,
            NodeKind::Literal {
                value: value.to_string(),
            },
        ))?;
        self.node_mut(&id)?.parent = Some(input.clone());
        if let NodeKind::Input { expression, .. } = &mut self.node_mut(input)?.kind {
            *expression = Some(id.clone());
        }
        Ok(id)
    }

    fn ensure_input_empty(&self, input: &NodeId) -> Result<()> {
        match &self.node(input)?.kind {
            NodeKind::Input { expression: None, .. } => Ok(()),
            NodeKind::Input { expression: Some(_), .. } => {
                Err(ModelError::InputOccupied(input.clone()))
            }
            kind => Err(ModelError::InvalidOperation(format!(
                "node {} is a {}, not an input",
                input,
                kind.label(),
            ))),
        }
    }

    fn sorted_input_position(&self, block: &NodeId, name: &str) -> Result<usize> {
        let NodeKind::Block { inputs, .. } = &self.node(block)?.kind else {
            unreachable!("caller checked the parent is a block");
        };
        let mut at = inputs.len();
        for (index, id) in inputs.iter().enumerate() {
            if let Some(NodeKind::Input { name: existing, .. }) = self.get(id).map(|n| &n.kind) {
                if existing.as_str() > name {
                    at = index;
                    break;
                }
            }
        }
        Ok(at)
    }

    fn sorted_field_position(&self, block: &NodeId, name: &str) -> Result<usize> {
        let NodeKind::Block { fields, .. } = &self.node(block)?.kind else {
            unreachable!("caller checked the parent is a block");
        };
        let mut at = fields.len();
        for (index, id) in fields.iter().enumerate() {
            if let Some(NodeKind::Field { name: existing, .. }) = self.get(id).map(|n| &n.kind) {
                if existing.as_str() > name {
                    at = index;
                    break;
                }
            }
        }
        Ok(at)
    }

    // =========================================================================
    // Structural mutation
    // =========================================================================

    /// Unlink a node from its parent. The node and its subtree stay in the
    /// arena, detached, until re-attached or removed.
    pub fn detach(&mut self, id: &NodeId) -> Result<()> {
        let parent = self
            .node(id)?
            .parent
            .clone()
            .ok_or_else(|| ModelError::NotAttached(id.clone()))?;
        let removed = match &mut self.node_mut(&parent)?.kind {
            NodeKind::Program { top_level } => remove_id(top_level, id),
            NodeKind::Sequence { blocks } => remove_id(blocks, id),
            NodeKind::Block { fields, inputs, .. } => {
                remove_id(fields, id) || remove_id(inputs, id)
            }
            NodeKind::Input { expression, .. } => {
                if expression.as_ref() == Some(id) {
                    *expression = None;
                    true
                } else {
                    false
                }
            }
            NodeKind::Field { .. } | NodeKind::Literal { .. } => false,
        };
        if !removed {
            return Err(ModelError::NotAChild {
                parent,
                child: id.clone(),
            });
        }
        self.node_mut(id)?.parent = None;
        Ok(())
    }

    /// Attach a detached block into a sequence at the given position
    pub fn attach_block_to_sequence(
        &mut self,
        block: &NodeId,
        sequence: &NodeId,
        position: usize,
    ) -> Result<()> {
        self.ensure_detached(block)?;
        self.ensure_kind(block, "block")?;
        match &mut self.node_mut(sequence)?.kind {
            NodeKind::Sequence { blocks } => {
                let at = position.min(blocks.len());
                blocks.insert(at, block.clone());
            }
            kind => {
                return Err(ModelError::WrongChildKind {
                    parent: sequence.clone(),
                    child: block.clone(),
                    expected: "sequence",
                    found: kind.label(),
                })
            }
        }
        self.node_mut(block)?.parent = Some(sequence.clone());
        Ok(())
    }

    /// Attach a detached sequence into the program at the given position
    pub fn attach_sequence_to_program(&mut self, sequence: &NodeId, position: usize) -> Result<()> {
        self.ensure_detached(sequence)?;
        self.ensure_kind(sequence, "sequence")?;
        let root = self.root.clone();
        if let NodeKind::Program { top_level } = &mut self.node_mut(&root)?.kind {
            let at = position.min(top_level.len());
            top_level.insert(at, sequence.clone());
        }
        self.node_mut(sequence)?.parent = Some(root);
        Ok(())
    }

    /// Attach a detached input to a block, keeping inputs sorted by name
    pub fn attach_input_to_block(&mut self, input: &NodeId, block: &NodeId) -> Result<()> {
        self.ensure_detached(input)?;
        let name = match &self.node(input)?.kind {
            NodeKind::Input { name, .. } => name.clone(),
            kind => {
                return Err(ModelError::WrongChildKind {
                    parent: block.clone(),
                    child: input.clone(),
                    expected: "input",
                    found: kind.label(),
                })
            }
        };
        self.ensure_kind(block, "block")?;
        let at = self.sorted_input_position(block, &name)?;
        if let NodeKind::Block { inputs, .. } = &mut self.node_mut(block)?.kind {
            inputs.insert(at, input.clone());
        }
        self.node_mut(input)?.parent = Some(block.clone());
        Ok(())
    }

    /// Attach a detached field to a block, keeping fields sorted by name
    pub fn attach_field_to_block(&mut self, field: &NodeId, block: &NodeId) -> Result<()> {
        self.ensure_detached(field)?;
        let name = match &self.node(field)?.kind {
            NodeKind::Field { name, .. } => name.clone(),
            kind => {
                return Err(ModelError::WrongChildKind {
                    parent: block.clone(),
                    child: field.clone(),
                    expected: "field",
                    found: kind.label(),
                })
            }
        };
        self.ensure_kind(block, "block")?;
        let at = self.sorted_field_position(block, &name)?;
        if let NodeKind::Block { fields, .. } = &mut self.node_mut(block)?.kind {
            fields.insert(at, field.clone());
        }
        self.node_mut(field)?.parent = Some(block.clone());
        Ok(())
    }

    /// Attach a detached block, sequence or literal as the expression of an
    /// empty input
    pub fn attach_expression(&mut self, input: &NodeId, id: &NodeId) -> Result<()> {
        self.ensure_detached(id)?;
        match &self.node(id)?.kind {
            NodeKind::Block { .. } | NodeKind::Sequence { .. } | NodeKind::Literal { .. } => {}
            kind => {
                return Err(ModelError::WrongChildKind {
                    parent: input.clone(),
                    child: id.clone(),
                    expected: "expression",
                    found: kind.label(),
                })
            }
        }
        self.ensure_input_empty(input)?;
        if let NodeKind::Input { expression, .. } = &mut self.node_mut(input)?.kind {
            *expression = Some(id.clone());
        }
        self.node_mut(id)?.parent = Some(input.clone());
        Ok(())
    }

    /// Move a child to a new position among its current siblings.
    ///
    /// The target position is interpreted against the list before removal:
    /// moving right by one lands immediately after the former right
    /// neighbour.
    pub fn move_child_within(
        &mut self,
        parent: &NodeId,
        child: &NodeId,
        position: usize,
    ) -> Result<()> {
        let current = self.position_of_child(parent, child)?;
        let list = match &mut self.node_mut(parent)?.kind {
            NodeKind::Program { top_level } => top_level,
            NodeKind::Sequence { blocks } => blocks,
            _ => unreachable!("position_of_child rejected other kinds"),
        };
        list.remove(current);
        let target = if position > current { position - 1 } else { position };
        let at = target.min(list.len());
        list.insert(at, child.clone());
        Ok(())
    }

    /// Remove a childless node from the tree, detaching it from its parent
    pub fn remove_leaf(&mut self, id: &NodeId) -> Result<()> {
        if self.node(id)?.has_children() {
            return Err(ModelError::HasChildren(id.clone()));
        }
        self.detach(id)?;
        self.nodes.remove(id);
        Ok(())
    }

    fn ensure_detached(&self, id: &NodeId) -> Result<()> {
        if self.node(id)?.parent.is_some() {
            return Err(ModelError::AlreadyAttached(id.clone()));
        }
        Ok(())
    }

    fn ensure_kind(&self, id: &NodeId, expected: &'static str) -> Result<()> {
        let kind = &self.node(id)?.kind;
        if kind.label() != expected {
            return Err(ModelError::InvalidOperation(format!(
                "node {} is a {}, expected a {}",
                id,
                kind.label(),
                expected,
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Value updates
    // =========================================================================

    /// Replace a block's opcode
    pub fn set_opcode(&mut self, block: &NodeId, opcode: &str) -> Result<()> {
        match &mut self.node_mut(block)?.kind {
            NodeKind::Block { opcode: slot, .. } => {
                *slot = opcode.to_string();
                Ok(())
            }
            kind => Err(ModelError::InvalidOperation(format!(
                "cannot set opcode of {} ({})",
                block,
                kind.label(),
            ))),
        }
    }

    /// Replace a field's value
    pub fn set_field_value(&mut self, field: &NodeId, value: &str) -> Result<()> {
        match &mut self.node_mut(field)?.kind {
            NodeKind::Field { value: slot, .. } => {
                *slot = value.to_string();
                Ok(())
            }
            kind => Err(ModelError::InvalidOperation(format!(
                "cannot set value of {} ({})",
                field,
                kind.label(),
            ))),
        }
    }

    /// Replace a literal's value
    pub fn set_literal_value(&mut self, literal: &NodeId, value: &str) -> Result<()> {
        match &mut self.node_mut(literal)?.kind {
            NodeKind::Literal { value: slot } => {
                *slot = value.to_string();
                Ok(())
            }
            kind => Err(ModelError::InvalidOperation(format!(
                "cannot set value of {} ({})",
                literal,
                kind.label(),
            ))),
        }
    }

    /// Rename an input slot, re-sorting the owning block's input list
    pub fn rename_input(&mut self, input: &NodeId, name: &str) -> Result<()> {
        match &mut self.node_mut(input)?.kind {
            NodeKind::Input { name: slot, .. } => *slot = name.to_string(),
            kind => {
                return Err(ModelError::InvalidOperation(format!(
                    "cannot rename {} ({})",
                    input,
                    kind.label(),
                )))
            }
        }
        let parent = self.node(input)?.parent.clone();
        if let Some(block) = parent {
            if matches!(self.node(&block)?.kind, NodeKind::Block { .. }) {
                self.resort_inputs(&block)?;
            }
        }
        Ok(())
    }

    fn resort_inputs(&mut self, block: &NodeId) -> Result<()> {
        let NodeKind::Block { inputs, .. } = &self.node(block)?.kind else {
            return Ok(());
        };
        let mut named: Vec<(String, NodeId)> = Vec::with_capacity(inputs.len());
        for id in inputs {
            if let NodeKind::Input { name, .. } = &self.node(id)?.kind {
                named.push((name.clone(), id.clone()));
            }
        }
        named.sort_by(|a, b| a.0.cmp(&b.0));
        if let NodeKind::Block { inputs, .. } = &mut self.node_mut(block)?.kind {
            *inputs = named.into_iter().map(|(_, id)| id).collect();
        }
        Ok(())
    }

    /// Append a visualization tag to a node
    pub fn push_tag(&mut self, id: &NodeId, tag: Tag) -> Result<()> {
        self.node_mut(id)?.tags.push(tag);
        Ok(())
    }

    // =========================================================================
    // Audit
    // =========================================================================

    /// Structural audit: parent back-references, name ordering, child kinds
    /// and reachability. Intended for tests and debug assertions.
    pub fn check_integrity(&self) -> Result<()> {
        let root_node = self.node(&self.root)?;
        if root_node.parent.is_some() {
            return Err(ModelError::InvalidOperation(format!(
                "root {} has a parent",
                self.root,
            )));
        }
        for (id, node) in &self.nodes {
            for child in node.child_ids() {
                let child_node = self.node(&child)?;
                if child_node.parent.as_ref() != Some(id) {
                    return Err(ModelError::InvalidOperation(format!(
                        "child {} of {} has parent {:?}",
                        child, id, child_node.parent,
                    )));
                }
            }
            match &node.kind {
                NodeKind::Program { top_level } => {
                    self.check_child_kinds(id, top_level, "sequence")?;
                }
                NodeKind::Sequence { blocks } => {
                    self.check_child_kinds(id, blocks, "block")?;
                }
                NodeKind::Block { fields, inputs, .. } => {
                    self.check_child_kinds(id, fields, "field")?;
                    self.check_child_kinds(id, inputs, "input")?;
                    self.check_name_order(id, fields)?;
                    self.check_name_order(id, inputs)?;
                }
                NodeKind::Input { expression, .. } => {
                    if let Some(expr) = expression {
                        let label = self.node(expr)?.kind.label();
                        if !matches!(label, "block" | "sequence" | "literal") {
                            return Err(ModelError::InvalidOperation(format!(
                                "input {} holds a {}",
                                id, label,
                            )));
                        }
                    }
                }
                NodeKind::Field { .. } | NodeKind::Literal { .. } => {}
            }
        }
        let reachable: HashSet<NodeId> = self.subtree_nodes(&self.root).into_iter().collect();
        for id in self.nodes.keys() {
            if !reachable.contains(id) {
                return Err(ModelError::InvalidOperation(format!(
                    "node {} is not reachable from the root",
                    id,
                )));
            }
        }
        Ok(())
    }

    fn check_child_kinds(&self, parent: &NodeId, ids: &[NodeId], expected: &str) -> Result<()> {
        for id in ids {
            let label = self.node(id)?.kind.label();
            if label != expected {
                return Err(ModelError::InvalidOperation(format!(
                    "child {} of {} is a {}, expected a {}",
                    id, parent, label, expected,
                )));
            }
        }
        Ok(())
    }

    fn check_name_order(&self, parent: &NodeId, ids: &[NodeId]) -> Result<()> {
        let mut previous: Option<String> = None;
        for id in ids {
            let name = match &self.node(id)?.kind {
                NodeKind::Input { name, .. } | NodeKind::Field { name, .. } => name.clone(),
                _ => continue,
            };
            if let Some(prev) = &previous {
                if prev > &name {
                    return Err(ModelError::InvalidOperation(format!(
                        "children of {} are not sorted by name ({} after {})",
                        parent, name, prev,
                    )));
                }
            }
            previous = Some(name);
        }
        Ok(())
    }
}

fn remove_id(list: &mut Vec<NodeId>, id: &NodeId) -> bool {
    match list.iter().position(|existing| existing == id) {
        Some(index) => {
            list.remove(index);
            true
        }
        None => false,
    }
}
