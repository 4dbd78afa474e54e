//! Tree edit operations and edit scripts
//!
//! A closed set of tagged operations, each carrying only the data needed to
//! re-apply against a fresh tree by ID lookup. Scripts serialize to
//! `{"edits": [{"type": "<Kind>", …}]}` with kebab-case field keys and
//! round-trip losslessly.

mod addition;
mod delete;
mod movement;
mod update;

pub use addition::*;
pub use delete::*;
pub use movement::*;
pub use update::*;

use crate::Result;
use ast_model::{AstTree, NodeId};
use serde::{Deserialize, Serialize};

/// One tree transformation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Edit {
    AddSequenceToProgram(AddSequenceToProgram),
    AddSequenceToInput(AddSequenceToInput),
    AddInputToBlock(AddInputToBlock),
    AddLiteralToInput(AddLiteralToInput),
    AddBlockToSequence(AddBlockToSequence),
    AddBlockToInput(AddBlockToInput),
    AddFieldToBlock(AddFieldToBlock),
    MoveBlockInSequence(MoveBlockInSequence),
    MoveBlockToSequence(MoveBlockToSequence),
    MoveSequenceInProgram(MoveSequenceInProgram),
    MoveSequenceToProgram(MoveSequenceToProgram),
    MoveInputToBlock(MoveInputToBlock),
    MoveFieldToBlock(MoveFieldToBlock),
    MoveNodeToInput(MoveNodeToInput),
    Update(Update),
    Delete(Delete),
}

impl Edit {
    /// Apply this edit to a tree, returning the node it created or moved
    pub fn apply(&self, tree: &mut AstTree) -> Result<Option<NodeId>> {
        match self {
            Self::AddSequenceToProgram(edit) => edit.apply(tree),
            Self::AddSequenceToInput(edit) => edit.apply(tree),
            Self::AddInputToBlock(edit) => edit.apply(tree),
            Self::AddLiteralToInput(edit) => edit.apply(tree),
            Self::AddBlockToSequence(edit) => edit.apply(tree),
            Self::AddBlockToInput(edit) => edit.apply(tree),
            Self::AddFieldToBlock(edit) => edit.apply(tree),
            Self::MoveBlockInSequence(edit) => edit.apply(tree),
            Self::MoveBlockToSequence(edit) => edit.apply(tree),
            Self::MoveSequenceInProgram(edit) => edit.apply(tree),
            Self::MoveSequenceToProgram(edit) => edit.apply(tree),
            Self::MoveInputToBlock(edit) => edit.apply(tree),
            Self::MoveFieldToBlock(edit) => edit.apply(tree),
            Self::MoveNodeToInput(edit) => edit.apply(tree),
            Self::Update(edit) => edit.apply(tree),
            Self::Delete(edit) => edit.apply(tree),
        }
    }

    /// Whether this edit creates a node
    pub fn is_addition(&self) -> bool {
        matches!(
            self,
            Self::AddSequenceToProgram(_)
                | Self::AddSequenceToInput(_)
                | Self::AddInputToBlock(_)
                | Self::AddLiteralToInput(_)
                | Self::AddBlockToSequence(_)
                | Self::AddBlockToInput(_)
                | Self::AddFieldToBlock(_)
        )
    }

    /// Whether this edit relocates a node
    pub fn is_move(&self) -> bool {
        matches!(
            self,
            Self::MoveBlockInSequence(_)
                | Self::MoveBlockToSequence(_)
                | Self::MoveSequenceInProgram(_)
                | Self::MoveSequenceToProgram(_)
                | Self::MoveInputToBlock(_)
                | Self::MoveFieldToBlock(_)
                | Self::MoveNodeToInput(_)
        )
    }
}

macro_rules! edit_from {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Edit {
                fn from(edit: $variant) -> Self {
                    Self::$variant(edit)
                }
            }
        )*
    };
}

edit_from!(
    AddSequenceToProgram,
    AddSequenceToInput,
    AddInputToBlock,
    AddLiteralToInput,
    AddBlockToSequence,
    AddBlockToInput,
    AddFieldToBlock,
    MoveBlockInSequence,
    MoveBlockToSequence,
    MoveSequenceInProgram,
    MoveSequenceToProgram,
    MoveInputToBlock,
    MoveFieldToBlock,
    MoveNodeToInput,
    Update,
    Delete,
);

/// Options for applying a script
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// Tag nodes `Deleted` instead of removing them (animation dry-run)
    pub no_delete: bool,
}

/// An ordered sequence of edits
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditScript {
    edits: Vec<Edit>,
}

impl EditScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn push(&mut self, edit: impl Into<Edit>) {
        let edit = edit.into();
        tracing::debug!(?edit, "added edit to script");
        self.edits.push(edit);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Edit> {
        self.edits.iter()
    }

    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    /// Deep-copy the root and apply every edit in order
    pub fn apply(&self, root: &AstTree) -> Result<AstTree> {
        self.apply_with(root, ApplyOptions::default())
    }

    /// Deep-copy the root and apply every edit in order, honouring options
    pub fn apply_with(&self, root: &AstTree, options: ApplyOptions) -> Result<AstTree> {
        let mut tree = root.clone();
        for edit in &self.edits {
            match edit {
                Edit::Delete(delete) if options.no_delete => {
                    delete.mark_only(&mut tree)?;
                }
                _ => {
                    edit.apply(&mut tree)?;
                }
            }
        }
        Ok(tree)
    }

    /// Serialize to the persisted JSON form
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("edit scripts always serialize")
    }

    /// Parse from the persisted JSON form
    pub fn from_json(value: &serde_json::Value) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_value(value.clone())
    }
}

impl<'a> IntoIterator for &'a EditScript {
    type Item = &'a Edit;
    type IntoIter = std::slice::Iter<'a, Edit>;

    fn into_iter(self) -> Self::IntoIter {
        self.edits.iter()
    }
}

impl FromIterator<Edit> for EditScript {
    fn from_iter<I: IntoIterator<Item = Edit>>(edits: I) -> Self {
        Self {
            edits: edits.into_iter().collect(),
        }
    }
}
