//! Error types for tree operations

use crate::NodeId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("duplicate node id: {0}")]
    DuplicateId(NodeId),

    #[error("node {child} is not a child of {parent}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("cannot attach {child} ({found}) to {parent}: expected a {expected}")]
    WrongChildKind {
        parent: NodeId,
        child: NodeId,
        expected: &'static str,
        found: &'static str,
    },

    #[error("input {0} already holds an expression")]
    InputOccupied(NodeId),

    #[error("node {0} is already attached to a parent")]
    AlreadyAttached(NodeId),

    #[error("node {0} is not attached to a parent")]
    NotAttached(NodeId),

    #[error("cannot delete {0}: node still has children")]
    HasChildren(NodeId),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
