//! Error types for matching and edit application

use ast_model::NodeId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiffError {
    #[error(transparent)]
    Model(#[from] ast_model::ModelError),

    #[error("cannot map {source_id} to {destination}: node kinds differ")]
    MappingKindMismatch { source_id: NodeId, destination: NodeId },

    #[error("cannot map descendants of {source_id} to {destination}: subtree sizes differ")]
    MappingArityMismatch { source_id: NodeId, destination: NodeId },

    #[error("no insertion rule for a {kind} under a {parent_kind}")]
    UnsupportedInsertion {
        kind: &'static str,
        parent_kind: &'static str,
    },

    #[error("no move rule for a {kind} into a {parent_kind}")]
    UnsupportedMove {
        kind: &'static str,
        parent_kind: &'static str,
    },

    #[error("cannot update node {0}")]
    InvalidUpdate(NodeId),

    #[error("edit script invariant violated: {0}")]
    InvariantViolation(String),

    #[error("edit script post-condition failed: result is not equivalent to the destination tree")]
    PostConditionFailed,
}

pub type Result<T> = std::result::Result<T, DiffError>;
