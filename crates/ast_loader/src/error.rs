//! Error types for program parsing

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed description for block {id}: {detail}")]
    MalformedDescription { id: String, detail: String },

    #[error("malformed input {input} on block {block}")]
    MalformedInput { block: String, input: String },

    #[error("malformed field {field} on block {block}")]
    MalformedField { block: String, field: String },

    #[error("reference to unknown block {0}")]
    UnknownReference(String),

    #[error("cyclic reference through block {0}")]
    CyclicReference(String),

    #[error("block {0} is referenced more than once")]
    DuplicateReference(String),

    #[error("block {0} is unreachable from any top-level stack")]
    UnreachableBlock(String),

    #[error("not a block-description document: {0}")]
    InvalidDocument(String),

    #[error("I/O error reading program: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Model(#[from] ast_model::ModelError),
}

pub type Result<T> = std::result::Result<T, ParseError>;
