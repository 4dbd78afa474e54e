//! AST Loader - Block descriptions to program trees
//!
//! A block-description dictionary is flat and ambiguously parented: the
//! `parent` field of a block may mean "containing block" or "predecessor in
//! a straight-line stack", sequences are implicit in `next` chains, and
//! input arrays can carry references to blocks that are no longer visible.
//! This crate reconstructs a well-formed [`ast_model::AstTree`] from that
//! shape.

mod description;
mod error;
mod loader;

pub use description::*;
pub use error::*;
pub use loader::*;
