//! AST Model - Typed tree structure for block programs
//!
//! This crate provides the abstract-syntax tree shared by the loader and the
//! diff engine: a rooted ordered tree with stable string IDs, parent
//! back-references, and strict equivalence semantics.

mod category;
mod error;
mod node;
mod node_id;
mod tree;

pub use category::*;
pub use error::*;
pub use node::*;
pub use node_id::*;
pub use tree::*;
