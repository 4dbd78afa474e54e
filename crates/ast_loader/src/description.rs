//! Serde model of the block-description wire format

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Raw description of one block, as serialized by the editor.
///
/// `inputs` map a name to an array `[shadow_mode, value, …]` where `value`
/// is a block ID string, a nested `[kind, literal]` array, or null; entries
/// past index 1 are occluded references. `fields` map a name to an array
/// whose first element is the field value. `x`/`y` are layout-only and
/// ignored by the tree builder.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockDescription {
    pub opcode: String,
    /// Either the containing block or the stack predecessor; disambiguated
    /// by the loader, never trusted directly.
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub inputs: BTreeMap<String, Vec<Value>>,
    #[serde(default)]
    pub fields: BTreeMap<String, Vec<Value>>,
    #[serde(default)]
    pub shadow: bool,
    #[serde(default, rename = "topLevel")]
    pub top_level: bool,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
}
