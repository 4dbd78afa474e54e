//! Reconstruction of program trees from block descriptions

use crate::{BlockDescription, ParseError, Result};
use ast_model::{AstTree, NodeId};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Parsed block descriptions, keyed by ID with document order retained
struct Descriptions {
    order: Vec<String>,
    by_id: HashMap<String, BlockDescription>,
}

/// Build a program tree from a block-description dictionary.
///
/// The dictionary's entry order is the author-given order of top-level
/// stacks.
pub fn load_program(blocks: &Map<String, Value>) -> Result<AstTree> {
    let mut descriptions = parse_descriptions(blocks)?;
    check_references(&descriptions)?;
    strip_occluded(&mut descriptions);
    let owners = input_owners(&descriptions);
    let chains = extract_sequences(&descriptions, &owners);
    build(&descriptions, &owners, chains)
}

/// Build a program tree from a JSON document.
///
/// Accepts either a bare block dictionary or a full Scratch v3 project;
/// for a project, only the first target is used.
pub fn load_program_from_value(document: &Value) -> Result<AstTree> {
    let Value::Object(map) = document else {
        return Err(ParseError::InvalidDocument("expected a JSON object".to_string()));
    };
    if let Some(targets) = map.get("targets") {
        let targets = targets
            .as_array()
            .ok_or_else(|| ParseError::InvalidDocument("targets is not an array".to_string()))?;
        let first = targets
            .first()
            .ok_or_else(|| ParseError::InvalidDocument("project has no targets".to_string()))?;
        let blocks = first
            .get("blocks")
            .and_then(Value::as_object)
            .ok_or_else(|| ParseError::InvalidDocument("target has no blocks".to_string()))?;
        return load_program(blocks);
    }
    load_program(map)
}

/// Build a program tree from JSON text
pub fn load_program_from_str(text: &str) -> Result<AstTree> {
    let document: Value = serde_json::from_str(text)?;
    load_program_from_value(&document)
}

/// Build a program tree from a JSON file
pub fn load_program_from_file(path: impl AsRef<Path>) -> Result<AstTree> {
    let text = std::fs::read_to_string(path)?;
    load_program_from_str(&text)
}

fn parse_descriptions(blocks: &Map<String, Value>) -> Result<Descriptions> {
    let mut order = Vec::with_capacity(blocks.len());
    let mut by_id = HashMap::with_capacity(blocks.len());
    for (id, value) in blocks {
        let description: BlockDescription =
            serde_json::from_value(value.clone()).map_err(|err| ParseError::MalformedDescription {
                id: id.clone(),
                detail: err.to_string(),
            })?;
        order.push(id.clone());
        by_id.insert(id.clone(), description);
    }
    tracing::debug!(blocks = order.len(), "parsed block descriptions");
    Ok(Descriptions { order, by_id })
}

/// Every `next` pointer and every active input reference must name a block
/// that exists in the dictionary.
fn check_references(descriptions: &Descriptions) -> Result<()> {
    for id in &descriptions.order {
        let description = &descriptions.by_id[id];
        if let Some(next) = &description.next {
            if !descriptions.by_id.contains_key(next) {
                return Err(ParseError::UnknownReference(next.clone()));
            }
        }
        for values in description.inputs.values() {
            if let Some(Value::String(reference)) = values.get(1) {
                if !descriptions.by_id.contains_key(reference) {
                    return Err(ParseError::UnknownReference(reference.clone()));
                }
            }
        }
    }
    Ok(())
}

/// Drop occluded input entries (array elements past index 1) and the
/// blocks they reference.
///
/// An occluded block may own successors and input children of its own; the
/// whole subgraph reachable from it is inactive and removed.
fn strip_occluded(descriptions: &mut Descriptions) {
    let mut inactive: Vec<String> = Vec::new();
    for description in descriptions.by_id.values_mut() {
        for values in description.inputs.values_mut() {
            if values.len() > 2 {
                for extra in values.drain(2..) {
                    if let Value::String(id) = extra {
                        inactive.push(id);
                    }
                }
            }
        }
    }

    let mut queue = inactive;
    while let Some(id) = queue.pop() {
        if let Some(description) = descriptions.by_id.remove(&id) {
            tracing::debug!(block = %id, "dropping occluded block");
            descriptions.order.retain(|existing| existing != &id);
            if let Some(next) = description.next {
                queue.push(next);
            }
            for values in description.inputs.values() {
                if let Some(Value::String(reference)) = values.get(1) {
                    queue.push(reference.clone());
                }
            }
        }
    }

    // next pointers into the removed subgraph are stale
    let remaining: HashSet<String> = descriptions.by_id.keys().cloned().collect();
    for description in descriptions.by_id.values_mut() {
        if let Some(next) = &description.next {
            if !remaining.contains(next) {
                description.next = None;
            }
        }
    }
}

/// A block is the child of another block only if that block's inputs
/// reference it; all other `parent` fields are stack-predecessor noise.
/// Returns `child id → (owning block id, input name)`.
fn input_owners(descriptions: &Descriptions) -> HashMap<String, (String, String)> {
    let mut owners = HashMap::new();
    for id in &descriptions.order {
        let description = &descriptions.by_id[id];
        for (input_name, values) in &description.inputs {
            if let Some(Value::String(reference)) = values.get(1) {
                if descriptions.by_id.contains_key(reference) {
                    owners.insert(reference.clone(), (id.clone(), input_name.clone()));
                }
            }
        }
    }
    owners
}

/// Collect maximal `next` chains and wrap every remaining unowned block in
/// a singleton chain.
fn extract_sequences(
    descriptions: &Descriptions,
    owners: &HashMap<String, (String, String)>,
) -> Vec<Vec<String>> {
    let mut fragments = Vec::new();
    for id in &descriptions.order {
        if let Some(next) = &descriptions.by_id[id].next {
            fragments.push(vec![id.clone(), next.clone()]);
        }
    }
    let mut chains = join_sequences(fragments);
    tracing::debug!(chains = chains.len(), "extracted sequence chains");

    let chained: HashSet<&String> = chains.iter().flatten().collect();
    let singletons: Vec<Vec<String>> = descriptions
        .order
        .iter()
        .filter(|id| !chained.contains(id) && !owners.contains_key(*id))
        .map(|id| vec![id.clone()])
        .collect();
    chains.extend(singletons);
    chains
}

/// Join sequence fragments to a fixed point: a chain ending at X absorbs a
/// chain starting at X, dropping the duplicated head. Parent reassignment
/// can split a stack into fragments whose boundaries only line up after
/// earlier joins, hence the iteration.
pub(crate) fn join_sequences(mut sequences: Vec<Vec<String>>) -> Vec<Vec<String>> {
    loop {
        let mut join: Option<(usize, usize)> = None;
        'scan: for i in 0..sequences.len() {
            for j in 0..sequences.len() {
                if i != j && sequences[i].last() == sequences[j].first() {
                    join = Some((i, j));
                    break 'scan;
                }
            }
        }
        let Some((i, j)) = join else {
            return sequences;
        };
        let tail = sequences.remove(j);
        let target = if j < i { i - 1 } else { i };
        sequences[target].extend(tail.into_iter().skip(1));
    }
}

struct Builder<'a> {
    descriptions: &'a Descriptions,
    chain_by_head: HashMap<String, Vec<String>>,
    in_progress: HashSet<String>,
    consumed: HashSet<String>,
}

fn build(
    descriptions: &Descriptions,
    owners: &HashMap<String, (String, String)>,
    chains: Vec<Vec<String>>,
) -> Result<AstTree> {
    let document_position: HashMap<&String, usize> = descriptions
        .order
        .iter()
        .enumerate()
        .map(|(index, id)| (id, index))
        .collect();

    let mut top_level: Vec<&Vec<String>> = chains
        .iter()
        .filter(|chain| !owners.contains_key(&chain[0]))
        .collect();
    top_level.sort_by_key(|chain| document_position[&chain[0]]);

    let mut builder = Builder {
        descriptions,
        chain_by_head: chains
            .iter()
            .map(|chain| (chain[0].clone(), chain.clone()))
            .collect(),
        in_progress: HashSet::new(),
        consumed: HashSet::new(),
    };

    let mut tree = AstTree::new_program();
    for (position, chain) in top_level.iter().enumerate() {
        let sequence = NodeId::sequence_at(&NodeId::new(chain[0].as_str()));
        tree.insert_sequence_into_program(sequence.clone(), position)?;
        for (index, block_id) in chain.iter().enumerate() {
            builder.build_into_sequence(&mut tree, &sequence, index, block_id)?;
        }
    }

    for id in &descriptions.order {
        if !builder.consumed.contains(id) {
            return Err(ParseError::UnreachableBlock(id.clone()));
        }
    }

    tree.check_integrity()?;
    tracing::debug!(nodes = tree.len(), "assembled program tree");
    Ok(tree)
}

impl<'a> Builder<'a> {
    fn build_into_sequence(
        &mut self,
        tree: &mut AstTree,
        sequence: &NodeId,
        position: usize,
        id: &str,
    ) -> Result<()> {
        let description = self.begin(id)?;
        let node = tree.insert_block_into_sequence(
            sequence,
            NodeId::new(id),
            &description.opcode,
            description.shadow,
            position,
        )?;
        self.populate(tree, &node, id)?;
        self.finish(id);
        Ok(())
    }

    fn build_into_input(&mut self, tree: &mut AstTree, input: &NodeId, id: &str) -> Result<()> {
        let description = self.begin(id)?;
        let node = tree.insert_block_into_input(
            input,
            NodeId::new(id),
            &description.opcode,
            description.shadow,
        )?;
        self.populate(tree, &node, id)?;
        self.finish(id);
        Ok(())
    }

    fn begin(&mut self, id: &str) -> Result<&'a BlockDescription> {
        if self.in_progress.contains(id) {
            return Err(ParseError::CyclicReference(id.to_string()));
        }
        if self.consumed.contains(id) {
            return Err(ParseError::DuplicateReference(id.to_string()));
        }
        self.in_progress.insert(id.to_string());
        let descriptions = self.descriptions;
        descriptions
            .by_id
            .get(id)
            .ok_or_else(|| ParseError::UnknownReference(id.to_string()))
    }

    fn finish(&mut self, id: &str) {
        self.in_progress.remove(id);
        self.consumed.insert(id.to_string());
    }

    fn populate(&mut self, tree: &mut AstTree, node: &NodeId, id: &str) -> Result<()> {
        let descriptions = self.descriptions;
        let description = &descriptions.by_id[id];

        for (name, values) in &description.fields {
            let value = values
                .first()
                .and_then(scalar_to_string)
                .ok_or_else(|| ParseError::MalformedField {
                    block: id.to_string(),
                    field: name.clone(),
                })?;
            tree.add_field_to_block(node, name, &value)?;
        }

        for (name, values) in &description.inputs {
            let input = tree.add_input_to_block(node, name)?;
            let malformed = || ParseError::MalformedInput {
                block: id.to_string(),
                input: name.clone(),
            };
            if values.len() < 2 {
                return Err(malformed());
            }
            match &values[1] {
                Value::Null => {}
                Value::String(reference) => {
                    if let Some(chain) = self.chain_by_head.get(reference).cloned() {
                        let sequence = NodeId::sequence_at(&NodeId::new(reference.as_str()));
                        tree.insert_sequence_into_input(&input, sequence.clone())?;
                        for (index, member) in chain.iter().enumerate() {
                            self.build_into_sequence(tree, &sequence, index, member)?;
                        }
                    } else {
                        self.build_into_input(tree, &input, reference)?;
                    }
                }
                Value::Array(literal) => {
                    let value = literal.get(1).and_then(scalar_to_string).ok_or_else(malformed)?;
                    tree.add_literal_to_input(&input, &value)?;
                }
                _ => return Err(malformed()),
            }
        }
        Ok(())
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ast_model::NodeKind;
    use serde_json::json;

    fn strings(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn test_join_sequences_simple() {
        let sequences = vec![
            strings(&["io9", "Y!J", "E/8", "%N@"]),
            strings(&["%N@", "p1E"]),
        ];
        let expected = vec![strings(&["io9", "Y!J", "E/8", "%N@", "p1E"])];
        assert_eq!(join_sequences(sequences), expected);
    }

    #[test]
    fn test_join_sequences_fixed_point() {
        // fragment boundaries that only line up after earlier joins
        let sequences = vec![
            strings(&["a1", "a2", "a3"]),
            strings(&["b1", "b2", "b3"]),
            strings(&["c1", "c2", "c3"]),
            strings(&["b3", "b4", "c1"]),
            strings(&["d2", "d3"]),
            strings(&["d1", "d2"]),
        ];
        let expected = vec![
            strings(&["a1", "a2", "a3"]),
            strings(&["b1", "b2", "b3", "b4", "c1", "c2", "c3"]),
            strings(&["d1", "d2", "d3"]),
        ];
        assert_eq!(join_sequences(sequences), expected);
    }

    #[test]
    fn test_load_minimal_program() {
        let blocks = json!({
            "start": {
                "opcode": "event_whenprogramstarts",
                "parent": null,
                "next": null,
                "inputs": {},
                "fields": {},
                "shadow": false,
                "topLevel": true,
                "x": 160,
                "y": 120
            }
        });
        let tree = load_program(blocks.as_object().unwrap()).unwrap();

        // a bare top-level block is wrapped in a singleton sequence
        let top = tree.children(tree.root());
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].as_str(), ":seq@start");
        let blocks = tree.children(&top[0]);
        assert_eq!(blocks.len(), 1);
        assert_eq!(tree.opcode(&blocks[0]).unwrap(), "event_whenprogramstarts");
    }

    #[test]
    fn test_load_next_chain_in_order() {
        let blocks = json!({
            "a": {"opcode": "event_whenprogramstarts", "next": "b", "parent": null,
                  "inputs": {}, "fields": {}, "shadow": false, "topLevel": true},
            "b": {"opcode": "spike_movement_startMoving", "next": "c", "parent": "a",
                  "inputs": {}, "fields": {}, "shadow": false, "topLevel": false},
            "c": {"opcode": "spike_movement_stopMoving", "next": null, "parent": "b",
                  "inputs": {}, "fields": {}, "shadow": false, "topLevel": false}
        });
        let tree = load_program(blocks.as_object().unwrap()).unwrap();
        let top = tree.children(tree.root());
        assert_eq!(top.len(), 1);
        let ids: Vec<String> = tree
            .children(&top[0])
            .iter()
            .map(|id| id.as_str().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_load_fields_and_literal_inputs() {
        let blocks = json!({
            "m": {"opcode": "spike_movement_moveForUnits", "next": null, "parent": null,
                  "inputs": {"RATE": [1, [4, 75]], "PORT": [1, null]},
                  "fields": {"UNITS": ["rotations", null]},
                  "shadow": false, "topLevel": true}
        });
        let tree = load_program(blocks.as_object().unwrap()).unwrap();
        let block = NodeId::new("m");

        let field = tree.find_field(&block, "UNITS").unwrap();
        let NodeKind::Field { value, .. } = &tree.node(&field).unwrap().kind else {
            panic!("not a field");
        };
        assert_eq!(value, "rotations");

        let rate = tree.find_input(&block, "RATE").unwrap();
        let literal = tree.expression(&rate).unwrap();
        let NodeKind::Literal { value } = &tree.node(&literal).unwrap().kind else {
            panic!("not a literal");
        };
        assert_eq!(value, "75");

        let port = tree.find_input(&block, "PORT").unwrap();
        assert!(tree.expression(&port).is_none());
    }

    #[test]
    fn test_load_block_valued_input() {
        let blocks = json!({
            "m": {"opcode": "spike_movement_startMovingHeadingAtSpeed", "next": null, "parent": null,
                  "inputs": {"DIRECTION": [1, "picker"]},
                  "fields": {}, "shadow": false, "topLevel": true},
            "picker": {"opcode": "spike_movement_direction_picker", "next": null, "parent": "m",
                       "inputs": {}, "fields": {"SPIN_DIRECTIONS": ["clockwise"]},
                       "shadow": true, "topLevel": false}
        });
        let tree = load_program(blocks.as_object().unwrap()).unwrap();
        // only one top-level sequence; the picker hangs off the input
        assert_eq!(tree.children(tree.root()).len(), 1);
        let direction = tree.find_input(&NodeId::new("m"), "DIRECTION").unwrap();
        let expression = tree.expression(&direction).unwrap();
        assert_eq!(expression.as_str(), "picker");
        let NodeKind::Block { is_shadow, .. } = tree.node(&expression).unwrap().kind else {
            panic!("not a block");
        };
        assert!(is_shadow);
    }

    #[test]
    fn test_load_c_shape_body_becomes_sequence() {
        let blocks = json!({
            "loop": {"opcode": "control_forever", "next": null, "parent": null,
                     "inputs": {"SUBSTACK": [2, "body1"]},
                     "fields": {}, "shadow": false, "topLevel": true},
            "body1": {"opcode": "spike_movement_startMoving", "next": "body2", "parent": "loop",
                      "inputs": {}, "fields": {}, "shadow": false, "topLevel": false},
            "body2": {"opcode": "spike_movement_stopMoving", "next": null, "parent": "body1",
                      "inputs": {}, "fields": {}, "shadow": false, "topLevel": false}
        });
        let tree = load_program(blocks.as_object().unwrap()).unwrap();
        let substack = tree.find_input(&NodeId::new("loop"), "SUBSTACK").unwrap();
        let body = tree.expression(&substack).unwrap();
        assert_eq!(body.as_str(), ":seq@body1");
        let ids: Vec<String> = tree
            .children(&body)
            .iter()
            .map(|id| id.as_str().to_string())
            .collect();
        assert_eq!(ids, vec!["body1", "body2"]);
    }

    #[test]
    fn test_occluded_blocks_are_stripped() {
        // the input once held "old"; "cur" now occludes it, and "old" drags
        // its own successor along
        let blocks = json!({
            "m": {"opcode": "spike_motor_runDirection", "next": null, "parent": null,
                  "inputs": {"DIRECTION": [3, "cur", "old"]},
                  "fields": {}, "shadow": false, "topLevel": true},
            "cur": {"opcode": "spike_direction_picker", "next": null, "parent": "m",
                    "inputs": {}, "fields": {}, "shadow": true, "topLevel": false},
            "old": {"opcode": "spike_movement_startMoving", "next": "old2", "parent": "m",
                    "inputs": {}, "fields": {}, "shadow": false, "topLevel": false},
            "old2": {"opcode": "spike_movement_stopMoving", "next": null, "parent": "old",
                     "inputs": {}, "fields": {}, "shadow": false, "topLevel": false}
        });
        let tree = load_program(blocks.as_object().unwrap()).unwrap();
        assert!(!tree.contains_id(&NodeId::new("old")));
        assert!(!tree.contains_id(&NodeId::new("old2")));
        let direction = tree.find_input(&NodeId::new("m"), "DIRECTION").unwrap();
        assert_eq!(tree.expression(&direction).unwrap().as_str(), "cur");
    }

    #[test]
    fn test_top_level_stacks_keep_document_order() {
        let blocks = json!({
            "x1": {"opcode": "event_whenprogramstarts", "next": "x2", "parent": null,
                   "inputs": {}, "fields": {}, "shadow": false, "topLevel": true},
            "x2": {"opcode": "spike_movement_startMoving", "next": null, "parent": "x1",
                   "inputs": {}, "fields": {}, "shadow": false, "topLevel": false},
            "y1": {"opcode": "spike_movement_stopMoving", "next": null, "parent": null,
                   "inputs": {}, "fields": {}, "shadow": false, "topLevel": true}
        });
        let tree = load_program(blocks.as_object().unwrap()).unwrap();
        let ids: Vec<String> = tree
            .children(tree.root())
            .iter()
            .map(|id| id.as_str().to_string())
            .collect();
        assert_eq!(ids, vec![":seq@x1", ":seq@y1"]);
    }

    #[test]
    fn test_zero_blocks_is_an_empty_program() {
        let blocks = json!({});
        let tree = load_program(blocks.as_object().unwrap()).unwrap();
        assert!(tree.children(tree.root()).is_empty());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_unknown_reference_names_the_id() {
        let blocks = json!({
            "a": {"opcode": "event_whenprogramstarts", "next": "ghost", "parent": null,
                  "inputs": {}, "fields": {}, "shadow": false, "topLevel": true}
        });
        let err = load_program(blocks.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, ParseError::UnknownReference(id) if id == "ghost"));
    }

    #[test]
    fn test_cyclic_reference_is_rejected() {
        // outer → a → b → a is a parent cycle reachable from the top level
        let blocks = json!({
            "outer": {"opcode": "control_if", "next": null, "parent": null,
                      "inputs": {"CONDITION": [2, "a"]},
                      "fields": {}, "shadow": false, "topLevel": true},
            "a": {"opcode": "operator_and", "next": null, "parent": "outer",
                  "inputs": {"OPERAND1": [2, "b"]},
                  "fields": {}, "shadow": false, "topLevel": false},
            "b": {"opcode": "operator_not", "next": null, "parent": "a",
                  "inputs": {"OPERAND": [2, "a"]},
                  "fields": {}, "shadow": false, "topLevel": false}
        });
        let err = load_program(blocks.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, ParseError::CyclicReference(id) if id == "a"));
    }

    #[test]
    fn test_orphaned_cycle_is_unreachable() {
        // two blocks that only reference each other never join a stack
        let blocks = json!({
            "top": {"opcode": "event_whenprogramstarts", "next": null, "parent": null,
                    "inputs": {}, "fields": {}, "shadow": false, "topLevel": true},
            "a": {"opcode": "operator_and", "next": null, "parent": null,
                  "inputs": {"OPERAND1": [2, "b"]},
                  "fields": {}, "shadow": false, "topLevel": false},
            "b": {"opcode": "operator_not", "next": null, "parent": "a",
                  "inputs": {"OPERAND": [2, "a"]},
                  "fields": {}, "shadow": false, "topLevel": false}
        });
        let err = load_program(blocks.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, ParseError::UnreachableBlock(_)));
    }

    #[test]
    fn test_malformed_input_array() {
        let blocks = json!({
            "m": {"opcode": "spike_write", "next": null, "parent": null,
                  "inputs": {"TEXT": [1]},
                  "fields": {}, "shadow": false, "topLevel": true}
        });
        let err = load_program(blocks.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, ParseError::MalformedInput { input, .. } if input == "TEXT"));
    }

    #[test]
    fn test_scratch_project_envelope_uses_first_target() {
        let document = json!({
            "targets": [
                {"blocks": {
                    "a": {"opcode": "event_whenprogramstarts", "next": null, "parent": null,
                          "inputs": {}, "fields": {}, "shadow": false, "topLevel": true}
                }},
                {"blocks": {
                    "b": {"opcode": "spike_movement_startMoving", "next": null, "parent": null,
                          "inputs": {}, "fields": {}, "shadow": false, "topLevel": true}
                }}
            ]
        });
        let tree = load_program_from_value(&document).unwrap();
        assert!(tree.contains_id(&NodeId::new("a")));
        assert!(!tree.contains_id(&NodeId::new("b")));
    }
}
