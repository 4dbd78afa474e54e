//! End-to-end diff scenarios over loaded programs
//!
//! Each test loads two versions of a block program the way the HTTP
//! wrapper would, diffs them, applies the script, and checks the result
//! against the destination tree.

use ast_loader::load_program;
use ast_model::{AstTree, NodeId, NodeKind};
use diff_engine::{compute_distance, compute_edit_script, Edit};
use serde_json::json;

/// Route matcher/synthesizer traces to stderr when RUST_LOG is set
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn load(value: serde_json::Value) -> AstTree {
    init_tracing();
    load_program(value.as_object().unwrap()).unwrap()
}

/// A start block chained to a motor block with a UNITS field and a RATE
/// literal input.
fn motor_program(units: &str, rate: &str) -> AstTree {
    load(json!({
        "start": {"opcode": "event_whenprogramstarts", "next": "motor", "parent": null,
                  "inputs": {}, "fields": {}, "shadow": false, "topLevel": true},
        "motor": {"opcode": "spike_motor_runDirection", "next": null, "parent": "start",
                  "inputs": {"RATE": [1, [4, rate]]},
                  "fields": {"UNITS": [units]},
                  "shadow": false, "topLevel": false}
    }))
}

#[test]
fn field_value_change_yields_single_update() {
    let before = motor_program("rotations", "75");
    let after = motor_program("seconds", "75");

    let script = compute_edit_script(&before, &after).unwrap();
    assert_eq!(script.len(), 1);
    let Edit::Update(update) = &script.edits()[0] else {
        panic!("expected an update, got {:?}", script.edits()[0]);
    };
    assert_eq!(update.node_id, NodeId::new(":field[UNITS]@motor"));
    assert_eq!(update.value, "seconds");

    let edited = script.apply(&before).unwrap();
    assert!(edited.equivalent_trees(&after));

    // one field update at the literal-update weight
    let distance = compute_distance(&before, &script, Some(&after)).unwrap();
    assert_eq!(distance, 0.5);
}

#[test]
fn literal_value_change_yields_single_update() {
    let before = motor_program("rotations", "75");
    let after = motor_program("rotations", "100");

    let script = compute_edit_script(&before, &after).unwrap();
    assert_eq!(script.len(), 1);
    let Edit::Update(update) = &script.edits()[0] else {
        panic!("expected an update, got {:?}", script.edits()[0]);
    };
    assert_eq!(update.node_id, NodeId::new(":literal@:input[RATE]@motor"));
    assert_eq!(update.value, "100");
    assert_eq!(compute_distance(&before, &script, Some(&after)).unwrap(), 0.5);
}

fn chain(ids_and_opcodes: &[(&str, &str)]) -> serde_json::Value {
    let mut blocks = serde_json::Map::new();
    for (index, (id, opcode)) in ids_and_opcodes.iter().enumerate() {
        let next = ids_and_opcodes.get(index + 1).map(|(next_id, _)| *next_id);
        let parent = index.checked_sub(1).map(|previous| ids_and_opcodes[previous].0);
        let top_level = index == 0;
        blocks.insert(
            id.to_string(),
            json!({
                "opcode": opcode,
                "next": next,
                "parent": parent,
                "inputs": {},
                "fields": {},
                "shadow": false,
                "topLevel": top_level
            }),
        );
    }
    serde_json::Value::Object(blocks)
}

#[test]
fn insert_block_mid_sequence() {
    let before = load(chain(&[
        ("a", "event_whenprogramstarts"),
        ("b", "spike_movement_startMoving"),
        ("c", "spike_movement_stopMoving"),
        ("d", "spike_sound_playuntildone"),
    ]));
    let after = load(chain(&[
        ("a", "event_whenprogramstarts"),
        ("b", "spike_movement_startMoving"),
        ("n", "spike_play_beep"),
        ("c", "spike_movement_stopMoving"),
        ("d", "spike_sound_playuntildone"),
    ]));

    let script = compute_edit_script(&before, &after).unwrap();
    assert_eq!(script.len(), 1);
    let Edit::AddBlockToSequence(add) = &script.edits()[0] else {
        panic!("expected a block insertion, got {:?}", script.edits()[0]);
    };
    assert_eq!(add.position, 2);
    assert_eq!(add.opcode, "spike_play_beep");
    assert_eq!(add.sequence_id, NodeId::new(":seq@a"));

    assert!(script.apply(&before).unwrap().equivalent_trees(&after));
    assert_eq!(compute_distance(&before, &script, Some(&after)).unwrap(), 1.0);
}

#[test]
fn reorder_within_sequence_is_one_move() {
    let before = load(chain(&[
        ("a", "spike_movement_startMoving"),
        ("b", "spike_movement_stopMoving"),
    ]));
    let after = load(chain(&[
        ("b", "spike_movement_stopMoving"),
        ("a", "spike_movement_startMoving"),
    ]));

    let script = compute_edit_script(&before, &after).unwrap();
    assert_eq!(script.len(), 1);
    assert!(matches!(script.edits()[0], Edit::MoveBlockInSequence(_)));
    assert!(script.apply(&before).unwrap().equivalent_trees(&after));
    assert_eq!(compute_distance(&before, &script, Some(&after)).unwrap(), 0.5);
}

#[test]
fn merge_two_top_level_sequences() {
    let before = load(json!({
        "w": {"opcode": "event_whenprogramstarts", "next": "x", "parent": null,
              "inputs": {}, "fields": {}, "shadow": false, "topLevel": true},
        "x": {"opcode": "spike_movement_startMoving", "next": null, "parent": "w",
              "inputs": {}, "fields": {}, "shadow": false, "topLevel": false},
        "y": {"opcode": "spike_movement_stopMoving", "next": "z", "parent": null,
              "inputs": {}, "fields": {}, "shadow": false, "topLevel": true},
        "z": {"opcode": "spike_sound_playuntildone", "next": null, "parent": "y",
              "inputs": {}, "fields": {}, "shadow": false, "topLevel": false}
    }));
    let after = load(chain(&[
        ("w", "event_whenprogramstarts"),
        ("x", "spike_movement_startMoving"),
        ("y", "spike_movement_stopMoving"),
        ("z", "spike_sound_playuntildone"),
    ]));

    let script = compute_edit_script(&before, &after).unwrap();
    assert!(script.iter().any(|edit| edit.is_move()));

    let edited = script.apply(&before).unwrap();
    assert!(edited.equivalent_trees(&after));
    assert_eq!(edited.children(edited.root()).len(), 1);
}

#[test]
fn identical_programs_diff_to_nothing() {
    let program = json!({
        "start": {"opcode": "event_whenprogramstarts", "next": "motor", "parent": null,
                  "inputs": {}, "fields": {}, "shadow": false, "topLevel": true},
        "motor": {"opcode": "spike_motor_runDirection", "next": null, "parent": "start",
                  "inputs": {"RATE": [1, [4, "75"]], "DIRECTION": [1, "picker"]},
                  "fields": {"UNITS": ["rotations"]},
                  "shadow": false, "topLevel": false},
        "picker": {"opcode": "spike_direction_picker", "next": null, "parent": "motor",
                   "inputs": {}, "fields": {"SPIN_DIRECTIONS": ["clockwise"]},
                   "shadow": true, "topLevel": false}
    });
    let before = load(program.clone());
    let after = load(program);

    let script = compute_edit_script(&before, &after).unwrap();
    assert!(script.is_empty());
    assert_eq!(compute_distance(&before, &script, Some(&after)).unwrap(), 0.0);
}

fn rate_program(rate: serde_json::Value) -> AstTree {
    load(json!({
        "start": {"opcode": "event_whenprogramstarts", "next": "motor", "parent": null,
                  "inputs": {}, "fields": {}, "shadow": false, "topLevel": true},
        "motor": {"opcode": "spike_motor_runDirection", "next": null, "parent": "start",
                  "inputs": {"RATE": [1, rate]},
                  "fields": {"UNITS": ["rotations"]},
                  "shadow": false, "topLevel": false}
    }))
}

#[test]
fn literal_into_previously_empty_input() {
    let before = rate_program(json!(null));
    let after = rate_program(json!([4, "75"]));

    let script = compute_edit_script(&before, &after).unwrap();
    assert_eq!(script.len(), 1);
    let Edit::AddLiteralToInput(add) = &script.edits()[0] else {
        panic!("expected a literal insertion, got {:?}", script.edits()[0]);
    };
    assert_eq!(add.input_id, NodeId::new(":input[RATE]@motor"));
    assert_eq!(add.value, "75");
    assert!(script.apply(&before).unwrap().equivalent_trees(&after));
}

#[test]
fn block_into_previously_empty_input() {
    let condition_program = |condition: serde_json::Value, extra: serde_json::Value| {
        let mut blocks = json!({
            "loop": {"opcode": "control_if", "next": null, "parent": null,
                     "inputs": {"CONDITION": [2, condition]},
                     "fields": {"MODE": ["strict"]},
                     "shadow": false, "topLevel": true}
        });
        if let Some(map) = extra.as_object() {
            for (id, description) in map {
                blocks[id.as_str()] = description.clone();
            }
        }
        load(blocks)
    };

    let before = condition_program(json!(null), json!({}));
    let after = condition_program(
        json!("cmp"),
        json!({
            "cmp": {"opcode": "spike_sensor_is_pressed", "next": null, "parent": "loop",
                    "inputs": {}, "fields": {"PORT": ["A"]},
                    "shadow": false, "topLevel": false}
        }),
    );

    let script = compute_edit_script(&before, &after).unwrap();
    assert!(script
        .iter()
        .any(|edit| matches!(edit, Edit::AddBlockToInput(_))));
    assert!(script.apply(&before).unwrap().equivalent_trees(&after));
}

#[test]
fn deleting_first_block_leaves_sequence_id_stale() {
    let before = load(chain(&[
        ("a", "spike_movement_startMoving"),
        ("b", "spike_movement_stopMoving"),
    ]));
    let after = load(chain(&[("b", "spike_movement_stopMoving")]));

    let script = compute_edit_script(&before, &after).unwrap();
    assert_eq!(script.len(), 1);
    assert!(matches!(
        &script.edits()[0],
        Edit::Delete(delete) if delete.node_id == NodeId::new("a"),
    ));

    // the surviving sequence keeps its original derived id even though its
    // first block changed; equivalence does not depend on ids
    let edited = script.apply(&before).unwrap();
    assert!(edited.equivalent_trees(&after));
    assert!(edited.contains_id(&NodeId::new(":seq@a")));
    assert!(!edited.contains_id(&NodeId::new(":seq@b")));
}

#[test]
fn c_shape_bodies_survive_round_trips() {
    let looped = |body_opcode: &str| {
        load(json!({
            "loop": {"opcode": "control_forever", "next": null, "parent": null,
                     "inputs": {"SUBSTACK": [2, "body1"]},
                     "fields": {}, "shadow": false, "topLevel": true},
            "body1": {"opcode": "spike_movement_startMoving", "next": "body2", "parent": "loop",
                      "inputs": {}, "fields": {}, "shadow": false, "topLevel": false},
            "body2": {"opcode": body_opcode, "next": null, "parent": "body1",
                      "inputs": {}, "fields": {}, "shadow": false, "topLevel": false}
        }))
    };
    let before = looped("spike_movement_stopMoving");
    let after = looped("spike_play_beep");

    let script = compute_edit_script(&before, &after).unwrap();
    let edited = script.apply(&before).unwrap();
    assert!(edited.equivalent_trees(&after));

    // the loop body is still a sequence expression
    let substack = edited
        .find_input(&NodeId::new("loop"), "SUBSTACK")
        .expect("loop keeps its SUBSTACK input");
    let body = edited.expression(&substack).expect("body still attached");
    assert!(matches!(
        edited.node(&body).unwrap().kind,
        NodeKind::Sequence { .. }
    ));
}

#[test]
fn scripts_survive_json_round_trips_end_to_end() {
    let before = motor_program("rotations", "75");
    let after = motor_program("seconds", "100");

    let script = compute_edit_script(&before, &after).unwrap();
    let json = script.to_json();
    let reparsed = diff_engine::EditScript::from_json(&json).unwrap();
    assert_eq!(script, reparsed);

    // the reparsed script still transforms the source tree
    assert!(reparsed.apply(&before).unwrap().equivalent_trees(&after));
}
