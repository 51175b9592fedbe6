//! Integration tests for the pendant-core public API.
//!
//! These tests walk a transition through key naming, key-state tracking,
//! event-name resolution and command framing, the way the dispatch core
//! uses them together.

use pendant_core::keymap::KeyMapper;
use pendant_core::{
    decode_packet, encode_event, event_names, relative_movement, EnginePacket, EventName,
    KeyState, KeyStateStore, KeyTransition, Movement, SocketPacket, TransitionKind,
    TransitionLabel,
};
use serde_json::json;

fn transition(code: u16, kind: TransitionKind) -> KeyTransition {
    KeyTransition::new(KeyMapper::identity(code, None), kind, "/dev/input/event3")
}

#[test]
fn test_binding_written_by_name_or_code_matches_same_transition() {
    // Arrange
    let by_name: EventName = "KEY_KP8:keydown".parse().unwrap();
    let by_code: EventName = "72".parse().unwrap();

    // Act
    let names = event_names(&transition(72, TransitionKind::PressStart));

    // Assert
    assert!(names.contains(&by_name));
    assert!(names.contains(&by_code));
    assert!(!names.contains(&EventName::with_label("KEY_KP8", TransitionLabel::KeyUp)));
}

#[test]
fn test_key_state_follows_press_repeat_release() {
    let mut store = KeyStateStore::new();
    assert_eq!(store.query("KEY_LEFTSHIFT"), KeyState::Unknown);

    for kind in [TransitionKind::PressStart, TransitionKind::Repeat] {
        let t = transition(42, kind);
        store.update(&t.key, t.kind.is_pressed());
        assert_eq!(store.query("KEY_LEFTSHIFT"), KeyState::Pressed);
        assert_eq!(store.query(42u16), KeyState::Pressed);
    }

    let t = transition(42, TransitionKind::PressEnd);
    store.update(&t.key, t.kind.is_pressed());
    assert_eq!(store.query("KEY_LEFTSHIFT"), KeyState::Released);
    assert_eq!(store.query("42"), KeyState::Released);
}

#[test]
fn test_jog_commands_frame_as_write_events() {
    // Arrange
    let commands = relative_movement(&Movement::default().y(5.0));

    // Act
    let frames: Vec<String> = commands
        .into_iter()
        .map(|line| encode_event("write", vec![json!("/dev/ttyUSB0"), json!(format!("{line};\n"))]))
        .collect();

    // Assert: the server side decodes exactly what was framed
    let decoded = decode_packet(&frames[1]).unwrap();
    assert_eq!(
        decoded,
        EnginePacket::Message(SocketPacket::Event {
            name: "write".to_string(),
            args: vec![json!("/dev/ttyUSB0"), json!("G0 Y5;\n")],
        })
    );
}
