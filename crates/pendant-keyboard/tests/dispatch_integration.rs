//! Integration tests for the dispatch pipeline.
//!
//! These tests exercise the relay end-to-end without hardware:
//! `MockInputSource` → `DispatchCore` (built-in `default` bindings) →
//! `RecordingChannel`.

use std::sync::Arc;

use pendant_core::{KeyState, TransitionKind};
use pendant_keyboard::application::configs::{ConfigLoader, ConfigSource};
use pendant_keyboard::application::dispatch::{DispatchCore, DispatchOptions, DispatchReport};
use pendant_keyboard::infrastructure::channel::RecordingChannel;
use pendant_keyboard::infrastructure::input_capture::mock::MockInputSource;
use pendant_keyboard::infrastructure::input_capture::KeyInputSource;
use serde_json::{json, Value};

const KEY_8: u16 = 9;
const KEY_UP: u16 = 103;
const KEY_PAGEUP: u16 = 104;
const KEY_LEFT: u16 = 105;

fn default_core(channel: Arc<RecordingChannel>) -> DispatchCore {
    let config = ConfigLoader::default()
        .load(ConfigSource::Named("default".to_string()))
        .expect("built-in configuration must validate");
    DispatchCore::new(config, channel, "/dev/ttyUSB0", DispatchOptions::default())
}

/// Dispatches everything the source has produced so far.
fn drain(
    core: &mut DispatchCore,
    rx: &mut tokio::sync::mpsc::UnboundedReceiver<pendant_core::KeyTransition>,
) -> Vec<DispatchReport> {
    let mut reports = Vec::new();
    while let Ok(transition) = rx.try_recv() {
        reports.push(core.on_raw_transition(&transition));
    }
    reports
}

fn written(channel: &RecordingChannel) -> Vec<Value> {
    channel
        .sent()
        .into_iter()
        .filter(|s| s.event == "write")
        .map(|s| s.args[0].clone())
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[test]
fn test_step_preset_then_jog_writes_relative_move() {
    // Arrange
    let channel = Arc::new(RecordingChannel::new());
    let mut core = default_core(channel.clone());
    let source = MockInputSource::new();
    let mut rx = source.start().expect("start should succeed");

    // Act: select a 5mm step, then jog Y+
    assert!(source.tap(KEY_PAGEUP));
    assert!(source.tap(KEY_8));
    drain(&mut core, &mut rx);

    // Assert
    assert_eq!(core.global().get_f64("step"), Some(5.0));
    assert_eq!(
        written(&channel),
        vec![json!("G91;\n"), json!("G0 Y5;\n"), json!("G90;\n")]
    );
    assert!(channel.sent().iter().all(|s| s.port == "/dev/ttyUSB0"));
}

#[test]
fn test_release_and_repeat_do_not_fire_keydown_bindings() {
    let channel = Arc::new(RecordingChannel::new());
    let mut core = default_core(channel.clone());
    let source = MockInputSource::new();
    let mut rx = source.start().unwrap();

    source.inject_key(KEY_UP, TransitionKind::PressStart);
    source.inject_key(KEY_UP, TransitionKind::Repeat);
    source.inject_key(KEY_UP, TransitionKind::Repeat);
    source.inject_key(KEY_UP, TransitionKind::PressEnd);
    let reports = drain(&mut core, &mut rx);

    assert_eq!(reports.len(), 4);
    assert_eq!(reports[0].invoked, vec!["KEY_UP:keydown".to_string()]);
    assert!(reports[1..].iter().all(|r| r.invoked.is_empty()));
    assert_eq!(written(&channel), vec![json!("M3 S1000;\n")]);
    assert_eq!(core.key_states().query("KEY_UP"), KeyState::Released);
}

#[test]
fn test_vacuum_toggle_state_persists_across_presses() {
    let channel = Arc::new(RecordingChannel::new());
    let mut core = default_core(channel.clone());
    let source = MockInputSource::new();
    let mut rx = source.start().unwrap();

    source.tap(KEY_LEFT);
    source.tap(KEY_LEFT);
    source.tap(KEY_LEFT);
    drain(&mut core, &mut rx);

    assert_eq!(
        written(&channel),
        vec![json!("M7;\n"), json!("M9;\n"), json!("M7;\n")]
    );
    assert_eq!(core.global().get_bool("vacuumState"), Some(true));
}

#[test]
fn test_disconnected_channel_reports_failure_and_keeps_dispatching() {
    // Arrange
    let channel = Arc::new(RecordingChannel::disconnected());
    let mut core = default_core(channel.clone());
    let source = MockInputSource::new();
    let mut rx = source.start().unwrap();

    // Act
    source.tap(KEY_UP);
    source.tap(KEY_PAGEUP);
    let reports = drain(&mut core, &mut rx);

    // Assert: the spindle write failed, the step preset still applied
    assert_eq!(reports[0].failures.len(), 1);
    assert!(!reports[0].failures[0].panicked);
    assert!(reports[2].failures.is_empty());
    assert_eq!(core.global().get_f64("step"), Some(5.0));
    assert!(channel.sent().is_empty());
}

#[test]
fn test_unbound_key_only_updates_key_state() {
    let channel = Arc::new(RecordingChannel::new());
    let mut core = default_core(channel.clone());
    let source = MockInputSource::new();
    let mut rx = source.start().unwrap();

    // KEY_F12 has no binding in the default layout
    source.inject_key(88, TransitionKind::PressStart);
    let reports = drain(&mut core, &mut rx);

    assert!(reports[0].invoked.is_empty());
    assert_eq!(core.key_states().query(88u16), KeyState::Pressed);
    assert_eq!(core.key_states().query("KEY_F12"), KeyState::Pressed);
    assert_eq!(channel.attempts(), 0);
}
