//! Criterion benchmarks for the per-transition hot path.
//!
//! Every key transition updates the key-state store, resolves its four
//! event names, and (for jog keys) builds a movement command list.  These
//! benchmarks measure each step in isolation.
//!
//! Run with:
//! ```bash
//! cargo bench --package pendant-core --bench dispatch_path_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pendant_core::keymap::KeyMapper;
use pendant_core::{
    encode_event, event_names, relative_movement, KeyStateStore, KeyTransition, Movement,
    TransitionKind,
};
use serde_json::json;

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn make_transition() -> KeyTransition {
    KeyTransition::new(
        KeyMapper::identity(72, None),
        TransitionKind::PressStart,
        "/dev/input/event0",
    )
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_event_names(c: &mut Criterion) {
    let transition = make_transition();
    c.bench_function("event_names/KEY_KP8", |b| {
        b.iter(|| event_names(black_box(&transition)))
    });
}

fn bench_key_state_update(c: &mut Criterion) {
    let transition = make_transition();
    let mut store = KeyStateStore::new();
    c.bench_function("key_state/update_and_query", |b| {
        b.iter(|| {
            store.update(black_box(&transition.key), true);
            store.query(black_box(72u16))
        })
    });
}

fn bench_identity_lookup(c: &mut Criterion) {
    c.bench_function("keymap/identity", |b| {
        b.iter(|| KeyMapper::identity(black_box(103), None))
    });
}

fn bench_jog_frame(c: &mut Criterion) {
    let movement = Movement::default().x(5.0).y(-5.0);
    c.bench_function("gcode/relative_movement_frames", |b| {
        b.iter(|| {
            relative_movement(black_box(&movement))
                .into_iter()
                .map(|line| encode_event("write", vec![json!("/dev/ttyUSB0"), json!(line)]))
                .count()
        })
    });
}

criterion_group!(
    benches,
    bench_event_names,
    bench_key_state_update,
    bench_identity_lookup,
    bench_jog_frame
);
criterion_main!(benches);
