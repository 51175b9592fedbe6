//! The built-in `default` configuration: a numeric keypad as a jog pendant.
//!
//! | Keys                         | Action                                  |
//! |------------------------------|-----------------------------------------|
//! | BACKSPACE, EQUAL, TAB        | reset, unlock, sleep                    |
//! | SYSRQ, ESC                   | feedhold, start the loaded program      |
//! | 8 2 6 4 (7 9 1 3)            | jog XY by `step` (diagonals)            |
//! | 5                            | move to X0 Y0                           |
//! | KPPLUS, COMMA                | jog Z by `step`, at most `stepMaxZ`     |
//! | INSERT HOME PAGEUP ...       | set `step` to 1, 2, 5, 10, 20, 50       |
//! | KPSLASH, KPMINUS             | run macros                              |
//! | KPASTERISK                   | zero the XY work offset                 |
//! | UP, DOWN                     | spindle on / off                        |
//! | LEFT                         | toggle vacuum (coolant M7 / M9)         |
//!
//! Every binding fires on `keydown`, i.e. once per physical key press.

use pendant_core::{absolute_movement, limit_value, relative_movement, Movement};
use serde_json::{json, Value};

use crate::application::bindings::{BindingTableBuilder, ConfigNode};
use crate::application::context::HandlerContext;

/// Macro ids on the CNCjs server.
const MACRO_HOME_XY: &str = "2a08d8c7-2e42-4d47-930b-8bf562c36e6d";
const MACRO_PROBE_Z: &str = "cfc7ccb0-0a3b-40bc-a7d3-8056b8c5f560";

/// Step widths selectable from the keypad.
const STEP_PRESETS: [(&str, u32); 6] = [
    ("KEY_INSERT", 1),
    ("KEY_HOME", 2),
    ("KEY_PAGEUP", 5),
    ("KEY_DELETE", 10),
    ("KEY_END", 20),
    ("KEY_PAGEDOWN", 50),
];

/// XY jog keys with their direction as (x, y) multipliers of `step`.
const XY_JOGS: [(&str, f64, f64, &str); 8] = [
    ("KEY_8", 0.0, 1.0, "Move Axis: Y+"),
    ("KEY_2", 0.0, -1.0, "Move Axis: Y-"),
    ("KEY_6", 1.0, 0.0, "Move Axis: X+"),
    ("KEY_4", -1.0, 0.0, "Move Axis: X-"),
    ("KEY_7", -1.0, 1.0, "Move Axis: X-Y+"),
    ("KEY_1", -1.0, -1.0, "Move Axis: X-Y-"),
    ("KEY_9", 1.0, 1.0, "Move Axis: X+Y+"),
    ("KEY_3", 1.0, -1.0, "Move Axis: X+Y-"),
];

/// Returns the raw `default` configuration tree.
pub fn config() -> ConfigNode {
    let mut builder = BindingTableBuilder::new().global(json!({
        "step": 1,
        "stepMaxZ": 10,
        "vacuumState": false,
    }));

    // Main controls
    for (key, command, description) in [
        ("KEY_BACKSPACE", "reset", "Reset"),
        ("KEY_EQUAL", "unlock", "Unlock"),
        ("KEY_TAB", "sleep", "Sleep"),
        ("KEY_SYSRQ", "feedhold", "Feedhold"),
        ("KEY_ESC", "gcode:start", "GCode Start"),
    ] {
        builder = builder.register(
            &keydown(key),
            move |ctx| command_event(ctx, &[json!(command)]),
            description,
        );
    }

    // Movement
    for (key, x, y, description) in XY_JOGS {
        builder = builder.register(
            &keydown(key),
            move |ctx| {
                let width = step(ctx);
                let mut movement = Movement::default();
                if x != 0.0 {
                    movement = movement.x(x * width);
                }
                if y != 0.0 {
                    movement = movement.y(y * width);
                }
                Ok(ctx.write(relative_movement(&movement))?)
            },
            description,
        );
    }
    builder = builder
        .register(
            &keydown("KEY_5"),
            |ctx| Ok(ctx.write(absolute_movement(&Movement::default().x(0.0).y(0.0)))?),
            "Move Axis: XY to 0",
        )
        .register(
            &keydown("KEY_KPPLUS"),
            |ctx| {
                let z = z_step(ctx);
                Ok(ctx.write(relative_movement(&Movement::default().z(z)))?)
            },
            "Move Axis: Z+",
        )
        .register(
            &keydown("KEY_COMMA"),
            |ctx| {
                let z = z_step(ctx);
                Ok(ctx.write(relative_movement(&Movement::default().z(-z)))?)
            },
            "Move Axis: Z-",
        );

    // Steps
    for (key, width) in STEP_PRESETS {
        builder = builder.register(
            &keydown(key),
            move |ctx| {
                ctx.global_mut().set("step", width);
                Ok(())
            },
            &format!("Set step width to {width}mm"),
        );
    }

    // Macros and offsets
    builder = builder
        .register(
            &keydown("KEY_KPSLASH"),
            |ctx| command_event(ctx, &[json!("macro:run"), json!(MACRO_HOME_XY)]),
            "Run Macro: Home XY",
        )
        .register(
            &keydown("KEY_KPASTERISK"),
            |ctx| Ok(ctx.write(["G92 X0", "G92 Y0"])?),
            "Set Offset XY to 0",
        )
        .register(
            &keydown("KEY_KPMINUS"),
            |ctx| command_event(ctx, &[json!("macro:run"), json!(MACRO_PROBE_Z)]),
            "Run Macro: Probe Z",
        );

    // Spindle and vacuum
    builder
        .register(
            &keydown("KEY_UP"),
            |ctx| Ok(ctx.write("M3 S1000")?),
            "Set Spindle ON",
        )
        .register(&keydown("KEY_DOWN"), |ctx| Ok(ctx.write("M5")?), "Set Spindle OFF")
        .register(
            &keydown("KEY_LEFT"),
            |ctx| {
                let on = ctx.global_mut().toggle("vacuumState");
                Ok(ctx.write(if on { "M7" } else { "M9" })?)
            },
            "Toggle Vacuum",
        )
        .into_config()
}

fn keydown(key: &str) -> String {
    format!("{key}:keydown")
}

fn command_event(ctx: &mut HandlerContext<'_>, args: &[Value]) -> anyhow::Result<()> {
    Ok(ctx.emit("command", args.to_vec())?)
}

fn step(ctx: &HandlerContext<'_>) -> f64 {
    ctx.global().get_f64("step").unwrap_or(1.0)
}

/// `step`, capped at `stepMaxZ`.
fn z_step(ctx: &HandlerContext<'_>) -> f64 {
    limit_value(step(ctx), None, ctx.global().get_f64("stepMaxZ"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
