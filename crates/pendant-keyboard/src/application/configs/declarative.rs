//! Declarative binding files written in TOML.
//!
//! A binding file seeds the global state and lists bindings whose handler is
//! one of a small set of actions instead of code:
//!
//! ```toml
//! [global]
//! step = 1
//! stepMaxZ = 10
//!
//! [[events]]
//! event = "KEY_KP8:keydown"
//! description = "Move Axis: Y+"
//! move = { y = "step" }
//!
//! [[events]]
//! event = "KEY_KPMINUS:keydown"
//! move = { z = "-step", max = "stepMaxZ" }
//!
//! [[events]]
//! event = "KEY_ESC:keydown"
//! command = "gcode:start"
//! ```
//!
//! # Actions
//!
//! | Key       | Effect                                                        |
//! |-----------|---------------------------------------------------------------|
//! | `command` | emits `command` with the name and optional `args`             |
//! | `write`   | writes one line or a list (`line_ending = false` to skip `;`) |
//! | `move`    | relative (default) or absolute move; axes are numbers or      |
//! |           | global references such as `"step"` / `"-step"`                |
//! | `set`     | assigns global entries, e.g. `set = { step = 5 }`             |
//! | `toggle`  | flips a boolean global, writing `on` / `off` afterwards       |
//!
//! Each entry needs exactly one action.  Problems are collected per entry and
//! reported together with the other binding problems of the file.

use std::path::Path;
use std::sync::Arc;

use anyhow::anyhow;
use pendant_core::{
    absolute_movement, limit_value, relative_movement, CommandList, GlobalState, Movement,
};
use serde_json::{Map, Number, Value};

use crate::application::bindings::{BindingIssue, ConfigError, ConfigNode, Handler};
use crate::application::context::HandlerContext;

const ACTIONS: [&str; 5] = ["command", "write", "move", "set", "toggle"];
const ENTRY_FIELDS: [&str; 4] = ["event", "description", "args", "line_ending"];

/// Parses a binding file into a raw configuration tree.
///
/// Returns the tree together with the action problems found while
/// compiling entries; pass both to validation so every problem is reported
/// at once.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] if `text` is not valid TOML.
pub fn parse(text: &str, path: &Path) -> Result<(ConfigNode, Vec<BindingIssue>), ConfigError> {
    let table: toml::Table = toml::from_str(text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let mut issues = Vec::new();
    let mut fields = Vec::new();
    for (key, value) in &table {
        let node = match (key.as_str(), value) {
            ("events", toml::Value::Array(entries)) => ConfigNode::List(
                entries
                    .iter()
                    .enumerate()
                    .map(|(index, entry)| compile_entry(index, entry, &mut issues))
                    .collect(),
            ),
            _ => ConfigNode::from(to_json(value)),
        };
        fields.push((key.clone(), node));
    }
    Ok((ConfigNode::map(fields), issues))
}

fn compile_entry(index: usize, entry: &toml::Value, issues: &mut Vec<BindingIssue>) -> ConfigNode {
    let toml::Value::Table(table) = entry else {
        // Left to validation, which reports the wrong entry type.
        return ConfigNode::from(to_json(entry));
    };

    let mut fields = Vec::new();
    for key in ["event", "description"] {
        if let Some(value) = table.get(key) {
            fields.push((key, ConfigNode::Scalar(to_json(value))));
        }
    }
    for key in table.keys() {
        if !ACTIONS.contains(&key.as_str()) && !ENTRY_FIELDS.contains(&key.as_str()) {
            issues.push(BindingIssue::new(index, key.as_str(), "unknown field"));
        }
    }

    let present: Vec<&str> = ACTIONS
        .iter()
        .copied()
        .filter(|action| table.contains_key(*action))
        .collect();
    match present.as_slice() {
        [] => issues.push(BindingIssue::new(
            index,
            "handler",
            format!("no action (expected one of {})", ACTIONS.join(", ")),
        )),
        [name] => match compile_action(name, table) {
            Ok(action) => {
                let handler: Arc<dyn Handler> = Arc::new(action);
                fields.push(("handler", ConfigNode::Handler(handler)));
            }
            Err(message) => issues.push(BindingIssue::new(index, *name, message)),
        },
        several => issues.push(BindingIssue::new(
            index,
            "handler",
            format!("more than one action: {}", several.join(", ")),
        )),
    }
    ConfigNode::map(fields)
}

// ── Actions ───────────────────────────────────────────────────────────────────

/// A compiled declarative action.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Command { name: String, args: Vec<Value> },
    Write { commands: CommandList, line_ending: bool },
    Move { absolute: bool, axes: [Option<AxisSpec>; 3], max: Option<Operand> },
    Set(Vec<(String, Value)>),
    Toggle { key: String, on: Option<CommandList>, off: Option<CommandList> },
}

/// A number, or the name of a numeric global entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Fixed(f64),
    Global(String),
}

impl Operand {
    fn resolve(&self, global: &GlobalState) -> anyhow::Result<f64> {
        match self {
            Operand::Fixed(value) => Ok(*value),
            Operand::Global(key) => global
                .get_f64(key)
                .ok_or_else(|| anyhow!("global \"{key}\" is not a number")),
        }
    }
}

/// One axis of a `move` action.  `max` caps the operand before the sign is
/// applied.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisSpec {
    pub operand: Operand,
    pub negate: bool,
}

impl Handler for Action {
    fn call(&self, ctx: &mut HandlerContext<'_>) -> anyhow::Result<()> {
        match self {
            Action::Command { name, args } => {
                let mut all = Vec::with_capacity(args.len() + 1);
                all.push(Value::String(name.clone()));
                all.extend(args.iter().cloned());
                ctx.emit("command", all)?;
            }
            Action::Write {
                commands,
                line_ending,
            } => ctx.write_with(commands.clone(), *line_ending)?,
            Action::Move { absolute, axes, max } => {
                let global = ctx.global();
                let max = max.as_ref().map(|m| m.resolve(global)).transpose()?;
                let mut values = [None; 3];
                for (slot, spec) in values.iter_mut().zip(axes) {
                    if let Some(spec) = spec {
                        let value = limit_value(spec.operand.resolve(global)?, None, max);
                        *slot = Some(if spec.negate { -value } else { value });
                    }
                }
                let movement = Movement {
                    x: values[0],
                    y: values[1],
                    z: values[2],
                };
                let commands = if *absolute {
                    absolute_movement(&movement)
                } else {
                    relative_movement(&movement)
                };
                ctx.write(commands)?;
            }
            Action::Set(assignments) => {
                for (key, value) in assignments {
                    ctx.global_mut().set(key.clone(), value.clone());
                }
            }
            Action::Toggle { key, on, off } => {
                let commands = if ctx.global_mut().toggle(key) { on } else { off };
                if let Some(commands) = commands {
                    ctx.write(commands.clone())?;
                }
            }
        }
        Ok(())
    }
}

fn compile_action(name: &str, entry: &toml::Table) -> Result<Action, String> {
    let value = &entry[name];
    match name {
        "command" => {
            let name = value.as_str().ok_or("must be a string")?.to_string();
            let args = match entry.get("args") {
                None => Vec::new(),
                Some(toml::Value::Array(items)) => items.iter().map(to_json).collect(),
                Some(_) => return Err("args must be a list".to_string()),
            };
            Ok(Action::Command { name, args })
        }
        "write" => {
            let line_ending = match entry.get("line_ending") {
                None => true,
                Some(toml::Value::Boolean(flag)) => *flag,
                Some(_) => return Err("line_ending must be true or false".to_string()),
            };
            Ok(Action::Write {
                commands: command_list(value)?,
                line_ending,
            })
        }
        "move" => compile_move(value),
        "set" => {
            let table = value.as_table().ok_or("must be a table")?;
            if table.is_empty() {
                return Err("must assign at least one entry".to_string());
            }
            Ok(Action::Set(
                table.iter().map(|(k, v)| (k.clone(), to_json(v))).collect(),
            ))
        }
        "toggle" => {
            let table = value.as_table().ok_or("must be a table")?;
            let key = table
                .get("key")
                .and_then(toml::Value::as_str)
                .ok_or("needs a string \"key\"")?
                .to_string();
            let on = table.get("on").map(command_list).transpose()?;
            let off = table.get("off").map(command_list).transpose()?;
            Ok(Action::Toggle { key, on, off })
        }
        other => Err(format!("unknown action \"{other}\"")),
    }
}

fn compile_move(value: &toml::Value) -> Result<Action, String> {
    let table = value.as_table().ok_or("must be a table")?;
    let mut absolute = false;
    let mut axes: [Option<AxisSpec>; 3] = [None, None, None];
    let mut max = None;

    for (key, value) in table {
        match key.as_str() {
            "mode" => {
                absolute = match value.as_str() {
                    Some("relative") => false,
                    Some("absolute") => true,
                    _ => return Err("mode must be \"relative\" or \"absolute\"".to_string()),
                }
            }
            "x" | "y" | "z" => {
                let slot = match key.as_str() {
                    "x" => 0,
                    "y" => 1,
                    _ => 2,
                };
                axes[slot] = Some(axis_spec(key, value)?);
            }
            "max" => {
                let spec = axis_spec(key, value)?;
                if spec.negate {
                    return Err("max must not be negated".to_string());
                }
                max = Some(spec.operand);
            }
            other => return Err(format!("unknown field \"{other}\"")),
        }
    }
    if axes.iter().all(Option::is_none) {
        return Err("needs at least one of x, y, z".to_string());
    }
    Ok(Action::Move { absolute, axes, max })
}

fn axis_spec(key: &str, value: &toml::Value) -> Result<AxisSpec, String> {
    match value {
        toml::Value::Integer(n) => Ok(AxisSpec {
            operand: Operand::Fixed(*n as f64),
            negate: false,
        }),
        toml::Value::Float(f) => Ok(AxisSpec {
            operand: Operand::Fixed(*f),
            negate: false,
        }),
        toml::Value::String(text) => {
            let (negate, name) = match text.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, text.as_str()),
            };
            if name.is_empty() {
                return Err(format!("{key} references an empty global name"));
            }
            Ok(AxisSpec {
                operand: Operand::Global(name.to_string()),
                negate,
            })
        }
        _ => Err(format!("{key} must be a number or a global name")),
    }
}

fn command_list(value: &toml::Value) -> Result<CommandList, String> {
    match value {
        toml::Value::String(line) => Ok(CommandList::from(line.as_str())),
        toml::Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| "commands must be strings".to_string())
            })
            .collect::<Result<Vec<_>, _>>()
            .map(CommandList::from),
        _ => Err("must be a string or a list of strings".to_string()),
    }
}

/// Converts a TOML value to JSON.  Datetimes become strings.
fn to_json(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Integer(n) => Value::from(*n),
        toml::Value::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(d) => Value::String(d.to_string()),
        toml::Value::Array(items) => Value::Array(items.iter().map(to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .iter()
                .map(|(k, v)| (k.clone(), to_json(v)))
                .collect::<Map<String, Value>>(),
        ),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::bindings::validate_with;
    use crate::application::dispatch::{DispatchCore, DispatchOptions};
    use crate::infrastructure::channel::mock::RecordingChannel;
    use pendant_core::{KeyIdentity, KeyTransition, TransitionKind};
    use serde_json::json;
    use std::path::PathBuf;

    const SAMPLE: &str = r#"
        [global]
        step = 5
        stepMaxZ = 2
        vacuum = false

        [[events]]
        event = "KEY_KP8:keydown"
        description = "Jog Y+"
        move = { y = "step" }

        [[events]]
        event = "KEY_KPPLUS:keydown"
        move = { z = "-step", max = "stepMaxZ" }

        [[events]]
        event = "KEY_KP5:keydown"
        move = { mode = "absolute", x = 0, y = 0 }

        [[events]]
        event = "KEY_ESC:keydown"
        command = "macro:run"
        args = ["abc"]

        [[events]]
        event = "KEY_KPASTERISK:keydown"
        write = ["G92 X0", "G92 Y0"]

        [[events]]
        event = "KEY_INSERT:keydown"
        set = { step = 1 }

        [[events]]
        event = "KEY_LEFT:keydown"
        toggle = { key = "vacuum", on = "M7", off = "M9" }
    "#;

    fn load(text: &str) -> Result<crate::application::bindings::Configuration, ConfigError> {
        let (node, issues) = parse(text, &PathBuf::from("test.toml"))?;
        validate_with(&node, issues)
    }

    fn run(text: &str, keys: &[(&str, u16)]) -> (DispatchCore, Arc<RecordingChannel>) {
        let channel = Arc::new(RecordingChannel::new());
        let mut core =
            DispatchCore::new(load(text).unwrap(), channel.clone(), "port", DispatchOptions::default());
        for &(name, code) in keys {
            core.on_raw_transition(&KeyTransition::new(
                KeyIdentity::new(name, code),
                TransitionKind::PressStart,
                "/dev/input/event0",
            ));
        }
        (core, channel)
    }

    fn written(channel: &RecordingChannel) -> Vec<Value> {
        channel.sent().into_iter().map(|s| s.args[0].clone()).collect()
    }

    #[test]
    fn test_sample_file_loads() {
        let loaded = load(SAMPLE).unwrap();

        assert_eq!(loaded.bindings.len(), 7);
        assert_eq!(loaded.bindings.bindings()[0].description, "Jog Y+");
        assert_eq!(loaded.global.get_f64("step"), Some(5.0));
    }

    #[test]
    fn test_move_uses_global_step() {
        let (_, channel) = run(SAMPLE, &[("KEY_KP8", 72)]);

        assert_eq!(written(&channel), vec![json!("G91;\n"), json!("G0 Y5;\n"), json!("G90;\n")]);
    }

    #[test]
    fn test_move_negated_and_capped() {
        let (_, channel) = run(SAMPLE, &[("KEY_KPPLUS", 78)]);

        assert_eq!(written(&channel)[1], json!("G0 Z-2;\n"));
    }

    #[test]
    fn test_absolute_move() {
        let (_, channel) = run(SAMPLE, &[("KEY_KP5", 76)]);

        assert_eq!(written(&channel), vec![json!("G90;\n"), json!("G0 X0 Y0;\n"), json!("G90;\n")]);
    }

    #[test]
    fn test_command_with_args() {
        let (_, channel) = run(SAMPLE, &[("KEY_ESC", 1)]);

        let sent = channel.sent();
        assert_eq!(sent[0].event, "command");
        assert_eq!(sent[0].args, vec![json!("macro:run"), json!("abc")]);
    }

    #[test]
    fn test_set_then_move_uses_new_step() {
        let (core, channel) = run(SAMPLE, &[("KEY_INSERT", 110), ("KEY_KP8", 72)]);

        assert_eq!(core.global().get_f64("step"), Some(1.0));
        assert_eq!(written(&channel)[1], json!("G0 Y1;\n"));
    }

    #[test]
    fn test_toggle_writes_on_then_off() {
        let (_, channel) = run(SAMPLE, &[("KEY_LEFT", 105), ("KEY_LEFT", 105)]);

        assert_eq!(written(&channel), vec![json!("M7;\n"), json!("M9;\n")]);
    }

    #[test]
    fn test_write_without_line_ending() {
        let text = r#"
            global = {}
            [[events]]
            event = "KEY_EQUAL"
            write = "$X"
            line_ending = false
        "#;

        let (_, channel) = run(text, &[("KEY_EQUAL", 13)]);

        assert_eq!(written(&channel), vec![json!("$X")]);
    }

    #[test]
    fn test_action_problems_are_reported_with_binding_problems() {
        // Arrange: entry 0 has no action, entry 1 a bad move, entry 2 a bad
        // event suffix, entry 3 two actions, entry 4 is fine.
        let text = r#"
            [global]
            [[events]]
            event = "KEY_A"
            [[events]]
            event = "KEY_B"
            move = { mode = "sideways", x = 1 }
            [[events]]
            event = "KEY_C:keypess"
            write = "M5"
            [[events]]
            event = "KEY_D"
            write = "M5"
            command = "reset"
            [[events]]
            event = "KEY_E"
            write = "M5"
        "#;

        // Act
        let Err(ConfigError::Binding(issues)) = load(text) else {
            panic!("expected binding error");
        };

        // Assert
        let indices: Vec<usize> = issues.iter().map(|i| i.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert_eq!(issues[1].field, "move");
        assert_eq!(issues[2].field, "event");
    }

    #[test]
    fn test_unknown_entry_field_is_reported() {
        let text = r#"
            [global]
            [[events]]
            event = "KEY_A"
            write = "M5"
            descripton = "typo"
        "#;

        let Err(ConfigError::Binding(issues)) = load(text) else {
            panic!("expected binding error");
        };

        assert_eq!(issues, vec![BindingIssue::new(0, "descripton", "unknown field")]);
    }

    #[test]
    fn test_missing_global_is_shape_error() {
        let text = r#"
            [[events]]
            event = "KEY_A"
            write = "M5"
        "#;

        assert!(matches!(load(text), Err(ConfigError::Shape(_))));
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        assert!(matches!(load("[[[ nope"), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_missing_global_value_fails_the_handler() {
        let text = r#"
            [global]
            [[events]]
            event = "KEY_A"
            move = { x = "feed" }
        "#;
        let channel = Arc::new(RecordingChannel::new());
        let mut core =
            DispatchCore::new(load(text).unwrap(), channel.clone(), "p", DispatchOptions::default());

        let report = core.on_raw_transition(&KeyTransition::new(
            KeyIdentity::new("KEY_A", 30),
            TransitionKind::PressStart,
            "/dev/input/event0",
        ));

        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].message.contains("\"feed\""));
        assert!(channel.sent().is_empty());
    }
}
