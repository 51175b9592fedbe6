//! G-code command builders used by pendant configurations.
//!
//! The builders return bare commands without line endings (`G91`, not
//! `G91;\n`); the handler context appends the terminator when writing.
//!
//! # Relative vs absolute moves (for beginners)
//!
//! `G91` switches the controller to relative positioning, so `G0 X1` means
//! "one unit to the right of here".  `G90` switches back to absolute
//! positioning, where `G0 X1` means "to X = 1".  A jog therefore always ends
//! with `G90` so later commands from other sources see the usual mode.

use std::fmt;

/// One command or a sequence of commands, in send order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandList(pub Vec<String>);

impl CommandList {
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl IntoIterator for CommandList {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<&str> for CommandList {
    fn from(command: &str) -> Self {
        Self(vec![command.to_string()])
    }
}

impl From<String> for CommandList {
    fn from(command: String) -> Self {
        Self(vec![command])
    }
}

impl From<Vec<String>> for CommandList {
    fn from(commands: Vec<String>) -> Self {
        Self(commands)
    }
}

impl From<Vec<&str>> for CommandList {
    fn from(commands: Vec<&str>) -> Self {
        Self(commands.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for CommandList {
    fn from(commands: &[&str]) -> Self {
        Self(commands.iter().map(|c| c.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for CommandList {
    fn from(commands: [&str; N]) -> Self {
        Self(commands.iter().map(|c| c.to_string()).collect())
    }
}

impl PartialEq<[&str]> for CommandList {
    fn eq(&self, other: &[&str]) -> bool {
        self.0.len() == other.len() && self.0.iter().zip(other).all(|(a, b)| a == b)
    }
}

impl<const N: usize> PartialEq<[&str; N]> for CommandList {
    fn eq(&self, other: &[&str; N]) -> bool {
        self == &other[..]
    }
}

/// Per-axis distances or positions.  `None` leaves the axis out of the move.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Movement {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

impl Movement {
    pub fn x(mut self, value: f64) -> Self {
        self.x = Some(value);
        self
    }

    pub fn y(mut self, value: f64) -> Self {
        self.y = Some(value);
        self
    }

    pub fn z(mut self, value: f64) -> Self {
        self.z = Some(value);
        self
    }

    /// Renders the usable axes as `X1 Z-2`.
    ///
    /// Non-finite values are skipped; values are floored to whole units.
    fn axis_words(&self) -> Vec<String> {
        [('X', self.x), ('Y', self.y), ('Z', self.z)]
            .into_iter()
            .filter_map(|(axis, value)| {
                value
                    .filter(|v| v.is_finite())
                    .map(|v| format!("{axis}{}", v.floor() as i64))
            })
            .collect()
    }
}

impl fmt::Display for Movement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: Option<f64>| v.map_or_else(|| "none".to_string(), |v| v.to_string());
        write!(f, "x={} y={} z={}", show(self.x), show(self.y), show(self.z))
    }
}

/// Builds a relative jog: `G91`, `G0 <axes>`, `G90`.
///
/// If no axis is usable the result is a single G-code comment describing
/// the rejected input, which the controller ignores.
pub fn relative_movement(movement: &Movement) -> CommandList {
    framed_move("G91", "relative movement", movement)
}

/// Builds an absolute move: `G90`, `G0 <axes>`, `G90`.
///
/// If no axis is usable the result is a single G-code comment describing
/// the rejected input.
pub fn absolute_movement(movement: &Movement) -> CommandList {
    framed_move("G90", "absolute movement", movement)
}

fn framed_move(mode: &str, what: &str, movement: &Movement) -> CommandList {
    let words = movement.axis_words();
    if words.is_empty() {
        return CommandList::from(format!("; {what} could not parse the input: {movement}"));
    }
    CommandList(vec![
        mode.to_string(),
        format!("G0 {}", words.join(" ")),
        "G90".to_string(),
    ])
}

/// Clamps `value` into `[min, max]`; a `None` bound is not checked.
pub fn limit_value(value: f64, min: Option<f64>, max: Option<f64>) -> f64 {
    let mut value = value;
    if let Some(min) = min.filter(|m| !m.is_nan()) {
        if value < min {
            value = min;
        }
    }
    if let Some(max) = max.filter(|m| !m.is_nan()) {
        if value > max {
            value = max;
        }
    }
    value
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_movement_x_and_z() {
        let commands = relative_movement(&Movement::default().x(1.0).z(-2.0));

        assert_eq!(commands, ["G91", "G0 X1 Z-2", "G90"]);
    }

    #[test]
    fn test_absolute_movement_to_origin() {
        let commands = absolute_movement(&Movement::default().x(0.0).y(0.0));

        assert_eq!(commands, ["G90", "G0 X0 Y0", "G90"]);
    }

    #[test]
    fn test_axes_are_floored() {
        let commands = relative_movement(&Movement::default().y(2.7).z(-0.5));

        assert_eq!(commands.0[1], "G0 Y2 Z-1");
    }

    #[test]
    fn test_empty_movement_yields_comment_placeholder() {
        // Act
        let commands = relative_movement(&Movement::default());

        // Assert: one non-movement line, never an empty list
        assert_eq!(commands.len(), 1);
        assert!(commands.0[0].starts_with("; relative movement could not parse the input"));
    }

    #[test]
    fn test_non_finite_axes_are_ignored() {
        let commands = relative_movement(&Movement::default().x(f64::NAN).y(3.0));
        assert_eq!(commands, ["G91", "G0 Y3", "G90"]);

        let commands = absolute_movement(&Movement::default().z(f64::INFINITY));
        assert_eq!(commands.len(), 1);
    }

    #[test]
    fn test_limit_value() {
        assert_eq!(limit_value(20.0, None, Some(10.0)), 10.0);
        assert_eq!(limit_value(-5.0, Some(0.0), None), 0.0);
        assert_eq!(limit_value(5.0, Some(0.0), Some(10.0)), 5.0);
        assert_eq!(limit_value(5.0, None, None), 5.0);
    }

    #[test]
    fn test_command_list_conversions() {
        assert_eq!(CommandList::from("M5"), ["M5"]);
        assert_eq!(CommandList::from(vec!["G92 X0", "G92 Y0"]).len(), 2);
        assert_eq!(CommandList::from(["M7"]).into_vec(), vec!["M7".to_string()]);
    }
}
