//! Binding tables: which handler runs for which event name.
//!
//! A configuration arrives as a raw tree ([`ConfigNode`]) with two fields:
//!
//! ```text
//! {
//!   global: { step: 1, ... },                         // seeds GlobalState
//!   events: [ { event, handler, description }, ... ]  // bindings, in order
//! }
//! ```
//!
//! [`validate`] checks the shape of that tree and turns it into a
//! [`Configuration`]: the ordered [`BindingTable`] plus the initial
//! [`GlobalState`].  Configurations written in Rust use
//! [`BindingTableBuilder`], which produces the same tree and runs the same
//! validation, so every configuration source is held to the same rules.
//!
//! # Why a raw tree first? (for beginners)
//!
//! Configurations come from several places (compiled-in builders, TOML
//! files).  Checking one common intermediate form means an operator gets
//! the same exhaustive error report ("entries 2 and 5 are broken") no
//! matter where the configuration was written.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use pendant_core::{EventName, GlobalState};
use serde_json::{Map, Value};
use thiserror::Error;

use super::context::HandlerContext;

/// Description used when a binding does not provide one.
pub const DEFAULT_DESCRIPTION: &str = "No Description";

// ── Handlers ──────────────────────────────────────────────────────────────────

/// A unit of user behavior invoked for a matching key transition.
///
/// Any `Fn(&mut HandlerContext<'_>) -> anyhow::Result<()>` closure is a
/// handler.
pub trait Handler: Send + Sync {
    fn call(&self, ctx: &mut HandlerContext<'_>) -> anyhow::Result<()>;
}

impl<F> Handler for F
where
    F: Fn(&mut HandlerContext<'_>) -> anyhow::Result<()> + Send + Sync,
{
    fn call(&self, ctx: &mut HandlerContext<'_>) -> anyhow::Result<()> {
        self(ctx)
    }
}

/// One validated (pattern, handler, description) entry.
#[derive(Clone)]
pub struct Binding {
    pub pattern: EventName,
    pub handler: Arc<dyn Handler>,
    pub description: String,
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("pattern", &self.pattern)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// One problem with one entry of the `events` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingIssue {
    /// Position of the entry in the `events` list.
    pub index: usize,
    /// Field of the entry the problem is about, e.g. `event`.
    pub field: String,
    pub message: String,
}

impl BindingIssue {
    pub fn new(index: usize, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            index,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for BindingIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "events[{}].{} | {}", self.index, self.field, self.message)
    }
}

fn format_issues(issues: &[BindingIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("  {issue}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Errors that stop a configuration from being loaded.
///
/// All variants are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Top-level fields are missing or have the wrong type.
    #[error("invalid configuration: {0}")]
    Shape(String),

    /// One or more `events` entries are malformed.  Every malformed entry
    /// is listed.
    #[error("{} malformed binding(s):\n{}", .0.len(), format_issues(.0))]
    Binding(Vec<BindingIssue>),

    /// A configuration name resolved to nothing.
    #[error(
        "could not find configuration \"{name}\" (searched: {}). \
         Please check the name or create the file.",
        .searched.join(", ")
    )]
    NotFound { name: String, searched: Vec<String> },

    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

// ── Raw configuration tree ────────────────────────────────────────────────────

/// A configuration before validation.
///
/// Mirrors a JSON document in which some leaves may be handlers.
#[derive(Clone)]
pub enum ConfigNode {
    Map(BTreeMap<String, ConfigNode>),
    List(Vec<ConfigNode>),
    Scalar(Value),
    Handler(Arc<dyn Handler>),
}

impl ConfigNode {
    /// Builds a map node from `(key, node)` pairs.
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, ConfigNode)>) -> Self {
        ConfigNode::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn handler<F>(handler: F) -> Self
    where
        F: Fn(&mut HandlerContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        ConfigNode::Handler(Arc::new(handler))
    }

    fn kind(&self) -> &'static str {
        match self {
            ConfigNode::Map(_) => "a table",
            ConfigNode::List(_) => "a list",
            ConfigNode::Scalar(Value::Null) => "null",
            ConfigNode::Scalar(Value::Bool(_)) => "a boolean",
            ConfigNode::Scalar(Value::Number(_)) => "a number",
            ConfigNode::Scalar(Value::String(_)) => "a string",
            ConfigNode::Scalar(Value::Array(_)) => "a list",
            ConfigNode::Scalar(Value::Object(_)) => "a table",
            ConfigNode::Handler(_) => "a handler",
        }
    }

    /// Converts the node to plain JSON; `None` if it contains a handler.
    fn to_json(&self) -> Option<Value> {
        match self {
            ConfigNode::Map(entries) => entries
                .iter()
                .map(|(k, v)| v.to_json().map(|v| (k.clone(), v)))
                .collect::<Option<Map<String, Value>>>()
                .map(Value::Object),
            ConfigNode::List(items) => items
                .iter()
                .map(ConfigNode::to_json)
                .collect::<Option<Vec<Value>>>()
                .map(Value::Array),
            ConfigNode::Scalar(value) => Some(value.clone()),
            ConfigNode::Handler(_) => None,
        }
    }
}

impl fmt::Debug for ConfigNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigNode::Map(entries) => f.debug_map().entries(entries.iter()).finish(),
            ConfigNode::List(items) => f.debug_list().entries(items.iter()).finish(),
            ConfigNode::Scalar(value) => write!(f, "{value}"),
            ConfigNode::Handler(_) => f.write_str("<handler>"),
        }
    }
}

impl From<Value> for ConfigNode {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => {
                ConfigNode::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
            Value::Array(items) => ConfigNode::List(items.into_iter().map(Into::into).collect()),
            scalar => ConfigNode::Scalar(scalar),
        }
    }
}

// ── Validated table ───────────────────────────────────────────────────────────

/// Ordered bindings with an exact-match index on the pattern.
#[derive(Debug, Default, Clone)]
pub struct BindingTable {
    bindings: Vec<Binding>,
    index: HashMap<EventName, Vec<usize>>,
}

impl BindingTable {
    fn push(&mut self, binding: Binding) {
        self.index
            .entry(binding.pattern.clone())
            .or_default()
            .push(self.bindings.len());
        self.bindings.push(binding);
    }

    /// Returns the bindings whose pattern equals `name`, in registration order.
    pub fn lookup<'a>(&'a self, name: &EventName) -> impl Iterator<Item = &'a Binding> + 'a {
        self.index
            .get(name)
            .map(|positions| positions.as_slice())
            .unwrap_or_default()
            .iter()
            .map(move |&i| &self.bindings[i])
    }

    /// All bindings in registration order.
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// A validated configuration: bindings plus the initial global state.
#[derive(Debug, Default, Clone)]
pub struct Configuration {
    pub bindings: BindingTable,
    pub global: GlobalState,
}

/// Validates a raw configuration tree.
///
/// # Errors
///
/// - [`ConfigError::Shape`] if the tree is not a table, lacks `global` or
///   `events`, `events` is not a list, or `global` is not a table of plain
///   values.
/// - [`ConfigError::Binding`] listing every malformed `events` entry.
pub fn validate(config: &ConfigNode) -> Result<Configuration, ConfigError> {
    validate_with(config, Vec::new())
}

/// Like [`validate`], merging `prior` issues found by a configuration source
/// (e.g. an unparseable action) into the binding report.
///
/// An entry that already has a prior issue is not reported again for its
/// missing handler.
pub(crate) fn validate_with(
    config: &ConfigNode,
    prior: Vec<BindingIssue>,
) -> Result<Configuration, ConfigError> {
    let ConfigNode::Map(fields) = config else {
        return Err(ConfigError::Shape(format!(
            "configuration must be a table, got {}",
            config.kind()
        )));
    };
    let global_node = fields
        .get("global")
        .ok_or_else(|| ConfigError::Shape("missing field \"global\"".to_string()))?;
    let events_node = fields
        .get("events")
        .ok_or_else(|| ConfigError::Shape("missing field \"events\"".to_string()))?;
    let ConfigNode::List(entries) = events_node else {
        return Err(ConfigError::Shape(format!(
            "field \"events\" must be a list, got {}",
            events_node.kind()
        )));
    };
    let global = validate_global(global_node)?;

    let mut issues = prior;
    let mut bindings = BindingTable::default();
    for (index, entry) in entries.iter().enumerate() {
        let skip_handler = issues.iter().any(|issue| issue.index == index);
        match validate_entry(index, entry, skip_handler) {
            Ok(binding) => bindings.push(binding),
            Err(mut found) => issues.append(&mut found),
        }
    }

    if issues.is_empty() {
        Ok(Configuration { bindings, global })
    } else {
        issues.sort_by_key(|issue| issue.index);
        Err(ConfigError::Binding(issues))
    }
}

fn validate_global(node: &ConfigNode) -> Result<GlobalState, ConfigError> {
    match node {
        ConfigNode::Scalar(Value::Null) => Ok(GlobalState::new()),
        ConfigNode::Map(_) | ConfigNode::Scalar(Value::Object(_)) => match node.to_json() {
            Some(Value::Object(map)) => Ok(GlobalState::from(map)),
            _ => Err(ConfigError::Shape(
                "field \"global\" must only hold plain values, not handlers".to_string(),
            )),
        },
        other => Err(ConfigError::Shape(format!(
            "field \"global\" must be a table, got {}",
            other.kind()
        ))),
    }
}

fn validate_entry(
    index: usize,
    entry: &ConfigNode,
    skip_handler: bool,
) -> Result<Binding, Vec<BindingIssue>> {
    let ConfigNode::Map(fields) = entry else {
        return Err(vec![BindingIssue::new(
            index,
            "*",
            format!("entry must be a table, got {}", entry.kind()),
        )]);
    };
    let mut issues = Vec::new();

    let pattern = match fields.get("event") {
        Some(ConfigNode::Scalar(Value::String(text))) => match text.parse::<EventName>() {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                issues.push(BindingIssue::new(index, "event", e.to_string()));
                None
            }
        },
        Some(other) => {
            issues.push(BindingIssue::new(
                index,
                "event",
                format!("must be a string, got {}", other.kind()),
            ));
            None
        }
        None => {
            issues.push(BindingIssue::new(index, "event", "missing event name"));
            None
        }
    };

    let handler = match fields.get("handler") {
        Some(ConfigNode::Handler(handler)) => Some(Arc::clone(handler)),
        _ if skip_handler => None,
        Some(other) => {
            issues.push(BindingIssue::new(
                index,
                "handler",
                format!("must be a handler, got {}", other.kind()),
            ));
            None
        }
        None => {
            issues.push(BindingIssue::new(index, "handler", "missing handler"));
            None
        }
    };

    let description = match fields.get("description") {
        None | Some(ConfigNode::Scalar(Value::Null)) => DEFAULT_DESCRIPTION.to_string(),
        Some(ConfigNode::Scalar(Value::String(text))) => text.clone(),
        Some(other) => {
            issues.push(BindingIssue::new(
                index,
                "description",
                format!("must be a string, got {}", other.kind()),
            ));
            String::new()
        }
    };

    match (pattern, handler) {
        (Some(pattern), Some(handler)) if issues.is_empty() => Ok(Binding {
            pattern,
            handler,
            description,
        }),
        _ => Err(issues),
    }
}

// ── Builder ───────────────────────────────────────────────────────────────────

/// Assembles a configuration in code, one binding at a time.
///
/// # Examples
///
/// ```rust
/// use pendant_keyboard::application::bindings::BindingTableBuilder;
/// use serde_json::json;
///
/// let config = BindingTableBuilder::new()
///     .global(json!({ "step": 1 }))
///     .register("KEY_ESC:keydown", |ctx| Ok(ctx.emit("command", vec![json!("reset")])?), "Reset")
///     .build()
///     .unwrap();
/// assert_eq!(config.bindings.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct BindingTableBuilder {
    global: ConfigNode,
    events: Vec<ConfigNode>,
}

impl Default for BindingTableBuilder {
    fn default() -> Self {
        Self {
            global: ConfigNode::Map(BTreeMap::new()),
            events: Vec::new(),
        }
    }
}

impl BindingTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the initial global state.
    pub fn global(mut self, global: Value) -> Self {
        self.global = ConfigNode::from(global);
        self
    }

    /// Appends a binding.
    pub fn register<F>(self, pattern: &str, handler: F, description: &str) -> Self
    where
        F: Fn(&mut HandlerContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register_handler(pattern, Arc::new(handler), Some(description))
    }

    /// Appends a binding with the default description.
    pub fn on<F>(self, pattern: &str, handler: F) -> Self
    where
        F: Fn(&mut HandlerContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register_handler(pattern, Arc::new(handler), None)
    }

    /// Appends a binding with an already shared handler.
    pub fn register_handler(
        mut self,
        pattern: &str,
        handler: Arc<dyn Handler>,
        description: Option<&str>,
    ) -> Self {
        let mut entry = BTreeMap::new();
        entry.insert("event".to_string(), ConfigNode::Scalar(Value::from(pattern)));
        entry.insert("handler".to_string(), ConfigNode::Handler(handler));
        if let Some(description) = description {
            entry.insert(
                "description".to_string(),
                ConfigNode::Scalar(Value::from(description)),
            );
        }
        self.events.push(ConfigNode::Map(entry));
        self
    }

    /// Returns the raw tree without validating it.
    pub fn into_config(self) -> ConfigNode {
        ConfigNode::map([
            ("global", self.global),
            ("events", ConfigNode::List(self.events)),
        ])
    }

    /// Validates the assembled configuration.
    pub fn build(self) -> Result<Configuration, ConfigError> {
        validate(&self.into_config())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
