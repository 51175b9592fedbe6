//! Configuration sources: where binding tables come from.
//!
//! A configuration is either supplied directly as a raw tree or looked up
//! by name.  A name resolves, in order, to:
//!
//! 1. the file itself, if the name is a path ending in `.toml`,
//! 2. a built-in configuration compiled into the binary (`default`),
//! 3. `<dir>/<name>.toml` in each bindings directory.
//!
//! Whatever the source, the result passes through the same validation.

pub mod declarative;
pub mod default;

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::bindings::{validate, validate_with, ConfigError, ConfigNode, Configuration};

/// Names of the configurations compiled into the binary.
pub const BUILTIN_NAMES: &[&str] = &["default"];

/// Where a configuration comes from.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// A logical name or a path to a `.toml` binding file.
    Named(String),
    /// A raw tree supplied by the caller.
    Table(ConfigNode),
}

/// Resolves and validates configurations.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    search_dirs: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Creates a loader that searches `search_dirs` for `<name>.toml`.
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        Self { search_dirs }
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    /// Loads and validates a configuration.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::NotFound`] if a name resolves to nothing.
    /// - [`ConfigError::Io`] / [`ConfigError::Parse`] if a binding file cannot
    ///   be read or is not valid TOML.
    /// - [`ConfigError::Shape`] / [`ConfigError::Binding`] from validation.
    pub fn load(&self, source: ConfigSource) -> Result<Configuration, ConfigError> {
        match source {
            ConfigSource::Table(node) => validate(&node),
            ConfigSource::Named(name) => self.load_named(&name),
        }
    }

    fn load_named(&self, name: &str) -> Result<Configuration, ConfigError> {
        let mut searched = Vec::new();

        if name.ends_with(".toml") {
            let path = PathBuf::from(name);
            if path.is_file() {
                return load_file(&path);
            }
            searched.push(path.display().to_string());
        } else {
            if let Some(node) = builtin(name) {
                info!(name, "using built-in configuration");
                return validate(&node);
            }
            searched.push(format!("built-in ({})", BUILTIN_NAMES.join(", ")));

            for dir in &self.search_dirs {
                let path = dir.join(format!("{name}.toml"));
                debug!(path = %path.display(), "looking for binding file");
                if path.is_file() {
                    return load_file(&path);
                }
                searched.push(path.display().to_string());
            }
        }

        Err(ConfigError::NotFound {
            name: name.to_string(),
            searched,
        })
    }
}

/// Returns the raw tree of a built-in configuration.
pub fn builtin(name: &str) -> Option<ConfigNode> {
    match name {
        "default" => Some(default::config()),
        _ => None,
    }
}

fn load_file(path: &Path) -> Result<Configuration, ConfigError> {
    info!(path = %path.display(), "loading binding file");
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let (node, issues) = declarative::parse(&text, path)?;
    validate_with(&node, issues)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
