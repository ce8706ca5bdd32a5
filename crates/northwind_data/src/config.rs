//! Named connection configuration.
//!
//! # Responsibility
//! - Resolve a connection name (e.g. `NorthwindDb`) to a concrete SQLite target.
//! - Load named connections from JSON documents or environment variables.
//!
//! # Invariants
//! - Explicit and JSON entries win over the environment fallback.
//! - Connection strings are validated when read, not when first opened.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Default connection name used by the Northwind context.
pub const NORTHWIND_CONNECTION: &str = "NorthwindDb";

/// Environment variable prefix for named connections.
///
/// `NorthwindDb` is read from `NORTHWIND_CONNECTION_NORTHWINDDB`.
pub const CONNECTION_ENV_PREFIX: &str = "NORTHWIND_CONNECTION_";

const MEMORY_SCHEME: &str = "memory:";
const FILE_SCHEME: &str = "file:";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug)]
pub enum ConfigError {
    UnknownConnection(String),
    InvalidConnectionString { name: String, value: String },
    Parse(serde_json::Error),
    Io { path: PathBuf, source: std::io::Error },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownConnection(name) => write!(f, "no connection named `{name}`"),
            Self::InvalidConnectionString { name, value } => {
                write!(f, "invalid connection string `{value}` for `{name}`")
            }
            Self::Parse(err) => write!(f, "invalid connection config: {err}"),
            Self::Io { path, source } => {
                write!(f, "failed to read `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::UnknownConnection(_) | Self::InvalidConnectionString { .. } => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Concrete store a named connection points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "location", rename_all = "snake_case")]
pub enum ConnectionTarget {
    /// SQLite database file.
    File(PathBuf),
    /// Named in-memory database shared by every session of one context.
    SharedMemory(String),
}

impl ConnectionTarget {
    /// Parses `memory:<name>`, `file:<path>` or a bare file path.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if let Some(name) = trimmed.strip_prefix(MEMORY_SCHEME) {
            let valid = !name.is_empty()
                && name
                    .chars()
                    .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
            return valid.then(|| Self::SharedMemory(name.to_string()));
        }

        let path = trimmed.strip_prefix(FILE_SCHEME).unwrap_or(trimmed);
        if path.is_empty() {
            return None;
        }
        Some(Self::File(PathBuf::from(path)))
    }

    /// Short mode label used in log events.
    pub fn mode(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::SharedMemory(_) => "memory",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConnectionsDocument {
    connections: BTreeMap<String, String>,
}

/// Name-to-target lookup for store connections.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    entries: HashMap<String, ConnectionTarget>,
    env_fallback: bool,
}

impl ConnectionRegistry {
    /// Empty registry without environment fallback.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty registry that falls back to `NORTHWIND_CONNECTION_<NAME>`.
    pub fn from_env() -> Self {
        Self {
            entries: HashMap::new(),
            env_fallback: true,
        }
    }

    /// Parses `{"connections": {"<name>": "<connection string>"}}`.
    ///
    /// # Errors
    /// - `Parse` for malformed JSON or unknown top-level keys.
    /// - `InvalidConnectionString` for any unparsable entry.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let document: ConnectionsDocument = serde_json::from_str(json)?;
        let mut registry = Self::new();
        for (name, value) in document.connections {
            let target = ConnectionTarget::parse(&value).ok_or_else(|| {
                ConfigError::InvalidConnectionString {
                    name: name.clone(),
                    value: value.clone(),
                }
            })?;
            registry.entries.insert(name, target);
        }
        Ok(registry)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn with_env_fallback(mut self, enabled: bool) -> Self {
        self.env_fallback = enabled;
        self
    }

    /// Registers or replaces one named connection.
    pub fn insert(&mut self, name: impl Into<String>, target: ConnectionTarget) {
        self.entries.insert(name.into(), target);
    }

    pub fn with_connection(mut self, name: impl Into<String>, target: ConnectionTarget) -> Self {
        self.insert(name, target);
        self
    }

    /// Resolves `name` to its target.
    ///
    /// # Errors
    /// - `UnknownConnection` when neither the registry nor the environment
    ///   defines `name`.
    /// - `InvalidConnectionString` when the environment value is unparsable.
    pub fn resolve(&self, name: &str) -> ConfigResult<ConnectionTarget> {
        if let Some(target) = self.entries.get(name) {
            return Ok(target.clone());
        }

        if self.env_fallback {
            if let Ok(value) = std::env::var(env_var_name(name)) {
                return ConnectionTarget::parse(&value).ok_or_else(|| {
                    ConfigError::InvalidConnectionString {
                        name: name.to_string(),
                        value,
                    }
                });
            }
        }

        Err(ConfigError::UnknownConnection(name.to_string()))
    }
}

/// Environment variable consulted for connection `name`.
pub fn env_var_name(name: &str) -> String {
    let suffix: String = name
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() {
                ch.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{CONNECTION_ENV_PREFIX}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::{env_var_name, ConfigError, ConnectionRegistry, ConnectionTarget};
    use std::path::PathBuf;

    #[test]
    fn parse_accepts_memory_file_and_bare_paths() {
        assert_eq!(
            ConnectionTarget::parse("memory:northwind"),
            Some(ConnectionTarget::SharedMemory("northwind".to_string()))
        );
        assert_eq!(
            ConnectionTarget::parse(" file:/tmp/northwind.db "),
            Some(ConnectionTarget::File(PathBuf::from("/tmp/northwind.db")))
        );
        assert_eq!(
            ConnectionTarget::parse("data/northwind.db"),
            Some(ConnectionTarget::File(PathBuf::from("data/northwind.db")))
        );
    }

    #[test]
    fn parse_rejects_empty_and_malformed_values() {
        assert_eq!(ConnectionTarget::parse(""), None);
        assert_eq!(ConnectionTarget::parse("file:"), None);
        assert_eq!(ConnectionTarget::parse("memory:"), None);
        assert_eq!(ConnectionTarget::parse("memory:has space"), None);
    }

    #[test]
    fn env_var_name_uppercases_and_replaces_separators() {
        assert_eq!(env_var_name("NorthwindDb"), "NORTHWIND_CONNECTION_NORTHWINDDB");
        assert_eq!(env_var_name("reports.ro"), "NORTHWIND_CONNECTION_REPORTS_RO");
    }

    #[test]
    fn json_document_registers_connections() {
        let registry = ConnectionRegistry::from_json_str(
            r#"{"connections": {"NorthwindDb": "memory:nw", "Archive": "/var/lib/archive.db"}}"#,
        )
        .expect("valid document should parse");

        assert_eq!(
            registry.resolve("NorthwindDb").expect("NorthwindDb is registered"),
            ConnectionTarget::SharedMemory("nw".to_string())
        );
        assert_eq!(
            registry.resolve("Archive").expect("Archive is registered"),
            ConnectionTarget::File(PathBuf::from("/var/lib/archive.db"))
        );
    }

    #[test]
    fn json_document_rejects_invalid_entries() {
        let err = ConnectionRegistry::from_json_str(r#"{"connections": {"Broken": "memory:"}}"#)
            .expect_err("empty memory name must be rejected");
        assert!(matches!(err, ConfigError::InvalidConnectionString { name, .. } if name == "Broken"));

        let err = ConnectionRegistry::from_json_str(r#"{"databases": {}}"#)
            .expect_err("unknown keys must be rejected");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn explicit_entries_win_over_environment() {
        let name = "ExplicitWinsDb";
        std::env::set_var(env_var_name(name), "memory:from_env");

        let registry = ConnectionRegistry::from_env()
            .with_connection(name, ConnectionTarget::SharedMemory("explicit".to_string()));
        assert_eq!(
            registry.resolve(name).expect("explicit entry resolves"),
            ConnectionTarget::SharedMemory("explicit".to_string())
        );

        std::env::remove_var(env_var_name(name));
    }

    #[test]
    fn environment_fallback_is_opt_in() {
        let name = "EnvFallbackDb";
        std::env::set_var(env_var_name(name), "memory:env_only");

        let err = ConnectionRegistry::new()
            .resolve(name)
            .expect_err("fallback is disabled by default");
        assert!(matches!(err, ConfigError::UnknownConnection(_)));

        let resolved = ConnectionRegistry::from_env()
            .resolve(name)
            .expect("fallback reads the environment");
        assert_eq!(
            resolved,
            ConnectionTarget::SharedMemory("env_only".to_string())
        );

        std::env::remove_var(env_var_name(name));
    }
}
