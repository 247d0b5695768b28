//! Core domain models for deployment artifact generation
//!
//! Architecture: Rich Domain Models - Value objects carry their own invariants
//! - A Domain can only be constructed through validation, so every holder has a valid hostname
//! - VariableMap owns the replace-or-append semantics shared by both generators
//! - The error taxonomy distinguishes operator mistakes from missing inputs

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default base hostname used when the operator opts out of choosing one
pub const DEFAULT_DOMAIN: &str = "queridodiario.local";

/// Hostname pattern: labels of alphanumerics/hyphens/dots ending in a >= 2 letter label
const DOMAIN_PATTERN: &str = r"^[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

/// A validated base hostname from which all derived service URLs are constructed
///
/// Immutable once accepted; the only way to obtain one is [`Domain::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Domain(String);

impl Domain {
    /// Validate a raw string into a `Domain`
    ///
    /// Accepts hostnames like `example.com` or `sub.example.org`; anything
    /// else is a [`ForgeError::Validation`] for the caller to surface or
    /// re-prompt on.
    pub fn parse(raw: &str) -> ForgeResult<Self> {
        let raw = raw.trim();
        let pattern = Regex::new(DOMAIN_PATTERN)
            .map_err(|e| ForgeError::pattern(format!("domain pattern failed to compile: {e}")))?;

        if pattern.is_match(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(ForgeError::validation(format!(
                "Invalid domain format '{raw}'. Use a hostname like example.com or sub.example.org"
            )))
        }
    }

    /// The default domain, known-valid by construction
    pub fn default_domain() -> Self {
        Self(DEFAULT_DOMAIN.to_string())
    }

    /// The raw hostname
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Domain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Deployment mode controlling protocol, port, and host derivation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentKind {
    /// Local development: HTTP, localhost ports, permissive origins
    Development,
    /// Production: HTTPS, domain-only hosts, no localhost
    Production,
}

impl EnvironmentKind {
    /// URL scheme for derived service URLs
    pub fn protocol(self) -> &'static str {
        match self {
            Self::Development => "http",
            Self::Production => "https",
        }
    }

    /// Fixed output filename for the generated env file
    pub fn env_file_name(self) -> &'static str {
        match self {
            Self::Development => ".env",
            Self::Production => ".env.production",
        }
    }

    /// Convert to string for display
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for EnvironmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered mapping of configuration keys to values
///
/// Iteration order is insertion order, which keeps generated output and
/// substitution traces deterministic across runs. `set` replaces an existing
/// key in place, mirroring the find-or-append contract of the substitution
/// engine itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableMap {
    entries: Vec<(String, String)>,
}

impl VariableMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a key, keeping the original position on replace
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Look up a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Whether the map contains a key
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merge another map into this one; keys from `other` win
    pub fn merge(&mut self, other: &VariableMap) {
        for (key, value) in other.iter() {
            self.set(key, value);
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VariableMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.set(k, v);
        }
        map
    }
}

/// Error types that can occur during generation
#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    /// Operator-supplied input failed validation (recoverable at the prompt boundary)
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// A required template or override file does not exist
    #[error("File not found: {path}")]
    NotFound { path: PathBuf },

    /// File could not be read or written
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Compose document or rules file is not structurally well-formed
    #[error("Manifest error: {message}")]
    Manifest { message: String },

    /// Internal pattern construction failed
    #[error("Pattern error: {message}")]
    Pattern { message: String },
}

impl ForgeError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    /// Create a not-found error
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create a manifest error
    pub fn manifest(message: impl Into<String>) -> Self {
        Self::Manifest { message: message.into() }
    }

    /// Create a pattern error
    pub fn pattern(message: impl Into<String>) -> Self {
        Self::Pattern { message: message.into() }
    }
}

/// Result type for generation operations
pub type ForgeResult<T> = Result<T, ForgeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("example.com")]
    #[case("sub.example.org")]
    #[case("queridodiario.local")]
    #[case("my-app.example.co")]
    fn test_domain_accepts_valid_hostnames(#[case] raw: &str) {
        let domain = Domain::parse(raw).unwrap();
        assert_eq!(domain.as_str(), raw);
    }

    #[rstest]
    #[case("")]
    #[case("localhost")]
    #[case("example")]
    #[case("example.c")]
    #[case("exa mple.com")]
    #[case("example.com/path")]
    fn test_domain_rejects_malformed_hostnames(#[case] raw: &str) {
        let err = Domain::parse(raw).unwrap_err();
        assert!(matches!(err, ForgeError::Validation { .. }));
    }

    #[test]
    fn test_domain_trims_surrounding_whitespace() {
        let domain = Domain::parse("  example.com  ").unwrap();
        assert_eq!(domain.as_str(), "example.com");
    }

    #[test]
    fn test_default_domain_is_valid() {
        assert!(Domain::parse(DEFAULT_DOMAIN).is_ok());
        assert_eq!(Domain::default_domain().as_str(), "queridodiario.local");
    }

    #[test]
    fn test_environment_kind_protocol_and_file_names() {
        assert_eq!(EnvironmentKind::Development.protocol(), "http");
        assert_eq!(EnvironmentKind::Production.protocol(), "https");
        assert_eq!(EnvironmentKind::Development.env_file_name(), ".env");
        assert_eq!(EnvironmentKind::Production.env_file_name(), ".env.production");
    }

    #[test]
    fn test_variable_map_set_replaces_in_place() {
        let mut map = VariableMap::new();
        map.set("A", "1");
        map.set("B", "2");
        map.set("A", "3");

        assert_eq!(map.len(), 2);
        assert_eq!(map.get("A"), Some("3"));

        // A keeps its original position
        let keys: Vec<&str> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["A", "B"]);
    }

    #[test]
    fn test_variable_map_merge_last_wins() {
        let mut base: VariableMap = [("A", "1"), ("B", "2")].into_iter().collect();
        let overrides: VariableMap = [("B", "20"), ("C", "30")].into_iter().collect();

        base.merge(&overrides);

        assert_eq!(base.get("A"), Some("1"));
        assert_eq!(base.get("B"), Some("20"));
        assert_eq!(base.get("C"), Some("30"));
        assert_eq!(base.len(), 3);
    }

    #[test]
    fn test_variable_map_iteration_is_insertion_ordered() {
        let map: VariableMap =
            [("DOMAIN", "x"), ("STATIC_URL", "y"), ("DEBUG", "z")].into_iter().collect();
        let keys: Vec<&str> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["DOMAIN", "STATIC_URL", "DEBUG"]);
    }
}
