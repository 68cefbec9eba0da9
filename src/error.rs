//! Error types for Rulehub.
//!
//! All errors in Rulehub are represented by the `RuleHubError` enum,
//! which provides specific variants for different error categories.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all Rulehub operations.
///
/// Validation errors (`CyclicReference`, `MalformedConfig`, `Lookup`) are raised
/// before any state is mutated, so a caller can fix the definition and resubmit.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum RuleHubError {
    /// The chain reaches itself through nested flow references.
    #[error("cyclic reference in rule chain {chain_id}: {}", path.join(" -> "))]
    CyclicReference {
        chain_id: String,
        path: Vec<String>,
    },

    /// A node configuration is missing a required field or is otherwise invalid.
    #[error("malformed configuration: {0}")]
    MalformedConfig(String),

    /// A chain referenced by a flow node does not exist in the store.
    #[error("lookup error: {0}")]
    Lookup(String),

    /// The chain under operation does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The rule engine rejected a definition.
    #[error("instance error: {0}")]
    Instance(String),

    /// The live instance was removed but the persisted definition could not be deleted.
    #[error("partial delete: {0}")]
    PartialDelete(String),

    /// Storage operation errors.
    #[error("{0}")]
    Store(String),

    /// Data conversion errors.
    #[error("{0}")]
    Convert(String),

    /// Configuration parsing or validation errors.
    #[error("{0}")]
    Config(String),

    /// Hub-level errors (runtime startup, tenant initialisation).
    #[error("{0}")]
    Engine(String),

    /// Message queue errors.
    #[error("{0}")]
    Queue(String),

    /// I/O operation errors.
    #[error("{0}")]
    IoError(String),
}

impl From<RuleHubError> for String {
    fn from(val: RuleHubError) -> Self {
        val.to_string()
    }
}

impl From<std::io::Error> for RuleHubError {
    fn from(error: std::io::Error) -> Self {
        RuleHubError::IoError(error.to_string())
    }
}

impl From<serde_json::Error> for RuleHubError {
    fn from(error: serde_json::Error) -> Self {
        RuleHubError::Convert(error.to_string())
    }
}

impl From<toml::de::Error> for RuleHubError {
    fn from(error: toml::de::Error) -> Self {
        RuleHubError::Config(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cyclic_reference_message_lists_path() {
        let err = RuleHubError::CyclicReference {
            chain_id: "a".to_string(),
            path: vec!["a".to_string(), "a->n1".to_string(), "a".to_string()],
        };
        assert_eq!(err.to_string(), "cyclic reference in rule chain a: a -> a->n1 -> a");
    }

    #[test]
    fn test_json_error_converts() {
        let err: RuleHubError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, RuleHubError::Convert(_)));
    }

    #[test]
    fn test_io_error_converts() {
        let err: RuleHubError = std::io::Error::new(std::io::ErrorKind::NotFound, "rulehub.toml").into();
        assert_eq!(err, RuleHubError::IoError("rulehub.toml".to_string()));
    }
}
