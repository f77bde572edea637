//! Migration error taxonomy.
//!
//! Errors are caught at the smallest independent unit (one role, then one
//! record). Only [`MigrationError::Guard`], snapshot I/O and the initial
//! listings abort a whole run; see [`MigrationError::is_fatal`].

use snafu::Snafu;

use user_migration_sdk::SdkError;
use user_migration_types::SnapshotError;

/// Result type alias for engine operations.
pub type Result<T, E = MigrationError> = std::result::Result<T, E>;

/// Kind of named resource being resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// An organization.
    Organization,
    /// A space within an organization.
    Space,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Organization => f.write_str("organization"),
            Self::Space => f.write_str("space"),
        }
    }
}

/// Errors raised while exporting or importing users.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MigrationError {
    /// No resource with the given name exists.
    #[snafu(display("{kind} '{name}' not found"))]
    NotFound {
        /// Kind of resource.
        kind: ResourceKind,
        /// Name that was looked up.
        name: String,
    },

    /// More than one resource carries the given name.
    #[snafu(display("{kind} name '{name}' is ambiguous ({matches} matches)"))]
    Ambiguous {
        /// Kind of resource.
        kind: ResourceKind,
        /// Name that was looked up.
        name: String,
        /// Number of matching resources.
        matches: usize,
    },

    /// A collaborator call failed.
    #[snafu(display("Transport error: {source}"))]
    Transport {
        /// Underlying client error.
        source: SdkError,
    },

    /// A snapshot record or role lacks a required field.
    #[snafu(display("Invalid record: {reason}"))]
    Invalid {
        /// Which field is missing.
        reason: String,
    },

    /// A collaborator answered with an unexpected shape.
    #[snafu(display("Unexpected response: {message}"))]
    Parse {
        /// Description of the mismatch.
        message: String,
    },

    /// The snapshot was exported from the deployment it is being imported into.
    #[snafu(display("Snapshot was exported from {url}; refusing to import into the same deployment"))]
    Guard {
        /// API URL shared by the snapshot and the target.
        url: String,
    },

    /// Reading, writing or decoding the snapshot failed.
    #[snafu(display("{source}"))]
    Snapshot {
        /// Underlying snapshot error.
        source: SnapshotError,
    },
}

impl MigrationError {
    /// Returns true if the error ends the whole run rather than one unit.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Guard { .. } | Self::Snapshot { .. })
    }
}

impl From<SdkError> for MigrationError {
    fn from(source: SdkError) -> Self {
        if source.is_decode() {
            Self::Parse { message: source.to_string() }
        } else {
            Self::Transport { source }
        }
    }
}

impl From<SnapshotError> for MigrationError {
    fn from(source: SnapshotError) -> Self {
        Self::Snapshot { source }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_failure_maps_to_parse() {
        let source = serde_json::from_str::<u32>("{}").unwrap_err();
        let err = MigrationError::from(SdkError::Decode { what: "user page".to_owned(), source });
        assert!(matches!(err, MigrationError::Parse { .. }));
    }

    #[test]
    fn test_api_failure_maps_to_transport() {
        let err = MigrationError::from(SdkError::api(404, Some("CF-UserNotFound"), "gone"));
        assert!(matches!(err, MigrationError::Transport { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_guard_is_fatal() {
        let err = MigrationError::Guard { url: "https://api.example.com".to_owned() };
        assert!(err.is_fatal());
        assert!(err.to_string().contains("https://api.example.com"));
    }

    #[test]
    fn test_ambiguous_display() {
        let err = MigrationError::Ambiguous {
            kind: ResourceKind::Organization,
            name: "acme".to_owned(),
            matches: 2,
        };
        assert_eq!(err.to_string(), "organization name 'acme' is ambiguous (2 matches)");
    }
}
