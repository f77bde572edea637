//! Errors surfaced by the binary and their exit statuses.

use std::path::PathBuf;

use snafu::Snafu;
use user_migration_engine::MigrationError;
use user_migration_sdk::SdkError;

/// Exit status for failures before or outside a migration run.
pub const EXIT_FAILURE: u8 = 1;

/// Exit status when a run was refused or finished with failures.
pub const EXIT_INCOMPLETE: u8 = 2;

/// Top-level error type for the binary.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CliError {
    /// The saved session has no access token.
    #[snafu(display("You are not logged in. Please log in with 'cf login' and try again"))]
    NotLoggedIn,

    /// The session file could not be read.
    #[snafu(display("Reading session from {}: {source}", path.display()))]
    ReadSession {
        /// Session file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The session file is not valid JSON.
    #[snafu(display("Parsing session from {}: {source}", path.display()))]
    ParseSession {
        /// Session file.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// No home directory to look for the session in.
    #[snafu(display("Cannot locate the session: set CF_HOME or HOME"))]
    NoHome,

    /// Settings could not be loaded.
    #[snafu(display("Loading settings failed: {source}"))]
    Settings {
        /// The underlying configuration error.
        source: config::ConfigError,
    },

    /// A required setting is missing.
    #[snafu(display("Missing required setting {name}"))]
    MissingSetting {
        /// Environment variable naming the setting.
        name: &'static str,
    },

    /// A client could not be built or connected.
    #[snafu(display("{source}"))]
    Client {
        /// The underlying client error.
        source: SdkError,
    },

    /// The migration run failed as a whole.
    #[snafu(display("{source}"))]
    Migration {
        /// The underlying migration error.
        source: MigrationError,
    },

    /// The import finished but some records or roles failed.
    #[snafu(display("Import incomplete: {failed} of {total} records had failures"))]
    ImportIncomplete {
        /// Records with a failed creation or role.
        failed: usize,
        /// Records in the snapshot.
        total: usize,
    },
}

impl CliError {
    /// Process exit status for this error.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Migration { source: MigrationError::Guard { .. } }
            | Self::ImportIncomplete { .. } => EXIT_INCOMPLETE,
            _ => EXIT_FAILURE,
        }
    }
}
