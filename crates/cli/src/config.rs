//! Command-line arguments and layered settings.
//!
//! Flags come from `clap`. Client settings are layered with the `config`
//! crate: an optional `user-migration.toml`, then `UAA_`-prefixed
//! environment variables. Both the underscored and the run-together
//! spelling of each variable are accepted (`UAA_CLIENT_ID`, `UAA_CLIENTID`).

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use clap::{Parser, Subcommand, ValueEnum};
use config::{Environment, File};
use serde::Deserialize;
use snafu::{OptionExt, ResultExt};
use user_migration_sdk::{ClientConfig, RetryPolicy, UaaConfig};

use crate::{
    error::{ClientSnafu, CliError, MissingSettingSnafu},
    session::Session,
};

/// Settings file looked up in the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = "user-migration.toml";

/// Environment variable prefix for settings.
pub const ENV_PREFIX: &str = "UAA";

/// Moves users and their organization and space roles between deployments.
#[derive(Debug, Parser)]
#[command(name = "user-migration", version, about)]
pub struct Cli {
    /// Command to run.
    #[command(subcommand)]
    pub command: Command,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Auto, global = true)]
    pub log_format: LogFormat,

    /// Directory containing the control-plane CLI's `.cf` folder.
    #[arg(long, env = "CF_HOME", global = true)]
    pub cf_home: Option<PathBuf>,

    /// Settings file (default: `user-migration.toml` if present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Export users and roles of the logged-in deployment to a snapshot.
    Export {
        /// Snapshot file to write, or `-` for stdout.
        file: PathBuf,
    },
    /// Re-create users and roles from a snapshot in the logged-in deployment.
    Import {
        /// Snapshot file to read.
        file: PathBuf,
    },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// JSON when stderr is not a terminal, text otherwise.
    Auto,
    /// Human-readable text.
    Text,
    /// One JSON object per event.
    Json,
}

/// Client settings loaded from file and environment.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Identity-directory OAuth client id.
    #[serde(default, alias = "clientid")]
    pub client_id: Option<String>,
    /// Identity-directory OAuth client secret.
    #[serde(default, alias = "clientsecret")]
    pub client_secret: Option<String>,
    /// Identity-directory URL; derived from the session when unset.
    #[serde(default, alias = "serverurl")]
    pub server_url: Option<String>,
    /// Identity origin for re-created users.
    #[serde(default)]
    pub origin: Option<String>,
    /// Request timeout.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    /// Connection timeout.
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Retry of idempotent requests.
    #[serde(default)]
    pub retry: RetrySettings,
}

/// Retry settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    /// Attempts per request, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff before the first retry.
    #[serde(default = "default_initial_backoff", with = "humantime_serde")]
    pub initial_backoff: Duration,
    /// Upper bound for any single backoff.
    #[serde(default = "default_max_backoff", with = "humantime_serde")]
    pub max_backoff: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff: default_initial_backoff(),
            max_backoff: default_max_backoff(),
        }
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> Duration {
    Duration::from_millis(200)
}

fn default_max_backoff() -> Duration {
    Duration::from_secs(5)
}

impl Settings {
    /// Loads settings from `path` (or the default file, if present) and the
    /// process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is malformed, or a value has
    /// the wrong type.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        Self::from_sources(path, Environment::with_prefix(ENV_PREFIX))
    }

    fn from_sources(
        path: Option<&Path>,
        environment: Environment,
    ) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder();
        let builder = match path {
            Some(path) => builder.add_source(File::from(path)),
            None => builder.add_source(File::with_name(DEFAULT_SETTINGS_FILE).required(false)),
        };

        // UAA_RETRY__MAX_ATTEMPTS sets retry.max_attempts.
        builder
            .add_source(environment.prefix_separator("_").separator("__"))
            .build()?
            .try_deserialize()
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .with_max_attempts(self.retry.max_attempts)
            .with_initial_backoff(self.retry.initial_backoff)
            .with_max_backoff(self.retry.max_backoff)
            .build()
    }

    /// Control-plane client configuration for the session's target.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Client`] if the target URL or a timeout is invalid.
    pub fn client_config(&self, session: &Session) -> Result<ClientConfig, CliError> {
        ClientConfig::builder()
            .with_api_endpoint(&session.target)
            .with_access_token(&session.access_token)
            .with_timeout(self.timeout)
            .with_connect_timeout(self.connect_timeout)
            .with_retry_policy(self.retry_policy())
            .with_skip_tls_verification(session.ssl_disabled)
            .build()
            .context(ClientSnafu)
    }

    /// Identity-directory configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::MissingSetting`] if the client id or secret is
    /// unset, or [`CliError::Client`] if a value is invalid.
    pub fn uaa_config(&self, session: &Session) -> Result<UaaConfig, CliError> {
        let client_id =
            self.client_id.as_deref().context(MissingSettingSnafu { name: "UAA_CLIENT_ID" })?;
        let client_secret = self
            .client_secret
            .as_deref()
            .context(MissingSettingSnafu { name: "UAA_CLIENT_SECRET" })?;
        let server_url = self.server_url.clone().unwrap_or_else(|| session.uaa_url());
        tracing::debug!(server_url = %server_url, "identity directory");

        UaaConfig::builder()
            .server_url(server_url)
            .client_id(client_id)
            .client_secret(client_secret)
            .maybe_origin(self.origin.clone())
            .timeout(self.timeout)
            .retry_policy(self.retry_policy())
            .skip_tls_verification(session.ssl_disabled)
            .build()
            .context(ClientSnafu)
    }
}

/// Duration deserialization using humantime format (`"30s"`, `"1m 30s"`).
mod humantime_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
