//! User migration binary.
//!
//! Exports the users of the logged-in deployment, with their organization
//! and space roles and identity-directory records, to a JSON snapshot, and
//! replays such a snapshot into another deployment.
//!
//! # Usage
//!
//! ```bash
//! # Log in to the source deployment, then export
//! cf login -a https://api.sys.source.example.com
//! UAA_CLIENT_ID=migrator UAA_CLIENT_SECRET=... user-migration export users.json
//!
//! # Log in to the target deployment, then import
//! cf login -a https://api.sys.target.example.com
//! UAA_CLIENT_ID=migrator UAA_CLIENT_SECRET=... user-migration import users.json
//! ```
//!
//! Exit status is 1 when not logged in or a client cannot be set up, and 2
//! when an import is refused or finishes with failures.

mod config;
mod error;
mod session;

use std::{
    io::IsTerminal,
    path::{Path, PathBuf},
    process::ExitCode,
    time::Instant,
};

use clap::Parser;
use snafu::{OptionExt, ResultExt, ensure};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use user_migration_engine::{Exporter, Importer, MigrationError};
use user_migration_sdk::{CloudControllerClient, UaaClient};
use user_migration_types::{read_snapshot, write_snapshot, write_snapshot_to};

use crate::{
    config::{Cli, Command, LogFormat, Settings},
    error::{
        CliError, ClientSnafu, ImportIncompleteSnafu, MigrationSnafu, NoHomeSnafu,
        NotLoggedInSnafu, SettingsSnafu,
    },
    session::Session,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    ExitCode::from(exit_status(&run(cli).await))
}

/// Logs a failed run once and returns its process exit status.
fn exit_status(result: &Result<(), CliError>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "user migration failed");
            e.exit_code()
        },
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let cf_home = cli.cf_home.or_else(home_dir).context(NoHomeSnafu)?;
    let session = Session::load(&cf_home)?;
    ensure!(session.is_logged_in(), NotLoggedInSnafu);

    let settings = Settings::load(cli.config.as_deref()).context(SettingsSnafu)?;
    let control_plane =
        CloudControllerClient::new(settings.client_config(&session)?).context(ClientSnafu)?;
    let directory =
        UaaClient::connect(settings.uaa_config(&session)?).await.context(ClientSnafu)?;

    let started = Instant::now();
    let result = match cli.command {
        Command::Export { file } => export(&control_plane, &directory, &file).await,
        Command::Import { file } => import(&control_plane, &directory, &file).await,
    };
    tracing::info!(
        elapsed = %humantime::format_duration(started.elapsed()),
        ok = result.is_ok(),
        "done"
    );
    result
}

async fn export(
    control_plane: &CloudControllerClient,
    directory: &UaaClient,
    file: &Path,
) -> Result<(), CliError> {
    let (snapshot, report) =
        Exporter::new(control_plane, directory).run().await.context(MigrationSnafu)?;

    let written = if file.as_os_str() == "-" {
        write_snapshot_to(std::io::stdout().lock(), &snapshot)
    } else {
        write_snapshot(file, &snapshot)
    };
    written.map_err(MigrationError::from).context(MigrationSnafu)?;

    eprint!("{report}");
    Ok(())
}

async fn import(
    control_plane: &CloudControllerClient,
    directory: &UaaClient,
    file: &Path,
) -> Result<(), CliError> {
    let snapshot = read_snapshot(file).map_err(MigrationError::from).context(MigrationSnafu)?;
    let report =
        Importer::new(control_plane, directory).run(&snapshot).await.context(MigrationSnafu)?;

    eprint!("{report}");
    let total = report.records.len();
    ensure!(
        !report.has_failures(),
        ImportIncompleteSnafu { failed: total - report.succeeded(), total }
    );
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").filter(|home| !home.is_empty()).map(PathBuf::from)
}

/// Initializes logging on stderr; stdout may carry the snapshot.
///
/// Supports three formats:
/// - `Text`: human-readable
/// - `Json`: one JSON object per event
/// - `Auto`: JSON when stderr is not a terminal, text otherwise
fn init_logging(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = match format {
        LogFormat::Json => true,
        LogFormat::Text => false,
        LogFormat::Auto => !std::io::stderr().is_terminal(),
    };

    if use_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
