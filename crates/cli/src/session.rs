//! The operator's saved control-plane login.
//!
//! The control-plane CLI keeps its session in `$CF_HOME/.cf/config.json`.
//! Only the fields needed to reach the target deployment are read; the
//! rest of the file is ignored.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use snafu::ResultExt;

use crate::error::{CliError, ParseSessionSnafu, ReadSessionSnafu};

/// Saved login of the control-plane CLI.
#[derive(Clone, Default, Deserialize)]
pub struct Session {
    /// API URL of the targeted deployment.
    #[serde(rename = "Target", default)]
    pub target: String,
    /// Bearer token, with its `bearer ` prefix.
    #[serde(rename = "AccessToken", default)]
    pub access_token: String,
    /// TLS verification disabled at login.
    #[serde(rename = "SSLDisabled", default)]
    pub ssl_disabled: bool,
    /// Identity-directory URL advertised by the deployment.
    #[serde(rename = "UaaEndpoint", default)]
    pub uaa_endpoint: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("target", &self.target)
            .field("access_token", &"<redacted>")
            .field("ssl_disabled", &self.ssl_disabled)
            .field("uaa_endpoint", &self.uaa_endpoint)
            .finish()
    }
}

impl Session {
    /// Location of the session file under `cf_home`.
    #[must_use]
    pub fn path(cf_home: &Path) -> PathBuf {
        cf_home.join(".cf").join("config.json")
    }

    /// Reads the session saved under `cf_home`.
    ///
    /// A missing session file reads as an empty, logged-out session.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::ReadSession`] or [`CliError::ParseSession`] if the
    /// file exists but cannot be read or parsed.
    pub fn load(cf_home: &Path) -> Result<Self, CliError> {
        let path = Self::path(cf_home);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no saved session");
                return Ok(Self::default());
            },
            Err(e) => return Err(e).context(ReadSessionSnafu { path }),
        };
        serde_json::from_slice(&bytes).context(ParseSessionSnafu { path })
    }

    /// Returns true if the session holds a target and an access token.
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        !self.target.trim().is_empty() && !self.access_token.trim().is_empty()
    }

    /// Identity-directory URL: the advertised one, else derived from the target.
    #[must_use]
    pub fn uaa_url(&self) -> String {
        if self.uaa_endpoint.is_empty() {
            derive_uaa_url(&self.target)
        } else {
            self.uaa_endpoint.clone()
        }
    }
}

/// Replaces the first `api` in an API URL with `uaa`.
///
/// `https://api.sys.example.com` becomes `https://uaa.sys.example.com`.
#[must_use]
pub fn derive_uaa_url(api_url: &str) -> String {
    api_url.replacen("api", "uaa", 1)
}
