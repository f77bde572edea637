//! Identity-directory (UAA) client.
//!
//! The directory is reached with OAuth client credentials. A token is
//! fetched once in [`UaaClient::connect`]; a migration run is expected to
//! finish well within its lifetime.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use user_migration_types::{EmailRecord, ExternalIdentity, NewIdentity, UserGuid};

use crate::{
    config::UaaConfig,
    error::{Result, SdkError},
    http::HttpTransport,
    retry::with_retry,
};

/// Number of identities requested per listing page.
const IDENTITIES_PER_PAGE: usize = 500;

/// Operations the migration needs from an identity directory.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Lists every identity in the directory.
    async fn list_identities(&self) -> Result<Vec<ExternalIdentity>>;

    /// Creates an identity and returns its directory-assigned id.
    async fn create_identity(&self, identity: &NewIdentity) -> Result<UserGuid>;
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScimEmail {
    value: String,
    #[serde(default)]
    primary: bool,
}

impl From<ScimEmail> for EmailRecord {
    fn from(email: ScimEmail) -> Self {
        EmailRecord::new(email.value, email.primary)
    }
}

impl From<&EmailRecord> for ScimEmail {
    fn from(email: &EmailRecord) -> Self {
        Self { value: email.value.clone(), primary: email.primary }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScimUser {
    id: String,
    user_name: String,
    #[serde(default)]
    external_id: Option<String>,
    #[serde(default)]
    emails: Vec<ScimEmail>,
}

impl From<ScimUser> for ExternalIdentity {
    fn from(user: ScimUser) -> Self {
        ExternalIdentity {
            id: UserGuid::new(user.id),
            username: user.user_name,
            external_id: user.external_id.unwrap_or_default(),
            emails: user.emails.into_iter().map(EmailRecord::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScimPage {
    #[serde(default)]
    resources: Vec<ScimUser>,
    #[serde(default)]
    total_results: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScimNewUser<'a> {
    user_name: &'a str,
    external_id: &'a str,
    emails: Vec<ScimEmail>,
    origin: &'a str,
}

// ============================================================================
// Client
// ============================================================================

/// Identity-directory client over the SCIM REST API.
#[derive(Debug, Clone)]
pub struct UaaClient {
    transport: HttpTransport,
    config: UaaConfig,
}

impl UaaClient {
    /// Connects to the directory and acquires a client-credentials token.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Token`] if the token request is rejected or its
    /// response cannot be read, or a transport error if the directory is
    /// unreachable.
    #[instrument(level = "debug", skip(config), fields(server = %config.server_url))]
    pub async fn connect(config: UaaConfig) -> Result<Self> {
        let mut transport = HttpTransport::new(
            &config.server_url,
            config.timeout,
            config.timeout,
            config.skip_tls_verification,
        )?;

        let url = transport.endpoint(&["oauth", "token"])?;
        let form = [
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("grant_type", "client_credentials"),
            ("response_type", "token"),
        ];

        let token: TokenResponse = with_retry(&config.retry_policy, "fetch_token", || {
            transport.post_form(url.clone(), &form, "token response")
        })
        .await
        .map_err(|e| match e {
            SdkError::Api { .. } | SdkError::Decode { .. } => {
                SdkError::Token { message: e.to_string() }
            },
            other => other,
        })?;

        if let Some(kind) = token.token_type.as_deref() {
            if !kind.eq_ignore_ascii_case("bearer") {
                return Err(SdkError::Token { message: format!("unsupported token type '{kind}'") });
            }
        }
        transport.set_bearer_token(&token.access_token)?;

        tracing::debug!(client_id = %config.client_id, "acquired identity-directory token");
        Ok(Self { transport, config })
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &UaaConfig {
        &self.config
    }

    async fn fetch_page(&self, start_index: usize) -> Result<ScimPage> {
        let start = start_index.to_string();
        let count = IDENTITIES_PER_PAGE.to_string();
        let query = [("startIndex", start.as_str()), ("count", count.as_str())];
        let url = self.transport.endpoint_with_query(&["Users"], &query)?;
        with_retry(&self.config.retry_policy, "list_identities", || {
            self.transport.get_json(url.clone(), "identity page")
        })
        .await
    }
}

#[async_trait]
impl IdentityDirectory for UaaClient {
    #[instrument(level = "debug", skip(self))]
    async fn list_identities(&self) -> Result<Vec<ExternalIdentity>> {
        let mut identities = Vec::new();
        // SCIM indices are 1-based.
        let mut start_index = 1;

        loop {
            let page = self.fetch_page(start_index).await?;
            let fetched = page.resources.len();
            identities.extend(page.resources.into_iter().map(ExternalIdentity::from));

            if fetched == 0 || identities.len() >= page.total_results {
                break;
            }
            start_index += fetched;
        }

        tracing::debug!(count = identities.len(), "listed identities");
        Ok(identities)
    }

    #[instrument(level = "debug", skip(self, identity), fields(username = %identity.username))]
    async fn create_identity(&self, identity: &NewIdentity) -> Result<UserGuid> {
        let url = self.transport.endpoint(&["Users"])?;
        let body = ScimNewUser {
            user_name: &identity.username,
            external_id: &identity.external_id,
            emails: identity.emails.iter().map(ScimEmail::from).collect(),
            origin: &self.config.origin,
        };

        let created: ScimUser = self.transport.post_json(url, &body, "created identity").await?;
        Ok(UserGuid::new(created.id))
    }
}
