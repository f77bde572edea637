//! Control-plane API client.
//!
//! [`ControlPlane`] is the seam the migration engine talks through. The
//! production implementation, [`CloudControllerClient`], speaks the v2 REST
//! API; tests use [`crate::mock::MockControlPlane`].
//!
//! Reads and role grants are idempotent and retried per the configured
//! [`RetryPolicy`](crate::RetryPolicy). User creation is sent exactly once.

use async_trait::async_trait;
use serde::{Serialize, de::IgnoredAny};
use tracing::instrument;

use user_migration_types::{
    OrgGuid, OrgResource, OrgRoleKind, Page, SpaceGuid, SpaceResource, SpaceRoleKind, UserGuid,
    UserResource, UserSummaryResource,
};

use crate::{config::ClientConfig, error::Result, http::HttpTransport, retry::with_retry};

/// Page size requested when listing users.
const USERS_PER_PAGE: &str = "100";

/// Operations the migration needs from a control-plane deployment.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// API endpoint URL of this deployment.
    fn api_endpoint(&self) -> &str;

    /// Lists one page of users. `next` is the `next_url` of the previous page.
    async fn list_users(&self, next: Option<&str>) -> Result<Page<UserResource>>;

    /// Fetches the membership summary of a user.
    async fn user_summary(&self, user: &UserGuid) -> Result<UserSummaryResource>;

    /// Finds organizations by exact name.
    async fn find_organizations(&self, name: &str) -> Result<Page<OrgResource>>;

    /// Finds spaces by exact name within an organization.
    async fn find_spaces(&self, organization: &OrgGuid, name: &str) -> Result<Page<SpaceResource>>;

    /// Creates a control-plane user bound to an identity-directory id.
    async fn create_user(&self, user: &UserGuid) -> Result<()>;

    /// Makes a user a plain member of an organization.
    async fn associate_user_with_organization(
        &self,
        organization: &OrgGuid,
        user: &UserGuid,
    ) -> Result<()>;

    /// Grants an organization-level role.
    async fn grant_organization_role(
        &self,
        organization: &OrgGuid,
        user: &UserGuid,
        role: OrgRoleKind,
    ) -> Result<()>;

    /// Grants a space-level role.
    async fn grant_space_role(
        &self,
        space: &SpaceGuid,
        user: &UserGuid,
        role: SpaceRoleKind,
    ) -> Result<()>;
}

#[derive(Serialize)]
struct CreateUserRequest<'a> {
    guid: &'a str,
}

/// Control-plane client over the v2 REST API.
#[derive(Debug, Clone)]
pub struct CloudControllerClient {
    transport: HttpTransport,
    config: ClientConfig,
}

impl CloudControllerClient {
    /// Creates a client from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Connection`](crate::SdkError::Connection) if the HTTP
    /// client cannot be built, or [`SdkError::Config`](crate::SdkError::Config)
    /// if the access token is not a valid header value.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut transport = HttpTransport::new(
            &config.api_endpoint,
            config.timeout,
            config.connect_timeout,
            config.skip_tls_verification,
        )?;
        if let Some(token) = &config.access_token {
            transport.set_bearer_token(token)?;
        }

        Ok(Self { transport, config })
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn put_idempotent(&self, label: &str, segments: &[&str]) -> Result<()> {
        let url = self.transport.endpoint(segments)?;
        with_retry(&self.config.retry_policy, label, || self.transport.put_empty(url.clone())).await
    }
}

#[async_trait]
impl ControlPlane for CloudControllerClient {
    fn api_endpoint(&self) -> &str {
        &self.config.api_endpoint
    }

    #[instrument(level = "debug", skip(self))]
    async fn list_users(&self, next: Option<&str>) -> Result<Page<UserResource>> {
        let url = match next {
            Some(next) => self.transport.resolve(next)?,
            None => self
                .transport
                .endpoint_with_query(&["v2", "users"], &[("results-per-page", USERS_PER_PAGE)])?,
        };
        with_retry(&self.config.retry_policy, "list_users", || {
            self.transport.get_json(url.clone(), "user page")
        })
        .await
    }

    #[instrument(level = "debug", skip(self))]
    async fn user_summary(&self, user: &UserGuid) -> Result<UserSummaryResource> {
        let url = self.transport.endpoint(&["v2", "users", user.as_str(), "summary"])?;
        with_retry(&self.config.retry_policy, "user_summary", || {
            self.transport.get_json(url.clone(), "user summary")
        })
        .await
    }

    #[instrument(level = "debug", skip(self))]
    async fn find_organizations(&self, name: &str) -> Result<Page<OrgResource>> {
        let query = format!("name:{name}");
        let url =
            self.transport.endpoint_with_query(&["v2", "organizations"], &[("q", query.as_str())])?;
        with_retry(&self.config.retry_policy, "find_organizations", || {
            self.transport.get_json(url.clone(), "organization page")
        })
        .await
    }

    #[instrument(level = "debug", skip(self))]
    async fn find_spaces(&self, organization: &OrgGuid, name: &str) -> Result<Page<SpaceResource>> {
        let by_name = format!("name:{name}");
        let by_org = format!("organization_guid:{organization}");
        let query = [("q", by_name.as_str()), ("q", by_org.as_str())];
        let url = self.transport.endpoint_with_query(&["v2", "spaces"], &query)?;
        with_retry(&self.config.retry_policy, "find_spaces", || {
            self.transport.get_json(url.clone(), "space page")
        })
        .await
    }

    #[instrument(level = "debug", skip(self))]
    async fn create_user(&self, user: &UserGuid) -> Result<()> {
        let url = self.transport.endpoint(&["v2", "users"])?;
        let body = CreateUserRequest { guid: user.as_str() };
        self.transport.post_json::<_, IgnoredAny>(url, &body, "created user").await.map(drop)
    }

    #[instrument(level = "debug", skip(self))]
    async fn associate_user_with_organization(
        &self,
        organization: &OrgGuid,
        user: &UserGuid,
    ) -> Result<()> {
        self.put_idempotent(
            "associate_user_with_organization",
            &["v2", "organizations", organization.as_str(), "users", user.as_str()],
        )
        .await
    }

    #[instrument(level = "debug", skip(self))]
    async fn grant_organization_role(
        &self,
        organization: &OrgGuid,
        user: &UserGuid,
        role: OrgRoleKind,
    ) -> Result<()> {
        self.put_idempotent(
            "grant_organization_role",
            &["v2", "organizations", organization.as_str(), role.collection(), user.as_str()],
        )
        .await
    }

    #[instrument(level = "debug", skip(self))]
    async fn grant_space_role(
        &self,
        space: &SpaceGuid,
        user: &UserGuid,
        role: SpaceRoleKind,
    ) -> Result<()> {
        self.put_idempotent(
            "grant_space_role",
            &["v2", "spaces", space.as_str(), role.collection(), user.as_str()],
        )
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::disallowed_methods)]
mod tests {
    use super::*;

    fn client(endpoint: &str) -> CloudControllerClient {
        let config = ClientConfig::builder()
            .with_api_endpoint(endpoint)
            .with_access_token("bearer token")
            .build()
            .unwrap();
        CloudControllerClient::new(config).unwrap()
    }

    #[test]
    fn test_api_endpoint_is_normalized() {
        let client = client("https://api.sys.example.com/");
        assert_eq!(client.api_endpoint(), "https://api.sys.example.com");
    }

    #[test]
    fn test_create_user_request_body() {
        let body = CreateUserRequest { guid: "uaa-1" };
        assert_eq!(serde_json::to_string(&body).unwrap(), r#"{"guid":"uaa-1"}"#);
    }

    #[test]
    fn test_client_without_token() {
        let config =
            ClientConfig::builder().with_api_endpoint("https://api.example.com").build().unwrap();
        let client = CloudControllerClient::new(config).unwrap();
        assert!(!client.config().has_access_token());
    }
}
