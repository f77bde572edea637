//! Client configuration with builder pattern.
//!
//! Provides type-safe configuration for the SDK clients:
//! - Control-plane endpoint and session token
//! - Identity-directory endpoint and OAuth client credentials
//! - Timeouts, TLS verification and retry policies

use std::time::Duration;

use snafu::ensure;

use crate::error::{ConfigSnafu, InvalidUrlSnafu, Result, SdkError};

/// Default request timeout (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connection timeout (5 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default identity origin for re-created users.
pub const DEFAULT_ORIGIN: &str = "ldap";

/// Configuration for the control-plane client.
#[derive(Clone)]
pub struct ClientConfig {
    /// API endpoint URL (e.g., `https://api.sys.example.com`).
    pub(crate) api_endpoint: String,

    /// Access token of the operator's session, with or without `bearer ` prefix.
    pub(crate) access_token: Option<String>,

    /// Request timeout.
    pub(crate) timeout: Duration,

    /// Connection establishment timeout.
    pub(crate) connect_timeout: Duration,

    /// Retry policy for transient failures of idempotent requests.
    pub(crate) retry_policy: RetryPolicy,

    /// Accept invalid TLS certificates.
    pub(crate) skip_tls_verification: bool,
}

// Hand-written so the token never reaches logs.
impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_endpoint", &self.api_endpoint)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("retry_policy", &self.retry_policy)
            .field("skip_tls_verification", &self.skip_tls_verification)
            .finish()
    }
}

impl ClientConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Returns the API endpoint.
    #[must_use]
    pub fn api_endpoint(&self) -> &str {
        &self.api_endpoint
    }

    /// Returns the request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the connection timeout.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Returns the retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Returns whether TLS certificate verification is disabled.
    #[must_use]
    pub fn skip_tls_verification(&self) -> bool {
        self.skip_tls_verification
    }

    /// Returns true if an access token is configured.
    #[must_use]
    pub fn has_access_token(&self) -> bool {
        self.access_token.is_some()
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    api_endpoint: Option<String>,
    access_token: Option<String>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    retry_policy: Option<RetryPolicy>,
    skip_tls_verification: bool,
}

impl ClientConfigBuilder {
    /// Sets the API endpoint URL.
    #[must_use]
    pub fn with_api_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.api_endpoint = Some(endpoint.into());
        self
    }

    /// Sets the session access token.
    ///
    /// Tokens copied from the CLI session carry a `bearer ` prefix; both forms
    /// are accepted.
    #[must_use]
    pub fn with_access_token<S: Into<String>>(mut self, token: S) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Sets the request timeout.
    ///
    /// Default: 30 seconds.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the connection establishment timeout.
    ///
    /// Default: 5 seconds.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the retry policy for transient failures.
    ///
    /// Default: [`RetryPolicy::default()`].
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Disables TLS certificate verification.
    ///
    /// Default: verification enabled.
    #[must_use]
    pub fn with_skip_tls_verification(mut self, skip: bool) -> Self {
        self.skip_tls_verification = skip;
        self
    }

    /// Builds the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No API endpoint provided, or it is not an HTTP(S) URL
    /// - The access token is empty
    /// - Timeout or connect timeout is zero
    pub fn build(self) -> Result<ClientConfig> {
        let api_endpoint = self
            .api_endpoint
            .ok_or_else(|| ConfigSnafu { message: "api_endpoint is required" }.build())?;
        validate_url(&api_endpoint)?;

        if let Some(ref token) = self.access_token {
            ensure!(
                !token.trim().is_empty(),
                ConfigSnafu { message: "access_token cannot be empty" }
            );
        }

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        ensure!(!timeout.is_zero(), ConfigSnafu { message: "timeout cannot be zero" });

        let connect_timeout = self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        ensure!(
            !connect_timeout.is_zero(),
            ConfigSnafu { message: "connect_timeout cannot be zero" }
        );

        Ok(ClientConfig {
            api_endpoint: api_endpoint.trim_end_matches('/').to_owned(),
            access_token: self.access_token,
            timeout,
            connect_timeout,
            retry_policy: self.retry_policy.unwrap_or_default(),
            skip_tls_verification: self.skip_tls_verification,
        })
    }
}

/// Configuration for the identity-directory client.
#[derive(Clone)]
pub struct UaaConfig {
    /// Directory server URL (e.g., `https://uaa.sys.example.com`).
    pub(crate) server_url: String,
    /// OAuth client id with `scim.read` and `scim.write`.
    pub(crate) client_id: String,
    /// OAuth client secret.
    pub(crate) client_secret: String,
    /// Origin recorded on re-created identities.
    pub(crate) origin: String,
    /// Request timeout.
    pub(crate) timeout: Duration,
    /// Retry policy for transient failures of idempotent requests.
    pub(crate) retry_policy: RetryPolicy,
    /// Accept invalid TLS certificates.
    pub(crate) skip_tls_verification: bool,
}

impl std::fmt::Debug for UaaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UaaConfig")
            .field("server_url", &self.server_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("origin", &self.origin)
            .field("timeout", &self.timeout)
            .field("retry_policy", &self.retry_policy)
            .field("skip_tls_verification", &self.skip_tls_verification)
            .finish()
    }
}

#[bon::bon]
impl UaaConfig {
    /// Creates a new identity-directory configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Config`] if the credentials are empty, or
    /// [`SdkError::InvalidUrl`] if the server URL is not HTTP(S).
    #[builder]
    pub fn new(
        #[builder(into)] server_url: String,
        #[builder(into)] client_id: String,
        #[builder(into)] client_secret: String,
        #[builder(into, default = DEFAULT_ORIGIN.to_owned())] origin: String,
        #[builder(default = DEFAULT_TIMEOUT)] timeout: Duration,
        #[builder(default)] retry_policy: RetryPolicy,
        #[builder(default)] skip_tls_verification: bool,
    ) -> Result<Self> {
        validate_url(&server_url)?;
        ensure!(!client_id.is_empty(), ConfigSnafu { message: "client_id cannot be empty" });
        ensure!(
            !client_secret.is_empty(),
            ConfigSnafu { message: "client_secret cannot be empty" }
        );
        ensure!(!origin.is_empty(), ConfigSnafu { message: "origin cannot be empty" });
        ensure!(!timeout.is_zero(), ConfigSnafu { message: "timeout cannot be zero" });

        Ok(Self {
            server_url: server_url.trim_end_matches('/').to_owned(),
            client_id,
            client_secret,
            origin,
            timeout,
            retry_policy,
            skip_tls_verification,
        })
    }

    /// Returns the directory server URL.
    #[must_use]
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Returns the origin recorded on re-created identities.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }
}

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,

    /// Backoff before the first retry.
    pub initial_backoff: Duration,

    /// Upper bound for any single backoff.
    pub max_backoff: Duration,

    /// Backoff multiplier between consecutive retries.
    pub multiplier: f64,

    /// Jitter factor (0.0 to 1.0) applied to each backoff.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            multiplier: 2.0,
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy builder.
    #[must_use]
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// Creates a policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self { max_attempts: 1, ..Default::default() }
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Default)]
pub struct RetryPolicyBuilder {
    max_attempts: Option<u32>,
    initial_backoff: Option<Duration>,
    max_backoff: Option<Duration>,
    multiplier: Option<f64>,
    jitter: Option<f64>,
}

impl RetryPolicyBuilder {
    /// Sets the maximum number of attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Sets the initial backoff duration.
    #[must_use]
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = Some(backoff);
        self
    }

    /// Sets the maximum backoff duration.
    #[must_use]
    pub fn with_max_backoff(mut self, backoff: Duration) -> Self {
        self.max_backoff = Some(backoff);
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    /// Sets the jitter factor, clamped to 0.0..=1.0.
    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = Some(jitter.clamp(0.0, 1.0));
        self
    }

    /// Builds the retry policy. At least one attempt is always made.
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts).max(1),
            initial_backoff: self.initial_backoff.unwrap_or(defaults.initial_backoff),
            max_backoff: self.max_backoff.unwrap_or(defaults.max_backoff),
            multiplier: self.multiplier.unwrap_or(defaults.multiplier),
            jitter: self.jitter.unwrap_or(defaults.jitter),
        }
    }
}

/// Validates that a URL is well-formed HTTP(S).
pub(crate) fn validate_url(url: &str) -> Result<()> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return InvalidUrlSnafu { url, message: "URL must start with http:// or https://" }.fail();
    }

    if let Err(e) = url::Url::parse(url) {
        return Err(SdkError::InvalidUrl { url: url.to_owned(), message: e.to_string() });
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_defaults() {
        let config = ClientConfig::builder()
            .with_api_endpoint("https://api.sys.example.com/")
            .with_access_token("bearer abc")
            .build()
            .expect("valid config");

        assert_eq!(config.api_endpoint(), "https://api.sys.example.com");
        assert_eq!(config.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(config.connect_timeout(), DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(config.retry_policy(), &RetryPolicy::default());
        assert!(!config.skip_tls_verification());
        assert!(config.has_access_token());
    }

    #[test]
    fn test_client_config_requires_endpoint() {
        let result = ClientConfig::builder().build();
        assert!(matches!(result, Err(SdkError::Config { .. })));
    }

    #[test]
    fn test_client_config_rejects_non_http_endpoint() {
        let result = ClientConfig::builder().with_api_endpoint("api.example.com").build();
        assert!(matches!(result, Err(SdkError::InvalidUrl { .. })));
    }

    #[test]
    fn test_client_config_rejects_empty_token() {
        let result = ClientConfig::builder()
            .with_api_endpoint("https://api.example.com")
            .with_access_token("  ")
            .build();
        assert!(matches!(result, Err(SdkError::Config { .. })));
    }

    #[test]
    fn test_client_config_rejects_zero_timeout() {
        let result = ClientConfig::builder()
            .with_api_endpoint("https://api.example.com")
            .with_timeout(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(SdkError::Config { .. })));
    }

    #[test]
    fn test_client_config_debug_redacts_token() {
        let config = ClientConfig::builder()
            .with_api_endpoint("https://api.example.com")
            .with_access_token("bearer secret-token")
            .build()
            .expect("valid config");

        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_uaa_config_defaults() {
        let config = UaaConfig::builder()
            .server_url("https://uaa.sys.example.com/")
            .client_id("migrator")
            .client_secret("s3cret")
            .build()
            .expect("valid config");

        assert_eq!(config.server_url(), "https://uaa.sys.example.com");
        assert_eq!(config.origin(), DEFAULT_ORIGIN);
        assert!(!format!("{config:?}").contains("s3cret"));
    }

    #[test]
    fn test_uaa_config_rejects_empty_secret() {
        let result = UaaConfig::builder()
            .server_url("https://uaa.sys.example.com")
            .client_id("migrator")
            .client_secret("")
            .build();
        assert!(matches!(result, Err(SdkError::Config { .. })));
    }

    #[test]
    fn test_retry_policy_builder_overrides() {
        let policy = RetryPolicy::builder()
            .with_max_attempts(5)
            .with_initial_backoff(Duration::from_millis(10))
            .with_jitter(3.0)
            .build();

        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_backoff, Duration::from_millis(10));
        assert_eq!(policy.jitter, 1.0);
        assert_eq!(policy.max_backoff, RetryPolicy::default().max_backoff);
    }

    #[test]
    fn test_retry_policy_always_attempts_once() {
        let policy = RetryPolicy::builder().with_max_attempts(0).build();
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(RetryPolicy::no_retry().max_attempts, 1);
    }
}
