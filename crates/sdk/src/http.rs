//! Shared HTTP transport for the control-plane and identity-directory clients.
//!
//! Wraps a `reqwest::Client` bound to one base URL. Responses are read in
//! full and classified: non-2xx statuses and 2xx bodies carrying an
//! `error_code` become [`SdkError::Api`]; bodies that fail to parse become
//! [`SdkError::Decode`].

use std::time::Duration;

use reqwest::{
    Method, RequestBuilder, StatusCode,
    header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use snafu::ResultExt;
use url::Url;

use crate::error::{ConnectionSnafu, DecodeSnafu, HttpSnafu, Result, SdkError};

/// User agent sent with every request.
const CLIENT_USER_AGENT: &str = concat!("user-migration/", env!("CARGO_PKG_VERSION"));

/// Error envelope shared by the control plane (`description`, `error_code`)
/// and the identity directory (`error`, `error_description`).
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ErrorBody {
    fn into_error(self, status: StatusCode, raw: &[u8]) -> SdkError {
        let description = self
            .description
            .or(self.error_description)
            .or(self.message)
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| fallback_description(status, raw));
        SdkError::Api {
            status: status.as_u16(),
            error_code: self.error_code.or(self.error),
            description,
        }
    }
}

fn fallback_description(status: StatusCode, raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let text = text.trim();
    if text.is_empty() {
        status.canonical_reason().unwrap_or("unknown error").to_owned()
    } else {
        text.chars().take(256).collect()
    }
}

/// HTTP transport bound to one service.
#[derive(Debug, Clone)]
pub(crate) struct HttpTransport {
    client: reqwest::Client,
    base: Url,
    authorization: Option<HeaderValue>,
}

impl HttpTransport {
    /// Builds a transport for `base_url`.
    pub(crate) fn new(
        base_url: &str,
        timeout: Duration,
        connect_timeout: Duration,
        skip_tls_verification: bool,
    ) -> Result<Self> {
        let base = Url::parse(base_url).map_err(|e| SdkError::InvalidUrl {
            url: base_url.to_owned(),
            message: e.to_string(),
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .danger_accept_invalid_certs(skip_tls_verification)
            .default_headers(headers)
            .build()
            .map_err(|e| {
                ConnectionSnafu { message: format!("failed to build HTTP client: {e}") }.build()
            })?;

        Ok(Self { client, base, authorization: None })
    }

    /// Sets the bearer token sent with every subsequent request.
    ///
    /// Accepts tokens with or without a leading `bearer ` scheme.
    pub(crate) fn set_bearer_token(&mut self, token: &str) -> Result<()> {
        let token = token.trim();
        let raw = match token.split_once(' ') {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
            _ => token,
        };
        let mut value = HeaderValue::from_str(&format!("Bearer {raw}")).map_err(|e| {
            SdkError::Config { message: format!("access token is not a valid header value: {e}") }
        })?;
        value.set_sensitive(true);
        self.authorization = Some(value);
        Ok(())
    }

    /// Builds an endpoint URL from path segments. Segments are percent-encoded.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| SdkError::InvalidUrl {
                url: self.base.to_string(),
                message: "URL cannot be a base".to_owned(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Builds an endpoint URL with query parameters. Keys may repeat.
    pub(crate) fn endpoint_with_query(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<Url> {
        let mut url = self.endpoint(segments)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Resolves a server-provided relative reference (e.g. a `next_url`).
    pub(crate) fn resolve(&self, reference: &str) -> Result<Url> {
        self.base.join(reference).map_err(|e| SdkError::InvalidUrl {
            url: reference.to_owned(),
            message: e.to_string(),
        })
    }

    /// Sends a GET and decodes the JSON response.
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: Url, what: &str) -> Result<T> {
        let body = self.send(self.request(Method::GET, url)).await?;
        serde_json::from_slice(&body).context(DecodeSnafu { what })
    }

    /// Sends a PUT without a body and discards the response.
    pub(crate) async fn put_empty(&self, url: Url) -> Result<()> {
        self.send(self.request(Method::PUT, url)).await.map(drop)
    }

    /// Sends a POST with a JSON body and decodes the JSON response.
    pub(crate) async fn post_json<B, T>(&self, url: Url, body: &B, what: &str) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = self.send(self.request(Method::POST, url).json(body)).await?;
        serde_json::from_slice(&body).context(DecodeSnafu { what })
    }

    /// Sends a form-encoded POST and decodes the JSON response.
    pub(crate) async fn post_form<T: DeserializeOwned>(
        &self,
        url: Url,
        form: &[(&str, &str)],
        what: &str,
    ) -> Result<T> {
        let body = self.send(self.request(Method::POST, url).form(form)).await?;
        serde_json::from_slice(&body).context(DecodeSnafu { what })
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.authorization {
            Some(value) => builder.header(AUTHORIZATION, value.clone()),
            None => builder,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Vec<u8>> {
        let response = request.send().await.context(HttpSnafu)?;
        let status = response.status();
        let body = response.bytes().await.context(HttpSnafu)?.to_vec();

        check_response(status, &body)?;
        Ok(body)
    }
}

/// Classifies a response by status and body.
fn check_response(status: StatusCode, body: &[u8]) -> Result<()> {
    if !status.is_success() {
        let envelope: ErrorBody = serde_json::from_slice(body).unwrap_or_default();
        return Err(envelope.into_error(status, body));
    }

    // The control plane occasionally reports failures inside a 2xx body.
    if contains_error_code(body) {
        if let Ok(envelope) = serde_json::from_slice::<ErrorBody>(body) {
            if envelope.error_code.is_some() {
                return Err(envelope.into_error(status, body));
            }
        }
    }

    Ok(())
}

fn contains_error_code(body: &[u8]) -> bool {
    body.windows(b"\"error_code\"".len()).any(|window| window == b"\"error_code\"")
}
