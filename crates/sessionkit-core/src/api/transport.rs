//! Request/response types and the network seam beneath the gateway and
//! the authenticated client.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use super::AuthError;

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// A request as seen by the session layer: method, URL, headers, body.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Serialize `body` as the JSON payload and set the content type.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, AuthError> {
        let bytes =
            serde_json::to_vec(body).map_err(|e| AuthError::InvalidRequest(e.to_string()))?;
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.body = Some(bytes);
        Ok(self)
    }

    pub fn header(mut self, name: HeaderName, value: &str) -> Result<Self, AuthError> {
        let value = HeaderValue::from_str(value)
            .map_err(|e| AuthError::InvalidRequest(format!("{}: {}", name, e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn bearer(self, token: &str) -> Result<Self, AuthError> {
        self.header(header::AUTHORIZATION, &format!("Bearer {}", token))
    }

    pub fn basic(self, username: &str, password: &str) -> Result<Self, AuthError> {
        let encoded = STANDARD.encode(format!("{}:{}", username, password));
        self.header(header::AUTHORIZATION, &format!("Basic {}", encoded))
    }

    /// Replace any existing Authorization header with a bearer token,
    /// or drop it when no token is available.
    pub(crate) fn with_access_token(&self, token: Option<&str>) -> Result<Self, AuthError> {
        let mut request = self.clone();
        request.headers.remove(header::AUTHORIZATION);
        match token {
            Some(token) => request.bearer(token),
            None => Ok(request),
        }
    }

    pub fn authorization(&self) -> Option<&str> {
        self.headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
    }
}

/// A fully-read response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, AuthError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Ok for 2xx, otherwise the generic status mapping.
    pub fn error_for_status(self) -> Result<Self, AuthError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(AuthError::from_status(self.status, &self.text()))
        }
    }
}

/// Executes requests. Only transport failures are errors; every HTTP
/// status comes back as a response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, AuthError>;
}

/// Production transport on reqwest.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, AuthError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, AuthError> {
        debug!(method = %request.method, url = %request.url, "Sending request");

        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        debug!(status = %status, bytes = body.len(), "Response received");
        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}
