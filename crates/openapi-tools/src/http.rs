//! Outbound HTTP capability used by the dispatcher.
//!
//! The dispatcher only talks to [`HttpCapability`]; production code plugs in [`ReqwestHttp`],
//! tests plug in a recording fake.

use crate::error::{OpenApiToolsError, Result};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// A fully-built outbound request.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    /// Target URL, query string already encoded.
    pub url: Url,
    pub headers: HeaderMap,
    /// JSON body, if any.
    pub body: Option<Value>,
}

/// A successful (2xx) upstream response.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: u16,
    /// Parsed JSON body; non-JSON bodies are kept as a JSON string.
    pub body: Value,
}

#[async_trait]
pub trait HttpCapability: Send + Sync {
    /// Send `request`.
    ///
    /// # Errors
    ///
    /// Returns [`OpenApiToolsError::UpstreamRequestFailed`] for transport failures (no status)
    /// and for non-2xx responses (with status and parsed body).
    async fn request(&self, request: OutboundRequest) -> Result<UpstreamResponse>;
}

/// [`HttpCapability`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestHttp {
    client: Client,
    timeout: Option<Duration>,
}

impl ReqwestHttp {
    #[must_use]
    pub fn new(client: Client, timeout: Option<Duration>) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl HttpCapability for ReqwestHttp {
    async fn request(&self, request: OutboundRequest) -> Result<UpstreamResponse> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = &request.body {
            // Content-Type comes from the static headers.
            builder = builder.body(serde_json::to_vec(body)?);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| OpenApiToolsError::UpstreamRequestFailed {
                status: None,
                message: sanitize_reqwest_error(&e),
                body: None,
            })?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| OpenApiToolsError::UpstreamRequestFailed {
                status: Some(status.as_u16()),
                message: sanitize_reqwest_error(&e),
                body: None,
            })?;
        let body = body_to_value(&bytes);

        if status.is_success() {
            return Ok(UpstreamResponse {
                status: status.as_u16(),
                body,
            });
        }

        let reason = status.canonical_reason().unwrap_or("Unknown");
        Err(OpenApiToolsError::UpstreamRequestFailed {
            status: Some(status.as_u16()),
            message: format!("API returned {} {reason}", status.as_u16()),
            body: Some(body),
        })
    }
}

/// Parse a response body as JSON, falling back to the (lossy UTF-8) text.
#[must_use]
pub fn body_to_value(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// URL without credentials, query or fragment, safe to log.
#[must_use]
pub fn redact_url(url: &Url) -> String {
    let mut u = url.clone();
    let _ = u.set_username("");
    let _ = u.set_password(None);
    u.set_query(None);
    u.set_fragment(None);
    u.to_string()
}

/// `reqwest` error message with the request URL redacted.
#[must_use]
pub fn sanitize_reqwest_error(e: &reqwest::Error) -> String {
    let mut msg = e.to_string();
    if let Some(u) = e.url() {
        msg = msg.replace(u.as_str(), &redact_url(u));
    }
    msg
}
