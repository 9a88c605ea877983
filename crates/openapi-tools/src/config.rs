use crate::error::{OpenApiToolsError, Result};
use indexmap::IndexMap;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";
pub const DEFAULT_SERVER_NAME: &str = "openapi-mcp-server";

/// Configuration for one OpenAPI-backed tool server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    /// `OpenAPI` spec location (URL or file path).
    #[serde(default)]
    pub spec: String,

    /// Base URL for outbound calls. Falls back to the document's first `servers` entry.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Value of the API-key header (omitted when unset).
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,

    #[serde(default = "default_content_type")]
    pub content_type: String,

    /// Extra static headers sent with every outbound call.
    #[serde(default)]
    pub headers: IndexMap<String, String>,

    /// Display name advertised to MCP clients.
    #[serde(default = "default_server_name")]
    pub name: String,

    /// Version advertised to MCP clients.
    #[serde(default = "default_server_version")]
    pub version: String,

    #[serde(default)]
    pub path_recovery: PathRecovery,

    /// Substitute `{param}` placeholders from arguments. Requires `pathRecovery: exact`.
    #[serde(default)]
    pub substitute_path_params: bool,

    /// Per-request timeout in seconds. Unset (or 0) waits indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// How the dispatcher turns a resolved tool back into an HTTP route.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PathRecovery {
    /// Split the tool identifier on its first `-` and turn the remaining `-` into `/`.
    /// Lossy for paths containing `-`, `_`, `{` or `}`.
    #[default]
    Identifier,
    /// Use the method and path template recorded when the tool was compiled.
    Exact,
}

impl FromStr for PathRecovery {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "identifier" => Ok(Self::Identifier),
            "exact" => Ok(Self::Exact),
            other => Err(format!(
                "unknown path recovery mode '{other}' (expected 'identifier' or 'exact')"
            )),
        }
    }
}

impl fmt::Display for PathRecovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier => f.write_str("identifier"),
            Self::Exact => f.write_str("exact"),
        }
    }
}

fn default_api_key_header() -> String {
    DEFAULT_API_KEY_HEADER.to_string()
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

fn default_server_name() -> String {
    DEFAULT_SERVER_NAME.to_string()
}

fn default_server_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            spec: String::new(),
            base_url: None,
            api_key: None,
            api_key_header: default_api_key_header(),
            content_type: default_content_type(),
            headers: IndexMap::new(),
            name: default_server_name(),
            version: default_server_version(),
            path_recovery: PathRecovery::default(),
            substitute_path_params: false,
            timeout_secs: None,
        }
    }
}

impl BridgeConfig {
    #[must_use]
    pub fn new(spec: impl Into<String>) -> Self {
        Self {
            spec: spec.into(),
            ..Self::default()
        }
    }

    /// Whether the spec location is fetched over HTTP rather than read from disk.
    #[must_use]
    pub fn spec_is_remote(&self) -> bool {
        crate::loader::is_remote(&self.spec)
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout_secs {
            None | Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
        }
    }

    /// Check the configuration for errors that would only surface at call time.
    ///
    /// # Errors
    ///
    /// Returns [`OpenApiToolsError::Config`] when the spec location is empty, path-parameter
    /// substitution is enabled without exact path recovery, the base URL is not an absolute
    /// http(s) URL, or a static header is not a valid HTTP header.
    pub fn validate(&self) -> Result<()> {
        if self.spec.trim().is_empty() {
            return Err(OpenApiToolsError::Config(
                "no OpenAPI spec location configured".to_string(),
            ));
        }

        if self.substitute_path_params && self.path_recovery != PathRecovery::Exact {
            return Err(OpenApiToolsError::Config(
                "substitutePathParams requires pathRecovery: exact (identifier recovery drops path placeholders)"
                    .to_string(),
            ));
        }

        if let Some(base_url) = &self.base_url
            && !(base_url.starts_with("http://") || base_url.starts_with("https://"))
        {
            return Err(OpenApiToolsError::Config(format!(
                "Invalid baseUrl '{base_url}': must be an absolute http(s) URL",
            )));
        }

        self.static_headers().map(|_| ())
    }

    /// Headers sent with every outbound call: content type, API key (if set), extra headers.
    ///
    /// # Errors
    ///
    /// Returns [`OpenApiToolsError::Config`] for header names or values that are not valid HTTP.
    pub fn static_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, header_value("Content-Type", &self.content_type)?);

        if let Some(api_key) = &self.api_key {
            let mut value = header_value(&self.api_key_header, api_key)?;
            value.set_sensitive(true);
            headers.insert(header_name(&self.api_key_header)?, value);
        }

        for (name, value) in &self.headers {
            headers.insert(header_name(name)?, header_value(name, value)?);
        }

        Ok(headers)
    }
}

fn header_name(name: &str) -> Result<HeaderName> {
    HeaderName::from_bytes(name.trim().as_bytes())
        .map_err(|e| OpenApiToolsError::Config(format!("Invalid header name '{name}': {e}")))
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value.trim())
        .map_err(|e| OpenApiToolsError::Config(format!("Invalid value for header '{name}': {e}")))
}
