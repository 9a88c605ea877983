//! Error types for `openapi-mcp-tools`.

use serde_json::Value;
use thiserror::Error;

/// Main error type for the bridge.
///
/// The spec-loading variants (`SpecFetch`, `SpecReadBody`, `SpecReadFile`, `SpecParse`) are all
/// fatal at startup; everything else is reported per invocation.
#[derive(Error, Debug)]
pub enum OpenApiToolsError {
    /// Configuration errors (missing spec location, invalid headers, conflicting options).
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("OpenAPI error: failed to fetch spec from '{url}': {message}")]
    SpecFetch { url: String, message: String },

    #[error("OpenAPI error: failed to read spec body from '{url}': {message}")]
    SpecReadBody { url: String, message: String },

    #[error("OpenAPI error: failed to read spec file '{path}': {source}")]
    SpecReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("OpenAPI error: failed to parse OpenAPI spec from '{location}': {source}")]
    SpecParse {
        location: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// No registry entry matched the requested identifier or name.
    ///
    /// `available` lists every registered `(identifier, name)` pair in registry order.
    #[error("Tool not found: {requested} (available: {})", format_available(.available))]
    ToolNotFound {
        requested: String,
        available: Vec<(String, String)>,
    },

    /// The upstream call failed at the transport level or returned a non-2xx status.
    #[error("Upstream request failed{}: {message}", format_status(.status))]
    UpstreamRequestFailed {
        status: Option<u16>,
        message: String,
        body: Option<Value>,
    },

    /// Anything else (e.g. an identifier that cannot be turned back into a request).
    #[error("Unexpected error: {0}")]
    Unexpected(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl OpenApiToolsError {
    /// Whether this error means the spec document could not be loaded.
    #[must_use]
    pub fn is_spec_load_failure(&self) -> bool {
        matches!(
            self,
            Self::SpecFetch { .. }
                | Self::SpecReadBody { .. }
                | Self::SpecReadFile { .. }
                | Self::SpecParse { .. }
        )
    }
}

fn format_available(available: &[(String, String)]) -> String {
    if available.is_empty() {
        return "none".to_string();
    }
    available
        .iter()
        .map(|(id, name)| format!("{id} ({name})"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" with status {s}")).unwrap_or_default()
}

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, OpenApiToolsError>;
