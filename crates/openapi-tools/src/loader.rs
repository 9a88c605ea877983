//! Spec acquisition: fetch or read the document text, then parse it.

use crate::document::ApiDocument;
use crate::error::{OpenApiToolsError, Result};
use crate::http::sanitize_reqwest_error;
use reqwest::Client;

/// Whether `location` is fetched over HTTP rather than read from disk.
#[must_use]
pub fn is_remote(location: &str) -> bool {
    location.starts_with("http")
}

/// Load and parse the document at `location` (URL or file path).
///
/// # Errors
///
/// Returns `SpecFetch`/`SpecReadBody` for remote failures (including non-2xx responses),
/// `SpecReadFile` for local I/O failures and `SpecParse` when the text is not a document with a
/// `paths` mapping.
pub async fn load_document(location: &str, client: &Client) -> Result<ApiDocument> {
    let text = if is_remote(location) {
        tracing::info!("Fetching OpenAPI spec from {}", location);
        fetch(location, client).await?
    } else {
        tracing::info!("Loading OpenAPI spec from {}", location);
        tokio::fs::read_to_string(location)
            .await
            .map_err(|e| OpenApiToolsError::SpecReadFile {
                path: location.to_string(),
                source: e,
            })?
    };

    parse_document(&text, location)
}

async fn fetch(url: &str, client: &Client) -> Result<String> {
    let fetch_error = |e: &reqwest::Error| OpenApiToolsError::SpecFetch {
        url: url.to_string(),
        message: sanitize_reqwest_error(e),
    };

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| fetch_error(&e))?
        .error_for_status()
        .map_err(|e| fetch_error(&e))?;

    response
        .text()
        .await
        .map_err(|e| OpenApiToolsError::SpecReadBody {
            url: url.to_string(),
            message: sanitize_reqwest_error(&e),
        })
}

/// Parse document text. JSON is a subset of YAML, so one parser covers both.
///
/// # Errors
///
/// Returns [`OpenApiToolsError::SpecParse`] when the text does not parse into a document.
pub fn parse_document(text: &str, location: &str) -> Result<ApiDocument> {
    serde_yaml::from_str(text).map_err(|e| OpenApiToolsError::SpecParse {
        location: location.to_string(),
        source: e,
    })
}
