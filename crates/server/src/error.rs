//! Server errors and the mapping from bridge errors to MCP protocol errors.

use openapi_mcp_tools::error::OpenApiToolsError;
use rmcp::ErrorData;
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to read config file '{}': {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{}': {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("no OpenAPI spec configured (use --spec, OPENAPI_SPEC_PATH or `spec` in the config file)")]
    MissingSpec,

    #[error("MCP transport error: {0}")]
    Transport(String),
}

/// MCP error for a failed `tools/call`.
///
/// Unknown tools are the caller's mistake (`invalid_params`, with every registered tool in
/// `data.available`); upstream failures carry the upstream status and body in `data`.
#[must_use]
pub fn tool_error_data(err: &OpenApiToolsError) -> ErrorData {
    match err {
        OpenApiToolsError::ToolNotFound {
            requested,
            available,
        } => {
            let available: Vec<_> = available
                .iter()
                .map(|(id, name)| json!({ "id": id, "name": name }))
                .collect();
            ErrorData::invalid_params(
                err.to_string(),
                Some(json!({ "requested": requested, "available": available })),
            )
        }
        OpenApiToolsError::UpstreamRequestFailed { status, body, .. } => ErrorData::internal_error(
            err.to_string(),
            Some(json!({ "status": status, "body": body })),
        ),
        _ => ErrorData::internal_error(err.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::model::ErrorCode;

    #[test]
    fn tool_not_found_is_invalid_params_with_available_tools() {
        let err = OpenApiToolsError::ToolNotFound {
            requested: "DELETE-nonexistent".to_string(),
            available: vec![("GET-pets".to_string(), "List_pets".to_string())],
        };
        let data = tool_error_data(&err);
        assert_eq!(data.code, ErrorCode::INVALID_PARAMS);
        assert_eq!(
            data.data,
            Some(json!({
                "requested": "DELETE-nonexistent",
                "available": [{ "id": "GET-pets", "name": "List_pets" }]
            }))
        );
    }

    #[test]
    fn upstream_failure_keeps_status_and_body() {
        let err = OpenApiToolsError::UpstreamRequestFailed {
            status: Some(503),
            message: "API returned 503 Service Unavailable".to_string(),
            body: Some(json!("maintenance")),
        };
        let data = tool_error_data(&err);
        assert_eq!(data.code, ErrorCode::INTERNAL_ERROR);
        assert!(data.message.contains("503"));
        assert_eq!(
            data.data,
            Some(json!({ "status": 503, "body": "maintenance" }))
        );
    }

    #[test]
    fn other_errors_are_internal_without_data() {
        let data = tool_error_data(&OpenApiToolsError::Unexpected("boom".to_string()));
        assert_eq!(data.code, ErrorCode::INTERNAL_ERROR);
        assert!(data.data.is_none());
    }
}
