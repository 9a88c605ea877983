//! rmcp `ServerHandler` backed by an [`OpenApiBridge`].

use crate::error::{ServerError, tool_error_data};
use openapi_mcp_tools::runtime::OpenApiBridge;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Implementation, JsonObject, ListToolsResult,
    PaginatedRequestParams, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData, RoleServer, ServerHandler, ServiceExt};
use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

/// MCP server exposing the bridge's tools.
#[derive(Debug, Clone)]
pub struct BridgeServer {
    bridge: Arc<OpenApiBridge>,
}

impl BridgeServer {
    #[must_use]
    pub fn new(bridge: OpenApiBridge) -> Self {
        Self {
            bridge: Arc::new(bridge),
        }
    }

    #[must_use]
    pub fn tools(&self) -> Vec<Tool> {
        self.bridge.list_tools()
    }

    /// Run one `tools/call`, converting failures into MCP errors.
    ///
    /// # Errors
    ///
    /// See [`tool_error_data`].
    pub async fn invoke(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<CallToolResult, ErrorData> {
        self.bridge
            .call_tool(name, arguments)
            .await
            .map_err(|e| tool_error_data(&e))
    }

    /// Serve MCP over stdin/stdout until the client disconnects.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Transport`] if the session cannot be established or ends abnormally.
    pub async fn serve_stdio(self) -> Result<(), ServerError> {
        let (stdin, stdout) = rmcp::transport::stdio();
        self.serve_io(stdin, stdout).await
    }

    /// Serve MCP as newline-delimited JSON-RPC over any reader/writer pair.
    ///
    /// # Errors
    ///
    /// Same as [`BridgeServer::serve_stdio`].
    pub async fn serve_io<R, W>(self, reader: R, writer: W) -> Result<(), ServerError>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let service = ServiceExt::<RoleServer>::serve(self, (reader, writer))
            .await
            .map_err(|e| ServerError::Transport(format!("failed to start MCP server: {e}")))?;
        service
            .waiting()
            .await
            .map_err(|e| ServerError::Transport(format!("MCP server error: {e}")))?;
        Ok(())
    }
}

impl ServerHandler for BridgeServer {
    fn get_info(&self) -> ServerInfo {
        let config = self.bridge.config();
        let registry = self.bridge.registry();
        let instructions = registry.title().map(|title| {
            format!(
                "Tools generated from the OpenAPI document '{title}'. Each tool performs one HTTP request."
            )
        });

        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: config.name.clone(),
                version: config.version.clone(),
                ..Default::default()
            },
            instructions,
            ..Default::default()
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListToolsResult, ErrorData>> + Send + '_ {
        async move {
            Ok(ListToolsResult {
                tools: self.tools(),
                ..Default::default()
            })
        }
    }

    fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<CallToolResult, ErrorData>> + Send + '_ {
        async move { self.invoke(&request.name, request.arguments).await }
    }
}
