//! Startup wiring: config -> loaded document -> compiled registry -> dispatcher.

use crate::compiler::compile;
use crate::config::BridgeConfig;
use crate::dispatcher::{Dispatcher, ToolSelector};
use crate::document::ApiDocument;
use crate::error::{OpenApiToolsError, Result};
use crate::http::{HttpCapability, ReqwestHttp};
use crate::loader::{is_remote, load_document};
use crate::registry::Registry;
use reqwest::Client;
use rmcp::model::{CallToolResult, JsonObject, Tool};
use std::sync::Arc;
use url::Url;

/// A started bridge: the compiled registry plus a dispatcher bound to the upstream API.
#[derive(Debug, Clone)]
pub struct OpenApiBridge {
    config: BridgeConfig,
    dispatcher: Dispatcher,
}

impl OpenApiBridge {
    /// Validate `config`, load and compile the spec, and bind the dispatcher.
    ///
    /// # Errors
    ///
    /// Any spec-load failure (fetch, read or parse), an invalid configuration, or a base URL
    /// that cannot be determined. All of these are fatal at startup.
    pub async fn start(config: BridgeConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .map_err(|e| {
                OpenApiToolsError::Unexpected(format!("Failed to build HTTP client: {e}"))
            })?;

        let document = load_document(&config.spec, &client).await?;
        let http = Arc::new(ReqwestHttp::new(client, config.timeout()));
        Self::from_document(config, &document, http)
    }

    /// Build a bridge from an already-parsed document and an arbitrary HTTP capability.
    ///
    /// # Errors
    ///
    /// Invalid configuration, or no usable base URL.
    pub fn from_document(
        config: BridgeConfig,
        document: &ApiDocument,
        http: Arc<dyn HttpCapability>,
    ) -> Result<Self> {
        config.validate()?;

        let registry = compile(document);
        tracing::info!(
            title = registry.title().unwrap_or("<untitled>"),
            version = registry.version().unwrap_or("<unversioned>"),
            "Discovered {} tools from OpenAPI spec '{}'",
            registry.len(),
            config.spec
        );
        if registry.is_empty() {
            tracing::warn!("OpenAPI spec '{}' has no usable operations", config.spec);
        }

        let base_url = resolve_base_url(&config, document)?;
        tracing::info!(base_url = %base_url, path_recovery = %config.path_recovery, "upstream configured");

        let dispatcher = Dispatcher::new(
            Arc::new(registry),
            &base_url,
            config.static_headers()?,
            http,
        )
        .with_path_recovery(config.path_recovery, config.substitute_path_params);

        Ok(Self { config, dispatcher })
    }

    /// Tools in registry order.
    #[must_use]
    pub fn list_tools(&self) -> Vec<Tool> {
        self.dispatcher.registry().list_tools()
    }

    /// Invoke a tool by identifier or name. Missing arguments count as an empty mapping.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::dispatch`].
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<CallToolResult> {
        let selector = ToolSelector::for_call(self.dispatcher.registry(), name);
        self.dispatcher
            .dispatch(&selector, arguments.unwrap_or_default())
            .await
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        self.dispatcher.registry()
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }
}

/// Base URL for outbound calls: the configured one, else the document's first server.
///
/// Relative server URLs (e.g. `/api/v3`) are resolved against the spec URL when the spec was
/// fetched over HTTP.
///
/// # Errors
///
/// Returns [`OpenApiToolsError::Config`] when no base URL is available or it cannot be made
/// absolute.
pub fn resolve_base_url(config: &BridgeConfig, document: &ApiDocument) -> Result<String> {
    let Some(base_url) = config
        .base_url
        .clone()
        .or_else(|| document.servers.first().map(|s| s.url.clone()))
    else {
        return Err(OpenApiToolsError::Config(
            "No base URL configured and none found in spec".to_string(),
        ));
    };

    if base_url.starts_with("http://") || base_url.starts_with("https://") {
        return Ok(base_url);
    }

    if is_remote(&config.spec) {
        let mut spec_url = Url::parse(&config.spec).map_err(|e| {
            OpenApiToolsError::Config(format!("Invalid OpenAPI spec URL '{}': {e}", config.spec))
        })?;
        spec_url.set_fragment(None);

        let resolved = spec_url.join(&base_url).map_err(|e| {
            OpenApiToolsError::Config(format!(
                "Invalid baseUrl '{base_url}': {e} (set baseUrl explicitly)"
            ))
        })?;
        return Ok(resolved.to_string());
    }

    Err(OpenApiToolsError::Config(format!(
        "Invalid baseUrl '{base_url}': must be an absolute http(s) URL (set baseUrl explicitly)"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathRecovery;
    use crate::loader::parse_document;
    use openapi_mcp_test_support::EchoUpstream;
    use serde_json::{Value, json};

    fn pets_spec(server_url: &str) -> String {
        format!(
            r#"
openapi: "3.0.0"
info:
  title: Pets
  version: "2.0"
servers:
  - url: "{server_url}"
paths:
  /pets:
    get:
      summary: List pets
      parameters:
        - name: tags
          in: query
          schema:
            type: array
    post:
      summary: Add pet
  /pets/{{pet_id}}:
    get:
      summary: Get pet
      parameters:
        - name: pet_id
          in: path
          required: true
"#
        )
    }

    fn text_json(result: &CallToolResult) -> Value {
        let text = &result.content[0].as_text().expect("text content").text;
        serde_json::from_str(text).expect("pretty JSON")
    }

    #[test]
    fn base_url_prefers_config_then_servers() {
        let doc = parse_document(&pets_spec("https://pets.example.com/v2"), "t").unwrap();

        let cfg = BridgeConfig::new("spec.yaml");
        assert_eq!(
            resolve_base_url(&cfg, &doc).unwrap(),
            "https://pets.example.com/v2"
        );

        let mut cfg = BridgeConfig::new("spec.yaml");
        cfg.base_url = Some("https://override.example.com".to_string());
        assert_eq!(
            resolve_base_url(&cfg, &doc).unwrap(),
            "https://override.example.com"
        );
    }

    #[test]
    fn relative_server_urls_need_a_remote_spec() {
        let doc = parse_document(&pets_spec("/api/v3"), "t").unwrap();

        let cfg = BridgeConfig::new("https://pets.example.com/docs/openapi.json#frag");
        assert_eq!(
            resolve_base_url(&cfg, &doc).unwrap(),
            "https://pets.example.com/api/v3"
        );

        let cfg = BridgeConfig::new("./openapi.yaml");
        assert!(matches!(
            resolve_base_url(&cfg, &doc),
            Err(OpenApiToolsError::Config(_))
        ));
    }

    #[test]
    fn missing_base_url_is_a_config_error() {
        let doc = parse_document("paths: {}\n", "t").unwrap();
        let err = resolve_base_url(&BridgeConfig::new("spec.yaml"), &doc).unwrap_err();
        assert!(err.to_string().contains("No base URL"), "{err}");
    }

    #[tokio::test]
    async fn start_from_file_and_call_by_name_and_id() {
        let upstream = EchoUpstream::start().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let spec_path = dir.path().join("pets.yaml");
        std::fs::write(&spec_path, pets_spec(upstream.base_url())).unwrap();

        let mut cfg = BridgeConfig::new(spec_path.to_string_lossy());
        cfg.api_key = Some("secret".to_string());
        let bridge = OpenApiBridge::start(cfg).await.unwrap();

        let names: Vec<String> = bridge
            .list_tools()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();
        assert_eq!(names, vec!["List_pets", "Add_pet", "Get_pet"]);
        assert_eq!(bridge.registry().title(), Some("Pets"));

        let result = bridge
            .call_tool(
                "List_pets",
                Some(serde_json::from_value(json!({"tags": ["a", "b"]})).unwrap()),
            )
            .await
            .unwrap();
        let echoed = text_json(&result);
        assert_eq!(echoed["method"], "GET");
        assert_eq!(echoed["path"], "/pets");
        assert_eq!(echoed["query"], "tags=a,b");
        assert_eq!(echoed["headers"]["x-api-key"], "secret");

        let result = bridge
            .call_tool(
                "POST-pets",
                Some(serde_json::from_value(json!({"name": "x"})).unwrap()),
            )
            .await
            .unwrap();
        let echoed = text_json(&result);
        assert_eq!(echoed["method"], "POST");
        assert_eq!(echoed["query"], Value::Null);
        assert_eq!(echoed["body"], json!({"name": "x"}));

        assert_eq!(upstream.request_count(), 2);
    }

    #[tokio::test]
    async fn exact_mode_substitutes_path_params_end_to_end() {
        let upstream = EchoUpstream::start().await.unwrap();
        let doc = parse_document(&pets_spec(upstream.base_url()), "inline").unwrap();

        let mut cfg = BridgeConfig::new("inline");
        cfg.path_recovery = PathRecovery::Exact;
        cfg.substitute_path_params = true;
        let http = Arc::new(ReqwestHttp::new(Client::new(), None));
        let bridge = OpenApiBridge::from_document(cfg, &doc, http).unwrap();

        let result = bridge
            .call_tool(
                "Get_pet",
                Some(serde_json::from_value(json!({"pet_id": 7})).unwrap()),
            )
            .await
            .unwrap();
        let echoed = text_json(&result);
        assert_eq!(echoed["path"], "/pets/7");
        assert_eq!(echoed["query"], Value::Null);
    }

    #[tokio::test]
    async fn spec_fetched_over_http_resolves_relative_servers() {
        let doc: Value = serde_yaml::from_str(&pets_spec("/")).unwrap();
        let upstream = EchoUpstream::builder()
            .json("/openapi.json", 200, &doc)
            .start()
            .await
            .unwrap();

        let bridge = OpenApiBridge::start(BridgeConfig::new(upstream.url("/openapi.json")))
            .await
            .unwrap();
        assert_eq!(bridge.dispatcher().base_url(), format!("{}/", upstream.base_url()));

        let result = bridge.call_tool("List_pets", None).await.unwrap();
        assert_eq!(text_json(&result)["path"], "/pets");
    }

    #[tokio::test]
    async fn unreadable_spec_fails_startup() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.yaml");
        let err = OpenApiBridge::start(BridgeConfig::new(missing.to_string_lossy()))
            .await
            .unwrap_err();
        assert!(err.is_spec_load_failure(), "{err}");

        let bad = dir.path().join("bad.yaml");
        std::fs::write(&bad, "openapi: 3.0.0\n").unwrap();
        let err = OpenApiBridge::start(BridgeConfig::new(bad.to_string_lossy()))
            .await
            .unwrap_err();
        assert!(matches!(err, OpenApiToolsError::SpecParse { .. }), "{err}");
    }
}
