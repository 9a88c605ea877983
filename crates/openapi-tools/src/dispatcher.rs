//! Invocation dispatcher: tool identifier or name + arguments -> one upstream HTTP call.

use crate::config::PathRecovery;
use crate::error::{OpenApiToolsError, Result};
use crate::http::{HttpCapability, OutboundRequest, redact_url};
use crate::naming::{Route, ToolId};
use crate::registry::{Registry, ToolDescriptor};
use crate::semantics::uses_query_arguments;
use reqwest::header::HeaderMap;
use rmcp::model::{CallToolResult, Content, JsonObject};
use serde_json::Value;
use std::sync::Arc;
use url::Url;

/// How a caller refers to a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolSelector {
    /// Registry key, looked up directly.
    Id(String),
    /// Display name; the first match in registry order wins.
    Name(String),
}

impl ToolSelector {
    /// Selector for an MCP `tools/call` name: an identifier when the registry has that key,
    /// otherwise a tool name.
    #[must_use]
    pub fn for_call(registry: &Registry, name: &str) -> Self {
        if registry.contains_id(name) {
            Self::Id(name.to_string())
        } else {
            Self::Name(name.to_string())
        }
    }

    fn as_str(&self) -> &str {
        match self {
            Self::Id(s) | Self::Name(s) => s,
        }
    }
}

/// Routes tool invocations to the upstream API.
///
/// Cheap to clone; the registry and HTTP capability are shared.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    base_url: String,
    headers: HeaderMap,
    path_recovery: PathRecovery,
    substitute_path_params: bool,
    http: Arc<dyn HttpCapability>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("tools", &self.registry.len())
            .field("base_url", &self.base_url)
            .field("path_recovery", &self.path_recovery)
            .field("substitute_path_params", &self.substitute_path_params)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// `base_url` is normalized to end with exactly one `/`.
    #[must_use]
    pub fn new(
        registry: Arc<Registry>,
        base_url: &str,
        headers: HeaderMap,
        http: Arc<dyn HttpCapability>,
    ) -> Self {
        Self {
            registry,
            base_url: format!("{}/", base_url.trim_end_matches('/')),
            headers,
            path_recovery: PathRecovery::default(),
            substitute_path_params: false,
            http,
        }
    }

    #[must_use]
    pub fn with_path_recovery(mut self, mode: PathRecovery, substitute_path_params: bool) -> Self {
        self.path_recovery = mode;
        self.substitute_path_params = substitute_path_params;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Find the descriptor a selector refers to.
    ///
    /// # Errors
    ///
    /// Returns [`OpenApiToolsError::ToolNotFound`] listing every registered `(id, name)` pair.
    pub fn resolve(&self, selector: &ToolSelector) -> Result<(&ToolId, &ToolDescriptor)> {
        let found = match selector {
            ToolSelector::Id(id) => self.registry.get_key_value(id),
            ToolSelector::Name(name) => self.registry.find_by_name(name),
        };
        found.ok_or_else(|| OpenApiToolsError::ToolNotFound {
            requested: selector.as_str().to_string(),
            available: self.registry.id_name_pairs(),
        })
    }

    /// Build the outbound request for an invocation without sending it.
    ///
    /// # Errors
    ///
    /// `ToolNotFound` when the selector does not resolve; `Unexpected` when the route cannot be
    /// recovered or the resulting URL does not parse.
    pub fn prepare(
        &self,
        selector: &ToolSelector,
        mut arguments: JsonObject,
    ) -> Result<OutboundRequest> {
        let (id, descriptor) = self.resolve(selector)?;
        let route = self.route_for(id, descriptor)?;

        let path = if self.substitute_path_params {
            substitute_path_params(&route.path, &mut arguments)
        } else {
            route.path.clone()
        };

        let mut target = format!("{}{}", self.base_url, path.trim_start_matches('/'));
        let body = if uses_query_arguments(&route.method) {
            let query = encode_query(&arguments);
            if !query.is_empty() {
                target.push('?');
                target.push_str(&query);
            }
            None
        } else {
            Some(Value::Object(arguments))
        };

        let url = Url::parse(&target).map_err(|e| {
            OpenApiToolsError::Unexpected(format!("Invalid request URL '{target}': {e}"))
        })?;

        Ok(OutboundRequest {
            method: route.method,
            url,
            headers: self.headers.clone(),
            body,
        })
    }

    /// Resolve, shape and send one invocation.
    ///
    /// The upstream payload comes back as a single text block holding its pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// `ToolNotFound` (no HTTP call is made), `UpstreamRequestFailed` for non-2xx or transport
    /// failures, `Unexpected` for anything else.
    pub async fn dispatch(
        &self,
        selector: &ToolSelector,
        arguments: JsonObject,
    ) -> Result<CallToolResult> {
        tracing::debug!(tool = %selector.as_str(), arguments = ?arguments, "dispatching tool call");

        let request = self.prepare(selector, arguments)?;
        let method = request.method.clone();
        let display_url = redact_url(&request.url);
        tracing::debug!(%method, url = %request.url, body = ?request.body, "upstream request");

        match self.http.request(request).await {
            Ok(response) => {
                tracing::info!(
                    tool = %selector.as_str(),
                    %method,
                    url = %display_url,
                    status = response.status,
                    "upstream call succeeded"
                );
                tracing::debug!(body = %response.body, "upstream response");
                let text = serde_json::to_string_pretty(&response.body)?;
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => {
                tracing::error!(
                    tool = %selector.as_str(),
                    %method,
                    url = %display_url,
                    error = %e,
                    "upstream call failed"
                );
                Err(e)
            }
        }
    }

    fn route_for(&self, id: &ToolId, descriptor: &ToolDescriptor) -> Result<Route> {
        match self.path_recovery {
            PathRecovery::Exact => Ok(descriptor.route.clone()),
            PathRecovery::Identifier => id.reconstruct().ok_or_else(|| {
                OpenApiToolsError::Unexpected(format!(
                    "Cannot recover HTTP method and path from tool identifier '{id}'"
                ))
            }),
        }
    }
}

/// Replace `{name}` placeholders with matching (non-null) arguments and drop those arguments.
/// Placeholders without a matching argument are left in place.
fn substitute_path_params(template: &str, arguments: &mut JsonObject) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}').map(|i| open + i) else {
            break;
        };
        out.push_str(&rest[..open]);
        let name = &rest[open + 1..close];
        match arguments.get(name) {
            Some(value) if !value.is_null() => {
                out.push_str(&percent_encode(&value_to_string(value), |_| false));
                arguments.remove(name);
            }
            _ => out.push_str(&rest[open..=close]),
        }
        rest = &rest[close + 1..];
    }
    out.push_str(rest);
    out
}

/// `k=v` pairs joined with `&`, in argument order. Arrays are comma-joined, `null` is skipped.
fn encode_query(arguments: &JsonObject) -> String {
    let mut pairs = Vec::with_capacity(arguments.len());
    for (key, value) in arguments {
        let value = match value {
            Value::Null => continue,
            Value::Array(items) => items
                .iter()
                .map(value_to_string)
                .collect::<Vec<_>>()
                .join(","),
            other => value_to_string(other),
        };
        pairs.push(format!(
            "{}={}",
            percent_encode(key, is_list_separator),
            percent_encode(&value, is_list_separator)
        ));
    }
    pairs.join("&")
}

fn is_list_separator(b: u8) -> bool {
    b == b','
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => value.to_string(),
    }
}

/// Percent-encode everything except RFC 3986 unreserved bytes and bytes accepted by `keep`.
fn percent_encode(s: &str, keep: impl Fn(u8) -> bool) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(s.len());
    for &b in s.as_bytes() {
        if is_unreserved(b) || keep(b) {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(HEX[(b >> 4) as usize] as char);
            out.push(HEX[(b & 0x0F) as usize] as char);
        }
    }
    out
}

fn is_unreserved(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::http::UpstreamResponse;
    use crate::loader::parse_document;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use reqwest::Method;
    use reqwest::header::{CONTENT_TYPE, HeaderValue};
    use serde_json::json;

    const BASE: &str = "https://api.example.com/v1";

    const DOC: &str = r#"
openapi: "3.0.0"
info: { title: Voices, version: "1" }
paths:
  /voices/{voice_id}:
    get:
      summary: Get voice
      parameters:
        - name: voice_id
          in: path
          required: true
          schema: { type: string }
  /voices:
    get:
      summary: List voices
      parameters:
        - name: tags
          in: query
          schema: { type: array }
    post:
      summary: Add voice
  /text-to-speech/{voice_id}:
    post:
      summary: Speak
  /shared:
    get:
      summary: Shared
    delete:
      summary: Shared
"#;

    /// Records every outbound request and answers with a fixed result.
    struct RecordingHttp {
        calls: Mutex<Vec<OutboundRequest>>,
        reply: std::result::Result<Value, (u16, Value)>,
    }

    impl RecordingHttp {
        fn ok(body: Value) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                reply: Ok(body),
            })
        }

        fn failing(status: u16, body: Value) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                reply: Err((status, body)),
            })
        }

        fn calls(&self) -> Vec<OutboundRequest> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl HttpCapability for RecordingHttp {
        async fn request(&self, request: OutboundRequest) -> Result<UpstreamResponse> {
            self.calls.lock().push(request);
            match &self.reply {
                Ok(body) => Ok(UpstreamResponse {
                    status: 200,
                    body: body.clone(),
                }),
                Err((status, body)) => Err(OpenApiToolsError::UpstreamRequestFailed {
                    status: Some(*status),
                    message: format!("API returned {status}"),
                    body: Some(body.clone()),
                }),
            }
        }
    }

    fn dispatcher(http: Arc<RecordingHttp>) -> Dispatcher {
        let registry = compile(&parse_document(DOC, "test").unwrap());
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Dispatcher::new(Arc::new(registry), BASE, headers, http)
    }

    fn args(value: Value) -> JsonObject {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn id(s: &str) -> ToolSelector {
        ToolSelector::Id(s.to_string())
    }

    fn text_of(result: &CallToolResult) -> String {
        result.content[0]
            .as_text()
            .map(|t| t.text.clone())
            .expect("text content")
    }

    #[test]
    fn base_url_gets_exactly_one_trailing_slash() {
        let http = RecordingHttp::ok(json!({}));
        let registry = Arc::new(Registry::new());
        for base in ["https://h/v1", "https://h/v1/", "https://h/v1///"] {
            let d = Dispatcher::new(registry.clone(), base, HeaderMap::new(), http.clone());
            assert_eq!(d.base_url(), "https://h/v1/");
        }
    }

    #[tokio::test]
    async fn get_path_param_is_sent_as_query_without_substitution() {
        let http = RecordingHttp::ok(json!({"voice_id": "abc", "name": "Rachel"}));
        let d = dispatcher(http.clone());

        let result = d
            .dispatch(&id("GET-voices--voice-id-"), args(json!({"voice_id": "abc"})))
            .await
            .unwrap();

        let calls = http.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, Method::GET);
        // Identifier recovery turns every '-' into '/'.
        assert_eq!(
            calls[0].url.as_str(),
            "https://api.example.com/v1/voices//voice/id/?voice_id=abc"
        );
        assert!(calls[0].body.is_none());
        assert_eq!(calls[0].headers.get(CONTENT_TYPE).unwrap(), "application/json");

        assert_eq!(result.is_error, Some(false));
        assert_eq!(
            text_of(&result),
            serde_json::to_string_pretty(&json!({"voice_id": "abc", "name": "Rachel"})).unwrap()
        );
    }

    #[tokio::test]
    async fn exact_recovery_keeps_the_template_path() {
        let http = RecordingHttp::ok(json!({}));
        let d = dispatcher(http.clone()).with_path_recovery(PathRecovery::Exact, false);

        d.dispatch(&id("GET-voices--voice-id-"), args(json!({"voice_id": "abc"})))
            .await
            .unwrap();
        assert_eq!(
            http.calls()[0].url.as_str(),
            "https://api.example.com/v1/voices/%7Bvoice_id%7D?voice_id=abc"
        );
    }

    #[tokio::test]
    async fn exact_recovery_with_substitution_fills_placeholders() {
        let http = RecordingHttp::ok(json!({}));
        let d = dispatcher(http.clone()).with_path_recovery(PathRecovery::Exact, true);

        d.dispatch(
            &id("POST-text-to-speech--voice-id-"),
            args(json!({"voice_id": "a b/c", "text": "hi"})),
        )
        .await
        .unwrap();

        let call = &http.calls()[0];
        assert_eq!(
            call.url.as_str(),
            "https://api.example.com/v1/text-to-speech/a%20b%2Fc"
        );
        assert_eq!(call.body, Some(json!({"text": "hi"})));
    }

    #[tokio::test]
    async fn hyphenated_paths_are_mangled_by_identifier_recovery() {
        let http = RecordingHttp::ok(json!({}));
        let d = dispatcher(http.clone());

        d.dispatch(&id("POST-text-to-speech--voice-id-"), args(json!({"text": "hi"})))
            .await
            .unwrap();
        assert_eq!(
            http.calls()[0].url.as_str(),
            "https://api.example.com/v1/text/to/speech//voice/id/"
        );
    }

    #[tokio::test]
    async fn array_arguments_are_comma_joined_and_nulls_dropped() {
        let http = RecordingHttp::ok(json!([]));
        let d = dispatcher(http.clone());

        d.dispatch(
            &ToolSelector::Name("List_voices".to_string()),
            args(json!({"tags": ["a", "b"], "page": 2, "skip": null, "q": "x y&z", "exact": true})),
        )
        .await
        .unwrap();

        let url = &http.calls()[0].url;
        assert_eq!(url.path(), "/v1/voices");
        assert_eq!(url.query(), Some("tags=a,b&page=2&q=x%20y%26z&exact=true"));
    }

    #[tokio::test]
    async fn post_arguments_become_the_json_body() {
        let http = RecordingHttp::ok(json!({"created": true}));
        let d = dispatcher(http.clone());

        d.dispatch(&id("POST-voices"), args(json!({"name": "x"})))
            .await
            .unwrap();

        let call = &http.calls()[0];
        assert_eq!(call.method, Method::POST);
        assert_eq!(call.url.as_str(), "https://api.example.com/v1/voices");
        assert!(call.url.query().is_none());
        assert_eq!(call.body, Some(json!({"name": "x"})));
    }

    #[tokio::test]
    async fn delete_sends_a_body_too() {
        let http = RecordingHttp::ok(json!(null));
        let d = dispatcher(http.clone());

        d.dispatch(&id("DELETE-shared"), args(json!({"force": true})))
            .await
            .unwrap();
        let call = &http.calls()[0];
        assert_eq!(call.method, Method::DELETE);
        assert_eq!(call.body, Some(json!({"force": true})));
    }

    #[tokio::test]
    async fn unknown_tool_fails_without_an_http_call() {
        let http = RecordingHttp::ok(json!({}));
        let d = dispatcher(http.clone());

        let err = d
            .dispatch(&id("DELETE-nonexistent"), JsonObject::new())
            .await
            .unwrap_err();

        match err {
            OpenApiToolsError::ToolNotFound {
                requested,
                available,
            } => {
                assert_eq!(requested, "DELETE-nonexistent");
                assert_eq!(available.len(), 6);
                assert_eq!(
                    available[0],
                    ("GET-voices--voice-id-".to_string(), "Get_voice".to_string())
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(http.calls().is_empty());
    }

    #[tokio::test]
    async fn name_resolution_picks_the_first_registered_match() {
        let http = RecordingHttp::ok(json!({}));
        let d = dispatcher(http.clone());

        d.dispatch(&ToolSelector::Name("Shared".to_string()), JsonObject::new())
            .await
            .unwrap();
        assert_eq!(http.calls()[0].method, Method::GET);
    }

    #[tokio::test]
    async fn upstream_failures_propagate_with_status_and_body() {
        let http = RecordingHttp::failing(422, json!({"detail": "bad voice"}));
        let d = dispatcher(http.clone());

        let err = d
            .dispatch(&id("POST-voices"), args(json!({"name": ""})))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OpenApiToolsError::UpstreamRequestFailed { status: Some(422), body: Some(ref b), .. }
                if b == &json!({"detail": "bad voice"})
        ));
    }

    #[test]
    fn selector_for_call_prefers_identifiers() {
        let registry = compile(&parse_document(DOC, "test").unwrap());
        assert_eq!(
            ToolSelector::for_call(&registry, "GET-voices"),
            ToolSelector::Id("GET-voices".to_string())
        );
        assert_eq!(
            ToolSelector::for_call(&registry, "List_voices"),
            ToolSelector::Name("List_voices".to_string())
        );
    }

    #[test]
    fn substitution_leaves_unknown_placeholders() {
        let mut arguments = args(json!({"a": 1, "other": "x"}));
        let path = substitute_path_params("/x/{a}/{b}", &mut arguments);
        assert_eq!(path, "/x/1/{b}");
        assert_eq!(arguments, args(json!({"other": "x"})));
    }
}
