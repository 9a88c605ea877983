//! Shared fixtures for the bridge's tests: a local HTTP upstream that echoes requests back.

use anyhow::Context as _;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse as _, Response};
use axum::routing::any;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// One request as seen by [`EchoUpstream`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Raw (still percent-encoded) request path.
    pub path: String,
    pub query: Option<String>,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl RecordedRequest {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Body parsed as JSON, `None` when empty or not JSON.
    #[must_use]
    pub fn json_body(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}

#[derive(Debug, Clone)]
struct Fixture {
    status: StatusCode,
    content_type: &'static str,
    body: String,
}

#[derive(Default)]
struct Shared {
    fixtures: HashMap<String, Fixture>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Builder for [`EchoUpstream`].
#[derive(Default)]
pub struct EchoUpstreamBuilder {
    fixtures: HashMap<String, Fixture>,
}

impl EchoUpstreamBuilder {
    /// Serve `body` as JSON with `status` for requests to exactly `path`.
    #[must_use]
    pub fn json(mut self, path: &str, status: u16, body: &Value) -> Self {
        self.fixtures.insert(
            path.to_string(),
            Fixture {
                status: StatusCode::from_u16(status).unwrap_or(StatusCode::OK),
                content_type: "application/json",
                body: body.to_string(),
            },
        );
        self
    }

    /// Serve `body` as plain text with `status` for requests to exactly `path`.
    #[must_use]
    pub fn text(mut self, path: &str, status: u16, body: &str) -> Self {
        self.fixtures.insert(
            path.to_string(),
            Fixture {
                status: StatusCode::from_u16(status).unwrap_or(StatusCode::OK),
                content_type: "text/plain; charset=utf-8",
                body: body.to_string(),
            },
        );
        self
    }

    /// Bind an ephemeral localhost port and start serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start(self) -> anyhow::Result<EchoUpstream> {
        let shared = Arc::new(Shared {
            fixtures: self.fixtures,
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/", any(handle))
            .route("/{*path}", any(handle))
            .with_state(Arc::clone(&shared));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind echo upstream")?;
        let addr = listener.local_addr().context("echo upstream local_addr")?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });
        let handle = tokio::spawn(async move {
            let _ = server.await;
        });

        Ok(EchoUpstream {
            base_url: format!("http://{addr}"),
            shared,
            shutdown: Some(shutdown_tx),
            handle,
        })
    }
}

/// Local HTTP server that records every request and answers with either a configured fixture
/// or a JSON echo: `{ method, path, query, headers, body }`.
///
/// Shuts down when dropped.
pub struct EchoUpstream {
    base_url: String,
    shared: Arc<Shared>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl EchoUpstream {
    #[must_use]
    pub fn builder() -> EchoUpstreamBuilder {
        EchoUpstreamBuilder::default()
    }

    /// Start an upstream with no fixtures (every path echoes).
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start() -> anyhow::Result<Self> {
        Self::builder().start().await
    }

    /// `http://127.0.0.1:<port>` (no trailing slash).
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for `path` on this upstream.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.shared.requests.lock().clone()
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        self.shared.requests.lock().len()
    }
}

impl Drop for EchoUpstream {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.abort();
    }
}

async fn handle(
    State(shared): State<Arc<Shared>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let recorded = RecordedRequest {
        method: method.as_str().to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers: headers
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
            .collect(),
        body: String::from_utf8_lossy(&body).into_owned(),
    };
    shared.requests.lock().push(recorded.clone());

    if let Some(fixture) = shared.fixtures.get(uri.path()) {
        return (
            fixture.status,
            [(header::CONTENT_TYPE, fixture.content_type)],
            fixture.body.clone(),
        )
            .into_response();
    }

    axum::Json(json!({
        "method": recorded.method,
        "path": recorded.path,
        "query": recorded.query,
        "headers": recorded.headers,
        "body": recorded.json_body().unwrap_or(Value::String(recorded.body.clone())),
    }))
    .into_response()
}
