use anyhow::Context as _;
use serde_json::{Value, json};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

pub const BIN: &str = env!("CARGO_BIN_EXE_openapi-mcp-server");

/// Write `spec` into `dir` and return its path.
pub fn write_spec(dir: &Path, spec: &str) -> anyhow::Result<std::path::PathBuf> {
    let path = dir.join("openapi.yaml");
    std::fs::write(&path, spec).context("write spec")?;
    Ok(path)
}

/// Minimal MCP client speaking newline-delimited JSON-RPC to the server's stdio.
///
/// Exists only for integration tests.
pub struct McpStdioSession {
    _child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl McpStdioSession {
    pub async fn spawn(args: &[&str]) -> anyhow::Result<Self> {
        let mut child = Command::new(BIN)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .context("spawn openapi-mcp-server")?;

        let stdin = child.stdin.take().context("child stdin")?;
        let stdout = child.stdout.take().context("child stdout")?;

        let mut session = Self {
            _child: child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        };

        let init = session
            .request(
                0,
                "initialize",
                json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": { "name": "openapi-mcp-server-integration-tests", "version": "0" }
                }),
                Duration::from_secs(20),
            )
            .await?;
        anyhow::ensure!(init.get("result").is_some(), "initialize failed: {init}");

        session
            .send(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .await?;

        Ok(session)
    }

    pub async fn send(&mut self, msg: &Value) -> anyhow::Result<()> {
        let mut line = msg.to_string();
        line.push('\n');
        self.stdin
            .write_all(line.as_bytes())
            .await
            .context("write to server stdin")?;
        self.stdin.flush().await.context("flush server stdin")?;
        Ok(())
    }

    /// Send a request and wait for the response with the same id, skipping notifications.
    pub async fn request(
        &mut self,
        id: u64,
        method: &str,
        params: Value,
        timeout_dur: Duration,
    ) -> anyhow::Result<Value> {
        self.send(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        }))
        .await?;

        tokio::time::timeout(timeout_dur, async {
            loop {
                let line = self
                    .stdout
                    .next_line()
                    .await
                    .context("read server stdout")?
                    .context("server closed stdout")?;
                let msg: Value = serde_json::from_str(&line)
                    .with_context(|| format!("non-JSON line on stdout: {line}"))?;
                if msg.get("id") == Some(&json!(id)) {
                    return Ok(msg);
                }
            }
        })
        .await
        .context("timeout waiting for response")?
    }
}

/// Parse the single text block of a `tools/call` result as JSON.
pub fn tool_call_text_json(msg: &Value) -> anyhow::Result<Value> {
    let text = msg
        .get("result")
        .and_then(|r| r.get("content"))
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("text"))
        .and_then(Value::as_str)
        .context("tools/call missing result.content[0].text")?;
    serde_json::from_str(text).context("tool text is not JSON")
}
