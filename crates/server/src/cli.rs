//! Command line and config file handling.
//!
//! Precedence: flags (and their environment variables) over the `--config` file over defaults.

use crate::error::ServerError;
use crate::telemetry::LogFormat;
use clap::Parser;
use openapi_mcp_tools::config::{BridgeConfig, PathRecovery};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Parser)]
#[command(name = "openapi-mcp-server")]
#[command(version)]
#[command(about = "Serve an OpenAPI-described HTTP API as MCP tools over stdio")]
pub struct Cli {
    /// YAML or JSON config file (camelCase keys).
    #[arg(long, env = "OPENAPI_MCP_CONFIG")]
    pub config: Option<PathBuf>,

    /// OpenAPI spec location: URL (anything starting with `http`) or file path.
    #[arg(long, env = "OPENAPI_SPEC_PATH")]
    pub spec: Option<String>,

    /// Base URL for outbound calls. Defaults to the spec's first server.
    #[arg(long, env = "API_BASE_URL")]
    pub base_url: Option<String>,

    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Header carrying the API key (default `X-API-Key`).
    #[arg(long)]
    pub api_key_header: Option<String>,

    /// Extra static header, repeatable. The value may contain commas.
    #[arg(long = "header", value_name = "NAME:VALUE")]
    pub headers: Vec<HeaderArg>,

    /// Comma-separated `NAME:VALUE` list, applied before `--header`.
    #[arg(long, env = "API_HEADERS", value_name = "LIST")]
    pub api_headers: Option<HeaderList>,

    #[arg(long, env = "SERVER_NAME")]
    pub server_name: Option<String>,

    #[arg(long, env = "SERVER_VERSION")]
    pub server_version: Option<String>,

    /// `identifier` (recover the route from the tool identifier) or `exact`.
    #[arg(long)]
    pub path_recovery: Option<PathRecovery>,

    /// Fill `{param}` placeholders from arguments (requires `--path-recovery exact`).
    /// Bare flag means `true`; `--substitute-path-params=false` overrides the config file.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    pub substitute_path_params: Option<bool>,

    /// Per-request timeout in seconds (0 = none).
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Tracing filter, e.g. `debug` or `openapi_mcp_tools=trace`. Overrides `RUST_LOG`.
    #[arg(long)]
    pub log_level: Option<String>,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// `NAME:VALUE` header argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderArg {
    pub name: String,
    pub value: String,
}

impl FromStr for HeaderArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, value) = s
            .split_once(':')
            .ok_or_else(|| format!("invalid header '{s}': expected NAME:VALUE"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("invalid header '{s}': empty name"));
        }
        Ok(Self {
            name: name.to_string(),
            value: value.trim().to_string(),
        })
    }
}

/// `API_HEADERS` list: `NAME:VALUE[,NAME:VALUE...]`.
///
/// A segment without `:` continues the previous value, so `Accept:a/b,c/d` is one header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderList(pub Vec<HeaderArg>);

impl FromStr for HeaderList {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut headers: Vec<HeaderArg> = Vec::new();
        for segment in s.split(',') {
            if segment.trim().is_empty() {
                continue;
            }
            match headers.last_mut() {
                Some(prev) if !segment.contains(':') => {
                    prev.value.push(',');
                    prev.value.push_str(segment.trim());
                }
                _ => headers.push(segment.parse()?),
            }
        }
        Ok(Self(headers))
    }
}

impl Cli {
    /// Merge the config file (if any) with command line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or if no spec location is
    /// configured anywhere.
    pub fn resolve_config(&self) -> Result<BridgeConfig, ServerError> {
        let mut config = match &self.config {
            Some(path) => load_config_file(path)?,
            None => BridgeConfig::default(),
        };
        self.apply_overrides(&mut config);

        if config.spec.trim().is_empty() {
            return Err(ServerError::MissingSpec);
        }
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut BridgeConfig) {
        if let Some(spec) = &self.spec {
            config.spec.clone_from(spec);
        }
        if let Some(base_url) = &self.base_url {
            config.base_url = Some(base_url.clone());
        }
        if let Some(api_key) = &self.api_key {
            config.api_key = Some(api_key.clone());
        }
        if let Some(header) = &self.api_key_header {
            config.api_key_header.clone_from(header);
        }
        let from_env = self.api_headers.iter().flat_map(|list| &list.0);
        for h in from_env.chain(&self.headers) {
            config.headers.insert(h.name.clone(), h.value.clone());
        }
        if let Some(name) = &self.server_name {
            config.name.clone_from(name);
        }
        if let Some(version) = &self.server_version {
            config.version.clone_from(version);
        }
        if let Some(mode) = self.path_recovery {
            config.path_recovery = mode;
        }
        if let Some(on) = self.substitute_path_params {
            config.substitute_path_params = on;
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout_secs = Some(secs);
        }
    }
}

fn load_config_file(path: &std::path::Path) -> Result<BridgeConfig, ServerError> {
    let text = std::fs::read_to_string(path).map_err(|e| ServerError::ConfigRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_yaml::from_str(&text).map_err(|e| ServerError::ConfigParse {
        path: path.to_path_buf(),
        source: e,
    })
}
