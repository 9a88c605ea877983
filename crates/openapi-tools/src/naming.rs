//! Tool identifiers and tool names.
//!
//! A [`ToolId`] is the registry key: `METHOD-path` with the leading slash dropped and every
//! character outside `[A-Za-z0-9-]` replaced by `-`. It doubles as an encoding of the route,
//! but a lossy one: `/`, `-`, `_`, `{` and `}` all collapse to `-`, so
//! [`ToolId::reconstruct`] can only recover the original path when it had none of them
//! except `/`.
//!
//! A tool name is the human-facing label: the operation summary (or `METHOD_path`), limited to
//! `[A-Za-z0-9_-]` with single underscores, at most [`MAX_TOOL_NAME_LEN`] characters. Names are
//! not unique.

use reqwest::Method;
use std::borrow::Borrow;
use std::fmt;

/// Upper bound on tool name length (MCP clients commonly reject longer names).
pub const MAX_TOOL_NAME_LEN: usize = 64;

/// Stable registry key derived from an operation's method and path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ToolId(String);

/// HTTP method + path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub method: Method,
    pub path: String,
}

impl ToolId {
    /// Derive the identifier for `method` + `path`.
    #[must_use]
    pub fn derive(method: &str, path: &str) -> Self {
        let path = path.strip_prefix('/').unwrap_or(path);
        let raw = format!("{}-{}", method.to_uppercase(), path);
        let sanitized = raw
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        Self(sanitized)
    }

    /// Wrap an identifier received from a caller without re-deriving it.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Best-effort inverse of [`ToolId::derive`].
    ///
    /// The method is everything before the first `-`; every remaining `-` becomes `/`. Returns
    /// `None` when there is no separator or the method is not a valid HTTP token.
    #[must_use]
    pub fn reconstruct(&self) -> Option<Route> {
        let (method, rest) = self.0.split_once('-')?;
        let method = Method::from_bytes(method.as_bytes()).ok()?;
        Some(Route {
            method,
            path: format!("/{}", rest.replace('-', "/")),
        })
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ToolId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ToolId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Synthesized name used when an operation has no summary: `GET_/pets/{id}` style.
#[must_use]
pub fn synthesized_name(method: &str, path: &str) -> String {
    format!("{}_{}", method.to_uppercase(), path.replace('/', "_"))
}

/// Tool name for an operation: its summary when present and non-empty, otherwise the
/// synthesized `METHOD_path` form, sanitized either way.
#[must_use]
pub fn tool_name(summary: Option<&str>, method: &str, path: &str) -> String {
    match summary.filter(|s| !s.is_empty()) {
        Some(summary) => sanitize_tool_name(summary),
        None => sanitize_tool_name(&synthesized_name(method, path)),
    }
}

/// Restrict `raw` to `[A-Za-z0-9_-]`, collapse `_` runs and truncate.
#[must_use]
pub fn sanitize_tool_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len().min(MAX_TOOL_NAME_LEN * 2));
    for c in raw.chars() {
        let c = if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            c
        } else {
            '_'
        };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    // Only ASCII remains, so byte truncation is char-safe.
    out.truncate(MAX_TOOL_NAME_LEN);
    out
}
