//! MCP stdio server exposing an `OpenAPI`-described HTTP API as tools.

pub mod cli;
pub mod error;
pub mod handler;
pub mod telemetry;
