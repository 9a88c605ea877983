//! OpenAPI -> MCP tool bridge.
//!
//! The crate has two halves that run in order:
//! - the compiler (`document`, `loader`, `naming`, `compiler`) turns an `OpenAPI` document into
//!   an immutable [`registry::Registry`] of tool descriptors, once, at startup;
//! - the dispatcher (`dispatcher`, `http`) resolves `tools/call` requests against that registry
//!   and performs exactly one outbound HTTP call per invocation.
//!
//! [`runtime::OpenApiBridge`] wires both halves together from a [`config::BridgeConfig`].
//! MCP transport (stdio framing) lives in the server crate.

pub mod compiler;
pub mod config;
pub mod dispatcher;
pub mod document;
pub mod error;
pub mod http;
pub mod loader;
pub mod naming;
pub mod registry;
pub mod runtime;
pub mod semantics;
