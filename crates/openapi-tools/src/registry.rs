//! Compiled tool registry.
//!
//! The registry is built once by [`crate::compiler::compile`] and is read-only afterwards; the
//! dispatcher shares it behind an `Arc`. Iteration order is insertion order, which is what
//! makes name resolution (first match wins) deterministic.

use crate::naming::{Route, ToolId};
use indexmap::IndexMap;
use rmcp::model::{JsonObject, Tool};
use serde_json::{Value, json};
use std::sync::Arc;

/// Default primitive type for parameters that do not declare one.
pub const DEFAULT_PARAMETER_TYPE: &str = "string";

/// One compiled tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    /// Display name (not unique).
    pub name: String,
    pub description: String,
    pub input_contract: InputContract,
    /// The exact method + path template this tool was compiled from.
    pub route: Route,
}

/// Object-shaped input schema built from an operation's declared parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputContract {
    pub properties: IndexMap<String, PropertySpec>,
    /// `None` until at least one required parameter has been seen.
    pub required: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySpec {
    pub kind: String,
    pub description: String,
}

impl InputContract {
    pub(crate) fn insert_property(&mut self, name: &str, spec: PropertySpec, required: bool) {
        self.properties.insert(name.to_string(), spec);
        if required {
            let names = self.required.get_or_insert_with(Vec::new);
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }

    /// JSON Schema form advertised in `tools/list`.
    #[must_use]
    pub fn to_json_schema(&self) -> JsonObject {
        let properties: serde_json::Map<String, Value> = self
            .properties
            .iter()
            .map(|(name, spec)| {
                (
                    name.clone(),
                    json!({ "type": spec.kind, "description": spec.description }),
                )
            })
            .collect();

        let mut schema = JsonObject::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        if let Some(required) = &self.required {
            schema.insert("required".to_string(), json!(required));
        }
        schema
    }
}

/// Tool identifier -> descriptor, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    tools: IndexMap<ToolId, ToolDescriptor>,
    title: Option<String>,
    version: Option<String>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_document_info(&mut self, title: Option<String>, version: Option<String>) {
        self.title = title;
        self.version = version;
    }

    /// Insert a descriptor. An existing entry with the same identifier is replaced in place
    /// (keeping its position) and returned.
    pub fn insert(&mut self, id: ToolId, descriptor: ToolDescriptor) -> Option<ToolDescriptor> {
        self.tools.insert(id, descriptor)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ToolDescriptor> {
        self.tools.get(id)
    }

    #[must_use]
    pub fn get_key_value(&self, id: &str) -> Option<(&ToolId, &ToolDescriptor)> {
        self.tools.get_key_value(id)
    }

    #[must_use]
    pub fn contains_id(&self, id: &str) -> bool {
        self.tools.contains_key(id)
    }

    /// First descriptor (in registry order) whose name equals `name`.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<(&ToolId, &ToolDescriptor)> {
        self.tools.iter().find(|(_, d)| d.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ToolId, &ToolDescriptor)> {
        self.tools.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Every `(identifier, name)` pair, used for "tool not found" diagnostics.
    #[must_use]
    pub fn id_name_pairs(&self) -> Vec<(String, String)> {
        self.tools
            .iter()
            .map(|(id, d)| (id.to_string(), d.name.clone()))
            .collect()
    }

    /// `info.title` of the compiled document, if any.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// The MCP `Tool`s exposed by this registry, in registry order.
    #[must_use]
    pub fn list_tools(&self) -> Vec<Tool> {
        self.tools
            .values()
            .map(|d| {
                let mut tool = Tool::new(
                    d.name.clone(),
                    d.description.clone(),
                    Arc::new(d.input_contract.to_json_schema()),
                );
                tool.annotations = Some(crate::semantics::annotations_for_method(&d.route.method));
                tool
            })
            .collect()
    }
}
