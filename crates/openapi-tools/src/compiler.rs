//! `OpenAPI` document -> tool registry.

use crate::document::{ApiDocument, Operation};
use crate::naming::{Route, ToolId, tool_name};
use crate::registry::{DEFAULT_PARAMETER_TYPE, InputContract, PropertySpec, Registry, ToolDescriptor};
use reqwest::Method;

/// Compile every operation of `document` into a [`Registry`].
///
/// Operations are visited in document order. Operations that cannot be read (malformed
/// operation object, method key that is not an HTTP token) are skipped with a warning. When two
/// operations map to the same identifier the later one replaces the earlier one.
#[must_use]
pub fn compile(document: &ApiDocument) -> Registry {
    let mut registry = Registry::new();
    registry.set_document_info(
        document.title().map(str::to_string),
        document.version().map(str::to_string),
    );

    for (path, method, value) in document.operations() {
        let operation: Operation = match serde_yaml::from_value(value.clone()) {
            Ok(op) => op,
            Err(e) => {
                tracing::warn!(
                    "Skipping {} {}: unreadable operation: {}",
                    method.to_uppercase(),
                    path,
                    e
                );
                continue;
            }
        };

        let Some(route) = route_for(method, path) else {
            tracing::warn!(
                "Skipping {} {}: '{}' is not a valid HTTP method",
                method.to_uppercase(),
                path,
                method
            );
            continue;
        };

        let id = ToolId::derive(method, path);
        let descriptor = compile_operation(&operation, route);

        if let Some(previous) = registry.insert(id.clone(), descriptor) {
            tracing::warn!(
                tool_id = %id,
                replaced = %previous.name,
                "tool identifier collision; later operation overwrites earlier one"
            );
        }
    }

    tracing::debug!(tools = registry.len(), "compiled OpenAPI operations");
    registry
}

fn route_for(method: &str, path: &str) -> Option<Route> {
    let method = Method::from_bytes(method.to_uppercase().as_bytes()).ok()?;
    Some(Route {
        method,
        path: path.to_string(),
    })
}

fn compile_operation(operation: &Operation, route: Route) -> ToolDescriptor {
    let method = route.method.as_str();
    let name = tool_name(operation.summary.as_deref(), method, &route.path);
    let description = operation
        .description
        .clone()
        .unwrap_or_else(|| fallback_description(method, &route.path));

    ToolDescriptor {
        name,
        description,
        input_contract: build_input_contract(operation),
        route,
    }
}

/// Description used when an operation has none.
#[must_use]
pub fn fallback_description(method: &str, path: &str) -> String {
    format!("Make a {} request to {}", method.to_uppercase(), path)
}

fn build_input_contract(operation: &Operation) -> InputContract {
    let mut contract = InputContract::default();

    for param in &operation.parameters {
        let (Some(name), Some(_location)) = (param.name.as_deref(), param.location.as_deref())
        else {
            continue;
        };

        let spec = PropertySpec {
            kind: param
                .declared_type()
                .unwrap_or(DEFAULT_PARAMETER_TYPE)
                .to_string(),
            description: param
                .description
                .clone()
                .unwrap_or_else(|| format!("{name} parameter")),
        };
        contract.insert_property(name, spec, param.required);
    }

    contract
}
