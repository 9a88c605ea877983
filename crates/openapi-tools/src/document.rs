//! Lenient `OpenAPI` document model.
//!
//! Only the fields the compiler reads are modeled. Everything else (responses, components,
//! request bodies, security) is ignored, and nothing is validated: a Swagger 2.0 document
//! compiles as well as an `OpenAPI` 3.x one as long as it has a `paths` mapping.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};

/// Path item key that holds shared parameters rather than an operation.
pub const PATH_ITEM_PARAMETERS_KEY: &str = "parameters";

/// Parsed `OpenAPI` (or Swagger 2.0) document.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiDocument {
    #[serde(default)]
    pub info: Option<DocumentInfo>,

    #[serde(default)]
    pub servers: Vec<ServerEntry>,

    /// Path template -> path item. Path items stay untyped so that any method key (and any
    /// sibling key) survives parsing in document order.
    pub paths: IndexMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentInfo {
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub title: Option<String>,
    /// Unquoted YAML versions (`version: 1.0`) arrive as numbers.
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub version: Option<String>,
}

fn scalar_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_yaml::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        serde_yaml::Value::String(s) => Some(s),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }))
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerEntry {
    pub url: String,
}

/// One operation object (`paths.<path>.<method>`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Operation {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Vec<RawParameter>,
}

/// A parameter entry as written in the document.
///
/// `$ref` entries deserialize with neither `name` nor `in` and are skipped by the compiler.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawParameter {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "in", default)]
    pub location: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub schema: Option<ParameterSchema>,
    /// Swagger 2.0 puts the primitive type on the parameter itself.
    #[serde(rename = "type", default)]
    pub legacy_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParameterSchema {
    #[serde(rename = "type", default)]
    pub kind: Option<SchemaType>,
}

/// `type` is a string in `OpenAPI` 3.0 and may be a list in 3.1 (`[string, "null"]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SchemaType {
    Single(String),
    Multiple(Vec<String>),
}

impl SchemaType {
    /// The first non-`null` type name.
    #[must_use]
    pub fn primary(&self) -> Option<&str> {
        match self {
            SchemaType::Single(s) => Some(s.as_str()),
            SchemaType::Multiple(types) => types
                .iter()
                .map(String::as_str)
                .find(|t| *t != "null")
                .or_else(|| types.first().map(String::as_str)),
        }
    }
}

impl RawParameter {
    /// Declared primitive type: `schema.type`, then the Swagger 2.0 `type`.
    #[must_use]
    pub fn declared_type(&self) -> Option<&str> {
        self.schema
            .as_ref()
            .and_then(|s| s.kind.as_ref())
            .and_then(SchemaType::primary)
            .or(self.legacy_type.as_deref())
    }
}

impl ApiDocument {
    /// Iterate `(path, method, operation value)` triples in document order.
    ///
    /// Entries under the `parameters` key and entries whose value is not a mapping (`$ref`,
    /// `summary`, `servers`, ...) are not operations and are skipped.
    pub fn operations(&self) -> impl Iterator<Item = (&str, &str, &serde_yaml::Value)> {
        self.paths.iter().flat_map(|(path, item)| {
            item.as_mapping()
                .into_iter()
                .flat_map(|mapping| mapping.iter())
                .filter_map(move |(method, operation)| {
                    let method = method.as_str()?;
                    if method == PATH_ITEM_PARAMETERS_KEY || !operation.is_mapping() {
                        return None;
                    }
                    Some((path.as_str(), method, operation))
                })
        })
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.info.as_ref().and_then(|i| i.title.as_deref())
    }

    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.info.as_ref().and_then(|i| i.version.as_deref())
    }
}
