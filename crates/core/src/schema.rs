//! Normalized function-call schemas for tools.
//!
//! Tools describe their parameters with a loosely typed declaration, which
//! may come from hand-written JSON, a `schemars` schema, or the short
//! `"description:type"` strings. [`FunctionSchema::from_declaration`] turns
//! any of them into a list of [`ParamSpec`] records. Missing or unknown
//! metadata falls back to defaults with a warning; only declarations that
//! cannot be honored at all (an enum without options, a reserved name) are
//! rejected.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// The name of the built-in pseudo-tool that asks the model to answer
/// directly.
pub const RESERVED_TOOL_NAME: &str = "llm_tool";

/// Errors raised while building a tool schema.
///
/// These are construction-time errors, an agent with such a tool cannot be
/// set up.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// An `enum` parameter has no `options` list.
    #[error("parameter `{param}` of tool `{tool}` is an enum without options")]
    MissingEnumOptions {
        /// The tool being built.
        tool: String,
        /// The offending parameter.
        param: String,
    },
    /// The tool name is reserved for the direct-answer pseudo-tool.
    #[error("`{0}` is reserved for the built-in direct-answer tool")]
    ReservedName(String),
    /// The declaration is neither absent, a mapping, nor a string.
    #[error("tool `{tool}` has an unusable parameter declaration: {reason}")]
    InvalidDeclaration {
        /// The tool being built.
        tool: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// The type of a tool parameter.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// Free text.
    #[default]
    String,
    /// Any JSON number.
    Number,
    /// An integral number.
    Integer,
    /// `true` or `false`.
    Boolean,
    /// One of a fixed list of strings.
    Enum,
    /// A JSON array.
    Array,
    /// A JSON object.
    Object,
}

impl ParamType {
    /// Returns the canonical lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::Enum => "enum",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }

    /// Resolves a type name, accepting the common short spellings.
    pub fn from_alias(name: &str) -> Option<Self> {
        let ty = match name.trim().to_ascii_lowercase().as_str() {
            "string" | "str" | "text" => ParamType::String,
            "number" | "float" => ParamType::Number,
            "integer" | "int" => ParamType::Integer,
            "boolean" | "bool" => ParamType::Boolean,
            "enum" => ParamType::Enum,
            "array" | "list" => ParamType::Array,
            "object" | "dict" => ParamType::Object,
            _ => return None,
        };
        Some(ty)
    }
}

impl Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declaration of a single tool parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamSpec {
    /// The value type.
    pub ty: ParamType,
    /// What the parameter means, shown to the model.
    pub description: String,
    /// Whether the model must supply it. Defaults to `true`.
    pub required: bool,
    /// Value used by the tool when the parameter is omitted.
    pub default: Option<Value>,
    /// Allowed values, mandatory for [`ParamType::Enum`].
    pub options: Option<Vec<String>>,
}

impl ParamSpec {
    /// Creates a required parameter.
    #[inline]
    pub fn new<S: Into<String>>(ty: ParamType, description: S) -> Self {
        Self {
            ty,
            description: description.into(),
            required: true,
            default: None,
            options: None,
        }
    }

    /// Creates a required enum parameter.
    #[inline]
    pub fn enumeration<S, I, O>(description: S, options: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = O>,
        O: Into<String>,
    {
        Self {
            options: Some(options.into_iter().map(Into::into).collect()),
            ..Self::new(ParamType::Enum, description)
        }
    }

    /// Marks the parameter as optional.
    #[inline]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Sets the default value.
    #[inline]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    fn to_json_schema(&self) -> Value {
        let mut property = Map::new();
        match (self.ty, &self.options) {
            (ParamType::Enum, options) => {
                property.insert("type".to_owned(), json!("string"));
                property.insert("enum".to_owned(), json!(options));
            }
            (ty, Some(options)) => {
                property.insert("type".to_owned(), json!(ty.as_str()));
                property.insert("enum".to_owned(), json!(options));
            }
            (ty, None) => {
                property.insert("type".to_owned(), json!(ty.as_str()));
            }
        }
        property.insert("description".to_owned(), json!(self.description));
        if let Some(default) = &self.default {
            property.insert("default".to_owned(), default.clone());
        }
        Value::Object(property)
    }
}

/// A validated function-call schema: a tool name, its description and its
/// parameters in declaration order.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionSchema {
    name: String,
    description: String,
    parameters: Vec<(String, ParamSpec)>,
}

impl FunctionSchema {
    /// Creates a schema from typed parameter specs.
    ///
    /// A parameter declared twice keeps its first position and its last
    /// spec.
    pub fn new<N, D>(
        name: N,
        description: D,
        parameters: impl IntoIterator<Item = (String, ParamSpec)>,
    ) -> Result<Self, SchemaError>
    where
        N: Into<String>,
        D: Into<String>,
    {
        let name = name.into();
        if name == RESERVED_TOOL_NAME {
            return Err(SchemaError::ReservedName(name));
        }

        let mut ordered: Vec<(String, ParamSpec)> = Vec::new();
        for (param, spec) in parameters {
            let has_options =
                spec.options.as_ref().is_some_and(|opts| !opts.is_empty());
            if spec.ty == ParamType::Enum && !has_options {
                return Err(SchemaError::MissingEnumOptions {
                    tool: name,
                    param,
                });
            }
            match ordered.iter_mut().find(|(existing, _)| *existing == param) {
                Some(slot) => slot.1 = spec,
                None => ordered.push((param, spec)),
            }
        }

        Ok(Self {
            name,
            description: description.into(),
            parameters: ordered,
        })
    }

    /// Builds a schema from a loosely typed declaration.
    ///
    /// `declaration` may be absent (no parameters), a mapping from
    /// parameter names to specs, a JSON schema of an object, or a single
    /// spec string, which declares one parameter named `input`.
    pub fn from_declaration<N, D>(
        name: N,
        description: D,
        declaration: Option<&Value>,
    ) -> Result<Self, SchemaError>
    where
        N: Into<String>,
        D: Into<String>,
    {
        let name = name.into();
        let params = match declaration {
            None | Some(Value::Null) => vec![],
            Some(Value::Object(map)) if is_object_schema(map) => {
                parse_object_schema(&name, map)
            }
            Some(Value::Object(map)) => map
                .iter()
                .map(|(param, raw)| {
                    let spec = parse_param(&name, param, raw, None);
                    (param.clone(), spec)
                })
                .collect(),
            Some(raw @ Value::String(_)) => {
                vec![("input".to_owned(), parse_param(&name, "input", raw, None))]
            }
            Some(other) => {
                return Err(SchemaError::InvalidDeclaration {
                    tool: name,
                    reason: format!("expected a mapping, found `{other}`"),
                });
            }
        };
        Self::new(name, description, params)
    }

    /// Returns the tool name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the tool description.
    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the parameters in declaration order.
    #[inline]
    pub fn parameters(&self) -> &[(String, ParamSpec)] {
        &self.parameters
    }

    /// Returns `true` if the tool takes any parameter.
    #[inline]
    pub fn has_parameters(&self) -> bool {
        !self.parameters.is_empty()
    }

    /// Looks up a parameter by name.
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.parameters
            .iter()
            .find(|(param, _)| param == name)
            .map(|(_, spec)| spec)
    }

    /// Renders the parameters as a JSON schema of an object.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = vec![];
        for (param, spec) in &self.parameters {
            properties.insert(param.clone(), spec.to_json_schema());
            if spec.required {
                required.push(json!(param));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Renders the schema the way it is listed in planning prompts.
    pub fn describe(&self) -> String {
        let params = if self.has_parameters() {
            self.to_json_schema()["properties"].to_string()
        } else {
            "none".to_owned()
        };
        format!(
            "Tool Name: {} - {}\nTool Parameters: {}",
            self.name,
            self.description.trim(),
            params
        )
    }
}

fn is_object_schema(map: &Map<String, Value>) -> bool {
    map.get("type").and_then(Value::as_str) == Some("object")
        && map.get("properties").is_some_and(Value::is_object)
}

fn parse_object_schema(
    tool: &str,
    schema: &Map<String, Value>,
) -> Vec<(String, ParamSpec)> {
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let Some(properties) = schema.get("properties").and_then(Value::as_object)
    else {
        return vec![];
    };
    properties
        .iter()
        .map(|(param, raw)| {
            let is_required = required.contains(&param.as_str());
            (param.clone(), parse_param(tool, param, raw, Some(is_required)))
        })
        .collect()
}

/// Normalizes one raw parameter spec. Never fails, enum options are checked
/// later by [`FunctionSchema::new`].
fn parse_param(
    tool: &str,
    param: &str,
    raw: &Value,
    required_hint: Option<bool>,
) -> ParamSpec {
    let mut spec = match raw {
        Value::Object(fields) => parse_param_object(tool, param, fields),
        Value::String(text) => parse_param_string(tool, param, text),
        other => {
            warn!(
                "parameter `{param}` of tool `{tool}` has no type, \
                 assuming string"
            );
            ParamSpec::new(ParamType::String, synthesize_description(param, other))
        }
    };
    if let Some(required) = required_hint {
        spec.required = required;
    }
    spec
}

fn parse_param_object(
    tool: &str,
    param: &str,
    fields: &Map<String, Value>,
) -> ParamSpec {
    let declared_type = match fields.get("type") {
        Some(Value::String(name)) => Some(name.as_str()),
        // JSON schemas spell nullable types as `["string", "null"]`.
        Some(Value::Array(names)) => names
            .iter()
            .filter_map(Value::as_str)
            .find(|name| *name != "null"),
        _ => None,
    };
    let ty = match declared_type.and_then(ParamType::from_alias) {
        Some(ty) => ty,
        None => {
            warn!(
                "parameter `{param}` of tool `{tool}` has an unknown type \
                 {declared_type:?}, assuming string"
            );
            ParamType::String
        }
    };

    let description = match fields.get("description").and_then(Value::as_str) {
        Some(text) if !text.trim().is_empty() => text.to_owned(),
        _ => synthesize_description(param, &Value::Object(fields.clone())),
    };

    let required = match fields.get("required") {
        None => true,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(flag)) if flag.eq_ignore_ascii_case("false") => false,
        Some(Value::String(flag)) if flag.eq_ignore_ascii_case("true") => true,
        Some(other) => {
            warn!(
                "`required` of parameter `{param}` in tool `{tool}` is not a \
                 flag ({other}), treating it as required"
            );
            true
        }
    };

    let options = fields
        .get("options")
        .or_else(|| fields.get("enum"))
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .map(|value| match value {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                })
                .collect()
        });

    ParamSpec {
        ty,
        description,
        required,
        default: fields.get("default").cloned(),
        options,
    }
}

/// Parses the `"description:type"` shorthand.
fn parse_param_string(tool: &str, param: &str, text: &str) -> ParamSpec {
    let (description, ty) = match text.rsplit_once(':') {
        Some((head, tail)) => match ParamType::from_alias(tail) {
            Some(ty) => (head.trim(), Some(ty)),
            None => (text.trim(), None),
        },
        None => (text.trim(), None),
    };
    let ty = ty.unwrap_or_else(|| {
        warn!("parameter `{param}` of tool `{tool}` has no type, assuming string");
        ParamType::String
    });
    let description = if description.is_empty() {
        synthesize_description(param, &Value::String(text.to_owned()))
    } else {
        description.to_owned()
    };
    ParamSpec::new(ty, description)
}

fn synthesize_description(param: &str, raw: &Value) -> String {
    format!("`{param}`, declared as {raw}")
}
