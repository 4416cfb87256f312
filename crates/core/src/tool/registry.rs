use std::fmt::{self, Debug};
use std::sync::Arc;

use super::object::{ToolObject, ToolObjectImpl};
use super::{InvocationStyle, Tool};
use crate::schema::{FunctionSchema, SchemaError};

/// A registered tool together with its validated schema.
#[derive(Clone)]
pub(crate) struct Entry {
    pub tool: Arc<dyn ToolObject>,
    pub schema: Arc<FunctionSchema>,
    pub style: InvocationStyle,
}

/// The set of tools an agent may call, in registration order.
///
/// Names are unique: adding a tool whose name is already taken replaces
/// the previous one in place.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    entries: Vec<Entry>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool, building and validating its schema.
    pub fn add<T: Tool>(&mut self, tool: T) -> Result<(), SchemaError> {
        let tool = ToolObjectImpl(tool);
        let schema = FunctionSchema::from_declaration(
            tool.name(),
            tool.description(),
            tool.parameters(),
        )?;
        let style = if schema.has_parameters() {
            tool.invocation_style()
        } else {
            InvocationStyle::NoArgs
        };

        let entry = Entry {
            tool: Arc::new(tool),
            schema: Arc::new(schema),
            style,
        };
        let name = entry.schema.name();
        match self.entries.iter().position(|e| e.schema.name() == name) {
            Some(index) => {
                debug!("replacing tool `{name}`");
                self.entries[index] = entry;
            }
            None => {
                debug!("registered tool `{name}` ({style:?})");
                self.entries.push(entry);
            }
        }
        Ok(())
    }

    /// Removes a tool by name. Returns `false` if there was none.
    pub fn remove(&mut self, name: &str) -> bool {
        let len = self.entries.len();
        self.entries.retain(|e| e.schema.name() != name);
        self.entries.len() != len
    }

    /// Returns the schema of the tool with exactly this name.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&FunctionSchema> {
        self.entry(name).map(|e| e.schema.as_ref())
    }

    /// Returns the schemas of all tools, in registration order.
    pub fn schemas(&self) -> impl Iterator<Item = &FunctionSchema> {
        self.entries.iter().map(|e| e.schema.as_ref())
    }

    /// Returns the number of tools.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no tool is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entry(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.schema.name() == name)
    }
}

impl Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| e.schema.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::tool::{FnTool, ToolResult};

    async fn ok(_args: serde_json::Value) -> ToolResult {
        Ok("ok".to_owned())
    }

    #[test]
    fn test_add_replace_remove() {
        let mut registry = ToolRegistry::new();
        registry
            .add(
                FnTool::new("search", "Searches.", ok)
                    .with_parameters(json!({ "query": "query:str" })),
            )
            .unwrap();
        registry.add(FnTool::new("time_tool", "Time.", ok)).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.entry("time_tool").unwrap().style, InvocationStyle::NoArgs);
        assert_eq!(registry.entry("search").unwrap().style, InvocationStyle::Keyword);

        // Replacing keeps the position.
        registry
            .add(FnTool::new("search", "Searches better.", ok))
            .unwrap();
        let names: Vec<_> = registry.schemas().map(|s| s.name()).collect();
        assert_eq!(names, ["search", "time_tool"]);
        assert_eq!(registry.get("search").unwrap().description(), "Searches better.");

        // Lookup is exact.
        assert!(registry.get("Search").is_none());

        assert!(registry.remove("search"));
        assert!(!registry.remove("search"));
        assert_eq!(registry.len(), 1);
        assert_eq!(format!("{registry:?}"), r#"["time_tool"]"#);
    }

    #[test]
    fn test_invalid_tools_are_rejected() {
        let mut registry = ToolRegistry::new();
        let err = registry
            .add(FnTool::new("llm_tool", "Shadowing the sentinel.", ok))
            .unwrap_err();
        assert!(matches!(err, SchemaError::ReservedName(_)));

        let err = registry
            .add(
                FnTool::new("pick", "Picks.", ok)
                    .with_parameters(json!({ "color": { "type": "enum" } })),
            )
            .unwrap_err();
        assert!(matches!(err, SchemaError::MissingEnumOptions { .. }));
        assert!(registry.is_empty());
    }
}
