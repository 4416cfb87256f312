use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use archer_core::tool::{Error as ToolError, Tool, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use tokio::task::spawn_blocking;

const MAX_ENTRIES: usize = 50;

#[derive(Deserialize, JsonSchema)]
pub struct GlobToolParameters {
    #[schemars(description = "The glob pattern, must be relative to `path`.")]
    pattern: String,
    #[schemars(description = "Absolute path to search in.")]
    path: String,
}

/// A tool for finding files using glob patterns.
pub struct GlobTool {
    parameters: Value,
}

impl GlobTool {
    /// Creates a new glob tool.
    #[inline]
    pub fn new() -> Self {
        GlobTool {
            parameters: schema_for!(GlobToolParameters).to_value(),
        }
    }
}

impl Default for GlobTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for GlobTool {
    type Input = GlobToolParameters;

    fn name(&self) -> &str {
        "glob"
    }

    fn description(&self) -> &str {
        "Finds files and directories using glob patterns. Supports standard \
         glob syntax like *, ? and ** for recursive searches, and lists at \
         most 50 entries."
    }

    fn parameters(&self) -> Option<&Value> {
        Some(&self.parameters)
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: GlobToolParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        async move {
            if Path::new(&input.pattern).is_absolute() {
                return Err(ToolError::invalid_input()
                    .with_reason("`pattern` must be relative to `path`"));
            }
            if !Path::new(&input.path).is_absolute() {
                return Err(ToolError::invalid_input()
                    .with_reason("`path` must be absolute"));
            }

            let mut pattern = input.path;
            if !pattern.ends_with('/') {
                pattern.push('/');
            }
            pattern.push_str(&input.pattern);
            let paths = glob::glob(&pattern).map_err(|err| {
                ToolError::execution_error().with_reason(err.to_string())
            })?;

            spawn_blocking(move || list_matches(paths.flatten()))
                .await
                .map_err(|_| {
                    ToolError::execution_error()
                        .with_reason("Failed to execute glob")
                })
        }
    }
}

fn list_matches<I: Iterator<Item = PathBuf>>(paths: I) -> String {
    let mut paths = paths.peekable();
    if paths.peek().is_none() {
        return "No matches.".to_owned();
    }

    let mut result = String::new();
    for path in paths.by_ref().take(MAX_ENTRIES) {
        result.push_str(&path.to_string_lossy());
        result.push('\n');
    }
    if paths.next().is_some() {
        let _ = writeln!(result, "(only the first {MAX_ENTRIES} entries)");
    }
    result
}
