use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use archer_core::tool::{Error as ToolError, Tool, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use tokio::task::spawn_blocking;

const MAX_LINES: usize = 50;

#[derive(Deserialize, JsonSchema)]
pub struct ReadFileParameters {
    #[schemars(description = "Absolute path to the file.")]
    path: String,
    #[schemars(description = "1-based start line to read from, default to 1.")]
    #[serde(default)]
    start_line: Option<usize>,
}

/// A tool for reading file content with line numbers.
pub struct ReadFileTool {
    parameters: Value,
}

impl ReadFileTool {
    /// Creates a new read file tool.
    #[inline]
    pub fn new() -> Self {
        ReadFileTool {
            parameters: schema_for!(ReadFileParameters).to_value(),
        }
    }
}

impl Default for ReadFileTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for ReadFileTool {
    type Input = ReadFileParameters;

    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Reads a file from an absolute path and returns up to 50 lines of it, \
         prefixed with line numbers, starting at a 1-based start line."
    }

    fn parameters(&self) -> Option<&Value> {
        Some(&self.parameters)
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: ReadFileParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        async move {
            if !Path::new(&input.path).is_absolute() {
                return Err(ToolError::invalid_input()
                    .with_reason("`path` must be absolute"));
            }
            let start_line = input.start_line.unwrap_or(1);
            if start_line == 0 {
                return Err(ToolError::invalid_input()
                    .with_reason("`start_line` must be 1-based"));
            }

            spawn_blocking(move || read_file_section(&input.path, start_line))
                .await
                .map_err(|_| {
                    ToolError::execution_error()
                        .with_reason("Failed to read file")
                })?
        }
    }
}

fn read_file_section(
    path: &str,
    start_line: usize,
) -> Result<String, ToolError> {
    let file = File::open(path)?;
    format_reader_section(path, file, start_line)
}

fn format_reader_section<R: Read>(
    path: &str,
    reader: R,
    start_line: usize,
) -> Result<String, ToolError> {
    let mut lines = Vec::with_capacity(MAX_LINES);
    for line in BufReader::new(reader)
        .lines()
        .skip(start_line - 1)
        .take(MAX_LINES)
    {
        lines.push(line?);
    }

    let mut result = format!("==> {path} <==\n");
    if let Some(last_offset) = lines.len().checked_sub(1) {
        let width = (start_line + last_offset).to_string().len();
        for (offset, line) in lines.iter().enumerate() {
            let line_no = start_line + offset;
            let _ = writeln!(result, "{line_no:>width$}: {line}");
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_read_file_section_formats_lines() {
        let input = b"first\nsecond\nthird\n";

        let output =
            format_reader_section("/fake/path", Cursor::new(input), 2).unwrap();
        let mut output_lines = output.lines();

        assert_eq!(output_lines.next().unwrap(), "==> /fake/path <==");
        assert_eq!(output_lines.next().unwrap(), "2: second");
        assert_eq!(output_lines.next().unwrap(), "3: third");
        assert_eq!(output_lines.next(), None);
    }

    #[test]
    fn test_read_file_section_respects_limit() {
        let mut input = Vec::new();
        for _ in 0..(MAX_LINES + 10) {
            input.extend_from_slice(b"line\n");
        }

        let output =
            format_reader_section("/fake/path", Cursor::new(input), 1).unwrap();
        let lines = output.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), MAX_LINES + 1);
        assert_eq!(lines[MAX_LINES], "50: line");
    }

    #[test]
    fn test_schema_is_accepted() {
        let tool = ReadFileTool::new();
        let schema = archer_core::FunctionSchema::from_declaration(
            tool.name(),
            tool.description(),
            tool.parameters(),
        )
        .unwrap();
        assert!(schema.param("path").unwrap().required);
        assert!(!schema.param("start_line").unwrap().required);
    }

    #[tokio::test]
    async fn test_input_validation() {
        let tool = ReadFileTool::new();
        let result = tool
            .execute(ReadFileParameters {
                path: "relative/file.txt".to_owned(),
                start_line: None,
            })
            .await;
        assert!(result.is_err());

        let result = tool
            .execute(ReadFileParameters {
                path: "/etc/hostname".to_owned(),
                start_line: Some(0),
            })
            .await;
        assert!(result.is_err());
    }
}
