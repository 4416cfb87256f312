use std::future::ready;

use archer_core::tool::{Tool, ToolResult};
use chrono::{SecondsFormat, Utc};
use serde_json::Value;

/// A tool that tells the current UTC time.
#[derive(Clone, Copy, Debug, Default)]
pub struct TimeTool;

impl TimeTool {
    /// Creates a new time tool.
    #[inline]
    pub fn new() -> Self {
        TimeTool
    }
}

impl Tool for TimeTool {
    type Input = ();

    fn name(&self) -> &str {
        "time_tool"
    }

    fn description(&self) -> &str {
        "Returns the current date and time in UTC (RFC 3339)."
    }

    fn parameters(&self) -> Option<&Value> {
        None
    }

    fn execute(
        &self,
        _input: (),
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        ready(Ok(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)))
    }
}
