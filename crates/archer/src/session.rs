use archer_core::{Agent, AgentBuilder, SchemaError};
use archer_model::ModelProvider;

use crate::tools::*;

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    agent_builder: AgentBuilder,
    builtin_tools: bool,
}

impl SessionBuilder {
    /// Creates a session builder with a specified model provider.
    pub fn with_model_provider<M: ModelProvider + 'static>(
        provider: M,
    ) -> Self {
        let agent_builder = AgentBuilder::with_model_provider(provider)
            .with_name("Archer")
            .with_description(
                "a helpful assistant that can look things up with tools",
            );
        Self {
            agent_builder,
            builtin_tools: true,
        }
    }

    /// Sets the name of the agent.
    #[inline]
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.agent_builder = self.agent_builder.with_name(name);
        self
    }

    /// Sets the description of the agent.
    #[inline]
    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.agent_builder = self.agent_builder.with_description(description);
        self
    }

    /// Sets the expected answer format.
    #[inline]
    pub fn with_output_style<S: Into<String>>(mut self, style: S) -> Self {
        self.agent_builder = self.agent_builder.with_output_style(style);
        self
    }

    /// Registers an extra tool.
    #[inline]
    pub fn with_tool<T: archer_core::Tool>(mut self, tool: T) -> Self {
        self.agent_builder = self.agent_builder.with_tool(tool);
        self
    }

    /// Leaves out the built-in tools.
    #[inline]
    pub fn without_builtin_tools(mut self) -> Self {
        self.builtin_tools = false;
        self
    }

    /// Builds a new session.
    pub fn build(self) -> Result<Session, SchemaError> {
        let mut agent_builder = self.agent_builder;
        if self.builtin_tools {
            agent_builder = agent_builder
                .with_tool(TimeTool::new())
                .with_tool(ReadFileTool::new())
                .with_tool(GlobTool::new());
        }
        let agent = agent_builder.build()?;
        Ok(Session { agent })
    }
}

/// A chat session, like a window that displays messages and has a input box.
///
/// The session holds a fully configured agent that you can use directly, and it
/// is basically a wrapper around [`Agent`]. Every line is an independent task.
pub struct Session {
    agent: Agent,
}

impl Session {
    /// Runs a line of user input as a task and returns the answer.
    #[inline]
    pub async fn ask(&mut self, line: &str) -> String {
        self.agent.run_task(line.trim()).await
    }

    /// Returns the underlying agent.
    #[inline]
    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Returns the underlying agent mutably, e.g. to add tools.
    #[inline]
    pub fn agent_mut(&mut self) -> &mut Agent {
        &mut self.agent
    }
}

#[cfg(test)]
mod tests {
    use archer_model::ModelMessage;
    use archer_test_model::TestModelProvider;

    use super::*;

    #[tokio::test]
    async fn test_ask_with_builtin_tools() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_text_response(
            r#"{"func_calling": [{"tool_name": "time_tool", "parameter": ""}]}"#,
        );
        model_provider.add_text_response("It is late.");

        let mut session =
            SessionBuilder::with_model_provider(model_provider.clone())
                .build()
                .unwrap();
        let names: Vec<_> =
            session.agent().tools().schemas().map(|s| s.name()).collect();
        assert_eq!(names, ["time_tool", "read_file", "glob"]);

        assert_eq!(session.ask("  What time is it?\n").await, "It is late.");

        let requests = model_provider.requests();
        let Some(ModelMessage::User(input)) = requests[1].messages.last()
        else {
            panic!("expected a summarizing input");
        };
        assert!(input.starts_with("[QUERY]\nWhat time is it?\n\n[TOOLS]\n"));
        assert!(input.contains("\"time_tool\":\""));
    }

    #[tokio::test]
    async fn test_without_builtin_tools() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_text_response("Hello there.");

        let mut session = SessionBuilder::with_model_provider(model_provider)
            .without_builtin_tools()
            .build()
            .unwrap();
        assert!(session.agent().tools().is_empty());
        assert_eq!(session.ask("Hi").await, "Hello there.");
    }
}
