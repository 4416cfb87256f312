use archer_model::ModelProvider;

use super::Agent;
use crate::schema::SchemaError;
use crate::session::ChatSession;
use crate::tool::{Tool, ToolDispatcher, ToolRegistry};

/// [`Agent`] builder.
pub struct AgentBuilder {
    session: ChatSession,
    name: String,
    description: String,
    output_style: String,
    task: String,
    tools: ToolRegistry,
    schema_error: Option<SchemaError>,
    dispatcher: ToolDispatcher,
}

impl AgentBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self::with_session(ChatSession::new(provider))
    }

    /// Creates a new builder around an existing session.
    #[inline]
    pub fn with_session(session: ChatSession) -> Self {
        Self {
            session,
            name: "Agent".to_owned(),
            description: "a helpful assistant".to_owned(),
            output_style: String::new(),
            task: String::new(),
            tools: ToolRegistry::new(),
            schema_error: None,
            dispatcher: ToolDispatcher::default(),
        }
    }

    /// Sets the name the agent introduces itself with.
    #[inline]
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the description of the agent.
    #[inline]
    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    /// Sets a sample or description of the expected answer format.
    #[inline]
    pub fn with_output_style<S: Into<String>>(mut self, style: S) -> Self {
        self.output_style = style.into();
        self
    }

    /// Sets the initial task.
    #[inline]
    pub fn with_task<S: Into<String>>(mut self, task: S) -> Self {
        self.task = task.into();
        self
    }

    /// Registers a tool.
    ///
    /// An invalid tool declaration makes [`build`](Self::build) fail.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        if let Err(err) = self.tools.add(tool) {
            if self.schema_error.is_none() {
                self.schema_error = Some(err);
            }
        }
        self
    }

    /// Limits how many tools run at once.
    #[inline]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.dispatcher = ToolDispatcher::new(max_concurrency);
        self
    }

    /// Builds the agent.
    pub fn build(self) -> Result<Agent, SchemaError> {
        if let Some(err) = self.schema_error {
            error!("invalid tool declaration: {err}");
            return Err(err);
        }
        Ok(Agent {
            name: self.name,
            description: self.description,
            output_style: self.output_style,
            task: self.task,
            session: self.session,
            tools: self.tools,
            dispatcher: self.dispatcher,
        })
    }
}
