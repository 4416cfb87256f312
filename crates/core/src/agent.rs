mod builder;

use tracing::Instrument;

use crate::plan::{self, CallPlan, ParseFailure, PlanKind};
use crate::prompt;
use crate::schema::SchemaError;
use crate::session::{ChatSession, ModelError};
use crate::tool::{
    CallResult, CallResults, Error as ToolError, Tool, ToolDispatcher,
    ToolRegistry,
};
pub use builder::AgentBuilder;

/// An agent that answers tasks with the help of tools.
///
/// Each [`run`](Self::run) goes through these phases, resetting the
/// session before every model call:
///
/// 1. Without tools, the model answers the task directly.
/// 2. Otherwise the model is asked for a call plan listing the tools to
///    invoke. A prose reply is taken as the answer as-is.
/// 3. The plan is dispatched, tools run concurrently.
/// 4. The model summarizes the tool results into the final answer.
///
/// Run-time failures never escape: they degrade to a simpler phase, or
/// become the text of the answer.
pub struct Agent {
    name: String,
    description: String,
    output_style: String,
    task: String,
    session: ChatSession,
    tools: ToolRegistry,
    dispatcher: ToolDispatcher,
}

impl Agent {
    /// Returns the name of the agent.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description of the agent.
    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the current task.
    #[inline]
    pub fn task(&self) -> &str {
        &self.task
    }

    /// Replaces the current task.
    #[inline]
    pub fn set_task<S: Into<String>>(&mut self, task: S) {
        self.task = task.into();
    }

    /// Returns the model session.
    #[inline]
    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    /// Returns the registered tools.
    #[inline]
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Registers a tool, replacing any tool with the same name.
    #[inline]
    pub fn add_tool<T: Tool>(&mut self, tool: T) -> Result<(), SchemaError> {
        self.tools.add(tool)
    }

    /// Removes a tool. Returns `false` if there was none.
    #[inline]
    pub fn remove_tool(&mut self, name: &str) -> bool {
        self.tools.remove(name)
    }

    /// Sets the task and runs it.
    pub async fn run_task<S: Into<String>>(&mut self, task: S) -> String {
        self.set_task(task);
        self.run().await
    }

    /// Runs the current task and returns the answer.
    pub async fn run(&mut self) -> String {
        let span = debug_span!("agent run", agent = %self.name);
        let answer = self.run_phases().instrument(span).await;
        debug!("final answer: {answer}");
        answer
    }

    async fn run_phases(&mut self) -> String {
        let task = self.task.clone();
        if self.tools.is_empty() {
            return self
                .answer_directly(&task)
                .await
                .unwrap_or_else(|err| format!("Failed to get info: {err}."));
        }

        let plan = match self.plan(&task).await {
            Ok(plan) => plan,
            Err(answer) => return answer,
        };
        let mut results = self.dispatcher.dispatch(plan, &self.tools).await;
        self.resolve_deferred(&task, &mut results).await;
        debug!("tool results: {}", results.to_context());
        self.summarize(&task, &results).await
    }

    /// Asks the model for a plan. `Err` carries the final answer when
    /// there is nothing to dispatch.
    async fn plan(&mut self, task: &str) -> Result<CallPlan, String> {
        let tools_info = prompt::tools_info(self.tools.schemas());
        self.session.reset();
        self.session.set_system_prompt(prompt::planning(&tools_info));
        let response = match self.session.run(task).await {
            Ok(response) => response,
            Err(err) => {
                error!("planning failed: {err}");
                return Err(format!("Failed to get info: {err}."));
            }
        };
        debug!("raw planning response: {response}");

        let failure = match plan::parse(&response, PlanKind::Tools) {
            Ok(plan) if !plan.is_empty() => {
                debug!("parsed plan: {plan:?}");
                return Ok(plan);
            }
            Ok(_) => None,
            Err(ParseFailure::NoStructuredPayload) => {
                debug!("no call plan in the response, taking it as the answer");
                return Err(response);
            }
            Err(err @ ParseFailure::MalformedPayload(_)) => Some(err),
        };
        match failure {
            Some(err) => warn!("{err}, answering directly"),
            None => debug!("empty call plan, answering directly"),
        }
        Err(self
            .answer_directly(task)
            .await
            .unwrap_or_else(|err| format!("Failed to get info: {err}.")))
    }

    /// Answers deferred calls with direct model calls.
    async fn resolve_deferred(&mut self, task: &str, results: &mut CallResults) {
        for (name, result) in results.iter_mut() {
            let CallResult::Deferred(question) = result else {
                continue;
            };
            let question = if question.trim().is_empty() {
                task.to_owned()
            } else {
                question.clone()
            };
            trace!("answering deferred call `{name}`");
            *result = match self.answer_directly(&question).await {
                Ok(answer) => CallResult::Value(answer),
                Err(err) => CallResult::Error(
                    ToolError::execution_error().with_reason(err.to_string()),
                ),
            };
        }
    }

    async fn summarize(&mut self, task: &str, results: &CallResults) -> String {
        let tools_info = prompt::tools_info(self.tools.schemas());
        self.session.reset();
        self.session.set_system_prompt(prompt::summarizing(
            &self.name,
            &tools_info,
            &self.output_style,
        ));
        let input = prompt::summary_input(task, "TOOLS", &results.to_context());
        match self.session.run(&input).await {
            Ok(summary) => summary,
            Err(err) => {
                warn!("summarizing failed ({err}), answering the task directly");
                self.answer_directly(task)
                    .await
                    .unwrap_or_else(|err| format!("Failed to get summary: {err}."))
            }
        }
    }

    async fn answer_directly(&mut self, question: &str) -> Result<String, ModelError> {
        self.session.reset();
        self.session.set_system_prompt(prompt::direct_answer(
            &self.name,
            &self.description,
            &self.output_style,
        ));
        self.session.run(question).await
    }
}
