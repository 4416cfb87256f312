//! Multi-agent coordination.

#[cfg(test)]
mod tests;

use archer_model::ModelProvider;
use async_trait::async_trait;
use tracing::Instrument;

use crate::Agent;
use crate::plan::{self, CallRequest, ParseFailure, PlanKind};
use crate::prompt;
use crate::session::{ChatSession, ModelError};
use crate::tool::{CallResult, CallResults, Error as ToolError};

/// The number of planning rounds a network runs by default.
pub const DEFAULT_MAX_ROUNDS: usize = 3;

/// Something an [`AgentNetwork`] can hand a task to.
///
/// Both [`Agent`] and [`AgentNetwork`] are delegates, so networks can be
/// nested.
#[async_trait]
pub trait Delegate: Send {
    /// Returns the name the coordinator refers to this delegate by.
    fn name(&self) -> &str;

    /// Returns what this delegate is good at.
    fn description(&self) -> &str;

    /// Performs a task and returns the outcome as text.
    async fn run_task(&mut self, task: String) -> String;
}

#[async_trait]
impl Delegate for Agent {
    #[inline]
    fn name(&self) -> &str {
        Agent::name(self)
    }

    #[inline]
    fn description(&self) -> &str {
        Agent::description(self)
    }

    async fn run_task(&mut self, task: String) -> String {
        Agent::run_task(self, task).await
    }
}

/// A coordinator that splits a task among member agents.
///
/// The coordinator model plans `agent_calling` lists. Planned calls run
/// one after another, and their outputs are reported back to the
/// coordinator as `Agent(name): output` lines, which lets it chain agents
/// over several rounds. The collected outputs are finally summarized into
/// one answer.
///
/// Unknown agent names don't abort the run: the call is reported back as
/// a failure like any other.
pub struct AgentNetwork {
    name: String,
    description: String,
    task: String,
    session: ChatSession,
    members: Vec<Box<dyn Delegate>>,
    max_rounds: usize,
}

impl AgentNetwork {
    /// Returns the name of the network.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description of the network.
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

    /// Returns the coordinator session.
    #[inline]
    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    /// Returns the names of the members.
    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|m| m.name())
    }

    /// Adds a member.
    ///
    /// Names are matched case-insensitively: a member with a name that is
    /// already taken replaces the previous one in place.
    #[inline]
    pub fn add_member<D: Delegate + 'static>(&mut self, member: D) {
        insert_member(&mut self.members, Box::new(member));
    }

    /// Sets the task and runs it.
    pub async fn run_task<S: Into<String>>(&mut self, task: S) -> String {
        self.set_task(task);
        self.run().await
    }

    /// Runs the current task and returns the answer.
    pub async fn run(&mut self) -> String {
        let span = debug_span!("network run", network = %self.name);
        let answer = self.run_rounds().instrument(span).await;
        debug!("final answer: {answer}");
        answer
    }

    async fn run_rounds(&mut self) -> String {
        let task = self.task.clone();
        if self.members.is_empty() {
            return self
                .answer_directly(&task)
                .await
                .unwrap_or_else(|err| format!("Failed to get info: {err}."));
        }

        self.session.reset();
        self.session.set_system_prompt(prompt::coordination(
            &self.name,
            &self.description,
            self.members.iter().map(|m| (m.name(), m.description())),
        ));

        let mut results = CallResults::new();
        let mut input = task.clone();
        for round in 1..=self.max_rounds {
            let response = match self.session.run(&input).await {
                Ok(response) => response,
                Err(err) if results.is_empty() => {
                    error!("coordination failed: {err}");
                    return format!("Failed to get info: {err}.");
                }
                Err(err) => {
                    warn!("coordination failed in round {round}: {err}");
                    break;
                }
            };
            debug!("raw coordination response: {response}");

            let plan = match plan::parse(&response, PlanKind::Agents) {
                Ok(plan) if !plan.is_empty() => plan,
                Ok(_) if results.is_empty() => {
                    debug!("nothing to delegate, answering directly");
                    return self
                        .answer_directly(&task)
                        .await
                        .unwrap_or_else(|err| format!("Failed to get info: {err}."));
                }
                Ok(_) => break,
                Err(ParseFailure::NoStructuredPayload) if results.is_empty() => {
                    return response;
                }
                Err(ParseFailure::NoStructuredPayload) => break,
                Err(err) if results.is_empty() => {
                    warn!("{err}, answering directly");
                    return self
                        .answer_directly(&task)
                        .await
                        .unwrap_or_else(|err| format!("Failed to get info: {err}."));
                }
                Err(err) => {
                    warn!("{err}, summarizing what was collected");
                    break;
                }
            };

            let mut reports = Vec::with_capacity(plan.len());
            for call in plan {
                let (name, result) = self.delegate(call).await;
                reports.push(format!("Agent({name}): {}", report(&result)));
                results.insert(name, result);
            }
            input = reports.join("\n");
        }

        self.summarize(&task, &results).await
    }

    async fn delegate(&mut self, call: CallRequest) -> (String, CallResult) {
        let CallRequest {
            target_name,
            argument,
        } = call;
        let Some(member) = self
            .members
            .iter_mut()
            .find(|m| m.name().eq_ignore_ascii_case(&target_name))
        else {
            warn!("agent not found: {target_name}");
            let err = ToolError::not_found()
                .with_reason(format!("Agent '{target_name}' not found."));
            return (target_name, CallResult::Error(err));
        };

        let name = member.name().to_owned();
        let span = debug_span!("delegate", agent = %name);
        let output = member.run_task(argument.as_text()).instrument(span).await;
        debug!("agent `{name}` returned: {output}");
        (name, CallResult::Value(output))
    }

    async fn summarize(&mut self, task: &str, results: &CallResults) -> String {
        self.session.reset();
        self.session.set_system_prompt(prompt::network_summarizing(
            &self.name,
            &self.description,
        ));
        let input = prompt::summary_input(task, "AGENTS", &results.to_context());
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
            "",
        ));
        self.session.run(question).await
    }
}

#[async_trait]
impl Delegate for AgentNetwork {
    #[inline]
    fn name(&self) -> &str {
        AgentNetwork::name(self)
    }

    #[inline]
    fn description(&self) -> &str {
        AgentNetwork::description(self)
    }

    async fn run_task(&mut self, task: String) -> String {
        AgentNetwork::run_task(self, task).await
    }
}

fn insert_member(members: &mut Vec<Box<dyn Delegate>>, member: Box<dyn Delegate>) {
    let name = member.name();
    match members
        .iter()
        .position(|m| m.name().eq_ignore_ascii_case(name))
    {
        Some(index) => {
            debug!("replacing member `{name}`");
            members[index] = member;
        }
        None => members.push(member),
    }
}

fn report(result: &CallResult) -> String {
    match result {
        CallResult::Value(output) => output.clone(),
        CallResult::Error(err) => {
            format!("Failed to get info: {}.", err.reason().trim_end_matches('.'))
        }
        CallResult::Deferred(question) => question.clone(),
    }
}

/// [`AgentNetwork`] builder.
pub struct NetworkBuilder {
    session: ChatSession,
    name: String,
    description: String,
    task: String,
    members: Vec<Box<dyn Delegate>>,
    max_rounds: usize,
}

impl NetworkBuilder {
    /// Creates a new builder with the specified coordinator model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            session: ChatSession::new(provider),
            name: "Agent Network".to_owned(),
            description: "a network of agents working together to perform tasks"
                .to_owned(),
            task: String::new(),
            members: vec![],
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    /// Sets the name of the network.
    #[inline]
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the description of the network.
    #[inline]
    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the initial task.
    #[inline]
    pub fn with_task<S: Into<String>>(mut self, task: S) -> Self {
        self.task = task.into();
        self
    }

    /// Adds a member.
    #[inline]
    pub fn with_member<D: Delegate + 'static>(mut self, member: D) -> Self {
        insert_member(&mut self.members, Box::new(member));
        self
    }

    /// Limits the number of planning rounds. Zero is treated as one.
    #[inline]
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    /// Builds the network.
    #[inline]
    pub fn build(self) -> AgentNetwork {
        AgentNetwork {
            name: self.name,
            description: self.description,
            task: self.task,
            session: self.session,
            members: self.members,
            max_rounds: self.max_rounds,
        }
    }
}
