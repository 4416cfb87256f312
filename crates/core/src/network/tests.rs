use std::sync::{Arc, Mutex};

use archer_model::{ErrorKind, ModelMessage, ModelRequest};
use archer_test_model::TestModelProvider;
use async_trait::async_trait;

use super::{Delegate, NetworkBuilder};
use crate::AgentBuilder;

/// A member that records its tasks and reports them back.
struct Recorder {
    name: &'static str,
    tasks: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    fn new(name: &'static str) -> (Self, Arc<Mutex<Vec<String>>>) {
        let tasks = Arc::new(Mutex::new(vec![]));
        let recorder = Self {
            name,
            tasks: Arc::clone(&tasks),
        };
        (recorder, tasks)
    }
}

#[async_trait]
impl Delegate for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "records tasks"
    }

    async fn run_task(&mut self, task: String) -> String {
        self.tasks.lock().unwrap().push(task.clone());
        format!("{} did: {task}", self.name)
    }
}

fn user_input(req: &ModelRequest) -> &str {
    match req.messages.last() {
        Some(ModelMessage::User(input)) => input,
        other => panic!("expected a user input, got {other:?}"),
    }
}

#[tokio::test]
async fn test_chained_rounds() {
    let (researcher, researcher_tasks) = Recorder::new("Researcher");
    let (writer, writer_tasks) = Recorder::new("Writer");

    let mut model_provider = TestModelProvider::default();
    model_provider.add_text_response(
        r#"{"agent_calling": [{"agent_name": "Researcher", "task_description": "Find cat facts"}]}"#,
    );
    model_provider.add_text_response(
        r#"```json
{"agent_calling": [{"agent_name": "Writer", "task_description": "Write about: cat facts"}]}
```"#,
    );
    model_provider.add_text_response(r#"{"agent_calling": []}"#);
    model_provider.add_text_response("Here is your cat report.");

    let mut network = NetworkBuilder::with_model_provider(model_provider.clone())
        .with_name("Newsroom")
        .with_member(researcher)
        .with_member(writer)
        .build();
    assert_eq!(
        network.run_task("Write a report about cats").await,
        "Here is your cat report."
    );

    assert_eq!(*researcher_tasks.lock().unwrap(), ["Find cat facts"]);
    assert_eq!(*writer_tasks.lock().unwrap(), ["Write about: cat facts"]);

    let requests = model_provider.requests();
    assert_eq!(requests.len(), 4);
    match &requests[0].messages[0] {
        ModelMessage::System(prompt) => {
            assert!(prompt.starts_with("You are Newsroom"));
            assert!(prompt.contains("Agent Name: Researcher - records tasks"));
        }
        other => panic!("expected a system prompt, got {other:?}"),
    }
    // The coordinator keeps its history within a run.
    assert_eq!(requests[1].messages.len(), 4);
    assert_eq!(
        user_input(&requests[1]),
        "Agent(Researcher): Researcher did: Find cat facts"
    );
    assert_eq!(requests[3].messages.len(), 2);
    assert_eq!(
        user_input(&requests[3]),
        "[QUERY]\nWrite a report about cats\n\n[AGENTS]\n\
         {\"Researcher\":\"Researcher did: Find cat facts\",\
         \"Writer\":\"Writer did: Write about: cat facts\"}"
    );
}

#[tokio::test]
async fn test_unknown_agent_is_not_fatal() {
    let (researcher, researcher_tasks) = Recorder::new("Researcher");

    let mut model_provider = TestModelProvider::default();
    model_provider.add_text_response(
        r#"{"agent_calling": [
            {"agent_name": "Ghost", "task_description": "Boo"},
            {"agent_name": "researcher", "task_description": "Find facts"}
        ]}"#,
    );
    model_provider.add_text_response(r#"{"agent_calling": []}"#);
    model_provider.add_text_response("Done.");

    let mut network = NetworkBuilder::with_model_provider(model_provider.clone())
        .with_member(researcher)
        .build();
    assert_eq!(network.run_task("Research").await, "Done.");

    // Lookup is case-insensitive.
    assert_eq!(*researcher_tasks.lock().unwrap(), ["Find facts"]);

    let requests = model_provider.requests();
    assert_eq!(
        user_input(&requests[1]),
        "Agent(Ghost): Failed to get info: Agent 'Ghost' not found.\n\
         Agent(Researcher): Researcher did: Find facts"
    );
    assert!(user_input(&requests[2]).contains("Agent 'Ghost' not found."));
}

#[tokio::test]
async fn test_prose_before_dispatch_is_the_answer() {
    let (researcher, researcher_tasks) = Recorder::new("Researcher");

    let mut model_provider = TestModelProvider::default();
    model_provider.add_text_response("Cats are mammals.");

    let mut network = NetworkBuilder::with_model_provider(model_provider.clone())
        .with_member(researcher)
        .build();
    assert_eq!(network.run_task("Are cats mammals?").await, "Cats are mammals.");
    assert!(researcher_tasks.lock().unwrap().is_empty());
    assert_eq!(model_provider.requests().len(), 1);
}

#[tokio::test]
async fn test_round_limit() {
    let (researcher, researcher_tasks) = Recorder::new("Researcher");

    let mut model_provider = TestModelProvider::default();
    let plan = r#"{"agent_calling": [{"agent_name": "Researcher", "task_description": "Again"}]}"#;
    model_provider.add_text_response(plan);
    model_provider.add_text_response(plan);
    model_provider.add_text_response("Summary.");

    let mut network = NetworkBuilder::with_model_provider(model_provider.clone())
        .with_member(researcher)
        .with_max_rounds(2)
        .build();
    assert_eq!(network.run_task("Loop forever").await, "Summary.");
    assert_eq!(researcher_tasks.lock().unwrap().len(), 2);
    assert_eq!(model_provider.remaining_steps(), 0);
}

#[tokio::test]
async fn test_failures_become_text() {
    let (researcher, _) = Recorder::new("Researcher");
    let mut model_provider = TestModelProvider::default();
    model_provider.add_failure(ErrorKind::Unauthorized);
    let mut network = NetworkBuilder::with_model_provider(model_provider)
        .with_member(researcher)
        .build();
    assert!(network.run_task("Anything").await.starts_with("Failed to get info: "));

    let (researcher, _) = Recorder::new("Researcher");
    let mut model_provider = TestModelProvider::default();
    model_provider.add_text_response(
        r#"{"agent_calling": [{"agent_name": "Researcher", "task_description": "x"}]}"#,
    );
    model_provider.add_text_response(r#"{"agent_calling": []}"#);
    model_provider.add_failure(ErrorKind::Other);
    model_provider.add_failure(ErrorKind::Other);
    let mut network = NetworkBuilder::with_model_provider(model_provider)
        .with_member(researcher)
        .build();
    assert!(network.run_task("Anything").await.starts_with("Failed to get summary: "));
}

#[tokio::test]
async fn test_no_members_answers_directly() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_text_response("Nobody to ask, but hello.");
    let mut network = NetworkBuilder::with_model_provider(model_provider).build();
    assert_eq!(network.run_task("Hi").await, "Nobody to ask, but hello.");
}

#[tokio::test]
async fn test_agents_and_nested_networks_are_members() {
    let mut agent_provider = TestModelProvider::default();
    agent_provider.add_text_response("Paris is the capital of France.");
    let agent = AgentBuilder::with_model_provider(agent_provider.clone())
        .with_name("Geographer")
        .with_description("knows capitals")
        .build()
        .unwrap();

    let mut inner_provider = TestModelProvider::default();
    inner_provider.add_text_response(
        r#"{"agent_calling": [{"agent_name": "Geographer", "task_description": "Capital of France?"}]}"#,
    );
    inner_provider.add_text_response(r#"{"agent_calling": []}"#);
    inner_provider.add_text_response("Paris.");
    let inner = NetworkBuilder::with_model_provider(inner_provider)
        .with_name("Atlas")
        .with_member(agent)
        .build();

    let mut outer_provider = TestModelProvider::default();
    outer_provider.add_text_response(
        r#"{"agent_calling": [{"agent_name": "atlas", "task_description": "Find the capital of France"}]}"#,
    );
    outer_provider.add_text_response(r#"{"agent_calling": []}"#);
    outer_provider.add_text_response("The capital of France is Paris.");
    let mut outer = NetworkBuilder::with_model_provider(outer_provider)
        .with_member(inner)
        .build();
    assert_eq!(outer.members().collect::<Vec<_>>(), ["Atlas"]);

    assert_eq!(
        outer.run_task("What is the capital of France?").await,
        "The capital of France is Paris."
    );
    assert_eq!(
        user_input(&agent_provider.requests()[0]),
        "Capital of France?"
    );
}

#[tokio::test]
async fn test_empty_first_plan_answers_directly() {
    let (researcher, researcher_tasks) = Recorder::new("Researcher");

    let mut model_provider = TestModelProvider::default();
    model_provider.add_text_response(r#"{"agent_calling": []}"#);
    model_provider.add_text_response("Hello from the coordinator.");

    let mut network = NetworkBuilder::with_model_provider(model_provider.clone())
        .with_member(researcher)
        .build();
    assert_eq!(network.run_task("Hi").await, "Hello from the coordinator.");
    assert!(researcher_tasks.lock().unwrap().is_empty());

    let requests = model_provider.requests();
    assert_eq!(requests.len(), 2);
    // The direct answer sees the task, not an empty results map.
    assert_eq!(requests[1].messages.len(), 2);
    assert_eq!(user_input(&requests[1]), "Hi");
}

#[tokio::test]
async fn test_member_with_taken_name_replaces_previous() {
    let (first, first_tasks) = Recorder::new("Researcher");
    let (second, second_tasks) = Recorder::new("researcher");
    let (writer, _) = Recorder::new("Writer");

    let mut model_provider = TestModelProvider::default();
    model_provider.add_text_response(
        r#"{"agent_calling": [{"agent_name": "Researcher", "task_description": "Dig"}]}"#,
    );
    model_provider.add_text_response(r#"{"agent_calling": []}"#);
    model_provider.add_text_response("Dug.");

    let mut network = NetworkBuilder::with_model_provider(model_provider)
        .with_member(first)
        .with_member(writer)
        .build();
    network.add_member(second);
    assert_eq!(network.members().collect::<Vec<_>>(), ["researcher", "Writer"]);

    assert_eq!(network.run_task("Research").await, "Dug.");
    assert!(first_tasks.lock().unwrap().is_empty());
    assert_eq!(*second_tasks.lock().unwrap(), ["Dig"]);
}
