//! A stateful chat session on top of a stateless model provider.

use archer_model::{
    ErrorKind, ModelFinishReason, ModelMessage, ModelProvider,
    ModelProviderError, ModelRequest, Role,
};

use crate::conversation::Conversation;
use crate::model_client::ModelClient;

/// A failed model call.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ModelError {
    kind: ErrorKind,
    message: String,
}

impl ModelError {
    /// Returns the kind reported by the provider.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the provider's description of the failure.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<Box<dyn ModelProviderError>> for ModelError {
    fn from(err: Box<dyn ModelProviderError>) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// The model backend an agent talks to.
///
/// A session owns a system prompt and the conversation history. Every
/// [`run`](Self::run) sends the system prompt, the whole history and the
/// new prompt, then records the exchange. [`reset`](Self::reset) forgets
/// both the prompt and the history, so nothing leaks into the next phase.
#[derive(Clone)]
pub struct ChatSession {
    client: ModelClient,
    system_prompt: Option<String>,
    conversation: Conversation,
}

impl ChatSession {
    /// Creates a session without a system prompt.
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        Self {
            client: ModelClient::new(provider),
            system_prompt: None,
            conversation: Conversation::default(),
        }
    }

    /// Sets the initial system prompt.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.set_system_prompt(prompt);
        self
    }

    /// Replaces the system prompt.
    #[inline]
    pub fn set_system_prompt<S: Into<String>>(&mut self, prompt: S) {
        self.system_prompt = Some(prompt.into());
    }

    /// Returns the current system prompt.
    #[inline]
    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    /// Appends a message to the history without calling the model.
    #[inline]
    pub fn add_message<S: Into<String>>(&mut self, role: Role, content: S) {
        self.conversation.push(ModelMessage::new(role, content));
    }

    /// Returns the history.
    #[inline]
    pub fn messages(&self) -> &Conversation {
        &self.conversation
    }

    /// Clears the system prompt and the history.
    #[inline]
    pub fn reset(&mut self) {
        self.system_prompt = None;
        self.conversation.clear();
    }

    /// Sends `prompt` as a user message and returns the reply.
    ///
    /// The history is only updated when the call succeeds.
    pub async fn run(&mut self, prompt: &str) -> Result<String, ModelError> {
        let mut messages =
            Vec::with_capacity(self.conversation.len() + 2);
        if let Some(system_prompt) = &self.system_prompt {
            messages.push(ModelMessage::System(system_prompt.clone()));
        }
        messages.extend(self.conversation.items().iter().cloned());
        messages.push(ModelMessage::User(prompt.to_owned()));

        let resp = self.client.send_request(ModelRequest { messages }).await?;
        if resp.finish_reason == Some(ModelFinishReason::Length) {
            warn!("model output was cut off by the token limit");
        }

        self.conversation.push(ModelMessage::User(prompt.to_owned()));
        self.conversation
            .push(ModelMessage::Assistant(resp.transcript.clone()));
        Ok(resp.transcript)
    }
}

#[cfg(test)]
mod tests {
    use archer_test_model::TestModelProvider;

    use super::*;

    #[tokio::test]
    async fn test_run_sends_prompt_and_history() {
        let mut provider = TestModelProvider::default();
        provider.add_text_response("Hello!");
        provider.add_text_response("Still here.");

        let mut session =
            ChatSession::new(provider.clone()).with_system_prompt("Be nice.");
        assert_eq!(session.run("Hi").await.unwrap(), "Hello!");
        assert_eq!(session.run("Are you there?").await.unwrap(), "Still here.");

        let requests = provider.requests();
        assert_eq!(
            requests[1].messages,
            [
                ModelMessage::System("Be nice.".to_owned()),
                ModelMessage::User("Hi".to_owned()),
                ModelMessage::Assistant("Hello!".to_owned()),
                ModelMessage::User("Are you there?".to_owned()),
            ]
        );
        assert_eq!(session.messages().len(), 4);
        assert_eq!(session.messages().last_from(Role::Assistant), Some("Still here."));
    }

    #[tokio::test]
    async fn test_reset_forgets_everything() {
        let mut provider = TestModelProvider::default();
        provider.add_text_response("first");
        provider.add_text_response("second");

        let mut session =
            ChatSession::new(provider.clone()).with_system_prompt("Persona A");
        session.add_message("model".parse().unwrap(), "an earlier reply");
        session.run("one").await.unwrap();

        session.reset();
        assert!(session.messages().is_empty());
        assert_eq!(session.system_prompt(), None);
        session.run("two").await.unwrap();

        let requests = provider.requests();
        assert_eq!(requests[0].messages.len(), 3);
        assert_eq!(
            requests[0].messages[1],
            ModelMessage::Assistant("an earlier reply".to_owned())
        );
        assert_eq!(requests[1].messages, [ModelMessage::User("two".to_owned())]);
    }

    #[tokio::test]
    async fn test_failure_keeps_history() {
        let mut provider = TestModelProvider::default();
        provider.add_failure(ErrorKind::RateLimitExceeded);

        let mut session = ChatSession::new(provider);
        let err = session.run("Hi").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
        assert!(session.messages().is_empty());
    }
}
