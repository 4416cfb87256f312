//! Conversation-related types.

use archer_model::{ModelMessage, Role};

/// Represents a conversation: role-tagged messages, oldest first.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct Conversation {
    pub(crate) items: Vec<ModelMessage>,
}

impl Conversation {
    /// Returns the messages.
    #[inline]
    pub fn items(&self) -> &[ModelMessage] {
        &self.items
    }

    /// Returns the number of messages.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the conversation has no message.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the text of the last message from `role`, if any.
    pub fn last_from(&self, role: Role) -> Option<&str> {
        self.items
            .iter()
            .rev()
            .find(|msg| msg.role() == role)
            .map(ModelMessage::content)
    }

    #[inline]
    pub(crate) fn push(&mut self, msg: ModelMessage) {
        self.items.push(msg);
    }

    #[inline]
    pub(crate) fn clear(&mut self) {
        self.items.clear();
    }
}
