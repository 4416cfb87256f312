use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A request to be sent to the model provider.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ModelRequest {
    /// The input messages, oldest first.
    pub messages: Vec<ModelMessage>,
}

/// A complete message.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", content = "content", rename_all = "lowercase")]
pub enum ModelMessage {
    /// The system instructions.
    System(String),
    /// A user input text.
    User(String),
    /// An assistant text.
    Assistant(String),
}

impl ModelMessage {
    /// Creates a message with the given role.
    #[inline]
    pub fn new<S: Into<String>>(role: Role, content: S) -> Self {
        let content = content.into();
        match role {
            Role::System => ModelMessage::System(content),
            Role::User => ModelMessage::User(content),
            Role::Assistant => ModelMessage::Assistant(content),
        }
    }

    /// Returns the role of the message author.
    #[inline]
    pub fn role(&self) -> Role {
        match self {
            ModelMessage::System(_) => Role::System,
            ModelMessage::User(_) => Role::User,
            ModelMessage::Assistant(_) => Role::Assistant,
        }
    }

    /// Returns the text of the message.
    #[inline]
    pub fn content(&self) -> &str {
        match self {
            ModelMessage::System(content)
            | ModelMessage::User(content)
            | ModelMessage::Assistant(content) => content,
        }
    }
}

/// The author of a message.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions that steer the model.
    System,
    /// The human side of the conversation.
    User,
    /// The model side of the conversation.
    Assistant,
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => f.write_str("system"),
            Role::User => f.write_str("user"),
            Role::Assistant => f.write_str("assistant"),
        }
    }
}

/// Error returned when parsing an unknown role name.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    /// Parses a role name. `"model"` is accepted as an alias of
    /// `"assistant"`, since some providers spell it that way.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let role = s.trim();
        if role.eq_ignore_ascii_case("system") {
            Ok(Role::System)
        } else if role.eq_ignore_ascii_case("user") {
            Ok(Role::User)
        } else if role.eq_ignore_ascii_case("assistant")
            || role.eq_ignore_ascii_case("model")
        {
            Ok(Role::Assistant)
        } else {
            Err(UnknownRole(s.to_owned()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role() {
        assert_eq!("user".parse::<Role>(), Ok(Role::User));
        assert_eq!(" System ".parse::<Role>(), Ok(Role::System));
        assert_eq!("model".parse::<Role>(), Ok(Role::Assistant));
        assert_eq!("ASSISTANT".parse::<Role>(), Ok(Role::Assistant));
        let err = "tool".parse::<Role>().unwrap_err();
        assert_eq!(err.to_string(), "unknown role: tool");
    }

    #[test]
    fn test_message_accessors() {
        let msg = ModelMessage::new(Role::Assistant, "Hi");
        assert_eq!(msg, ModelMessage::Assistant("Hi".to_owned()));
        assert_eq!(msg.role(), Role::Assistant);
        assert_eq!(msg.content(), "Hi");
    }
}
