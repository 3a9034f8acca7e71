//! Messages delivered to the receiver pipeline.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ActorError;

/// A fired reminder, as seen by the actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    name: String,
}

impl Reminder {
    /// Create a reminder message.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Name the reminder was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Everything the receiver pipeline can be handed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// First message of every activation.
    Activate,
    /// Last message of every activation.
    Deactivate,
    /// A registered reminder fired.
    Reminder(Reminder),
    /// Application payload.
    Application(Value),
}

impl Message {
    /// Wrap a serializable payload.
    pub fn application<T: Serialize>(payload: &T) -> Result<Self, serde_json::Error> {
        Ok(Message::Application(serde_json::to_value(payload)?))
    }

    /// Decode the application payload.
    ///
    /// Lifecycle and reminder messages yield [`ActorError::UnexpectedMessage`].
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ActorError> {
        match self {
            Message::Application(payload) => Ok(T::deserialize(payload)?),
            other => Err(ActorError::UnexpectedMessage(other.kind().to_string())),
        }
    }

    /// `Activate` or `Deactivate`.
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Message::Activate | Message::Deactivate)
    }

    /// Short name of the message kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Activate => "activate",
            Message::Deactivate => "deactivate",
            Message::Reminder(_) => "reminder",
            Message::Application(_) => "application",
        }
    }
}
