//! Common imports for writing and hosting actors.

pub use crate::actor::{Actor, ActorContext, ActorLifecycle, ActorPath, KeepAlive, Message, Reminder};
pub use crate::config::SystemConfig;
pub use crate::declaration::{ActorLibrary, ActorTypeCode};
pub use crate::endpoint::{ActivationState, ReminderHandle, TickStatus};
pub use crate::error::{ActorError, LifecycleError, SystemError};
pub use crate::system::{ActorRef, ActorSystem, Bootstrapper};

// Commonly used external types
pub use async_trait::async_trait;
pub use serde::{Deserialize, Serialize};
pub use serde_json::{json, Value};
pub use std::time::Duration;
