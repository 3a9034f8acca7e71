//! Actor capability and per-activation types.
//!
//! An actor is a plain Rust type implementing [`Actor`]. It never sees the
//! hosting runtime directly: every lifecycle message and application message
//! arrives through [`Actor::receive`], and lifecycle operations go through the
//! [`ActorLifecycle`] facade on its [`ActorContext`].
//!
//! # Message Ordering
//!
//! ```text
//! Activate → (application messages | reminders)* → Deactivate
//! ```
//!
//! `Activate` always completes before the first application message and
//! `Deactivate` is always the last message an activation sees.

mod context;
mod message;
mod path;

use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

pub use context::{ActorContext, ActorLifecycle};
pub use message::{Message, Reminder};
pub use path::ActorPath;

use crate::declaration::ActorTypeCode;
use crate::error::ActorError;

/// Keep-alive policy of an actor kind.
///
/// Applied before every message and reminder delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeepAlive {
    /// No signal; the host's idle timeout applies as is.
    #[default]
    Default,
    /// Ask the host to keep the activation alive for at least this long.
    Extend(Duration),
}

/// The receiver pipeline of one activation.
///
/// Invoked uniformly for `Activate`, `Deactivate`, reminders and application
/// messages. Implemented for every [`Actor`]; the registry hands out
/// receivers as `Rc<dyn Receive>`.
#[async_trait(?Send)]
pub trait Receive {
    /// Process one message.
    async fn receive(&self, ctx: &ActorContext, message: Message) -> Result<Value, ActorError>;
}

/// Receiver handle produced by the registry's factory.
pub type Receiver = Rc<dyn Receive>;

/// Core actor trait.
///
/// # Concurrency
///
/// `receive` takes `&self`: messages delivered in reentrant mode may run
/// concurrently with other messages on the same activation. Mutable state
/// lives behind `Cell`/`RefCell`, and code reachable from reentrant messages
/// must be written as if concurrent.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use grainport::prelude::*;
///
/// struct Counter {
///     value: Cell<i64>,
/// }
///
/// #[async_trait(?Send)]
/// impl Actor for Counter {
///     fn activate(_id: &str, _ctx: &ActorContext) -> Result<Self, ActorError> {
///         Ok(Self { value: Cell::new(0) })
///     }
///
///     async fn receive(&self, _ctx: &ActorContext, message: Message) -> Result<Value, ActorError> {
///         match message {
///             Message::Application(_) => {
///                 self.value.set(self.value.get() + 1);
///                 Ok(Value::from(self.value.get()))
///             }
///             _ => Ok(Value::Null),
///         }
///     }
/// }
/// ```
#[async_trait(?Send)]
pub trait Actor: Sized + 'static {
    /// Registration key of this actor kind.
    ///
    /// Defaults to the code derived from the type's fully-qualified name.
    fn type_code() -> ActorTypeCode {
        ActorTypeCode::of::<Self>()
    }

    /// Keep-alive policy applied on every delivery.
    fn keep_alive() -> KeepAlive {
        KeepAlive::Default
    }

    /// Whether an application message is safe to interleave.
    ///
    /// Callers going through [`ActorRef::ask`](crate::system::ActorRef::ask)
    /// and [`ActorRef::tell`](crate::system::ActorRef::tell) use the reentrant
    /// entry points when this returns `true`.
    fn is_reentrant(_message: &Value) -> bool {
        false
    }

    /// Build the actor for activation `id`.
    ///
    /// Called once per activation, before `Activate` is delivered. An error
    /// aborts the activation.
    fn activate(id: &str, ctx: &ActorContext) -> Result<Self, ActorError>;

    /// Process one message.
    async fn receive(&self, ctx: &ActorContext, message: Message) -> Result<Value, ActorError>;
}

#[async_trait(?Send)]
impl<A: Actor> Receive for A {
    async fn receive(&self, ctx: &ActorContext, message: Message) -> Result<Value, ActorError> {
        Actor::receive(self, ctx, message).await
    }
}
