//! Contract between the dispatch engine and the hosting runtime.
//!
//! The hosting runtime owns scheduling, idle collection, timers and reminder
//! storage. The dispatch engine only consumes the operations below and hands
//! a narrowed view of them to actor logic through
//! [`ActorLifecycle`](crate::actor::ActorLifecycle).

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::RuntimeError;

/// Boxed, non-`Send` future.
pub type LocalBoxFuture<T> = Pin<Box<dyn Future<Output = T>>>;

/// Callback run on every timer tick.
pub type TimerCallback = Rc<dyn Fn() -> LocalBoxFuture<()>>;

/// How a message is delivered to an activation.
///
/// Exclusive calls never overlap any other call on the same activation.
/// Reentrant calls may interleave with anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvocationMode {
    /// Exclusive, reply returned to the caller.
    Exclusive,
    /// Exclusive, reply discarded.
    ExclusiveVoid,
    /// Reentrant, reply returned to the caller.
    Reentrant,
    /// Reentrant, reply discarded.
    ReentrantVoid,
}

impl InvocationMode {
    /// Pick the mode for a call.
    pub fn new(reentrant: bool, expects_reply: bool) -> Self {
        match (reentrant, expects_reply) {
            (false, true) => InvocationMode::Exclusive,
            (false, false) => InvocationMode::ExclusiveVoid,
            (true, true) => InvocationMode::Reentrant,
            (true, false) => InvocationMode::ReentrantVoid,
        }
    }

    /// Safe to interleave with other calls.
    pub fn is_reentrant(self) -> bool {
        matches!(
            self,
            InvocationMode::Reentrant | InvocationMode::ReentrantVoid
        )
    }

    /// Caller waits for a reply value.
    pub fn expects_reply(self) -> bool {
        matches!(self, InvocationMode::Exclusive | InvocationMode::Reentrant)
    }
}

/// A registered reminder, as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderHandle {
    name: String,
    due: Duration,
    period: Duration,
}

impl ReminderHandle {
    /// Create a handle.
    pub fn new(name: impl Into<String>, due: Duration, period: Duration) -> Self {
        Self {
            name: name.into(),
            due,
            period,
        }
    }

    /// Reminder name (unique per activation).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Delay before the first tick.
    pub fn due(&self) -> Duration {
        self.due
    }

    /// Delay between ticks.
    pub fn period(&self) -> Duration {
        self.period
    }
}

/// Tick information passed along with a reminder delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickStatus {
    /// When the reminder first fired.
    pub first_tick: Instant,
    /// Configured period.
    pub period: Duration,
    /// When this tick fired.
    pub current_tick: Instant,
}

/// Handle to a registered timer.
///
/// Timers keep running until [`dispose`](Self::dispose) is called or the
/// activation is deactivated; dropping the handle does not stop them.
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl TimerHandle {
    /// Create a handle that runs `cancel` on dispose.
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stop the timer.
    pub fn dispose(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// The per-activation unit supplied by the hosting runtime.
///
/// # Orleans Reference
///
/// Corresponds to the lifecycle surface of Orleans' `Grain` base class
/// (`DeactivateOnIdle`, `DelayDeactivation`, `RegisterTimer`,
/// `RegisterOrUpdateReminder`, …). Actor code never receives this trait
/// object; it sees [`ActorLifecycle`](crate::actor::ActorLifecycle) instead.
#[async_trait(?Send)]
pub trait ActivationRuntime {
    /// Identity string of the activation (a serialized
    /// [`ActorPath`](crate::actor::ActorPath)).
    fn identity(&self) -> &str;

    /// Deactivate once the current turn completes.
    fn deactivate_on_idle(&self);

    /// Keep the activation alive for at least `period`.
    fn delay_deactivation(&self, period: Duration) -> Result<(), RuntimeError>;

    /// Run `callback` after `due`, then every `period` (once if zero).
    ///
    /// Each tick runs as an exclusive turn of the activation.
    fn register_timer(
        &self,
        callback: TimerCallback,
        due: Duration,
        period: Duration,
    ) -> TimerHandle;

    /// Look up a reminder by name.
    async fn get_reminder(&self, name: &str) -> Result<Option<ReminderHandle>, RuntimeError>;

    /// All reminders of this activation.
    async fn get_reminders(&self) -> Result<Vec<ReminderHandle>, RuntimeError>;

    /// Register a reminder, replacing any reminder with the same name.
    async fn register_or_update_reminder(
        &self,
        name: &str,
        due: Duration,
        period: Duration,
    ) -> Result<ReminderHandle, RuntimeError>;

    /// Remove a reminder.
    async fn unregister_reminder(&self, reminder: &ReminderHandle) -> Result<(), RuntimeError>;
}
