//! Per-activation context handed to actor logic.
//!
//! The context is built by [`ActorEndpoint`](crate::endpoint::ActorEndpoint)
//! during activation and lives exactly as long as the activation. It carries
//! the actor's identity, a handle to the owning system for calling other
//! actors, and the [`ActorLifecycle`] facade.

use std::cell::Cell;
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use crate::actor::{Actor, ActorPath};
use crate::endpoint::{
    ActivationRuntime, ActivationState, LocalBoxFuture, ReminderHandle, TimerCallback,
    TimerHandle,
};
use crate::error::{LifecycleError, SystemError};
use crate::system::{ActorRef, ActorSystem, WeakActorSystem};

/// Identity, system handle and lifecycle facade of one activation.
///
/// Not constructible outside the crate; actors receive it by reference in
/// [`Actor::activate`] and [`Actor::receive`].
pub struct ActorContext {
    path: ActorPath,
    system: WeakActorSystem,
    lifecycle: ActorLifecycle,
}

impl ActorContext {
    pub(crate) fn new(
        path: ActorPath,
        system: WeakActorSystem,
        runtime: Rc<dyn ActivationRuntime>,
        state: Rc<Cell<ActivationState>>,
    ) -> Self {
        Self {
            path,
            system,
            lifecycle: ActorLifecycle { runtime, state },
        }
    }

    /// Path of this activation.
    pub fn path(&self) -> &ActorPath {
        &self.path
    }

    /// Instance id (the `id` half of the path).
    pub fn id(&self) -> &str {
        self.path.id()
    }

    /// Current lifecycle state of the activation.
    pub fn state(&self) -> ActivationState {
        self.lifecycle.state.get()
    }

    /// Restricted lifecycle operations.
    pub fn lifecycle(&self) -> &ActorLifecycle {
        &self.lifecycle
    }

    /// The owning actor system, if it is still alive.
    pub fn system(&self) -> Option<ActorSystem> {
        self.system.upgrade()
    }

    /// Reference to another actor by implementation type.
    pub fn actor_of<A: Actor>(&self, id: impl Into<String>) -> Result<ActorRef, SystemError> {
        self.system
            .upgrade()
            .ok_or(SystemError::SystemDropped)?
            .actor_of::<A>(id)
    }

    /// Reference to another actor by path.
    pub fn actor_ref(&self, path: ActorPath) -> ActorRef {
        ActorRef::new(self.system.clone(), path)
    }
}

impl fmt::Debug for ActorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorContext")
            .field("path", &self.path)
            .field("state", &self.state())
            .finish()
    }
}

/// Lifecycle operations actor logic may invoke on its own activation.
///
/// A narrowed view of the hosting runtime. Scheduling new work (timers,
/// reminders, deactivation requests) is only allowed while the activation is
/// `Activating` or `Active`; reminder lookups and removal are also allowed
/// while `Deactivating`. Everything fails once `Terminated`.
///
/// # Orleans Reference
///
/// The protected members of Orleans' `Grain` base class, reachable only from
/// inside the grain.
pub struct ActorLifecycle {
    runtime: Rc<dyn ActivationRuntime>,
    state: Rc<Cell<ActivationState>>,
}

impl ActorLifecycle {
    fn ensure(
        &self,
        operation: &'static str,
        allowed: fn(ActivationState) -> bool,
    ) -> Result<(), LifecycleError> {
        let state = self.state.get();
        if allowed(state) {
            Ok(())
        } else {
            Err(LifecycleError::InvalidState { operation, state })
        }
    }

    /// Deactivate this activation once the current turn completes.
    pub fn deactivate_on_idle(&self) -> Result<(), LifecycleError> {
        self.ensure("deactivate on idle", ActivationState::can_schedule)?;
        self.runtime.deactivate_on_idle();
        Ok(())
    }

    /// Keep this activation alive for at least `period`.
    pub fn delay_deactivation(&self, period: Duration) -> Result<(), LifecycleError> {
        self.ensure("delay deactivation", ActivationState::can_schedule)?;
        Ok(self.runtime.delay_deactivation(period)?)
    }

    /// Run `callback` after `due`, then every `period`.
    ///
    /// A zero `period` fires once. Each tick is an exclusive turn: it waits
    /// for running turns and no other turn starts until the callback
    /// completes, so a callback must not call its own actor non-reentrantly.
    /// Timer ticks do not count as activity and do not keep the activation
    /// alive; they stop on deactivation or when the returned handle is
    /// disposed.
    pub fn register_timer<F, Fut>(
        &self,
        due: Duration,
        period: Duration,
        callback: F,
    ) -> Result<TimerHandle, LifecycleError>
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        self.ensure("register timer", ActivationState::can_schedule)?;
        let callback: TimerCallback =
            Rc::new(move || -> LocalBoxFuture<()> { Box::pin(callback()) });
        Ok(self.runtime.register_timer(callback, due, period))
    }

    /// Look up a reminder of this activation by name.
    pub async fn get_reminder(&self, name: &str) -> Result<Option<ReminderHandle>, LifecycleError> {
        self.ensure("get reminder", ActivationState::can_manage_reminders)?;
        Ok(self.runtime.get_reminder(name).await?)
    }

    /// All reminders of this activation.
    pub async fn get_reminders(&self) -> Result<Vec<ReminderHandle>, LifecycleError> {
        self.ensure("get reminders", ActivationState::can_manage_reminders)?;
        Ok(self.runtime.get_reminders().await?)
    }

    /// Register a reminder, or update the one with the same name.
    ///
    /// Reminders outlive the activation: when one fires while the actor is
    /// not active, the host activates it again to deliver the tick.
    pub async fn register_or_update_reminder(
        &self,
        name: &str,
        due: Duration,
        period: Duration,
    ) -> Result<ReminderHandle, LifecycleError> {
        self.ensure("register reminder", ActivationState::can_schedule)?;
        Ok(self
            .runtime
            .register_or_update_reminder(name, due, period)
            .await?)
    }

    /// Remove a reminder.
    pub async fn unregister_reminder(&self, reminder: &ReminderHandle) -> Result<(), LifecycleError> {
        self.ensure("unregister reminder", ActivationState::can_manage_reminders)?;
        Ok(self.runtime.unregister_reminder(reminder).await?)
    }
}
