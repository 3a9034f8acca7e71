//! Embedded in-process host.
//!
//! [`LocalHost`] plays the part of the hosting activation engine for a
//! single process: it owns the activation table, schedules turns, collects
//! idle activations and runs timers and reminders. Everything runs on the
//! current thread; the host must be driven from inside a tokio `LocalSet`.
//!
//! # Activation Table
//!
//! ```text
//! ActorPath ──► Slot ──► OnceCell<Rc<Activation>>
//!                              │
//!                              ├─ ActorEndpoint   (dispatch engine)
//!                              ├─ LocalActivation (ActivationRuntime)
//!                              └─ TurnGate
//! ```
//!
//! Concurrent first calls to the same path share one slot, so the actor is
//! activated exactly once. A failed activation leaves no slot behind; the
//! next call tries again.
//!
//! # Deactivation
//!
//! An activation is deactivated when it has been idle for the configured
//! timeout (and no keep-alive extension is pending), right after a turn in
//! which it called `deactivate_on_idle`, on explicit request, and on
//! shutdown. The activation stays in the table until `Deactivate` has
//! returned; calls arriving meanwhile wait for it and then land on a fresh
//! activation, so one path never has two live activations.
//!
//! ```text
//! call ──► Slot ──► retiring? ──yes──► wait for Deactivate ──► drop slot ──┐
//!   ▲                  │ no                                                │
//!   │                  └──► run turn                                       │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```

mod activation;
mod reminders;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::OnceCell;
use tokio::time::Instant;

pub use reminders::ReminderService;

use crate::actor::ActorPath;
use crate::endpoint::{ActivationState, ActorEndpoint, InvocationMode, TickStatus};
use crate::error::{EndpointError, SystemError};
use crate::registry::ActorTypeRegistry;
use crate::system::WeakActorSystem;
use activation::{Activation, LocalActivation, Turn};

#[derive(Default)]
struct Slot {
    activation: OnceCell<Rc<Activation>>,
}

/// Single-process activation engine.
pub struct LocalHost {
    system: WeakActorSystem,
    registry: Arc<ActorTypeRegistry>,
    idle_timeout: Duration,
    activations: RefCell<HashMap<ActorPath, Rc<Slot>>>,
    reminders: Rc<ReminderService>,
}

impl LocalHost {
    pub(crate) fn new(
        system: WeakActorSystem,
        registry: Arc<ActorTypeRegistry>,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            reminders: Rc::new(ReminderService::new(system.clone())),
            system,
            registry,
            idle_timeout,
            activations: RefCell::new(HashMap::new()),
        }
    }

    /// The reminder table.
    pub fn reminders(&self) -> &ReminderService {
        &self.reminders
    }

    /// Number of live activations.
    pub fn activation_count(&self) -> usize {
        self.activations
            .borrow()
            .values()
            .filter(|slot| slot.activation.initialized())
            .count()
    }

    /// Whether `path` currently has a live activation.
    pub fn is_active(&self, path: &ActorPath) -> bool {
        self.activations
            .borrow()
            .get(path)
            .is_some_and(|slot| slot.activation.initialized())
    }

    /// Lifecycle state of the activation at `path`, if any.
    pub fn activation_state(&self, path: &ActorPath) -> Option<ActivationState> {
        self.activations
            .borrow()
            .get(path)?
            .activation
            .get()
            .map(|activation| activation.endpoint().state())
    }

    /// Deliver `message` to `path`, activating the actor if needed.
    pub async fn invoke(
        &self,
        path: &ActorPath,
        mode: InvocationMode,
        message: Value,
    ) -> Result<Value, SystemError> {
        self.run(path, Turn::Invoke(mode, message)).await
    }

    /// Deliver a reminder tick to `path`, activating the actor if needed.
    pub async fn deliver_reminder(
        &self,
        path: &ActorPath,
        name: &str,
        status: TickStatus,
    ) -> Result<(), SystemError> {
        self.run(path, Turn::Reminder(name.to_string(), status))
            .await
            .map(|_| ())
    }

    async fn run(&self, path: &ActorPath, turn: Turn) -> Result<Value, SystemError> {
        loop {
            let activation = self.activation(path).await?;
            let result = activation.run(turn.clone()).await;
            self.after_turn(&activation).await;

            match result {
                // Lost a race with deactivation; go again on a fresh activation.
                Err(EndpointError::NotActive(state)) if state.is_leaving() => {
                    tracing::debug!("Retrying turn on {} after deactivation", path);
                    continue;
                }
                other => return Ok(other?),
            }
        }
    }

    /// Make sure `path` is active.
    ///
    /// An actor that asked to be deactivated on idle while activating is
    /// deactivated again before this returns.
    pub async fn activate(&self, path: &ActorPath) -> Result<(), SystemError> {
        let activation = self.activation(path).await?;
        self.after_turn(&activation).await;
        Ok(())
    }

    async fn activation(&self, path: &ActorPath) -> Result<Rc<Activation>, SystemError> {
        loop {
            let slot = self
                .activations
                .borrow_mut()
                .entry(path.clone())
                .or_default()
                .clone();

            let activation = match slot.activation.get_or_try_init(|| self.create(path)).await {
                Ok(activation) => activation.clone(),
                Err(e) => {
                    self.remove_slot(path, |candidate| Rc::ptr_eq(candidate, &slot));
                    return Err(e);
                }
            };

            if !activation.is_retiring() {
                return Ok(activation);
            }
            tracing::debug!("Waiting for {} to finish deactivating", path);
            activation.terminated().await;
            self.forget(&activation);
        }
    }

    async fn create(&self, path: &ActorPath) -> Result<Rc<Activation>, SystemError> {
        let runtime = Rc::new(LocalActivation::new(
            path.clone(),
            self.idle_timeout,
            self.reminders.clone(),
        ));
        let endpoint = ActorEndpoint::new(
            &self.registry,
            path.code().as_str(),
            runtime.clone(),
            self.system.clone(),
        )?;
        endpoint.on_activate().await?;

        Ok(Rc::new(Activation::new(path.clone(), endpoint, runtime)))
    }

    fn remove_slot(&self, path: &ActorPath, matches: impl Fn(&Rc<Slot>) -> bool) {
        let mut activations = self.activations.borrow_mut();
        if activations.get(path).is_some_and(matches) {
            activations.remove(path);
        }
    }

    async fn after_turn(&self, activation: &Rc<Activation>) {
        if activation.runtime().deactivate_requested() && activation.in_flight() == 0 {
            if let Err(e) = self.retire(activation).await {
                tracing::warn!("Deactivation of {} reported: {}", activation.path(), e);
            }
        }
    }

    /// Deliver `Deactivate`, then remove `activation` from the table.
    ///
    /// When a deactivation is already under way, waits for it instead.
    async fn retire(&self, activation: &Rc<Activation>) -> Result<(), EndpointError> {
        let result = match activation.deactivate().await {
            Some(result) => result,
            None => {
                activation.terminated().await;
                Ok(())
            }
        };
        self.forget(activation);
        result
    }

    fn forget(&self, activation: &Rc<Activation>) {
        self.remove_slot(activation.path(), |slot| {
            slot.activation
                .get()
                .is_some_and(|current| Rc::ptr_eq(current, activation))
        });
    }

    /// Deactivate `path` if it is active.
    ///
    /// Returns `false` when there was nothing to deactivate. A failing
    /// `Deactivate` still terminates the activation; the failure is returned.
    pub async fn deactivate(&self, path: &ActorPath) -> Result<bool, SystemError> {
        let activation = self
            .activations
            .borrow()
            .get(path)
            .and_then(|slot| slot.activation.get().cloned());

        match activation {
            Some(activation) => {
                self.retire(&activation).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Deactivate every idle activation; returns how many were collected.
    pub async fn collect_idle(&self) -> usize {
        let now = Instant::now();
        let idle: Vec<Rc<Activation>> = self
            .activations
            .borrow()
            .values()
            .filter_map(|slot| slot.activation.get().cloned())
            .filter(|activation| activation.is_collectable(now))
            .collect();

        for activation in &idle {
            if let Err(e) = self.retire(activation).await {
                tracing::warn!("Deactivation of {} reported: {}", activation.path(), e);
            }
        }
        if !idle.is_empty() {
            tracing::debug!("Collected {} idle activations", idle.len());
        }
        idle.len()
    }

    /// Stop reminders and deactivate everything.
    pub async fn shutdown(&self) {
        self.reminders.clear();

        let activations: Vec<Rc<Activation>> = self
            .activations
            .borrow()
            .values()
            .filter_map(|slot| slot.activation.get().cloned())
            .collect();

        tracing::info!("Shutting down {} activations", activations.len());
        for activation in &activations {
            if let Err(e) = self.retire(activation).await {
                tracing::warn!("Deactivation of {} reported: {}", activation.path(), e);
            }
        }
    }
}
