//! Actor system facade.
//!
//! [`ActorSystem`] ties the pieces together: it builds the
//! [`ActorTypeRegistry`] from the configured libraries, owns the embedded
//! [`LocalHost`] and hands out [`ActorRef`]s.
//!
//! ```text
//!  ActorSystem::builder()
//!      .library(..)            ┐
//!      .bootstrapper(..)       │ done()
//!      .done().await ──────────┴──► registry ──► LocalHost ──► bootstrappers ──► idle collector
//! ```
//!
//! Everything is single-threaded: the system is `!Send` and must be used from
//! inside a tokio `LocalSet`.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::AbortHandle;

use crate::actor::{Actor, ActorPath};
use crate::config::SystemConfig;
use crate::declaration::{ActorLibrary, ActorTypeCode};
use crate::endpoint::InvocationMode;
use crate::error::{ActorError, SystemError};
use crate::hosting::LocalHost;
use crate::registry::ActorTypeRegistry;

struct SystemInner {
    registry: Arc<ActorTypeRegistry>,
    host: LocalHost,
    config: SystemConfig,
    collector: RefCell<Option<AbortHandle>>,
}

impl Drop for SystemInner {
    fn drop(&mut self) {
        if let Some(collector) = self.collector.get_mut().take() {
            collector.abort();
        }
    }
}

/// Handle to a running actor system. Cheap to clone.
#[derive(Clone)]
pub struct ActorSystem(Rc<SystemInner>);

/// Non-owning handle to an [`ActorSystem`].
///
/// Held by activations and [`ActorRef`]s so they never keep the system alive.
#[derive(Clone, Default)]
pub struct WeakActorSystem(Weak<SystemInner>);

impl WeakActorSystem {
    /// The system, if it is still alive.
    pub fn upgrade(&self) -> Option<ActorSystem> {
        self.0.upgrade().map(ActorSystem)
    }
}

impl fmt::Debug for WeakActorSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakActorSystem")
            .field("alive", &(self.0.strong_count() > 0))
            .finish()
    }
}

impl ActorSystem {
    /// Start configuring a new system.
    pub fn builder() -> ActorSystemBuilder {
        ActorSystemBuilder::default()
    }

    /// The registry built from the configured libraries.
    pub fn registry(&self) -> &ActorTypeRegistry {
        &self.0.registry
    }

    /// The embedded host.
    pub fn host(&self) -> &LocalHost {
        &self.0.host
    }

    /// Configuration the system was built with.
    pub fn config(&self) -> &SystemConfig {
        &self.0.config
    }

    /// Non-owning handle to this system.
    pub fn downgrade(&self) -> WeakActorSystem {
        WeakActorSystem(Rc::downgrade(&self.0))
    }

    /// Reference to actor `id` of implementation `A`.
    ///
    /// Fails when `A` is not part of any configured library.
    pub fn actor_of<A: Actor>(&self, id: impl Into<String>) -> Result<ActorRef, SystemError> {
        let actor_type = self
            .0
            .registry
            .of::<A>()
            .ok_or(SystemError::UnregisteredImplementation(std::any::type_name::<A>()))?;
        Ok(self.actor_ref(ActorPath::new(actor_type.code().clone(), id)))
    }

    /// Reference to actor `id` of the kind registered under `code`.
    ///
    /// The code is not checked here; calling an unknown kind fails at
    /// activation.
    pub fn actor_of_code(&self, code: &str, id: impl Into<String>) -> ActorRef {
        self.actor_ref(ActorPath::new(ActorTypeCode::from(code), id))
    }

    /// Reference to the actor at `path`.
    pub fn actor_ref(&self, path: ActorPath) -> ActorRef {
        ActorRef::new(self.downgrade(), path)
    }

    /// Stop the idle collector, drop all reminders and deactivate every
    /// activation.
    pub async fn shutdown(&self) {
        if let Some(collector) = self.0.collector.borrow_mut().take() {
            collector.abort();
        }
        self.0.host.shutdown().await;
        tracing::info!("Actor system shut down");
    }
}

impl fmt::Debug for ActorSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorSystem")
            .field("module", &self.0.registry.module().name())
            .field("actor_types", &self.0.registry.len())
            .field("activations", &self.0.host.activation_count())
            .finish()
    }
}

/// Addressable reference to one actor.
///
/// Calls activate the target on demand. The invocation mode of
/// [`ask`](Self::ask) and [`tell`](Self::tell) follows the target kind's
/// [`Actor::is_reentrant`]; the `_reentrant` variants force it.
#[derive(Clone)]
pub struct ActorRef {
    system: WeakActorSystem,
    path: ActorPath,
}

impl ActorRef {
    /// Reference to `path` within `system`.
    pub fn new(system: WeakActorSystem, path: ActorPath) -> Self {
        Self { system, path }
    }

    /// Path of the target.
    pub fn path(&self) -> &ActorPath {
        &self.path
    }

    /// Request/response call.
    pub async fn ask<R: DeserializeOwned>(
        &self,
        message: &impl Serialize,
    ) -> Result<R, SystemError> {
        let reply = self.call(message, None, true).await?;
        Ok(serde_json::from_value(reply)?)
    }

    /// Call without a reply value. Completes once the message was handled.
    pub async fn tell(&self, message: &impl Serialize) -> Result<(), SystemError> {
        self.call(message, None, false).await.map(|_| ())
    }

    /// Request/response call, always interleaved with other turns.
    pub async fn ask_reentrant<R: DeserializeOwned>(
        &self,
        message: &impl Serialize,
    ) -> Result<R, SystemError> {
        let reply = self.call(message, Some(true), true).await?;
        Ok(serde_json::from_value(reply)?)
    }

    /// Call without a reply value, always interleaved with other turns.
    pub async fn tell_reentrant(&self, message: &impl Serialize) -> Result<(), SystemError> {
        self.call(message, Some(true), false).await.map(|_| ())
    }

    async fn call(
        &self,
        message: &impl Serialize,
        reentrant: Option<bool>,
        expects_reply: bool,
    ) -> Result<serde_json::Value, SystemError> {
        let system = self.system.upgrade().ok_or(SystemError::SystemDropped)?;
        let message = serde_json::to_value(message)?;

        let reentrant = reentrant.unwrap_or_else(|| {
            system
                .registry()
                .registered(self.path.code().as_str())
                .is_some_and(|actor_type| actor_type.is_reentrant(&message))
        });
        let mode = InvocationMode::new(reentrant, expects_reply);

        tracing::trace!("Calling {} in {:?} mode", self.path, mode);
        system.host().invoke(&self.path, mode, message).await
    }
}

impl fmt::Debug for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorRef({})", self.path)
    }
}

/// Startup hook run once the system is built.
///
/// Bootstrappers run in registration order; the first failure aborts
/// [`ActorSystemBuilder::done`].
#[async_trait(?Send)]
pub trait Bootstrapper {
    /// Run against the freshly built system.
    async fn run(&self, system: &ActorSystem) -> Result<(), ActorError>;
}

/// Builder for [`ActorSystem`].
#[derive(Default)]
pub struct ActorSystemBuilder {
    config: SystemConfig,
    libraries: Vec<ActorLibrary>,
    bootstrappers: Vec<Box<dyn Bootstrapper>>,
}

impl ActorSystemBuilder {
    /// Use `config` instead of the defaults.
    pub fn config(mut self, config: SystemConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a library to scan for actor implementations.
    pub fn library(mut self, library: ActorLibrary) -> Self {
        self.libraries.push(library);
        self
    }

    /// Add a startup hook.
    pub fn bootstrapper(mut self, bootstrapper: impl Bootstrapper + 'static) -> Self {
        self.bootstrappers.push(Box::new(bootstrapper));
        self
    }

    /// Build the registry, start the host and run the bootstrappers.
    ///
    /// # Errors
    ///
    /// [`SystemError::Registration`] when endpoint compilation fails,
    /// [`SystemError::Bootstrap`] when a bootstrapper fails.
    pub async fn done(self) -> Result<ActorSystem, SystemError> {
        let registry = Arc::new(ActorTypeRegistry::build(
            &self.libraries,
            self.config.compile(),
        )?);
        let idle_timeout = self.config.idle_timeout();
        let config = self.config;

        let inner = Rc::new_cyclic(|weak: &Weak<SystemInner>| SystemInner {
            host: LocalHost::new(WeakActorSystem(weak.clone()), registry.clone(), idle_timeout),
            registry,
            config,
            collector: RefCell::new(None),
        });
        let system = ActorSystem(inner);

        tracing::info!(
            "Actor system built: module={}, actor_types={}",
            system.registry().module().name(),
            system.registry().len()
        );

        for bootstrapper in &self.bootstrappers {
            bootstrapper.run(&system).await.map_err(SystemError::Bootstrap)?;
        }

        if let Some(interval) = system.config().collection_interval() {
            let collector = spawn_collector(system.downgrade(), interval);
            *system.0.collector.borrow_mut() = Some(collector);
        }

        Ok(system)
    }
}

fn spawn_collector(system: WeakActorSystem, interval: std::time::Duration) -> AbortHandle {
    tokio::task::spawn_local(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(system) = system.upgrade() else {
                break;
            };
            system.host().collect_idle().await;
        }
    })
    .abort_handle()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dropped_system_does_not_upgrade() {
        let weak = WeakActorSystem::default();
        assert!(weak.upgrade().is_none());

        let actor = ActorRef::new(weak, ActorPath::new(ActorTypeCode::from("Foo.A"), "1"));
        assert_eq!(actor.path().identity(), "Foo.A:1");
        assert_eq!(format!("{:?}", actor), "ActorRef(Foo.A:1)");
    }
}
