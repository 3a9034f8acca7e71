//! Endpoint dispatch engine.
//!
//! An [`ActorEndpoint`] is the adapter instance a hosting runtime creates for
//! one activation. It owns nothing of the scheduling: the host decides when
//! turns run and in which [`InvocationMode`]. The endpoint translates host
//! callbacks into messages for the actor's receiver pipeline and enforces the
//! lifecycle ordering around them.
//!
//! # Lifecycle
//!
//! ```text
//!              on_activate                    on_deactivate
//!  Created ───────────────► Activating ──► Active ───────────► Deactivating ──► Terminated
//!                              │                                   ▲
//!                              └──────────── (failure) ────────────┘
//! ```
//!
//! - `Activate` is delivered before any application message
//! - `Deactivate` is delivered last, and termination happens whether it
//!   succeeds or not
//! - application messages and reminders are refused outside `Active`
//!
//! # Keep-Alive
//!
//! Every delivery of an application message or reminder first applies the
//! actor kind's [`KeepAlive`](crate::actor::KeepAlive) policy to the runtime,
//! whatever the outcome of the delivery.

mod lifecycle;
mod runtime;

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use serde_json::Value;

pub use lifecycle::ActivationState;
pub use runtime::{
    ActivationRuntime, InvocationMode, LocalBoxFuture, ReminderHandle, TickStatus, TimerCallback,
    TimerHandle,
};

use crate::actor::{ActorContext, ActorPath, Message, Receiver, Reminder};
use crate::error::{ActivationError, EndpointError};
use crate::registry::{ActorType, ActorTypeRegistry};
use crate::system::WeakActorSystem;

/// Adapter between one hosted activation and an actor's receiver pipeline.
pub struct ActorEndpoint {
    actor_type: Arc<ActorType>,
    runtime: Rc<dyn ActivationRuntime>,
    system: WeakActorSystem,
    state: Rc<Cell<ActivationState>>,
    context: RefCell<Option<Rc<ActorContext>>>,
    receiver: RefCell<Option<Receiver>>,
    #[cfg(debug_assertions)]
    last_reentrant: RefCell<Option<Value>>,
    #[cfg(debug_assertions)]
    last_reentrant_void: RefCell<Option<Value>>,
}

impl ActorEndpoint {
    /// Create the endpoint for an activation of actor kind `code`.
    ///
    /// Fails with [`ActivationError::UnknownActorType`] when `code` is not
    /// registered; the activation must then be discarded without delivering
    /// anything.
    pub fn new(
        registry: &ActorTypeRegistry,
        code: &str,
        runtime: Rc<dyn ActivationRuntime>,
        system: WeakActorSystem,
    ) -> Result<Self, ActivationError> {
        let actor_type = registry
            .registered(code)
            .cloned()
            .ok_or_else(|| ActivationError::UnknownActorType(code.to_string()))?;

        Ok(Self {
            actor_type,
            runtime,
            system,
            state: Rc::new(Cell::new(ActivationState::Created)),
            context: RefCell::new(None),
            receiver: RefCell::new(None),
            #[cfg(debug_assertions)]
            last_reentrant: RefCell::new(None),
            #[cfg(debug_assertions)]
            last_reentrant_void: RefCell::new(None),
        })
    }

    /// Actor kind served by this endpoint.
    pub fn actor_type(&self) -> &Arc<ActorType> {
        &self.actor_type
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ActivationState {
        self.state.get()
    }

    /// Context of the activation, once activation has started.
    pub fn context(&self) -> Option<Rc<ActorContext>> {
        self.context.borrow().clone()
    }

    fn transition(&self, next: ActivationState) {
        let current = self.state.get();
        debug_assert!(
            current.may_enter(next),
            "invalid activation transition {current:?} -> {next:?}"
        );
        tracing::debug!(
            "Activation {} state {:?} -> {:?}",
            self.runtime.identity(),
            current,
            next
        );
        self.state.set(next);
    }

    /// Abort a failed activation.
    fn abort(&self) {
        self.receiver.borrow_mut().take();
        self.context.borrow_mut().take();
        self.transition(ActivationState::Deactivating);
        self.transition(ActivationState::Terminated);
    }

    /// Start the activation and deliver `Activate`.
    ///
    /// Builds the [`ActorPath`] from the runtime identity, the
    /// [`ActorContext`] and the receiver. Any failure leaves the endpoint
    /// `Terminated`; the host must discard it.
    pub async fn on_activate(&self) -> Result<(), ActivationError> {
        let state = self.state.get();
        if state != ActivationState::Created {
            return Err(ActivationError::InvalidState(state));
        }
        self.transition(ActivationState::Activating);

        let result = self.activate().await;
        match &result {
            Ok(()) => {
                self.transition(ActivationState::Active);
                tracing::info!("Activated {}", self.runtime.identity());
            }
            Err(e) => {
                tracing::warn!("Activation {} failed: {}", self.runtime.identity(), e);
                self.abort();
            }
        }
        result
    }

    async fn activate(&self) -> Result<(), ActivationError> {
        let identity = self.runtime.identity();
        let path = ActorPath::parse(identity).map_err(|source| ActivationError::InvalidPath {
            identity: identity.to_string(),
            source,
        })?;
        if path.code() != self.actor_type.code() {
            return Err(ActivationError::PathMismatch {
                path: path.to_string(),
                expected: self.actor_type.code().to_string(),
            });
        }

        let ctx = Rc::new(ActorContext::new(
            path.clone(),
            self.system.clone(),
            self.runtime.clone(),
            self.state.clone(),
        ));
        *self.context.borrow_mut() = Some(ctx.clone());

        let receiver =
            self.actor_type
                .receiver(path.id(), &ctx)
                .map_err(|source| ActivationError::Factory {
                    path: path.to_string(),
                    source,
                })?;
        *self.receiver.borrow_mut() = Some(receiver.clone());

        receiver
            .receive(&ctx, Message::Activate)
            .await
            .map_err(|source| ActivationError::Activate {
                path: path.to_string(),
                source,
            })?;
        Ok(())
    }

    fn live(&self) -> Result<(Rc<ActorContext>, Receiver), EndpointError> {
        let state = self.state.get();
        if !state.accepts_messages() {
            return Err(EndpointError::NotActive(state));
        }
        let ctx = self.context.borrow().clone();
        let receiver = self.receiver.borrow().clone();
        match (ctx, receiver) {
            (Some(ctx), Some(receiver)) => Ok((ctx, receiver)),
            _ => Err(EndpointError::NotActive(state)),
        }
    }

    async fn deliver(&self, message: Message) -> Result<Value, EndpointError> {
        let (ctx, receiver) = self.live()?;
        self.actor_type.keep_alive(self.runtime.as_ref());
        tracing::debug!(
            "Delivering {} message to {}",
            message.kind(),
            ctx.path()
        );
        Ok(receiver.receive(&ctx, message).await?)
    }

    /// Exclusive call; returns the reply.
    pub async fn receive(&self, message: Value) -> Result<Value, EndpointError> {
        self.deliver(Message::Application(message)).await
    }

    /// Exclusive call; discards the reply.
    pub async fn receive_void(&self, message: Value) -> Result<(), EndpointError> {
        self.deliver(Message::Application(message)).await?;
        Ok(())
    }

    /// Reentrant call; returns the reply.
    pub async fn receive_reentrant(&self, message: Value) -> Result<Value, EndpointError> {
        #[cfg(debug_assertions)]
        self.last_reentrant.replace(Some(message.clone()));
        self.deliver(Message::Application(message)).await
    }

    /// Reentrant call; discards the reply.
    pub async fn receive_reentrant_void(&self, message: Value) -> Result<(), EndpointError> {
        #[cfg(debug_assertions)]
        self.last_reentrant_void.replace(Some(message.clone()));
        self.deliver(Message::Application(message)).await?;
        Ok(())
    }

    /// Route `message` through the entry point matching `mode`.
    ///
    /// Void modes reply with `Value::Null`.
    pub async fn invoke(&self, mode: InvocationMode, message: Value) -> Result<Value, EndpointError> {
        match mode {
            InvocationMode::Exclusive => self.receive(message).await,
            InvocationMode::ExclusiveVoid => {
                self.receive_void(message).await.map(|()| Value::Null)
            }
            InvocationMode::Reentrant => self.receive_reentrant(message).await,
            InvocationMode::ReentrantVoid => self
                .receive_reentrant_void(message)
                .await
                .map(|()| Value::Null),
        }
    }

    /// Deliver a fired reminder.
    pub async fn receive_reminder(&self, name: &str, status: TickStatus) -> Result<(), EndpointError> {
        tracing::debug!(
            "Reminder {} fired for {} (period {:?})",
            name,
            self.runtime.identity(),
            status.period
        );
        self.deliver(Message::Reminder(Reminder::new(name))).await?;
        Ok(())
    }

    /// Deliver `Deactivate` and terminate.
    ///
    /// A no-op when activation never built a context. Otherwise the endpoint
    /// ends `Terminated` whatever `Deactivate` returns; a receiver failure is
    /// logged and handed back to the host.
    pub async fn on_deactivate(&self) -> Result<(), EndpointError> {
        let Some(ctx) = self.context.borrow().clone() else {
            return Ok(());
        };
        if self.state.get() != ActivationState::Active {
            return Ok(());
        }

        self.transition(ActivationState::Deactivating);
        let receiver = self.receiver.borrow().clone();
        let result = match receiver {
            Some(receiver) => receiver.receive(&ctx, Message::Deactivate).await,
            None => Ok(Value::Null),
        };

        self.receiver.borrow_mut().take();
        self.context.borrow_mut().take();
        self.transition(ActivationState::Terminated);

        match result {
            Ok(_) => {
                tracing::info!("Deactivated {}", ctx.path());
                Ok(())
            }
            Err(e) => {
                tracing::error!("Deactivate failed for {}: {}", ctx.path(), e);
                Err(EndpointError::Receiver(e))
            }
        }
    }

    /// Last message delivered through [`receive_reentrant`](Self::receive_reentrant).
    #[cfg(debug_assertions)]
    pub fn last_reentrant_message(&self) -> Option<Value> {
        self.last_reentrant.borrow().clone()
    }

    /// Last message delivered through
    /// [`receive_reentrant_void`](Self::receive_reentrant_void).
    #[cfg(debug_assertions)]
    pub fn last_reentrant_void_message(&self) -> Option<Value> {
        self.last_reentrant_void.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::time::Instant;

    use super::*;
    use crate::actor::{Actor, KeepAlive};
    use crate::config::CompileOptions;
    use crate::declaration::{ActorLibrary, ActorTypeCode};
    use crate::error::{ActorError, RuntimeError};

    thread_local! {
        static LOG: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    }

    fn log(entry: impl Into<String>) {
        LOG.with(|log| log.borrow_mut().push(entry.into()));
    }

    fn take_log() -> Vec<String> {
        LOG.with(|log| log.borrow_mut().drain(..).collect())
    }

    /// Logs every message; fails on `{"fail": ..}` and on activation of id
    /// `"broken"`.
    struct Recorder;

    #[async_trait(?Send)]
    impl Actor for Recorder {
        fn type_code() -> ActorTypeCode {
            ActorTypeCode::from("Foo.A")
        }

        fn keep_alive() -> KeepAlive {
            KeepAlive::Extend(Duration::from_secs(60))
        }

        fn activate(id: &str, _ctx: &ActorContext) -> Result<Self, ActorError> {
            if id == "unbuildable" {
                return Err(ActorError::Failed("factory".into()));
            }
            Ok(Recorder)
        }

        async fn receive(&self, ctx: &ActorContext, message: Message) -> Result<Value, ActorError> {
            match &message {
                Message::Activate if ctx.id() == "broken" => {
                    log("activate");
                    Err(ActorError::Failed("cannot activate".into()))
                }
                Message::Activate => {
                    log("activate");
                    Ok(Value::Null)
                }
                Message::Deactivate if ctx.id() == "stubborn" => {
                    log("deactivate");
                    Err(ActorError::Failed("cannot deactivate".into()))
                }
                Message::Deactivate => {
                    log("deactivate");
                    Ok(Value::Null)
                }
                Message::Reminder(reminder) => {
                    log(format!("reminder {}", reminder.name()));
                    Ok(Value::Null)
                }
                Message::Application(payload) => {
                    log(format!("app {payload}"));
                    if payload.get("fail").is_some() {
                        Err(ActorError::Failed("requested".into()))
                    } else {
                        Ok(json!({ "echo": payload }))
                    }
                }
            }
        }
    }

    struct TestRuntime {
        identity: String,
        delays: Cell<usize>,
    }

    impl TestRuntime {
        fn new(identity: &str) -> Rc<Self> {
            Rc::new(Self {
                identity: identity.to_string(),
                delays: Cell::new(0),
            })
        }
    }

    #[async_trait(?Send)]
    impl ActivationRuntime for TestRuntime {
        fn identity(&self) -> &str {
            &self.identity
        }

        fn deactivate_on_idle(&self) {}

        fn delay_deactivation(&self, _period: Duration) -> Result<(), RuntimeError> {
            self.delays.set(self.delays.get() + 1);
            Ok(())
        }

        fn register_timer(&self, _: TimerCallback, _: Duration, _: Duration) -> TimerHandle {
            TimerHandle::new(|| {})
        }

        async fn get_reminder(&self, _: &str) -> Result<Option<ReminderHandle>, RuntimeError> {
            Ok(None)
        }

        async fn get_reminders(&self) -> Result<Vec<ReminderHandle>, RuntimeError> {
            Ok(Vec::new())
        }

        async fn register_or_update_reminder(
            &self,
            name: &str,
            due: Duration,
            period: Duration,
        ) -> Result<ReminderHandle, RuntimeError> {
            Ok(ReminderHandle::new(name, due, period))
        }

        async fn unregister_reminder(&self, _: &ReminderHandle) -> Result<(), RuntimeError> {
            Ok(())
        }
    }

    fn run_local_test<F: std::future::Future<Output = ()> + 'static>(f: F) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("build runtime");
        tokio::task::LocalSet::new().block_on(&rt, f);
    }

    fn registry() -> ActorTypeRegistry {
        ActorTypeRegistry::build(
            &[ActorLibrary::new("demo").actor::<Recorder>()],
            CompileOptions::default(),
        )
        .expect("registry")
    }

    fn endpoint(identity: &str) -> (ActorEndpoint, Rc<TestRuntime>) {
        let runtime = TestRuntime::new(identity);
        let endpoint = ActorEndpoint::new(
            &registry(),
            "Foo.A",
            runtime.clone(),
            WeakActorSystem::default(),
        )
        .expect("endpoint");
        (endpoint, runtime)
    }

    fn tick() -> TickStatus {
        let now = Instant::now();
        TickStatus {
            first_tick: now,
            period: Duration::from_secs(1),
            current_tick: now,
        }
    }

    #[test]
    fn test_activate_first_deactivate_last() {
        run_local_test(async {
            let (endpoint, _) = endpoint("Foo.A:1");
            take_log();

            endpoint.on_activate().await.expect("activate");
            assert_eq!(endpoint.state(), ActivationState::Active);

            let reply = endpoint.receive(json!(1)).await.expect("receive");
            assert_eq!(reply, json!({ "echo": 1 }));
            endpoint.receive_void(json!(2)).await.expect("void");
            endpoint.receive_reminder("tick", tick()).await.expect("reminder");
            endpoint.on_deactivate().await.expect("deactivate");

            assert_eq!(
                take_log(),
                vec!["activate", "app 1", "app 2", "reminder tick", "deactivate"]
            );
            assert_eq!(endpoint.state(), ActivationState::Terminated);
            assert!(endpoint.context().is_none());

            // Nothing is delivered after Deactivate.
            assert!(matches!(
                endpoint.receive(json!(3)).await,
                Err(EndpointError::NotActive(ActivationState::Terminated))
            ));
            assert!(take_log().is_empty());
        });
    }

    #[test]
    fn test_messages_refused_before_activation() {
        run_local_test(async {
            let (endpoint, runtime) = endpoint("Foo.A:1");
            take_log();

            assert!(matches!(
                endpoint.receive(json!(1)).await,
                Err(EndpointError::NotActive(ActivationState::Created))
            ));
            assert_eq!(runtime.delays.get(), 0);
            assert!(take_log().is_empty());
        });
    }

    #[test]
    fn test_unknown_code_is_rejected() {
        let runtime = TestRuntime::new("Foo.Missing:1");
        let result = ActorEndpoint::new(
            &registry(),
            "Foo.Missing",
            runtime,
            WeakActorSystem::default(),
        );
        assert!(matches!(
            result,
            Err(ActivationError::UnknownActorType(code)) if code == "Foo.Missing"
        ));
    }

    #[test]
    fn test_keep_alive_on_every_delivery() {
        run_local_test(async {
            let (endpoint, runtime) = endpoint("Foo.A:1");
            endpoint.on_activate().await.expect("activate");
            assert_eq!(runtime.delays.get(), 0);

            endpoint.receive(json!(1)).await.expect("receive");
            let failed = endpoint.receive(json!({ "fail": true })).await;
            assert!(matches!(failed, Err(EndpointError::Receiver(_))));
            endpoint.receive_reentrant_void(json!(2)).await.expect("void");
            endpoint.receive_reminder("tick", tick()).await.expect("reminder");

            assert_eq!(runtime.delays.get(), 4);
            // A failing call does not end the activation.
            assert_eq!(endpoint.state(), ActivationState::Active);
        });
    }

    #[test]
    fn test_invoke_dispatches_by_mode() {
        run_local_test(async {
            let (endpoint, _) = endpoint("Foo.A:1");
            endpoint.on_activate().await.expect("activate");

            let reply = endpoint
                .invoke(InvocationMode::Reentrant, json!("r"))
                .await
                .expect("reentrant");
            assert_eq!(reply, json!({ "echo": "r" }));

            let reply = endpoint
                .invoke(InvocationMode::ExclusiveVoid, json!("v"))
                .await
                .expect("void");
            assert_eq!(reply, Value::Null);
        });
    }

    #[cfg(debug_assertions)]
    #[test]
    fn test_last_reentrant_message_recorded() {
        run_local_test(async {
            let (endpoint, _) = endpoint("Foo.A:1");
            endpoint.on_activate().await.expect("activate");

            endpoint.receive(json!("exclusive")).await.expect("receive");
            assert!(endpoint.last_reentrant_message().is_none());

            endpoint.receive_reentrant(json!("first")).await.expect("r1");
            endpoint.receive_reentrant(json!("second")).await.expect("r2");
            endpoint
                .receive_reentrant_void(json!("third"))
                .await
                .expect("r3");

            assert_eq!(endpoint.last_reentrant_message(), Some(json!("second")));
            assert_eq!(endpoint.last_reentrant_void_message(), Some(json!("third")));
        });
    }

    #[test]
    fn test_failed_activate_terminates() {
        run_local_test(async {
            let (endpoint, _) = endpoint("Foo.A:broken");
            take_log();

            let err = endpoint.on_activate().await.unwrap_err();
            assert!(matches!(err, ActivationError::Activate { .. }));
            assert_eq!(endpoint.state(), ActivationState::Terminated);
            assert!(endpoint.context().is_none());

            // No Deactivate for an activation that never became active.
            endpoint.on_deactivate().await.expect("no-op");
            assert_eq!(take_log(), vec!["activate"]);
        });
    }

    #[test]
    fn test_factory_failure_delivers_nothing() {
        run_local_test(async {
            let (endpoint, _) = endpoint("Foo.A:unbuildable");
            take_log();

            let err = endpoint.on_activate().await.unwrap_err();
            assert!(matches!(err, ActivationError::Factory { .. }));
            assert!(take_log().is_empty());
        });
    }

    #[test]
    fn test_identity_must_match_code() {
        run_local_test(async {
            let (mismatched, _) = endpoint("Foo.B:1");
            let err = mismatched.on_activate().await.unwrap_err();
            assert!(matches!(err, ActivationError::PathMismatch { .. }));

            let (malformed, _) = endpoint("no-separator");
            let err = malformed.on_activate().await.unwrap_err();
            assert!(matches!(err, ActivationError::InvalidPath { .. }));
        });
    }

    #[test]
    fn test_activate_twice_is_rejected() {
        run_local_test(async {
            let (endpoint, _) = endpoint("Foo.A:1");
            endpoint.on_activate().await.expect("activate");
            assert!(matches!(
                endpoint.on_activate().await,
                Err(ActivationError::InvalidState(ActivationState::Active))
            ));
        });
    }

    #[test]
    fn test_deactivate_without_context_is_noop() {
        run_local_test(async {
            let (endpoint, _) = endpoint("Foo.A:1");
            take_log();

            endpoint.on_deactivate().await.expect("no-op");
            assert_eq!(endpoint.state(), ActivationState::Created);
            assert!(take_log().is_empty());
        });
    }

    #[test]
    fn test_failed_deactivate_still_terminates() {
        run_local_test(async {
            let (endpoint, _) = endpoint("Foo.A:stubborn");
            endpoint.on_activate().await.expect("activate");
            take_log();

            let result = endpoint.on_deactivate().await;
            assert!(matches!(result, Err(EndpointError::Receiver(_))));
            assert_eq!(endpoint.state(), ActivationState::Terminated);
            assert_eq!(take_log(), vec!["deactivate"]);
        });
    }
}
