//! One hosted activation: the endpoint, its runtime unit and its turn gate.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard, Notify};
use tokio::task::AbortHandle;
use tokio::time::Instant;

use super::reminders::ReminderService;
use crate::actor::ActorPath;
use crate::endpoint::{
    ActivationRuntime, ActorEndpoint, InvocationMode, ReminderHandle, TickStatus, TimerCallback,
    TimerHandle,
};
use crate::error::{EndpointError, RuntimeError};

/// Work scheduled on an activation.
#[derive(Debug, Clone)]
pub(crate) enum Turn {
    Invoke(InvocationMode, Value),
    Reminder(String, TickStatus),
}

impl Turn {
    fn is_reentrant(&self) -> bool {
        match self {
            Turn::Invoke(mode, _) => mode.is_reentrant(),
            Turn::Reminder(..) => false,
        }
    }
}

/// Turn-based scheduling for one activation.
///
/// Exclusive turns hold `exclusive` for their whole duration and only start
/// once no reentrant turn is running. Reentrant turns never wait. Timer
/// ticks and `Deactivate` are exclusive turns.
struct TurnGate {
    exclusive: Mutex<()>,
    reentrant: Cell<usize>,
    drained: Notify,
}

struct ReentrantTurn<'a> {
    gate: &'a TurnGate,
}

impl Drop for ReentrantTurn<'_> {
    fn drop(&mut self) {
        let remaining = self.gate.reentrant.get() - 1;
        self.gate.reentrant.set(remaining);
        if remaining == 0 {
            self.gate.drained.notify_waiters();
        }
    }
}

impl TurnGate {
    fn new() -> Self {
        Self {
            exclusive: Mutex::new(()),
            reentrant: Cell::new(0),
            drained: Notify::new(),
        }
    }

    async fn exclusive(&self) -> MutexGuard<'_, ()> {
        let guard = self.exclusive.lock().await;
        loop {
            let drained = self.drained.notified();
            if self.reentrant.get() == 0 {
                return guard;
            }
            drained.await;
        }
    }

    fn reentrant(&self) -> ReentrantTurn<'_> {
        self.reentrant.set(self.reentrant.get() + 1);
        ReentrantTurn { gate: self }
    }
}

struct InFlight<'a> {
    count: &'a Cell<usize>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.count.set(self.count.get() - 1);
    }
}

/// A live activation in the host's table.
pub(crate) struct Activation {
    path: ActorPath,
    endpoint: ActorEndpoint,
    runtime: Rc<LocalActivation>,
    in_flight: Cell<usize>,
    terminated: Cell<bool>,
    retired: Notify,
}

impl Activation {
    pub(crate) fn new(path: ActorPath, endpoint: ActorEndpoint, runtime: Rc<LocalActivation>) -> Self {
        Self {
            path,
            endpoint,
            runtime,
            in_flight: Cell::new(0),
            terminated: Cell::new(false),
            retired: Notify::new(),
        }
    }

    pub(crate) fn path(&self) -> &ActorPath {
        &self.path
    }

    pub(crate) fn endpoint(&self) -> &ActorEndpoint {
        &self.endpoint
    }

    pub(crate) fn runtime(&self) -> &LocalActivation {
        &self.runtime
    }

    /// Turns running or waiting on the gate.
    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.get()
    }

    /// Run one turn through the gate.
    pub(crate) async fn run(&self, turn: Turn) -> Result<Value, EndpointError> {
        self.in_flight.set(self.in_flight.get() + 1);
        let _in_flight = InFlight {
            count: &self.in_flight,
        };
        self.runtime.touch();

        let result = if turn.is_reentrant() {
            let _turn = self.runtime.gate.reentrant();
            self.dispatch(turn).await
        } else {
            let _turn = self.runtime.gate.exclusive().await;
            self.dispatch(turn).await
        };

        self.runtime.touch();
        result
    }

    async fn dispatch(&self, turn: Turn) -> Result<Value, EndpointError> {
        match turn {
            Turn::Invoke(mode, message) => self.endpoint.invoke(mode, message).await,
            Turn::Reminder(name, status) => self
                .endpoint
                .receive_reminder(&name, status)
                .await
                .map(|()| Value::Null),
        }
    }

    /// Wait for every running turn, then deliver `Deactivate`.
    ///
    /// Returns `None` when another deactivation already started; use
    /// [`terminated`](Self::terminated) to wait for that one.
    pub(crate) async fn deactivate(&self) -> Option<Result<(), EndpointError>> {
        if !self.runtime.begin_deactivation() {
            return None;
        }
        let result = {
            let _turn = self.runtime.gate.exclusive().await;
            let result = self.endpoint.on_deactivate().await;
            self.runtime.dispose_timers();
            result
        };
        self.terminated.set(true);
        self.retired.notify_waiters();
        Some(result)
    }

    /// Deactivation has started; the activation takes no new turns.
    pub(crate) fn is_retiring(&self) -> bool {
        self.runtime.deactivating.get()
    }

    /// Resolves once `Deactivate` has returned.
    pub(crate) async fn terminated(&self) {
        loop {
            let retired = self.retired.notified();
            if self.terminated.get() {
                return;
            }
            retired.await;
        }
    }

    /// Idle and not busy.
    pub(crate) fn is_collectable(&self, now: Instant) -> bool {
        self.in_flight() == 0 && self.runtime.is_idle(now)
    }
}

type TimerTable = Rc<RefCell<HashMap<u64, AbortHandle>>>;

/// The host's [`ActivationRuntime`] for one activation.
pub(crate) struct LocalActivation {
    identity: String,
    path: ActorPath,
    idle_timeout: Duration,
    last_activity: Cell<Instant>,
    keep_alive_until: Cell<Option<Instant>>,
    deactivate_requested: Cell<bool>,
    deactivating: Cell<bool>,
    gate: Rc<TurnGate>,
    timers: TimerTable,
    next_timer: Cell<u64>,
    reminders: Rc<ReminderService>,
}

impl LocalActivation {
    pub(crate) fn new(path: ActorPath, idle_timeout: Duration, reminders: Rc<ReminderService>) -> Self {
        Self {
            identity: path.identity(),
            path,
            idle_timeout,
            last_activity: Cell::new(Instant::now()),
            keep_alive_until: Cell::new(None),
            deactivate_requested: Cell::new(false),
            deactivating: Cell::new(false),
            gate: Rc::new(TurnGate::new()),
            timers: Rc::new(RefCell::new(HashMap::new())),
            next_timer: Cell::new(0),
            reminders,
        }
    }

    pub(crate) fn touch(&self) {
        self.last_activity.set(Instant::now());
    }

    pub(crate) fn deactivate_requested(&self) -> bool {
        self.deactivate_requested.get()
    }

    pub(crate) fn is_idle(&self, now: Instant) -> bool {
        if self.deactivating.get() {
            return false;
        }
        if self.deactivate_requested.get() {
            return true;
        }
        let idle_for = now.saturating_duration_since(self.last_activity.get());
        let kept = self.keep_alive_until.get().is_some_and(|until| now < until);
        idle_for >= self.idle_timeout && !kept
    }

    /// Mark the activation as deactivating; false if it already was.
    pub(crate) fn begin_deactivation(&self) -> bool {
        !self.deactivating.replace(true)
    }

    pub(crate) fn dispose_timers(&self) {
        for (_, timer) in self.timers.borrow_mut().drain() {
            timer.abort();
        }
    }

    #[cfg(test)]
    pub(crate) fn timer_count(&self) -> usize {
        self.timers.borrow().len()
    }
}

#[async_trait(?Send)]
impl ActivationRuntime for LocalActivation {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn deactivate_on_idle(&self) {
        self.keep_alive_until.set(None);
        self.deactivate_requested.set(true);
    }

    fn delay_deactivation(&self, period: Duration) -> Result<(), RuntimeError> {
        if self.deactivating.get() {
            return Err(RuntimeError::Deactivating);
        }
        let until = Instant::now() + period;
        let current = self.keep_alive_until.get();
        if current.map_or(true, |current| current < until) {
            self.keep_alive_until.set(Some(until));
        }
        Ok(())
    }

    fn register_timer(&self, callback: TimerCallback, due: Duration, period: Duration) -> TimerHandle {
        let id = self.next_timer.get();
        self.next_timer.set(id + 1);

        let gate = self.gate.clone();
        let timers = self.timers.clone();
        let task = tokio::task::spawn_local(async move {
            tokio::time::sleep(due).await;
            loop {
                {
                    let _turn = gate.exclusive().await;
                    callback().await;
                }
                if period.is_zero() {
                    break;
                }
                tokio::time::sleep(period).await;
            }
            timers.borrow_mut().remove(&id);
        });
        self.timers.borrow_mut().insert(id, task.abort_handle());

        let timers = self.timers.clone();
        TimerHandle::new(move || {
            if let Some(timer) = timers.borrow_mut().remove(&id) {
                timer.abort();
            }
        })
    }

    async fn get_reminder(&self, name: &str) -> Result<Option<ReminderHandle>, RuntimeError> {
        Ok(self.reminders.get(&self.path, name))
    }

    async fn get_reminders(&self) -> Result<Vec<ReminderHandle>, RuntimeError> {
        Ok(self.reminders.list(&self.path))
    }

    async fn register_or_update_reminder(
        &self,
        name: &str,
        due: Duration,
        period: Duration,
    ) -> Result<ReminderHandle, RuntimeError> {
        self.reminders.register(&self.path, name, due, period)
    }

    async fn unregister_reminder(&self, reminder: &ReminderHandle) -> Result<(), RuntimeError> {
        self.reminders.unregister(&self.path, reminder.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::ActorTypeCode;
    use crate::endpoint::LocalBoxFuture;
    use crate::system::WeakActorSystem;

    fn run_local_test<F: std::future::Future<Output = ()> + 'static>(f: F) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .expect("build runtime");
        tokio::task::LocalSet::new().block_on(&rt, f);
    }

    fn runtime(idle_timeout: Duration) -> Rc<LocalActivation> {
        Rc::new(LocalActivation::new(
            ActorPath::new(ActorTypeCode::from("Foo.A"), "1"),
            idle_timeout,
            Rc::new(ReminderService::new(WeakActorSystem::default())),
        ))
    }

    #[test]
    fn test_idle_after_timeout() {
        run_local_test(async {
            let runtime = runtime(Duration::from_secs(10));
            assert!(!runtime.is_idle(Instant::now()));

            tokio::time::advance(Duration::from_secs(10)).await;
            assert!(runtime.is_idle(Instant::now()));

            runtime.touch();
            assert!(!runtime.is_idle(Instant::now()));
        });
    }

    #[test]
    fn test_delay_deactivation_extends_lifetime() {
        run_local_test(async {
            let runtime = runtime(Duration::from_secs(1));
            runtime
                .delay_deactivation(Duration::from_secs(30))
                .expect("delay");
            // A shorter extension never shortens the current one.
            runtime
                .delay_deactivation(Duration::from_secs(5))
                .expect("delay");

            tokio::time::advance(Duration::from_secs(20)).await;
            assert!(!runtime.is_idle(Instant::now()));

            tokio::time::advance(Duration::from_secs(10)).await;
            assert!(runtime.is_idle(Instant::now()));
        });
    }

    #[test]
    fn test_deactivate_on_idle_overrides_keep_alive() {
        run_local_test(async {
            let runtime = runtime(Duration::from_secs(600));
            runtime
                .delay_deactivation(Duration::from_secs(600))
                .expect("delay");
            runtime.deactivate_on_idle();

            assert!(runtime.deactivate_requested());
            assert!(runtime.is_idle(Instant::now()));
        });
    }

    #[test]
    fn test_deactivating_rejects_delay() {
        run_local_test(async {
            let runtime = runtime(Duration::from_secs(1));
            assert!(runtime.begin_deactivation());
            assert!(!runtime.begin_deactivation());
            assert_eq!(
                runtime.delay_deactivation(Duration::from_secs(1)),
                Err(RuntimeError::Deactivating)
            );
            assert!(!runtime.is_idle(Instant::now() + Duration::from_secs(5)));
        });
    }

    #[test]
    fn test_timer_ticks_until_disposed() {
        run_local_test(async {
            let runtime = runtime(Duration::from_secs(600));
            let ticks = Rc::new(Cell::new(0));

            let counter = ticks.clone();
            let callback: TimerCallback = Rc::new(move || -> LocalBoxFuture<()> {
                let counter = counter.clone();
                Box::pin(async move { counter.set(counter.get() + 1) })
            });
            let handle = runtime.register_timer(callback, Duration::from_secs(1), Duration::from_secs(1));
            assert_eq!(runtime.timer_count(), 1);

            tokio::time::sleep(Duration::from_millis(3500)).await;
            assert_eq!(ticks.get(), 3);

            handle.dispose();
            assert_eq!(runtime.timer_count(), 0);
            tokio::time::sleep(Duration::from_secs(5)).await;
            assert_eq!(ticks.get(), 3);
        });
    }

    #[test]
    fn test_one_shot_timer_and_dispose_all() {
        run_local_test(async {
            let runtime = runtime(Duration::from_secs(600));
            let ticks = Rc::new(Cell::new(0));

            for period in [Duration::ZERO, Duration::from_secs(1)] {
                let counter = ticks.clone();
                let callback: TimerCallback = Rc::new(move || -> LocalBoxFuture<()> {
                    let counter = counter.clone();
                    Box::pin(async move { counter.set(counter.get() + 1) })
                });
                // Dropping the handle keeps the timer running.
                drop(runtime.register_timer(callback, Duration::ZERO, period));
            }

            tokio::time::sleep(Duration::from_millis(1500)).await;
            // One-shot fired once, periodic fired at 0s and 1s.
            assert_eq!(ticks.get(), 3);
            assert_eq!(runtime.timer_count(), 1);

            runtime.dispose_timers();
            tokio::time::sleep(Duration::from_secs(5)).await;
            assert_eq!(ticks.get(), 3);
        });
    }

    #[test]
    fn test_timer_tick_waits_for_running_turn() {
        run_local_test(async {
            let runtime = runtime(Duration::from_secs(600));
            let order = Rc::new(RefCell::new(Vec::new()));

            let turn = {
                let runtime = runtime.clone();
                let order = order.clone();
                tokio::task::spawn_local(async move {
                    let _turn = runtime.gate.exclusive().await;
                    order.borrow_mut().push("turn start");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    order.borrow_mut().push("turn end");
                })
            };
            tokio::task::yield_now().await;

            let log = order.clone();
            let callback: TimerCallback = Rc::new(move || -> LocalBoxFuture<()> {
                let log = log.clone();
                Box::pin(async move { log.borrow_mut().push("tick") })
            });
            drop(runtime.register_timer(callback, Duration::from_secs(1), Duration::ZERO));

            turn.await.expect("turn");
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert_eq!(*order.borrow(), vec!["turn start", "turn end", "tick"]);
        });
    }

    #[test]
    fn test_exclusive_waits_for_reentrant_turns() {
        run_local_test(async {
            let gate = Rc::new(TurnGate::new());
            let order = Rc::new(RefCell::new(Vec::new()));

            let reentrant = {
                let gate = gate.clone();
                let order = order.clone();
                tokio::task::spawn_local(async move {
                    let _turn = gate.reentrant();
                    order.borrow_mut().push("reentrant start");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    order.borrow_mut().push("reentrant end");
                })
            };
            tokio::task::yield_now().await;

            let exclusive = {
                let gate = gate.clone();
                let order = order.clone();
                tokio::task::spawn_local(async move {
                    let _turn = gate.exclusive().await;
                    order.borrow_mut().push("exclusive");
                })
            };

            reentrant.await.expect("reentrant");
            exclusive.await.expect("exclusive");
            assert_eq!(
                *order.borrow(),
                vec!["reentrant start", "reentrant end", "exclusive"]
            );
        });
    }
}
