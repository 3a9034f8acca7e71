//! Reminder service of the embedded host.
//!
//! Reminders are keyed by actor path and name, not by activation: they keep
//! firing after the activation that registered them is gone, and a tick
//! re-activates the actor through the host.

use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;

use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::actor::ActorPath;
use crate::endpoint::{ReminderHandle, TickStatus};
use crate::error::RuntimeError;
use crate::system::WeakActorSystem;

struct ReminderEntry {
    handle: ReminderHandle,
    ticker: AbortHandle,
}

/// In-memory reminder table with one ticker task per reminder.
///
/// Tickers are spawned with [`tokio::task::spawn_local`]; registration must
/// happen inside a `LocalSet`.
pub struct ReminderService {
    system: WeakActorSystem,
    entries: RefCell<HashMap<(ActorPath, String), ReminderEntry>>,
}

impl ReminderService {
    pub(crate) fn new(system: WeakActorSystem) -> Self {
        Self {
            system,
            entries: RefCell::new(HashMap::new()),
        }
    }

    /// Register a reminder for `path`, replacing one with the same name.
    pub fn register(
        &self,
        path: &ActorPath,
        name: &str,
        due: Duration,
        period: Duration,
    ) -> Result<ReminderHandle, RuntimeError> {
        if period.is_zero() {
            return Err(RuntimeError::InvalidReminderPeriod {
                name: name.to_string(),
                period,
            });
        }

        let handle = ReminderHandle::new(name, due, period);
        let ticker = self.spawn_ticker(path.clone(), name.to_string(), due, period);

        let previous = self.entries.borrow_mut().insert(
            (path.clone(), name.to_string()),
            ReminderEntry {
                handle: handle.clone(),
                ticker,
            },
        );
        if let Some(previous) = previous {
            previous.ticker.abort();
            tracing::debug!("Reminder {} of {} updated", name, path);
        } else {
            tracing::debug!("Reminder {} of {} registered", name, path);
        }

        Ok(handle)
    }

    fn spawn_ticker(
        &self,
        path: ActorPath,
        name: String,
        due: Duration,
        period: Duration,
    ) -> AbortHandle {
        let system = self.system.clone();
        tokio::task::spawn_local(async move {
            tokio::time::sleep(due).await;
            let first_tick = Instant::now();
            loop {
                let status = TickStatus {
                    first_tick,
                    period,
                    current_tick: Instant::now(),
                };

                // Each tick is its own task so unregistering from inside the
                // reminder handler never cancels the handler itself.
                let system = system.clone();
                let path = path.clone();
                let name = name.clone();
                tokio::task::spawn_local(async move {
                    let Some(system) = system.upgrade() else {
                        return;
                    };
                    if let Err(e) = system.host().deliver_reminder(&path, &name, status).await {
                        tracing::warn!("Reminder {} for {} failed: {}", name, path, e);
                    }
                });

                tokio::time::sleep(period).await;
            }
        })
        .abort_handle()
    }

    /// Look up a reminder.
    pub fn get(&self, path: &ActorPath, name: &str) -> Option<ReminderHandle> {
        self.entries
            .borrow()
            .get(&(path.clone(), name.to_string()))
            .map(|entry| entry.handle.clone())
    }

    /// All reminders of `path`, ordered by name.
    pub fn list(&self, path: &ActorPath) -> Vec<ReminderHandle> {
        let mut handles: Vec<_> = self
            .entries
            .borrow()
            .iter()
            .filter(|((owner, _), _)| owner == path)
            .map(|(_, entry)| entry.handle.clone())
            .collect();
        handles.sort_by(|a, b| a.name().cmp(b.name()));
        handles
    }

    /// Remove a reminder and stop its ticker.
    pub fn unregister(&self, path: &ActorPath, name: &str) -> Result<(), RuntimeError> {
        let entry = self
            .entries
            .borrow_mut()
            .remove(&(path.clone(), name.to_string()))
            .ok_or_else(|| RuntimeError::ReminderNotFound(name.to_string()))?;
        entry.ticker.abort();
        tracing::debug!("Reminder {} of {} unregistered", name, path);
        Ok(())
    }

    /// Number of registered reminders.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Whether no reminder is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Stop and forget every reminder.
    pub fn clear(&self) {
        for (_, entry) in self.entries.borrow_mut().drain() {
            entry.ticker.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::ActorTypeCode;

    fn run_local_test<F: std::future::Future<Output = ()> + 'static>(f: F) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .expect("build runtime");
        tokio::task::LocalSet::new().block_on(&rt, f);
    }

    fn path(id: &str) -> ActorPath {
        ActorPath::new(ActorTypeCode::from("Foo.A"), id)
    }

    #[test]
    fn test_register_get_list_unregister() {
        run_local_test(async {
            let service = ReminderService::new(WeakActorSystem::default());
            let a = path("a");

            service
                .register(&a, "b", Duration::ZERO, Duration::from_secs(1))
                .expect("register b");
            service
                .register(&a, "a", Duration::ZERO, Duration::from_secs(1))
                .expect("register a");
            service
                .register(&path("other"), "a", Duration::ZERO, Duration::from_secs(1))
                .expect("register other");

            let names: Vec<_> = service.list(&a).iter().map(|h| h.name().to_string()).collect();
            assert_eq!(names, vec!["a", "b"]);
            assert_eq!(service.len(), 3);

            service.unregister(&a, "a").expect("unregister");
            assert!(service.get(&a, "a").is_none());
            assert_eq!(
                service.unregister(&a, "a"),
                Err(RuntimeError::ReminderNotFound("a".into()))
            );

            service.clear();
            assert!(service.is_empty());
        });
    }

    #[test]
    fn test_update_replaces_period() {
        run_local_test(async {
            let service = ReminderService::new(WeakActorSystem::default());
            let a = path("a");

            service
                .register(&a, "tick", Duration::ZERO, Duration::from_secs(1))
                .expect("register");
            service
                .register(&a, "tick", Duration::ZERO, Duration::from_secs(5))
                .expect("update");

            assert_eq!(service.len(), 1);
            assert_eq!(
                service.get(&a, "tick").map(|h| h.period()),
                Some(Duration::from_secs(5))
            );
        });
    }

    #[test]
    fn test_zero_period_rejected() {
        run_local_test(async {
            let service = ReminderService::new(WeakActorSystem::default());
            let err = service
                .register(&path("a"), "tick", Duration::ZERO, Duration::ZERO)
                .unwrap_err();
            assert!(matches!(err, RuntimeError::InvalidReminderPeriod { .. }));
            assert!(service.is_empty());
        });
    }
}
