//! Where an activation is in its life, and what that permits.
//!
//! ```text
//!  Created ──► Activating ──► Active ──► Deactivating ──► Terminated
//!                  │                          ▲
//!                  └─── Activate failed ──────┘
//! ```
//!
//! | state        | application messages | schedule work | reminder lookup/removal |
//! |--------------|----------------------|---------------|-------------------------|
//! | Created      |                      |               |                         |
//! | Activating   |                      | yes           | yes                     |
//! | Active       | yes                  | yes           | yes                     |
//! | Deactivating |                      |               | yes                     |
//! | Terminated   |                      |               |                         |
//!
//! "Schedule work" covers everything that would outlive the current turn:
//! `deactivate_on_idle`, `delay_deactivation`, timers and registering a
//! reminder. A `Deactivate` handler may still find and remove its reminders.

use serde::{Deserialize, Serialize};

/// Lifecycle state of one activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationState {
    /// Endpoint constructed, `Activate` not delivered yet.
    Created,

    /// `Activate` is running.
    Activating,

    /// Receiving application messages and reminders.
    Active,

    /// `Deactivate` is running, or `Activate` failed.
    Deactivating,

    /// Discarded; the endpoint holds no actor any more.
    Terminated,
}

impl ActivationState {
    /// Whether an activation in `self` may move to `next`.
    pub fn may_enter(self, next: ActivationState) -> bool {
        use ActivationState::*;
        match next {
            Created => false,
            Activating => self == Created,
            Active => self == Activating,
            Deactivating => matches!(self, Activating | Active),
            Terminated => self == Deactivating,
        }
    }

    /// Application messages and reminder ticks are delivered.
    pub fn accepts_messages(self) -> bool {
        self == ActivationState::Active
    }

    /// Actor code may schedule work that outlives the current turn.
    pub fn can_schedule(self) -> bool {
        matches!(self, ActivationState::Activating | ActivationState::Active)
    }

    /// Actor code may look up and unregister its reminders.
    pub fn can_manage_reminders(self) -> bool {
        self.can_schedule() || self == ActivationState::Deactivating
    }

    /// On the way out; a turn rejected in this state belongs on a fresh
    /// activation.
    pub fn is_leaving(self) -> bool {
        matches!(self, ActivationState::Deactivating | ActivationState::Terminated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ActivationState::*;

    const ALL: [ActivationState; 5] = [Created, Activating, Active, Deactivating, Terminated];

    fn walk(path: &[ActivationState]) -> bool {
        path.windows(2).all(|step| step[0].may_enter(step[1]))
    }

    #[test]
    fn test_lifecycle_paths() {
        assert!(walk(&[Created, Activating, Active, Deactivating, Terminated]));
        // Failed activation skips Active.
        assert!(walk(&[Created, Activating, Deactivating, Terminated]));

        assert!(!walk(&[Created, Active]));
        assert!(!walk(&[Active, Deactivating, Active]));
        assert!(!walk(&[Created, Activating, Active, Terminated]));
        for state in ALL {
            assert!(!state.may_enter(Created));
            assert!(!Terminated.may_enter(state));
        }
    }

    #[test]
    fn test_operations_per_state() {
        let allowed: Vec<(bool, bool, bool)> = ALL
            .iter()
            .map(|s| (s.accepts_messages(), s.can_schedule(), s.can_manage_reminders()))
            .collect();
        assert_eq!(
            allowed,
            vec![
                (false, false, false),
                (false, true, true),
                (true, true, true),
                (false, false, true),
                (false, false, false),
            ]
        );
    }

    #[test]
    fn test_leaving_states() {
        let leaving: Vec<_> = ALL.into_iter().filter(|s| s.is_leaving()).collect();
        assert_eq!(leaving, vec![Deactivating, Terminated]);
    }
}
