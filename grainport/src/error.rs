//! Error types for the grainport actor layer.
//!
//! Errors fall into two regimes:
//!
//! - **Build time** ([`RegistrationError`]): anything that goes wrong while
//!   scanning libraries, synthesizing the endpoint program, compiling it or
//!   binding the result. Always fatal; no partial registry is published.
//! - **Run time** ([`ActivationError`], [`EndpointError`], [`LifecycleError`]):
//!   scoped to one activation or one call.

use thiserror::Error;

use crate::declaration::Diagnostic;
use crate::endpoint::ActivationState;

/// Errors raised while building the actor type registry.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The synthesized endpoint program failed to compile.
    ///
    /// Carries every failing diagnostic; the display form is one line per
    /// diagnostic, the same text a build log would show.
    #[error("Bad code.\n\n{}", join_diagnostics(.diagnostics))]
    Compilation {
        /// Diagnostics of error severity, plus escalated warnings.
        diagnostics: Vec<Diagnostic>,
    },

    /// A generated type was missing from the loaded endpoint module.
    #[error("generated type not found in endpoint module: {full_name}")]
    UnresolvedType {
        /// Full name that was looked up.
        full_name: String,
    },
}

fn join_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Errors related to [`ActorPath`](crate::actor::ActorPath) parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// Missing `code:id` separator.
    #[error("invalid actor path format (expected 'code:id')")]
    InvalidFormat,

    /// Empty field in the path.
    #[error("actor path field cannot be empty: {0}")]
    EmptyField(&'static str),
}

/// Errors that abort an activation.
///
/// The host must discard the activation when one of these is returned from
/// [`ActorEndpoint::on_activate`](crate::endpoint::ActorEndpoint::on_activate).
#[derive(Debug, Error)]
pub enum ActivationError {
    /// No actor type is registered under this code.
    #[error("actor type not registered: {0}")]
    UnknownActorType(String),

    /// The activation identity could not be parsed into an actor path.
    #[error("invalid activation identity '{identity}': {source}")]
    InvalidPath {
        /// Raw identity supplied by the host.
        identity: String,
        /// Parse failure.
        #[source]
        source: PathError,
    },

    /// The identity names a different actor type than the endpoint serves.
    #[error("activation '{path}' routed to endpoint of '{expected}'")]
    PathMismatch {
        /// Path derived from the activation identity.
        path: String,
        /// Code of the endpoint's actor type.
        expected: String,
    },

    /// `on_activate` was called on an endpoint that already left `Created`.
    #[error("activation already started (state {0:?})")]
    InvalidState(ActivationState),

    /// The receiver factory refused to build the actor.
    #[error("receiver factory failed for {path}: {source}")]
    Factory {
        /// Activation path.
        path: String,
        /// Error returned by the actor.
        #[source]
        source: ActorError,
    },

    /// The actor failed while handling `Activate`.
    #[error("activate failed for {path}: {source}")]
    Activate {
        /// Activation path.
        path: String,
        /// Error returned by the actor.
        #[source]
        source: ActorError,
    },
}

/// Errors returned by the steady-state endpoint entry points.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// The activation is not accepting messages.
    #[error("activation is not active (state {0:?})")]
    NotActive(ActivationState),

    /// The receiver failed; the activation stays alive.
    #[error(transparent)]
    Receiver(#[from] ActorError),
}

/// Errors reported by a hosting runtime through
/// [`ActivationRuntime`](crate::endpoint::ActivationRuntime).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// The activation is already being deactivated.
    #[error("activation is deactivating")]
    Deactivating,

    /// No reminder with this name is registered for the activation.
    #[error("reminder not found: {0}")]
    ReminderNotFound(String),

    /// Reminder periods must be non-zero.
    #[error("invalid period {period:?} for reminder '{name}'")]
    InvalidReminderPeriod {
        /// Reminder name.
        name: String,
        /// Rejected period.
        period: std::time::Duration,
    },
}

/// Errors from the restricted lifecycle facade.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// The operation is not allowed in the current activation state.
    #[error("cannot {operation} while activation is {state:?}")]
    InvalidState {
        /// Operation name.
        operation: &'static str,
        /// State at the time of the call.
        state: ActivationState,
    },

    /// The hosting runtime rejected the operation.
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

/// Errors produced by actor code.
#[derive(Debug, Error)]
pub enum ActorError {
    /// Generic failure reported by the actor.
    #[error("actor failed: {0}")]
    Failed(String),

    /// The actor does not handle this message.
    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),

    /// Payload (de)serialization failed.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// A lifecycle facade operation failed.
    #[error("lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// A call to another actor failed.
    #[error("downstream call failed: {0}")]
    Downstream(Box<SystemError>),
}

impl From<SystemError> for ActorError {
    fn from(err: SystemError) -> Self {
        ActorError::Downstream(Box::new(err))
    }
}

/// Errors surfaced by the actor system facade and the embedded host.
#[derive(Debug, Error)]
pub enum SystemError {
    /// Registry construction failed.
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// Activation of the target failed.
    #[error(transparent)]
    Activation(#[from] ActivationError),

    /// The call itself failed.
    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    /// Request or reply (de)serialization failed.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The implementation type was never registered.
    #[error("no actor type registered for implementation {0}")]
    UnregisteredImplementation(&'static str),

    /// The owning actor system was dropped.
    #[error("actor system has been dropped")]
    SystemDropped,

    /// A bootstrapper failed during `done()`.
    #[error("bootstrapper failed: {0}")]
    Bootstrap(#[source] ActorError),
}
