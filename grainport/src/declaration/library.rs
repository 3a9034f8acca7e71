//! Actor libraries: the discovery input of the endpoint pipeline.
//!
//! A library is a named table of exported types. Only concrete actor exports
//! are turned into declarations; abstract actors and plain types are visible
//! to the compiler as part of the library but never get an endpoint.

use std::any::TypeId;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use serde_json::Value;

use crate::actor::{Actor, ActorContext, KeepAlive, Receiver};
use crate::declaration::type_code::identifier;
use crate::declaration::ActorTypeCode;
use crate::error::ActorError;

/// Builds the receiver of one activation.
pub(crate) type ReceiverFactory = fn(&str, &ActorContext) -> Result<Receiver, ActorError>;

fn create_receiver<A: Actor>(id: &str, ctx: &ActorContext) -> Result<Receiver, ActorError> {
    Ok(Rc::new(A::activate(id, ctx)?))
}

/// Everything the registry needs to know about an actor implementation.
///
/// Captured once per exported actor type; holds plain function pointers so
/// it can be shared across threads inside the registry.
#[derive(Clone)]
pub struct ActorImplementation {
    type_id: TypeId,
    type_name: &'static str,
    code: ActorTypeCode,
    keep_alive: KeepAlive,
    reentrant: fn(&Value) -> bool,
    factory: ReceiverFactory,
}

impl ActorImplementation {
    /// Describe actor implementation `A`.
    pub fn of<A: Actor>() -> Self {
        Self {
            type_id: TypeId::of::<A>(),
            type_name: std::any::type_name::<A>(),
            code: A::type_code(),
            keep_alive: A::keep_alive(),
            reentrant: A::is_reentrant,
            factory: create_receiver::<A>,
        }
    }

    /// `TypeId` of the implementation.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Rust type name of the implementation.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Registration code.
    pub fn code(&self) -> &ActorTypeCode {
        &self.code
    }

    /// Keep-alive policy.
    pub fn keep_alive(&self) -> KeepAlive {
        self.keep_alive
    }

    pub(crate) fn is_reentrant(&self, message: &Value) -> bool {
        (self.reentrant)(message)
    }

    pub(crate) fn create(&self, id: &str, ctx: &ActorContext) -> Result<Receiver, ActorError> {
        (self.factory)(id, ctx)
    }
}

impl fmt::Debug for ActorImplementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorImplementation")
            .field("type_name", &self.type_name)
            .field("code", &self.code)
            .field("keep_alive", &self.keep_alive)
            .finish()
    }
}

/// Where a library was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryLocation {
    /// Linked into the current binary.
    Linked,
    /// Loaded from a file.
    Path(PathBuf),
    /// Built in memory at run time; has no location and cannot be referenced
    /// by the endpoint compiler.
    InMemory,
}

/// One exported type of a library.
#[derive(Debug, Clone)]
pub enum ExportedType {
    /// A type carrying the actor capability.
    Actor {
        /// Implementation details.
        implementation: ActorImplementation,
        /// Abstract actors are never instantiated.
        is_abstract: bool,
    },
    /// Any other type.
    Plain {
        /// Declared type name.
        name: String,
    },
}

/// A named set of exported types.
///
/// # Example
///
/// ```rust,ignore
/// let library = ActorLibrary::new("bank")
///     .actor::<Account>()
///     .abstract_actor::<AuditedActor>()
///     .plain_type("bank::Money");
/// ```
#[derive(Debug, Clone)]
pub struct ActorLibrary {
    name: String,
    location: LibraryLocation,
    exports: Vec<ExportedType>,
}

impl ActorLibrary {
    /// A library linked into the current binary.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: LibraryLocation::Linked,
            exports: Vec::new(),
        }
    }

    /// A location-less library built at run time.
    pub fn dynamic(name: impl Into<String>) -> Self {
        Self::new(name).with_location(LibraryLocation::InMemory)
    }

    /// Override the location.
    pub fn with_location(mut self, location: LibraryLocation) -> Self {
        self.location = location;
        self
    }

    /// Export a concrete actor.
    pub fn actor<A: Actor>(mut self) -> Self {
        self.exports.push(ExportedType::Actor {
            implementation: ActorImplementation::of::<A>(),
            is_abstract: false,
        });
        self
    }

    /// Export an abstract actor (skipped by discovery).
    pub fn abstract_actor<A: Actor>(mut self) -> Self {
        self.exports.push(ExportedType::Actor {
            implementation: ActorImplementation::of::<A>(),
            is_abstract: true,
        });
        self
    }

    /// Export a type without the actor capability (skipped by discovery).
    pub fn plain_type(mut self, name: impl Into<String>) -> Self {
        self.exports.push(ExportedType::Plain { name: name.into() });
        self
    }

    /// Library name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name under which the endpoint program imports this library.
    ///
    /// The library name as an identifier: `bank-actors` imports as
    /// `bank_actors`, `2fa` as `_2fa`.
    pub fn import_path(&self) -> String {
        identifier(&self.name)
    }

    /// Library location.
    pub fn location(&self) -> &LibraryLocation {
        &self.location
    }

    /// Whether the compiler may reference this library.
    pub fn is_loadable(&self) -> bool {
        self.location != LibraryLocation::InMemory
    }

    /// All exports.
    pub fn exports(&self) -> &[ExportedType] {
        &self.exports
    }

    /// Concrete actor implementations, in export order.
    pub fn scan(&self) -> impl Iterator<Item = &ActorImplementation> {
        self.exports.iter().filter_map(|export| match export {
            ExportedType::Actor {
                implementation,
                is_abstract: false,
            } => Some(implementation),
            _ => None,
        })
    }
}
