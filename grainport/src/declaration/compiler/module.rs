//! Output of a successful compilation.

use std::collections::{BTreeMap, HashMap};

use crate::declaration::ActorTypeCode;

/// A generated endpoint interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointInterface {
    pub(super) full_name: String,
    pub(super) namespace: String,
    pub(super) name: String,
    pub(super) bases: Vec<String>,
}

impl EndpointInterface {
    /// Fully-qualified name, e.g. `Fun.Foo.IA`.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Enclosing namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Simple name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved base interfaces.
    pub fn bases(&self) -> &[String] {
        &self.bases
    }
}

/// A generated endpoint adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointAdapter {
    pub(super) full_name: String,
    pub(super) namespace: String,
    pub(super) name: String,
    pub(super) base_class: String,
    pub(super) interfaces: Vec<String>,
    pub(super) code: ActorTypeCode,
}

impl EndpointAdapter {
    /// Fully-qualified name, e.g. `Fun.Foo.A`.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Enclosing namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Simple name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved base class.
    pub fn base_class(&self) -> &str {
        &self.base_class
    }

    /// Resolved interfaces implemented by the adapter.
    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    /// Whether the adapter implements `interface` (full name).
    pub fn implements(&self, interface: &str) -> bool {
        self.interfaces.iter().any(|i| i == interface)
    }

    /// Actor code the adapter serves.
    pub fn code(&self) -> &ActorTypeCode {
        &self.code
    }
}

/// A type defined by the endpoint program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedType {
    /// `interface` declaration.
    Interface(EndpointInterface),
    /// `adapter` declaration.
    Adapter(EndpointAdapter),
}

impl GeneratedType {
    /// Fully-qualified name.
    pub fn full_name(&self) -> &str {
        match self {
            GeneratedType::Interface(interface) => interface.full_name(),
            GeneratedType::Adapter(adapter) => adapter.full_name(),
        }
    }
}

/// In-memory module produced by
/// [`EndpointCompiler::compile`](super::EndpointCompiler::compile).
///
/// Immutable once built; shared behind an `Arc` by every registered
/// [`ActorType`](crate::registry::ActorType).
#[derive(Debug, Clone)]
pub struct EndpointModule {
    pub(super) name: String,
    pub(super) references: Vec<String>,
    pub(super) types: BTreeMap<String, GeneratedType>,
    pub(super) codes: HashMap<ActorTypeCode, String>,
}

impl EndpointModule {
    /// Randomized module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Libraries the module was compiled against.
    pub fn references(&self) -> &[String] {
        &self.references
    }

    /// Look up any generated type by full name.
    pub fn get_type(&self, full_name: &str) -> Option<&GeneratedType> {
        self.types.get(full_name)
    }

    /// Look up a generated interface by full name.
    pub fn interface(&self, full_name: &str) -> Option<&EndpointInterface> {
        match self.types.get(full_name)? {
            GeneratedType::Interface(interface) => Some(interface),
            GeneratedType::Adapter(_) => None,
        }
    }

    /// Look up a generated adapter by full name.
    pub fn adapter(&self, full_name: &str) -> Option<&EndpointAdapter> {
        match self.types.get(full_name)? {
            GeneratedType::Adapter(adapter) => Some(adapter),
            GeneratedType::Interface(_) => None,
        }
    }

    /// The adapter serving `code`.
    pub fn adapter_for_code(&self, code: &str) -> Option<&EndpointAdapter> {
        self.adapter(self.codes.get(code)?)
    }

    /// All generated types, ordered by full name.
    pub fn types(&self) -> impl Iterator<Item = &GeneratedType> {
        self.types.values()
    }

    /// Number of generated types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the module defines no types.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
