//! Registry of actor types.
//!
//! Built once at bootstrap from the compiled endpoint module and never
//! mutated afterwards. Every [`ActorType`] is reachable three ways:
//!
//! - by actor code (what activation identities carry)
//! - by implementation `TypeId` (what `actor_of::<A>()` asks for)
//! - by generated interface full name
//!
//! A failure anywhere in the pipeline fails [`ActorTypeRegistry::build`] as a
//! whole; no partially filled registry is ever returned.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::actor::{Actor, ActorContext, KeepAlive, Receiver};
use crate::config::CompileOptions;
use crate::declaration::{
    synthesize, ActorDeclaration, ActorImplementation, ActorLibrary, ActorTypeCode,
    EndpointAdapter, EndpointCompiler, EndpointInterface, EndpointModule,
};
use crate::endpoint::ActivationRuntime;
use crate::error::{ActorError, RegistrationError};

/// A registered actor kind.
#[derive(Debug)]
pub struct ActorType {
    code: ActorTypeCode,
    interface: EndpointInterface,
    adapter: EndpointAdapter,
    module: Arc<EndpointModule>,
    implementation: ActorImplementation,
}

impl ActorType {
    /// Resolve the generated types of `declaration` in `module`.
    pub fn bind(
        declaration: &ActorDeclaration,
        module: &Arc<EndpointModule>,
    ) -> Result<Self, RegistrationError> {
        let interface_name = declaration.interface_full_name();
        let interface = module
            .interface(&interface_name)
            .ok_or(RegistrationError::UnresolvedType {
                full_name: interface_name.clone(),
            })?;

        let adapter_name = declaration.adapter_full_name();
        let adapter = module
            .adapter(&adapter_name)
            .filter(|adapter| {
                adapter.implements(&interface_name) && adapter.code() == declaration.code()
            })
            .ok_or(RegistrationError::UnresolvedType {
                full_name: adapter_name,
            })?;

        Ok(Self {
            code: declaration.code().clone(),
            interface: interface.clone(),
            adapter: adapter.clone(),
            module: module.clone(),
            implementation: declaration.implementation().clone(),
        })
    }

    /// Actor code.
    pub fn code(&self) -> &ActorTypeCode {
        &self.code
    }

    /// Generated interface.
    pub fn interface(&self) -> &EndpointInterface {
        &self.interface
    }

    /// Generated adapter.
    pub fn adapter(&self) -> &EndpointAdapter {
        &self.adapter
    }

    /// Name of the module the generated types live in.
    pub fn module_name(&self) -> &str {
        self.module.name()
    }

    /// Rust type name of the implementation.
    pub fn implementation_name(&self) -> &'static str {
        self.implementation.type_name()
    }

    /// `TypeId` of the implementation.
    pub fn implementation_id(&self) -> TypeId {
        self.implementation.type_id()
    }

    /// Keep-alive policy of the implementation.
    pub fn keep_alive_policy(&self) -> KeepAlive {
        self.implementation.keep_alive()
    }

    /// Whether `message` may be delivered in reentrant mode.
    pub fn is_reentrant(&self, message: &Value) -> bool {
        self.implementation.is_reentrant(message)
    }

    /// Build the receiver of activation `id`.
    pub fn receiver(&self, id: &str, ctx: &ActorContext) -> Result<Receiver, ActorError> {
        self.implementation.create(id, ctx)
    }

    /// Apply the keep-alive policy to `runtime`.
    ///
    /// Best effort: a rejected extension is logged and otherwise ignored.
    pub fn keep_alive(&self, runtime: &dyn ActivationRuntime) {
        if let KeepAlive::Extend(period) = self.keep_alive_policy() {
            if let Err(e) = runtime.delay_deactivation(period) {
                tracing::warn!(
                    "Keep-alive for {} failed: {}",
                    runtime.identity(),
                    e
                );
            }
        }
    }
}

/// Immutable set of registered actor types.
#[derive(Debug)]
pub struct ActorTypeRegistry {
    module: Arc<EndpointModule>,
    types: Vec<Arc<ActorType>>,
    by_code: HashMap<ActorTypeCode, usize>,
    by_type: HashMap<TypeId, usize>,
    by_interface: HashMap<String, usize>,
}

impl ActorTypeRegistry {
    /// Run discovery, synthesis, compilation and binding over `libraries`.
    pub fn build(
        libraries: &[ActorLibrary],
        options: CompileOptions,
    ) -> Result<Self, RegistrationError> {
        let declarations = ActorDeclaration::scan(libraries);
        tracing::debug!(
            "Discovered {} actor kinds in {} libraries",
            declarations.len(),
            libraries.len()
        );

        let source = synthesize(&declarations);
        let module = EndpointCompiler::new(libraries, options).compile(&source)?;

        let types = declarations
            .iter()
            .map(|declaration| ActorType::bind(declaration, &module).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        let mut by_code = HashMap::new();
        let mut by_type = HashMap::new();
        let mut by_interface = HashMap::new();
        for (index, actor_type) in types.iter().enumerate() {
            by_code.insert(actor_type.code().clone(), index);
            by_type.insert(actor_type.implementation_id(), index);
            by_interface.insert(actor_type.interface().full_name().to_string(), index);
        }

        tracing::info!(
            "Registered {} actor types from endpoint module {}",
            types.len(),
            module.name()
        );

        Ok(Self {
            module,
            types,
            by_code,
            by_type,
            by_interface,
        })
    }

    /// The compiled endpoint module.
    pub fn module(&self) -> &Arc<EndpointModule> {
        &self.module
    }

    /// Look up by actor code.
    pub fn registered(&self, code: &str) -> Option<&Arc<ActorType>> {
        self.by_code.get(code).map(|&index| &self.types[index])
    }

    /// Look up by implementation type.
    pub fn of<A: Actor>(&self) -> Option<&Arc<ActorType>> {
        self.by_type_id(TypeId::of::<A>())
    }

    /// Look up by implementation `TypeId`.
    pub fn by_type_id(&self, type_id: TypeId) -> Option<&Arc<ActorType>> {
        self.by_type.get(&type_id).map(|&index| &self.types[index])
    }

    /// Look up by generated interface full name.
    pub fn by_interface(&self, full_name: &str) -> Option<&Arc<ActorType>> {
        self.by_interface
            .get(full_name)
            .map(|&index| &self.types[index])
    }

    /// All registered types, in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ActorType>> {
        self.types.iter()
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
