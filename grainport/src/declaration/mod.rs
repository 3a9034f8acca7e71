//! Type discovery and endpoint generation.
//!
//! Runs once at bootstrap:
//!
//! ```text
//! ActorLibrary*  ──scan──►  ActorDeclaration*
//!                                │
//!                           synthesize
//!                                ▼
//!                        endpoint program (text)
//!                                │
//!                     EndpointCompiler::compile
//!                                ▼
//!                       Arc<EndpointModule>  ──bind──►  ActorType*
//! ```
//!
//! Binding lives in [`registry`](crate::registry); everything up to the
//! compiled module lives here.

pub mod compiler;
mod library;
mod synthesizer;
mod type_code;

pub use compiler::{
    codes, Diagnostic, EndpointAdapter, EndpointCompiler, EndpointInterface, EndpointModule,
    GeneratedType, Severity, WELL_KNOWN_IMPORTS,
};
pub use library::{ActorImplementation, ActorLibrary, ExportedType, LibraryLocation};
pub use synthesizer::synthesize;
pub use type_code::{ActorTypeCode, GENERATED_ROOT_NAMESPACE};

/// One discovered actor kind, as fed to the synthesizer.
///
/// Build-time only; discarded once the registry is bound.
#[derive(Debug, Clone)]
pub struct ActorDeclaration {
    code: ActorTypeCode,
    namespace: String,
    library: String,
    implementation: ActorImplementation,
}

impl ActorDeclaration {
    /// Declaration for an implementation exported by `library`.
    pub fn new(library: &ActorLibrary, implementation: &ActorImplementation) -> Self {
        let code = implementation.code().clone();
        Self {
            namespace: code.namespaces().join("."),
            code,
            library: library.import_path(),
            implementation: implementation.clone(),
        }
    }

    /// All concrete actors of `libraries`, in library then export order.
    pub fn scan(libraries: &[ActorLibrary]) -> Vec<Self> {
        libraries
            .iter()
            .flat_map(|library| {
                library
                    .scan()
                    .map(move |implementation| Self::new(library, implementation))
            })
            .collect()
    }

    /// Actor code.
    pub fn code(&self) -> &ActorTypeCode {
        &self.code
    }

    /// Generated namespace, e.g. `Fun.Foo.Bar`.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Generated adapter name.
    pub fn class_name(&self) -> &str {
        self.code.class_name()
    }

    /// Generated interface name (`I` + class name).
    pub fn interface_name(&self) -> String {
        format!("I{}", self.class_name())
    }

    /// Full name of the generated interface.
    pub fn interface_full_name(&self) -> String {
        format!("{}.{}", self.namespace, self.interface_name())
    }

    /// Full name of the generated adapter.
    pub fn adapter_full_name(&self) -> String {
        format!("{}.{}", self.namespace, self.class_name())
    }

    /// Import path of the exporting library.
    pub fn library(&self) -> &str {
        &self.library
    }

    /// The implementation behind the declaration.
    pub fn implementation(&self) -> &ActorImplementation {
        &self.implementation
    }
}
