//! Embedded compiler for endpoint programs.
//!
//! Turns the program text produced by the
//! [synthesizer](crate::declaration::synthesize) into an [`EndpointModule`].
//! Compilation runs in three passes:
//!
//! ```text
//! source ──lex──► tokens ──parse──► program ──check──► EndpointModule
//!                    │                 │                 │
//!                    └────────── diagnostics ◄───────────┘
//! ```
//!
//! Every pass keeps going after an error, so a single compilation reports
//! everything that is wrong with the program. Any error (or any warning, when
//! [`CompileOptions::warnings_as_errors`] is set) fails the whole compilation
//! with [`RegistrationError::Compilation`].
//!
//! # Name Resolution
//!
//! Imports must name a well-known grainport module or a loadable library.
//! Libraries built in memory ([`LibraryLocation::InMemory`]) have no location
//! and are never part of the reference set.
//!
//! A base type written as a simple name resolves against the enclosing
//! namespace first, then against imported symbols. A dotted name must be the
//! full name of a type declared in the program.
//!
//! [`LibraryLocation::InMemory`]: crate::declaration::LibraryLocation::InMemory

mod diagnostic;
mod lexer;
mod module;
mod parser;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

pub use diagnostic::{codes, Diagnostic, Severity};
pub use module::{EndpointAdapter, EndpointInterface, EndpointModule, GeneratedType};

use crate::config::CompileOptions;
use crate::declaration::{ActorLibrary, ActorTypeCode};
use crate::error::RegistrationError;
use parser::{Member, Parser, Program, TypeRef};

/// Modules every endpoint program may import.
pub const WELL_KNOWN_IMPORTS: &[&str] = &["grainport::actor", "grainport::endpoint"];

/// Base interface of every generated interface.
pub const ENDPOINT_INTERFACE: &str = "IActorEndpoint";

/// Base class of every generated adapter.
pub const ENDPOINT_BASE_CLASS: &str = "ActorEndpoint";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SymbolKind {
    Interface,
    Class,
}

#[derive(Debug, Clone)]
struct Symbol {
    full_name: String,
    kind: SymbolKind,
}

fn exported_symbols(import: &str) -> &'static [(&'static str, SymbolKind)] {
    match import {
        "grainport::actor" => &[("IActor", SymbolKind::Interface)],
        "grainport::endpoint" => &[
            (ENDPOINT_INTERFACE, SymbolKind::Interface),
            (ENDPOINT_BASE_CLASS, SymbolKind::Class),
        ],
        _ => &[],
    }
}

/// Compiles endpoint programs against a fixed reference set.
#[derive(Debug, Clone)]
pub struct EndpointCompiler {
    references: Vec<String>,
    options: CompileOptions,
}

impl EndpointCompiler {
    /// Create a compiler referencing every loadable library in `libraries`.
    pub fn new(libraries: &[ActorLibrary], options: CompileOptions) -> Self {
        let mut references = Vec::new();
        for library in libraries {
            if library.is_loadable() {
                references.push(library.import_path());
            } else {
                tracing::debug!(
                    "Library {} has no location, excluded from endpoint references",
                    library.name()
                );
            }
        }
        references.sort();
        references.dedup();

        Self {
            references,
            options,
        }
    }

    /// Library import paths visible to compiled programs.
    pub fn references(&self) -> &[String] {
        &self.references
    }

    /// Compile `source` into a fresh, uniquely named module.
    pub fn compile(&self, source: &str) -> Result<Arc<EndpointModule>, RegistrationError> {
        let mut diagnostics = Vec::new();
        let tokens = lexer::tokenize(source, &mut diagnostics);
        let program = Parser::new(tokens, &mut diagnostics).parse();

        let name = format!("endpoints_{:016x}", rand::random::<u64>());
        let module = Checker::new(&self.references, &mut diagnostics).check(name, program);

        if self.options.warnings_as_errors {
            for diagnostic in &mut diagnostics {
                if diagnostic.severity == Severity::Warning {
                    diagnostic.escalated = true;
                }
            }
        }

        let (failures, warnings): (Vec<_>, Vec<_>) =
            diagnostics.into_iter().partition(Diagnostic::is_failure);

        for warning in &warnings {
            tracing::warn!("Endpoint program: {}", warning);
        }

        if !failures.is_empty() {
            tracing::error!(
                "Endpoint program failed to compile with {} diagnostic(s)",
                failures.len()
            );
            return Err(RegistrationError::Compilation {
                diagnostics: failures,
            });
        }

        tracing::debug!(
            "Compiled endpoint module {} with {} types",
            module.name(),
            module.len()
        );
        Ok(Arc::new(module))
    }
}

/// Semantic pass: name resolution and definition checks.
struct Checker<'a> {
    references: &'a [String],
    diagnostics: &'a mut Vec<Diagnostic>,
    imported: HashMap<&'static str, Symbol>,
    declared: HashMap<String, SymbolKind>,
}

impl<'a> Checker<'a> {
    fn new(references: &'a [String], diagnostics: &'a mut Vec<Diagnostic>) -> Self {
        Self {
            references,
            diagnostics,
            imported: HashMap::new(),
            declared: HashMap::new(),
        }
    }

    fn check(mut self, name: String, program: Program) -> EndpointModule {
        self.resolve_imports(&program);
        self.declare(&program);

        let mut types = BTreeMap::new();
        let mut served: HashMap<ActorTypeCode, String> = HashMap::new();
        let mut implemented = HashSet::new();

        for namespace in &program.namespaces {
            if namespace.members.is_empty() {
                self.diagnostics.push(Diagnostic::warning(
                    codes::EMPTY_NAMESPACE,
                    namespace.line,
                    format!("Namespace '{}' declares no endpoint types", namespace.name),
                ));
            }

            for member in &namespace.members {
                let generated = match member {
                    Member::Interface(decl) => {
                        let bases = self.interface_bases(&namespace.name, &decl.bases);
                        GeneratedType::Interface(EndpointInterface {
                            full_name: format!("{}.{}", namespace.name, decl.name),
                            namespace: namespace.name.clone(),
                            name: decl.name.clone(),
                            bases,
                        })
                    }
                    Member::Adapter(decl) => {
                        let full_name = format!("{}.{}", namespace.name, decl.name);
                        let (base_class, interfaces) =
                            self.adapter_bases(&namespace.name, &full_name, decl.line, &decl.bases);
                        implemented.extend(interfaces.iter().cloned());

                        let code = ActorTypeCode::from_type_name(&decl.code);
                        if decl.code.trim().is_empty() {
                            self.diagnostics.push(Diagnostic::error(
                                codes::EMPTY_CODE,
                                decl.line,
                                format!("Adapter '{full_name}' is bound to an empty actor code"),
                            ));
                        } else if let Some(existing) = served.get(&code) {
                            self.diagnostics.push(Diagnostic::error(
                                codes::DUPLICATE_CODE,
                                decl.line,
                                format!(
                                    "Actor code '{code}' is already served by adapter '{existing}'"
                                ),
                            ));
                        } else {
                            served.insert(code.clone(), full_name.clone());
                        }

                        GeneratedType::Adapter(EndpointAdapter {
                            full_name,
                            namespace: namespace.name.clone(),
                            name: decl.name.clone(),
                            base_class,
                            interfaces,
                            code,
                        })
                    }
                };

                types
                    .entry(generated.full_name().to_string())
                    .or_insert(generated);
            }
        }

        for generated in types.values() {
            if let GeneratedType::Interface(interface) = generated {
                if !implemented.contains(interface.full_name()) {
                    let line = program
                        .namespaces
                        .iter()
                        .filter(|ns| ns.name == interface.namespace)
                        .flat_map(|ns| &ns.members)
                        .find_map(|member| match member {
                            Member::Interface(decl) if decl.name == interface.name => {
                                Some(decl.line)
                            }
                            _ => None,
                        })
                        .unwrap_or_default();
                    self.diagnostics.push(Diagnostic::warning(
                        codes::UNIMPLEMENTED_INTERFACE,
                        line,
                        format!(
                            "Interface '{}' is not implemented by any adapter",
                            interface.full_name()
                        ),
                    ));
                }
            }
        }

        EndpointModule {
            name,
            references: self.references.to_vec(),
            types,
            codes: served,
        }
    }

    fn resolve_imports(&mut self, program: &Program) {
        for import in &program.imports {
            if WELL_KNOWN_IMPORTS.contains(&import.path.as_str()) {
                for (name, kind) in exported_symbols(&import.path) {
                    self.imported.insert(
                        *name,
                        Symbol {
                            full_name: format!("{}::{}", import.path, name),
                            kind: *kind,
                        },
                    );
                }
            } else if !self.references.contains(&import.path) {
                self.diagnostics.push(Diagnostic::error(
                    codes::UNRESOLVED_NAME,
                    import.line,
                    format!(
                        "The type or namespace name '{}' could not be found (are you missing a library reference?)",
                        import.path
                    ),
                ));
            }
        }
    }

    fn declare(&mut self, program: &Program) {
        for namespace in &program.namespaces {
            for member in &namespace.members {
                let (name, kind, line) = match member {
                    Member::Interface(decl) => (&decl.name, SymbolKind::Interface, decl.line),
                    Member::Adapter(decl) => (&decl.name, SymbolKind::Class, decl.line),
                };
                let full_name = format!("{}.{}", namespace.name, name);
                if self.declared.contains_key(&full_name) {
                    self.diagnostics.push(Diagnostic::error(
                        codes::DUPLICATE_DEFINITION,
                        line,
                        format!(
                            "The namespace '{}' already contains a definition for '{}'",
                            namespace.name, name
                        ),
                    ));
                } else {
                    self.declared.insert(full_name, kind);
                }
            }
        }
    }

    fn resolve(&mut self, namespace: &str, type_ref: &TypeRef) -> Option<Symbol> {
        let local = if type_ref.name.contains('.') {
            type_ref.name.clone()
        } else {
            format!("{namespace}.{}", type_ref.name)
        };

        if let Some(kind) = self.declared.get(&local) {
            return Some(Symbol {
                full_name: local,
                kind: *kind,
            });
        }
        if let Some(symbol) = self.imported.get(type_ref.name.as_str()) {
            return Some(symbol.clone());
        }

        self.diagnostics.push(Diagnostic::error(
            codes::UNRESOLVED_NAME,
            type_ref.line,
            format!(
                "The type or namespace name '{}' could not be found",
                type_ref.name
            ),
        ));
        None
    }

    fn interface_bases(&mut self, namespace: &str, bases: &[TypeRef]) -> Vec<String> {
        let mut resolved = Vec::new();
        for base in bases {
            let Some(symbol) = self.resolve(namespace, base) else {
                continue;
            };
            if symbol.kind != SymbolKind::Interface {
                self.not_an_interface(base);
                continue;
            }
            resolved.push(symbol.full_name);
        }
        resolved
    }

    fn adapter_bases(
        &mut self,
        namespace: &str,
        full_name: &str,
        line: u32,
        bases: &[TypeRef],
    ) -> (String, Vec<String>) {
        let mut base_class = None;
        let mut interfaces = Vec::new();

        for (position, base) in bases.iter().enumerate() {
            let Some(symbol) = self.resolve(namespace, base) else {
                continue;
            };
            match symbol.kind {
                SymbolKind::Interface => interfaces.push(symbol.full_name),
                SymbolKind::Class if position == 0 => base_class = Some(symbol.full_name),
                SymbolKind::Class => {
                    self.diagnostics.push(Diagnostic::error(
                        codes::BASE_CLASS_ORDER,
                        base.line,
                        format!(
                            "Base class '{}' must come before any interfaces",
                            base.name
                        ),
                    ));
                }
            }
        }

        let expected = format!("grainport::endpoint::{ENDPOINT_BASE_CLASS}");
        match base_class {
            Some(class) if class == expected => (class, interfaces),
            _ => {
                self.diagnostics.push(Diagnostic::error(
                    codes::MISSING_BASE_CLASS,
                    line,
                    format!("Adapter '{full_name}' must derive from '{ENDPOINT_BASE_CLASS}'"),
                ));
                (String::new(), interfaces)
            }
        }
    }

    fn not_an_interface(&mut self, base: &TypeRef) {
        self.diagnostics.push(Diagnostic::error(
            codes::NOT_AN_INTERFACE,
            base.line,
            format!("Type '{}' in interface list is not an interface", base.name),
        ));
    }
}
