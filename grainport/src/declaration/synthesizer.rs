//! Endpoint program synthesis.
//!
//! One namespace block per declaration:
//!
//! ```text
//! use grainport::actor;
//! use grainport::endpoint;
//! use bank;
//!
//! namespace Fun.bank {
//!     interface IAccount : IActorEndpoint;
//!     adapter Account : ActorEndpoint, IAccount for "bank.Account";
//! }
//! ```
//!
//! Blocks are emitted in code order so the same declarations always produce
//! the same text. Two declarations with the same code produce the same names
//! twice, which the compiler rejects as duplicate definitions.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::declaration::compiler::{ENDPOINT_BASE_CLASS, ENDPOINT_INTERFACE, WELL_KNOWN_IMPORTS};
use crate::declaration::ActorDeclaration;

/// Render the endpoint program for `declarations`.
pub fn synthesize(declarations: &[ActorDeclaration]) -> String {
    let mut ordered: Vec<&ActorDeclaration> = declarations.iter().collect();
    ordered.sort_by(|a, b| {
        a.code()
            .cmp(b.code())
            .then_with(|| a.implementation().type_name().cmp(b.implementation().type_name()))
    });

    let libraries: BTreeSet<&str> = ordered.iter().map(|decl| decl.library()).collect();

    let mut source = String::from("// generated endpoint program\n");
    for import in WELL_KNOWN_IMPORTS {
        let _ = writeln!(source, "use {import};");
    }
    for library in libraries {
        let _ = writeln!(source, "use {library};");
    }

    for decl in ordered {
        let _ = write!(
            source,
            "\nnamespace {namespace} {{\n    \
                 interface {interface} : {ENDPOINT_INTERFACE};\n    \
                 adapter {class} : {ENDPOINT_BASE_CLASS}, {interface} for \"{code}\";\n\
             }}\n",
            namespace = decl.namespace(),
            interface = decl.interface_name(),
            class = decl.class_name(),
            code = escape(decl.code().as_str()),
        );
    }

    source
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape(r#"a"b\c"#), r#"a\"b\\c"#);
    }
}
