//! Compiler diagnostics.

use std::fmt;

/// Diagnostic codes reported by the endpoint compiler.
pub mod codes {
    /// A token other than the expected one was found.
    pub const EXPECTED_TOKEN: &str = "GP1003";
    /// A character that cannot start any token.
    pub const UNEXPECTED_CHARACTER: &str = "GP1056";
    /// String literal not closed on the same line.
    pub const UNTERMINATED_STRING: &str = "GP1010";
    /// Unsupported escape in a string literal.
    pub const UNRECOGNIZED_ESCAPE: &str = "GP1009";
    /// Unknown top-level or member keyword.
    pub const UNEXPECTED_DECLARATION: &str = "GP0116";
    /// Import or type reference that does not resolve.
    pub const UNRESOLVED_NAME: &str = "GP0246";
    /// Two definitions share a full name.
    pub const DUPLICATE_DEFINITION: &str = "GP0101";
    /// Two adapters serve the same actor code.
    pub const DUPLICATE_CODE: &str = "GP0102";
    /// Adapter bound to an empty actor code.
    pub const EMPTY_CODE: &str = "GP0103";
    /// Non-interface type in an interface list.
    pub const NOT_AN_INTERFACE: &str = "GP0527";
    /// Adapter does not derive from the endpoint base class.
    pub const MISSING_BASE_CLASS: &str = "GP0311";
    /// Base class listed after an interface.
    pub const BASE_CLASS_ORDER: &str = "GP1722";
    /// Interface never implemented by an adapter.
    pub const UNIMPLEMENTED_INTERFACE: &str = "GP1001";
    /// Namespace without members.
    pub const EMPTY_NAMESPACE: &str = "GP1002";
}

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    /// Informational; never fails compilation unless escalated.
    Warning,
    /// Fails compilation.
    Error,
}

/// One compiler message, tied to a line of the endpoint program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity as reported by the check.
    pub severity: Severity,
    /// Stable diagnostic code (see [`codes`]).
    pub code: &'static str,
    /// 1-based line in the program text.
    pub line: u32,
    /// Human-readable message.
    pub message: String,
    /// Warning escalated by `warnings_as_errors`.
    pub escalated: bool,
}

impl Diagnostic {
    /// An error diagnostic.
    pub fn error(code: &'static str, line: u32, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            line,
            message: message.into(),
            escalated: false,
        }
    }

    /// A warning diagnostic.
    pub fn warning(code: &'static str, line: u32, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            line,
            message: message.into(),
            escalated: false,
        }
    }

    /// Whether this diagnostic fails compilation.
    pub fn is_failure(&self) -> bool {
        self.severity == Severity::Error || self.escalated
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.severity, self.escalated) {
            (Severity::Error, _) => write!(f, "({}): error {}: {}", self.line, self.code, self.message),
            (Severity::Warning, true) => write!(
                f,
                "({}): error {}: Warning as Error: {}",
                self.line, self.code, self.message
            ),
            (Severity::Warning, false) => {
                write!(f, "({}): warning {}: {}", self.line, self.code, self.message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let error = Diagnostic::error(codes::DUPLICATE_DEFINITION, 4, "dup");
        assert_eq!(error.to_string(), "(4): error GP0101: dup");

        let mut warning = Diagnostic::warning(codes::EMPTY_NAMESPACE, 9, "empty");
        assert_eq!(warning.to_string(), "(9): warning GP1002: empty");

        warning.escalated = true;
        assert_eq!(
            warning.to_string(),
            "(9): error GP1002: Warning as Error: empty"
        );
    }
}
