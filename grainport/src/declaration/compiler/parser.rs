//! Recursive-descent parser for endpoint programs.
//!
//! # Grammar
//!
//! ```text
//! program    := import* namespace*
//! import     := "use" path ";"
//! path       := ident ("::" ident)*
//! namespace  := "namespace" dotted "{" member* "}"
//! dotted     := ident ("." ident)*
//! member     := interface | adapter
//! interface  := "interface" ident ":" dotted ("," dotted)* ";"
//! adapter    := "adapter" ident ":" dotted ("," dotted)* "for" string ";"
//! ```
//!
//! Errors are reported as diagnostics; the parser then skips to the next
//! `;` or `}` and carries on, so one bad line does not hide the rest.

use super::diagnostic::{codes, Diagnostic};
use super::lexer::{Token, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Program {
    pub imports: Vec<Import>,
    pub namespaces: Vec<Namespace>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Import {
    pub path: String,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Namespace {
    pub name: String,
    pub line: u32,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Member {
    Interface(InterfaceDecl),
    Adapter(AdapterDecl),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct InterfaceDecl {
    pub name: String,
    pub bases: Vec<TypeRef>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct AdapterDecl {
    pub name: String,
    pub bases: Vec<TypeRef>,
    pub code: String,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct TypeRef {
    pub name: String,
    pub line: u32,
}

/// Marker for a reported syntax error; the diagnostic is already recorded.
struct SyntaxError;

type ParseResult<T> = Result<T, SyntaxError>;

pub(super) struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl<'a> Parser<'a> {
    pub(super) fn new(tokens: Vec<Token>, diagnostics: &'a mut Vec<Diagnostic>) -> Self {
        Self {
            tokens,
            pos: 0,
            diagnostics,
        }
    }

    pub(super) fn parse(mut self) -> Program {
        let mut program = Program {
            imports: Vec::new(),
            namespaces: Vec::new(),
        };

        loop {
            match self.peek().kind.clone() {
                TokenKind::Eof => break,
                TokenKind::Ident(keyword) if keyword == "use" => match self.import() {
                    Ok(import) => {
                        if !program.namespaces.is_empty() {
                            self.error(
                                codes::UNEXPECTED_DECLARATION,
                                import.line,
                                "A using clause must precede all other elements defined in the program",
                            );
                        }
                        program.imports.push(import);
                    }
                    Err(SyntaxError) => self.recover(),
                },
                TokenKind::Ident(keyword) if keyword == "namespace" => match self.namespace() {
                    Ok(namespace) => program.namespaces.push(namespace),
                    Err(SyntaxError) => self.recover(),
                },
                other => {
                    let line = self.peek().line;
                    self.error(
                        codes::UNEXPECTED_DECLARATION,
                        line,
                        format!("Expected 'use' or 'namespace', found {}", other.describe()),
                    );
                    self.recover();
                }
            }
        }

        program
    }

    fn import(&mut self) -> ParseResult<Import> {
        let line = self.bump().line;
        let mut segments = vec![self.ident()?];
        while self.eat(&TokenKind::PathSep) {
            segments.push(self.ident()?);
        }
        self.expect(&TokenKind::Semi)?;
        Ok(Import {
            path: segments.join("::"),
            line,
        })
    }

    fn namespace(&mut self) -> ParseResult<Namespace> {
        let line = self.bump().line;
        let name = self.dotted()?;
        self.expect(&TokenKind::LBrace)?;

        let mut members = Vec::new();
        loop {
            match self.peek().kind.clone() {
                TokenKind::RBrace => {
                    self.bump();
                    break;
                }
                TokenKind::Eof => {
                    let line = self.peek().line;
                    self.error(codes::EXPECTED_TOKEN, line, "'}' expected");
                    break;
                }
                TokenKind::Ident(keyword) if keyword == "interface" => {
                    match self.interface() {
                        Ok(decl) => members.push(Member::Interface(decl)),
                        Err(SyntaxError) => self.recover_member(),
                    }
                }
                TokenKind::Ident(keyword) if keyword == "adapter" => match self.adapter() {
                    Ok(decl) => members.push(Member::Adapter(decl)),
                    Err(SyntaxError) => self.recover_member(),
                },
                other => {
                    let line = self.peek().line;
                    self.error(
                        codes::UNEXPECTED_DECLARATION,
                        line,
                        format!(
                            "Expected 'interface' or 'adapter', found {}",
                            other.describe()
                        ),
                    );
                    self.recover_member();
                }
            }
        }

        Ok(Namespace {
            name,
            line,
            members,
        })
    }

    fn interface(&mut self) -> ParseResult<InterfaceDecl> {
        let line = self.bump().line;
        let name = self.ident()?;
        self.expect(&TokenKind::Colon)?;
        let bases = self.base_list()?;
        self.expect(&TokenKind::Semi)?;
        Ok(InterfaceDecl { name, bases, line })
    }

    fn adapter(&mut self) -> ParseResult<AdapterDecl> {
        let line = self.bump().line;
        let name = self.ident()?;
        self.expect(&TokenKind::Colon)?;
        let bases = self.base_list()?;
        self.keyword("for")?;
        let code = self.string()?;
        self.expect(&TokenKind::Semi)?;
        Ok(AdapterDecl {
            name,
            bases,
            code,
            line,
        })
    }

    fn base_list(&mut self) -> ParseResult<Vec<TypeRef>> {
        let mut bases = Vec::new();
        loop {
            let line = self.peek().line;
            bases.push(TypeRef {
                name: self.dotted()?,
                line,
            });
            if !self.eat(&TokenKind::Comma) {
                return Ok(bases);
            }
        }
    }

    fn dotted(&mut self) -> ParseResult<String> {
        let mut segments = vec![self.ident()?];
        while self.eat(&TokenKind::Dot) {
            segments.push(self.ident()?);
        }
        Ok(segments.join("."))
    }

    fn ident(&mut self) -> ParseResult<String> {
        match self.peek().kind.clone() {
            TokenKind::Ident(name) => {
                self.bump();
                Ok(name)
            }
            other => Err(self.unexpected("Identifier", &other)),
        }
    }

    fn string(&mut self) -> ParseResult<String> {
        match self.peek().kind.clone() {
            TokenKind::Str(value) => {
                self.bump();
                Ok(value)
            }
            other => Err(self.unexpected("String literal", &other)),
        }
    }

    fn keyword(&mut self, keyword: &str) -> ParseResult<()> {
        match self.peek().kind.clone() {
            TokenKind::Ident(name) if name == keyword => {
                self.bump();
                Ok(())
            }
            other => Err(self.unexpected(&format!("'{keyword}'"), &other)),
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> ParseResult<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            let found = self.peek().kind.clone();
            Err(self.unexpected(&kind.describe(), &found))
        }
    }

    fn unexpected(&mut self, expected: &str, found: &TokenKind) -> SyntaxError {
        let line = self.peek().line;
        self.error(
            codes::EXPECTED_TOKEN,
            line,
            format!("{expected} expected, found {}", found.describe()),
        );
        SyntaxError
    }

    /// Skip to just past the next `;` or `}` at top level.
    fn recover(&mut self) {
        loop {
            match self.bump().kind {
                TokenKind::Semi | TokenKind::RBrace | TokenKind::Eof => return,
                _ => {}
            }
        }
    }

    /// Skip past the next `;`, stopping before a `}` so the enclosing
    /// namespace still closes.
    fn recover_member(&mut self) {
        loop {
            match self.peek().kind {
                TokenKind::RBrace | TokenKind::Eof => return,
                TokenKind::Semi => {
                    self.bump();
                    return;
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    fn peek(&self) -> &Token {
        // The token stream always ends with Eof; never step past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error(&mut self, code: &'static str, line: u32, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::error(code, line, message));
    }
}

#[cfg(test)]
mod tests {
    use super::super::lexer::tokenize;
    use super::*;

    fn parse(source: &str) -> (Program, Vec<Diagnostic>) {
        let mut diagnostics = Vec::new();
        let tokens = tokenize(source, &mut diagnostics);
        let program = Parser::new(tokens, &mut diagnostics).parse();
        (program, diagnostics)
    }

    #[test]
    fn test_parse_generated_block() {
        let (program, diagnostics) = parse(
            "use grainport::endpoint;\n\
             namespace Fun.Foo {\n\
                 interface IA : IActorEndpoint;\n\
                 adapter A : ActorEndpoint, IA for \"Foo.A\";\n\
             }\n",
        );

        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        assert_eq!(program.imports[0].path, "grainport::endpoint");
        let namespace = &program.namespaces[0];
        assert_eq!(namespace.name, "Fun.Foo");
        assert_eq!(namespace.members.len(), 2);
        match &namespace.members[1] {
            Member::Adapter(adapter) => {
                assert_eq!(adapter.name, "A");
                assert_eq!(adapter.code, "Foo.A");
                assert_eq!(adapter.bases.len(), 2);
                assert_eq!(adapter.line, 4);
            }
            other => panic!("expected adapter, got {other:?}"),
        }
    }

    #[test]
    fn test_recovers_after_bad_member() {
        let (program, diagnostics) = parse(
            "namespace Fun.Foo {\n\
                 interface : IActorEndpoint;\n\
                 interface IB : IActorEndpoint;\n\
             }\n",
        );

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, codes::EXPECTED_TOKEN);
        assert_eq!(diagnostics[0].line, 2);
        assert_eq!(program.namespaces[0].members.len(), 1);
    }

    #[test]
    fn test_missing_closing_brace() {
        let (program, diagnostics) = parse("namespace Fun.Foo { interface IA : X;");
        assert_eq!(program.namespaces.len(), 1);
        assert!(diagnostics.iter().any(|d| d.message.contains("'}' expected")));
    }

    #[test]
    fn test_unknown_top_level_item() {
        let (program, diagnostics) = parse("class Foo; namespace Fun { }");
        assert_eq!(diagnostics[0].code, codes::UNEXPECTED_DECLARATION);
        assert_eq!(program.namespaces.len(), 1);
    }

    #[test]
    fn test_contextual_keywords_as_names() {
        let (program, diagnostics) =
            parse("namespace Fun.interface { adapter adapter : ActorEndpoint for \"x\"; }");
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        assert_eq!(program.namespaces[0].name, "Fun.interface");
    }
}
