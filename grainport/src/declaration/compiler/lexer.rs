//! Tokenizer for endpoint programs.

use super::diagnostic::{codes, Diagnostic};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum TokenKind {
    Ident(String),
    Str(String),
    PathSep,
    Dot,
    Colon,
    Semi,
    Comma,
    LBrace,
    RBrace,
    Eof,
}

impl TokenKind {
    pub(super) fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier '{name}'"),
            TokenKind::Str(value) => format!("string \"{value}\""),
            TokenKind::PathSep => "'::'".to_string(),
            TokenKind::Dot => "'.'".to_string(),
            TokenKind::Colon => "':'".to_string(),
            TokenKind::Semi => "';'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::LBrace => "'{'".to_string(),
            TokenKind::RBrace => "'}'".to_string(),
            TokenKind::Eof => "end of file".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Token {
    pub kind: TokenKind,
    pub line: u32,
}

/// Split `source` into tokens. Bad characters are reported and skipped; the
/// token stream always ends with `Eof`.
pub(super) fn tokenize(source: &str, diagnostics: &mut Vec<Diagnostic>) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    let mut line = 1u32;

    while let Some(c) = chars.next() {
        let kind = match c {
            '\n' => {
                line += 1;
                continue;
            }
            c if c.is_whitespace() => continue,
            '/' if chars.peek() == Some(&'/') => {
                while chars.next_if(|&next| next != '\n').is_some() {}
                continue;
            }
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                TokenKind::PathSep
            }
            ':' => TokenKind::Colon,
            '.' => TokenKind::Dot,
            ';' => TokenKind::Semi,
            ',' => TokenKind::Comma,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '"' => {
                let start = line;
                let mut value = String::new();
                let mut closed = false;
                let mut newline = false;
                while let Some(next) = chars.next() {
                    match next {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => match chars.next() {
                            Some(escaped @ ('"' | '\\')) => value.push(escaped),
                            Some(other) => {
                                diagnostics.push(Diagnostic::error(
                                    codes::UNRECOGNIZED_ESCAPE,
                                    line,
                                    format!("Unrecognized escape sequence '\\{other}'"),
                                ));
                            }
                            None => break,
                        },
                        '\n' => {
                            newline = true;
                            break;
                        }
                        other => value.push(other),
                    }
                }
                if !closed {
                    diagnostics.push(Diagnostic::error(
                        codes::UNTERMINATED_STRING,
                        start,
                        "Unterminated string literal",
                    ));
                }
                if newline {
                    line += 1;
                }
                TokenKind::Str(value)
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::from(c);
                while let Some(next) = chars.next_if(|&n| n.is_alphanumeric() || n == '_') {
                    ident.push(next);
                }
                TokenKind::Ident(ident)
            }
            other => {
                diagnostics.push(Diagnostic::error(
                    codes::UNEXPECTED_CHARACTER,
                    line,
                    format!("Unexpected character '{other}'"),
                ));
                continue;
            }
        };
        tokens.push(Token { kind, line });
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        line,
    });
    tokens
}
