//! Token types produced by the lexer.

use std::fmt;

/// The kind of a token, independent of its source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum TokenKind {
    Identifier,
    Number,
    String,
    Operator,
    Keyword,
    Punctuation,
    Boolean,
    Null,
    Indent,
    Dedent,
    Newline,
    Eof,
    Error,
}

/// A single lexical token.
///
/// Tokens are transient: the lexer produces them on demand and the parser
/// consumes them immediately, so `Token` borrows nothing from the source
/// and owns its lexeme.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: u32,
    pub column: u32,
}

impl Token {
    #[must_use]
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            line,
            column,
        }
    }

    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({:?}) at {}:{}", self.kind, self.lexeme, self.line, self.column)
    }
}

/// Keywords recognized by the lexer. Case-sensitive, matched after an
/// identifier has been scanned.
pub const KEYWORDS: &[&str] = &[
    "var", "let", "if", "else", "while", "for", "switch", "case", "default", "return", "function", "true", "false",
    "null", "import", "fire",
];

#[must_use]
pub fn keyword_kind(lexeme: &str) -> Option<TokenKind> {
    match lexeme {
        "true" | "false" => Some(TokenKind::Boolean),
        "null" => Some(TokenKind::Null),
        _ if KEYWORDS.contains(&lexeme) => Some(TokenKind::Keyword),
        _ => None,
    }
}
