//! Indentation-aware lexer (spec.md §4.1).

use crate::{
    exception_private::ParseError,
    exception_public::CodeLoc,
    token::{Token, TokenKind, keyword_kind},
};

/// Two-character operators, longest match first so e.g. `<=` isn't lexed as
/// `<` then `=`.
const TWO_CHAR_OPERATORS: &[(&str, )] = &[
    ("==",), ("!=",), ("<=",), (">=",), ("&&",), ("||",), ("..",), ("<-",),
];

/// Converts source text into a token stream, synthesizing `Indent`/`Dedent`
/// tokens from column tracking.
///
/// `Lexer` is an iterator: `next()` pulls the next token, refilling an
/// internal queue whenever a single line boundary produces more than one
/// token (several `Dedent`s, or a `Dedent` run followed by the next line's
/// first real token).
pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    /// Stack of open indentation columns; always starts with the implicit
    /// base level `0` (spec.md invariant).
    indent_stack: Vec<u32>,
    at_line_start: bool,
    queue: std::collections::VecDeque<Token>,
    done: bool,
    errors: Vec<ParseError>,
}

impl Lexer {
    #[must_use]
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            indent_stack: vec![0],
            at_line_start: true,
            queue: std::collections::VecDeque::new(),
            done: false,
            errors: Vec::new(),
        }
    }

    /// Runs the lexer to completion, returning every token (terminated by
    /// exactly one `Eof`) and any lexical errors encountered.
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<ParseError>) {
        let mut tokens = Vec::new();
        while let Some(tok) = self.next() {
            let is_eof = tok.is_eof();
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        (tokens, self.errors)
    }

    fn loc(&self) -> CodeLoc {
        CodeLoc::new(self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn push_error(&mut self, err: ParseError) {
        self.errors.push(err);
    }

    /// Measures indentation at the current line start, handling blank and
    /// comment-only lines (which never change the stack), and queues the
    /// resulting `Indent`/`Dedent` tokens.
    fn handle_line_start(&mut self) {
        loop {
            let mut column = 0u32;
            loop {
                match self.peek() {
                    Some(' ') | Some('\t') => {
                        column += 1;
                        self.advance();
                    }
                    _ => break,
                }
            }
            match self.peek() {
                None => {
                    self.flush_dedents_to(0, self.loc());
                    self.at_line_start = false;
                    return;
                }
                Some('\n') => {
                    // Blank line: consume it and retry measuring the next one.
                    self.advance();
                    continue;
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    // Comment-only line: skip to end of line, then retry.
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.advance();
                    }
                    continue;
                }
                _ => {
                    let top = *self.indent_stack.last().unwrap_or(&0);
                    match column.cmp(&top) {
                        std::cmp::Ordering::Greater => {
                            self.indent_stack.push(column);
                            self.queue.push_back(Token::new(TokenKind::Indent, "", self.line, 1));
                        }
                        std::cmp::Ordering::Less => {
                            self.flush_dedents_to(column, self.loc());
                        }
                        std::cmp::Ordering::Equal => {}
                    }
                    self.at_line_start = false;
                    return;
                }
            }
        }
    }

    /// Pops the indentation stack down to `target`, emitting one `Dedent`
    /// per pop. If no popped level matches `target` exactly, records an
    /// `InconsistentDedent` error (spec.md §4.1) and snaps to the nearest
    /// enclosing level so lexing can continue.
    fn flush_dedents_to(&mut self, target: u32, loc: CodeLoc) {
        while *self.indent_stack.last().unwrap_or(&0) > target {
            self.indent_stack.pop();
            self.queue.push_back(Token::new(TokenKind::Dedent, "", loc.line, 1));
        }
        if *self.indent_stack.last().unwrap_or(&0) != target {
            self.push_error(ParseError::InconsistentDedent {
                found_column: target,
                loc,
            });
            self.indent_stack.push(target);
        }
    }

    fn scan_string(&mut self) -> Token {
        let loc = self.loc();
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    self.push_error(ParseError::UnterminatedString { loc });
                    return Token::new(TokenKind::Error, value, loc.line, loc.column);
                }
                Some('"') => {
                    self.advance();
                    return Token::new(TokenKind::String, value, loc.line, loc.column);
                }
                Some('\\') => {
                    self.advance();
                    let escaped = match self.advance() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('"') => '"',
                        Some('\\') => '\\',
                        Some('0') => '\0',
                        Some(other) => other,
                        None => {
                            self.push_error(ParseError::UnterminatedString { loc });
                            return Token::new(TokenKind::Error, value, loc.line, loc.column);
                        }
                    };
                    value.push(escaped);
                }
                Some(ch) => {
                    value.push(ch);
                    self.advance();
                }
            }
        }
    }

    fn scan_number(&mut self) -> Token {
        let loc = self.loc();
        let mut text = String::new();
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            text.push(self.advance().unwrap());
        }
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            text.push(self.advance().unwrap());
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                text.push(self.advance().unwrap());
            }
        }
        Token::new(TokenKind::Number, text, loc.line, loc.column)
    }

    fn scan_identifier(&mut self) -> Token {
        let loc = self.loc();
        let mut text = String::new();
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
            text.push(self.advance().unwrap());
        }
        let kind = keyword_kind(&text).unwrap_or(TokenKind::Identifier);
        Token::new(kind, text, loc.line, loc.column)
    }
}

impl Iterator for Lexer {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if let Some(tok) = self.queue.pop_front() {
            return Some(tok);
        }
        if self.done {
            return None;
        }

        if self.at_line_start {
            self.handle_line_start();
            if let Some(tok) = self.queue.pop_front() {
                return Some(tok);
            }
        }

        // Skip intra-line whitespace (not at line start — that's handled above).
        while matches!(self.peek(), Some(' ') | Some('\t')) {
            self.advance();
        }

        // Line comment: skip to end of line, then treat as a newline.
        if self.peek() == Some('/') && self.peek_at(1) == Some('/') {
            while self.peek().is_some_and(|c| c != '\n') {
                self.advance();
            }
        }

        let loc = self.loc();
        match self.peek() {
            None => {
                self.done = true;
                // Final dedents down to base already queued by handle_line_start
                // when it hit EOF at a fresh line; if we reached EOF mid-line,
                // flush here too.
                self.flush_dedents_to(0, loc);
                self.queue.push_back(Token::new(TokenKind::Eof, "", loc.line, loc.column));
                self.queue.pop_front()
            }
            Some('\n') => {
                self.advance();
                self.at_line_start = true;
                Some(Token::new(TokenKind::Newline, "", loc.line, loc.column))
            }
            Some('"') => Some(self.scan_string()),
            Some(c) if c.is_ascii_digit() => Some(self.scan_number()),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => Some(self.scan_identifier()),
            Some(c) => {
                if let Some(next) = self.peek_at(1) {
                    let pair: String = [c, next].iter().collect();
                    if TWO_CHAR_OPERATORS.iter().any(|(op,)| *op == pair) {
                        self.advance();
                        self.advance();
                        return Some(Token::new(TokenKind::Operator, pair, loc.line, loc.column));
                    }
                }
                self.advance();
                match c {
                    '+' | '-' | '*' | '/' | '%' | '<' | '>' | '=' | '!' | '&' | '|' | ':' | '.' => {
                        Some(Token::new(TokenKind::Operator, c.to_string(), loc.line, loc.column))
                    }
                    '(' | ')' | '{' | '}' | '[' | ']' | ',' | ';' => {
                        Some(Token::new(TokenKind::Punctuation, c.to_string(), loc.line, loc.column))
                    }
                    other => {
                        self.push_error(ParseError::InvalidCharacter { ch: other, loc });
                        Some(Token::new(TokenKind::Error, other.to_string(), loc.line, loc.column))
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let (tokens, errors) = Lexer::new(src).tokenize();
        assert!(errors.is_empty(), "unexpected lex errors: {errors:?}");
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn balanced_indent_dedent_counts_match() {
        let src = "if x\n    y: 1\n    if z\n        w: 2\nq: 3\n";
        let (tokens, errors) = Lexer::new(src).tokenize();
        assert!(errors.is_empty());
        let indents = tokens.iter().filter(|t| t.kind == TokenKind::Indent).count();
        let dedents = tokens.iter().filter(|t| t.kind == TokenKind::Dedent).count();
        assert_eq!(indents, dedents);
    }

    #[test]
    fn keywords_and_identifiers() {
        let ks = kinds("var x\nif y\n");
        assert_eq!(ks[0], TokenKind::Keyword);
        assert_eq!(ks[1], TokenKind::Identifier);
    }

    #[test]
    fn two_char_operators_are_not_split() {
        let (tokens, errors) = Lexer::new("a <= b\n").tokenize();
        assert!(errors.is_empty());
        let op = tokens.iter().find(|t| t.kind == TokenKind::Operator).unwrap();
        assert_eq!(op.lexeme, "<=");
    }

    #[test]
    fn string_escapes_are_unescaped() {
        let (tokens, errors) = Lexer::new("\"a\\nb\"\n").tokenize();
        assert!(errors.is_empty());
        assert_eq!(tokens[0].lexeme, "a\nb");
    }

    #[test]
    fn unterminated_string_is_reported() {
        let (_, errors) = Lexer::new("\"abc\n").tokenize();
        assert!(matches!(errors.as_slice(), [ParseError::UnterminatedString { .. }]));
    }

    #[test]
    fn inconsistent_dedent_is_reported() {
        let src = "if x\n    y: 1\n  z: 2\n";
        let (_, errors) = Lexer::new(src).tokenize();
        assert!(matches!(errors.as_slice(), [ParseError::InconsistentDedent { .. }]));
    }

    #[test]
    fn blank_and_comment_lines_do_not_change_indentation() {
        let src = "if x\n    y: 1\n\n    // a comment\n    z: 2\nq: 3\n";
        let (tokens, errors) = Lexer::new(src).tokenize();
        assert!(errors.is_empty());
        let indents = tokens.iter().filter(|t| t.kind == TokenKind::Indent).count();
        let dedents = tokens.iter().filter(|t| t.kind == TokenKind::Dedent).count();
        assert_eq!(indents, 1);
        assert_eq!(dedents, 1);
    }
}
