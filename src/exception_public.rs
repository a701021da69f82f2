//! Public-facing error surface delivered through the error callback.
//!
//! Internal errors (see `exception_private`) carry whatever context the
//! producing stage needs; at the callback boundary they collapse into this
//! small, `Display`-only shape so hosts get one stable type regardless of
//! which stage failed.

use std::fmt;

/// Source location of an error, in 1-based line/column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CodeLoc {
    pub line: u32,
    pub column: u32,
}

impl CodeLoc {
    #[must_use]
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for CodeLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The single user-visible error type. The core never writes errors to a
/// process stream itself — every error reaches the host exclusively through
/// an `ErrorSink` callback carrying one of these.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScriptError {
    pub loc: CodeLoc,
    pub message: String,
}

impl ScriptError {
    #[must_use]
    pub fn new(loc: CodeLoc, message: impl Into<String>) -> Self {
        Self {
            loc,
            message: message.into(),
        }
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.loc, self.message)
    }
}

impl std::error::Error for ScriptError {}

/// Callback signature used by the parser and VM to surface every error kind.
pub trait ErrorSink {
    fn report(&mut self, error: ScriptError);
}

/// An `ErrorSink` that records every error it receives, in order.
///
/// The default test/embedding-friendly sink: hosts that want to collect
/// diagnostics rather than stream them use this.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    pub errors: Vec<ScriptError>,
}

impl ErrorSink for CollectingSink {
    fn report(&mut self, error: ScriptError) {
        self.errors.push(error);
    }
}

impl<F: FnMut(ScriptError)> ErrorSink for F {
    fn report(&mut self, error: ScriptError) {
        self(error);
    }
}
