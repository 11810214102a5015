//! Error kinds, the runtime unwind mechanism, and the host-facing error type.
//!
//! Grounded on the teacher's `error.rs` (`EvalAltResult`, which already
//! folds `break`/`continue`/`return` into `Err` variants alongside real
//! errors) and on spec §7. `original_source/src/ecc.c` reports parser
//! diagnostics in-band (the produced op list, if any, is replaced by a
//! single op that throws at the remembered position) — `ParseError` here
//! plays that role for the host-facing side.

use crate::text::Text;
use crate::value::Value;
use std::fmt;

/// Where in the source a runtime event should be blamed, for diagnostics.
/// Spec §4.3 calls this the context's "text-index".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Position {
    pub offset: u32,
    pub length: u32,
}

impl Position {
    pub const NONE: Position = Position { offset: 0, length: 0 };

    #[must_use]
    pub fn new(offset: u32, length: u32) -> Self {
        Position { offset, length }
    }
}

/// The non-local transfer every `break`, `continue`, `return`, and `throw`
/// uses to reach its handler (spec §4.3, §7). Implemented as the `Err` side
/// of `Result<Value, Unwind>` rather than widening `Value` with "breaker"
/// and exception-carrying tags — see DESIGN.md Open Question 1. Loops,
/// `switch`, and `try` are the only things that inspect and consume a
/// `Break`/`Continue`; everything else just propagates `Unwind` upward via
/// `?`.
#[derive(Debug, Clone)]
pub enum Unwind {
    /// `break` / `break label`.
    Break(Option<Box<str>>),
    /// `continue` / `continue label`.
    Continue(Option<Box<str>>),
    /// `return expr`.
    Return(Value),
    /// `throw expr`, or a native operation raising an error value.
    Throw(Value, Position),
}

impl Unwind {
    #[must_use]
    pub fn is_throw(&self) -> bool {
        matches!(self, Unwind::Throw(_, _))
    }
}

/// Host-facing failure: either the source failed to parse/compile, or an
/// uncaught `throw` reached the top of the call stack (spec §6 "Error
/// propagation across the host boundary").
#[derive(Debug)]
pub enum Error {
    Parse(ParseError),
    Uncaught { value: Value, position: Position, backtrace: Vec<String> },
    /// The interpreter's own resource limits were exceeded (call depth,
    /// operation count, ...); spec §5 "Stack discipline".
    ResourceLimit(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parse(e) => write!(f, "SyntaxError: {}", e),
            Error::Uncaught { value, .. } => write!(f, "uncaught exception: {}", value),
            Error::ResourceLimit(what) => write!(f, "resource limit exceeded: {}", what),
        }
    }
}

impl std::error::Error for Error {}

/// A parser/lexer diagnostic: message plus the text span it blames.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub text: Text,
    pub position: Position,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at '{}')", self.message, self.text.as_str())
    }
}

impl ParseError {
    #[must_use]
    pub fn new(message: impl Into<String>, text: Text, position: Position) -> Self {
        ParseError { message: message.into(), text, position }
    }
}
