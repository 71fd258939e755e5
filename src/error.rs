// ABOUTME: Error types for every phase of the reader/compiler pipeline

use crate::span::Span;
use thiserror::Error;

/// Which stage of the pipeline raised a [`CompileError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Lex,
    Read,
    Expand,
    Emit,
    Host,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Lex => "lex",
            Phase::Read => "read",
            Phase::Expand => "expand",
            Phase::Emit => "emit",
            Phase::Host => "host",
        };
        write!(f, "{s}")
    }
}

#[derive(Error, Debug, Clone)]
pub enum LexError {
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("invalid escape sequence '\\{0}'")]
    BadEscape(char),
    #[error("unbalanced bracket literal")]
    UnbalancedBracket,
    #[error("invalid numeric-looking token '{0}'")]
    BadNumber(String),
}

#[derive(Error, Debug, Clone)]
pub enum ReadError {
    #[error("unexpected ')' with no matching '('")]
    UnexpectedClose,
    #[error("end of input while reading a tuple opened at {0}")]
    EofInForm(Span),
    #[error("reader macro '{0}' consumed no form")]
    BadReaderMacro(String),
    #[error("no reader macro registered for dispatch prefix '{0}#'")]
    UnknownReaderMacro(String),
    #[error("',' or ',@' used outside of a quasiquote template")]
    UnquoteOutsideTemplate,
    #[error("qualified symbol '{0}' has an empty package or name part")]
    MalformedQualifiedSymbol(String),
}

#[derive(Error, Debug, Clone)]
pub enum MacroError {
    #[error("macro '{name}' expects {expected} argument{}, got {actual}", if *expected == 1 {""} else {"s"})]
    Arity { name: String, expected: usize, actual: usize },
    #[error("macro '{0}' raised an error during expansion: {1}")]
    Raised(String, String),
}

#[derive(Error, Debug, Clone)]
pub enum EmitError {
    #[error("malformed parameter tuple: {0}")]
    BadParamTuple(String),
    #[error("malformed pairing section in call: {0}")]
    BadPairing(String),
    #[error("'{0}' is not a special form and not bound as a macro")]
    UnknownHead(String),
    #[error("lambda body must contain at least one expression")]
    EmptyLambdaBody,
}

#[derive(Error, Debug, Clone)]
pub enum HostError {
    #[error("name '{0}' is not defined")]
    UndefinedName(String),
    #[error("module '{0}' has no attribute '{1}'")]
    NoAttribute(String, String),
    #[error("value of type {0} is not callable")]
    NotCallable(String),
    #[error("{0}")]
    TypeError(String),
    #[error("{function}: expected {expected} argument{}, got {actual}", if *expected == 1 {""} else {"s"})]
    Arity { function: String, expected: usize, actual: usize },
    #[error("{0}")]
    Other(String),
}

/// The single error type a caller of the compiler pipeline ever sees.
#[derive(Error, Debug, Clone)]
pub enum HisspError {
    #[error("{0}")]
    Lex(#[from] LexError),
    #[error("{0}")]
    Read(#[from] ReadError),
    #[error("{0}")]
    Macro(#[from] MacroError),
    #[error("macro expansion did not reach a fixed point within {depth} passes")]
    MacroLoop { depth: usize },
    #[error("{0}")]
    Emit(#[from] EmitError),
    #[error("{0}")]
    Host(#[from] HostError),
}

/// A [`HisspError`] located in source text, the only error type that crosses
/// the compiler's public boundary.
#[derive(Error, Debug, Clone)]
#[error("{phase}: {cause}")]
pub struct CompileError {
    pub phase: Phase,
    pub span: Span,
    pub cause: HisspError,
}

impl CompileError {
    pub fn new(phase: Phase, span: Span, cause: impl Into<HisspError>) -> Self {
        CompileError { phase, span, cause: cause.into() }
    }
}
