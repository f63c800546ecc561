use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: PathBuf,
    pub line: usize,
    pub text: String,
}

impl Location {
    pub fn new(file: PathBuf, line: usize, text: impl Into<String>) -> Self {
        Self {
            file,
            line,
            text: text.into(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Extract just the filename from the path
        let filename = self
            .file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_else(|| self.file.to_str().unwrap_or("<unknown>"));
        write!(f, "File: {} line {}\n    {}", filename, self.line, self.text.trim())
    }
}

/// Number of arguments a callable accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{}", n),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("unknown token '{0}'")]
    UnknownToken(String),
    #[error("unmatched parenthesis {0}")]
    UnmatchedParenthesis(String),
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),
    #[error("undefined function '{0}'")]
    UndefinedFunction(String),
    #[error("function '{name}' expects {expected} argument(s), got {found}")]
    ArityMismatch {
        name: String,
        expected: Arity,
        found: usize,
    },
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("builtin '{name}' failed: {message}")]
    BuiltinFailure { name: String, message: String },
    #[error("malformed statement: {0}")]
    MalformedStatement(String),
    #[error("malformed expression: {0}")]
    MalformedExpression(String),
    #[error("module '{0}' not found")]
    ModuleNotFound(String),
    #[error("import cycle detected: {0}")]
    ImportCycle(String),
    #[error("maximum call depth of {0} exceeded")]
    CallDepthExceeded(usize),
    /// Raised by `quit`; the outermost run treats it as a normal end.
    #[error("program halted")]
    Halt,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// An error together with the source line that raised it, when known.
#[derive(Debug, Error)]
#[error("{kind}{}", render_location(.location))]
pub struct LangError {
    pub kind: ErrorKind,
    pub location: Option<Location>,
}

pub type LangResult<T> = Result<T, LangError>;

fn render_location(location: &Option<Location>) -> String {
    match location {
        Some(loc) => format!("\n{}", loc),
        None => String::new(),
    }
}

impl LangError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            location: None,
        }
    }

    pub fn is_halt(&self) -> bool {
        matches!(self.kind, ErrorKind::Halt)
    }

    /// Attaches `location` unless a more specific one is already recorded.
    pub fn or_at(mut self, location: impl FnOnce() -> Location) -> Self {
        if self.location.is_none() {
            self.location = Some(location());
        }
        self
    }
}

impl From<ErrorKind> for LangError {
    fn from(kind: ErrorKind) -> Self {
        LangError::new(kind)
    }
}

impl From<std::io::Error> for LangError {
    fn from(value: std::io::Error) -> Self {
        LangError::new(ErrorKind::Io(value))
    }
}
