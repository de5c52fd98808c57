//! Error types for the binding layer
//!
//! Errors come in three shapes: engine-diagnosed [`JsError`]s that carry the
//! message, location and numeric code reported by the engine, message-only
//! binding errors raised before any engine round-trip, and cast errors raised
//! when a value is viewed as a kind it is not.

use std::fmt;

use thiserror::Error;

/// Result type alias for binding operations
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error types for binding operations
#[derive(Debug, Error)]
pub enum Error {
    /// Error diagnosed by the engine (syntax error, thrown exception, interrupt)
    #[error(transparent)]
    Js(#[from] JsError),

    /// Error detected at the binding boundary, without engine diagnostics
    #[error("{0}")]
    Binding(String),

    /// A value was viewed as a kind it is not
    #[error("not {expected}")]
    Cast { expected: &'static str },

    /// A structural operation failed; `op` is the short operation prefix
    #[error("{op}: {source}")]
    Operation {
        op: &'static str,
        #[source]
        source: Box<Error>,
    },

    /// JSON decoding on the host side
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a message-only binding error
    pub fn binding(message: impl Into<String>) -> Self {
        Self::Binding(message.into())
    }

    pub(crate) fn not_object() -> Self {
        Self::Cast {
            expected: "an JS::Object",
        }
    }

    pub(crate) fn not_function() -> Self {
        Self::Cast {
            expected: "a JS::Function",
        }
    }

    /// Wrap this error with an operation prefix such as `"get property"`
    pub fn context(self, op: &'static str) -> Self {
        Self::Operation {
            op,
            source: Box::new(self),
        }
    }

    /// The engine diagnostics behind this error, looking through operation prefixes
    pub fn js_error(&self) -> Option<&JsError> {
        match self {
            Self::Js(err) => Some(err),
            Self::Operation { source, .. } => source.js_error(),
            _ => None,
        }
    }

    /// Check if this error was diagnosed by the engine
    pub fn is_js_error(&self) -> bool {
        self.js_error().is_some()
    }

    /// Numeric engine error code, if any
    pub fn code(&self) -> Option<i32> {
        self.js_error().map(|err| err.code)
    }
}

/// Add an operation prefix to the error side of a result
pub(crate) trait ResultExt<T> {
    fn op(self, op: &'static str) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn op(self, op: &'static str) -> Result<T> {
        self.map_err(|err| err.context(op))
    }
}

/// Classification of engine errors by constructor name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    EvalError,
    RangeError,
    ReferenceError,
    SyntaxError,
    TypeError,
    UriError,
    InternalError,
    AggregateError,
    /// Plain `Error`, user subclasses and thrown non-error values
    Error,
}

impl ErrorKind {
    /// Map an Error object's `name` property to a kind
    pub fn from_name(name: &str) -> Self {
        match name {
            "EvalError" => Self::EvalError,
            "RangeError" => Self::RangeError,
            "ReferenceError" => Self::ReferenceError,
            "SyntaxError" => Self::SyntaxError,
            "TypeError" => Self::TypeError,
            "URIError" => Self::UriError,
            "InternalError" => Self::InternalError,
            "AggregateError" => Self::AggregateError,
            _ => Self::Error,
        }
    }

    /// Engine-defined numeric code, in the engine's native error order
    pub fn code(self) -> i32 {
        match self {
            Self::EvalError => 0,
            Self::RangeError => 1,
            Self::ReferenceError => 2,
            Self::SyntaxError => 3,
            Self::TypeError => 4,
            Self::UriError => 5,
            Self::InternalError => 6,
            Self::AggregateError => 7,
            Self::Error => 8,
        }
    }
}

/// An error diagnosed by the engine
///
/// Always carries a human-readable message; `filename` is empty and `line`
/// is zero when the engine reported no location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsError {
    pub message: String,
    pub filename: String,
    pub line: u32,
    pub column: u32,
    pub code: i32,
    pub kind: ErrorKind,
    pub stack: Option<String>,
}

impl JsError {
    /// Create an error with no location info
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            filename: String::new(),
            line: 0,
            column: 0,
            code: kind.code(),
            kind,
            stack: None,
        }
    }

    /// Attach location info parsed from an engine stack trace
    pub fn with_stack(mut self, stack: Option<String>) -> Self {
        if let Some((filename, line, column)) = stack.as_deref().and_then(parse_location) {
            self.filename = filename;
            self.line = line;
            self.column = column;
        }
        self.stack = stack;
        self
    }

    /// Formatted `file:line` location, if the engine reported one
    pub fn location(&self) -> Option<String> {
        match (self.filename.is_empty(), self.line) {
            (true, _) => None,
            (false, 0) => Some(self.filename.clone()),
            (false, line) => Some(format!("{}:{}", self.filename, line)),
        }
    }
}

impl fmt::Display for JsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            if let Some(location) = self.location() {
                return write!(f, "{} ({})", self.message, location);
            }
        }
        f.write_str(&self.message)
    }
}

impl std::error::Error for JsError {}

/// Extract `(filename, line, column)` from the first located frame of a stack trace
///
/// Frames look like `    at fn (file:line:col)` or, for parse errors,
/// `    at file:line:col`. Frames without a location (`(native)`) are skipped.
pub(crate) fn parse_location(stack: &str) -> Option<(String, u32, u32)> {
    stack.lines().find_map(|frame| {
        let frame = frame.trim().strip_prefix("at ")?;
        let location = match frame.rfind(" (") {
            Some(open) if frame.ends_with(')') => &frame[open + 2..frame.len() - 1],
            _ => frame,
        };
        let mut parts = location.rsplitn(3, ':');
        let column = parts.next()?.parse().ok()?;
        let line = parts.next()?.parse().ok()?;
        let filename = parts.next()?;
        Some((filename.to_string(), line, column))
    })
}
