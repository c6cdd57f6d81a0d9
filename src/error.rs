//! Error kinds, codes and source positions.
//!
//! Every failure the language can report carries a stable numeric code, a
//! rendered message, an optional list of details and the `(line, col)` where
//! it happened. Positions are attached as the error unwinds: the innermost
//! node that knows a position sets it, outer nodes only fill it in when it is
//! still missing.

use std::{collections::BTreeMap, fmt};

/// A location in the rule source. Lines and columns both start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

impl Position {
    pub fn new(line: usize, col: usize) -> Self {
        Position { line, col }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line: {}, col: {}", self.line, self.col)
    }
}

/// The named error kinds.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ErrorKind {
    #[error("internal error")]
    Internal,

    #[error("function '{function}' requires {expected} arguments, but got {got}")]
    ArgumentCount {
        function: String,
        expected: String,
        got: usize,
    },

    #[error("{function}: argument '{value}' not number")]
    ArgumentNotNumber { function: String, value: String },

    #[error(
        "function '{function}' input argument {index} must be of type {expected} or value (not {actual})"
    )]
    ArgumentInputType {
        function: String,
        index: usize,
        expected: String,
        actual: String,
    },

    #[error(
        "function '{function}' variadic input argument {index} must be of type {expected} or value (not {actual})"
    )]
    ArgumentVariadicInputType {
        function: String,
        index: usize,
        expected: String,
        actual: String,
    },

    #[error("function '{function}' argument {index} is invalid")]
    ArgumentInvalid { function: String, index: usize },

    #[error("index out of bounds {path}: 0-{len} (index {index})")]
    ArgumentOutOfBounds { path: String, len: usize, index: i64 },

    #[error("variable '{0}' is invalid")]
    VariableInvalid(String),

    #[error("variable '{0}' is not a function")]
    VariableNotFunction(String),

    #[error("can't access a field by name on type {type_name} (variable {path})")]
    VariableNotAccess { type_name: String, path: String },

    #[error("variable '{0}' cannot be used as function")]
    VariableCannotFunction(String),

    #[error("variable '{0}' cannot be set value")]
    VariableCannotSetValue(String),

    #[error("block unclosed")]
    WrapperUnclosed,

    #[error("{context}: unexpected token {token}")]
    UnexpectedToken { context: String, token: String },

    #[error("missing {delimiter} {context}")]
    MissingDelimiter {
        delimiter: String,
        context: String,
    },

    #[error("unexpected EOF, expected {0}")]
    UnexpectedEof(String),

    #[error("{0}")]
    Lexical(String),

    #[error("expected identifier, got {0}")]
    IdentifierExpected(String),

    #[error("variable '{0}' already exists")]
    VariableAlreadyExists(String),

    #[error("tag '{0}' is already registered")]
    TagRegistered(String),

    #[error("constant or function '{0}' is already registered")]
    ConstantRegistered(String),

    #[error("result key '{0}' is already registered")]
    ResultKeyRegistered(String),

    #[error("error code {0} is already registered")]
    ErrorCodeRegistered(i32),

    #[error("assignment target '{0}' is not a declared variable")]
    AssignObject(String),

    #[error("divide zero")]
    DivideByZero,

    #[error("unknown operator {0}")]
    UnknownOperator(String),

    #[error("operator '{operator}' requires numeric operands, got {left} and {right}")]
    OperandNotNumber {
        operator: String,
        left: String,
        right: String,
    },

    #[error("numeric overflow in '{0}'")]
    NumericOverflow(String),

    #[error("evaluation cancelled")]
    Cancelled,

    #[error("{message}")]
    Custom { code: i32, message: String },
}

impl ErrorKind {
    pub fn code(&self) -> i32 {
        match self {
            ErrorKind::Internal => -500,
            ErrorKind::ArgumentCount { .. } => -501,
            ErrorKind::ArgumentNotNumber { .. } => -502,
            ErrorKind::ArgumentInputType { .. } => -504,
            ErrorKind::ArgumentVariadicInputType { .. } => -505,
            ErrorKind::ArgumentInvalid { .. } => -506,
            ErrorKind::ArgumentOutOfBounds { .. } => -507,
            ErrorKind::VariableInvalid(_) => -508,
            ErrorKind::VariableNotFunction(_) => -509,
            ErrorKind::VariableNotAccess { .. } => -510,
            ErrorKind::VariableCannotFunction(_) => -511,
            ErrorKind::VariableCannotSetValue(_) => -512,
            ErrorKind::WrapperUnclosed => -513,
            ErrorKind::UnexpectedToken { .. } => -514,
            ErrorKind::MissingDelimiter { .. } => -515,
            ErrorKind::UnexpectedEof(_) => -516,
            ErrorKind::Lexical(_) => -517,
            ErrorKind::IdentifierExpected(_) => -518,
            ErrorKind::VariableAlreadyExists(_) => -519,
            ErrorKind::TagRegistered(_) => -520,
            ErrorKind::ConstantRegistered(_) => -521,
            ErrorKind::DivideByZero => -522,
            ErrorKind::UnknownOperator(_) => -523,
            ErrorKind::ResultKeyRegistered(_) => -524,
            ErrorKind::AssignObject(_) => -525,
            ErrorKind::OperandNotNumber { .. } => -526,
            ErrorKind::NumericOverflow(_) => -527,
            ErrorKind::Cancelled => -528,
            ErrorKind::ErrorCodeRegistered(_) => -529,
            ErrorKind::Custom { code, .. } => *code,
        }
    }
}

/// Codes owned by the built-in kinds. Host codes must avoid these.
const BUILTIN_CODES: std::ops::RangeInclusive<i32> = -529..=-500;

/// An error raised while lexing, parsing or evaluating a rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    kind: ErrorKind,
    details: Vec<String>,
    position: Option<Position>,
    argument: Option<usize>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Error {
            kind,
            details: Vec::new(),
            position: None,
            argument: None,
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn code(&self) -> i32 {
        self.kind.code()
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    pub fn details(&self) -> &[String] {
        &self.details
    }

    pub fn position(&self) -> Option<Position> {
        self.position
    }

    /// Index of the call argument this error refers to, if a function
    /// reported one.
    pub fn argument(&self) -> Option<usize> {
        self.argument
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.details.push(detail.into());
        self
    }

    /// Overwrites the position.
    pub fn at(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Sets the position only if none is known yet.
    pub fn or_at(mut self, position: Position) -> Self {
        if self.position.is_none() {
            self.position = Some(position);
        }
        self
    }

    /// Marks the call argument responsible for this error. The caller
    /// re-anchors the position on that argument's source location.
    pub fn at_argument(mut self, index: usize) -> Self {
        self.argument = Some(index);
        self
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(pos) => write!(f, "{}, {}", pos, self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

/// Extracts the crate error from an arbitrary error chain.
///
/// Foreign errors become [`ErrorKind::Internal`] with their message kept as
/// a detail.
pub fn cause(err: &(dyn std::error::Error + 'static)) -> Error {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(found) = e.downcast_ref::<Error>() {
            return found.clone();
        }
        if let Some(kind) = e.downcast_ref::<ErrorKind>() {
            return Error::new(kind.clone());
        }
        current = e.source();
    }
    Error::new(ErrorKind::Internal).with_detail(err.to_string())
}

/// Renders an error for the caller.
pub type ErrorFormatter = fn(&Error) -> String;

/// The default formatter: `line: L, col: C, <message>`.
pub fn format_error(err: &Error) -> String {
    let pos = err.position.unwrap_or_default();
    format!("line: {}, col: {}, {}", pos.line, pos.col, err.message())
}

/// A failed compilation or execution, rendered with the template's
/// formatter.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{rendered}")]
pub struct FormattedError {
    rendered: String,
    #[source]
    error: Error,
}

impl FormattedError {
    pub fn new(error: Error, formatter: ErrorFormatter) -> Self {
        FormattedError {
            rendered: formatter(&error),
            error,
        }
    }

    pub fn error(&self) -> &Error {
        &self.error
    }

    pub fn into_error(self) -> Error {
        self.error
    }
}

/// A host-defined error code with a message template.
///
/// Each `{}` in the template is replaced, in order, by one argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCode {
    code: i32,
    template: String,
}

impl ErrorCode {
    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn error(&self, args: &[&dyn fmt::Display]) -> Error {
        let mut message = String::with_capacity(self.template.len());
        let mut args = args.iter();
        let mut rest = self.template.as_str();
        while let Some(idx) = rest.find("{}") {
            message.push_str(&rest[..idx]);
            match args.next() {
                Some(arg) => message.push_str(&arg.to_string()),
                None => message.push_str("{}"),
            }
            rest = &rest[idx + 2..];
        }
        message.push_str(rest);
        Error::new(ErrorKind::Custom {
            code: self.code,
            message,
        })
    }
}

/// Registry of host-defined error codes, scoped to one template.
#[derive(Debug, Clone, Default)]
pub struct ErrorCodes {
    codes: BTreeMap<i32, ErrorCode>,
}

impl ErrorCodes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, code: i32, template: impl Into<String>) -> Result<ErrorCode, Error> {
        if BUILTIN_CODES.contains(&code) || self.codes.contains_key(&code) {
            return Err(ErrorKind::ErrorCodeRegistered(code).into());
        }
        let entry = ErrorCode {
            code,
            template: template.into(),
        };
        self.codes.insert(code, entry.clone());
        Ok(entry)
    }

    pub fn get(&self, code: i32) -> Option<&ErrorCode> {
        self.codes.get(&code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_format_includes_position() {
        let err = Error::new(ErrorKind::DivideByZero).at(Position::new(3, 7));
        assert_eq!(format_error(&err), "line: 3, col: 7, divide zero");
        assert_eq!(err.code(), -522);
    }

    #[test]
    fn test_or_at_keeps_inner_position() {
        let err = Error::new(ErrorKind::DivideByZero)
            .at(Position::new(1, 5))
            .or_at(Position::new(1, 1));
        assert_eq!(err.position(), Some(Position::new(1, 5)));
    }

    #[test]
    fn test_cause_extracts_crate_error() {
        let err = Error::new(ErrorKind::VariableInvalid("x".into()));
        let boxed: Box<dyn std::error::Error> = Box::new(err.clone());
        assert_eq!(cause(boxed.as_ref()), err);

        let io = std::io::Error::other("disk");
        let wrapped = cause(&io);
        assert_eq!(wrapped.code(), -500);
        assert_eq!(wrapped.details(), ["disk".to_string()]);
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let mut codes = ErrorCodes::new();
        let quota = codes.register(1001, "quota {} exceeded by {}").unwrap();
        assert_eq!(quota.error(&[&"disk", &3]).message(), "quota disk exceeded by 3");
        assert!(codes.register(1001, "again").is_err());
        assert!(codes.register(-508, "builtin").is_err());
    }
}
