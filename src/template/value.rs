use std::fmt;

use crate::error::Error;

/// Runtime value flowing through template pipelines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// The resolved mapping itself; fields on it are name lookups
    Root,
    Str(String),
    Int(i64),
    Bool(bool),
    /// Space-delimited list, printed space-joined
    List(Vec<String>),
    /// Raw bytes from `file`/`get`, printed as UTF-8
    Bytes(Vec<u8>),
}

impl Value {
    /// Text form used when printing and for text arguments.
    pub fn to_text(&self) -> String {
        match self {
            Value::Root => String::new(),
            Value::Str(s) => s.clone(),
            Value::Int(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::List(items) => items.join(" "),
            Value::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    /// List form: lists as-is, anything else trimmed and split on single spaces.
    pub fn to_list(&self) -> Vec<String> {
        match self {
            Value::List(items) => items.clone(),
            other => split_tokens(&other.to_text()),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Root => true,
            Value::Str(s) => !s.is_empty(),
            Value::Int(n) => *n != 0,
            Value::Bool(b) => *b,
            Value::List(items) => !items.is_empty(),
            Value::Bytes(bytes) => !bytes.is_empty(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Root => "mapping",
            Value::Str(_) => "string",
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::List(_) => "list",
            Value::Bytes(_) => "bytes",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

/// Strips leading and trailing space characters (only ' ').
pub fn trim_spaces(text: &str) -> &str {
    text.trim_matches(' ')
}

/// Trims, then splits on single spaces. Empty text yields one empty token.
pub fn split_tokens(text: &str) -> Vec<String> {
    trim_spaces(text).split(' ').map(str::to_string).collect()
}

/// Failure while executing a template.
#[derive(Debug)]
pub enum ExecError {
    /// Recoverable: the fragment is left in place and reported
    Unresolved(String),
    /// Aborts the whole run
    Fatal(Error),
}

impl From<Error> for ExecError {
    fn from(err: Error) -> Self {
        ExecError::Fatal(err)
    }
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecError::Unresolved(msg) => f.write_str(msg),
            ExecError::Fatal(err) => write!(f, "{err}"),
        }
    }
}

pub type ExecResult<T> = std::result::Result<T, ExecError>;

/// Shorthand for a recoverable error.
pub fn unresolved<T>(msg: impl Into<String>) -> ExecResult<T> {
    Err(ExecError::Unresolved(msg.into()))
}
