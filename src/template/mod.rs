//! Double-brace template notation.
//!
//! Templates follow the Go `text/template` action syntax: `{{.Name}}` looks a
//! name up in the resolved mapping, `{{ fn arg | fn2 }}` calls the function
//! library, and `if`/`range`/`with` blocks are supported. Anything that cannot
//! be evaluated yet is left in the output verbatim rather than failing.

mod exec;
mod lexer;
mod parser;
pub mod value;

use thiserror::Error;

use crate::error::Result;
use crate::functions::Functions;
use crate::loader::Loader;
use crate::mapping::Mapping;

pub use lexer::Span;
pub use parser::{Command, Node, Operand, Pipeline};
pub use value::Value;

/// Malformed template text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("template: {message} at byte {offset}")]
pub struct ParseError {
    pub message: String,
    pub offset: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self { message: message.into(), offset }
    }
}

/// A parsed template, ready to execute against any mapping.
#[derive(Debug, Clone)]
pub struct Template<'s> {
    source: &'s str,
    nodes: Vec<Node>,
}

impl<'s> Template<'s> {
    pub fn parse(source: &'s str) -> std::result::Result<Self, ParseError> {
        Ok(Self { source, nodes: parser::parse(source)? })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Executes the template once.
    ///
    /// # Returns
    /// * The rendered text and a message per fragment left unresolved
    ///
    /// # Errors
    /// * Fatal function failures (`curl`, `file`, `base64Decode`)
    pub fn execute(
        &self,
        mapping: &Mapping,
        functions: &Functions,
        loader: &dyn Loader,
    ) -> Result<(String, Vec<String>)> {
        exec::Exec::new(self.source, mapping, functions, loader).run(&self.nodes)
    }
}
