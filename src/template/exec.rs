//! Evaluates a parsed template against the resolved mapping.
//!
//! Fatal errors abort evaluation. Unresolved ones are collected, and the
//! source text of the failing action (or whole control block) is copied to
//! the output unchanged so a later pass may complete it. A fragment that
//! depends on a variable or a block's dot is only meaningful with that scope,
//! so its failure widens what is copied: to the outermost block, or to the
//! whole text when it refers to a top-level variable.

use log::debug;

use super::lexer::{scan, Segment, Span, Token};
use super::parser::{Command, Node, Operand, Pipeline};
use super::value::{split_tokens, trim_spaces, unresolved, ExecError, ExecResult, Value};
use crate::error::Result;
use crate::functions::{CallContext, Functions};
use crate::loader::Loader;
use crate::mapping::Mapping;

/// How much source text an unresolved fragment drags along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Scope {
    Fragment,
    Block,
    Text,
}

/// Names of the `$variables` a fragment of template source refers to.
fn referenced_vars(fragment: &str) -> Vec<String> {
    let Ok(segments) = scan(fragment) else {
        return Vec::new();
    };
    segments
        .into_iter()
        .flat_map(|segment| match segment {
            Segment::Action { tokens, .. } => tokens,
            Segment::Text(_) => Vec::new(),
        })
        .filter_map(|token| match token {
            Token::Variable(name, _) if !name.is_empty() => Some(name),
            _ => None,
        })
        .collect()
}

pub struct Exec<'a> {
    source: &'a str,
    mapping: &'a Mapping,
    functions: &'a Functions,
    loader: &'a dyn Loader,
    vars: Vec<(String, Value)>,
    /// Variables declared at top level before the current top-level node
    top_vars: usize,
    scope: Scope,
    unresolved: Vec<String>,
}

impl<'a> Exec<'a> {
    pub fn new(
        source: &'a str,
        mapping: &'a Mapping,
        functions: &'a Functions,
        loader: &'a dyn Loader,
    ) -> Self {
        Self {
            source,
            mapping,
            functions,
            loader,
            vars: Vec::new(),
            top_vars: 0,
            scope: Scope::Fragment,
            unresolved: Vec::new(),
        }
    }

    /// Renders `nodes`, returning the text and the unresolved fragment messages.
    pub fn run(mut self, nodes: &[Node]) -> Result<(String, Vec<String>)> {
        let mut out = String::with_capacity(self.source.len());
        for node in nodes {
            let mark = out.len();
            self.top_vars = self.vars.len();
            self.scope = Scope::Fragment;
            self.walk(std::slice::from_ref(node), &Value::Root, &mut out)?;

            match (self.scope, node.span()) {
                (Scope::Text, _) => {
                    debug!("Leaving the whole text unresolved, a fragment needs its variables.");
                    return Ok((self.source.to_string(), self.unresolved));
                }
                (Scope::Block, Some(span)) => {
                    out.truncate(mark);
                    out.push_str(&self.source[span.start..span.end]);
                }
                _ => {}
            }
        }
        Ok((out, self.unresolved))
    }

    fn walk(&mut self, nodes: &[Node], dot: &Value, out: &mut String) -> Result<()> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Action { pipe, span } => match self.pipeline(pipe, dot) {
                    Ok(_) if !pipe.decl.is_empty() => {}
                    Ok(Value::Root) => {
                        self.leave(*span, "can't print the whole mapping", dot, out)
                    }
                    Ok(value) => out.push_str(&value.to_text()),
                    Err(ExecError::Unresolved(msg)) => self.leave(*span, msg, dot, out),
                    Err(ExecError::Fatal(err)) => return Err(err),
                },
                Node::If { branches, otherwise, span } => {
                    let mark = self.vars.len();
                    self.branch(branches, otherwise, *span, dot, out)?;
                    self.vars.truncate(mark);
                }
                Node::Range { pipe, body, otherwise, span } => {
                    self.range(pipe, body, otherwise, *span, dot, out)?;
                }
                Node::With { pipe, body, otherwise, span } => {
                    let mark = self.vars.len();
                    match self.pipeline(pipe, dot) {
                        Ok(value) if value.is_truthy() => self.walk(body, &value, out)?,
                        Ok(_) => self.walk(otherwise, dot, out)?,
                        Err(ExecError::Unresolved(msg)) => self.leave(*span, msg, dot, out),
                        Err(ExecError::Fatal(err)) => return Err(err),
                    }
                    self.vars.truncate(mark);
                }
            }
        }
        Ok(())
    }

    /// Walks the first branch whose condition holds, else `otherwise`.
    fn branch(
        &mut self,
        branches: &[(Pipeline, Vec<Node>)],
        otherwise: &[Node],
        span: Span,
        dot: &Value,
        out: &mut String,
    ) -> Result<()> {
        for (cond, body) in branches {
            match self.pipeline(cond, dot) {
                Ok(value) if value.is_truthy() => return self.walk(body, dot, out),
                Ok(_) => {}
                Err(ExecError::Unresolved(msg)) => {
                    self.leave(span, msg, dot, out);
                    return Ok(());
                }
                Err(ExecError::Fatal(err)) => return Err(err),
            }
        }
        self.walk(otherwise, dot, out)
    }

    fn range(
        &mut self,
        pipe: &Pipeline,
        body: &[Node],
        otherwise: &[Node],
        span: Span,
        dot: &Value,
        out: &mut String,
    ) -> Result<()> {
        let items = match self.eval_commands(&pipe.cmds, dot) {
            Ok(value) => match value {
                Value::List(items) => Ok(items),
                Value::Str(s) if trim_spaces(&s).is_empty() => Ok(Vec::new()),
                Value::Str(s) => Ok(split_tokens(&s)),
                Value::Bytes(bytes) => Ok(split_tokens(&String::from_utf8_lossy(&bytes))),
                Value::Int(n) => Ok((0..n.max(0)).map(|i| i.to_string()).collect()),
                other => unresolved(format!("range can't iterate over {}", other.type_name())),
            },
            Err(err) => Err(err),
        };
        let items = match items {
            Ok(items) => items,
            Err(ExecError::Unresolved(msg)) => {
                self.leave(span, msg, dot, out);
                return Ok(());
            }
            Err(ExecError::Fatal(err)) => return Err(err),
        };

        if items.is_empty() {
            return self.walk(otherwise, dot, out);
        }

        for (index, item) in items.into_iter().enumerate() {
            let mark = self.vars.len();
            let element = Value::Str(item);
            match pipe.decl.as_slice() {
                [value] => self.vars.push((value.clone(), element.clone())),
                [key, value] => {
                    self.vars.push((key.clone(), Value::Int(index as i64)));
                    self.vars.push((value.clone(), element.clone()));
                }
                _ => {}
            }
            self.walk(body, &element, out)?;
            self.vars.truncate(mark);
        }
        Ok(())
    }

    /// Copies the source of a failed fragment to the output and records why.
    fn leave(&mut self, span: Span, msg: impl Into<String>, dot: &Value, out: &mut String) {
        let source = self.source;
        let fragment = &source[span.start..span.end];
        let msg = msg.into();
        debug!("Leaving {fragment:?} unresolved: {msg}");
        self.unresolved.push(format!("{fragment}: {msg}"));
        out.push_str(fragment);

        let needed = referenced_vars(fragment);
        let uses = |vars: &[(String, Value)]| vars.iter().any(|(var, _)| needed.contains(var));
        let scope = if uses(&self.vars[..self.top_vars]) {
            Scope::Text
        } else if uses(&self.vars[self.top_vars..]) || !matches!(dot, Value::Root) {
            Scope::Block
        } else {
            Scope::Fragment
        };
        self.scope = self.scope.max(scope);
    }

    fn pipeline(&mut self, pipe: &Pipeline, dot: &Value) -> ExecResult<Value> {
        let value = self.eval_commands(&pipe.cmds, dot)?;
        for name in &pipe.decl {
            if pipe.assign {
                match self.vars.iter_mut().rev().find(|(var, _)| var == name) {
                    Some((_, slot)) => *slot = value.clone(),
                    None => return unresolved(format!("undefined variable: ${name}")),
                }
            } else {
                self.vars.push((name.clone(), value.clone()));
            }
        }
        Ok(value)
    }

    fn eval_commands(&mut self, cmds: &[Command], dot: &Value) -> ExecResult<Value> {
        let mut piped = None;
        for cmd in cmds {
            piped = Some(self.command(cmd, dot, piped)?);
        }
        Ok(piped.unwrap_or(Value::Root))
    }

    fn command(&mut self, cmd: &Command, dot: &Value, piped: Option<Value>) -> ExecResult<Value> {
        let (first, rest) = match cmd.args.split_first() {
            Some(split) => split,
            None => return unresolved("empty command"),
        };

        if let Operand::Func(name) = first {
            let mut args = Vec::with_capacity(rest.len() + 1);
            for operand in rest {
                args.push(self.argument(operand, dot)?);
            }
            args.extend(piped);
            return self.call(name, args);
        }

        if !rest.is_empty() || piped.is_some() {
            return unresolved("can't give argument to non-function");
        }
        self.argument(first, dot)
    }

    fn argument(&mut self, operand: &Operand, dot: &Value) -> ExecResult<Value> {
        match operand {
            Operand::Dot => Ok(dot.clone()),
            Operand::Field(fields) => self.fields(dot.clone(), fields),
            Operand::Variable(name, fields) => {
                let base = if name.is_empty() {
                    Value::Root
                } else {
                    match self.vars.iter().rev().find(|(var, _)| var == name) {
                        Some((_, value)) => value.clone(),
                        None => return unresolved(format!("undefined variable: ${name}")),
                    }
                };
                self.fields(base, fields)
            }
            Operand::Func(name) => self.call(name, Vec::new()),
            Operand::Str(s) => Ok(Value::Str(s.clone())),
            Operand::Int(n) => Ok(Value::Int(*n)),
            Operand::Bool(b) => Ok(Value::Bool(*b)),
            Operand::Sub(pipe) => self.pipeline(pipe, dot),
        }
    }

    fn fields(&self, receiver: Value, fields: &[String]) -> ExecResult<Value> {
        let mut current = receiver;
        for name in fields {
            current = match current {
                Value::Root => match self.mapping.get(name) {
                    Some(text) => Value::Str(text.clone()),
                    None => return unresolved(format!("no entry for key {name:?}")),
                },
                other => {
                    return unresolved(format!(
                        "can't evaluate field {name} in type {}",
                        other.type_name()
                    ))
                }
            };
        }
        Ok(current)
    }

    fn call(&self, name: &str, args: Vec<Value>) -> ExecResult<Value> {
        match self.functions.get(name) {
            Some(function) => function(&CallContext { loader: self.loader }, args),
            None => unresolved(format!("function {name:?} not defined")),
        }
    }
}
