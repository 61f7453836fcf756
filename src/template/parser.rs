//! Builds the node tree of a template from scanned segments.

use super::lexer::{scan, Segment, Span, Token};
use super::ParseError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Dot,
    Field(Vec<String>),
    /// `$` has an empty name
    Variable(String, Vec<String>),
    Func(String),
    Str(String),
    Int(i64),
    Bool(bool),
    Sub(Box<Pipeline>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub args: Vec<Operand>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    /// Variables declared (`:=`) or assigned (`=`) by the pipeline
    pub decl: Vec<String>,
    pub assign: bool,
    pub cmds: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Action {
        pipe: Pipeline,
        span: Span,
    },
    If {
        branches: Vec<(Pipeline, Vec<Node>)>,
        otherwise: Vec<Node>,
        span: Span,
    },
    Range {
        pipe: Pipeline,
        body: Vec<Node>,
        otherwise: Vec<Node>,
        span: Span,
    },
    With {
        pipe: Pipeline,
        body: Vec<Node>,
        otherwise: Vec<Node>,
        span: Span,
    },
}

impl Node {
    /// Source range of an action or block; `None` for text.
    pub fn span(&self) -> Option<Span> {
        match self {
            Node::Text(_) => None,
            Node::Action { span, .. }
            | Node::If { span, .. }
            | Node::Range { span, .. }
            | Node::With { span, .. } => Some(*span),
        }
    }
}

/// How a list of nodes ended.
enum Terminator {
    Eof,
    End(Span),
    Else(Option<Pipeline>, Span),
}

/// Parses template source into nodes.
pub fn parse(source: &str) -> Result<Vec<Node>, ParseError> {
    let segments = scan(source)?;
    let mut parser = Parser { segments: segments.into_iter(), offset: 0 };
    match parser.parse_list()? {
        (nodes, Terminator::Eof) => Ok(nodes),
        (_, Terminator::End(span)) => Err(ParseError::new("unexpected {{end}}", span.start)),
        (_, Terminator::Else(_, span)) => Err(ParseError::new("unexpected {{else}}", span.start)),
    }
}

struct Parser {
    segments: std::vec::IntoIter<Segment>,
    /// Start of the last action seen, for error positions
    offset: usize,
}

impl Parser {
    fn parse_list(&mut self) -> Result<(Vec<Node>, Terminator), ParseError> {
        let mut nodes = Vec::new();
        while let Some(segment) = self.segments.next() {
            let (tokens, span) = match segment {
                Segment::Text(text) => {
                    nodes.push(Node::Text(text));
                    continue;
                }
                Segment::Action { tokens, span } => (tokens, span),
            };
            self.offset = span.start;

            let keyword = match tokens.first() {
                Some(Token::Ident(word)) => word.as_str(),
                _ => "",
            };
            match keyword {
                "end" => {
                    if tokens.len() > 1 {
                        return Err(self.error("unexpected tokens after end"));
                    }
                    return Ok((nodes, Terminator::End(span)));
                }
                "else" => {
                    let chained = match tokens.get(1) {
                        None => None,
                        Some(Token::Ident(word)) if word == "if" => {
                            Some(self.pipeline(&tokens[2..], true)?)
                        }
                        Some(_) => return Err(self.error("unexpected tokens after else")),
                    };
                    return Ok((nodes, Terminator::Else(chained, span)));
                }
                "if" => {
                    let cond = self.pipeline(&tokens[1..], true)?;
                    nodes.push(self.parse_if(cond, span)?);
                }
                "range" => {
                    let pipe = self.range_pipeline(&tokens[1..])?;
                    let (body, otherwise, span) = self.parse_block(span, "range")?;
                    nodes.push(Node::Range { pipe, body, otherwise, span });
                }
                "with" => {
                    let pipe = self.pipeline(&tokens[1..], true)?;
                    let (body, otherwise, span) = self.parse_block(span, "with")?;
                    nodes.push(Node::With { pipe, body, otherwise, span });
                }
                "define" | "template" | "block" | "break" | "continue" => {
                    return Err(self.error(format!("unsupported action {keyword:?}")));
                }
                _ => {
                    let pipe = self.pipeline(&tokens, true)?;
                    nodes.push(Node::Action { pipe, span });
                }
            }
        }
        Ok((nodes, Terminator::Eof))
    }

    fn parse_if(&mut self, cond: Pipeline, open: Span) -> Result<Node, ParseError> {
        let mut branches = Vec::new();
        let mut cond = cond;
        loop {
            let (body, terminator) = self.parse_list()?;
            branches.push((cond, body));
            match terminator {
                Terminator::End(end) => {
                    let span = Span { start: open.start, end: end.end };
                    return Ok(Node::If { branches, otherwise: Vec::new(), span });
                }
                Terminator::Else(Some(next), _) => cond = next,
                Terminator::Else(None, _) => {
                    let (otherwise, end) = self.expect_end("if")?;
                    let span = Span { start: open.start, end: end.end };
                    return Ok(Node::If { branches, otherwise, span });
                }
                Terminator::Eof => return Err(self.error("unexpected EOF in if")),
            }
        }
    }

    /// Body and optional else branch of `range` / `with`.
    fn parse_block(
        &mut self,
        open: Span,
        what: &str,
    ) -> Result<(Vec<Node>, Vec<Node>, Span), ParseError> {
        let (body, terminator) = self.parse_list()?;
        let (otherwise, end) = match terminator {
            Terminator::End(end) => (Vec::new(), end),
            Terminator::Else(None, _) => self.expect_end(what)?,
            Terminator::Else(Some(_), _) => {
                return Err(self.error(format!("else if is not allowed in {what}")))
            }
            Terminator::Eof => return Err(self.error(format!("unexpected EOF in {what}"))),
        };
        Ok((body, otherwise, Span { start: open.start, end: end.end }))
    }

    fn expect_end(&mut self, what: &str) -> Result<(Vec<Node>, Span), ParseError> {
        match self.parse_list()? {
            (nodes, Terminator::End(end)) => Ok((nodes, end)),
            _ => Err(self.error(format!("expected end of {what}"))),
        }
    }

    fn range_pipeline(&self, tokens: &[Token]) -> Result<Pipeline, ParseError> {
        if let [Token::Variable(first, f1), Token::Comma, Token::Variable(second, f2), Token::Declare, rest @ ..] =
            tokens
        {
            if !f1.is_empty() || !f2.is_empty() || first.is_empty() || second.is_empty() {
                return Err(self.error("bad range variable declaration"));
            }
            let mut pipe = self.pipeline(rest, false)?;
            pipe.decl = vec![first.clone(), second.clone()];
            return Ok(pipe);
        }
        self.pipeline(tokens, true)
    }

    fn pipeline(&self, tokens: &[Token], allow_decl: bool) -> Result<Pipeline, ParseError> {
        let mut cursor = Cursor { tokens, pos: 0 };
        let mut decl = Vec::new();
        let mut assign = false;

        if let [Token::Variable(name, fields), op @ (Token::Declare | Token::Assign), ..] = tokens {
            if !allow_decl || name.is_empty() || !fields.is_empty() {
                return Err(self.error("bad variable declaration"));
            }
            decl.push(name.clone());
            assign = *op == Token::Assign;
            cursor.pos = 2;
        }

        let pipe = self.commands(&mut cursor, decl, assign)?;
        if let Some(token) = cursor.peek() {
            return Err(self.error(format!("unexpected {token:?} in operand")));
        }
        Ok(pipe)
    }

    fn commands(
        &self,
        cursor: &mut Cursor<'_>,
        decl: Vec<String>,
        assign: bool,
    ) -> Result<Pipeline, ParseError> {
        let mut cmds = Vec::new();
        loop {
            let mut args = Vec::new();
            while let Some(token) = cursor.peek() {
                if matches!(token, Token::Pipe | Token::RParen) {
                    break;
                }
                args.push(self.operand(cursor)?);
            }
            if args.is_empty() {
                return Err(self.error("missing value for command"));
            }
            cmds.push(Command { args });
            if cursor.peek() == Some(&Token::Pipe) {
                cursor.pos += 1;
            } else {
                break;
            }
        }
        Ok(Pipeline { decl, assign, cmds })
    }

    fn operand(&self, cursor: &mut Cursor<'_>) -> Result<Operand, ParseError> {
        let Some(token) = cursor.next() else {
            return Err(self.error("missing operand"));
        };
        Ok(match token {
            Token::Dot => Operand::Dot,
            Token::Field(fields) => Operand::Field(fields.clone()),
            Token::Variable(name, fields) => Operand::Variable(name.clone(), fields.clone()),
            Token::Str(s) => Operand::Str(s.clone()),
            Token::Int(n) => Operand::Int(*n),
            Token::Ident(word) => match word.as_str() {
                "true" => Operand::Bool(true),
                "false" => Operand::Bool(false),
                "nil" => return Err(self.error("nil is not a command")),
                _ => Operand::Func(word.clone()),
            },
            Token::LParen => {
                let inner = self.commands(cursor, Vec::new(), false)?;
                if cursor.next() != Some(&Token::RParen) {
                    return Err(self.error("unclosed left paren"));
                }
                Operand::Sub(Box::new(inner))
            }
            other => return Err(self.error(format!("unexpected {other:?} in operand"))),
        })
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.offset)
    }
}

struct Cursor<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Cursor<'t> {
    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str) -> Operand {
        Operand::Field(vec![name.to_string()])
    }

    #[test]
    fn test_parse_pipeline_with_functions() {
        let nodes = parse(r#"{{ split "a b" | in "a" }}"#).unwrap();
        let Node::Action { pipe, .. } = &nodes[0] else {
            panic!("expected action");
        };
        assert_eq!(pipe.cmds.len(), 2);
        assert_eq!(pipe.cmds[0].args[0], Operand::Func("split".to_string()));
        assert_eq!(pipe.cmds[1].args[1], Operand::Str("a".to_string()));
    }

    #[test]
    fn test_parse_if_else_chain() {
        let nodes = parse("{{if .A}}a{{else if .B}}b{{else}}c{{end}}!").unwrap();
        assert_eq!(nodes.len(), 2);
        let Node::If { branches, otherwise, span } = &nodes[0] else {
            panic!("expected if");
        };
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[1].0.cmds[0].args[0], field("B"));
        assert_eq!(otherwise, &vec![Node::Text("c".to_string())]);
        assert_eq!(span.start, 0);
        assert_eq!(span.end, 41);
    }

    #[test]
    fn test_parse_range_with_two_variables() {
        let nodes = parse("{{range $i, $v := .L}}{{$v}}{{end}}").unwrap();
        let Node::Range { pipe, body, .. } = &nodes[0] else {
            panic!("expected range");
        };
        assert_eq!(pipe.decl, vec!["i".to_string(), "v".to_string()]);
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn test_parse_parenthesised_and_declaration() {
        let nodes = parse(r#"{{ $x := (nth "1" .L) }}"#).unwrap();
        let Node::Action { pipe, .. } = &nodes[0] else {
            panic!("expected action");
        };
        assert_eq!(pipe.decl, vec!["x".to_string()]);
        assert!(!pipe.assign);
        assert!(matches!(pipe.cmds[0].args[0], Operand::Sub(_)));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("{{end}}").is_err());
        assert!(parse("{{if .A}}x").is_err());
        assert!(parse("{{ ( .A }}").is_err());
        assert!(parse("{{ }}").is_err());
        assert!(parse("{{ .A ) }}").is_err());
        assert!(parse(r#"{{template "x"}}"#).is_err());
    }
}
