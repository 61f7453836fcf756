//! Splits template text into literal text and `{{ ... }}` actions, and
//! tokenizes the inside of each action.

use super::ParseError;

/// Byte range of a fragment in the template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A lone `.`
    Dot,
    /// `.Name` or a chain `.A.B`
    Field(Vec<String>),
    /// `$` (empty name) or `$name`, with an optional field chain
    Variable(String, Vec<String>),
    Ident(String),
    Str(String),
    Int(i64),
    Pipe,
    LParen,
    RParen,
    Declare,
    Assign,
    Comma,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Action { tokens: Vec<Token>, span: Span },
}

/// Scans the template into segments. Trim markers are applied here, and
/// comments are dropped.
pub fn scan(source: &str) -> Result<Vec<Segment>, ParseError> {
    let mut segments = Vec::new();
    let mut pos = 0;
    let mut trim_next = false;

    while let Some(rel) = source[pos..].find("{{") {
        let open = pos + rel;
        let mut text = &source[pos..open];
        if trim_next {
            text = text.trim_start();
        }

        let mut inner_start = open + 2;
        if has_trim_marker_left(&source[inner_start..]) {
            text = text.trim_end();
            inner_start += 1;
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text.to_string()));
        }

        let close = find_close(source, inner_start)?;
        let span = Span { start: open, end: close.end };
        trim_next = close.trim_right;
        pos = close.end;

        let inner = &source[inner_start..close.inner_end];
        if inner.trim_start().starts_with("/*") {
            continue;
        }
        let tokens = tokenize(inner, inner_start)?;
        segments.push(Segment::Action { tokens, span });
    }

    let mut rest = &source[pos..];
    if trim_next {
        rest = rest.trim_start();
    }
    if !rest.is_empty() {
        segments.push(Segment::Text(rest.to_string()));
    }
    Ok(segments)
}

fn has_trim_marker_left(after_open: &str) -> bool {
    let mut chars = after_open.chars();
    chars.next() == Some('-') && chars.next().is_some_and(|c| c.is_ascii_whitespace())
}

struct Close {
    /// Where the action's inner text stops (before a trim marker)
    inner_end: usize,
    /// Just past the closing `}}`
    end: usize,
    trim_right: bool,
}

fn find_close(source: &str, inner_start: usize) -> Result<Close, ParseError> {
    let bytes = source.as_bytes();
    let body = &source[inner_start..];

    if body.trim_start().starts_with("/*") {
        let comment_start = inner_start + (body.len() - body.trim_start().len());
        let Some(rel) = source[comment_start + 2..].find("*/") else {
            return Err(ParseError::new("unclosed comment", comment_start));
        };
        let after = comment_start + 2 + rel + 2;
        return close_at(source, after).ok_or_else(|| {
            ParseError::new("comment ends before closing delimiter", after)
        });
    }

    let mut i = inner_start;
    let mut quote: Option<u8> = None;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(b'"') if b == b'\\' => i += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'`' => quote = Some(b),
            None if b == b'}' && bytes.get(i + 1) == Some(&b'}') => {
                let trim_right = i >= inner_start + 2
                    && bytes[i - 1] == b'-'
                    && bytes[i - 2].is_ascii_whitespace();
                return Ok(Close {
                    inner_end: if trim_right { i - 1 } else { i },
                    end: i + 2,
                    trim_right,
                });
            }
            None => {}
        }
        i += 1;
    }
    Err(ParseError::new("unclosed action", inner_start.saturating_sub(2)))
}

/// Closing delimiter right after a comment, allowing whitespace and a trim marker.
fn close_at(source: &str, after: usize) -> Option<Close> {
    let rest = &source[after..];
    let trimmed = rest.trim_start();
    let offset = after + (rest.len() - trimmed.len());
    if trimmed.starts_with("-}}") && offset > after {
        Some(Close { inner_end: offset, end: offset + 3, trim_right: true })
    } else if trimmed.starts_with("}}") {
        Some(Close { inner_end: offset, end: offset + 2, trim_right: false })
    } else {
        None
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Tokenizes the inside of one action. `base` is the byte offset of `inner`
/// in the template, for error positions.
pub fn tokenize(inner: &str, base: usize) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<(usize, char)> = inner.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let ident_at = |mut j: usize| -> (String, usize) {
        let mut name = String::new();
        while j < chars.len() && is_ident_char(chars[j].1) {
            name.push(chars[j].1);
            j += 1;
        }
        (name, j)
    };

    // `.A.B` chains directly following an operand
    let field_chain = |mut j: usize| -> (Vec<String>, usize) {
        let mut fields = Vec::new();
        while j + 1 < chars.len() && chars[j].1 == '.' && is_ident_start(chars[j + 1].1) {
            let (name, next) = ident_at(j + 1);
            fields.push(name);
            j = next;
        }
        (fields, j)
    };

    while i < chars.len() {
        let (offset, c) = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Assign);
                i += 1;
            }
            ':' if chars.get(i + 1).map(|p| p.1) == Some('=') => {
                tokens.push(Token::Declare);
                i += 2;
            }
            '.' => {
                let (fields, next) = field_chain(i);
                if fields.is_empty() {
                    tokens.push(Token::Dot);
                    i += 1;
                } else {
                    tokens.push(Token::Field(fields));
                    i = next;
                }
            }
            '$' => {
                let (name, next) = ident_at(i + 1);
                let (fields, next) = field_chain(next);
                tokens.push(Token::Variable(name, fields));
                i = next;
            }
            '"' => {
                let mut text = String::new();
                let mut j = i + 1;
                loop {
                    let Some(&(_, ch)) = chars.get(j) else {
                        return Err(ParseError::new("unterminated quoted string", base + offset));
                    };
                    match ch {
                        '"' => break,
                        '\\' => {
                            let Some(&(_, escaped)) = chars.get(j + 1) else {
                                return Err(ParseError::new(
                                    "unterminated quoted string",
                                    base + offset,
                                ));
                            };
                            text.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                'r' => '\r',
                                '0' => '\0',
                                other => other,
                            });
                            j += 2;
                        }
                        other => {
                            text.push(other);
                            j += 1;
                        }
                    }
                }
                tokens.push(Token::Str(text));
                i = j + 1;
            }
            '`' => {
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && chars[j].1 != '`' {
                    j += 1;
                }
                if j >= chars.len() {
                    return Err(ParseError::new("unterminated raw quoted string", base + offset));
                }
                tokens.push(Token::Str(chars[start..j].iter().map(|p| p.1).collect()));
                i = j + 1;
            }
            c if c.is_ascii_digit()
                || ((c == '-' || c == '+')
                    && chars.get(i + 1).is_some_and(|p| p.1.is_ascii_digit())) =>
            {
                let mut j = i + 1;
                while j < chars.len() && chars[j].1.is_ascii_digit() {
                    j += 1;
                }
                let end = chars.get(j).map_or(inner.len(), |p| p.0);
                let literal = &inner[offset..end];
                let number = literal.parse::<i64>().map_err(|_| {
                    ParseError::new(format!("bad number syntax: {literal}"), base + offset)
                })?;
                tokens.push(Token::Int(number));
                i = j;
            }
            c if is_ident_start(c) => {
                let (name, next) = ident_at(i);
                tokens.push(Token::Ident(name));
                i = next;
            }
            other => {
                return Err(ParseError::new(
                    format!("unexpected {other:?} in action"),
                    base + offset,
                ));
            }
        }
    }
    Ok(tokens)
}
