//! Function library available inside placeholders.
//!
//! Most functions treat text as a space-delimited list: `split "a b c"`,
//! `zip .Hosts .Ports ":"`, `generate 3 true`. Functions reaching outside
//! the process (`env`, `file`, `get`, `curl`) go through the [`Loader`].

use std::cmp::Ordering;
use std::collections::HashMap;

use base64::Engine;
use log::error;

use crate::constants::{DEFAULT_DELIMITER, DEFAULT_ZIP_SEPARATOR};
use crate::error::Error;
use crate::loader::{expand_home, Loader};
use crate::template::value::{split_tokens, trim_spaces, unresolved, ExecError, ExecResult, Value};

/// What a function may reach besides its arguments.
pub struct CallContext<'a> {
    pub loader: &'a dyn Loader,
}

pub type Function = fn(&CallContext<'_>, Vec<Value>) -> ExecResult<Value>;

/// Registry of named functions.
#[derive(Clone)]
pub struct Functions {
    table: HashMap<&'static str, Function>,
}

impl Functions {
    /// The full library plus the notation's builtins.
    pub fn standard() -> Self {
        let entries: [(&'static str, Function); 38] = [
            ("trim", trim),
            ("split", split),
            ("first", first),
            ("nth", nth),
            ("index", index),
            ("delimit", delimit),
            ("zip", zip),
            ("zipPrefix", zip_prefix),
            ("zipprefix", zip_prefix),
            ("zipSuffix", zip_suffix),
            ("zipsuffix", zip_suffix),
            ("cat", cat),
            ("generate", generate),
            ("atoi", atoi),
            ("capitalize", capitalize),
            ("upper", upper),
            ("lower", lower),
            ("in", contains),
            ("base64Encode", base64_encode),
            ("base64Decode", base64_decode),
            ("env", env),
            ("file", file),
            ("get", get),
            ("curl", curl),
            ("tostring", tostring),
            ("and", and),
            ("or", or),
            ("not", not),
            ("eq", eq),
            ("ne", ne),
            ("lt", lt),
            ("le", le),
            ("gt", gt),
            ("ge", ge),
            ("len", len),
            ("print", print),
            ("printf", printf),
            ("println", println),
        ];
        Self { table: entries.into_iter().collect() }
    }

    pub fn get(&self, name: &str) -> Option<Function> {
        self.table.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }
}

impl Default for Functions {
    fn default() -> Self {
        Self::standard()
    }
}

fn arity(name: &str, args: &[Value], expected: usize) -> ExecResult<()> {
    if args.len() == expected {
        Ok(())
    } else {
        unresolved(format!(
            "wrong number of args for {name}: want {expected} got {}",
            args.len()
        ))
    }
}

fn text_arg(args: &[Value], i: usize) -> String {
    args[i].to_text()
}

fn int_arg(name: &str, args: &[Value], i: usize) -> ExecResult<i64> {
    match &args[i] {
        Value::Int(n) => Ok(*n),
        Value::Bool(_) | Value::List(_) | Value::Root => {
            unresolved(format!("{name}: expected integer, got {}", args[i].type_name()))
        }
        other => match trim_spaces(&other.to_text()).parse::<i64>() {
            Ok(n) => Ok(n),
            Err(_) => unresolved(format!("{name}: expected integer, got {:?}", other.to_text())),
        },
    }
}

fn bool_arg(name: &str, args: &[Value], i: usize) -> ExecResult<bool> {
    match &args[i] {
        Value::Bool(b) => Ok(*b),
        other => match other.to_text().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => unresolved(format!("{name}: expected boolean, got {}", other.type_name())),
        },
    }
}

fn separator_or(sep: String, default: &str) -> String {
    if sep.is_empty() {
        default.to_string()
    } else {
        sep
    }
}

fn trim(_: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    arity("trim", &args, 1)?;
    Ok(Value::Str(trim_spaces(&text_arg(&args, 0)).to_string()))
}

fn split(_: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    arity("split", &args, 1)?;
    Ok(Value::List(split_tokens(&text_arg(&args, 0))))
}

fn first(_: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    arity("first", &args, 1)?;
    let tokens = args[0].to_list();
    Ok(Value::Str(tokens.into_iter().next().unwrap_or_default()))
}

fn nth(_: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    arity("nth", &args, 2)?;
    let n = int_arg("nth", &args, 0).unwrap_or(0);
    let tokens = args[1].to_list();
    let item = usize::try_from(n).ok().and_then(|n| tokens.into_iter().nth(n));
    Ok(Value::Str(item.unwrap_or_default()))
}

fn index(_: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    arity("index", &args, 2)?;
    let needle = text_arg(&args, 0);
    let position = args[1].to_list().iter().position(|token| *token == needle);
    Ok(Value::Str(position.map(|i| i.to_string()).unwrap_or_default()))
}

fn delimit(_: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    if args.is_empty() || args.len() > 2 {
        return unresolved(format!("wrong number of args for delimit: want 2 got {}", args.len()));
    }
    let sep = separator_or(args.get(1).map(Value::to_text).unwrap_or_default(), DEFAULT_DELIMITER);
    Ok(Value::Str(args[0].to_list().join(&sep)))
}

fn zip(_: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    arity("zip", &args, 3)?;
    let left = args[0].to_list();
    let right = args[1].to_list();
    let sep = separator_or(text_arg(&args, 2), DEFAULT_ZIP_SEPARATOR);
    let pairs = right
        .iter()
        .flat_map(|r| left.iter().map(move |l| (r, l)))
        .map(|(r, l)| format!("{r}{sep}{l}"))
        .collect::<Vec<_>>();
    Ok(Value::Str(pairs.join(" ")))
}

fn zip_prefix(_: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    arity("zipPrefix", &args, 3)?;
    let prefix = text_arg(&args, 1);
    let sep = separator_or(text_arg(&args, 2), DEFAULT_ZIP_SEPARATOR);
    Ok(Value::List(
        args[0].to_list().iter().map(|token| format!("{prefix}{sep}{token}")).collect(),
    ))
}

fn zip_suffix(_: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    arity("zipSuffix", &args, 3)?;
    let suffix = text_arg(&args, 1);
    let sep = separator_or(text_arg(&args, 2), DEFAULT_ZIP_SEPARATOR);
    Ok(Value::List(
        args[0].to_list().iter().map(|token| format!("{token}{sep}{suffix}")).collect(),
    ))
}

fn cat(_: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    Ok(Value::Str(args.iter().map(Value::to_text).collect()))
}

/// Decimal digits needed to print `n`.
fn digit_count(n: i64) -> usize {
    n.unsigned_abs().checked_ilog10().map_or(1, |log| log as usize + 1)
}

fn generate(_: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    arity("generate", &args, 2)?;
    let n = int_arg("generate", &args, 0)?;
    let zerofill = bool_arg("generate", &args, 1)?;
    let width = digit_count(n);
    let items = (0..n.max(0))
        .map(|i| if zerofill { format!("{i:0width$}") } else { i.to_string() })
        .collect();
    Ok(Value::List(items))
}

fn atoi(_: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    arity("atoi", &args, 1)?;
    let text = text_arg(&args, 0);
    Ok(Value::Int(text.parse::<i64>().unwrap_or_else(|e| {
        error!("atoi: can't parse {text:?}: {e}");
        0
    })))
}

fn capitalize(_: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    arity("capitalize", &args, 1)?;
    let text = text_arg(&args, 0);
    let trimmed = trim_spaces(&text);
    let mut chars = trimmed.chars();
    let capitalized = match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    Ok(Value::Str(capitalized))
}

fn upper(_: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    arity("upper", &args, 1)?;
    Ok(Value::Str(trim_spaces(&text_arg(&args, 0)).to_uppercase()))
}

fn lower(_: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    arity("lower", &args, 1)?;
    Ok(Value::Str(trim_spaces(&text_arg(&args, 0)).to_lowercase()))
}

fn contains(_: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    arity("in", &args, 2)?;
    let needle = text_arg(&args, 0);
    let found = args[1].to_list().contains(&needle);
    Ok(Value::Str(if found { needle } else { String::new() }))
}

fn base64_encode(_: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    arity("base64Encode", &args, 1)?;
    let encoded = match &args[0] {
        Value::Bytes(bytes) => base64::engine::general_purpose::STANDARD.encode(bytes),
        other => base64::engine::general_purpose::STANDARD.encode(other.to_text()),
    };
    Ok(Value::Str(encoded))
}

fn base64_decode(_: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    arity("base64Decode", &args, 1)?;
    let text = text_arg(&args, 0);
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(text.as_bytes())
        .map_err(|e| ExecError::Fatal(Error::DecodeError(format!("{text:?}: {e}"))))?;
    Ok(Value::Str(String::from_utf8_lossy(&decoded).into_owned()))
}

fn env(ctx: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    arity("env", &args, 1)?;
    Ok(Value::Str(ctx.loader.read_env(&text_arg(&args, 0)).unwrap_or_default()))
}

fn file(ctx: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    arity("file", &args, 1)?;
    let name = text_arg(&args, 0);
    if name.is_empty() {
        return unresolved("file: empty file name");
    }
    let path = expand_home(&name, ctx.loader.home_dir().as_deref());
    Ok(Value::Bytes(ctx.loader.read_file(&path)?))
}

fn get(ctx: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    arity("get", &args, 1)?;
    match ctx.loader.fetch(&text_arg(&args, 0)) {
        Ok(body) => Ok(Value::Bytes(body)),
        Err(err) => unresolved(format!("get: {err}")),
    }
}

fn curl(ctx: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    arity("curl", &args, 1)?;
    let body = ctx.loader.fetch(&text_arg(&args, 0))?;
    Ok(Value::Str(String::from_utf8_lossy(&body).into_owned()))
}

fn tostring(_: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    arity("tostring", &args, 1)?;
    Ok(Value::Str(text_arg(&args, 0)))
}

fn and(_: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    let mut last = None;
    for arg in args {
        if !arg.is_truthy() {
            return Ok(arg);
        }
        last = Some(arg);
    }
    last.map_or_else(|| unresolved("and: missing arguments"), Ok)
}

fn or(_: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    let mut last = None;
    for arg in args {
        if arg.is_truthy() {
            return Ok(arg);
        }
        last = Some(arg);
    }
    last.map_or_else(|| unresolved("or: missing arguments"), Ok)
}

fn not(_: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    arity("not", &args, 1)?;
    Ok(Value::Bool(!args[0].is_truthy()))
}

fn same(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        _ => a.to_text() == b.to_text(),
    }
}

fn eq(_: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    match args.split_first() {
        Some((first, rest)) if !rest.is_empty() => {
            Ok(Value::Bool(rest.iter().any(|other| same(first, other))))
        }
        _ => unresolved("eq: missing arguments for comparison"),
    }
}

fn ne(_: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    arity("ne", &args, 2)?;
    Ok(Value::Bool(!same(&args[0], &args[1])))
}

/// Integers compare numerically, anything else as text.
fn compare(name: &str, args: &[Value]) -> ExecResult<Ordering> {
    arity(name, args, 2)?;
    let as_int = |v: &Value| match v {
        Value::Int(n) => Some(*n),
        Value::Str(_) | Value::Bytes(_) => v.to_text().parse::<i64>().ok(),
        _ => None,
    };
    let comparable = |v: &Value| matches!(v, Value::Str(_) | Value::Int(_) | Value::Bytes(_));
    if !comparable(&args[0]) || !comparable(&args[1]) {
        return unresolved(format!(
            "{name}: invalid type for comparison: {} and {}",
            args[0].type_name(),
            args[1].type_name()
        ));
    }
    match (as_int(&args[0]), as_int(&args[1])) {
        (Some(x), Some(y)) => Ok(x.cmp(&y)),
        _ => Ok(args[0].to_text().cmp(&args[1].to_text())),
    }
}

fn lt(_: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    Ok(Value::Bool(compare("lt", &args)?.is_lt()))
}

fn le(_: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    Ok(Value::Bool(compare("le", &args)?.is_le()))
}

fn gt(_: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    Ok(Value::Bool(compare("gt", &args)?.is_gt()))
}

fn ge(_: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    Ok(Value::Bool(compare("ge", &args)?.is_ge()))
}

fn len(_: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    arity("len", &args, 1)?;
    let n = match &args[0] {
        Value::List(items) => items.len(),
        Value::Str(s) => s.len(),
        Value::Bytes(bytes) => bytes.len(),
        other => return unresolved(format!("len of type {}", other.type_name())),
    };
    Ok(Value::Int(n as i64))
}

/// Operands are joined with a space only when neither neighbour is text.
fn print(_: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    let is_text = |v: &Value| matches!(v, Value::Str(_) | Value::Bytes(_));
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 && !is_text(arg) && !is_text(&args[i - 1]) {
            out.push(' ');
        }
        out.push_str(&arg.to_text());
    }
    Ok(Value::Str(out))
}

fn println(_: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    let mut out = args.iter().map(Value::to_text).collect::<Vec<_>>().join(" ");
    out.push('\n');
    Ok(Value::Str(out))
}

/// Formats with the `%s`, `%d`, `%v`, `%q` and `%%` verbs.
fn printf(_: &CallContext<'_>, args: Vec<Value>) -> ExecResult<Value> {
    let Some((format, operands)) = args.split_first() else {
        return unresolved("wrong number of args for printf: want at least 1 got 0");
    };
    let format = format.to_text();
    let mut operands = operands.iter();
    let mut out = String::new();
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let verb = chars.next();
        if verb == Some('%') {
            out.push('%');
            continue;
        }
        let Some(operand) = operands.next() else {
            return unresolved(format!("printf: missing operand for %{}", verb.unwrap_or(' ')));
        };
        match verb {
            Some('s' | 'v') => out.push_str(&operand.to_text()),
            Some('q') => out.push_str(&format!("{:?}", operand.to_text())),
            Some('d') => {
                let n = int_arg("printf", std::slice::from_ref(operand), 0)?;
                out.push_str(&n.to_string());
            }
            Some(other) => return unresolved(format!("printf: unsupported verb %{other}")),
            None => return unresolved("printf: format ends with %"),
        }
    }
    if operands.next().is_some() {
        return unresolved(format!("printf: extra operands for {format:?}"));
    }
    Ok(Value::Str(out))
}
