//! Declarative mapping records.
//! A mapping document is a YAML sequence of named value sources; this module
//! turns it into typed [`Record`]s and defines the resolved name→text table.

use crate::error::{Error, Result};
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Deserializer, Serialize};

/// Resolved name→text table, in first-definition order.
pub type Mapping = IndexMap<String, String>;

/// Where a record's text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// The value itself, after substitution
    Literal(String),
    /// The value names a file to read
    File(String),
    /// The value is an http(s) URI to fetch
    Uri(String),
}

impl Source {
    /// The raw text carried by the source (value, path or URI).
    pub fn text(&self) -> &str {
        match self {
            Source::Literal(s) | Source::File(s) | Source::Uri(s) => s,
        }
    }

    /// Same kind of source carrying different text.
    pub fn with_text(&self, text: String) -> Self {
        match self {
            Source::Literal(_) => Source::Literal(text),
            Source::File(_) => Source::File(text),
            Source::Uri(_) => Source::Uri(text),
        }
    }
}

/// One validated entry of the mapping document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub name: String,
    pub source: Source,
    /// The source text is the name of an environment variable whose value
    /// replaces it before any file, uri or base64 step
    pub env: bool,
    /// Encode the final text as base64
    pub base64: bool,
}

impl Record {
    pub fn new(name: impl Into<String>, source: Source) -> Self {
        Self { name: name.into(), source, env: false, base64: false }
    }

    pub fn with_env(mut self, env: bool) -> Self {
        self.env = env;
        self
    }

    pub fn with_base64(mut self, base64: bool) -> Self {
        self.base64 = base64;
        self
    }

    /// Kind flags kept for the preprocess serializer.
    pub fn kinds(&self) -> Kinds {
        Kinds {
            file: matches!(self.source, Source::File(_)),
            uri: matches!(self.source, Source::Uri(_)),
            base64: self.base64,
        }
    }
}

/// Resolution kinds recorded per name. `env` is deliberately absent:
/// environment values are literal once read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Kinds {
    pub file: bool,
    pub uri: bool,
    pub base64: bool,
}

/// Wire form of a record, shared by the reader and the preprocess writer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default, deserialize_with = "scalar_to_string")]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "scalar_to_string")]
    pub value: Option<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub base64: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub file: bool,

    #[serde(default, skip_serializing)]
    pub env: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub uri: bool,
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

/// Accepts any YAML scalar for text fields so `value: 8080` is not an error.
fn scalar_to_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s)),
        serde_json::Value::Number(n) => Ok(Some(n.to_string())),
        serde_json::Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(D::Error::custom(format!("expected a scalar, found {other}"))),
    }
}

impl TryFrom<RawRecord> for Record {
    type Error = Error;

    fn try_from(raw: RawRecord) -> Result<Self> {
        let name = match raw.name {
            Some(name) if !name.is_empty() => name,
            _ => return Err(Error::ConfigError("mapping entry without a name".to_string())),
        };

        if raw.file && raw.uri {
            return Err(Error::ConflictingSourceError { name });
        }

        let value = match (raw.value, raw.env) {
            (Some(value), _) => value,
            // An env entry without a value reads the variable named after the entry
            (None, true) => name.clone(),
            (None, false) => {
                return Err(Error::ConfigError(format!("mapping '{name}' has no value")))
            }
        };

        let source = if raw.file {
            Source::File(value)
        } else if raw.uri {
            Source::Uri(value)
        } else {
            Source::Literal(value)
        };

        Ok(Record { name, source, env: raw.env, base64: raw.base64 })
    }
}

impl From<(&str, &str, Kinds)> for RawRecord {
    fn from((name, value, kinds): (&str, &str, Kinds)) -> Self {
        RawRecord {
            name: Some(name.to_string()),
            value: Some(value.to_string()),
            base64: kinds.base64,
            file: kinds.file,
            env: false,
            uri: kinds.uri,
        }
    }
}

/// Parses a YAML mapping document into records, in document order.
///
/// # Errors
/// * `Error::TransformError` if the text is not YAML or not a sequence
/// * `Error::ConfigError` / `Error::ConflictingSourceError` for a bad entry
pub fn parse_records(content: &str) -> Result<Vec<Record>> {
    let document: serde_json::Value = serde_yaml::from_str(content)
        .map_err(|e| Error::TransformError(format!("invalid mapping document: {e}")))?;

    let entries = match document {
        serde_json::Value::Null => Vec::new(),
        serde_json::Value::Array(entries) => entries,
        _ => {
            return Err(Error::TransformError(
                "mapping document must be a sequence of entries".to_string(),
            ))
        }
    };

    debug!("Parsing {} mapping entries.", entries.len());

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            if !entry.is_object() {
                return Err(Error::ConfigError(format!(
                    "mapping entry #{index} is not a mapping"
                )));
            }
            let raw: RawRecord = serde_json::from_value(entry).map_err(|e| {
                Error::ConfigError(format!("mapping entry #{index}: {e}"))
            })?;
            Record::try_from(raw)
        })
        .collect()
}
