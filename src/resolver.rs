//! Resolution of mapping records into the name→text table.
//!
//! Records are resolved in document order, each against the names resolved
//! before it. The table is then closed: every entry still carrying
//! placeholders is substituted against the whole table until a full pass
//! changes nothing. File, uri and base64 work whose input still has
//! placeholders waits until closure has made that input concrete.

use base64::Engine;
use indexmap::IndexMap;
use log::{debug, warn};

use crate::config::Mode;
use crate::error::{Error, Result};
use crate::loader::{expand_home, validate_uri};
use crate::mapping::{Kinds, Mapping, Record, Source};
use crate::renderer::{is_template_bearing, substitute, TemplateRenderer};

/// Per-entry metadata dumped alongside substitution diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMeta {
    pub name: String,
    pub len: usize,
    pub base64: bool,
    pub file: bool,
    pub env: bool,
    pub uri: bool,
}

impl std::fmt::Display for EntryMeta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "name: {} len(value): {} base64: {} file: {} env: {} uri: {}",
            self.name, self.len, self.base64, self.file, self.env, self.uri
        )
    }
}

/// Closed mapping plus what the preprocess serializer needs to rebuild records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub mapping: Mapping,
    pub kinds: IndexMap<String, Kinds>,
    pub entries: Vec<EntryMeta>,
}

/// Outcome of resolving one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// Final text
    Ready(String),
    /// Load or encoding waits for placeholders in this record's input to close
    Deferred(Record),
}

/// Resolves records and closes the resulting mapping.
pub struct MappingResolver<'a> {
    renderer: &'a dyn TemplateRenderer,
    mode: Mode,
    max_passes: usize,
}

impl<'a> MappingResolver<'a> {
    pub fn new(renderer: &'a dyn TemplateRenderer, mode: Mode, max_passes: usize) -> Self {
        Self { renderer, mode, max_passes }
    }

    /// Resolves `records` in order, then closes the mapping.
    ///
    /// # Errors
    /// * I/O and fetch failures of file/uri entries
    /// * `Error::ConfigError` for an unsupported uri
    /// * `Error::CycleError` if closure does not settle within the pass limit
    pub fn resolve(&self, records: Vec<Record>) -> Result<Resolution> {
        let mut resolution = Resolution::default();
        let mut deferred: IndexMap<String, Record> = IndexMap::new();

        for record in records {
            deferred.shift_remove(&record.name);
            let resolved = self.resolve_entry(&record, &resolution.mapping)?;
            let len = match resolved {
                Resolved::Ready(text) => {
                    let len = text.len();
                    resolution.mapping.insert(record.name.clone(), text);
                    len
                }
                Resolved::Deferred(pending) => {
                    debug!("Deferring '{}' until its input is resolved.", record.name);
                    resolution.mapping.shift_remove(&record.name);
                    let len = pending.source.text().len();
                    deferred.insert(record.name.clone(), pending);
                    len
                }
            };
            resolution.entries.push(EntryMeta {
                name: record.name.clone(),
                len,
                base64: record.base64,
                file: matches!(record.source, Source::File(_)),
                env: record.env,
                uri: matches!(record.source, Source::Uri(_)),
            });
            resolution.kinds.insert(record.name.clone(), record.kinds());
        }

        loop {
            self.close(&mut resolution.mapping)?;
            if deferred.is_empty() || !self.complete_deferred(&mut deferred, &mut resolution)? {
                break;
            }
        }

        if !deferred.is_empty() {
            for (name, pending) in deferred {
                warn!("Mapping '{name}' still has placeholders in {:?}; using it as is.", pending.source.text());
                resolution.mapping.insert(name, pending.source.text().to_string());
            }
            self.close(&mut resolution.mapping)?;
        }

        for (name, text) in &resolution.mapping {
            if is_template_bearing(text) {
                warn!("Mapping '{name}' still contains unresolved placeholders.");
            }
        }

        Ok(resolution)
    }

    /// Resolves a single record against the names resolved so far.
    ///
    /// Order: env lookup, otherwise substitution of the value; then file or uri
    /// loading of the result; then base64. In preprocess mode nothing is
    /// loaded or encoded.
    pub fn resolve_entry(&self, record: &Record, mapping: &Mapping) -> Result<Resolved> {
        let text = if record.env {
            self.renderer.loader().read_env(record.source.text()).unwrap_or_default()
        } else {
            substitute(self.renderer, record.source.text(), mapping, self.max_passes)?.text
        };

        if self.mode == Mode::Preprocess {
            return Ok(Resolved::Ready(text));
        }

        let needs_work = record.base64 || matches!(record.source, Source::File(_) | Source::Uri(_));
        if needs_work && is_template_bearing(&text) {
            let pending = Record {
                name: record.name.clone(),
                source: record.source.with_text(text),
                env: false,
                base64: record.base64,
            };
            return Ok(Resolved::Deferred(pending));
        }

        let source = record.source.with_text(text);
        Ok(Resolved::Ready(self.materialize(&record.name, &source, record.base64)?))
    }

    /// Loads and encodes a record whose input has no placeholders left.
    fn materialize(&self, name: &str, source: &Source, base64: bool) -> Result<String> {
        let loader = self.renderer.loader();
        let bytes = match source {
            Source::Literal(text) => text.as_bytes().to_vec(),
            Source::File(path) => {
                let path = expand_home(path, loader.home_dir().as_deref());
                loader.read_file(&path)?
            }
            Source::Uri(uri) => {
                validate_uri(name, uri)?;
                loader.fetch(uri)?
            }
        };

        Ok(if base64 {
            base64::engine::general_purpose::STANDARD.encode(&bytes)
        } else {
            match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
            }
        })
    }

    /// Re-substitutes deferred inputs and completes those now free of
    /// placeholders. Returns whether any entry was completed.
    fn complete_deferred(
        &self,
        deferred: &mut IndexMap<String, Record>,
        resolution: &mut Resolution,
    ) -> Result<bool> {
        let mut completed = Vec::new();
        for (name, pending) in deferred.iter_mut() {
            let input =
                substitute(self.renderer, pending.source.text(), &resolution.mapping, self.max_passes)?
                    .text;
            if is_template_bearing(&input) {
                pending.source = pending.source.with_text(input);
                continue;
            }
            let source = pending.source.with_text(input);
            let text = self.materialize(name, &source, pending.base64)?;
            debug!("Resolved deferred mapping '{name}'.");
            if let Some(meta) = resolution.entries.iter_mut().rev().find(|m| &m.name == name) {
                meta.len = text.len();
            }
            resolution.mapping.insert(name.clone(), text);
            completed.push(name.clone());
        }
        for name in &completed {
            deferred.shift_remove(name);
        }
        Ok(!completed.is_empty())
    }

    /// Substitutes every placeholder-bearing entry against the whole mapping
    /// until one full pass changes nothing.
    ///
    /// An entry whose substitution returns identical text is left as it is
    /// for that pass, so references to undefined names do not spin.
    ///
    /// # Errors
    /// * `Error::CycleError` naming the entries still changing after `max_passes`
    pub fn close(&self, mapping: &mut Mapping) -> Result<()> {
        for pass in 0..=self.max_passes {
            let mut changed = Vec::new();
            for i in 0..mapping.len() {
                let mut current = mapping[i].clone();
                let mut rounds = 0;
                while is_template_bearing(&current) {
                    let next = self.renderer.render(&current, mapping)?.text;
                    if next == current {
                        break;
                    }
                    rounds += 1;
                    if rounds > self.max_passes {
                        let name = mapping.get_index(i).map(|(k, _)| k.clone()).unwrap_or_default();
                        return Err(Error::CycleError {
                            context: format!("mapping '{name}'"),
                            passes: self.max_passes,
                        });
                    }
                    mapping[i] = next.clone();
                    current = next;
                }
                if rounds > 0 {
                    if let Some((name, _)) = mapping.get_index(i) {
                        changed.push(name.clone());
                    }
                }
            }

            if changed.is_empty() {
                debug!("Mapping closed after {pass} passes.");
                return Ok(());
            }
            if pass == self.max_passes {
                return Err(Error::CycleError {
                    context: format!("mappings {}", changed.join(", ")),
                    passes: self.max_passes,
                });
            }
        }
        Ok(())
    }
}
