#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use k8s_template::error::{Error, Result};
use k8s_template::loader::Loader;

/// Loader serving files, variables and URIs from memory.
#[derive(Debug, Default)]
pub struct MemoryLoader {
    pub files: HashMap<PathBuf, Vec<u8>>,
    pub env: HashMap<String, String>,
    pub uris: HashMap<String, Vec<u8>>,
    pub stdin: String,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.files.insert(PathBuf::from(path), content.as_bytes().to_vec());
        self
    }

    pub fn with_env(mut self, name: &str, value: &str) -> Self {
        self.env.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_uri(mut self, uri: &str, body: &str) -> Self {
        self.uris.insert(uri.to_string(), body.as_bytes().to_vec());
        self
    }

    pub fn with_stdin(mut self, text: &str) -> Self {
        self.stdin = text.to_string();
        self
    }
}

impl Loader for MemoryLoader {
    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        self.files.get(path).cloned().ok_or_else(|| Error::FileReadError {
            path: path.display().to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        })
    }

    fn read_env(&self, name: &str) -> Option<String> {
        self.env.get(name).cloned()
    }

    fn fetch(&self, uri: &str) -> Result<Vec<u8>> {
        self.uris.get(uri).cloned().ok_or_else(|| Error::FetchError {
            uri: uri.to_string(),
            reason: "HTTP 404 Not Found".to_string(),
        })
    }

    fn read_stdin(&self) -> Result<String> {
        Ok(self.stdin.clone())
    }
}
