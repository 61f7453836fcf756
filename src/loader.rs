//! Primitive I/O capabilities used during resolution.
//! File reads, environment lookups, network fetches and stdin are reached
//! through the [`Loader`] trait so resolution can run against an in-memory source.
use crate::error::{Error, Result};
use log::debug;
use std::io::Read;
use std::path::{Path, PathBuf};
use url::Url;

/// Trait for reading the raw material of mapping entries.
pub trait Loader {
    /// Reads the whole file at `path`.
    fn read_file(&self, path: &Path) -> Result<Vec<u8>>;

    /// Looks up an environment variable. Absent and non-unicode variables are `None`.
    fn read_env(&self, name: &str) -> Option<String>;

    /// Fetches the body of `uri`.
    ///
    /// # Errors
    /// * `Error::FetchError` on transport failure or a status outside 200..=399
    fn fetch(&self, uri: &str) -> Result<Vec<u8>>;

    /// Reads standard input to the end.
    fn read_stdin(&self) -> Result<String>;

    /// Home directory used to expand a leading `~/`.
    fn home_dir(&self) -> Option<PathBuf> {
        self.read_env("HOME").map(PathBuf::from)
    }
}

/// Loader backed by the real filesystem, process environment and network.
#[derive(Debug, Default)]
pub struct SystemLoader;

impl SystemLoader {
    /// Creates a new SystemLoader instance.
    pub fn new() -> Self {
        Self
    }
}

impl Loader for SystemLoader {
    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        debug!("Reading file '{}'.", path.display());
        std::fs::read(path).map_err(|source| Error::FileReadError {
            path: path.display().to_string(),
            source,
        })
    }

    fn read_env(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn fetch(&self, uri: &str) -> Result<Vec<u8>> {
        debug!("Fetching '{uri}'.");
        let response = reqwest::blocking::get(uri).map_err(|e| Error::FetchError {
            uri: uri.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !(200..400).contains(&status.as_u16()) {
            return Err(Error::FetchError {
                uri: uri.to_string(),
                reason: format!("HTTP {status}"),
            });
        }

        let body = response.bytes().map_err(|e| Error::FetchError {
            uri: uri.to_string(),
            reason: e.to_string(),
        })?;
        Ok(body.to_vec())
    }

    fn read_stdin(&self) -> Result<String> {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    }
}

/// Replaces a leading `~/` with the home directory.
///
/// Paths of two characters or fewer, and paths when no home directory is
/// known, are returned unchanged.
pub fn expand_home(path: &str, home: Option<&Path>) -> PathBuf {
    match (path.strip_prefix("~/"), home) {
        (Some(rest), Some(home)) if path.len() > 2 => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// Checks that `uri` is something [`Loader::fetch`] can retrieve.
///
/// # Errors
/// * `Error::ConfigError` if the text is not a URL or its scheme is not http(s)
pub fn validate_uri(name: &str, uri: &str) -> Result<()> {
    let url = Url::parse(uri)
        .map_err(|e| Error::ConfigError(format!("mapping '{name}': invalid uri '{uri}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(Error::ConfigError(format!(
            "mapping '{name}': unsupported uri scheme '{scheme}' in '{uri}'"
        ))),
    }
}
