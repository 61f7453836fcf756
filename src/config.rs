//! Run configuration derived from the command line.
//! Decides the run mode and where template and mapping text are read from.

use std::path::PathBuf;

use crate::cli::Args;
use crate::constants::DEFAULT_MAX_PASSES;

/// What the run emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Substitute the mapping into the template and print the result
    #[default]
    Substitute,
    /// Print the resolved mapping as a mapping document, skipping file and uri loads
    Preprocess,
}

/// Where one input comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    File(PathBuf),
    Stdin,
}

impl From<Option<PathBuf>> for InputSource {
    fn from(path: Option<PathBuf>) -> Self {
        match path {
            Some(path) => InputSource::File(path),
            None => InputSource::Stdin,
        }
    }
}

impl std::fmt::Display for InputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputSource::File(path) => write!(f, "file '{}'", path.display()),
            InputSource::Stdin => f.write_str("standard input"),
        }
    }
}

/// Where template and mapping text come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputPlan {
    /// Separate template and mapping sources; at most one of them is stdin
    Separate { template: InputSource, mappings: InputSource },
    /// One text serves as both the template and its own mapping source
    SelfFilter { source: InputSource },
}

/// Settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub mode: Mode,
    pub max_passes: usize,
    pub verbose: bool,
    pub plan: InputPlan,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            mode: Mode::Substitute,
            max_passes: DEFAULT_MAX_PASSES,
            verbose: false,
            plan: InputPlan::SelfFilter { source: InputSource::Stdin },
        }
    }
}

impl From<&Args> for Options {
    fn from(args: &Args) -> Self {
        let (plan, self_filter) = match (&args.template, &args.mappings, args.inplace) {
            (template, _, true) => (
                InputPlan::SelfFilter { source: InputSource::from(template.clone()) },
                true,
            ),
            (None, None, false) => (InputPlan::SelfFilter { source: InputSource::Stdin }, true),
            (template, mappings, false) => (
                InputPlan::Separate {
                    template: InputSource::from(template.clone()),
                    mappings: InputSource::from(mappings.clone()),
                },
                false,
            ),
        };

        Options {
            mode: if args.preprocess || self_filter { Mode::Preprocess } else { Mode::Substitute },
            max_passes: args.max_passes,
            verbose: args.verbose,
            plan,
        }
    }
}
