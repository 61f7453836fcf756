//! Run orchestration.
//! Reads the inputs named by the [`InputPlan`], resolves the mappings and
//! produces either the substituted template or the preprocessed mappings.

use log::{debug, warn};

use crate::config::{InputPlan, InputSource, Mode, Options};
use crate::error::{Error, Result};
use crate::loader::Loader;
use crate::mapping::parse_records;
use crate::preprocess;
use crate::renderer::{substitute, TemplateRenderer};
use crate::resolver::{MappingResolver, Resolution};

/// Raw text of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inputs {
    /// Absent when the mode never reads the template
    pub template: Option<String>,
    pub mappings: String,
}

fn read_source(source: &InputSource, loader: &dyn Loader) -> Result<String> {
    debug!("Reading {source}.");
    match source {
        InputSource::File(path) => {
            let bytes = loader.read_file(path)?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        InputSource::Stdin => loader.read_stdin(),
    }
}

/// Reads template and mapping text as the plan describes.
///
/// # Errors
/// * `Error::UsageError` if both inputs would come from stdin
/// * `Error::FileReadError` / `Error::IoError` if an input can't be read
pub fn read_inputs(options: &Options, loader: &dyn Loader) -> Result<Inputs> {
    match &options.plan {
        InputPlan::SelfFilter { source } => {
            let text = read_source(source, loader)?;
            Ok(Inputs { template: Some(text.clone()), mappings: text })
        }
        InputPlan::Separate { template, mappings } => {
            if *template == InputSource::Stdin && *mappings == InputSource::Stdin {
                return Err(Error::UsageError(
                    "template and mappings can't both be read from stdin".to_string(),
                ));
            }
            let mappings = read_source(mappings, loader)?;
            let template = match options.mode {
                Mode::Substitute => Some(read_source(template, loader)?),
                Mode::Preprocess => None,
            };
            Ok(Inputs { template, mappings })
        }
    }
}

/// Drives resolution and the terminal step of a run.
pub struct Processor<'a> {
    renderer: &'a dyn TemplateRenderer,
    options: &'a Options,
}

impl<'a> Processor<'a> {
    pub fn new(renderer: &'a dyn TemplateRenderer, options: &'a Options) -> Self {
        Self { renderer, options }
    }

    /// Parses the mapping document and resolves it to a closed mapping.
    pub fn resolve(&self, mappings: &str) -> Result<Resolution> {
        let records = parse_records(mappings)?;
        MappingResolver::new(self.renderer, self.options.mode, self.options.max_passes)
            .resolve(records)
    }

    /// Produces the run's output text.
    pub fn process(&self, inputs: &Inputs) -> Result<String> {
        let resolution = self.resolve(&inputs.mappings)?;
        match self.options.mode {
            Mode::Preprocess => preprocess::to_yaml(&resolution),
            Mode::Substitute => match &inputs.template {
                Some(template) => self.apply(template, &resolution),
                None => Err(Error::UsageError("no template to substitute".to_string())),
            },
        }
    }

    /// Substitutes the closed mapping into `template`.
    ///
    /// Unresolved fragments are reported and left in the output.
    pub fn apply(&self, template: &str, resolution: &Resolution) -> Result<String> {
        let rendered =
            substitute(self.renderer, template, &resolution.mapping, self.options.max_passes)?;

        if !rendered.unresolved.is_empty() {
            for msg in &rendered.unresolved {
                warn!("{msg}");
            }
            warn!("Is the template missing a mapping? Check the mappings for the names above.");
            if self.options.verbose {
                warn!("Input debug mappings:");
                for entry in &resolution.entries {
                    warn!("{entry}");
                }
            }
        }

        let mut output = rendered.text;
        if !output.ends_with('\n') {
            output.push('\n');
        }
        Ok(output)
    }
}
