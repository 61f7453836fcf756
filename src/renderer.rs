//! Template renderer and the substitution engine.
//! A single render evaluates every placeholder once; [`substitute`] repeats
//! renders until the text stops changing, so expansions that produce further
//! placeholders are completed.
use std::sync::LazyLock;

use log::debug;
use regex::Regex;

use crate::constants::TEMPLATE_PATTERN;
use crate::error::{Error, Result};
use crate::functions::Functions;
use crate::loader::Loader;
use crate::mapping::Mapping;
use crate::template::Template;

static TEMPLATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(TEMPLATE_PATTERN).expect("template pattern is a valid regex"));

/// Whether `text` contains placeholder syntax at all.
pub fn is_template_bearing(text: &str) -> bool {
    TEMPLATE_REGEX.is_match(text)
}

/// Output of a render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    /// One message per fragment left in place
    pub unresolved: Vec<String>,
}

/// Trait for template rendering engines.
pub trait TemplateRenderer {
    /// Renders a template string once against the mapping.
    ///
    /// # Arguments
    /// * `template` - Template string to render
    /// * `context` - Resolved mapping used for name lookups
    ///
    /// # Returns
    /// * `Result<Rendered>` - Rendered text; unresolved fragments stay verbatim
    ///
    /// # Errors
    /// * Fatal failures raised by functions (`curl`, `file`, `base64Decode`)
    fn render(&self, template: &str, context: &Mapping) -> Result<Rendered>;

    /// Loader used by the I/O functions, also used to resolve file and uri entries.
    fn loader(&self) -> &dyn Loader;
}

/// Renderer for the double-brace notation and the standard function library.
pub struct Renderer<'a> {
    functions: Functions,
    loader: &'a dyn Loader,
}

impl<'a> Renderer<'a> {
    /// Creates a new Renderer with the standard function library.
    pub fn new(loader: &'a dyn Loader) -> Self {
        Self { functions: Functions::standard(), loader }
    }
}

impl TemplateRenderer for Renderer<'_> {
    fn render(&self, template: &str, context: &Mapping) -> Result<Rendered> {
        match Template::parse(template) {
            Ok(parsed) => {
                let (text, unresolved) = parsed.execute(context, &self.functions, self.loader)?;
                Ok(Rendered { text, unresolved })
            }
            Err(err) => {
                debug!("Leaving text unchanged: {err}");
                Ok(Rendered { text: template.to_string(), unresolved: vec![err.to_string()] })
            }
        }
    }

    fn loader(&self) -> &dyn Loader {
        self.loader
    }
}

/// Substitutes `text` against `mapping` until a render leaves it unchanged.
///
/// # Errors
/// * `Error::CycleError` if the text still changes after `max_passes` renders
pub fn substitute(
    renderer: &dyn TemplateRenderer,
    text: &str,
    mapping: &Mapping,
    max_passes: usize,
) -> Result<Rendered> {
    let mut current = Rendered { text: text.to_string(), unresolved: Vec::new() };
    for _ in 0..=max_passes {
        if !is_template_bearing(&current.text) {
            return Ok(current);
        }
        let next = renderer.render(&current.text, mapping)?;
        if next.text == current.text {
            return Ok(next);
        }
        current = next;
    }
    Err(Error::CycleError { context: "template".to_string(), passes: max_passes })
}
