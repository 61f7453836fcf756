//! Command-line interface implementation for k8s-template.
//! Provides argument parsing and help text formatting using clap.

use clap::Parser;
use std::path::PathBuf;

use crate::constants::DEFAULT_MAX_PASSES;

/// Command-line arguments structure for k8s-template.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Replace {{ }} placeholders in a template with values from a YAML mappings file",
    long_about = None
)]
pub struct Args {
    /// File with templates to replace. Read from stdin when omitted
    #[arg(short, long, value_name = "FILE")]
    pub template: Option<PathBuf>,

    /// YAML list of mappings describing the replacement values.
    /// Read from stdin when omitted and a template file is given
    #[arg(short, long, value_name = "FILE")]
    pub mappings: Option<PathBuf>,

    /// Print the resolved mappings instead of the template, skipping file and uri loads
    #[arg(short, long)]
    pub preprocess: bool,

    /// Use the template itself as the mappings source and print the resolved mappings
    #[arg(short, long, conflicts_with = "mappings")]
    pub inplace: bool,

    /// Enable verbose logging and dump mapping metadata when substitution fails
    #[arg(short, long, alias = "debug")]
    pub verbose: bool,

    /// Maximum substitution passes before reporting a reference cycle
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_PASSES, value_parser = parse_max_passes)]
    pub max_passes: usize,
}

fn parse_max_passes(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

/// Parses command line arguments and returns the Args structure.
///
/// # Exits
/// * With clap's usage status (2) for invalid arguments
pub fn get_args() -> Args {
    Args::parse()
}
