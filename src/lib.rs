//! k8s-template resolves a YAML list of named value sources (literals, files,
//! environment variables, URIs) into a name→text mapping, closes references
//! between those values, and substitutes the result into `{{ }}` templates.

/// Command-line interface module
pub mod cli;

/// Run mode and input selection derived from the command line
pub mod config;

/// Common constants
pub mod constants;

/// Error types and handling
pub mod error;

/// Function library available inside placeholders
pub mod functions;

/// File, environment, network and stdin access
pub mod loader;

/// Logger setup
pub mod logger;

/// Declarative mapping records
pub mod mapping;

/// Serializes a resolved mapping back into a mapping document
pub mod preprocess;

/// Run orchestration
pub mod processor;

/// Template rendering and the repeated substitution engine
pub mod renderer;

/// Entry resolution and the self-reference closure
pub mod resolver;

/// Double-brace template notation: lexer, parser and evaluator
pub mod template;
