//! Common constants used throughout k8s-template.

/// Exit status for runtime failures (I/O, network, decode, cycles)
pub const EXIT_FATAL: i32 = 1;

/// Exit status for invalid command line usage, same as clap's
pub const EXIT_USAGE: i32 = 2;

/// Exit status when the mapping document is not valid YAML
pub const EXIT_TRANSFORM: i32 = 3;

/// Exit status for malformed mapping entries
pub const EXIT_CONFIG: i32 = 4;

/// Upper bound on closure and substitution passes
pub const DEFAULT_MAX_PASSES: usize = 64;

/// Separator used by `delimit` when called with an empty one
pub const DEFAULT_DELIMITER: &str = ",";

/// Separator used by `zip`, `zipPrefix` and `zipSuffix` when called with an empty one
pub const DEFAULT_ZIP_SEPARATOR: &str = "-";

/// Coarse presence check for placeholder syntax
pub const TEMPLATE_PATTERN: &str = r"\{\{.*\}\}";
