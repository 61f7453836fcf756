/// Initialises the global logger.
///
/// Warnings are always shown so unresolved placeholders reach stderr;
/// `verbose` lowers the filter to debug. `RUST_LOG` overrides both.
pub fn init_logger(verbose: bool) {
    env_logger::Builder::new()
        .filter_level(if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        })
        .parse_default_env()
        .init();
}
