//! k8s-template's main application entry point.
//! Handles command-line argument parsing and hands the run to the processor.

use std::io::Write;

use k8s_template::{
    cli::{get_args, Args},
    config::Options,
    error::{default_error_handler, Result},
    loader::SystemLoader,
    logger::init_logger,
    processor::{read_inputs, Processor},
    renderer::Renderer,
};

/// Main application entry point.
fn main() {
    let args = get_args();

    init_logger(args.verbose);

    if let Err(err) = run(&args) {
        default_error_handler(err);
    }
}

/// Main application logic execution.
///
/// # Flow
/// 1. Derives run options and the input plan from the arguments
/// 2. Reads template and mapping text
/// 3. Resolves the mappings and closes them
/// 4. Writes the substituted template or the preprocessed mappings to stdout
fn run(args: &Args) -> Result<()> {
    let options = Options::from(args);
    let loader = SystemLoader::new();
    let renderer = Renderer::new(&loader);

    let inputs = read_inputs(&options, &loader)?;
    let output = Processor::new(&renderer, &options).process(&inputs)?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()?;
    Ok(())
}
