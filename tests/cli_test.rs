use clap::Parser;
use k8s_template::cli::Args;
use k8s_template::config::{InputPlan, InputSource, Mode, Options};
use k8s_template::constants::DEFAULT_MAX_PASSES;
use std::ffi::OsString;
use std::path::PathBuf;

fn make_args(args: &[&str]) -> Vec<OsString> {
    let mut res = vec![OsString::from("k8s-template")];
    res.extend(args.iter().map(OsString::from));
    res
}

#[test]
fn test_basic_args() {
    let args = make_args(&["-t", "deploy.yaml", "-m", "mappings.yaml"]);
    let parsed = Args::try_parse_from(args).unwrap();

    assert_eq!(parsed.template, Some(PathBuf::from("deploy.yaml")));
    assert_eq!(parsed.mappings, Some(PathBuf::from("mappings.yaml")));
    assert!(!parsed.preprocess);
    assert!(!parsed.inplace);
    assert!(!parsed.verbose);
    assert_eq!(parsed.max_passes, DEFAULT_MAX_PASSES);
}

#[test]
fn test_long_flags() {
    let args = make_args(&[
        "--template",
        "t.yaml",
        "--mappings",
        "m.yaml",
        "--preprocess",
        "--verbose",
        "--max-passes",
        "8",
    ]);
    let parsed = Args::try_parse_from(args).unwrap();

    assert!(parsed.preprocess);
    assert!(parsed.verbose);
    assert_eq!(parsed.max_passes, 8);
}

#[test]
fn test_debug_alias() {
    let parsed = Args::try_parse_from(make_args(&["--debug"])).unwrap();
    assert!(parsed.verbose);
}

#[test]
fn test_invalid_args() {
    assert!(Args::try_parse_from(make_args(&["--max-passes", "0"])).is_err());
    assert!(Args::try_parse_from(make_args(&["--max-passes", "many"])).is_err());
    assert!(Args::try_parse_from(make_args(&["-i", "-m", "m.yaml"])).is_err());
    assert!(Args::try_parse_from(make_args(&["--unknown"])).is_err());
}

#[test]
fn test_plan_separate_files() {
    let args = Args::try_parse_from(make_args(&["-t", "t.yaml", "-m", "m.yaml"])).unwrap();
    let options = Options::from(&args);

    assert_eq!(options.mode, Mode::Substitute);
    assert_eq!(
        options.plan,
        InputPlan::Separate {
            template: InputSource::File(PathBuf::from("t.yaml")),
            mappings: InputSource::File(PathBuf::from("m.yaml")),
        }
    );
}

#[test]
fn test_plan_stdin_fills_missing_input() {
    let args = Args::try_parse_from(make_args(&["-t", "t.yaml"])).unwrap();
    let options = Options::from(&args);
    assert_eq!(
        options.plan,
        InputPlan::Separate {
            template: InputSource::File(PathBuf::from("t.yaml")),
            mappings: InputSource::Stdin,
        }
    );

    let args = Args::try_parse_from(make_args(&["-m", "m.yaml"])).unwrap();
    let options = Options::from(&args);
    assert_eq!(
        options.plan,
        InputPlan::Separate {
            template: InputSource::Stdin,
            mappings: InputSource::File(PathBuf::from("m.yaml")),
        }
    );
}

#[test]
fn test_plan_self_filter() {
    let args = Args::try_parse_from(make_args(&[])).unwrap();
    let options = Options::from(&args);
    assert_eq!(options.mode, Mode::Preprocess);
    assert_eq!(options.plan, InputPlan::SelfFilter { source: InputSource::Stdin });

    let args = Args::try_parse_from(make_args(&["-i", "-t", "t.yaml"])).unwrap();
    let options = Options::from(&args);
    assert_eq!(options.mode, Mode::Preprocess);
    assert_eq!(
        options.plan,
        InputPlan::SelfFilter { source: InputSource::File(PathBuf::from("t.yaml")) }
    );
}
