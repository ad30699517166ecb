// tests/cli_run.rs

use std::io::Write;

use clap::Parser;
use tempfile::NamedTempFile;
use taskgraph::cli::CliArgs;

const DEFINITION: &str = r#"
[dag.a]
name = "A"
cmd = "true"

[dag.b]
name = "B"
after = ["a", "ghost"]
"#;

fn definition_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{DEFINITION}").unwrap();
    file
}

fn args(file: &NamedTempFile, extra: &[&str]) -> CliArgs {
    let path = file.path().to_str().unwrap();
    let mut argv = vec!["taskgraph", "--config", path];
    argv.extend_from_slice(extra);
    CliArgs::try_parse_from(argv).unwrap()
}

#[test]
fn test_unknown_reference_fails_by_default() {
    let file = definition_file();
    let err = taskgraph::run(args(&file, &["--dry-run"])).unwrap_err();
    assert!(err.to_string().contains("ghost"));
}

#[test]
fn test_cli_policy_overrides_definition() {
    let file = definition_file();
    taskgraph::run(args(&file, &["--dry-run", "--unknown-references", "drop"])).unwrap();
}

#[test]
fn test_export_does_not_run_tasks() {
    let file = definition_file();
    taskgraph::run(args(
        &file,
        &["--export", "json", "--unknown-references", "drop"],
    ))
    .unwrap();
}

#[test]
fn test_missing_definition_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("TaskGraph.toml");
    let args = CliArgs::try_parse_from(["taskgraph", "--config", missing.to_str().unwrap()]).unwrap();

    let err = taskgraph::run(args).unwrap_err();
    assert!(format!("{err:#}").contains("TaskGraph.toml"));
}
