//! Unit tests for command-line parsing

use clap::Parser;
use jira_ingest::cli::{Cli, Commands};
use std::path::PathBuf;

#[test]
fn test_run_with_overrides() {
    let cli = Cli::try_parse_from([
        "jira-ingest",
        "run",
        "-p",
        "kafka",
        "--project",
        "SPARK",
        "--requests-per-second",
        "0.5",
        "--max-attempts",
        "7",
        "--page-size",
        "50",
        "--max-issues",
        "200",
        "-o",
        "out/issues.jsonl",
        "--fresh",
    ])
    .unwrap();

    let Commands::Run(args) = &cli.command else {
        panic!("expected run command");
    };
    assert_eq!(args.projects, vec!["kafka", "SPARK"]);
    assert_eq!(args.requests_per_second, Some(0.5));
    assert_eq!(args.max_attempts, Some(7));
    assert_eq!(args.page_size, Some(50));
    assert_eq!(args.max_issues, Some(200));
    assert_eq!(args.output, Some(PathBuf::from("out/issues.jsonl")));
    assert!(args.fresh);

    let config = args.apply(cli.base_config().unwrap()).unwrap();
    assert_eq!(config.projects, vec!["KAFKA", "SPARK"]);
    assert_eq!(config.page_size, 50);
}

#[test]
fn test_run_defaults() {
    let cli = Cli::try_parse_from(["jira-ingest", "run"]).unwrap();
    let Commands::Run(args) = &cli.command else {
        panic!("expected run command");
    };
    assert!(args.projects.is_empty());
    assert!(!args.fresh);
    assert!(args.metrics_addr.is_none());

    let config = args.apply(cli.base_config().unwrap()).unwrap();
    assert_eq!(config.projects, vec!["SPARK", "KAFKA", "HADOOP"]);
}

#[test]
fn test_max_attempts_out_of_range_is_rejected() {
    let result = Cli::try_parse_from(["jira-ingest", "run", "--max-attempts", "0"]);
    assert!(result.is_err());

    let result = Cli::try_parse_from(["jira-ingest", "run", "--max-attempts", "21"]);
    assert!(result.is_err());
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
        "jira-ingest",
        "status",
        "--checkpoint",
        "/tmp/state.json",
        "--project",
        "KAFKA",
    ])
    .unwrap();

    assert_eq!(cli.checkpoint, Some(PathBuf::from("/tmp/state.json")));
    let Commands::Status(status) = &cli.command else {
        panic!("expected status command");
    };
    assert_eq!(status.project.as_deref(), Some("KAFKA"));

    let config = cli.base_config().unwrap();
    assert_eq!(config.checkpoint_path, PathBuf::from("/tmp/state.json"));
}

#[test]
fn test_config_file_is_loaded() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("ingest.toml");
    std::fs::write(
        &path,
        "projects = [\"HADOOP\"]\nrequests_per_second = 1.5\npage_size = 25\n",
    )
    .unwrap();

    let cli = Cli::try_parse_from([
        "jira-ingest",
        "--config",
        path.to_str().unwrap(),
        "run",
        "--page-size",
        "10",
    ])
    .unwrap();
    let Commands::Run(args) = &cli.command else {
        panic!("expected run command");
    };

    let config = args.apply(cli.base_config().unwrap()).unwrap();
    assert_eq!(config.projects, vec!["HADOOP"]);
    assert_eq!(config.requests_per_second, 1.5);
    assert_eq!(config.page_size, 10);
}

#[test]
fn test_unknown_command_is_rejected() {
    assert!(Cli::try_parse_from(["jira-ingest", "download"]).is_err());
}
