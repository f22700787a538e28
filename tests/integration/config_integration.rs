//! Layered configuration: global file, workspace files, environment.

use std::fs;

use proscope::config::ConfigLoader;
use proscope::{AggregationStrategy, HandlerSpec, ProgressError, ScopeOptions};
use tempfile::TempDir;

use crate::integration::with_xdg_env;

fn write_global(test_dir: &TempDir, contents: &str) {
    let dir = test_dir.path().join("proscope");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("config.toml"), contents).unwrap();
}

fn write_workspace(workspace: &std::path::Path, name: &str, contents: &str) {
    let dir = workspace.join("config");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(name), contents).unwrap();
}

#[test]
fn defaults_apply_without_any_files() {
    let test_dir = TempDir::new().unwrap();
    with_xdg_env(&test_dir, || {
        let workspace = test_dir.path().join("ws");
        fs::create_dir_all(&workspace).unwrap();
        let config = ConfigLoader::load(&workspace).unwrap();
        assert_eq!(config.progress.strategy, AggregationStrategy::FirstOnly);
        assert_eq!(config.progress.drain_timeout_ms, 5000);
        assert!(config.progress.handlers.is_empty());
        assert_eq!(config.logging.level, "info");
    });
}

#[test]
fn global_file_is_read_from_xdg_config_home() {
    let test_dir = TempDir::new().unwrap();
    with_xdg_env(&test_dir, || {
        write_global(
            &test_dir,
            r#"
[progress]
strategy = "weighted"

[[progress.handlers]]
type = "beep"
on_finish = false
"#,
        );
        let workspace = test_dir.path().join("ws");
        fs::create_dir_all(&workspace).unwrap();
        let config = ConfigLoader::load(&workspace).unwrap();
        assert_eq!(config.progress.strategy, AggregationStrategy::Weighted);
        match &config.progress.handlers[..] {
            [HandlerSpec::Beep(beep)] => assert!(!beep.on_finish),
            other => panic!("unexpected handlers {:?}", other),
        }
    });
}

#[test]
fn workspace_overrides_global_and_env_overrides_workspace() {
    let test_dir = TempDir::new().unwrap();
    with_xdg_env(&test_dir, || {
        write_global(
            &test_dir,
            "[progress]\nstrategy = \"weighted\"\nchannel_capacity = 64\n",
        );
        let workspace = test_dir.path().join("ws");
        write_workspace(&workspace, "config.toml", "[progress]\nstrategy = \"sum_all\"\n");

        let config = ConfigLoader::load(&workspace).unwrap();
        assert_eq!(config.progress.strategy, AggregationStrategy::SumAll);
        assert_eq!(config.progress.channel_capacity, 64);

        std::env::set_var("PROSCOPE__PROGRESS__STRATEGY", "first_only");
        let config = ConfigLoader::load(&workspace).unwrap();
        assert_eq!(config.progress.strategy, AggregationStrategy::FirstOnly);
    });
}

#[test]
fn environment_specific_workspace_file_wins_over_base() {
    let test_dir = TempDir::new().unwrap();
    with_xdg_env(&test_dir, || {
        let workspace = test_dir.path().join("ws");
        write_workspace(&workspace, "config.toml", "[progress]\ndrain_timeout_ms = 100\n");
        write_workspace(&workspace, "ci.toml", "[progress]\ndrain_timeout_ms = 900\n");

        std::env::set_var("PROSCOPE_ENV", "ci");
        let config = ConfigLoader::load(&workspace).unwrap();
        assert_eq!(config.progress.drain_timeout_ms, 900);

        let options = ScopeOptions::from_config(&config.progress);
        assert_eq!(options.drain_timeout.as_millis(), 900);
    });
}

#[test]
fn invalid_values_are_reported_as_config_errors() {
    let test_dir = TempDir::new().unwrap();
    with_xdg_env(&test_dir, || {
        let workspace = test_dir.path().join("ws");
        write_workspace(&workspace, "config.toml", "[progress]\nchannel_capacity = 0\n");
        let err = ConfigLoader::load(&workspace).unwrap_err();
        assert!(matches!(err, ProgressError::Config(_)));
        assert!(err.to_string().contains("channel_capacity"));

        write_workspace(&workspace, "config.toml", "[progress]\nstrategy = \"median\"\n");
        assert!(ConfigLoader::load(&workspace).is_err());
    });
}

#[test]
fn configured_handlers_drive_scope_options() {
    let test_dir = TempDir::new().unwrap();
    with_xdg_env(&test_dir, || {
        let workspace = test_dir.path().join("ws");
        write_workspace(
            &workspace,
            "config.toml",
            r#"
[progress]
enable = false

[[progress.handlers]]
type = "void"
"#,
        );
        let config = ConfigLoader::load(&workspace).unwrap();
        let options = ScopeOptions::from_config(&config.progress);
        assert!(!options.enable);
        assert_eq!(options.registry.unwrap().names(), vec!["void"]);
    });
}
