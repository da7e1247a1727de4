//! Integration tests for configuration management
//!
//! Loads real files from a temporary directory and checks defaults,
//! validation and data directory handling.

use std::fs;
use tempfile::TempDir;
use tripsquad_engine::config::Config;

fn write_config(dir: &TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn test_full_config_round_trip() {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("data");
    let path = write_config(
        &dir,
        &format!(
            r#"
[core]
log_level = "debug"
data_dir = "{}"

[memory]
max_chunk_size = 400
max_results = 5
collection_prefix = "trips"
retention_days = 30
cleanup_interval_hours = 6

[orchestrator]
max_concurrent_projects = 2
call_timeout_secs = 15
default_duration = 5
default_budget = 1500.0
default_travelers = 2
max_finished_projects = 50

[llm]
enabled = true
base_url = "http://10.0.0.5:11434"
model = "llama3.1:70b"

[persistence]
backend = "sqlite"
db_file = "plans.db"
"#,
            data_dir.display()
        ),
    );

    let config = Config::load_from_path(&path).unwrap();

    assert_eq!(config.core.log_level, "debug");
    assert!(data_dir.exists(), "data dir is created on load");
    assert_eq!(config.memory.max_chunk_size, 400);
    assert_eq!(config.memory.collection_prefix, "trips");
    assert_eq!(config.orchestrator.max_concurrent_projects, 2);
    assert_eq!(config.orchestrator.call_timeout().as_secs(), 15);
    assert_eq!(config.orchestrator.default_travelers, 2);
    assert_eq!(config.memory.cleanup_interval().as_secs(), 6 * 3600);
    assert_eq!(config.orchestrator.max_finished_projects, 50);
    assert_eq!(config.orchestrator.bus_log_capacity, 10_000);
    assert!(config.llm.enabled);
    assert_eq!(config.llm.model, "llama3.1:70b");
    assert_eq!(config.db_path(), data_dir.join("plans.db"));

    // What `config show` prints parses back to the same values.
    let rendered = toml::to_string_pretty(&config).unwrap();
    let reparsed: Config = toml::from_str(&rendered).unwrap();
    assert_eq!(reparsed.memory.max_results, 5);
    assert_eq!(reparsed.persistence.backend, "sqlite");
}

#[test]
fn test_minimal_config_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        &format!(
            "[core]\nlog_level = \"info\"\ndata_dir = \"{}\"\n",
            dir.path().join("d").display()
        ),
    );

    let config = Config::load_from_path(&path).unwrap();

    assert_eq!(config.memory.max_chunk_size, 1000);
    assert_eq!(config.memory.max_results, 10);
    assert_eq!(config.orchestrator.default_duration, 7);
    assert_eq!(config.orchestrator.default_budget, 2000.0);
    assert_eq!(config.persistence.backend, "memory");
    assert!(!config.llm.enabled);
}

#[test]
fn test_invalid_values_are_rejected() {
    let dir = TempDir::new().unwrap();
    let cases = [
        "[core]\nlog_level = \"loud\"\n",
        "[core]\nlog_level = \"info\"\n[orchestrator]\ncall_timeout_secs = 0\n",
        "[core]\nlog_level = \"info\"\n[memory]\nmax_chunk_size = 0\n",
        "[core]\nlog_level = \"info\"\n[persistence]\nbackend = \"redis\"\n",
    ];

    for body in cases {
        let body = format!(
            "{}\n",
            body.replacen(
                "[core]\n",
                &format!("[core]\ndata_dir = \"{}\"\n", dir.path().join("d").display()),
                1
            )
        );
        let path = write_config(&dir, &body);
        assert!(
            Config::load_from_path(&path).is_err(),
            "accepted invalid config:\n{}",
            body
        );
    }
}

#[test]
fn test_missing_file_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let err = Config::load_from_path(&dir.path().join("absent.toml")).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}
