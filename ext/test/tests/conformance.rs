//! Conformance tests that run YAML fixtures against mockrpc
//!
//! Run with: cargo test -p mockrpc-test --test conformance

use mockrpc_test::fixture::Fixture;
use mockrpc_test::init_tracing;
use std::fs;
use std::path::{Path, PathBuf};

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

/// Load and run every fixture in one file
fn run_fixture_file(name: &str) {
    init_tracing();
    let path = fixtures_dir().join(name);
    let yaml = fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {e}", path.display()));

    let fixtures = Fixture::from_yaml_multi(&yaml)
        .unwrap_or_else(|e| panic!("Failed to parse {}: {e}", path.display()));
    assert!(!fixtures.is_empty(), "{} holds no fixtures", path.display());

    for fixture in fixtures {
        println!("  Running: {}", fixture.name);
        fixture.run_and_assert();
    }
}

#[test]
fn test_greeter() {
    run_fixture_file("greeter.yaml");
}

#[test]
fn test_matching() {
    run_fixture_file("matching.yaml");
}

#[test]
fn test_streaming() {
    run_fixture_file("streaming.yaml");
}

#[test]
fn test_invalid_configs() {
    run_fixture_file("invalid.yaml");
}

#[test]
fn every_fixture_file_is_covered() {
    let mut files: Vec<String> = fs::read_dir(fixtures_dir())
        .expect("read fixtures dir")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".yaml") || name.ends_with(".yml"))
        .collect();
    files.sort();
    assert_eq!(
        files,
        ["greeter.yaml", "invalid.yaml", "matching.yaml", "streaming.yaml"]
    );
}
