// tests/config_loading.rs

use std::fs;
use std::path::PathBuf;

use caravan::config::{load_and_validate, load_from_path};
use caravan::errors::CaravanError;
use tempfile::TempDir;

fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("Caravan.toml");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn full_config_round_trips_through_validation() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[loader]
extension = "go"
search_paths = ["deps", "/abs/src"]
exclude = ["third_party/**"]
event_buffer = 16

[[environment]]
os = "linux"
arch = "amd64"

[[environment]]
os = "windows"
arch = "arm64"
tags = ["netgo", "purego"]
"#,
    );

    let cfg = load_and_validate(&path).unwrap();
    assert_eq!(cfg.environments.len(), 2);
    assert!(cfg.environments[1].has_tag("purego"));
    assert_eq!(cfg.loader.test_suffix, "_test");
    assert_eq!(cfg.loader_options().event_buffer, 16);
    assert_eq!(
        cfg.loader.search_paths,
        vec![dir.path().join("deps"), PathBuf::from("/abs/src")]
    );
    assert!(cfg.exclude_set().is_match("third_party/x/y"));
}

#[test]
fn missing_environment_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[loader]\nextension = \"go\"\n");

    // Parses fine, fails validation.
    assert!(load_from_path(&path).is_ok());
    let err = load_and_validate(&path).unwrap_err();
    assert!(matches!(err, CaravanError::ConfigError(ref m) if m.contains("[[environment]]")));
}

#[test]
fn duplicate_environments_are_rejected_regardless_of_tag_order() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[[environment]]
os = "linux"
arch = "amd64"
tags = ["a", "b"]

[[environment]]
os = "linux"
arch = "amd64"
tags = ["b", "a"]
"#,
    );
    let err = load_and_validate(&path).unwrap_err();
    assert!(err.to_string().contains("listed more than once"), "{err}");
}

#[test]
fn bad_values_are_rejected() {
    const ENV: &str = "\n[[environment]]\nos = \"linux\"\narch = \"amd64\"\n";
    let dir = TempDir::new().unwrap();

    let cases = [
        (format!("[loader]\nevent_buffer = 0\n{ENV}"), "event_buffer"),
        (format!("[loader]\nextension = \".go\"\n{ENV}"), "extension"),
        (format!("[loader]\ntest_suffix = \"\"\n{ENV}"), "test_suffix"),
        (format!("[loader]\nexclude = [\"[\"]\n{ENV}"), "invalid exclude pattern"),
        ("[[environment]]\nos = \"linux\"\narch = \"\"\n".to_string(), "must set both"),
    ];
    for (contents, needle) in cases {
        let path = write_config(&dir, &contents);
        let err = load_and_validate(&path).unwrap_err();
        assert!(err.to_string().contains(needle), "expected '{needle}' in '{err}'");
    }
}

#[test]
fn malformed_toml_and_missing_files_surface_their_errors() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[[environment]\nos = ");
    assert!(matches!(
        load_and_validate(&path),
        Err(CaravanError::TomlError(_))
    ));

    let missing = dir.path().join("nope.toml");
    assert!(matches!(
        load_and_validate(&missing),
        Err(CaravanError::IoError(_))
    ));
}
