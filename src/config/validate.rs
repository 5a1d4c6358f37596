// src/config/validate.rs

use std::collections::HashSet;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{CaravanError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = CaravanError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let exclude = build_exclude(&raw.loader.exclude)?;
        Ok(ConfigFile::new_unchecked(raw.loader, raw.environments, exclude))
    }
}

/// Run every check on a raw config without building it.
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    validate_raw_config(cfg)
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_environments(cfg)?;
    validate_loader_section(cfg)?;
    validate_environments(cfg)?;
    Ok(())
}

fn ensure_has_environments(cfg: &RawConfigFile) -> Result<()> {
    if cfg.environments.is_empty() {
        return Err(CaravanError::ConfigError(
            "config must contain at least one [[environment]] table".to_string(),
        ));
    }
    Ok(())
}

fn validate_loader_section(cfg: &RawConfigFile) -> Result<()> {
    let loader = &cfg.loader;

    if loader.event_buffer == 0 {
        return Err(CaravanError::ConfigError(
            "[loader].event_buffer must be >= 1 (got 0)".to_string(),
        ));
    }
    if loader.extension.is_empty() || loader.extension.contains('.') {
        return Err(CaravanError::ConfigError(format!(
            "[loader].extension must be a non-empty extension without a dot (got '{}')",
            loader.extension
        )));
    }
    if loader.test_suffix.is_empty() {
        return Err(CaravanError::ConfigError(
            "[loader].test_suffix must not be empty".to_string(),
        ));
    }
    build_exclude(&loader.exclude)?;
    Ok(())
}

fn validate_environments(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = HashSet::new();
    for (idx, env) in cfg.environments.iter().enumerate() {
        if env.os.trim().is_empty() || env.arch.trim().is_empty() {
            return Err(CaravanError::ConfigError(format!(
                "environment #{} must set both 'os' and 'arch'",
                idx + 1
            )));
        }
        if !seen.insert(env) {
            return Err(CaravanError::ConfigError(format!(
                "environment '{env}' is listed more than once"
            )));
        }
    }
    Ok(())
}

fn build_exclude(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            CaravanError::ConfigError(format!("invalid exclude pattern '{pattern}': {e}"))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| CaravanError::ConfigError(format!("building exclude patterns: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Result<ConfigFile> {
        let raw: RawConfigFile = toml::from_str(toml)?;
        ConfigFile::try_from(raw)
    }

    fn expect_config_error(toml: &str, needle: &str) {
        match parse(toml) {
            Err(CaravanError::ConfigError(msg)) => {
                assert!(msg.contains(needle), "unexpected message: {msg}");
            }
            Err(e) => panic!("expected ConfigError, got {e:?}"),
            Ok(_) => panic!("expected ConfigError, got Ok"),
        }
    }

    #[test]
    fn defaults_apply() {
        let cfg = parse("[[environment]]\nos = \"linux\"\narch = \"amd64\"\n").unwrap();
        assert_eq!(cfg.loader.extension, "go");
        assert_eq!(cfg.loader.test_suffix, "_test");
        assert_eq!(cfg.loader.event_buffer, 64);
        assert!(cfg.environments[0].tags.is_empty());
    }

    #[test]
    fn rejects_missing_environment() {
        expect_config_error("[loader]\nextension = \"go\"\n", "at least one [[environment]]");
    }

    #[test]
    fn rejects_duplicate_environment_regardless_of_tag_order() {
        expect_config_error(
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
            "more than once",
        );
    }

    #[test]
    fn rejects_bad_loader_settings() {
        let env = "\n[[environment]]\nos = \"linux\"\narch = \"amd64\"\n";
        expect_config_error(&format!("[loader]\nevent_buffer = 0\n{env}"), "event_buffer");
        expect_config_error(&format!("[loader]\nextension = \".go\"\n{env}"), "extension");
        expect_config_error(&format!("[loader]\ntest_suffix = \"\"\n{env}"), "test_suffix");
        expect_config_error(&format!("[loader]\nexclude = [\"a/[\"]\n{env}"), "invalid exclude");
    }

    #[test]
    fn rejects_empty_os() {
        expect_config_error("[[environment]]\nos = \"\"\narch = \"amd64\"\n", "must set both");
    }
}
