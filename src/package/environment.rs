// src/package/environment.rs

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::hash::Hash;

/// Build environment: target OS, architecture and build tags.
///
/// Tags are kept in a sorted set, so two environments that list the same
/// tags in a different order are identical and hash identically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
pub struct Environment {
    pub os: String,
    pub arch: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl Environment {
    pub fn new<I, S>(os: impl Into<String>, arch: impl Into<String>, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            os: os.into(),
            arch: arch.into(),
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }

    /// Identity of the environment tuple.
    pub fn hash(&self) -> Hash {
        let parts = [self.arch.as_str(), self.os.as_str()]
            .into_iter()
            .chain(self.tags.iter().map(String::as_str));
        Hash::of_strings(parts)
    }

    /// Key of the distinct package for `abs_path` under this environment.
    pub fn package_key(&self, abs_path: &Path) -> Hash {
        Hash::of_path(abs_path).combine(self.hash())
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)?;
        if !self.tags.is_empty() {
            let tags: Vec<&str> = self.tags.iter().map(String::as_str).collect();
            write!(f, " [{}]", tags.join(","))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_order_does_not_change_identity() {
        let a = Environment::new("linux", "amd64", ["netgo", "osusergo"]);
        let b = Environment::new("linux", "amd64", ["osusergo", "netgo"]);
        assert_eq!(a, b);
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn package_keys_differ_per_environment() {
        let linux = Environment::new("linux", "amd64", Vec::<String>::new());
        let darwin = Environment::new("darwin", "amd64", Vec::<String>::new());
        let path = Path::new("/src/foo");
        assert_ne!(linux.package_key(path), darwin.package_key(path));
        assert_eq!(linux.package_key(path), linux.clone().package_key(path));
    }

    #[test]
    fn display_lists_tags() {
        let env = Environment::new("linux", "arm64", ["b", "a"]);
        assert_eq!(env.to_string(), "linux/arm64 [a,b]");
    }
}
