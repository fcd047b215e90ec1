use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::env;
use std::sync::LazyLock;

/// Nested references are resolved at most this many times.
const EXPAND_MAX_ATTEMPTS: usize = 10;

static VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)").unwrap()
});

/// Environment variables handed to lifecycle scripts.
///
/// Only the additions are stored; the process environment is inherited by
/// the child and consulted for expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Env(BTreeMap<String, String>);

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn lookup(&self, key: &str) -> String {
        match self.get(key) {
            Some(v) => v.to_string(),
            None => env::var(key).unwrap_or_default(),
        }
    }

    /// Expand `$NAME` and `${NAME}` against this env, then the process env.
    ///
    /// Unknown names expand to the empty string. Values that themselves
    /// contain references are expanded again, up to a fixed depth.
    pub fn expand(&self, target: &str) -> String {
        let mut current = target.to_string();
        for _ in 0..EXPAND_MAX_ATTEMPTS {
            let next = VAR
                .replace_all(&current, |caps: &Captures| {
                    let name = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
                    self.lookup(name)
                })
                .into_owned();
            if next == current {
                break;
            }
            current = next;
        }
        current
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Env {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
