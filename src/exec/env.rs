//! Environment allowlist for spawned commands

use std::ffi::OsString;

const ALLOWED_NAMES: &[&str] = &[
    "PATH", "HOME", "USER", "LOGNAME", "SHELL", "TMPDIR", "TMP", "TEMP", "LANG", "TERM", "PWD",
];

const ALLOWED_PREFIXES: &[&str] = &["LC_"];

/// Which parent environment variables a subprocess may see.
///
/// Anything not listed is dropped, API keys included.
#[derive(Debug, Clone)]
pub struct EnvAllowlist {
    names: Vec<String>,
    prefixes: Vec<String>,
}

impl Default for EnvAllowlist {
    fn default() -> Self {
        Self {
            names: ALLOWED_NAMES.iter().map(|s| s.to_string()).collect(),
            prefixes: ALLOWED_PREFIXES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl EnvAllowlist {
    pub fn allows(&self, key: &str) -> bool {
        self.names.iter().any(|n| n == key) || self.prefixes.iter().any(|p| key.starts_with(p.as_str()))
    }

    /// Keep only allowlisted pairs. Keys that are not valid UTF-8 are dropped.
    pub fn filter<I>(&self, vars: I) -> Vec<(OsString, OsString)>
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        vars.into_iter()
            .filter(|(key, _)| key.to_str().is_some_and(|k| self.allows(k)))
            .collect()
    }

    /// Allowlisted subset of the current process environment
    pub fn current(&self) -> Vec<(OsString, OsString)> {
        self.filter(std::env::vars_os())
    }
}
