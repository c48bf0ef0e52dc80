//! Process context: the environment snapshot and working directory threaded
//! through overlay, initializers and the command body instead of touching
//! `std::env` directly.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Explicit, mutable view of the process environment for one run.
#[derive(Debug, Clone, Default)]
pub struct ProcessContext {
    env: BTreeMap<String, String>,
    cwd: PathBuf,
}

impl ProcessContext {
    /// Snapshot the real process environment and working directory.
    pub fn from_env() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::from_vars_os(std::env::vars_os(), cwd)
    }

    /// Build a context from raw environment pairs. Pairs that are not valid
    /// Unicode are skipped.
    pub fn from_vars_os<I>(vars: I, cwd: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        Self {
            env: vars
                .into_iter()
                .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
                .collect(),
            cwd: cwd.into(),
        }
    }

    /// Empty environment rooted at `cwd`.
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            env: BTreeMap::new(),
            cwd: cwd.into(),
        }
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_var(key, value);
        self
    }

    pub fn var(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }

    pub fn set_var(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.env.insert(key.into(), value.into());
    }

    pub fn remove_var(&mut self, key: &str) -> Option<String> {
        self.env.remove(key)
    }

    pub fn vars(&self) -> impl Iterator<Item = (&str, &str)> {
        self.env.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn set_cwd(&mut self, cwd: impl Into<PathBuf>) {
        self.cwd = cwd.into();
    }

    /// `$HOME`, ignoring empty values.
    pub fn home_dir(&self) -> Option<PathBuf> {
        self.var("HOME").filter(|v| !v.is_empty()).map(PathBuf::from)
    }

    /// `$XDG_CONFIG_HOME`, ignoring empty values.
    pub fn xdg_config_home(&self) -> Option<PathBuf> {
        self.var("XDG_CONFIG_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }
}
