//! Persisted config file source: an explicit path, or the first match among
//! `./.<name>.<ext>`, `./.<name>/config.<ext>`,
//! `$XDG_CONFIG_HOME/<name>/config.<ext>` and `~/.config/<name>/config.<ext>`.

use crate::context::ProcessContext;
use crate::error::ConfigError;
use config::{Config, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Supported document extensions, in search order.
pub const EXTENSIONS: [&str; 4] = ["toml", "yaml", "yml", "json"];

/// A parsed persisted configuration document.
#[derive(Debug, Clone)]
pub struct PersistedDocument {
    path: PathBuf,
    config: Config,
}

impl PersistedDocument {
    /// Parse the document at `path`. The format follows the file extension.
    pub fn parse(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let config = Config::builder()
            .add_source(File::from(path).required(true))
            .build()
            .map_err(|source| ConfigError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(config_path = %path.display(), "Loaded configuration file");
        Ok(Self {
            path: path.to_path_buf(),
            config,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The parsed document as a JSON tree, ready to be merged.
    pub fn tree(&self) -> Result<serde_json::Value, ConfigError> {
        self.config
            .clone()
            .try_deserialize()
            .map_err(|source| ConfigError::Malformed {
                path: self.path.clone(),
                source,
            })
    }
}

/// Candidate locations for `app_name`, most specific first.
pub fn candidate_paths(app_name: &str, ctx: &ProcessContext) -> Vec<PathBuf> {
    let mut dirs: Vec<(PathBuf, String)> = vec![
        (ctx.cwd().to_path_buf(), format!(".{}", app_name)),
        (ctx.cwd().join(format!(".{}", app_name)), "config".to_string()),
    ];
    if let Some(xdg) = ctx.xdg_config_home() {
        dirs.push((xdg.join(app_name), "config".to_string()));
    }
    if let Some(home) = ctx.home_dir() {
        dirs.push((home.join(".config").join(app_name), "config".to_string()));
    }

    dirs.into_iter()
        .flat_map(|(dir, stem)| {
            EXTENSIONS
                .iter()
                .map(move |ext| dir.join(format!("{}.{}", stem, ext)))
        })
        .collect()
}

/// Resolve which document to load. An explicit path must exist; otherwise the
/// first existing candidate wins and finding none is not an error.
pub fn locate(
    explicit: Option<&Path>,
    search: bool,
    app_name: &str,
    ctx: &ProcessContext,
) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(path) = explicit {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            ctx.cwd().join(path)
        };
        if !path.is_file() {
            return Err(ConfigError::NotFound(path));
        }
        return Ok(Some(path));
    }
    if !search {
        return Ok(None);
    }

    let found = candidate_paths(app_name, ctx)
        .into_iter()
        .find(|candidate| candidate.is_file());
    if found.is_none() {
        debug!(app = app_name, "No configuration file found, using defaults");
    }
    Ok(found)
}
