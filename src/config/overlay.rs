//! Overlay of defaults, the persisted document and environment overrides onto
//! caller-defined configuration types.

use crate::config::merge::merge_policy::{
    defaults_tree, env_key, env_value, leaves, merge_document, set_leaf,
};
use crate::config::sources::persisted_file::{locate, PersistedDocument};
use crate::config::Identification;
use crate::context::ProcessContext;
use crate::error::ConfigError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Parsed sources ready to be overlaid onto any number of targets.
///
/// Built once per run; the environment is a snapshot taken at construction.
#[derive(Debug, Clone)]
pub struct ConfigOverlay {
    env_prefix: String,
    document: Option<PersistedDocument>,
    env: BTreeMap<String, String>,
}

impl ConfigOverlay {
    /// Overlay with no persisted document: defaults plus environment only.
    pub fn new(identification: &Identification, ctx: &ProcessContext) -> Self {
        Self {
            env_prefix: identification.env_prefix(),
            document: None,
            env: ctx
                .vars()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Locate and parse the persisted document. Fails on a malformed document or
    /// a missing explicit path; a search that finds nothing is fine.
    pub fn load(
        identification: &Identification,
        ctx: &ProcessContext,
        explicit: Option<&Path>,
        search: bool,
    ) -> Result<Self, ConfigError> {
        let overlay = Self::new(identification, ctx);
        match locate(explicit, search, &identification.name, ctx)? {
            Some(path) => Ok(overlay.with_document(PersistedDocument::parse(&path)?)),
            None => Ok(overlay),
        }
    }

    pub fn with_document(mut self, document: PersistedDocument) -> Self {
        self.document = Some(document);
        self
    }

    pub fn document_path(&self) -> Option<&Path> {
        self.document.as_ref().map(PersistedDocument::path)
    }

    /// Environment variable consulted for a dotted key path.
    pub fn env_key(&self, path: &str) -> String {
        env_key(&self.env_prefix, path)
    }

    /// Merge all layers onto `target`. The current value of `target` is the
    /// default layer. `target` is only written when the whole merge succeeds.
    pub fn apply<T>(&self, target: &mut T) -> Result<(), ConfigError>
    where
        T: Serialize + DeserializeOwned,
    {
        let mut tree = defaults_tree(&*target)?;
        if let Some(document) = &self.document {
            merge_document(&mut tree, document.tree()?);
        }

        for (path, leaf) in leaves(&tree) {
            let key = path.join(".");
            let var = self.env_key(&key);
            if let Some(raw) = self.env.get(&var) {
                set_leaf(&mut tree, &path, env_value(&var, raw, &leaf)?);
                debug!(var = %var, key = %key, "Applied environment override");
            }
        }

        *target = serde_json::from_value(tree)?;
        Ok(())
    }
}
