//! Configuration types for registry bootstrap

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::matcher::TargetIdentity;

/// Bootstrap configuration for a [`TargetRegistry`](crate::TargetRegistry).
///
/// Built-in default targets are the embedder's concern: they are passed here
/// as seed identities rather than baked into the library, so test registries
/// can start empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Identities of the targets created at bootstrap, in order
    #[serde(default)]
    pub seeds: Vec<TargetIdentity>,

    /// Optional mapping file extending or creating targets, one
    /// `<query>:<pattern>` rule per line. A missing file is not an error.
    #[serde(default)]
    pub mapping_file: Option<PathBuf>,
}

impl RegistryConfig {
    pub fn with_seeds(seeds: Vec<TargetIdentity>) -> Self {
        Self {
            seeds,
            mapping_file: None,
        }
    }

    pub fn with_mapping_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.mapping_file = Some(path.into());
        self
    }
}
