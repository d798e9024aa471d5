// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::cache::DEFAULT_CAPACITY;
use crate::schema::walker::DEFAULT_MAX_DEPTH;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Engine configuration.
///
/// ```json
/// { "cacheCapacity": 512, "failOnCycle": true, "maxDepth": 32 }
/// ```
///
/// Missing members take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct EngineOptions {
    /// Number of linkage results kept. Zero disables caching.
    pub cache_capacity: usize,
    /// Fail evaluation when the dependency graph has a cycle, instead of only
    /// notifying.
    pub fail_on_cycle: bool,
    /// Maximum schema nesting traversed before giving up.
    pub max_depth: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CAPACITY,
            fail_on_cycle: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl EngineOptions {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    #[cfg(feature = "yaml")]
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => bail!("Failed to read {path}. {e}"),
        };
        #[cfg(feature = "yaml")]
        if path.ends_with(".yaml") || path.ends_with(".yml") {
            return Self::from_yaml_str(&contents);
        }
        Self::from_json_str(&contents)
    }
}
