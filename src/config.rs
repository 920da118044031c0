//! Configuration for mutation producers.
//!
//! The engine itself never reads this configuration: it is handed to the
//! [`TransformProducer`](crate::TransformProducer) deciding which part/key
//! pairs are worth mutating and with which payloads.

use crate::transform::Part;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid key pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Mutation-producer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ForgeConfig {
    /// Payloads appended to a discovered value; producers use these to keep
    /// the original data and add the payload after it.
    pub append: Vec<String>,

    /// Payloads replacing a discovered value outright.
    pub replace: Vec<String>,

    /// Maximum document nesting depth to descend into when enumerating
    /// structural (JSON/XML) mutation points.
    pub max_depth: usize,

    /// Parts eligible for mutation. Empty means `default`, which covers
    /// everything except the path and cookies; `all` covers every part;
    /// any other value overrides the default with the listed parts.
    pub parts: Vec<Part>,

    /// Per-part fine-grained configuration, keyed by part wire name.
    pub parts_config: HashMap<String, Vec<PartConfig>>,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            append: Vec::new(),
            replace: Vec::new(),
            max_depth: 10,
            parts: Vec::new(),
            parts_config: HashMap::new(),
        }
    }
}

impl ForgeConfig {
    /// Parse a YAML configuration string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parse a JSON configuration string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Whether a concrete part is eligible for mutation under this
    /// configuration.
    pub fn part_enabled(&self, part: Part) -> bool {
        if self.parts.is_empty() {
            return default_part(part);
        }
        if self.parts.contains(&Part::All) {
            return true;
        }
        if self.parts.contains(&Part::Default) && default_part(part) {
            return true;
        }
        self.parts.contains(&part)
    }

    /// Whether a key within a part passes the part's fine-grained filters.
    /// A part with no configuration accepts every key.
    pub fn key_allowed(&self, part: Part, key: &str) -> Result<bool, ConfigError> {
        let Some(configs) = self.parts_config.get(part.as_str()) else {
            return Ok(true);
        };
        if configs.is_empty() {
            return Ok(true);
        }
        for config in configs {
            if config.allows(key)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// The `default` part set: everything except the path and cookies.
fn default_part(part: Part) -> bool {
    !matches!(part, Part::Path | Part::Cookies)
}

/// Fine-grained key filter for one part.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PartConfig {
    /// Exact key names to accept, compared case-insensitively.
    pub keys: Option<Vec<String>>,

    /// Regex accepting key names.
    pub key_pattern: Option<String>,
}

impl PartConfig {
    /// Whether a key passes this filter. An empty filter accepts every key.
    pub fn allows(&self, key: &str) -> Result<bool, ConfigError> {
        if let Some(keys) = &self.keys {
            if keys.iter().any(|k| k.eq_ignore_ascii_case(key)) {
                return Ok(true);
            }
        }
        if let Some(pattern) = &self.key_pattern {
            if Regex::new(pattern)?.is_match(key) {
                return Ok(true);
            }
        }
        Ok(self.keys.is_none() && self.key_pattern.is_none())
    }
}
