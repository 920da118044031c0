//! Mutation descriptors and the producer seam.

use crate::config::ForgeConfig;
use crate::request::Template;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Request part targeted by a mutation.
///
/// `All` and `Default` are selectors from the configuration vocabulary:
/// producers normally resolve them into concrete parts before emitting
/// descriptors, but the assembler accepts them directly (see
/// [`Assembler`](crate::Assembler)).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Part {
    /// Request path
    Path,
    /// Cookie values
    Cookies,
    /// Request body, in whichever encoding the template carries
    Body,
    /// Query parameter values
    QueryValues,
    /// Header values
    Headers,
    /// Every request part
    All,
    /// Everything except the path and cookies
    Default,
}

impl Part {
    /// Wire name of the part, as used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Part::Path => "path",
            Part::Cookies => "cookies",
            Part::Body => "body",
            Part::QueryValues => "query-values",
            Part::Headers => "headers",
            Part::All => "all",
            Part::Default => "default",
        }
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One mutation to apply to a template request.
///
/// Names exactly one field to replace within the targeted part and the value
/// to inject there. A descriptor is consumed once by the assembler and never
/// retained after the corresponding request has been built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transform {
    /// Targeted request part
    pub part: Part,
    /// Field name within the part; a structural path expression for
    /// JSON/XML bodies
    pub key: String,
    /// Value to inject
    pub value: String,
}

impl Transform {
    /// Create a new mutation descriptor.
    pub fn new(part: Part, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            part,
            key: key.into(),
            value: value.into(),
        }
    }

    /// Whether this mutation targets the request body.
    pub fn targets_body(&self) -> bool {
        self.part == Part::Body
    }

    /// Case-insensitive comparison of a field name against the mutation key.
    pub fn matches_key(&self, name: &str) -> bool {
        self.key.eq_ignore_ascii_case(name)
    }
}

/// Source of the ordered mutation sequence for a template request.
///
/// Implementations must be finite and deterministic: two calls with the same
/// template and configuration yield the same descriptors in the same order.
pub trait TransformProducer {
    /// Produce the mutation sequence for the given template.
    fn transforms(&self, template: &Template, config: &ForgeConfig) -> Vec<Transform>;
}

/// A fixed, pre-enumerated mutation sequence.
pub struct StaticTransforms(pub Vec<Transform>);

impl TransformProducer for StaticTransforms {
    fn transforms(&self, _template: &Template, _config: &ForgeConfig) -> Vec<Transform> {
        self.0.clone()
    }
}
