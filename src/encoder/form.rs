//! URL-encoded form body encoder.

use super::{BodyEncoder, EncodeError, EncodedBody};
use crate::transform::Transform;
use indexmap::IndexMap;
use url::form_urlencoded;

/// URL-encoded form body encoder.
pub struct FormEncoder<'a> {
    /// Template fields with their multi-valued entries, in template order
    fields: &'a IndexMap<String, Vec<String>>,
}

impl<'a> FormEncoder<'a> {
    /// Create an encoder over the template's form fields.
    pub fn new(fields: &'a IndexMap<String, Vec<String>>) -> Self {
        Self { fields }
    }
}

impl BodyEncoder for FormEncoder<'_> {
    fn encode(&self, transform: Option<&Transform>) -> Result<EncodedBody, EncodeError> {
        let mut serializer = form_urlencoded::Serializer::new(String::new());

        for (name, values) in self.fields {
            match transform {
                // a mutated field collapses to the single injected value
                Some(t) if t.targets_body() && t.matches_key(name) => {
                    serializer.append_pair(name, &t.value);
                }
                _ => {
                    for value in values {
                        serializer.append_pair(name, value);
                    }
                }
            }
        }

        let bytes = serializer.finish().into_bytes();
        Ok(EncodedBody {
            length: bytes.len(),
            content_type: "application/x-www-form-urlencoded".to_string(),
            bytes,
        })
    }

    fn name(&self) -> &'static str {
        "form"
    }
}
