//! JSON body encoder.

use super::{BodyEncoder, EncodeError, EncodedBody};
use crate::path::Locator;
use crate::transform::Transform;
use serde_json::Value;

/// JSON body encoder.
///
/// Re-serialization goes through `serde_json`, which leaves `<`, `>` and `&`
/// unescaped, so probe values carrying markup survive byte-for-byte.
pub struct JsonEncoder<'a> {
    /// Parsed template document
    document: &'a Value,
}

impl<'a> JsonEncoder<'a> {
    /// Create an encoder over a parsed JSON document.
    pub fn new(document: &'a Value) -> Self {
        Self { document }
    }
}

impl BodyEncoder for JsonEncoder<'_> {
    fn encode(&self, transform: Option<&Transform>) -> Result<EncodedBody, EncodeError> {
        let mut document = self.document.clone();

        if let Some(transform) = transform.filter(|t| t.targets_body()) {
            let locator = Locator::parse(&transform.key)?;
            locator.set(&mut document, Value::String(transform.value.clone()))?;
        }

        let bytes = serde_json::to_vec(&document)?;
        Ok(EncodedBody {
            length: bytes.len(),
            content_type: "application/json".to_string(),
            bytes,
        })
    }

    fn name(&self) -> &'static str {
        "json"
    }
}
