//! Multipart body encoder.

use super::{BodyEncoder, EncodeError, EncodedBody};
use crate::request::MultipartField;
use crate::transform::Transform;
use std::io::Write;

/// Part boundary for every encoded multipart body.
///
/// Fixed rather than randomized: encoders must be idempotent, and two
/// assemblies of the same template have to produce byte-identical requests.
const BOUNDARY: &str = "4ee3828c94b7a8d2f0e516c9a37d";

/// Multipart body encoder.
pub struct MultipartEncoder<'a> {
    /// Template fields, in template order
    fields: &'a [MultipartField],
}

impl<'a> MultipartEncoder<'a> {
    /// Create an encoder over the template's multipart fields.
    pub fn new(fields: &'a [MultipartField]) -> Self {
        Self { fields }
    }
}

impl BodyEncoder for MultipartEncoder<'_> {
    fn encode(&self, transform: Option<&Transform>) -> Result<EncodedBody, EncodeError> {
        let mut body = Vec::new();

        for field in self.fields {
            let value = match transform {
                Some(t) if t.targets_body() && t.matches_key(&field.name) => t.value.as_str(),
                _ => field.value.as_str(),
            };
            write_part(&mut body, field, value)?;
        }
        write!(&mut body, "--{}--\r\n", BOUNDARY)?;

        Ok(EncodedBody {
            length: body.len(),
            content_type: format!("multipart/form-data; boundary={}", BOUNDARY),
            bytes: body,
        })
    }

    fn name(&self) -> &'static str {
        "multipart"
    }
}

/// Write one part. A field carrying a filename is written as a file part:
/// the original filename is preserved and the (possibly mutated) value
/// becomes the file content.
fn write_part<W: Write>(out: &mut W, field: &MultipartField, value: &str) -> std::io::Result<()> {
    write!(out, "--{}\r\n", BOUNDARY)?;
    match &field.filename {
        Some(filename) => {
            write!(
                out,
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                escape_quotes(&field.name),
                escape_quotes(filename)
            )?;
            write!(out, "Content-Type: application/octet-stream\r\n")?;
        }
        None => {
            write!(
                out,
                "Content-Disposition: form-data; name=\"{}\"\r\n",
                escape_quotes(&field.name)
            )?;
        }
    }
    write!(out, "\r\n{}\r\n", value)
}

fn escape_quotes(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}
