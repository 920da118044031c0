//! Body encoders.
//!
//! One encoder per body encoding (multipart, URL-encoded form, JSON, XML).
//! Each takes the template's body data plus at most one mutation descriptor
//! and produces the encoded bytes, their length and the content type to
//! advertise. Encoders are stateless and idempotent: identical inputs always
//! produce identical output bytes.

mod form;
mod json;
mod multipart;
pub mod xml;

pub use form::FormEncoder;
pub use json::JsonEncoder;
pub use multipart::MultipartEncoder;
pub use xml::{XmlEncoder, XmlError};

use crate::path::PathError;
use crate::transform::Transform;
use thiserror::Error;

/// A fully encoded request body.
#[derive(Debug, Clone)]
pub struct EncodedBody {
    /// Encoded body bytes
    pub bytes: Vec<u8>,
    /// Byte length of the encoded body
    pub length: usize,
    /// Content type to advertise for this body; empty when the encoding
    /// carries none
    pub content_type: String,
}

/// Errors raised while encoding a body for one mutation.
///
/// These are soft failures: the assembler logs them and skips the affected
/// mutation without aborting the batch.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The mutation key could not be parsed or resolved as a structural
    /// path.
    #[error("could not apply mutation path: {0}")]
    Path(#[from] PathError),

    /// JSON re-serialization failed.
    #[error("could not write json body: {0}")]
    Json(#[from] serde_json::Error),

    /// XML re-serialization failed.
    #[error("could not write xml body: {0}")]
    Xml(#[from] XmlError),

    /// A body writer failed.
    #[error("could not write body: {0}")]
    Write(#[from] std::io::Error),
}

/// Common contract of the four body encoders.
pub trait BodyEncoder {
    /// Encode the body, applying the mutation when it targets the body and
    /// its key matches.
    fn encode(&self, transform: Option<&Transform>) -> Result<EncodedBody, EncodeError>;

    /// Encoder name, used in skip diagnostics.
    fn name(&self) -> &'static str;
}
