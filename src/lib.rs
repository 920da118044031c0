//! Request reconstruction and body-mutation engine for vulnerability
//! probing.
//!
//! Given a template HTTP request and an ordered sequence of mutation
//! descriptors, the engine rebuilds one concrete request per descriptor,
//! differing from the template at exactly the targeted location:
//!
//! - Multipart, URL-encoded form, JSON and XML bodies are re-encoded with
//!   the injected value in place and every other field preserved
//! - JSON/XML mutation points are addressed with dotted/indexed path
//!   expressions (`user.name`, `items[2].sku`)
//! - Headers, cookies, query values and the path can be targeted directly
//! - Constructed requests are handed to a caller-supplied consumer,
//!   synchronously and in producer order
//!
//! Payload bytes survive re-encoding untouched where the wire format allows
//! it: JSON re-serialization leaves markup characters unescaped, so a probe
//! value like `<script>` reaches the target verbatim.
//!
//! ## Example
//!
//! ```
//! use request_forge::{Assembler, ForgeConfig, Part, StaticTransforms, Template, Transform};
//!
//! let template = Template::new("POST", "https", "example.com", "/login")
//!     .with_header("Accept", "application/json")
//!     .with_json_body(serde_json::json!({"user": {"name": "alice"}, "id": 7}));
//!
//! let producer = StaticTransforms(vec![
//!     Transform::new(Part::Body, "user.name", "' OR 1=1--"),
//! ]);
//!
//! let assembler = Assembler::new(ForgeConfig::default());
//! let mut bodies = Vec::new();
//! assembler
//!     .run(&template, &producer, |request| bodies.push(request.body))
//!     .unwrap();
//!
//! assert_eq!(bodies.len(), 1);
//! ```

pub mod builder;
pub mod config;
pub mod encoder;
pub mod path;
pub mod request;
pub mod transform;

pub use builder::{AssembleError, Assembler};
pub use config::{ConfigError, ForgeConfig, PartConfig};
pub use encoder::{BodyEncoder, EncodeError, EncodedBody};
pub use path::{Locator, PathError};
pub use request::{Body, MultipartField, ProbeRequest, Template, ValueMap};
pub use transform::{Part, StaticTransforms, Transform, TransformProducer};
