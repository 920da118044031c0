//! Request assembly.
//!
//! The assembler walks the mutation sequence in producer order and rebuilds
//! one full request per mutation: the targeted location carries the injected
//! value, everything else is copied from the template. Encoder failures skip
//! the affected mutation; a malformed method or URL aborts the whole run.

use crate::config::ForgeConfig;
use crate::encoder::{
    BodyEncoder, EncodeError, EncodedBody, FormEncoder, JsonEncoder, MultipartEncoder, XmlEncoder,
};
use crate::request::{Body, ProbeRequest, Template, ValueMap};
use crate::transform::{Part, Transform, TransformProducer};
use thiserror::Error;
use tracing::{debug, warn};
use url::{form_urlencoded, Url};

/// Errors that abort an assembly run.
///
/// Unlike encoder failures, which skip a single mutation, these leave the
/// remainder of the mutation sequence unprocessed.
#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("invalid request url: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid http method: {0:?}")]
    Method(String),
}

/// Builds one concrete request per mutation descriptor and hands each to a
/// consumer callback.
pub struct Assembler {
    config: ForgeConfig,
}

impl Assembler {
    /// Create an assembler with the given producer configuration.
    pub fn new(config: ForgeConfig) -> Self {
        Self { config }
    }

    /// The configuration handed to producers.
    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    /// Assemble one request per mutation and emit it to the consumer,
    /// strictly in producer order. The consumer owns each request's body
    /// buffer; its side effects are opaque to the assembler, and it
    /// completes before the next mutation is processed.
    ///
    /// Returns the number of emitted requests. Mutations whose body fails
    /// to encode are logged and skipped; see [`AssembleError`] for the
    /// failures that abort the run instead.
    pub fn run<F>(
        &self,
        template: &Template,
        producer: &dyn TransformProducer,
        mut consumer: F,
    ) -> Result<usize, AssembleError>
    where
        F: FnMut(ProbeRequest),
    {
        let transforms = producer.transforms(template, &self.config);
        debug!(mutations = transforms.len(), "assembling mutated requests");

        let mut emitted = 0;
        for transform in &transforms {
            let encoded = match encode_body(template, transform) {
                Ok(encoded) => encoded,
                Err(error) => {
                    warn!(
                        encoder = encoder_name(&template.body),
                        part = %transform.part,
                        key = %transform.key,
                        error = %error,
                        "could not encode request body for mutation, skipping"
                    );
                    continue;
                }
            };

            let request = build_request(template, transform, encoded)?;
            consumer(request);
            emitted += 1;
        }
        Ok(emitted)
    }
}

fn encoder_name(body: &Body) -> &'static str {
    match body {
        Body::Multipart(fields) => MultipartEncoder::new(fields).name(),
        Body::Form(fields) => FormEncoder::new(fields).name(),
        Body::Json(document) => JsonEncoder::new(document).name(),
        Body::Xml(document) => XmlEncoder::new(document).name(),
        Body::Raw(_) => "raw",
        Body::None => "none",
    }
}

/// Encode the template's body for one mutation. The `Body` variant decides
/// the encoder; raw bodies pass through unmutated with the template's own
/// content type, and an absent body encodes to nothing.
fn encode_body(template: &Template, transform: &Transform) -> Result<EncodedBody, EncodeError> {
    match &template.body {
        Body::Multipart(fields) => MultipartEncoder::new(fields).encode(Some(transform)),
        Body::Form(fields) => FormEncoder::new(fields).encode(Some(transform)),
        Body::Json(document) => JsonEncoder::new(document).encode(Some(transform)),
        Body::Xml(document) => XmlEncoder::new(document).encode(Some(transform)),
        Body::Raw(raw) => Ok(EncodedBody {
            bytes: raw.clone().into_bytes(),
            length: raw.len(),
            content_type: template.header("Content-Type").unwrap_or_default().to_string(),
        }),
        Body::None => Ok(EncodedBody {
            bytes: Vec::new(),
            length: 0,
            content_type: String::new(),
        }),
    }
}

fn build_request(
    template: &Template,
    transform: &Transform,
    encoded: EncodedBody,
) -> Result<ProbeRequest, AssembleError> {
    let EncodedBody {
        bytes: body,
        length,
        content_type,
    } = encoded;

    if !is_valid_method(&template.method) {
        return Err(AssembleError::Method(template.method.clone()));
    }

    let path = if transform.part == Part::Path {
        transform.value.as_str()
    } else {
        template.path.as_str()
    };
    let mut url = Url::parse(&format!("{}://{}{}", template.scheme, template.host, path))?;

    // query values are re-encoded from the mapping, so percent-encoding and
    // pair ordering may differ from the template's original raw query
    let query = mutated_values(&template.query, transform, &[Part::QueryValues, Part::All, Part::Default]);
    if !query.is_empty() {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (name, values) in &query {
            for value in values {
                serializer.append_pair(name, value);
            }
        }
        url.set_query(Some(&serializer.finish()));
    }

    // headers are added, not overwritten: template duplicates stay duplicated
    let mut headers: Vec<(String, String)> = Vec::new();
    for (name, values) in &template.headers {
        if matches!(transform.part, Part::Headers | Part::All | Part::Default)
            && transform.matches_key(name)
        {
            headers.push((name.clone(), transform.value.clone()));
        } else {
            for value in values {
                headers.push((name.clone(), value.clone()));
            }
        }
    }

    // an explicit template Content-Length wins over the encoded length
    // whenever the encoder produced a body
    let content_length = match template.header("Content-Length") {
        Some(declared) if length != 0 => declared.trim().parse().unwrap_or(length),
        _ => length,
    };

    let content_type = if content_type.is_empty() {
        None
    } else {
        Some(content_type)
    };
    if let Some(content_type) = &content_type {
        headers.retain(|(name, _)| !name.eq_ignore_ascii_case("Content-Type"));
        headers.push(("Content-Type".to_string(), content_type.clone()));
    }

    let cookies = mutated_values(&template.cookies, transform, &[Part::Cookies, Part::All]);
    let cookie = cookies
        .iter()
        .flat_map(|(name, values)| values.iter().map(move |value| format!("{}={}", name, value)))
        .collect::<Vec<_>>()
        .join("; ");
    if !cookie.is_empty() {
        headers.retain(|(name, _)| !name.eq_ignore_ascii_case("Cookie"));
        headers.push(("Cookie".to_string(), cookie));
    }

    Ok(ProbeRequest {
        method: template.method.clone(),
        url,
        headers,
        body,
        content_length,
        content_type,
    })
}

/// Copy a multi-valued mapping, collapsing the mutation's matching key to
/// the single injected value when the mutation targets one of `parts`.
fn mutated_values(source: &ValueMap, transform: &Transform, parts: &[Part]) -> ValueMap {
    let mut values = source.clone();
    if parts.contains(&transform.part) {
        if let Some(name) = values.keys().find(|name| transform.matches_key(name)).cloned() {
            values.insert(name, vec![transform.value.clone()]);
        }
    }
    values
}

/// RFC 7230 token check for the method.
fn is_valid_method(method: &str) -> bool {
    !method.is_empty()
        && method.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(
                    b,
                    b'!' | b'#'
                        | b'$'
                        | b'%'
                        | b'&'
                        | b'\''
                        | b'*'
                        | b'+'
                        | b'-'
                        | b'.'
                        | b'^'
                        | b'_'
                        | b'`'
                        | b'|'
                        | b'~'
                )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::MultipartField;
    use crate::transform::StaticTransforms;
    use serde_json::json;

    fn collect(
        template: &Template,
        transforms: Vec<Transform>,
    ) -> Result<Vec<ProbeRequest>, AssembleError> {
        let assembler = Assembler::new(ForgeConfig::default());
        let producer = StaticTransforms(transforms);
        let mut requests = Vec::new();
        assembler.run(template, &producer, |request| requests.push(request))?;
        Ok(requests)
    }

    fn base_template() -> Template {
        Template::new("POST", "https", "example.com", "/submit")
            .with_header("Accept", "text/html")
            .with_cookie("a", "1")
            .with_cookie("b", "2")
    }

    #[test]
    fn test_cookie_header_round_trip() {
        let template = base_template();
        let requests = collect(
            &template,
            vec![Transform::new(Part::Body, "missing", "x")],
        )
        .unwrap();

        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].header("Cookie"), Some("a=1; b=2"));
    }

    #[test]
    fn test_non_body_mutation_keeps_body_bytes() {
        let template = base_template().with_json_body(json!({"user": {"name": "alice"}}));

        let requests = collect(
            &template,
            vec![
                Transform::new(Part::Headers, "Accept", "x"),
                Transform::new(Part::Body, "user.name", "x"),
            ],
        )
        .unwrap();

        assert_eq!(requests[0].body, br#"{"user":{"name":"alice"}}"#);
        assert_eq!(requests[1].body, br#"{"user":{"name":"x"}}"#);
        assert_eq!(requests[0].header_values("Accept"), vec!["x"]);
    }

    #[test]
    fn test_query_mutation_and_reencoding() {
        let template = Template::new("GET", "http", "example.com", "/search")
            .with_query_param("tag", "a")
            .with_query_param("tag", "b")
            .with_query_param("q", "hello world");

        let requests = collect(
            &template,
            vec![Transform::new(Part::QueryValues, "TAG", "x")],
        )
        .unwrap();

        assert_eq!(
            requests[0].url.query(),
            Some("tag=x&q=hello+world")
        );
    }

    #[test]
    fn test_path_mutation_replaces_path() {
        let template = base_template();
        let requests = collect(
            &template,
            vec![Transform::new(Part::Path, "path", "/../../etc/passwd")],
        )
        .unwrap();
        assert_eq!(requests[0].url.path(), "/etc/passwd");
    }

    #[test]
    fn test_cookie_mutation() {
        let template = base_template();
        let requests = collect(
            &template,
            vec![Transform::new(Part::Cookies, "b", "tampered")],
        )
        .unwrap();
        assert_eq!(requests[0].header("Cookie"), Some("a=1; b=tampered"));
    }

    #[test]
    fn test_header_multiplicity_preserved() {
        let template = Template::new("GET", "http", "example.com", "/")
            .with_header("X-Dup", "one")
            .with_header("X-Dup", "two");

        let requests = collect(
            &template,
            vec![Transform::new(Part::Body, "missing", "x")],
        )
        .unwrap();
        assert_eq!(requests[0].header_values("X-Dup"), vec!["one", "two"]);
    }

    #[test]
    fn test_content_type_overrides_template_header() {
        let template = Template::new("POST", "http", "example.com", "/")
            .with_header("Content-Type", "text/plain")
            .with_form_field("q", "v");

        let requests = collect(
            &template,
            vec![Transform::new(Part::Body, "q", "x")],
        )
        .unwrap();
        assert_eq!(
            requests[0].header_values("Content-Type"),
            vec!["application/x-www-form-urlencoded"]
        );
    }

    #[test]
    fn test_template_content_length_wins_over_encoded_length() {
        let template = Template::new("POST", "http", "example.com", "/")
            .with_header("Content-Length", "9999")
            .with_form_field("q", "v");

        let requests = collect(
            &template,
            vec![Transform::new(Part::Body, "q", "x")],
        )
        .unwrap();
        assert_eq!(requests[0].content_length, 9999);
        assert_eq!(requests[0].body, b"q=x");
    }

    #[test]
    fn test_encoded_length_used_without_template_header() {
        let template = Template::new("POST", "http", "example.com", "/").with_form_field("q", "v");
        let requests = collect(
            &template,
            vec![Transform::new(Part::Body, "q", "xyz")],
        )
        .unwrap();
        assert_eq!(requests[0].content_length, 5);
    }

    #[test]
    fn test_encoder_failure_skips_only_that_mutation() {
        let template = Template::new("POST", "http", "example.com", "/")
            .with_json_body(json!({"user": {"name": "alice"}}));

        let assembler = Assembler::new(ForgeConfig::default());
        let producer = StaticTransforms(vec![
            Transform::new(Part::Body, "user.name", "first"),
            // unresolvable path: this one is skipped
            Transform::new(Part::Body, "account.id", "second"),
            Transform::new(Part::Body, "user.name", "third"),
        ]);

        let mut bodies = Vec::new();
        let emitted = assembler
            .run(&template, &producer, |request| bodies.push(request.body))
            .unwrap();

        assert_eq!(emitted, 2);
        assert_eq!(bodies[0], br#"{"user":{"name":"first"}}"#);
        assert_eq!(bodies[1], br#"{"user":{"name":"third"}}"#);
    }

    #[test]
    fn test_invalid_method_aborts_the_run() {
        let template = Template::new("GE T", "http", "example.com", "/");
        let assembler = Assembler::new(ForgeConfig::default());
        let producer = StaticTransforms(vec![
            Transform::new(Part::Headers, "a", "1"),
            Transform::new(Part::Headers, "b", "2"),
        ]);

        let mut emitted = 0;
        let result = assembler.run(&template, &producer, |_| emitted += 1);
        assert!(matches!(result, Err(AssembleError::Method(_))));
        assert_eq!(emitted, 0);
    }

    #[test]
    fn test_runs_are_deterministic() {
        let template = base_template()
            .with_query_param("q", "1")
            .with_multipart_body(vec![
                MultipartField::text("user", "alice"),
                MultipartField::file("avatar", "a.png", "bytes"),
            ]);
        let transforms = vec![
            Transform::new(Part::Body, "user", "payload"),
            Transform::new(Part::Cookies, "a", "payload"),
        ];

        let snapshot = |requests: &[ProbeRequest]| {
            requests
                .iter()
                .map(|r| (r.url.to_string(), r.headers.clone(), r.body.clone()))
                .collect::<Vec<_>>()
        };

        let first = collect(&template, transforms.clone()).unwrap();
        let second = collect(&template, transforms).unwrap();
        assert_eq!(snapshot(&first), snapshot(&second));
    }

    #[test]
    fn test_raw_body_passes_through() {
        let template = Template::new("POST", "http", "example.com", "/")
            .with_header("Content-Type", "text/plain")
            .with_raw_body("opaque payload");

        let requests = collect(
            &template,
            vec![Transform::new(Part::Body, "anything", "x")],
        )
        .unwrap();
        assert_eq!(requests[0].body, b"opaque payload");
        assert_eq!(requests[0].content_type.as_deref(), Some("text/plain"));
        assert_eq!(requests[0].content_length, 14);
    }

    #[test]
    fn test_is_valid_method() {
        assert!(is_valid_method("GET"));
        assert!(is_valid_method("PROPFIND"));
        assert!(is_valid_method("X-CUSTOM"));
        assert!(!is_valid_method(""));
        assert!(!is_valid_method("GE T"));
        assert!(!is_valid_method("GET/"));
    }
}
