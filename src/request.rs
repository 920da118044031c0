//! Template request and constructed request types.

use crate::encoder::xml::{self, XmlError};
use indexmap::IndexMap;
use serde_json::Value;
use url::Url;

/// Ordered multi-valued mapping for headers, cookies, query parameters and
/// form fields. Insertion order is the mapping-iteration order every
/// serialization step follows, which keeps assembly deterministic.
pub type ValueMap = IndexMap<String, Vec<String>>;

/// The single body representation carried by a template.
///
/// A closed variant set: a template can never hold two populated body
/// encodings at once, so encoder selection is a plain match instead of a
/// first-non-empty-wins scan. Variants are declared in selection-priority
/// order (multipart, form, JSON, XML, raw).
#[derive(Debug, Clone)]
pub enum Body {
    /// No body
    None,
    /// `multipart/form-data` fields, in template order
    Multipart(Vec<MultipartField>),
    /// `application/x-www-form-urlencoded` fields
    Form(ValueMap),
    /// Parsed JSON document
    Json(Value),
    /// Parsed XML document in map shape (see [`crate::encoder::xml`])
    Xml(Value),
    /// Opaque body, passed through without mutation
    Raw(String),
}

impl Body {
    /// Whether the template carries no body.
    pub fn is_none(&self) -> bool {
        matches!(self, Body::None)
    }
}

/// One multipart field of a template body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartField {
    /// Field name
    pub name: String,
    /// Present for file parts; preserved verbatim under mutation
    pub filename: Option<String>,
    /// Field value, or file content for file parts
    pub value: String,
}

impl MultipartField {
    /// A plain text field.
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filename: None,
            value: value.into(),
        }
    }

    /// A file field with its filename and content.
    pub fn file(
        name: impl Into<String>,
        filename: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            filename: Some(filename.into()),
            value: content.into(),
        }
    }
}

/// The unmutated request definition supplying every field a mutation does
/// not target.
#[derive(Debug, Clone)]
pub struct Template {
    /// URL scheme (`http`, `https`)
    pub scheme: String,
    /// Host, optionally with a port
    pub host: String,
    /// Request path
    pub path: String,
    /// HTTP method
    pub method: String,
    /// Headers; names keep their stored casing, lookups are
    /// case-insensitive
    pub headers: ValueMap,
    /// Cookies
    pub cookies: ValueMap,
    /// Query parameters
    pub query: ValueMap,
    /// Body representation
    pub body: Body,
}

impl Template {
    /// Create a bodiless template.
    pub fn new(
        method: impl Into<String>,
        scheme: impl Into<String>,
        host: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            path: path.into(),
            method: method.into(),
            headers: ValueMap::new(),
            cookies: ValueMap::new(),
            query: ValueMap::new(),
            body: Body::None,
        }
    }

    /// Add a header value, preserving earlier values for the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.entry(name.into()).or_default().push(value.into());
        self
    }

    /// Add a cookie value.
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.entry(name.into()).or_default().push(value.into());
        self
    }

    /// Add a query parameter value.
    pub fn with_query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.entry(name.into()).or_default().push(value.into());
        self
    }

    /// Merge a raw query string (`a=1&b=2`), percent-decoding keys and
    /// values into the query mapping.
    pub fn with_query_string(mut self, query: &str) -> Self {
        for part in query.split('&') {
            if let Some((k, v)) = part.split_once('=') {
                let key = urlencoding::decode(k).unwrap_or_else(|_| k.into()).to_string();
                let value = urlencoding::decode(v).unwrap_or_else(|_| v.into()).to_string();
                self.query.entry(key).or_default().push(value);
            } else if !part.is_empty() {
                let key = urlencoding::decode(part)
                    .unwrap_or_else(|_| part.into())
                    .to_string();
                self.query.entry(key).or_default().push(String::new());
            }
        }
        self
    }

    /// Set the body representation.
    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// Set a multipart body.
    pub fn with_multipart_body(self, fields: Vec<MultipartField>) -> Self {
        self.with_body(Body::Multipart(fields))
    }

    /// Add a form field value, switching the body to the form encoding.
    pub fn with_form_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Body::Form(fields) = &mut self.body {
            fields.entry(name.into()).or_default().push(value.into());
        } else {
            let mut fields = ValueMap::new();
            fields.entry(name.into()).or_default().push(value.into());
            self.body = Body::Form(fields);
        }
        self
    }

    /// Set a parsed JSON document as the body.
    pub fn with_json_body(self, document: Value) -> Self {
        self.with_body(Body::Json(document))
    }

    /// Parse XML text into its map representation and set it as the body.
    pub fn with_xml_body(self, xml: &str) -> Result<Self, XmlError> {
        let document = xml::parse_document(xml)?;
        Ok(self.with_body(Body::Xml(document)))
    }

    /// Set an opaque raw body.
    pub fn with_raw_body(self, body: impl Into<String>) -> Self {
        self.with_body(Body::Raw(body.into()))
    }

    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(stored, _)| stored.eq_ignore_ascii_case(name))
            .and_then(|(_, values)| values.first())
            .map(String::as_str)
    }
}

/// A fully-formed request built for one mutation.
///
/// Ephemeral: it has no identity beyond the consumer callback invocation
/// that receives it, and the body buffer is owned by whoever holds the
/// value.
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    /// HTTP method
    pub method: String,
    /// Absolute request URL, query included
    pub url: Url,
    /// Headers in emission order, duplicates preserved
    pub headers: Vec<(String, String)>,
    /// Encoded body bytes
    pub body: Vec<u8>,
    /// Advertised content length
    pub content_length: usize,
    /// Advertised content type, when the body carries one
    pub content_type: Option<String>,
}

impl ProbeRequest {
    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(stored, _)| stored.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Every value of a header, matched case-insensitively.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(stored, _)| stored.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_accumulates_multi_values() {
        let template = Template::new("GET", "https", "example.com", "/search")
            .with_header("Accept", "text/html")
            .with_header("Accept", "application/json")
            .with_query_param("tag", "a")
            .with_query_param("tag", "b")
            .with_cookie("session", "s1");

        assert_eq!(template.headers["Accept"].len(), 2);
        assert_eq!(template.query["tag"], vec!["a", "b"]);
        assert_eq!(template.cookies["session"], vec!["s1"]);
        assert!(template.body.is_none());
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let template =
            Template::new("GET", "http", "example.com", "/").with_header("Content-Type", "text/plain");
        assert_eq!(template.header("content-type"), Some("text/plain"));
        assert_eq!(template.header("CONTENT-TYPE"), Some("text/plain"));
        assert_eq!(template.header("x-missing"), None);
    }

    #[test]
    fn test_query_string_is_decoded() {
        let template = Template::new("GET", "http", "example.com", "/")
            .with_query_string("name=hello%20world&flag&tag=a&tag=b");
        assert_eq!(template.query["name"], vec!["hello world"]);
        assert_eq!(template.query["flag"], vec![""]);
        assert_eq!(template.query["tag"], vec!["a", "b"]);
    }

    #[test]
    fn test_form_fields_accumulate() {
        let template = Template::new("POST", "http", "example.com", "/")
            .with_form_field("tag", "a")
            .with_form_field("tag", "b")
            .with_form_field("other", "1");
        match &template.body {
            Body::Form(fields) => {
                assert_eq!(fields["tag"], vec!["a", "b"]);
                assert_eq!(fields["other"], vec!["1"]);
            }
            other => panic!("expected a form body, got {:?}", other),
        }
    }

    #[test]
    fn test_xml_body_parses_eagerly() {
        let template = Template::new("POST", "http", "example.com", "/")
            .with_xml_body("<user><name>alice</name></user>")
            .unwrap();
        match &template.body {
            Body::Xml(document) => {
                assert_eq!(document, &json!({"user": {"name": "alice"}}));
            }
            other => panic!("expected an xml body, got {:?}", other),
        }

        let malformed = Template::new("POST", "http", "example.com", "/").with_xml_body("<a><b>");
        assert!(malformed.is_err());
    }
}
