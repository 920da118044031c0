//! XML body encoder and the map-document XML codec.
//!
//! XML bodies are held as [`serde_json::Value`] documents so that the same
//! path grammar drives mutation for both JSON and XML: an element becomes an
//! object, attributes become `@name` keys, repeated sibling elements become
//! arrays, and element text becomes either a plain string (text-only
//! element) or a `#text` key (mixed with attributes or children). The codec
//! covers the declarative subset produced by that mapping; processing
//! instructions, comments and DOCTYPE declarations are skipped on input and
//! never re-emitted.

use super::{BodyEncoder, EncodeError, EncodedBody};
use crate::path::Locator;
use crate::transform::Transform;
use serde_json::map::Entry;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised by the XML codec.
#[derive(Debug, Error)]
pub enum XmlError {
    /// Structurally invalid input.
    #[error("malformed xml: {0}")]
    Malformed(String),

    /// Input ended inside a tag, text run or entity.
    #[error("unexpected end of xml input")]
    UnexpectedEof,

    /// A closing tag did not match the element it closes.
    #[error("mismatched closing tag: expected </{expected}>, found </{found}>")]
    MismatchedTag { expected: String, found: String },
}

/// XML body encoder.
pub struct XmlEncoder<'a> {
    /// Parsed template document
    document: &'a Value,
}

impl<'a> XmlEncoder<'a> {
    /// Create an encoder over a parsed XML document.
    pub fn new(document: &'a Value) -> Self {
        Self { document }
    }
}

impl BodyEncoder for XmlEncoder<'_> {
    fn encode(&self, transform: Option<&Transform>) -> Result<EncodedBody, EncodeError> {
        let mut document = self.document.clone();

        if let Some(transform) = transform.filter(|t| t.targets_body()) {
            let locator = Locator::parse(&transform.key)?;
            locator.set(&mut document, Value::String(transform.value.clone()))?;
        }

        let bytes = write_document(&document)?.into_bytes();
        Ok(EncodedBody {
            length: bytes.len(),
            content_type: "text/xml".to_string(),
            bytes,
        })
    }

    fn name(&self) -> &'static str {
        "xml"
    }
}

/// Parse an XML document into its map representation.
///
/// The returned value is an object with exactly one key, the document
/// element.
pub fn parse_document(input: &str) -> Result<Value, XmlError> {
    let mut reader = Reader { src: input, pos: 0 };
    reader.skip_misc();
    let (name, value) = reader.parse_element()?;
    reader.skip_misc();
    if reader.pos != reader.src.len() {
        return Err(XmlError::Malformed(
            "content after the document element".to_string(),
        ));
    }

    let mut document = Map::new();
    document.insert(name, value);
    Ok(Value::Object(document))
}

/// Serialize a map-shaped document back to XML text.
pub fn write_document(document: &Value) -> Result<String, XmlError> {
    let root = document
        .as_object()
        .filter(|map| map.len() == 1)
        .ok_or_else(|| {
            XmlError::Malformed("document must hold exactly one root element".to_string())
        })?;

    let mut out = String::new();
    for (name, value) in root {
        write_element(&mut out, name, value);
    }
    Ok(out)
}

struct Reader<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Reader<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    /// Skip whitespace, processing instructions, comments and DOCTYPE
    /// declarations between elements of the prolog/epilog.
    fn skip_misc(&mut self) {
        loop {
            self.skip_whitespace();
            if self.eat("<?") {
                if self.take_until("?>").is_err() {
                    return;
                }
            } else if self.eat("<!--") {
                if self.take_until("-->").is_err() {
                    return;
                }
            } else if self.rest().starts_with("<!DOCTYPE") {
                match self.rest().find('>') {
                    Some(i) => self.pos += i + 1,
                    None => {
                        self.pos = self.src.len();
                        return;
                    }
                }
            } else {
                return;
            }
        }
    }

    /// Consume up to and including `delim`, returning the content before it.
    fn take_until(&mut self, delim: &str) -> Result<&'a str, XmlError> {
        match self.rest().find(delim) {
            Some(i) => {
                let content = &self.src[self.pos..self.pos + i];
                self.pos += i + delim.len();
                Ok(content)
            }
            None => Err(XmlError::UnexpectedEof),
        }
    }

    /// Consume text up to (not including) the next `<`.
    fn take_text(&mut self) -> Result<&'a str, XmlError> {
        match self.rest().find('<') {
            Some(i) => {
                let content = &self.src[self.pos..self.pos + i];
                self.pos += i;
                Ok(content)
            }
            None => Err(XmlError::UnexpectedEof),
        }
    }

    fn read_name(&mut self) -> Result<&'a str, XmlError> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b':') {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(XmlError::Malformed(format!(
                "expected a name at offset {}",
                start
            )));
        }
        Ok(&self.src[start..self.pos])
    }

    fn parse_element(&mut self) -> Result<(String, Value), XmlError> {
        if !self.eat("<") {
            return Err(XmlError::Malformed(format!(
                "expected an element at offset {}",
                self.pos
            )));
        }
        let name = self.read_name()?.to_string();

        let mut attributes: Vec<(String, String)> = Vec::new();
        loop {
            self.skip_whitespace();
            if self.eat("/>") {
                return Ok((name, element_value(attributes, Vec::new(), String::new())));
            }
            if self.eat(">") {
                break;
            }
            let attribute = self.read_name()?.to_string();
            self.skip_whitespace();
            if !self.eat("=") {
                return Err(XmlError::Malformed(format!(
                    "expected '=' after attribute {:?}",
                    attribute
                )));
            }
            self.skip_whitespace();
            let quote = match self.peek() {
                Some(q @ (b'"' | b'\'')) => q,
                _ => {
                    return Err(XmlError::Malformed(format!(
                        "expected a quoted value for attribute {:?}",
                        attribute
                    )))
                }
            };
            self.pos += 1;
            let raw = self.take_until(if quote == b'"' { "\"" } else { "'" })?;
            attributes.push((attribute, decode_entities(raw)));
        }

        let mut children: Vec<(String, Value)> = Vec::new();
        let mut text = String::new();
        loop {
            if self.pos >= self.src.len() {
                return Err(XmlError::UnexpectedEof);
            }
            if self.eat("</") {
                let close = self.read_name()?;
                if close != name {
                    return Err(XmlError::MismatchedTag {
                        expected: name,
                        found: close.to_string(),
                    });
                }
                self.skip_whitespace();
                if !self.eat(">") {
                    return Err(XmlError::Malformed("unterminated closing tag".to_string()));
                }
                break;
            }
            if self.eat("<!--") {
                self.take_until("-->")?;
            } else if self.eat("<![CDATA[") {
                text.push_str(self.take_until("]]>")?);
            } else if self.peek() == Some(b'<') {
                children.push(self.parse_element()?);
            } else {
                let raw = self.take_text()?;
                text.push_str(&decode_entities(raw));
            }
        }

        Ok((name, element_value(attributes, children, text)))
    }
}

/// Fold attributes, children and text into a single element value.
fn element_value(
    attributes: Vec<(String, String)>,
    children: Vec<(String, Value)>,
    text: String,
) -> Value {
    let text = text.trim().to_string();
    if attributes.is_empty() && children.is_empty() {
        return Value::String(text);
    }

    let mut map = Map::new();
    for (name, value) in attributes {
        map.insert(format!("@{}", name), Value::String(value));
    }
    for (name, value) in children {
        match map.entry(name) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(slot) => match slot.into_mut() {
                Value::Array(items) => items.push(value),
                existing => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
            },
        }
    }
    if !text.is_empty() {
        map.insert("#text".to_string(), Value::String(text));
    }
    Value::Object(map)
}

fn write_element(out: &mut String, name: &str, value: &Value) {
    match value {
        // repeated siblings
        Value::Array(items) => {
            for item in items {
                write_element(out, name, item);
            }
        }
        Value::Object(map) => {
            out.push('<');
            out.push_str(name);
            for (key, attr) in map.iter().filter(|(key, _)| key.starts_with('@')) {
                out.push(' ');
                out.push_str(&key[1..]);
                out.push_str("=\"");
                out.push_str(&escape_attribute(&value_text(attr)));
                out.push('"');
            }
            let content: Vec<(&String, &Value)> = map
                .iter()
                .filter(|(key, _)| !key.starts_with('@'))
                .collect();
            if content.is_empty() {
                out.push_str("/>");
                return;
            }
            out.push('>');
            for (key, child) in content {
                if key == "#text" {
                    out.push_str(&escape_text(&value_text(child)));
                } else {
                    write_element(out, key, child);
                }
            }
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
        Value::Null => {
            out.push('<');
            out.push_str(name);
            out.push_str("/>");
        }
        other => {
            out.push('<');
            out.push_str(name);
            out.push('>');
            out.push_str(&escape_text(&value_text(other)));
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];

        let entity_end = rest.find(';').filter(|end| {
            *end > 1
                && *end <= 10
                && rest[1..*end]
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'#')
        });
        let Some(end) = entity_end else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };

        match &rest[1..end] {
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "amp" => out.push('&'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            numeric if numeric.starts_with('#') => {
                let code = if let Some(hex) = numeric[1..].strip_prefix(['x', 'X']) {
                    u32::from_str_radix(hex, 16).ok()
                } else {
                    numeric[1..].parse::<u32>().ok()
                };
                match code.and_then(char::from_u32) {
                    Some(c) => out.push(c),
                    None => out.push_str(&rest[..=end]),
                }
            }
            // unknown entity, keep it verbatim
            _ => out.push_str(&rest[..=end]),
        }
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    out
}

fn escape_text(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(raw: &str) -> String {
    escape_text(raw).replace('"', "&quot;")
}
