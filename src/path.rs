//! Structural path expressions over JSON-shaped documents.
//!
//! A path addresses one location inside a [`serde_json::Value`] document
//! using dotted keys and bracketed indices: `user.name`, `items[2]`,
//! `order.lines[0].sku`. A leading `$.` or `$` prefix is accepted and
//! ignored. Both JSON and XML bodies are mutated through this grammar, since
//! XML documents are held in the same map shape (see
//! [`encoder::xml`](crate::encoder::xml)).

use serde_json::Value;
use thiserror::Error;

/// Errors raised while parsing or resolving a path expression.
#[derive(Debug, Error)]
pub enum PathError {
    /// The expression itself is malformed.
    #[error("invalid path expression: {0}")]
    Parse(String),

    /// The expression is well-formed but does not resolve inside the
    /// document it was applied to.
    #[error("path not resolvable: {0}")]
    Unresolvable(String),
}

/// One step of a parsed path.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// A parsed path expression, ready to be applied to documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    segments: Vec<Segment>,
}

impl Locator {
    /// Parse a path expression.
    ///
    /// Fails on an empty expression, an empty segment (`a..b`, a leading or
    /// trailing dot), an unterminated or non-numeric index, and characters
    /// directly following a closing bracket.
    pub fn parse(expr: &str) -> Result<Self, PathError> {
        let parse_err = |reason: &str| PathError::Parse(format!("{} in {:?}", reason, expr));

        let path = expr
            .strip_prefix("$.")
            .or_else(|| expr.strip_prefix('$'))
            .unwrap_or(expr);
        if path.is_empty() {
            return Err(parse_err("empty expression"));
        }

        let mut segments = Vec::new();
        let mut current = String::new();
        // set after a ']' so a dangling '.' can be told apart from an
        // index-terminated expression
        let mut closed_index = false;

        let mut chars = path.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    if current.is_empty() && !closed_index {
                        return Err(parse_err("empty segment"));
                    }
                    if !current.is_empty() {
                        segments.push(Segment::Key(std::mem::take(&mut current)));
                    }
                    closed_index = false;
                }
                '[' => {
                    if !current.is_empty() {
                        segments.push(Segment::Key(std::mem::take(&mut current)));
                    } else if !closed_index && !segments.is_empty() {
                        return Err(parse_err("index without a preceding key"));
                    }
                    let mut digits = String::new();
                    loop {
                        match chars.next() {
                            Some(']') => break,
                            Some(d) if d.is_ascii_digit() => digits.push(d),
                            Some(_) => return Err(parse_err("non-numeric index")),
                            None => return Err(parse_err("unterminated index")),
                        }
                    }
                    let index = digits
                        .parse::<usize>()
                        .map_err(|_| parse_err("invalid index"))?;
                    segments.push(Segment::Index(index));
                    closed_index = true;
                    // only '.', another index, or the end may follow
                    if let Some(next) = chars.peek() {
                        if *next != '.' && *next != '[' {
                            return Err(parse_err("unexpected character after index"));
                        }
                    }
                }
                ']' => return Err(parse_err("unexpected ']'")),
                _ => current.push(c),
            }
        }

        if !current.is_empty() {
            segments.push(Segment::Key(current));
        } else if !closed_index {
            return Err(parse_err("trailing '.'"));
        }

        Ok(Self { segments })
    }

    /// Resolve the path to a reference inside a document.
    pub fn get<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        let mut current = document;
        for segment in &self.segments {
            current = match segment {
                Segment::Key(key) => current.get(key.as_str())?,
                Segment::Index(index) => current.get(*index)?,
            };
        }
        Some(current)
    }

    /// Set the value at the addressed location.
    ///
    /// Every intermediate segment must already resolve; the final segment
    /// may insert a new key into an existing map (append-or-replace), but an
    /// out-of-bounds final index is an error. Intermediate containers are
    /// never created.
    pub fn set(&self, document: &mut Value, value: Value) -> Result<(), PathError> {
        let Some((last, parents)) = self.segments.split_last() else {
            return Err(PathError::Unresolvable("empty locator".to_string()));
        };

        let mut current = document;
        for segment in parents {
            current = match segment {
                Segment::Key(key) => current.get_mut(key.as_str()).ok_or_else(|| {
                    PathError::Unresolvable(format!("missing key {:?}", key))
                })?,
                Segment::Index(index) => current.get_mut(*index).ok_or_else(|| {
                    PathError::Unresolvable(format!("missing index {}", index))
                })?,
            };
        }

        match last {
            Segment::Key(key) => match current {
                Value::Object(map) => {
                    map.insert(key.clone(), value);
                    Ok(())
                }
                _ => Err(PathError::Unresolvable(format!(
                    "cannot set key {:?} on a non-object value",
                    key
                ))),
            },
            Segment::Index(index) => match current {
                Value::Array(items) if *index < items.len() => {
                    items[*index] = value;
                    Ok(())
                }
                Value::Array(items) => Err(PathError::Unresolvable(format!(
                    "index {} out of bounds for array of length {}",
                    index,
                    items.len()
                ))),
                _ => Err(PathError::Unresolvable(format!(
                    "cannot set index {} on a non-array value",
                    index
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_dotted_and_indexed() {
        let locator = Locator::parse("user.profile.name").unwrap();
        assert_eq!(locator.segments.len(), 3);

        let locator = Locator::parse("items[0].name").unwrap();
        assert_eq!(
            locator.segments,
            vec![
                Segment::Key("items".to_string()),
                Segment::Index(0),
                Segment::Key("name".to_string()),
            ]
        );

        // optional accessor prefix
        let locator = Locator::parse("$.user.name").unwrap();
        assert_eq!(locator.segments.len(), 2);

        // consecutive indices
        let locator = Locator::parse("grid[1][2]").unwrap();
        assert_eq!(locator.segments.len(), 3);

        // leading index addresses a root array
        let locator = Locator::parse("[3]").unwrap();
        assert_eq!(locator.segments, vec![Segment::Index(3)]);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for expr in ["", "$", "$.", "a..b", ".a", "a.", "a[", "a[x]", "a[]", "a[0", "a[0]b", "a]b"] {
            assert!(
                matches!(Locator::parse(expr), Err(PathError::Parse(_))),
                "expected parse failure for {:?}",
                expr
            );
        }
    }

    #[test]
    fn test_get() {
        let doc = json!({"user": {"name": "alice", "tags": ["a", "b"]}});

        let name = Locator::parse("user.name").unwrap();
        assert_eq!(name.get(&doc), Some(&json!("alice")));

        let tag = Locator::parse("user.tags[1]").unwrap();
        assert_eq!(tag.get(&doc), Some(&json!("b")));

        let missing = Locator::parse("user.age").unwrap();
        assert_eq!(missing.get(&doc), None);
    }

    #[test]
    fn test_set_nested_key() {
        let mut doc = json!({"user": {"name": "alice"}, "id": 7});
        Locator::parse("user.name")
            .unwrap()
            .set(&mut doc, json!("x"))
            .unwrap();
        assert_eq!(doc, json!({"user": {"name": "x"}, "id": 7}));
    }

    #[test]
    fn test_set_inserts_new_key() {
        let mut doc = json!({"user": {}});
        Locator::parse("user.role")
            .unwrap()
            .set(&mut doc, json!("admin"))
            .unwrap();
        assert_eq!(doc, json!({"user": {"role": "admin"}}));
    }

    #[test]
    fn test_set_array_index() {
        let mut doc = json!({"items": ["a", "b", "c"]});
        Locator::parse("items[1]")
            .unwrap()
            .set(&mut doc, json!("x"))
            .unwrap();
        assert_eq!(doc, json!({"items": ["a", "x", "c"]}));
    }

    #[test]
    fn test_set_unresolvable() {
        let mut doc = json!({"user": {"name": "alice"}, "items": ["a"]});

        // missing intermediate
        let err = Locator::parse("account.name")
            .unwrap()
            .set(&mut doc, json!("x"))
            .unwrap_err();
        assert!(matches!(err, PathError::Unresolvable(_)));

        // out-of-bounds final index
        let err = Locator::parse("items[5]")
            .unwrap()
            .set(&mut doc, json!("x"))
            .unwrap_err();
        assert!(matches!(err, PathError::Unresolvable(_)));

        // key on a scalar
        let err = Locator::parse("user.name.first")
            .unwrap()
            .set(&mut doc, json!("x"))
            .unwrap_err();
        assert!(matches!(err, PathError::Unresolvable(_)));
    }
}
