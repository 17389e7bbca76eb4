//! Rewriting of extended-JSON identifier markers into native identifiers.
//!
//! Scripts cannot construct the store's identifier type directly, so they
//! write `{ "$oid": "<24 hex>" }` instead. [`normalize`] replaces such marker
//! objects found in the top-level values of a document. Markers nested any
//! deeper are left untouched unless the caller opts into
//! [`normalize_recursive`].

use crate::{
    error::AdapterResult,
    identifier::Identifier,
    value::{Document, Value},
};

/// The key of a single-key object that encodes an identifier.
pub const MARKER_KEY: &str = "$oid";

/// How far into a document marker objects are rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormalizeMode {
    /// Only the top-level values of the document.
    #[default]
    Shallow,
    /// Every nested map and array, at any depth.
    Recursive,
}

/// Rewrites marker objects in the top-level values of `doc`.
///
/// # Errors
///
/// Returns [`AdapterError::MalformedIdentifier`](crate::error::AdapterError::MalformedIdentifier)
/// as soon as a marker carries text that is not a valid identifier. No partial
/// result is returned in that case.
pub fn normalize(doc: Document) -> AdapterResult<Document> {
    normalize_with(doc, NormalizeMode::Shallow)
}

/// Rewrites marker objects anywhere in `doc`, including inside arrays.
pub fn normalize_recursive(doc: Document) -> AdapterResult<Document> {
    normalize_with(doc, NormalizeMode::Recursive)
}

/// Rewrites marker objects in `doc` to the depth selected by `mode`.
///
/// Hosts that read the mode from configuration call this instead of picking
/// between [`normalize`] and [`normalize_recursive`].
pub fn normalize_with(doc: Document, mode: NormalizeMode) -> AdapterResult<Document> {
    doc.into_iter()
        .map(|(key, value)| Ok((key, normalize_value(value, mode)?)))
        .collect()
}

fn normalize_value(value: Value, mode: NormalizeMode) -> AdapterResult<Value> {
    match value {
        Value::Map(map) => match marker_text(&map) {
            Some(hex) => Ok(Value::Identifier(Identifier::parse(hex)?)),
            None if mode == NormalizeMode::Recursive => Ok(Value::Map(normalize_with(map, mode)?)),
            None => Ok(Value::Map(map)),
        },
        Value::Array(items) if mode == NormalizeMode::Recursive => Ok(Value::Array(
            items
                .into_iter()
                .map(|item| normalize_value(item, mode))
                .collect::<AdapterResult<Vec<_>>>()?,
        )),
        other => Ok(other),
    }
}

/// Returns the encoded hex if `map` has the marker shape.
fn marker_text(map: &Document) -> Option<&str> {
    if map.len() != 1 {
        return None;
    }

    map.get(MARKER_KEY).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdapterError;
    use serde_json::json;

    const HEX: &str = "507f1f77bcf86cd799439011";

    fn doc(value: serde_json::Value) -> Document {
        Document::from_json(value).unwrap()
    }

    #[test]
    fn test_replaces_top_level_marker() {
        let normalized = normalize(doc(json!({ "owner": { "$oid": HEX } }))).unwrap();

        let owner = normalized.get("owner").and_then(Value::as_identifier).unwrap();
        assert_eq!(owner.to_hex(), HEX);
    }

    #[test]
    fn test_leaves_other_keys_untouched() {
        let input = doc(json!({
            "name": "k6",
            "owner": { "$oid": HEX },
            "meta": { "a": 1 },
            "tags": [1, 2],
        }));
        let normalized = normalize(input.clone()).unwrap();

        assert_eq!(normalized.keys().collect::<Vec<_>>(), input.keys().collect::<Vec<_>>());
        for key in ["name", "meta", "tags"] {
            assert_eq!(normalized.get(key), input.get(key));
        }
    }

    #[test]
    fn test_document_without_markers_is_unchanged() {
        let input = doc(json!({
            "name": "k6",
            "n": 2,
            "meta": { "nested": { "x": null } },
            "oid": "not a marker",
        }));

        assert_eq!(normalize(input.clone()).unwrap(), input);
    }

    #[test]
    fn test_is_idempotent() {
        let plain = doc(json!({ "a": 1, "b": { "c": "d" } }));
        let once = normalize(plain).unwrap();
        assert_eq!(normalize(once.clone()).unwrap(), once);

        let marked = normalize(doc(json!({ "owner": { "$oid": HEX } }))).unwrap();
        assert_eq!(normalize(marked.clone()).unwrap(), marked);
    }

    #[test]
    fn test_malformed_marker_fails_whole_document() {
        let err = normalize(doc(json!({
            "first": { "$oid": HEX },
            "second": { "$oid": "nope" },
        })))
        .unwrap_err();

        assert!(matches!(err, AdapterError::MalformedIdentifier { ref input, .. } if input == "nope"));
    }

    #[test]
    fn test_non_marker_shapes_are_left_alone() {
        let input = doc(json!({
            "extra": { "$oid": HEX, "other": 1 },
            "number": { "$oid": 5 },
            "empty": {},
        }));

        assert_eq!(normalize(input.clone()).unwrap(), input);
    }

    #[test]
    fn test_shallow_mode_skips_deep_markers() {
        let input = doc(json!({
            "meta": { "owner": { "$oid": HEX } },
            "refs": [{ "$oid": HEX }],
        }));

        assert_eq!(normalize(input.clone()).unwrap(), input);
    }

    #[test]
    fn test_recursive_mode_rewrites_deep_markers() {
        let normalized = normalize_recursive(doc(json!({
            "meta": { "owner": { "$oid": HEX } },
            "refs": [{ "$oid": HEX }, "plain"],
        })))
        .unwrap();

        let meta = normalized.get("meta").and_then(Value::as_map).unwrap();
        assert_eq!(meta.get("owner").and_then(Value::as_identifier).map(|id| id.to_hex()), Some(HEX.to_string()));

        let Some(Value::Array(refs)) = normalized.get("refs") else {
            panic!("refs should stay an array");
        };
        assert!(refs[0].as_identifier().is_some());
        assert_eq!(refs[1], Value::from("plain"));
    }

    #[test]
    fn test_mode_selects_depth() {
        let input = doc(json!({ "meta": { "owner": { "$oid": HEX } } }));

        assert_eq!(normalize_with(input.clone(), NormalizeMode::default()).unwrap(), input);
        assert_eq!(
            normalize_with(input.clone(), NormalizeMode::Recursive).unwrap(),
            normalize_recursive(input).unwrap()
        );
    }

    #[test]
    fn test_recursive_mode_propagates_failure() {
        assert!(normalize_recursive(doc(json!({ "a": [{ "b": { "$oid": "123" } }] }))).is_err());
    }
}
