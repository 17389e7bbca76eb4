//! Filter and update evaluation for in-memory documents.
//!
//! This module understands the subset of the store's query language that load
//! test scripts reach for: field equality, comparison and membership
//! operators, `$exists`, the logical combinators, and the `$set`, `$unset` and
//! `$inc` update operators. Dotted paths address nested fields.

use std::{cmp::Ordering, collections::HashMap};
use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};

use docbench_core::error::{StoreError, StoreResult};


/// Type-erased, comparable representation of BSON values.
///
/// All numeric types are normalized to `f64` so that `1`, `1_i64` and `1.0`
/// compare equal, as they do in the store.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    /// Null or missing value
    Null,
    Bool(bool),
    /// Numeric value (all integers and floats normalized to f64)
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    ObjectId(ObjectId),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    /// Any other BSON type, only ever equal to an identical value
    Raw(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            other => Comparable::Raw(other),
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Raw(a), Comparable::Raw(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}


/// Looks up a possibly dotted field path.
pub(crate) fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    match path.split_once('.') {
        Some((head, rest)) => match document.get(head)? {
            Bson::Document(inner) => get_path(inner, rest),
            _ => None,
        },
        None => document.get(path),
    }
}

/// Sets a possibly dotted field path, creating intermediate documents.
fn set_path(document: &mut Document, path: &str, value: Bson) -> StoreResult<()> {
    match path.split_once('.') {
        Some((head, rest)) => {
            if !document.contains_key(head) {
                document.insert(head, Document::new());
            }

            match document.get_mut(head) {
                Some(Bson::Document(inner)) => set_path(inner, rest, value),
                _ => Err(StoreError::Driver(format!("cannot create field '{rest}' in non-document '{head}'"))),
            }
        }
        None => {
            document.insert(path, value);
            Ok(())
        }
    }
}

fn remove_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        Some((head, rest)) => {
            if let Some(Bson::Document(inner)) = document.get_mut(head) {
                remove_path(inner, rest);
            }
        }
        None => {
            document.remove(path);
        }
    }
}


/// Evaluates a filter document against a single stored document.
pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Returns whether the document matches every clause of `filter`.
    ///
    /// An empty filter matches everything.
    pub fn matches(&self, filter: &Document) -> StoreResult<bool> {
        for (key, condition) in filter {
            let matched = match key.as_str() {
                "$and" => self.all_of(condition)?,
                "$or" => self.any_of(condition)?,
                "$nor" => !self.any_of(condition)?,
                op if op.starts_with('$') => {
                    return Err(StoreError::Driver(format!("unknown top level operator: {op}")));
                }
                field => self.field_matches(field, condition)?,
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn clauses(condition: &Bson) -> StoreResult<Vec<&Document>> {
        match condition {
            Bson::Array(items) if !items.is_empty() => items
                .iter()
                .map(|item| {
                    item.as_document()
                        .ok_or_else(|| StoreError::Driver("logical clauses must be documents".into()))
                })
                .collect(),
            _ => Err(StoreError::Driver("logical operators require a non-empty array".into())),
        }
    }

    fn all_of(&self, condition: &Bson) -> StoreResult<bool> {
        for clause in Self::clauses(condition)? {
            if !self.matches(clause)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn any_of(&self, condition: &Bson) -> StoreResult<bool> {
        for clause in Self::clauses(condition)? {
            if self.matches(clause)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn field_matches(&self, field: &str, condition: &Bson) -> StoreResult<bool> {
        let actual = get_path(self.document, field);

        match condition {
            Bson::Document(ops) if is_operator_document(ops) => {
                for (op, operand) in ops {
                    if !Self::apply_operator(actual, op, operand)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            expected => Ok(Self::equals(actual, expected)),
        }
    }

    /// Equality with the store's array semantics: an array field matches a
    /// scalar if any element equals it.
    fn equals(actual: Option<&Bson>, expected: &Bson) -> bool {
        let expected = Comparable::from(expected);

        match actual {
            None => expected == Comparable::Null,
            Some(value @ Bson::Array(items)) => {
                Comparable::from(value) == expected
                    || items.iter().any(|item| Comparable::from(item) == expected)
            }
            Some(value) => Comparable::from(value) == expected,
        }
    }

    fn compare(actual: Option<&Bson>, operand: &Bson, accept: fn(Ordering) -> bool) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        let operand = Comparable::from(operand);

        let candidates: Vec<&Bson> = match actual {
            Bson::Array(items) => items.iter().collect(),
            value => vec![value],
        };

        candidates
            .into_iter()
            .any(|value| Comparable::from(value).partial_cmp(&operand).is_some_and(accept))
    }

    fn apply_operator(actual: Option<&Bson>, op: &str, operand: &Bson) -> StoreResult<bool> {
        Ok(match op {
            "$eq" => Self::equals(actual, operand),
            "$ne" => !Self::equals(actual, operand),
            "$gt" => Self::compare(actual, operand, Ordering::is_gt),
            "$gte" => Self::compare(actual, operand, Ordering::is_ge),
            "$lt" => Self::compare(actual, operand, Ordering::is_lt),
            "$lte" => Self::compare(actual, operand, Ordering::is_le),
            "$in" => Self::members(operand)?
                .iter()
                .any(|candidate| Self::equals(actual, candidate)),
            "$nin" => !Self::members(operand)?
                .iter()
                .any(|candidate| Self::equals(actual, candidate)),
            "$exists" => {
                let should_exist = match operand {
                    Bson::Boolean(b) => *b,
                    Bson::Int32(i) => *i != 0,
                    Bson::Int64(i) => *i != 0,
                    _ => true,
                };
                actual.is_some() == should_exist
            }
            _ => return Err(StoreError::Driver(format!("unknown operator: {op}"))),
        })
    }

    fn members(operand: &Bson) -> StoreResult<&Vec<Bson>> {
        operand
            .as_array()
            .ok_or_else(|| StoreError::Driver("$in and $nin need an array".into()))
    }
}

fn is_operator_document(doc: &Document) -> bool {
    !doc.is_empty() && doc.keys().all(|k| k.starts_with('$'))
}


/// Applies an update specification to a document in place.
///
/// Returns whether the document changed.
pub(crate) fn apply_update(document: &mut Document, update: &Document) -> StoreResult<bool> {
    if update.is_empty() {
        return Err(StoreError::Driver("update document must not be empty".into()));
    }

    if !is_operator_document(update) {
        return Err(StoreError::Driver("update document requires atomic operators".into()));
    }

    let before = document.clone();

    for (op, fields) in update {
        let fields = fields
            .as_document()
            .ok_or_else(|| StoreError::Driver(format!("modifier {op} expects a document")))?;

        for (path, value) in fields {
            if path == "_id" && !(op == "$set" && get_path(document, "_id") == Some(value)) {
                return Err(StoreError::Driver("performing an update on the path '_id' would modify the immutable field '_id'".into()));
            }

            match op.as_str() {
                "$set" => set_path(document, path, value.clone())?,
                "$unset" => remove_path(document, path),
                "$inc" => {
                    if as_f64(value).is_none() {
                        return Err(StoreError::Driver(format!("cannot increment '{path}' by a non-numeric value")));
                    }

                    let incremented = increment(get_path(document, path), value, path)?;
                    set_path(document, path, incremented)?;
                }
                _ => return Err(StoreError::Driver(format!("unknown modifier: {op}"))),
            }
        }
    }

    Ok(*document != before)
}

/// Adds `delta` to `current`. Integer overflow widens `Int32` to `Int64`
/// and fails once `Int64` overflows.
fn increment(current: Option<&Bson>, delta: &Bson, path: &str) -> StoreResult<Bson> {
    let overflow = || StoreError::Driver(format!("integer overflow applying $inc to field '{path}'"));

    Ok(match (current, delta) {
        (None, delta) => delta.clone(),
        (Some(Bson::Int32(a)), Bson::Int32(b)) => match a.checked_add(*b) {
            Some(sum) => Bson::Int32(sum),
            None => Bson::Int64(*a as i64 + *b as i64),
        },
        (Some(Bson::Int64(a)), Bson::Int64(b)) => Bson::Int64(a.checked_add(*b).ok_or_else(overflow)?),
        (Some(Bson::Int32(a)), Bson::Int64(b)) => Bson::Int64((*a as i64).checked_add(*b).ok_or_else(overflow)?),
        (Some(Bson::Int64(a)), Bson::Int32(b)) => Bson::Int64(a.checked_add(*b as i64).ok_or_else(overflow)?),
        (Some(current), delta) => match (as_f64(current), as_f64(delta)) {
            (Some(a), Some(b)) => Bson::Double(a + b),
            _ => return Err(StoreError::Driver(format!("cannot apply $inc to non-numeric field '{path}'"))),
        },
    })
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(i) => Some(*i as f64),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(d) => Some(*d),
        _ => None,
    }
}

/// Builds the seed document for an upsert from the equality clauses of `filter`.
///
/// Dotted keys become nested documents so the seed matches `filter` again.
pub(crate) fn upsert_seed(filter: &Document) -> StoreResult<Document> {
    let mut seed = Document::new();

    for (key, value) in filter.iter().filter(|(key, _)| !key.starts_with('$')) {
        let value = match value {
            Bson::Document(ops) if is_operator_document(ops) => match ops.get("$eq") {
                Some(eq) => eq,
                None => continue,
            },
            other => other,
        };

        set_path(&mut seed, key, value.clone())?;
    }

    Ok(seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn matches(document: &Document, filter: Document) -> bool {
        DocumentEvaluator::new(document).matches(&filter).unwrap()
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(matches(&doc! { "a": 1 }, doc! {}));
        assert!(matches(&doc! {}, doc! {}));
    }

    #[test]
    fn test_equality_normalizes_numbers() {
        let document = doc! { "n": 1_i64, "name": "a" };

        assert!(matches(&document, doc! { "n": 1 }));
        assert!(matches(&document, doc! { "n": 1.0, "name": "a" }));
        assert!(!matches(&document, doc! { "n": 2 }));
        assert!(matches(&document, doc! { "missing": Bson::Null }));
    }

    #[test]
    fn test_equality_on_object_ids() {
        let id = ObjectId::new();
        let document = doc! { "_id": id };

        assert!(matches(&document, doc! { "_id": id }));
        assert!(!matches(&document, doc! { "_id": ObjectId::new() }));
    }

    #[test]
    fn test_array_fields_match_elements() {
        let document = doc! { "tags": ["a", "b"] };

        assert!(matches(&document, doc! { "tags": "a" }));
        assert!(matches(&document, doc! { "tags": ["a", "b"] }));
        assert!(!matches(&document, doc! { "tags": "c" }));
    }

    #[test]
    fn test_comparison_and_membership_operators() {
        let document = doc! { "n": 5, "s": "m" };

        assert!(matches(&document, doc! { "n": { "$gt": 4, "$lte": 5 } }));
        assert!(!matches(&document, doc! { "n": { "$lt": 5 } }));
        assert!(matches(&document, doc! { "s": { "$gte": "a" } }));
        assert!(matches(&document, doc! { "n": { "$in": [1, 5] } }));
        assert!(matches(&document, doc! { "n": { "$nin": [1, 2] } }));
        assert!(matches(&document, doc! { "n": { "$ne": 4 } }));
        assert!(!matches(&document, doc! { "n": { "$gt": "text" } }));
    }

    #[test]
    fn test_exists_and_dotted_paths() {
        let document = doc! { "meta": { "owner": "k6" } };

        assert!(matches(&document, doc! { "meta.owner": "k6" }));
        assert!(matches(&document, doc! { "meta.owner": { "$exists": true } }));
        assert!(matches(&document, doc! { "meta.other": { "$exists": false } }));
    }

    #[test]
    fn test_logical_operators() {
        let document = doc! { "n": 5 };

        assert!(matches(&document, doc! { "$or": [{ "n": 1 }, { "n": 5 }] }));
        assert!(matches(&document, doc! { "$and": [{ "n": { "$gt": 1 } }, { "n": { "$lt": 9 } }] }));
        assert!(matches(&document, doc! { "$nor": [{ "n": 1 }] }));
    }

    #[test]
    fn test_unknown_operator_is_an_error() {
        let document = doc! { "n": 5 };

        assert!(DocumentEvaluator::new(&document).matches(&doc! { "n": { "$near": 1 } }).is_err());
        assert!(DocumentEvaluator::new(&document).matches(&doc! { "$where": "x" }).is_err());
        assert!(DocumentEvaluator::new(&document).matches(&doc! { "$or": [] }).is_err());
    }

    #[test]
    fn test_apply_update_operators() {
        let mut document = doc! { "_id": 1, "n": 1, "gone": true };

        let changed = apply_update(
            &mut document,
            &doc! {
                "$set": { "name": "a", "meta.depth": 2 },
                "$unset": { "gone": "" },
                "$inc": { "n": 2, "fresh": 1.5 },
            },
        )
        .unwrap();

        assert!(changed);
        assert_eq!(
            document,
            doc! { "_id": 1, "n": 3, "name": "a", "meta": { "depth": 2 }, "fresh": 1.5 }
        );
    }

    #[test]
    fn test_apply_update_reports_no_change() {
        let mut document = doc! { "name": "a" };

        assert!(!apply_update(&mut document, &doc! { "$set": { "name": "a" } }).unwrap());
    }

    #[test]
    fn test_apply_update_rejects_invalid_specs() {
        let mut document = doc! { "_id": 1, "name": "a" };

        assert!(apply_update(&mut document, &doc! {}).is_err());
        assert!(apply_update(&mut document, &doc! { "name": "b" }).is_err());
        assert!(apply_update(&mut document, &doc! { "$push": { "tags": "x" } }).is_err());
        assert!(apply_update(&mut document, &doc! { "$inc": { "name": 1 } }).is_err());
        assert!(apply_update(&mut document, &doc! { "$set": { "_id": 2 } }).is_err());
    }

    #[test]
    fn test_upsert_seed_keeps_equality_clauses() {
        let seed = upsert_seed(&doc! {
            "name": "a",
            "n": { "$eq": 3 },
            "m": { "$gt": 1 },
            "$or": [{ "x": 1 }],
        })
        .unwrap();

        assert_eq!(seed, doc! { "name": "a", "n": 3 });
    }

    #[test]
    fn test_upsert_seed_nests_dotted_keys() {
        let filter = doc! { "meta.owner": "x", "meta.depth": { "$eq": 2 } };
        let seed = upsert_seed(&filter).unwrap();

        assert_eq!(seed, doc! { "meta": { "owner": "x", "depth": 2 } });
        assert!(matches(&seed, filter));
        assert!(upsert_seed(&doc! { "a": 1, "a.b": 2 }).is_err());
    }

    #[test]
    fn test_inc_overflow_is_an_error() {
        let mut document = doc! { "n": i64::MAX, "small": i32::MAX };

        let err = apply_update(&mut document, &doc! { "$inc": { "n": 1_i64 } }).unwrap_err();
        assert!(matches!(err, StoreError::Driver(ref message) if message.contains("overflow")));
        assert_eq!(document.get_i64("n").unwrap(), i64::MAX);

        apply_update(&mut document, &doc! { "$inc": { "small": 1 } }).unwrap();
        assert_eq!(document.get("small"), Some(&Bson::Int64(i32::MAX as i64 + 1)));
    }

    #[test]
    fn test_unsupported_types_compare_by_value() {
        let binary = Bson::Binary(bson::Binary { subtype: bson::spec::BinarySubtype::Generic, bytes: vec![1, 2] });
        let other = Bson::Binary(bson::Binary { subtype: bson::spec::BinarySubtype::Generic, bytes: vec![3] });
        let document = doc! { "blob": binary.clone() };

        assert!(matches(&document, doc! { "blob": binary.clone() }));
        assert!(!matches(&document, doc! { "blob": other }));
        assert!(!matches(&doc! { "name": "a" }, doc! { "blob": binary.clone() }));
        assert!(!matches(&doc! { "blob": Bson::Timestamp(bson::Timestamp { time: 1, increment: 1 }) }, doc! { "blob": binary }));
    }
}
