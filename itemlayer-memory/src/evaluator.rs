//! Filter evaluation for in-memory document matching.
//!
//! This module evaluates MongoDB style filter documents against stored documents.
//! Supported: implicit equality, `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$in`,
//! `$nin`, `$exists`, `$not`, and the logical `$and`, `$or`, `$nor`. Field names may be
//! dot paths. Equality against an array field matches when any element matches.

use std::{cmp::Ordering, collections::HashMap};
use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};

use itemlayer_core::{
    error::{ItemStoreError, ItemStoreResult},
    path::FieldPath,
};


/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64. Types without a natural ordering compare
/// only for equality through [`Comparable::Other`].
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    ObjectId(ObjectId),
    Binary(&'a [u8]),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    Other(&'a Bson),
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
            Bson::Binary(value) => Comparable::Binary(&value.bytes),
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
            other => Comparable::Other(other),
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
            (Comparable::Binary(a), Comparable::Binary(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
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
            (Comparable::Binary(a), Comparable::Binary(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Orders two optional field values, missing values first.
pub(crate) fn compare_values(left: Option<&Bson>, right: Option<&Bson>) -> Ordering {
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => Comparable::from(a)
            .partial_cmp(&Comparable::from(b))
            .unwrap_or(Ordering::Equal),
    }
}

/// Returns `true` when every key of `doc` is an operator (`$`-prefixed).
pub(crate) fn is_operator_document(doc: &Document) -> bool {
    !doc.is_empty() && doc.keys().all(|key| key.starts_with('$'))
}

/// Interprets flag-like BSON values (`1`, `true`, `0`, `false`).
pub(crate) fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(flag) => *flag,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        Bson::Null => false,
        _ => true,
    }
}


pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Returns `true` if the document satisfies every clause of `filter`.
    pub fn matches(&self, filter: &Document) -> ItemStoreResult<bool> {
        for (key, condition) in filter {
            let satisfied = match key.as_str() {
                "$and" => {
                    let clauses = clauses(key, condition)?;
                    clauses
                        .into_iter()
                        .try_fold(true, |acc, clause| Ok::<_, ItemStoreError>(acc && self.matches(clause)?))?
                },
                "$or" => self.any(key, condition)?,
                "$nor" => !self.any(key, condition)?,
                op if op.starts_with('$') => return Err(unsupported(op)),
                field => self.field_matches(field, condition)?,
            };

            if !satisfied {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Filters `documents` down to those matching `filter`.
    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        filter: &Document,
    ) -> ItemStoreResult<Vec<Document>> {
        let mut matched = Vec::new();

        for doc in documents {
            if DocumentEvaluator::new(doc).matches(filter)? {
                matched.push(doc.clone());
            }
        }

        Ok(matched)
    }

    fn any(&self, key: &str, condition: &Bson) -> ItemStoreResult<bool> {
        for clause in clauses(key, condition)? {
            if self.matches(clause)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn field_matches(&self, field: &str, condition: &Bson) -> ItemStoreResult<bool> {
        let value = FieldPath::parse(field).get(self.document);

        match condition {
            Bson::Document(ops) if is_operator_document(ops) => {
                for (op, argument) in ops {
                    if !apply(op, value, argument)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            },
            expected => Ok(equals(value, expected)),
        }
    }
}

fn apply(op: &str, value: Option<&Bson>, argument: &Bson) -> ItemStoreResult<bool> {
    match op {
        "$eq" => Ok(equals(value, argument)),
        "$ne" => Ok(!equals(value, argument)),
        "$gt" | "$gte" | "$lt" | "$lte" => Ok(compare(op, value, argument)),
        "$in" => Ok(candidates(op, argument)?
            .iter()
            .any(|candidate| equals(value, candidate))),
        "$nin" => Ok(!candidates(op, argument)?
            .iter()
            .any(|candidate| equals(value, candidate))),
        "$exists" => Ok(value.is_some() == truthy(argument)),
        "$not" => match argument {
            Bson::Document(ops) if is_operator_document(ops) => {
                for (inner, inner_argument) in ops {
                    if !apply(inner, value, inner_argument)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            },
            _ => Err(ItemStoreError::Store("$not needs an operator document".into())),
        },
        other => Err(unsupported(other)),
    }
}

/// Equality with array fields matching on any element; a missing field equals null.
fn equals(value: Option<&Bson>, expected: &Bson) -> bool {
    match value {
        None => matches!(expected, Bson::Null),
        Some(Bson::Array(items)) if !matches!(expected, Bson::Array(_)) => items
            .iter()
            .any(|item| Comparable::from(item) == Comparable::from(expected)),
        Some(actual) => Comparable::from(actual) == Comparable::from(expected),
    }
}

fn compare(op: &str, value: Option<&Bson>, bound: &Bson) -> bool {
    let check = |actual: &Bson| match Comparable::from(actual).partial_cmp(&Comparable::from(bound)) {
        Some(ordering) => match op {
            "$gt" => ordering == Ordering::Greater,
            "$gte" => ordering != Ordering::Less,
            "$lt" => ordering == Ordering::Less,
            "$lte" => ordering != Ordering::Greater,
            _ => false,
        },
        None => false,
    };

    match value {
        Some(Bson::Array(items)) => items.iter().any(check),
        Some(actual) => check(actual),
        None => false,
    }
}

fn clauses<'b>(key: &str, condition: &'b Bson) -> ItemStoreResult<Vec<&'b Document>> {
    condition
        .as_array()
        .ok_or_else(|| ItemStoreError::Store(format!("{key} needs an array of filters")))?
        .iter()
        .map(|clause| {
            clause
                .as_document()
                .ok_or_else(|| ItemStoreError::Store(format!("{key} clauses must be documents")))
        })
        .collect()
}

fn candidates<'b>(op: &str, argument: &'b Bson) -> ItemStoreResult<&'b Vec<Bson>> {
    argument
        .as_array()
        .ok_or_else(|| ItemStoreError::Store(format!("{op} needs an array")))
}

fn unsupported(op: &str) -> ItemStoreError {
    ItemStoreError::Store(format!("unsupported operator {op}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn matches(document: &Document, filter: Document) -> bool {
        DocumentEvaluator::new(document).matches(&filter).unwrap()
    }

    #[test]
    fn implicit_equality_and_numeric_normalization() {
        let doc = doc! { "name": "a", "count": 3_i64 };

        assert!(matches(&doc, doc! { "name": "a", "count": 3 }));
        assert!(!matches(&doc, doc! { "name": "b" }));
        assert!(matches(&doc, doc! {}));
    }

    #[test]
    fn missing_field_equals_null() {
        let doc = doc! { "name": "a" };

        assert!(matches(&doc, doc! { "age": Bson::Null }));
        assert!(!matches(&doc, doc! { "age": 1 }));
    }

    #[test]
    fn comparison_operators() {
        let doc = doc! { "age": 30 };

        assert!(matches(&doc, doc! { "age": { "$gt": 18, "$lte": 30 } }));
        assert!(!matches(&doc, doc! { "age": { "$lt": 30 } }));
        assert!(matches(&doc, doc! { "age": { "$ne": 31 } }));
        assert!(!matches(&doc, doc! { "age": { "$gt": "x" } }));
    }

    #[test]
    fn membership_operators_with_object_ids() {
        let (a, b) = (ObjectId::new(), ObjectId::new());
        let doc = doc! { "_id": a };

        assert!(matches(&doc, doc! { "_id": { "$in": [b, a] } }));
        assert!(!matches(&doc, doc! { "_id": { "$in": [b] } }));
        assert!(matches(&doc, doc! { "_id": { "$nin": [b] } }));
    }

    #[test]
    fn array_fields_match_any_element() {
        let doc = doc! { "tags": ["red", "blue"] };

        assert!(matches(&doc, doc! { "tags": "blue" }));
        assert!(matches(&doc, doc! { "tags": { "$in": ["green", "red"] } }));
        assert!(!matches(&doc, doc! { "tags": "green" }));
    }

    #[test]
    fn dotted_paths_exists_and_not() {
        let doc = doc! { "address": { "city": "Lisbon" } };

        assert!(matches(&doc, doc! { "address.city": "Lisbon" }));
        assert!(matches(&doc, doc! { "address.zip": { "$exists": false } }));
        assert!(matches(&doc, doc! { "address.city": { "$not": { "$eq": "Porto" } } }));
    }

    #[test]
    fn logical_operators() {
        let doc = doc! { "a": 1, "b": 2 };

        assert!(matches(&doc, doc! { "$or": [{ "a": 5 }, { "b": 2 }] }));
        assert!(matches(&doc, doc! { "$and": [{ "a": 1 }, { "b": 2 }] }));
        assert!(!matches(&doc, doc! { "$nor": [{ "a": 1 }] }));
    }

    #[test]
    fn unsupported_operators_are_store_errors() {
        let doc = doc! { "a": 1 };

        let err = DocumentEvaluator::new(&doc)
            .matches(&doc! { "a": { "$regex": "x" } })
            .unwrap_err();
        assert!(matches!(err, ItemStoreError::Store(_)));
    }
}
