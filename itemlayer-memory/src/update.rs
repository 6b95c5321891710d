//! Application of `$set`/`$unset` update documents to stored documents.

use bson::{Bson, Document, oid::ObjectId};

use itemlayer_core::{
    error::{ItemStoreError, ItemStoreResult},
    path::FieldPath,
};

use crate::evaluator::is_operator_document;

/// Identity field of stored documents.
pub(crate) const ID_FIELD: &str = "_id";

/// Applies `update` to `target` in place.
///
/// Returns `true` if the document changed.
///
/// # Errors
///
/// Returns [`ItemStoreError::Store`] if `update` is empty, contains anything other than
/// `$set` and `$unset`, or tries to change the document's `_id`.
pub(crate) fn apply_update(target: &mut Document, update: &Document) -> ItemStoreResult<bool> {
    if update.is_empty() {
        return Err(ItemStoreError::Store("update document must not be empty".into()));
    }

    let before = target.clone();

    for (op, fields) in update {
        let fields = fields
            .as_document()
            .ok_or_else(|| ItemStoreError::Store(format!("{op} needs a document of fields")))?;

        match op.as_str() {
            "$set" => {
                for (path, value) in fields {
                    if path == ID_FIELD && target.get(ID_FIELD).is_some_and(|id| id != value) {
                        return Err(ItemStoreError::Store(format!("field '{ID_FIELD}' is immutable")));
                    }
                    FieldPath::parse(path).set(target, value.clone());
                }
            },
            "$unset" => {
                for path in fields.keys() {
                    if path == ID_FIELD {
                        return Err(ItemStoreError::Store(format!("field '{ID_FIELD}' is immutable")));
                    }
                    FieldPath::parse(path).unset(target);
                }
            },
            other => return Err(ItemStoreError::Store(format!("unsupported update operator {other}"))),
        }
    }

    Ok(*target != before)
}

/// Builds the document an upsert starts from: the filter's equality fields.
///
/// Operator clauses are skipped except for `$eq`, whose operand is taken as the value.
pub(crate) fn upsert_seed(filter: &Document) -> Document {
    let mut seed = Document::new();

    for (key, condition) in filter {
        if key.starts_with('$') {
            continue;
        }

        let value = match condition {
            Bson::Document(ops) if is_operator_document(ops) => match ops.get("$eq") {
                Some(value) => value.clone(),
                None => continue,
            },
            value => value.clone(),
        };

        FieldPath::parse(key).set(&mut seed, value);
    }

    seed
}

/// Ensures `document` carries an `_id`, generating an ObjectId when missing.
///
/// The identifier is moved to the front of the document and returned.
pub(crate) fn with_identity(document: Document) -> (Bson, Document) {
    let id = document
        .get(ID_FIELD)
        .cloned()
        .unwrap_or_else(|| Bson::ObjectId(ObjectId::new()));

    let mut stored = Document::new();
    stored.insert(ID_FIELD, id.clone());
    for (key, value) in document {
        if key != ID_FIELD {
            stored.insert(key, value);
        }
    }

    (id, stored)
}
