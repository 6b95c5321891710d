//! Dot-separated field paths.
//!
//! A [`FieldPath`] is a literal sequence of field-name tokens (`"address.city"`,
//! `"tags.0"`). Paths are only ever walked token by token, nothing in a path is
//! evaluated. Numeric tokens address array elements.

use std::fmt;

use bson::{Bson, Document};

/// A parsed dot-separated field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    tokens: Vec<String>,
}

impl FieldPath {
    /// Splits `path` on `.` into field tokens.
    pub fn parse(path: &str) -> Self {
        Self {
            tokens: path
                .split('.')
                .map(str::to_string)
                .collect(),
        }
    }

    /// Returns the tokens of this path.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Resolves this path against a document.
    ///
    /// Returns `None` as soon as a step is missing, or when a step tries to descend
    /// into a value that is neither a document nor an array.
    pub fn get<'a>(&self, document: &'a Document) -> Option<&'a Bson> {
        let (first, rest) = self.tokens.split_first()?;
        let mut current = document.get(first)?;

        for token in rest {
            current = step(current, token)?;
        }

        Some(current)
    }

    /// Writes `value` at this path, creating intermediate documents as needed.
    ///
    /// Intermediate values that are not documents are replaced.
    pub fn set(&self, document: &mut Document, value: Bson) {
        let Some((last, parents)) = self.tokens.split_last() else {
            return;
        };

        let mut current = document;
        for token in parents {
            if !matches!(current.get(token), Some(Bson::Document(_))) {
                current.insert(token.clone(), Document::new());
            }
            current = match current.get_mut(token) {
                Some(Bson::Document(child)) => child,
                _ => return,
            };
        }

        current.insert(last.clone(), value);
    }

    /// Removes the value at this path, if present.
    pub fn unset(&self, document: &mut Document) -> Option<Bson> {
        let (last, parents) = self.tokens.split_last()?;

        let mut current = document;
        for token in parents {
            current = match current.get_mut(token) {
                Some(Bson::Document(child)) => child,
                _ => return None,
            };
        }

        current.remove(last)
    }
}

fn step<'a>(value: &'a Bson, token: &str) -> Option<&'a Bson> {
    match value {
        Bson::Document(doc) => doc.get(token),
        Bson::Array(items) => token
            .parse::<usize>()
            .ok()
            .and_then(|index| items.get(index)),
        _ => None,
    }
}

impl From<&str> for FieldPath {
    fn from(path: &str) -> Self {
        FieldPath::parse(path)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tokens.join("."))
    }
}
