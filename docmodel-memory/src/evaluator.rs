//! Filter evaluation and sorting for in-memory records.
//!
//! Filters arrive as Mongo-style documents, are parsed into an [`Expr`] by the core
//! crate, and are evaluated here against each stored record with the same matching
//! rules a Mongo server applies to scalar and array fields.

use bson::{Bson, DateTime, Document, oid::ObjectId};
use regex::Regex;
use std::{cmp::Ordering, collections::HashMap};

use docmodel_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, FieldOp, QueryVisitor, SortDirection, SortSpec},
};

/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64 so that int32, int64, and double values compare
/// with each other.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Numeric value (all integers and floats normalized to f64)
    Number(f64),
    /// DateTime value
    DateTime(DateTime),
    /// String value
    String(&'a str),
    /// Object id value
    ObjectId(ObjectId),
    /// Array of comparable values
    Array(Vec<Comparable<'a>>),
    /// Map/Object of comparable values
    Map(HashMap<&'a str, Comparable<'a>>),
    /// Anything else, compared by BSON equality only
    Other(&'a Bson),
}

impl<'a> Comparable<'a> {
    /// Rank of the value's type in the cross-type sort order.
    fn type_rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::Other(_) => 5,
            Comparable::ObjectId(_) => 6,
            Comparable::Bool(_) => 7,
            Comparable::DateTime(_) => 8,
        }
    }
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
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
            _ => None,
        }
    }
}

/// Resolves a dotted path such as `address.city` or `tags.0` inside a record.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = document.get(parts.next()?)?;

    for part in parts {
        current = match current {
            Bson::Document(doc) => doc.get(part)?,
            Bson::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Orders two optional values the way a sort key does: missing and null first, then
/// by type rank, then by value.
pub(crate) fn compare_values(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    let a = a.map(Comparable::from).unwrap_or(Comparable::Null);
    let b = b.map(Comparable::from).unwrap_or(Comparable::Null);

    match a.type_rank().cmp(&b.type_rank()) {
        Ordering::Equal => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        other => other,
    }
}

/// Orders two records by every key of `sort`, earlier keys first.
pub(crate) fn compare_records(a: &Document, b: &Document, sort: &SortSpec) -> Ordering {
    sort.keys()
        .iter()
        .map(|key| {
            let ordering = compare_values(lookup(a, &key.field), lookup(b, &key.field));
            match key.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        })
        .find(|ordering| *ordering != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// Sorts records in place. The sort is stable, so records that compare equal keep their
/// insertion order.
pub(crate) fn sort_records(records: &mut [&Document], sort: &SortSpec) {
    records.sort_by(|a, b| compare_records(a, b, sort));
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DocumentStoreResult<bool> {
        self.visit_expr(expr)
    }

    /// Returns the records matching `expr`, in their original order.
    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        expr: &Expr,
    ) -> DocumentStoreResult<Vec<&'a Document>> {
        let mut matched = Vec::new();

        for document in documents {
            if DocumentEvaluator::new(document).evaluate(expr)? {
                matched.push(document);
            }
        }

        Ok(matched)
    }

    fn equals(field_value: Option<&Bson>, value: &Bson) -> bool {
        match field_value {
            None => matches!(value, Bson::Null),
            Some(field_value) => {
                let expected = Comparable::from(value);

                match Comparable::from(field_value) {
                    Comparable::Array(items) if !matches!(value, Bson::Array(_)) => {
                        items.iter().any(|item| item == &expected)
                    }
                    actual => actual == expected,
                }
            }
        }
    }

    fn compare(field_value: Option<&Bson>, value: &Bson, op: FieldOp) -> bool {
        let Some(field_value) = field_value else {
            return false;
        };
        let expected = Comparable::from(value);
        let satisfies = |actual: &Comparable| match actual.partial_cmp(&expected) {
            Some(ordering) => match op {
                FieldOp::Gt => ordering == Ordering::Greater,
                FieldOp::Gte => ordering != Ordering::Less,
                FieldOp::Lt => ordering == Ordering::Less,
                FieldOp::Lte => ordering != Ordering::Greater,
                _ => false,
            },
            None => false,
        };

        match Comparable::from(field_value) {
            Comparable::Array(items) => items.iter().any(satisfies),
            actual => satisfies(&actual),
        }
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(lookup(self.document, field).is_some() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let field_value = lookup(self.document, field);

        match op {
            FieldOp::Eq => Ok(Self::equals(field_value, value)),
            FieldOp::Ne => Ok(!Self::equals(field_value, value)),
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => {
                Ok(Self::compare(field_value, value, *op))
            }
            FieldOp::AnyOf | FieldOp::NoneOf => {
                let values = value.as_array().map(Vec::as_slice).unwrap_or_default();
                let any = values.iter().any(|value| Self::equals(field_value, value));

                Ok(if *op == FieldOp::AnyOf { any } else { !any })
            }
            FieldOp::Regex => {
                let pattern = value.as_str().ok_or_else(|| {
                    DocumentStoreError::InvalidDocument(format!("$regex on {field} expects a string"))
                })?;
                let regex = Regex::new(pattern).map_err(|e| {
                    DocumentStoreError::InvalidDocument(format!("invalid $regex on {field}: {e}"))
                })?;

                Ok(match field_value {
                    Some(Bson::String(s)) => regex.is_match(s),
                    Some(Bson::Array(items)) => items
                        .iter()
                        .filter_map(Bson::as_str)
                        .any(|s| regex.is_match(s)),
                    _ => false,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn matches(document: &Document, filter: Document) -> bool {
        DocumentEvaluator::new(document)
            .evaluate(&Expr::from_filter(&filter).unwrap())
            .unwrap()
    }

    #[test]
    fn test_equality_and_arrays() {
        let record = doc! { "name": "Ann", "tags": ["a", "b"], "age": 30 };

        assert!(matches(&record, doc! { "name": "Ann" }));
        assert!(matches(&record, doc! { "tags": "b" }));
        assert!(matches(&record, doc! { "age": 30.0 }));
        assert!(!matches(&record, doc! { "name": "Bob" }));
        assert!(matches(&record, doc! { "missing": null }));
        assert!(matches(&record, doc! { "missing": { "$ne": 1 } }));
    }

    #[test]
    fn test_comparisons() {
        let record = doc! { "age": 30, "scores": [1, 9] };

        assert!(matches(&record, doc! { "age": { "$gt": 18, "$lte": 30 } }));
        assert!(!matches(&record, doc! { "age": { "$lt": 30 } }));
        assert!(matches(&record, doc! { "scores": { "$gt": 5 } }));
        assert!(!matches(&record, doc! { "missing": { "$gt": 5 } }));
    }

    #[test]
    fn test_membership() {
        let record = doc! { "_id": "abc", "tags": ["x"] };

        assert!(matches(&record, doc! { "_id": { "$in": ["abc", "def"] } }));
        assert!(!matches(&record, doc! { "_id": { "$nin": ["abc"] } }));
        assert!(matches(&record, doc! { "tags": { "$in": ["x", "y"] } }));
    }

    #[test]
    fn test_object_ids_are_distinct() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        let record = doc! { "_id": a };

        assert!(matches(&record, doc! { "_id": a }));
        assert!(!matches(&record, doc! { "_id": b }));
    }

    #[test]
    fn test_dotted_paths_and_logic() {
        let record = doc! { "address": { "city": "Springfield" }, "n": 1 };

        assert!(matches(&record, doc! { "address.city": "Springfield" }));
        assert!(matches(&record, doc! { "$or": [{ "n": 2 }, { "address.city": { "$exists": true } }] }));
        assert!(!matches(&record, doc! { "$nor": [{ "n": 1 }] }));
    }

    #[test]
    fn test_regex() {
        let record = doc! { "name": "Springfield" };

        assert!(matches(&record, doc! { "name": { "$regex": "^spring", "$options": "i" } }));
        assert!(!matches(&record, doc! { "name": { "$regex": "^spring" } }));
    }

    #[test]
    fn test_sort_orders_missing_first_and_by_key_priority() {
        let a = doc! { "population": 30, "name": "Springfield" };
        let b = doc! { "population": 800, "name": "Quahog" };
        let c = doc! { "population": 30, "name": "Alphaville" };
        let d = doc! { "name": "Nowhere" };
        let mut records = vec![&a, &b, &c, &d];

        sort_records(&mut records, &SortSpec::parse(["population", "-name"]));

        let names = records
            .iter()
            .map(|r| r.get_str("name").unwrap())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Nowhere", "Springfield", "Alphaville", "Quahog"]);
    }
}
