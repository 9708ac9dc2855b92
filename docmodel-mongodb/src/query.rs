//! Filter translation for the MongoDB backend.
//!
//! Filters are parsed into an [`Expr`] first, so that every backend accepts the same
//! operators, then rebuilt as a MongoDB query document. While rebuilding, 24-digit hex
//! strings compared against `_id` are cast to object ids, so callers may select records
//! by the string form of their id.

use bson::{Bson, Document, doc, oid::ObjectId};

use docmodel_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, FieldOp, QueryVisitor},
};

/// Translates docmodel filter expressions into MongoDB query documents.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    /// Parses `filter` and rebuilds it as a MongoDB query document.
    pub fn translate(filter: &Document) -> DocumentStoreResult<Document> {
        MongoQueryTranslator.visit_expr(&Expr::from_filter(filter)?)
    }

    fn visit_all(&mut self, exprs: &[Expr]) -> DocumentStoreResult<Vec<Document>> {
        exprs.iter().map(|expr| self.visit_expr(expr)).collect()
    }
}

/// Casts hex strings that spell an object id to the object id itself.
pub(crate) fn cast_id(value: &Bson) -> Bson {
    match value {
        Bson::String(s) => ObjectId::parse_str(s)
            .map(Bson::ObjectId)
            .unwrap_or_else(|_| value.clone()),
        Bson::Array(items) => Bson::Array(items.iter().map(cast_id).collect()),
        other => other.clone(),
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        let mut docs = self.visit_all(exprs)?;

        Ok(match docs.len() {
            0 => doc! {},
            1 => docs.remove(0),
            _ => doc! { "$and": docs },
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$or": self.visit_all(exprs)?,
        })
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$nor": [self.visit_expr(expr)?],
        })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { "$exists": should_exist },
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let value = if field == "_id" { cast_id(value) } else { value.clone() };

        Ok(doc! {
            field: match op {
                FieldOp::Eq => doc! { "$eq": value },
                FieldOp::Ne => doc! { "$ne": value },
                FieldOp::Gt => doc! { "$gt": value },
                FieldOp::Gte => doc! { "$gte": value },
                FieldOp::Lt => doc! { "$lt": value },
                FieldOp::Lte => doc! { "$lte": value },
                FieldOp::AnyOf => doc! { "$in": value },
                FieldOp::NoneOf => doc! { "$nin": value },
                FieldOp::Regex => match value {
                    Bson::String(pattern) => doc! { "$regex": pattern },
                    _ => return Err(DocumentStoreError::InvalidDocument(format!(
                        "$regex on {field} expects a string"
                    ))),
                },
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_matches_everything() {
        assert_eq!(MongoQueryTranslator::translate(&doc! {}).unwrap(), doc! {});
    }

    #[test]
    fn test_id_strings_are_cast() {
        let oid = ObjectId::new();

        let single = MongoQueryTranslator::translate(&doc! { "_id": oid.to_hex() }).unwrap();
        assert_eq!(single, doc! { "_id": { "$eq": oid } });

        let many = MongoQueryTranslator::translate(&doc! {
            "_id": { "$in": [oid.to_hex(), "1234567890abcdef"] }
        })
        .unwrap();
        assert_eq!(many, doc! { "_id": { "$in": [oid, "1234567890abcdef"] } });
    }

    #[test]
    fn test_other_fields_keep_their_strings() {
        let hex = ObjectId::new().to_hex();

        let filter = MongoQueryTranslator::translate(&doc! { "owner": hex.clone() }).unwrap();

        assert_eq!(filter, doc! { "owner": { "$eq": hex } });
    }

    #[test]
    fn test_logical_operators() {
        let filter = MongoQueryTranslator::translate(&doc! {
            "population": { "$gte": 30 },
            "$nor": [{ "name": "Quahog" }],
        })
        .unwrap();

        assert_eq!(
            filter,
            doc! {
                "$and": [
                    { "population": { "$gte": 30 } },
                    { "$nor": [{ "$or": [{ "name": { "$eq": "Quahog" } }] }] },
                ]
            }
        );
    }
}
