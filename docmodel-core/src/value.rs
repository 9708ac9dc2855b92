//! Runtime field values held by entities.
//!
//! A [`Value`] is what an [`Entity`] stores for each schema field. Raw scalars and
//! unresolved references are kept as BSON, nested entities (embedded documents and
//! populated references) are kept as [`Entity`] values, and arrays hold further values.

use bson::{Bson, DateTime, Document, oid::ObjectId};

use crate::entity::Entity;

/// A field value on an entity.
///
/// `Value::Bson` never holds `Bson::Null` or `Bson::Array`; use [`Value::from`] to
/// convert raw BSON so those are mapped to [`Value::Null`] and [`Value::Array`].
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// The field has never been assigned.
    #[default]
    Unset,
    /// The field was explicitly set to null.
    Null,
    /// A raw scalar, document, or unresolved reference id.
    Bson(Bson),
    /// An embedded document or a resolved reference.
    Entity(Box<Entity>),
    /// An array of values.
    Array(Vec<Value>),
}

impl Value {
    pub fn is_unset(&self) -> bool {
        matches!(self, Value::Unset)
    }

    /// Returns `true` for both [`Value::Unset`] and [`Value::Null`].
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Unset | Value::Null)
    }

    pub fn as_bson(&self) -> Option<&Bson> {
        match self {
            Value::Bson(bson) => Some(bson),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_bson().and_then(Bson::as_str)
    }

    /// Returns the numeric value for int32, int64, and double values.
    pub fn as_f64(&self) -> Option<f64> {
        match self.as_bson()? {
            Bson::Int32(value) => Some(*value as f64),
            Bson::Int64(value) => Some(*value as f64),
            Bson::Double(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_bson().and_then(Bson::as_bool)
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Value::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn as_entity_mut(&mut self) -> Option<&mut Entity> {
        match self {
            Value::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Returns `true` if this is an entity whose schema is embedded.
    pub fn is_embedded(&self) -> bool {
        self.as_entity()
            .is_some_and(|entity| entity.schema().is_embedded())
    }

    /// Converts this value into BSON for storage.
    ///
    /// Unset values have no BSON representation and return `None` (inside arrays they
    /// become null). Nested entities are converted with [`Entity::to_data`], keeping the
    /// id of persistable entities.
    pub fn to_bson(&self) -> Option<Bson> {
        match self {
            Value::Unset => None,
            Value::Null => Some(Bson::Null),
            Value::Bson(bson) => Some(bson.clone()),
            Value::Entity(entity) => Some(Bson::Document(
                entity.to_data(entity.schema().is_persistable()),
            )),
            Value::Array(items) => Some(Bson::Array(
                items
                    .iter()
                    .map(|item| item.to_bson().unwrap_or(Bson::Null))
                    .collect(),
            )),
        }
    }

    /// A short name for the runtime type of this value, used in error messages.
    pub fn type_name(&self) -> String {
        match self {
            Value::Unset => "undefined".into(),
            Value::Null => "null".into(),
            Value::Entity(entity) => entity.schema().name().to_string(),
            Value::Array(_) => "array".into(),
            Value::Bson(bson) => match bson {
                Bson::String(_) => "string",
                Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => "number",
                Bson::Boolean(_) => "boolean",
                Bson::DateTime(_) => "date",
                Bson::Binary(_) => "binary",
                Bson::ObjectId(_) => "objectId",
                Bson::Document(_) => "object",
                _ => "unknown",
            }
            .into(),
        }
    }

    /// Renders the value for error messages. Arrays list their elements.
    pub fn describe(&self) -> String {
        match self {
            Value::Unset => "undefined".into(),
            Value::Null => "null".into(),
            Value::Bson(Bson::String(value)) => value.clone(),
            Value::Bson(bson) => bson.to_string(),
            Value::Entity(entity) => format!("{} {}", entity.schema().name(), entity.id()),
            Value::Array(items) => format!(
                "[{}]",
                items
                    .iter()
                    .map(Value::describe)
                    .collect::<Vec<_>>()
                    .join(",")
            ),
        }
    }
}

impl From<Bson> for Value {
    fn from(bson: Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Value::Null,
            Bson::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            other => Value::Bson(other),
        }
    }
}

impl From<Entity> for Value {
    fn from(entity: Entity) -> Self {
        Value::Entity(Box::new(entity))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

macro_rules! value_from_bson {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::from(Bson::from(value))
                }
            }
        )*
    };
}

value_from_bson!(&str, String, i32, i64, f64, bool, DateTime, ObjectId, Document);
