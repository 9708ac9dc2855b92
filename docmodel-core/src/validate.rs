//! Type predicates used by entity validation.
//!
//! These functions check a single [`Value`] against a declared [`FieldType`]. They
//! are parameterized over an [`IdScheme`] because whether a value is an acceptable id
//! depends on the connected backend.

use bson::{Bson, DateTime};
use chrono::{NaiveDate, NaiveDateTime, Utc};

use crate::{backend::IdScheme, schema::FieldType, value::Value};

/// Returns `true` if `value` is acceptable for a field declared as `ty`.
///
/// Null and unset values are always acceptable; required-ness is checked separately.
pub fn is_valid_type<I: IdScheme + ?Sized>(value: &Value, ty: &FieldType, ids: &I) -> bool {
    match value {
        Value::Unset | Value::Null => return true,
        _ => {}
    }

    match ty {
        FieldType::Text => matches!(value, Value::Bson(Bson::String(_))),
        FieldType::Number => is_number(value),
        FieldType::Boolean => matches!(value, Value::Bson(Bson::Boolean(_))),
        FieldType::Binary => matches!(value, Value::Bson(Bson::Binary(_))),
        FieldType::DateTime => is_date(value),
        FieldType::NativeId => value.as_bson().is_some_and(|bson| ids.is_native_id(bson)),
        FieldType::Object => matches!(
            value,
            Value::Bson(Bson::Document(_)) | Value::Entity(_) | Value::Array(_)
        ),
        FieldType::Array => matches!(value, Value::Array(_)),
        FieldType::ArrayOf(types) if types.len() > 1 => false,
        FieldType::ArrayOf(types) => match (value, types.first()) {
            (Value::Array(items), Some(element)) => {
                items.iter().all(|item| is_valid_type(item, element, ids))
            }
            (Value::Array(_), None) => false,
            (_, None) => true,
            (_, Some(_)) => false,
        },
        FieldType::Document(schema) => {
            let schema = schema();

            match value {
                Value::Entity(entity) => entity.schema().name() == schema.name(),
                Value::Bson(bson) if schema.is_persistable() => ids.is_native_id(bson),
                _ => false,
            }
        }
    }
}

/// Returns `true` if `value` counts as empty for required-ness.
///
/// Unset, null, empty strings, empty binaries, empty documents, and empty arrays are
/// empty. Numbers, booleans, dates, ids, and entities never are.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Unset | Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Entity(_) => false,
        Value::Bson(bson) => match bson {
            Bson::String(s) => s.is_empty(),
            Bson::Document(doc) => doc.is_empty(),
            Bson::Binary(binary) => binary.bytes.is_empty(),
            _ => false,
        },
    }
}

/// Returns `true` if there are no choices or `value` is one of them.
pub fn is_in_choices(choices: Option<&[Bson]>, value: &Value) -> bool {
    let Some(choices) = choices else {
        return true;
    };

    match value {
        Value::Bson(bson) => choices.iter().any(|choice| bson_eq(choice, bson)),
        Value::Null => choices.iter().any(|choice| matches!(choice, Bson::Null)),
        _ => false,
    }
}

/// Equality that treats int32, int64, and double as one number type.
pub fn bson_eq(a: &Bson, b: &Bson) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}

fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(*n as f64),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

fn is_number(value: &Value) -> bool {
    value.as_f64().is_some_and(f64::is_finite)
}

/// Returns `true` for dates, finite numbers (milliseconds since the epoch), and strings
/// that parse as dates.
pub fn is_date(value: &Value) -> bool {
    to_date(value).is_some()
}

/// Converts a date-like value into a BSON date.
pub fn to_date(value: &Value) -> Option<DateTime> {
    match value.as_bson()? {
        Bson::DateTime(date) => Some(*date),
        Bson::Int32(millis) => Some(DateTime::from_millis(*millis as i64)),
        Bson::Int64(millis) => Some(DateTime::from_millis(*millis)),
        Bson::Double(millis) if millis.is_finite() => Some(DateTime::from_millis(*millis as i64)),
        Bson::String(s) => parse_date(s).map(DateTime::from_chrono),
        _ => None,
    }
}

fn parse_date(s: &str) -> Option<chrono::DateTime<Utc>> {
    let s = s.trim();

    chrono::DateTime::parse_from_rfc3339(s)
        .or_else(|_| chrono::DateTime::parse_from_rfc2822(s))
        .map(|date| date.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"]
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
                .map(|date| date.and_utc())
        })
        .or_else(|| {
            ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"]
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|date| date.and_utc())
        })
}
