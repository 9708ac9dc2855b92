//! Entity instances.
//!
//! An [`Entity`] is one instance of a [`Schema`]: an id plus a value for every declared
//! field. This module covers creating entities (from scratch or from raw data),
//! reading and writing their fields, validating them, normalizing their values, and
//! converting them back into plain data. Persistence lives in
//! [`document`](crate::document); finders live in [`collection`](crate::collection).

use bson::{Bson, Document};
use futures::future::try_join_all;
use std::{collections::HashMap, fmt, sync::Arc};
use tracing::warn;

use crate::{
    backend::IdScheme,
    error::{DocumentStoreError, DocumentStoreResult, ValidationError, ValidationErrorKind},
    hooks::{self, HookKind},
    schema::{Field, FieldType, Schema},
    validate::{is_empty_value, is_in_choices, is_valid_type, to_date},
    value::Value,
};

/// Either a single item or a list: one item when exactly one record was processed,
/// a list otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn from_items(mut items: Vec<T>) -> Self {
        match items.pop() {
            Some(item) if items.is_empty() => OneOrMany::One(item),
            Some(item) => {
                items.push(item);
                OneOrMany::Many(items)
            }
            None => OneOrMany::Many(items),
        }
    }

    /// Returns the single item, or `None` if this is a list.
    pub fn into_one(self) -> Option<T> {
        match self {
            OneOrMany::One(item) => Some(item),
            OneOrMany::Many(_) => None,
        }
    }

    /// Returns all items as a list.
    pub fn into_many(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }

    pub fn is_many(&self) -> bool {
        matches!(self, OneOrMany::Many(_))
    }
}

/// An instance of a [`Schema`].
///
/// The id is null until the entity is first saved (or until the caller assigns one),
/// and cannot change afterwards.
#[derive(Clone)]
pub struct Entity {
    schema: Arc<Schema>,
    id: Bson,
    values: HashMap<String, Value>,
}

impl Entity {
    /// Creates an entity with every field set to its default.
    ///
    /// Fields with a declared default get it, array fields without one get an empty
    /// array, and everything else is unset. No hooks run.
    pub fn instantiate(schema: Arc<Schema>) -> Self {
        let values = schema
            .fields()
            .map(|(name, field)| (name.to_string(), initial_value(field)))
            .collect();

        Self { schema, id: Bson::Null, values }
    }

    /// Creates one entity, or one per element when `data` is an array, and runs the
    /// `pre_init` hook on each. A single-element array gives a single entity.
    ///
    /// Failures of `pre_init` are logged and otherwise ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] if `data` (or an element of it) is
    /// not a document.
    pub fn create(schema: Arc<Schema>, data: Option<&Bson>) -> DocumentStoreResult<OneOrMany<Entity>> {
        match data {
            None => {
                let mut entity = Self::instantiate(schema);
                entity.pre_init(None);
                Ok(OneOrMany::One(entity))
            }
            Some(Bson::Array(items)) => items
                .iter()
                .map(|item| {
                    let mut entity = Self::from_bson(schema.clone(), item)?;
                    entity.pre_init(Some(item));
                    Ok(entity)
                })
                .collect::<DocumentStoreResult<Vec<_>>>()
                .map(OneOrMany::from_items),
            Some(item) => {
                let mut entity = Self::from_bson(schema, item)?;
                entity.pre_init(Some(item));
                Ok(OneOrMany::One(entity))
            }
        }
    }

    /// Rebuilds entities from stored data, one per element when `data` is an array.
    /// A single-element array gives a single entity. No hooks run.
    pub fn from_data(schema: Arc<Schema>, data: &Bson) -> DocumentStoreResult<OneOrMany<Entity>> {
        match data {
            Bson::Array(items) => items
                .iter()
                .map(|item| Self::from_bson(schema.clone(), item))
                .collect::<DocumentStoreResult<Vec<_>>>()
                .map(OneOrMany::from_items),
            item => Self::from_bson(schema, item).map(OneOrMany::One),
        }
    }

    fn from_bson(schema: Arc<Schema>, data: &Bson) -> DocumentStoreResult<Entity> {
        match data {
            Bson::Document(doc) => Self::from_document(schema, doc),
            other => Err(DocumentStoreError::InvalidDocument(format!(
                "cannot build a {} from {other}",
                schema.name()
            ))),
        }
    }

    /// Rebuilds an entity from a single stored record.
    ///
    /// `_id` becomes the entity id. Null values fall back to the field default. Nested
    /// documents under entity-typed fields become entities. Keys naming a virtual setter
    /// are passed to it; any other unknown key is dropped.
    pub fn from_document(schema: Arc<Schema>, data: &Document) -> DocumentStoreResult<Entity> {
        let mut entity = Self::instantiate(schema.clone());

        for (key, raw) in data {
            if key == "_id" {
                entity.id = raw.clone();
                continue;
            }

            if let Some(field) = schema.field(key) {
                let value = match raw {
                    Bson::Null | Bson::Undefined => initial_value(field),
                    raw => field_value(field, raw)?,
                };
                entity.values.insert(key.clone(), value);
            } else if let Some(setter) = schema.setter(key) {
                setter(&mut entity, Value::from(raw.clone()));
            }
        }

        Ok(entity)
    }

    pub(crate) fn pre_init(&mut self, data: Option<&Bson>) {
        let hooks = self.schema.hooks().clone();

        if let Err(e) = hooks.pre_init(self, data) {
            warn!(entity = %self.schema.name(), error = %e, "pre_init hook failed");
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn collection_name(&self) -> &str {
        self.schema.collection_name()
    }

    /// The entity id, or `Bson::Null` if none has been assigned yet.
    pub fn id(&self) -> &Bson {
        &self.id
    }

    pub fn has_id(&self) -> bool {
        !matches!(self.id, Bson::Null | Bson::Undefined)
    }

    /// Assigns a caller-chosen id before the first save.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] if the entity already has an id.
    pub fn set_id(&mut self, id: impl Into<Bson>) -> DocumentStoreResult<()> {
        if self.has_id() {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "{} already has id {}",
                self.schema.name(),
                self.id
            )));
        }
        self.id = id.into();
        Ok(())
    }

    pub(crate) fn assign_id(&mut self, id: Bson) {
        self.id = id;
    }

    /// Returns the value of a field, or `None` if the schema does not declare it (or it
    /// was projected away).
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.values.get_mut(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn get_entity(&self, key: &str) -> Option<&Entity> {
        self.get(key).and_then(Value::as_entity)
    }

    pub fn get_array(&self, key: &str) -> Option<&[Value]> {
        self.get(key).and_then(Value::as_array)
    }

    /// Assigns a field, or passes the value to the virtual setter of that name.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] if `key` is neither a field nor a
    /// setter of this schema.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> DocumentStoreResult<()> {
        if self.schema.contains(key) {
            self.values.insert(key.to_string(), value.into());
            return Ok(());
        }

        let schema = self.schema.clone();
        match schema.setter(key) {
            Some(setter) => {
                setter(self, value.into());
                Ok(())
            }
            None => Err(DocumentStoreError::InvalidDocument(format!(
                "{} has no field {key}",
                schema.name()
            ))),
        }
    }

    /// Field values in declaration order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.schema
            .fields()
            .filter_map(|(name, _)| self.values.get(name).map(|value| (name, value)))
    }

    /// The default a field would get on a new entity, without assigning it.
    pub fn default_value(&self, key: &str) -> Value {
        self.schema.field(key).map(initial_value).unwrap_or_default()
    }

    /// Assigns declared defaults to fields that are still unset. Fields dropped by
    /// [`retain_fields`](Entity::retain_fields) stay absent.
    pub(crate) fn apply_missing_defaults(&mut self) {
        for (name, field) in self.schema.fields() {
            let Some(default) = field.default_value() else {
                continue;
            };
            if let Some(value) = self.values.get_mut(name).filter(|value| value.is_unset()) {
                *value = default.produce();
            }
        }
    }

    /// Returns `true` if some fields were dropped by a projection.
    pub fn is_partial(&self) -> bool {
        self.schema.fields().any(|(name, _)| !self.values.contains_key(name))
    }

    /// Keeps only the named fields. The id is always kept.
    ///
    /// Dropped fields are neither defaulted, validated nor written by a later save, so
    /// saving a partial entity updates only the fields it still holds. Setting a dropped
    /// field brings it back.
    pub fn retain_fields(&mut self, fields: &[String]) {
        self.values.retain(|name, _| fields.iter().any(|field| field == name));
    }

    /// Checks every field and returns all failures, at most one per field.
    ///
    /// Embedded entities are validated recursively in place of the type check. For other
    /// fields the checks run in order (type, required, pattern, choices, min, max, custom
    /// validator) and stop at the first failure.
    pub fn validation_errors<I: IdScheme + ?Sized>(&self, ids: &I) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let collection = self.collection_name();

        for (key, field) in self.schema.fields() {
            let Some(value) = self.values.get(key) else {
                continue;
            };

            match value {
                Value::Entity(entity) if entity.schema().is_embedded() => {
                    errors.extend(entity.validation_errors(ids));
                    continue;
                }
                Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_embedded) => {
                    errors.extend(
                        items
                            .iter()
                            .filter_map(Value::as_entity)
                            .flat_map(|entity| entity.validation_errors(ids)),
                    );
                    continue;
                }
                _ => {}
            }

            if let Some(kind) = check_field(field, value, ids) {
                errors.push(ValidationError::new(collection, key, kind));
            }
        }

        errors
    }

    /// Validates the entity, failing with the first error found.
    pub fn validate<I: IdScheme + ?Sized>(&self, ids: &I) -> DocumentStoreResult<()> {
        match self.validation_errors(ids).into_iter().next() {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }

    /// Normalizes field values for storage: date-like values under date fields become
    /// BSON dates. Embedded entities are normalized recursively.
    pub fn canonicalize(&mut self) {
        let schema = self.schema.clone();

        for (key, field) in schema.fields() {
            let Some(value) = self.values.get_mut(key) else {
                continue;
            };
            let is_date_field = matches!(field.ty(), FieldType::DateTime)
                || matches!(field.ty().element(), Some(FieldType::DateTime));

            match value {
                Value::Entity(entity) if entity.schema().is_embedded() => entity.canonicalize(),
                Value::Array(items) => {
                    for item in items {
                        match item {
                            Value::Entity(entity) if entity.schema().is_embedded() => {
                                entity.canonicalize()
                            }
                            item if is_date_field => canonicalize_date(item),
                            _ => {}
                        }
                    }
                }
                value if is_date_field => canonicalize_date(value),
                _ => {}
            }
        }
    }

    /// Converts the entity into a plain document.
    ///
    /// Unset fields are skipped. Embedded entities become nested documents and resolved
    /// references are written out in full, including their id.
    pub fn to_data(&self, keep_id: bool) -> Document {
        let mut data = Document::new();

        if keep_id {
            data.insert("_id", self.id.clone());
        }
        for (key, value) in self.values() {
            if let Some(bson) = value.to_bson() {
                data.insert(key, bson);
            }
        }

        data
    }

    /// Converts the entity into JSON for presentation, leaving out private fields.
    pub fn to_json(&self) -> DocumentStoreResult<serde_json::Value> {
        Ok(serde_json::to_value(Bson::Document(self.public_data()))?)
    }

    fn public_data(&self) -> Document {
        let mut data = Document::new();

        if self.schema.is_persistable() {
            data.insert("_id", self.id.clone());
        }
        for (key, field) in self.schema.fields() {
            if field.is_private() {
                continue;
            }
            if let Some(bson) = self.values.get(key).and_then(public_bson) {
                data.insert(key, bson);
            }
        }

        data
    }

    /// Runs a lifecycle hook on this entity's embedded entities (concurrently), then on
    /// the entity itself.
    ///
    /// Only directly embedded entities take part; entities embedded inside those do not.
    pub async fn run_hooks(&mut self, kind: HookKind) -> DocumentStoreResult<()> {
        let embedded = self
            .values
            .values_mut()
            .flat_map(|value| match value {
                Value::Entity(entity) if entity.schema().is_embedded() => vec![entity.as_mut()],
                Value::Array(items) => items
                    .iter_mut()
                    .filter_map(|item| match item {
                        Value::Entity(entity) if entity.schema().is_embedded() => {
                            Some(entity.as_mut())
                        }
                        _ => None,
                    })
                    .collect(),
                _ => Vec::new(),
            })
            .collect::<Vec<_>>();

        try_join_all(embedded.into_iter().map(|entity| entity.run_own_hooks(kind))).await?;

        self.run_own_hooks(kind).await
    }

    async fn run_own_hooks(&mut self, kind: HookKind) -> DocumentStoreResult<()> {
        let hooks = self.schema.hooks().clone();

        hooks::invoke(hooks.as_ref(), kind, self).await
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name() == other.schema.name()
            && self.id == other.id
            && self.values == other.values
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.schema.name());
        s.field("_id", &self.id);
        for (key, value) in self.values() {
            s.field(key, value);
        }
        s.finish()
    }
}

fn initial_value(field: &Field) -> Value {
    match field.default_value() {
        Some(default) => default.produce(),
        None if field.ty().is_array() => Value::Array(Vec::new()),
        None => Value::Unset,
    }
}

/// Converts a stored BSON value for `field`, rebuilding nested entities.
fn field_value(field: &Field, raw: &Bson) -> DocumentStoreResult<Value> {
    let target = field
        .ty()
        .element()
        .unwrap_or(field.ty())
        .document_schema();

    let Some(schema) = target else {
        return Ok(Value::from(raw.clone()));
    };

    let nested = |raw: &Bson| -> DocumentStoreResult<Value> {
        match raw {
            Bson::Document(doc) => Ok(Value::from(Entity::from_document(schema.clone(), doc)?)),
            other => Ok(Value::from(other.clone())),
        }
    };

    match (raw, field.ty().is_array()) {
        (Bson::Array(items), true) => Ok(Value::Array(
            items.iter().map(nested).collect::<DocumentStoreResult<_>>()?,
        )),
        (Bson::Document(_), true) => Ok(Value::Array(vec![nested(raw)?])),
        (raw, _) => nested(raw),
    }
}

fn check_field<I: IdScheme + ?Sized>(field: &Field, value: &Value, ids: &I) -> Option<ValidationErrorKind> {
    if !is_valid_type(value, field.ty(), ids) {
        return Some(ValidationErrorKind::Type {
            expected: field.ty().name(),
            actual: match value {
                Value::Array(_) => value.describe(),
                _ => value.type_name(),
            },
        });
    }

    if field.is_required() && is_empty_value(value) {
        return Some(ValidationErrorKind::Required { actual: value.describe() });
    }

    if let (Some(pattern), Some(text)) = (field.pattern_regex(), value.as_str()) {
        if !pattern.is_match(text) {
            return Some(ValidationErrorKind::Pattern {
                pattern: pattern.as_str().to_string(),
                actual: text.to_string(),
            });
        }
    }

    if !is_in_choices(field.choice_values(), value) {
        return Some(ValidationErrorKind::Choice {
            choices: field
                .choice_values()
                .unwrap_or_default()
                .iter()
                .map(|choice| Value::from(choice.clone()).describe())
                .collect(),
            actual: value.describe(),
        });
    }

    if let Some(number) = value.as_f64() {
        if let Some(min) = field.min_value().filter(|min| number < *min) {
            return Some(ValidationErrorKind::Min { min, actual: value.describe() });
        }
        if let Some(max) = field.max_value().filter(|max| number > *max) {
            return Some(ValidationErrorKind::Max { max, actual: value.describe() });
        }
    }

    if let Some(validator) = field.validator() {
        if !validator(value) {
            return Some(ValidationErrorKind::Custom { actual: value.describe() });
        }
    }

    None
}

fn canonicalize_date(value: &mut Value) {
    if let Some(date) = to_date(value) {
        *value = Value::Bson(Bson::DateTime(date));
    }
}

fn public_bson(value: &Value) -> Option<Bson> {
    match value {
        Value::Entity(entity) => Some(Bson::Document(entity.public_data())),
        Value::Array(items) => Some(Bson::Array(
            items
                .iter()
                .map(|item| public_bson(item).unwrap_or(Bson::Null))
                .collect(),
        )),
        other => other.to_bson(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{backend::NativeIdType, schema::Field};
    use bson::{bson, doc};
    use std::sync::{
        LazyLock,
        atomic::{AtomicUsize, Ordering},
    };

    struct TextIds;

    impl IdScheme for TextIds {
        fn to_canonical_id(&self, id: &Bson) -> String {
            match id {
                Bson::String(s) => s.clone(),
                other => other.to_string(),
            }
        }

        fn is_native_id(&self, value: &Bson) -> bool {
            matches!(value, Bson::String(s) if s.len() == 16)
        }

        fn native_id_type(&self) -> NativeIdType {
            NativeIdType::String
        }
    }

    static ADDRESS: LazyLock<Arc<Schema>> = LazyLock::new(|| {
        Schema::embedded("Address")
            .field("street", Field::text().required())
            .field("zip", Field::number().min(0.0))
            .build()
            .unwrap()
    });

    fn address() -> Arc<Schema> {
        ADDRESS.clone()
    }

    static PERSON: LazyLock<Arc<Schema>> = LazyLock::new(|| {
        Schema::document("Person")
            .field("name", Field::text().required())
            .field("age", Field::number().min(0.0).max(150.0))
            .field("email", Field::text().pattern(r"^\S+@\S+$"))
            .field("color", Field::text().choices(["red", "green"]).default("red"))
            .field("nicknames", Field::array_of(FieldType::Text))
            .field("born", Field::date())
            .field("home", Field::document(address))
            .field("previous", Field::documents(address))
            .field("password", Field::text().private())
            .setter("full_name", |entity, value| {
                if let Some(name) = value.as_str().and_then(|s| s.split(' ').next()) {
                    let _ = entity.set("name", name);
                }
            })
            .build()
            .unwrap()
    });

    fn person() -> Arc<Schema> {
        PERSON.clone()
    }

    #[test]
    fn test_instantiate_applies_defaults() {
        let entity = Entity::instantiate(person());

        assert_eq!(entity.id(), &Bson::Null);
        assert_eq!(entity.get_str("color"), Some("red"));
        assert_eq!(entity.get("nicknames"), Some(&Value::Array(vec![])));
        assert_eq!(entity.get("name"), Some(&Value::Unset));
        assert_eq!(entity.get("unknown"), None);
    }

    #[test]
    fn test_from_data_builds_nested_entities() {
        let data = bson!({
            "_id": "0123456789abcdef",
            "name": "Ann",
            "home": { "street": "Main", "zip": 12345 },
            "previous": [{ "street": "Old" }, { "street": "Older" }],
            "color": null,
            "full_name": "Ignored Surname",
            "unknown": 1,
        });

        let entity = Entity::from_data(person(), &data).unwrap().into_one().unwrap();

        assert_eq!(entity.id(), &Bson::String("0123456789abcdef".into()));
        assert_eq!(entity.get_str("name"), Some("Ignored"));
        assert_eq!(entity.get_str("color"), Some("red"));
        assert_eq!(entity.get_entity("home").unwrap().get_str("street"), Some("Main"));
        assert_eq!(entity.get_array("previous").unwrap().len(), 2);
        assert!(entity.get_array("previous").unwrap().iter().all(Value::is_embedded));
        assert!(!entity.to_data(true).contains_key("unknown"));
    }

    #[test]
    fn test_from_data_array_gives_many() {
        let data = bson!([{ "name": "a" }, { "name": "b" }]);

        let entities = Entity::from_data(person(), &data).unwrap();

        assert!(entities.is_many());
        assert_eq!(entities.into_many().len(), 2);
    }

    #[test]
    fn test_from_data_single_element_array_gives_one() {
        let one = Entity::from_data(person(), &bson!([{ "name": "a" }])).unwrap();
        assert!(!one.is_many());
        assert_eq!(one.into_one().unwrap().get_str("name"), Some("a"));

        let created = Entity::create(person(), Some(&bson!([{ "name": "b" }]))).unwrap();
        assert!(!created.is_many());

        let none = Entity::from_data(person(), &bson!([])).unwrap();
        assert!(none.is_many());
        assert!(none.into_many().is_empty());
    }

    #[test]
    fn test_partial_entity_skips_dropped_fields() {
        let mut entity = Entity::from_data(person(), &bson!({ "_id": "0123456789abcdef", "name": "Ann", "age": 40 }))
            .unwrap()
            .into_one()
            .unwrap();
        assert!(!entity.is_partial());

        entity.retain_fields(&["age".to_string()]);
        assert!(entity.is_partial());
        assert_eq!(entity.get("name"), None);

        entity.apply_missing_defaults();
        assert!(entity.validation_errors(&TextIds).is_empty());
        assert_eq!(entity.to_data(true), doc! { "_id": "0123456789abcdef", "age": 40 });

        entity.set("color", "green").unwrap();
        assert_eq!(entity.to_data(false), doc! { "age": 40, "color": "green" });
    }

    #[test]
    fn test_from_data_rejects_scalars() {
        let result = Entity::from_data(person(), &Bson::Int32(1));

        assert!(matches!(result, Err(DocumentStoreError::InvalidDocument(_))));
    }

    #[test]
    fn test_set_unknown_field_fails() {
        let mut entity = Entity::instantiate(person());

        assert!(entity.set("name", "Ann").is_ok());
        assert!(entity.set("nope", 1).is_err());
    }

    #[test]
    fn test_id_is_assigned_once() {
        let mut entity = Entity::instantiate(person());

        entity.set_id("1234567890abcdef").unwrap();

        assert!(entity.set_id("fedcba0987654321").is_err());
        assert_eq!(entity.id(), &Bson::String("1234567890abcdef".into()));
    }

    #[test]
    fn test_required_field() {
        let entity = Entity::instantiate(person());

        let errors = entity.validation_errors(&TextIds);

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "name");
        assert!(matches!(errors[0].kind, ValidationErrorKind::Required { .. }));
        assert_eq!(errors[0].to_string(), "Key persons.name is required, but got undefined");
    }

    #[test]
    fn test_every_failing_field_is_reported() {
        let mut entity = Entity::instantiate(person());
        entity.set("name", 42).unwrap();
        entity.set("age", 200).unwrap();
        entity.set("email", "not-an-email").unwrap();
        entity.set("color", "blue").unwrap();

        let fields = entity
            .validation_errors(&TextIds)
            .into_iter()
            .map(|error| error.field)
            .collect::<Vec<_>>();

        assert_eq!(fields, vec!["name", "age", "email", "color"]);
        assert!(matches!(
            entity.validate(&TextIds),
            Err(DocumentStoreError::Validation(ValidationError { ref field, .. })) if field == "name"
        ));
    }

    #[test]
    fn test_mixed_array_fails_type_check() {
        let mut entity = Entity::instantiate(person());
        entity.set("name", "Ann").unwrap();
        entity.set("nicknames", Value::from(bson!(["a", 1]))).unwrap();

        let errors = entity.validation_errors(&TextIds);

        assert_eq!(
            errors[0].kind,
            ValidationErrorKind::Type { expected: "[String]".into(), actual: "[a,1]".into() }
        );
    }

    #[test]
    fn test_embedded_errors_use_embedded_collection() {
        let mut entity = Entity::instantiate(person());
        entity.set("name", "Ann").unwrap();
        entity.set("home", Entity::instantiate(address())).unwrap();

        let errors = entity.validation_errors(&TextIds);

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].collection, "addresss");
        assert_eq!(errors[0].field, "street");
    }

    #[test]
    fn test_custom_validator() {
        let schema = Schema::document("Even")
            .field(
                "n",
                Field::number().validate(|value| value.as_f64().is_some_and(|n| n % 2.0 == 0.0)),
            )
            .build()
            .unwrap();
        let mut entity = Entity::instantiate(schema);

        entity.set("n", 3).unwrap();
        assert!(entity.validate(&TextIds).is_err());

        entity.set("n", 4).unwrap();
        assert!(entity.validate(&TextIds).is_ok());
    }

    #[test]
    fn test_canonicalize_dates() {
        let mut entity = Entity::instantiate(person());
        entity.set("born", "1970-01-01T00:00:02Z").unwrap();

        entity.canonicalize();

        assert_eq!(
            entity.get("born"),
            Some(&Value::Bson(Bson::DateTime(bson::DateTime::from_millis(2000))))
        );
    }

    #[test]
    fn test_round_trip_through_data() {
        let mut entity = Entity::instantiate(person());
        entity.assign_id(Bson::String("0123456789abcdef".into()));
        entity.set("name", "Ann").unwrap();
        entity.set("age", 30).unwrap();
        entity.set("nicknames", vec!["a", "b"]).unwrap();
        entity.set("password", "secret").unwrap();
        let mut home = Entity::instantiate(address());
        home.set("street", "Main").unwrap();
        entity.set("home", home).unwrap();

        let data = entity.to_data(true);
        let rebuilt = Entity::from_document(person(), &data).unwrap();

        assert_eq!(rebuilt, entity);
        assert_eq!(data.get_str("password").unwrap(), "secret");
    }

    #[test]
    fn test_to_json_hides_private_fields() {
        let mut entity = Entity::instantiate(person());
        entity.set("name", "Ann").unwrap();
        entity.set("password", "secret").unwrap();

        let json = entity.to_json().unwrap();

        assert_eq!(json["name"], "Ann");
        assert!(json.get("password").is_none());
        assert!(json.get("age").is_none());
    }

    #[test]
    fn test_pre_init_failure_is_swallowed() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        struct Failing;

        impl crate::hooks::Hooks for Failing {
            fn pre_init(&self, _entity: &mut Entity, _data: Option<&Bson>) -> DocumentStoreResult<()> {
                CALLS.fetch_add(1, Ordering::SeqCst);
                Err(DocumentStoreError::InvalidDocument("nope".into()))
            }
        }

        let schema = Schema::document("Thing").hooks(Failing).build().unwrap();

        let created = Entity::create(schema, Some(&bson!([{}, {}]))).unwrap();

        assert_eq!(created.into_many().len(), 2);
        assert_eq!(CALLS.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_to_data_skips_unset() {
        let mut entity = Entity::instantiate(person());
        entity.set("name", "Ann").unwrap();

        let data = entity.to_data(false);

        assert_eq!(data, doc! { "name": "Ann", "color": "red", "nicknames": [], "previous": [] });
    }
}
