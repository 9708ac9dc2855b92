//! Schema declarations for entity types.
//!
//! A [`Schema`] describes one entity type: its name, its collection, whether it is
//! persisted on its own or only embedded inside another entity, and the typed
//! [`Field`]s it carries. Schemas are built once with [`SchemaBuilder`] and shared
//! behind an [`Arc`].
//!
//! # Examples
//!
//! ```ignore
//! use std::sync::{Arc, LazyLock};
//! use docmodel::schema::{Field, FieldType, Schema};
//!
//! static CITY: LazyLock<Arc<Schema>> = LazyLock::new(|| {
//!     Schema::document("City")
//!         .field("name", Field::text().required())
//!         .field("population", Field::number().min(0.0))
//!         .build()
//!         .unwrap()
//! });
//!
//! fn city() -> Arc<Schema> {
//!     CITY.clone()
//! }
//!
//! let person = Schema::document("Person")
//!     .field("home", Field::reference(city))
//!     .build()?;
//! ```
//!
//! Field types that point at other schemas take a [`SchemaFn`] instead of a schema
//! value, so types can refer to each other (or themselves) before they are built.
//! Schema construction never calls these functions.

use bson::Bson;
use regex::Regex;
use std::{collections::HashMap, fmt, sync::Arc};

use crate::{
    entity::Entity,
    error::{DocumentStoreError, DocumentStoreResult},
    hooks::{Hooks, NoHooks},
    value::Value,
};

/// A lazily resolved schema, used for references and embedded documents.
pub type SchemaFn = fn() -> Arc<Schema>;

/// A custom validator. Returns `false` to reject the value.
pub type Validator = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// A virtual setter. Receives the entity and the raw value assigned under its name.
pub type Setter = Arc<dyn Fn(&mut Entity, Value) + Send + Sync>;

/// Whether an entity type is persisted on its own or lives inside another entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// Stored in its own collection and referenced by id.
    Persistable,
    /// Stored inline inside its owner.
    Embedded,
}

/// The declared type of a field.
#[derive(Clone)]
pub enum FieldType {
    Text,
    Number,
    Boolean,
    Binary,
    DateTime,
    /// The backend's native id type.
    NativeId,
    /// Any object value: a document, an entity, or an array.
    Object,
    /// An array whose elements are not checked.
    Array,
    /// An array with a declared element type. Zero element types is allowed; more
    /// than one is rejected when the schema is built.
    ArrayOf(Vec<FieldType>),
    /// Another entity type. Persistable types are stored as references, embedded types
    /// are stored inline.
    Document(SchemaFn),
}

impl FieldType {
    pub fn array_of(element: FieldType) -> Self {
        FieldType::ArrayOf(vec![element])
    }

    pub fn is_array(&self) -> bool {
        matches!(self, FieldType::Array | FieldType::ArrayOf(_))
    }

    /// Returns the declared element type of a typed array.
    pub fn element(&self) -> Option<&FieldType> {
        match self {
            FieldType::ArrayOf(types) => types.first(),
            _ => None,
        }
    }

    /// Resolves the schema of a `Document` field type.
    pub fn document_schema(&self) -> Option<Arc<Schema>> {
        match self {
            FieldType::Document(schema) => Some(schema()),
            _ => None,
        }
    }

    /// Resolves the referenced persistable schema of this field, either directly or as
    /// the element type of an array. The flag is `true` for arrays.
    pub fn reference_schema(&self) -> Option<(Arc<Schema>, bool)> {
        let (ty, is_array) = match self.element() {
            Some(element) => (element, true),
            None => (self, false),
        };

        ty.document_schema()
            .filter(|schema| schema.is_persistable())
            .map(|schema| (schema, is_array))
    }

    /// Resolves the embedded schema of this field, either directly or as the element
    /// type of an array. The flag is `true` for arrays.
    pub fn embedded_schema(&self) -> Option<(Arc<Schema>, bool)> {
        let (ty, is_array) = match self.element() {
            Some(element) => (element, true),
            None => (self, false),
        };

        ty.document_schema()
            .filter(|schema| schema.is_embedded())
            .map(|schema| (schema, is_array))
    }

    /// Type name used in validation messages.
    pub fn name(&self) -> String {
        match self {
            FieldType::Text => "String".into(),
            FieldType::Number => "Number".into(),
            FieldType::Boolean => "Boolean".into(),
            FieldType::Binary => "Buffer".into(),
            FieldType::DateTime => "Date".into(),
            FieldType::NativeId => "NativeId".into(),
            FieldType::Object => "Object".into(),
            FieldType::Array => "Array".into(),
            FieldType::ArrayOf(types) => format!(
                "[{}]",
                types.iter().map(FieldType::name).collect::<Vec<_>>().join(", ")
            ),
            FieldType::Document(schema) => schema().name().to_string(),
        }
    }

    fn check(&self) -> Result<(), String> {
        match self {
            FieldType::ArrayOf(types) if types.len() > 1 => Err(format!(
                "array fields may declare at most one element type, got {}",
                self.name()
            )),
            FieldType::ArrayOf(types) => types.iter().try_for_each(FieldType::check),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// A declared default value for a field.
#[derive(Clone)]
pub enum DefaultValue {
    /// A literal, cloned into every new entity.
    Value(Value),
    /// Called once per new entity.
    Producer(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    pub fn produce(&self) -> Value {
        match self {
            DefaultValue::Value(value) => value.clone(),
            DefaultValue::Producer(producer) => producer(),
        }
    }
}

/// A field declaration: a type plus optional constraints.
#[derive(Clone)]
pub struct Field {
    ty: FieldType,
    required: bool,
    default: Option<DefaultValue>,
    unique: bool,
    pattern: Option<Result<Regex, String>>,
    choices: Option<Vec<Bson>>,
    min: Option<f64>,
    max: Option<f64>,
    validator: Option<Validator>,
    private: bool,
}

impl Field {
    pub fn new(ty: FieldType) -> Self {
        Self {
            ty,
            required: false,
            default: None,
            unique: false,
            pattern: None,
            choices: None,
            min: None,
            max: None,
            validator: None,
            private: false,
        }
    }

    pub fn text() -> Self {
        Self::new(FieldType::Text)
    }

    pub fn number() -> Self {
        Self::new(FieldType::Number)
    }

    pub fn boolean() -> Self {
        Self::new(FieldType::Boolean)
    }

    pub fn binary() -> Self {
        Self::new(FieldType::Binary)
    }

    pub fn date() -> Self {
        Self::new(FieldType::DateTime)
    }

    pub fn native_id() -> Self {
        Self::new(FieldType::NativeId)
    }

    pub fn object() -> Self {
        Self::new(FieldType::Object)
    }

    pub fn array() -> Self {
        Self::new(FieldType::Array)
    }

    pub fn array_of(element: FieldType) -> Self {
        Self::new(FieldType::array_of(element))
    }

    /// A reference to, or an embedding of, another entity type.
    pub fn document(schema: SchemaFn) -> Self {
        Self::new(FieldType::Document(schema))
    }

    /// An array of references to, or embeddings of, another entity type.
    pub fn documents(schema: SchemaFn) -> Self {
        Self::array_of(FieldType::Document(schema))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Value(value.into()));
        self
    }

    pub fn default_with<F>(mut self, producer: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Producer(Arc::new(producer)));
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Requires text values to match `pattern`. An invalid pattern is reported when the
    /// schema is built.
    pub fn pattern(mut self, pattern: &str) -> Self {
        self.pattern = Some(Regex::new(pattern).map_err(|e| e.to_string()));
        self
    }

    pub fn choices<I, T>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Bson>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn validate<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Excludes the field from [`Entity::to_json`]. Private fields are still persisted.
    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }

    pub fn ty(&self) -> &FieldType {
        &self.ty
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn default_value(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn pattern_regex(&self) -> Option<&Regex> {
        self.pattern.as_ref().and_then(|pattern| pattern.as_ref().ok())
    }

    pub fn choice_values(&self) -> Option<&[Bson]> {
        self.choices.as_deref()
    }

    pub fn min_value(&self) -> Option<f64> {
        self.min
    }

    pub fn max_value(&self) -> Option<f64> {
        self.max
    }

    pub fn validator(&self) -> Option<&Validator> {
        self.validator.as_ref()
    }

    pub fn is_private(&self) -> bool {
        self.private
    }
}

impl From<FieldType> for Field {
    fn from(ty: FieldType) -> Self {
        Field::new(ty)
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("ty", &self.ty)
            .field("required", &self.required)
            .field("unique", &self.unique)
            .field("private", &self.private)
            .finish_non_exhaustive()
    }
}

/// A built entity type.
pub struct Schema {
    name: String,
    collection: String,
    kind: EntityKind,
    fields: Vec<(String, Field)>,
    setters: HashMap<String, Setter>,
    hooks: Arc<dyn Hooks>,
}

impl Schema {
    pub fn builder(name: impl Into<String>, kind: EntityKind) -> SchemaBuilder {
        SchemaBuilder::new(name, kind)
    }

    /// Starts a persistable schema.
    pub fn document(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name, EntityKind::Persistable)
    }

    /// Starts an embedded schema.
    pub fn embedded(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name, EntityKind::Embedded)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The collection entities of this type are stored in. Defaults to the lowercased
    /// type name with an `s` appended.
    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn is_persistable(&self) -> bool {
        self.kind == EntityKind::Persistable
    }

    pub fn is_embedded(&self) -> bool {
        self.kind == EntityKind::Embedded
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, field)| field)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn setter(&self, name: &str) -> Option<&Setter> {
        self.setters.get(name)
    }

    pub fn hooks(&self) -> &Arc<dyn Hooks> {
        &self.hooks
    }

    /// Names of fields declared unique.
    pub fn unique_fields(&self) -> impl Iterator<Item = &str> {
        self.fields()
            .filter(|(_, field)| field.is_unique())
            .map(|(name, _)| name)
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("collection", &self.collection)
            .field("kind", &self.kind)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Schema`].
pub struct SchemaBuilder {
    name: String,
    collection: Option<String>,
    kind: EntityKind,
    fields: Vec<(String, Field)>,
    setters: HashMap<String, Setter>,
    hooks: Arc<dyn Hooks>,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            name: name.into(),
            collection: None,
            kind,
            fields: Vec::new(),
            setters: HashMap::new(),
            hooks: Arc::new(NoHooks),
        }
    }

    /// Overrides the collection name.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collection = Some(name.into());
        self
    }

    /// Declares a field. Accepts either a [`Field`] or a bare [`FieldType`].
    pub fn field(mut self, name: impl Into<String>, field: impl Into<Field>) -> Self {
        self.fields.push((name.into(), field.into()));
        self
    }

    /// Declares a virtual setter. Raw data assigned under `name` is passed to `setter`
    /// instead of being stored.
    pub fn setter<F>(mut self, name: impl Into<String>, setter: F) -> Self
    where
        F: Fn(&mut Entity, Value) + Send + Sync + 'static,
    {
        self.setters.insert(name.into(), Arc::new(setter));
        self
    }

    pub fn hooks(mut self, hooks: impl Hooks + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    /// Builds the schema.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Configuration`] if a field name is empty, starts
    /// with an underscore, or is declared twice, if an array field declares more than
    /// one element type, or if a pattern fails to compile.
    pub fn build(self) -> DocumentStoreResult<Arc<Schema>> {
        let mut seen = Vec::with_capacity(self.fields.len());

        for (name, field) in &self.fields {
            if name.is_empty() || name.starts_with('_') {
                return Err(DocumentStoreError::Configuration(format!(
                    "{}: field names may not be empty or start with an underscore, got '{name}'",
                    self.name
                )));
            }
            if seen.contains(&name) {
                return Err(DocumentStoreError::Configuration(format!(
                    "{}: field '{name}' is declared more than once",
                    self.name
                )));
            }
            seen.push(name);

            field.ty.check().map_err(|e| {
                DocumentStoreError::Configuration(format!("{}.{name}: {e}", self.name))
            })?;

            if let Some(Err(e)) = &field.pattern {
                return Err(DocumentStoreError::Configuration(format!(
                    "{}.{name}: invalid pattern: {e}",
                    self.name
                )));
            }
        }

        let collection = self
            .collection
            .unwrap_or_else(|| format!("{}s", self.name.to_lowercase()));

        Ok(Arc::new(Schema {
            name: self.name,
            collection,
            kind: self.kind,
            fields: self.fields,
            setters: self.setters,
            hooks: self.hooks,
        }))
    }
}
