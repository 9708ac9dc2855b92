//! Persistence of entities.
//!
//! Saving runs an entity through a fixed pipeline:
//!
//! 1. `pre_validate` hooks (embedded entities first, concurrently, then the owner)
//! 2. missing defaults are filled in
//! 3. validation (the first error aborts the save)
//! 4. canonicalization of date values
//! 5. `post_validate` hooks, then `pre_save` hooks
//! 6. flattening: references become ids, embedded entities become nested documents
//! 7. the backend write, which assigns an id to new entities
//! 8. `post_save` hooks
//!
//! Any failing step stops the pipeline; later steps do not run.

use bson::{Bson, Document};
use std::sync::Arc;
use tracing::debug;

use crate::{
    entity::Entity,
    error::{DocumentStoreError, DocumentStoreResult},
    hooks::HookKind,
    schema::Schema,
    store::DocumentStore,
    value::Value,
};

/// A Rust type standing for one entity type.
///
/// ```ignore
/// struct City;
///
/// impl Model for City {
///     fn schema() -> Arc<Schema> {
///         static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
///             Schema::document("City").field("name", Field::text()).build().unwrap()
///         });
///         SCHEMA.clone()
///     }
/// }
///
/// let cities = store.model::<City>();
/// ```
///
/// `City::schema` is a [`SchemaFn`](crate::schema::SchemaFn), so it can be used
/// directly in reference fields of other schemas.
pub trait Model {
    fn schema() -> Arc<Schema>;
}

impl Entity {
    /// Validates and writes this entity, assigning it an id if it has none.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] for embedded entities (they are
    /// saved through their owner), [`DocumentStoreError::NotConnected`] without a backend,
    /// [`DocumentStoreError::Validation`] when validation fails (the backend is not
    /// contacted), or whatever a hook or the backend reports.
    pub async fn save(&mut self, store: &DocumentStore) -> DocumentStoreResult<()> {
        if !self.schema().is_persistable() {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "{} is embedded and cannot be saved on its own",
                self.schema().name()
            )));
        }

        let client = store.client().await?;
        store.ensure_indexes(self.schema()).await?;

        self.run_hooks(HookKind::PreValidate).await?;
        self.apply_missing_defaults();
        self.validate(&*client)?;
        self.canonicalize();
        self.run_hooks(HookKind::PostValidate).await?;
        self.run_hooks(HookKind::PreSave).await?;

        let values = self.flatten();
        let id = self.has_id().then(|| self.id().clone());

        debug!(collection = %self.collection_name(), id = ?id, "saving entity");

        let saved = client
            .save(self.collection_name(), id.as_ref(), values)
            .await?;
        if !self.has_id() {
            self.assign_id(saved);
        }

        self.run_hooks(HookKind::PostSave).await
    }

    /// Deletes this entity's record and returns the number of records removed.
    ///
    /// An entity without an id was never stored: it resolves to zero without contacting
    /// the backend. `pre_delete` and `post_delete` hooks run either way.
    pub async fn delete(&mut self, store: &DocumentStore) -> DocumentStoreResult<u64> {
        let client = store.client().await?;

        self.run_hooks(HookKind::PreDelete).await?;

        let deleted = if self.has_id() {
            debug!(collection = %self.collection_name(), id = %self.id(), "deleting entity");
            client.delete(self.collection_name(), self.id()).await?
        } else {
            0
        };

        self.run_hooks(HookKind::PostDelete).await?;

        Ok(deleted)
    }

    /// Converts this entity into the record written to the backend.
    ///
    /// References (resolved or not) are stored as ids, embedded entities as nested
    /// documents, and unset fields are left out. The id itself is not included.
    pub fn flatten(&self) -> Document {
        let mut data = Document::new();

        for (key, value) in self.values() {
            let flat = match value {
                Value::Entity(entity) if entity.schema().is_persistable() => {
                    Some(entity.id().clone())
                }
                Value::Array(items) if items.iter().any(is_reference) => Some(Bson::Array(
                    items
                        .iter()
                        .map(|item| match item {
                            Value::Entity(entity) if entity.schema().is_persistable() => {
                                entity.id().clone()
                            }
                            other => other.to_bson().unwrap_or(Bson::Null),
                        })
                        .collect(),
                )),
                other => other.to_bson(),
            };

            if let Some(flat) = flat {
                data.insert(key, flat);
            }
        }

        data
    }
}

fn is_reference(value: &Value) -> bool {
    value
        .as_entity()
        .is_some_and(|entity| entity.schema().is_persistable())
}
