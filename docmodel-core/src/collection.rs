//! Finder and factory operations for one entity type.
//!
//! A [`Collection`] pairs a [`Schema`] with the [`DocumentStore`] it is read from and
//! written to. It is cheap to create; get one from
//! [`DocumentStore::collection`](crate::store::DocumentStore::collection) or
//! [`DocumentStore::model`](crate::store::DocumentStore::model) whenever needed.
//!
//! Finders build entities from the stored records, then project them down to the
//! selected fields, resolve references, and run `post_find` hooks, in that order.
//!
//! # Example
//!
//! ```ignore
//! use docmodel::query::{FindOptions, Populate};
//!
//! let cities = store.model::<City>();
//! let largest = cities
//!     .find(doc! { "population": { "$gt": 1000 } }, FindOptions::new().sort("-population").limit(3))
//!     .await?;
//! let unresolved = cities.find(doc! {}, FindOptions::new().populate(Populate::None)).await?;
//! ```

use bson::{Bson, Document};
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::debug;

use crate::{
    backend::UpdateOptions,
    entity::{Entity, OneOrMany},
    error::DocumentStoreResult,
    hooks::HookKind,
    populate,
    query::{
        FindOneAndDeleteOptions, FindOneAndUpdateOptions, FindOneOptions, FindOptions, Populate,
        QueryOptions,
    },
    schema::Schema,
    store::DocumentStore,
};

/// Operations on the records of one entity type.
#[derive(Debug, Clone)]
pub struct Collection<'a> {
    schema: Arc<Schema>,
    store: &'a DocumentStore,
}

impl<'a> Collection<'a> {
    pub(crate) fn new(schema: Arc<Schema>, store: &'a DocumentStore) -> Self {
        Self { schema, store }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        self.schema.collection_name()
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Creates the unique indexes declared by the schema. Runs once per collection per
    /// connected backend; later calls return immediately.
    pub async fn create_indexes(&self) -> DocumentStoreResult<()> {
        self.store.ensure_indexes(&self.schema).await
    }

    /// Creates a new entity with default values and runs its `pre_init` hook.
    pub async fn create(&self) -> DocumentStoreResult<Entity> {
        self.create_indexes().await?;

        let mut entity = Entity::instantiate(self.schema.clone());
        entity.pre_init(None);

        Ok(entity)
    }

    /// Creates one entity from a document, or one per element of an array, and runs
    /// their `pre_init` hooks. Nothing is saved.
    pub async fn create_from(&self, data: &Bson) -> DocumentStoreResult<OneOrMany<Entity>> {
        self.create_indexes().await?;

        Entity::create(self.schema.clone(), Some(data))
    }

    /// Fetches records and builds entities without any post-processing.
    pub(crate) async fn load(
        &self,
        filter: Document,
        options: QueryOptions,
    ) -> DocumentStoreResult<Vec<Entity>> {
        self.store
            .client()
            .await?
            .find(self.name(), filter, options)
            .await?
            .iter()
            .map(|record| Entity::from_document(self.schema.clone(), record))
            .collect()
    }

    /// Returns the first entity matching `filter`.
    pub async fn find_one(
        &self,
        filter: Document,
        options: FindOneOptions,
    ) -> DocumentStoreResult<Option<Entity>> {
        self.create_indexes().await?;

        let record = self.store.client().await?.find_one(self.name(), filter).await?;
        let Some(record) = record else {
            return Ok(None);
        };

        let mut docs = vec![Entity::from_document(self.schema.clone(), &record)?];
        self.finish(&mut docs, &options.populate, options.select.as_deref())
            .await?;

        Ok(docs.pop())
    }

    /// Returns every entity matching `filter`. Always returns a list, even for a single
    /// match.
    pub async fn find(
        &self,
        filter: Document,
        options: FindOptions,
    ) -> DocumentStoreResult<Vec<Entity>> {
        self.create_indexes().await?;

        let mut docs = self.load(filter, options.query_options()).await?;
        debug!(collection = %self.name(), found = docs.len(), "find");

        self.finish(&mut docs, &options.populate, options.select.as_deref())
            .await?;

        Ok(docs)
    }

    /// Sets `values` on the first record matching `filter` and returns it as updated.
    ///
    /// With `upsert`, a record is inserted when nothing matches. Returns `None` when
    /// nothing matched and nothing was inserted.
    pub async fn find_one_and_update(
        &self,
        filter: Document,
        values: Document,
        options: FindOneAndUpdateOptions,
    ) -> DocumentStoreResult<Option<Entity>> {
        self.create_indexes().await?;

        let record = self
            .store
            .client()
            .await?
            .find_one_and_update(
                self.name(),
                filter,
                values,
                UpdateOptions { upsert: options.upsert },
            )
            .await?;
        let Some(record) = record else {
            return Ok(None);
        };

        let mut docs = vec![Entity::from_document(self.schema.clone(), &record)?];
        self.finish(&mut docs, &options.populate, options.select.as_deref())
            .await?;

        Ok(docs.pop())
    }

    /// Deletes the first record matching `filter`. Returns the number of records removed.
    pub async fn find_one_and_delete(
        &self,
        filter: Document,
        options: FindOneAndDeleteOptions,
    ) -> DocumentStoreResult<u64> {
        self.create_indexes().await?;

        self.store
            .client()
            .await?
            .find_one_and_delete(
                self.name(),
                filter,
                QueryOptions { sort: options.sort, ..Default::default() },
            )
            .await
    }

    /// Deletes the first record matching `filter`. Returns the number of records removed.
    pub async fn delete_one(&self, filter: Document) -> DocumentStoreResult<u64> {
        self.store.client().await?.delete_one(self.name(), filter).await
    }

    /// Deletes every record matching `filter`. Returns the number of records removed.
    pub async fn delete_many(&self, filter: Document) -> DocumentStoreResult<u64> {
        self.store.client().await?.delete_many(self.name(), filter).await
    }

    /// Counts the records matching `filter`.
    pub async fn count(&self, filter: Document) -> DocumentStoreResult<u64> {
        self.store.client().await?.count(self.name(), filter).await
    }

    /// Removes every record of this collection.
    pub async fn clear(&self) -> DocumentStoreResult<()> {
        self.store.clear_collection(self.name()).await
    }

    /// Resolves the reference fields of `docs` allowed by `populate`.
    ///
    /// See [`populate`](crate::populate::populate) for the exact behavior.
    pub async fn populate(&self, docs: &mut [Entity], populate: &Populate) -> DocumentStoreResult<()> {
        populate::populate(self.store, docs, populate).await
    }

    async fn finish(
        &self,
        docs: &mut [Entity],
        populate: &Populate,
        select: Option<&[String]>,
    ) -> DocumentStoreResult<()> {
        populate::populate(self.store, docs, populate).await?;
        try_join_all(docs.iter_mut().map(|doc| doc.run_hooks(HookKind::PostFind))).await?;

        if let Some(fields) = select {
            docs.iter_mut().for_each(|doc| doc.retain_fields(fields));
        }

        Ok(())
    }
}
