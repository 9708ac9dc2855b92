//! Storage backend abstraction for the document mapper.
//!
//! This module defines the contract every storage backend fulfills. Entities never talk
//! to a database directly: the persistence layer flattens them into BSON documents and
//! hands those to a [`StoreBackend`] together with the collection name.
//!
//! # Traits
//!
//! - [`IdScheme`]: How a backend represents and compares ids
//! - [`StoreBackend`]: The core async trait for storage backends
//! - [`DynStoreBackend`]: A trait for dynamic dispatch over backend implementations
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! # Filters
//!
//! Filters and update documents are plain BSON documents in the Mongo query dialect
//! (`{"age": {"$gt": 18}}`). Backends that do not speak the dialect natively parse them
//! with [`Expr::from_filter`](crate::query::Expr::from_filter).

use async_trait::async_trait;
use bson::{Bson, Document};
use serde::{Deserialize, Serialize};
use std::{any::Any, fmt::Debug};

use crate::{error::DocumentStoreResult, query::QueryOptions};

/// The id representation a backend generates for new records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NativeIdType {
    /// A 12-byte BSON object id.
    ObjectId,
    /// An opaque string.
    String,
}

/// How a backend represents ids.
///
/// Ids of different shapes may refer to the same record (an object id and its hex
/// string, for example). Population and de-duplication compare ids through
/// [`to_canonical_id`](IdScheme::to_canonical_id) so that such ids are treated as equal.
pub trait IdScheme {
    /// Converts an id to its canonical string form.
    fn to_canonical_id(&self, id: &Bson) -> String;

    /// Returns `true` if `value` looks like an id generated by this backend.
    fn is_native_id(&self, value: &Bson) -> bool;

    /// The id representation this backend generates.
    fn native_id_type(&self) -> NativeIdType;
}

/// Options for [`StoreBackend::find_one_and_update`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOptions {
    /// Insert a new record when nothing matches the filter.
    pub upsert: bool,
}

/// Options for [`StoreBackend::create_index`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexOptions {
    /// Reject records that duplicate an existing value.
    pub unique: bool,
    /// Skip records that do not have the field.
    pub sparse: bool,
}

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from multiple
/// async tasks.
///
/// # Error Handling
///
/// Operations return [`DocumentStoreResult<T>`](crate::error::DocumentStoreResult).
/// A write rejected by a unique index must be reported as
/// [`DocumentStoreError::UniqueViolation`](crate::error::DocumentStoreError::UniqueViolation);
/// any other driver failure should be wrapped in
/// [`DocumentStoreError::Backend`](crate::error::DocumentStoreError::Backend).
#[async_trait]
pub trait StoreBackend: IdScheme + Send + Sync + Debug {
    /// Saves a record.
    ///
    /// With no `id` a new record is inserted and its generated id returned. With an `id`
    /// the record is upserted: `values` are set on the existing record, or a new record
    /// with that id is inserted.
    ///
    /// # Arguments
    ///
    /// * `collection` - The collection to write to. Created automatically if it doesn't exist.
    /// * `id` - The id of the record, if it has one
    /// * `values` - The flattened field values, without an `_id` key
    async fn save(
        &self,
        collection: &str,
        id: Option<&Bson>,
        values: Document,
    ) -> DocumentStoreResult<Bson>;

    /// Deletes the record with the given id. Returns the number of records removed.
    async fn delete(&self, collection: &str, id: &Bson) -> DocumentStoreResult<u64>;

    /// Deletes the first record matching `filter`. Returns the number of records removed.
    async fn delete_one(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64>;

    /// Deletes every record matching `filter`. Returns the number of records removed.
    async fn delete_many(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64>;

    /// Returns the first record matching `filter`, including its `_id`.
    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
    ) -> DocumentStoreResult<Option<Document>>;

    /// Sets `values` on the first record matching `filter` and returns the updated record.
    ///
    /// When nothing matches and `options.upsert` is set, a new record is inserted from the
    /// equality conditions of the filter plus `values`, and returned. Otherwise returns
    /// `None`.
    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        values: Document,
        options: UpdateOptions,
    ) -> DocumentStoreResult<Option<Document>>;

    /// Deletes the first record matching `filter`, honoring the sort in `options`.
    /// Returns the number of records removed.
    async fn find_one_and_delete(
        &self,
        collection: &str,
        filter: Document,
        options: QueryOptions,
    ) -> DocumentStoreResult<u64>;

    /// Returns every record matching `filter`, sorted and paginated by `options`.
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: QueryOptions,
    ) -> DocumentStoreResult<Vec<Document>>;

    /// Counts the records matching `filter`.
    async fn count(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64>;

    /// Creates an index on a field.
    ///
    /// # Note
    ///
    /// If `options.unique` is set and existing records violate the constraint, the
    /// backend returns an error.
    async fn create_index(
        &self,
        collection: &str,
        field: &str,
        options: IndexOptions,
    ) -> DocumentStoreResult<()>;

    /// Removes every record of a collection.
    async fn clear_collection(&self, collection: &str) -> DocumentStoreResult<()>;

    /// Removes every collection.
    ///
    /// # Warning
    ///
    /// This operation is irreversible.
    async fn drop_database(&self) -> DocumentStoreResult<()>;

    /// Releases the backend's resources.
    async fn close(&self) -> DocumentStoreResult<()>;

    /// The underlying driver handle, for callers that need to go beyond this contract.
    fn driver(&self) -> &dyn Any;
}

/// Object-safe view of a [`StoreBackend`] with downcasting support.
///
/// Every `StoreBackend + 'static` implements this trait, so connected backends can be
/// held as `Arc<dyn DynStoreBackend>`.
#[async_trait]
pub trait DynStoreBackend: IdScheme + Send + Sync + Debug {
    async fn save(
        &self,
        collection: &str,
        id: Option<&Bson>,
        values: Document,
    ) -> DocumentStoreResult<Bson>;
    async fn delete(&self, collection: &str, id: &Bson) -> DocumentStoreResult<u64>;
    async fn delete_one(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64>;
    async fn delete_many(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64>;
    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
    ) -> DocumentStoreResult<Option<Document>>;
    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        values: Document,
        options: UpdateOptions,
    ) -> DocumentStoreResult<Option<Document>>;
    async fn find_one_and_delete(
        &self,
        collection: &str,
        filter: Document,
        options: QueryOptions,
    ) -> DocumentStoreResult<u64>;
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: QueryOptions,
    ) -> DocumentStoreResult<Vec<Document>>;
    async fn count(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64>;
    async fn create_index(
        &self,
        collection: &str,
        field: &str,
        options: IndexOptions,
    ) -> DocumentStoreResult<()>;
    async fn clear_collection(&self, collection: &str) -> DocumentStoreResult<()>;
    async fn drop_database(&self) -> DocumentStoreResult<()>;
    async fn close(&self) -> DocumentStoreResult<()>;

    fn driver(&self) -> &dyn Any;
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

#[async_trait]
impl<B: StoreBackend + 'static> DynStoreBackend for B {
    async fn save(
        &self,
        collection: &str,
        id: Option<&Bson>,
        values: Document,
    ) -> DocumentStoreResult<Bson> {
        StoreBackend::save(self, collection, id, values).await
    }

    async fn delete(&self, collection: &str, id: &Bson) -> DocumentStoreResult<u64> {
        StoreBackend::delete(self, collection, id).await
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64> {
        StoreBackend::delete_one(self, collection, filter).await
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64> {
        StoreBackend::delete_many(self, collection, filter).await
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
    ) -> DocumentStoreResult<Option<Document>> {
        StoreBackend::find_one(self, collection, filter).await
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        values: Document,
        options: UpdateOptions,
    ) -> DocumentStoreResult<Option<Document>> {
        StoreBackend::find_one_and_update(self, collection, filter, values, options).await
    }

    async fn find_one_and_delete(
        &self,
        collection: &str,
        filter: Document,
        options: QueryOptions,
    ) -> DocumentStoreResult<u64> {
        StoreBackend::find_one_and_delete(self, collection, filter, options).await
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: QueryOptions,
    ) -> DocumentStoreResult<Vec<Document>> {
        StoreBackend::find(self, collection, filter, options).await
    }

    async fn count(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64> {
        StoreBackend::count(self, collection, filter).await
    }

    async fn create_index(
        &self,
        collection: &str,
        field: &str,
        options: IndexOptions,
    ) -> DocumentStoreResult<()> {
        StoreBackend::create_index(self, collection, field, options).await
    }

    async fn clear_collection(&self, collection: &str) -> DocumentStoreResult<()> {
        StoreBackend::clear_collection(self, collection).await
    }

    async fn drop_database(&self) -> DocumentStoreResult<()> {
        StoreBackend::drop_database(self).await
    }

    async fn close(&self) -> DocumentStoreResult<()> {
        StoreBackend::close(self).await
    }

    fn driver(&self) -> &dyn Any {
        StoreBackend::driver(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
