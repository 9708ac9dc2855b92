//! In-memory storage implementation for document stores.
//!
//! Records are kept per collection, in insertion order, behind an async-aware read-write
//! lock. Unique indexes are enforced on every write. When built with a directory, every
//! write is also mirrored to a file per collection (see [`persist`](crate::persist)), and
//! the files are read back when the store is built again.

use async_trait::async_trait;
use bson::{Bson, Document};
use mea::rwlock::RwLock;
use std::{
    any::Any,
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, info};
use uuid::Uuid;

use docmodel_core::{
    backend::{IdScheme, IndexOptions, NativeIdType, StoreBackend, StoreBackendBuilder, UpdateOptions},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, QueryOptions, SortSpec},
    validate::bson_eq,
};

use crate::{
    evaluator::{DocumentEvaluator, compare_records, lookup, sort_records},
    persist,
};

/// Length of the ids generated by this backend.
const ID_LENGTH: usize = 16;

type StoreMap = HashMap<String, CollectionData>;

#[derive(Debug, Default)]
struct CollectionData {
    records: Vec<Document>,
    indexes: Vec<(String, IndexOptions)>,
}

impl CollectionData {
    fn position(&self, id: &Bson) -> Option<usize> {
        let canonical = canonical_id(id);

        self.records.iter().position(|record| {
            record
                .get("_id")
                .is_some_and(|record_id| canonical_id(record_id) == canonical)
        })
    }

    /// Positions of the records matching `expr`, sorted by `sort`.
    fn matching(&self, expr: &Expr, sort: Option<&SortSpec>) -> DocumentStoreResult<Vec<usize>> {
        let mut matched = Vec::new();
        for (pos, record) in self.records.iter().enumerate() {
            if DocumentEvaluator::new(record).evaluate(expr)? {
                matched.push(pos);
            }
        }

        if let Some(sort) = sort.filter(|sort| !sort.is_empty()) {
            matched.sort_by(|a, b| compare_records(&self.records[*a], &self.records[*b], sort));
        }

        Ok(matched)
    }

    /// Rejects `record` if it duplicates a unique field of any record other than the one
    /// at `skip`.
    fn check_unique(
        &self,
        collection: &str,
        record: &Document,
        skip: Option<usize>,
    ) -> DocumentStoreResult<()> {
        for (field, options) in self.indexes.iter().filter(|(_, options)| options.unique) {
            let Some(value) = unique_key(record, field, options) else {
                continue;
            };

            let duplicate = self
                .records
                .iter()
                .enumerate()
                .filter(|(pos, _)| Some(*pos) != skip)
                .filter_map(|(_, other)| unique_key(other, field, options))
                .any(|other| bson_eq(value, other));

            if duplicate {
                return Err(duplicate_error(collection, field, value));
            }
        }

        Ok(())
    }

    fn insert(&mut self, collection: &str, record: Document) -> DocumentStoreResult<()> {
        self.check_unique(collection, &record, None)?;
        self.records.push(record);

        Ok(())
    }

    /// Sets `values` on the record at `pos`. The `_id` of a stored record never changes.
    fn update(&mut self, collection: &str, pos: usize, values: Document) -> DocumentStoreResult<()> {
        let mut record = self.records[pos].clone();
        for (key, value) in values {
            if key != "_id" {
                record.insert(key, value);
            }
        }

        self.check_unique(collection, &record, Some(pos))?;
        self.records[pos] = record;

        Ok(())
    }
}

/// The value a unique index sees for `record`. Sparse indexes skip records without
/// the field; other indexes treat a missing field as null.
fn unique_key<'a>(record: &'a Document, field: &str, options: &IndexOptions) -> Option<&'a Bson> {
    match lookup(record, field) {
        Some(value) => Some(value),
        None if options.sparse => None,
        None => Some(&Bson::Null),
    }
}

fn duplicate_error(collection: &str, field: &str, value: &Bson) -> DocumentStoreError {
    DocumentStoreError::UniqueViolation(format!(
        "{collection}.{field} already has a record with value {value}"
    ))
}

fn canonical_id(id: &Bson) -> String {
    match id {
        Bson::String(s) => s.clone(),
        Bson::ObjectId(oid) => oid.to_hex(),
        other => other.to_string(),
    }
}

fn generate_id() -> Bson {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(ID_LENGTH);

    Bson::String(id)
}

/// The equality conditions of a filter, used to seed an upserted record.
fn filter_equalities(filter: &Document) -> Document {
    filter
        .iter()
        .filter(|(key, value)| {
            !key.starts_with('$')
                && !key.contains('.')
                && !matches!(value, Bson::Document(doc) if doc.keys().any(|k| k.starts_with('$')))
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Thread-safe in-memory document storage backend.
///
/// Generates 16-character alphanumeric string ids. Any other id shape supplied by the
/// caller (an object id, a custom string) is stored as given.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data.
///
/// # Performance
///
/// Queries scan all records of a collection. Indexes only enforce uniqueness.
///
/// # Example
///
/// ```ignore
/// use docmodel_memory::InMemoryStore;
/// use docmodel_core::backend::StoreBackend;
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// let id = store.save("cities", None, doc! { "name": "Springfield" }).await?;
/// let found = store.find_one("cities", doc! { "_id": id }).await?;
/// assert!(found.is_some());
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    store: Arc<RwLock<StoreMap>>,
    path: Option<Arc<PathBuf>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store that is never written to disk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for constructing an `InMemoryStore` with custom options.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use docmodel_memory::InMemoryStore;
    ///
    /// let store = InMemoryStore::builder().path("/var/lib/app/data").build().await?;
    /// ```
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// The directory records are persisted to, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref().map(PathBuf::as_path)
    }

    fn persist(&self, collection: &str, data: &CollectionData) -> DocumentStoreResult<()> {
        if let Some(dir) = self.path() {
            persist::write_collection(dir, collection, &data.records)?;
        }

        Ok(())
    }
}

impl IdScheme for InMemoryStore {
    fn to_canonical_id(&self, id: &Bson) -> String {
        canonical_id(id)
    }

    fn is_native_id(&self, value: &Bson) -> bool {
        matches!(value, Bson::String(s) if s.len() == ID_LENGTH && s.chars().all(|c| c.is_ascii_alphanumeric()))
    }

    fn native_id_type(&self) -> NativeIdType {
        NativeIdType::String
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn save(
        &self,
        collection: &str,
        id: Option<&Bson>,
        values: Document,
    ) -> DocumentStoreResult<Bson> {
        let mut store = self.store.write().await;
        let data = store.entry(collection.to_string()).or_default();

        let id = match id.and_then(|id| data.position(id).map(|pos| (id, pos))) {
            Some((id, pos)) => {
                data.update(collection, pos, values)?;
                id.clone()
            }
            None => {
                let id = id.cloned().unwrap_or_else(generate_id);
                let mut record = Document::new();
                record.insert("_id", id.clone());
                for (key, value) in values {
                    if key != "_id" {
                        record.insert(key, value);
                    }
                }

                data.insert(collection, record)?;
                id
            }
        };

        self.persist(collection, data)?;

        Ok(id)
    }

    async fn delete(&self, collection: &str, id: &Bson) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let Some(data) = store.get_mut(collection) else {
            return Ok(0);
        };
        let Some(pos) = data.position(id) else {
            return Ok(0);
        };

        data.records.remove(pos);
        self.persist(collection, data)?;

        Ok(1)
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64> {
        self.find_one_and_delete(collection, filter, QueryOptions::default())
            .await
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64> {
        let expr = Expr::from_filter(&filter)?;
        let mut store = self.store.write().await;
        let Some(data) = store.get_mut(collection) else {
            return Ok(0);
        };

        let mut positions = data.matching(&expr, None)?;
        positions.sort_unstable();
        for pos in positions.iter().rev() {
            data.records.remove(*pos);
        }

        if !positions.is_empty() {
            self.persist(collection, data)?;
        }

        Ok(positions.len() as u64)
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
    ) -> DocumentStoreResult<Option<Document>> {
        let expr = Expr::from_filter(&filter)?;
        let store = self.store.read().await;
        let Some(data) = store.get(collection) else {
            return Ok(None);
        };

        Ok(DocumentEvaluator::filter_documents(&data.records, &expr)?
            .first()
            .map(|record| (*record).clone()))
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        values: Document,
        options: UpdateOptions,
    ) -> DocumentStoreResult<Option<Document>> {
        let expr = Expr::from_filter(&filter)?;
        let mut store = self.store.write().await;
        let data = store.entry(collection.to_string()).or_default();

        let pos = match data.matching(&expr, None)?.first() {
            Some(&pos) => {
                data.update(collection, pos, values)?;
                pos
            }
            None if options.upsert => {
                let mut record = filter_equalities(&filter);
                for (key, value) in values {
                    record.insert(key, value);
                }
                if !record.contains_key("_id") {
                    record.insert("_id", generate_id());
                }

                debug!(collection, "upserting record");
                data.insert(collection, record)?;
                data.records.len() - 1
            }
            None => return Ok(None),
        };

        let record = data.records[pos].clone();
        self.persist(collection, data)?;

        Ok(Some(record))
    }

    async fn find_one_and_delete(
        &self,
        collection: &str,
        filter: Document,
        options: QueryOptions,
    ) -> DocumentStoreResult<u64> {
        let expr = Expr::from_filter(&filter)?;
        let mut store = self.store.write().await;
        let Some(data) = store.get_mut(collection) else {
            return Ok(0);
        };

        let Some(&pos) = data.matching(&expr, options.sort.as_ref())?.first() else {
            return Ok(0);
        };

        data.records.remove(pos);
        self.persist(collection, data)?;

        Ok(1)
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: QueryOptions,
    ) -> DocumentStoreResult<Vec<Document>> {
        let expr = Expr::from_filter(&filter)?;
        let store = self.store.read().await;
        let Some(data) = store.get(collection) else {
            return Ok(Vec::new());
        };

        let mut matched = DocumentEvaluator::filter_documents(&data.records, &expr)?;
        if let Some(sort) = &options.sort {
            sort_records(&mut matched, sort);
        }

        let skip = options.skip.unwrap_or(0) as usize;
        let limit = options.limit.map(|l| l as usize).unwrap_or(usize::MAX);

        Ok(matched
            .into_iter()
            .skip(skip)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64> {
        let expr = Expr::from_filter(&filter)?;
        let store = self.store.read().await;
        let Some(data) = store.get(collection) else {
            return Ok(0);
        };

        Ok(DocumentEvaluator::filter_documents(&data.records, &expr)?.len() as u64)
    }

    async fn create_index(
        &self,
        collection: &str,
        field: &str,
        options: IndexOptions,
    ) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let data = store.entry(collection.to_string()).or_default();

        if options.unique {
            let keys = data
                .records
                .iter()
                .filter_map(|record| unique_key(record, field, &options))
                .collect::<Vec<_>>();

            for (pos, value) in keys.iter().enumerate() {
                if keys[pos + 1..].iter().any(|other| bson_eq(value, other)) {
                    return Err(duplicate_error(collection, field, value));
                }
            }
        }

        data.indexes.retain(|(indexed, _)| indexed != field);
        data.indexes.push((field.to_string(), options));
        debug!(collection, field, unique = options.unique, "created index");

        Ok(())
    }

    async fn clear_collection(&self, collection: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let Some(data) = store.get_mut(collection) else {
            return Ok(());
        };

        data.records.clear();
        self.persist(collection, data)
    }

    async fn drop_database(&self) -> DocumentStoreResult<()> {
        self.store.write().await.clear();

        if let Some(dir) = self.path() {
            persist::remove_all(dir)?;
        }

        Ok(())
    }

    async fn close(&self) -> DocumentStoreResult<()> {
        debug!(path = ?self.path(), "closing in-memory store");
        Ok(())
    }

    fn driver(&self) -> &dyn Any {
        self
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use docmodel_memory::InMemoryStore;
/// use docmodel_core::backend::StoreBackendBuilder;
///
/// let volatile = InMemoryStore::builder().build().await?;
/// let durable = InMemoryStore::builder().path("./data").build().await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStoreBuilder {
    path: Option<PathBuf>,
}

impl InMemoryStoreBuilder {
    /// Persists records to files in `dir`, loading any that are already there.
    pub fn path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.path = Some(dir.into());
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let Some(dir) = self.path else {
            return Ok(InMemoryStore::new());
        };

        let store = persist::load_dir(&dir)?
            .into_iter()
            .map(|(name, records)| (name, CollectionData { records, indexes: Vec::new() }))
            .collect::<StoreMap>();

        info!(path = %dir.display(), collections = store.len(), "opened file-backed store");

        Ok(InMemoryStore {
            store: Arc::new(RwLock::new(store)),
            path: Some(Arc::new(dir)),
        })
    }
}
