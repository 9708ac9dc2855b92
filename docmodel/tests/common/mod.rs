#![allow(dead_code)]

use async_trait::async_trait;
use bson::{Bson, Document};
use docmodel::{
    backend::{IdScheme, IndexOptions, NativeIdType, StoreBackend, UpdateOptions},
    error::DocumentStoreResult,
    hooks::Hooks,
    memory::InMemoryStore,
    prelude::*,
    query::QueryOptions,
};
use std::{
    any::Any,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

/// An in-memory backend that counts the calls it receives.
#[derive(Debug, Clone, Default)]
pub struct CountingStore {
    inner: InMemoryStore,
    saves: Arc<AtomicUsize>,
    deletes: Arc<AtomicUsize>,
    finds: Arc<AtomicUsize>,
    failing: Arc<Mutex<Option<String>>>,
}

impl CountingStore {
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn finds(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
    }

    /// Makes every find on `collection` fail with a backend error.
    pub fn fail_finds_in(&self, collection: &str) {
        *self.failing.lock().unwrap() = Some(collection.to_string());
    }

    fn check_find(&self, collection: &str) -> DocumentStoreResult<()> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        match self.failing.lock().unwrap().as_deref() {
            Some(failing) if failing == collection => {
                Err(DocumentStoreError::Backend(format!("find on {collection} failed")))
            }
            _ => Ok(()),
        }
    }

    pub fn reset(&self) {
        self.saves.store(0, Ordering::SeqCst);
        self.deletes.store(0, Ordering::SeqCst);
        self.finds.store(0, Ordering::SeqCst);
    }
}

impl IdScheme for CountingStore {
    fn to_canonical_id(&self, id: &Bson) -> String {
        self.inner.to_canonical_id(id)
    }

    fn is_native_id(&self, value: &Bson) -> bool {
        self.inner.is_native_id(value)
    }

    fn native_id_type(&self) -> NativeIdType {
        self.inner.native_id_type()
    }
}

#[async_trait]
impl StoreBackend for CountingStore {
    async fn save(&self, collection: &str, id: Option<&Bson>, values: Document) -> DocumentStoreResult<Bson> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        StoreBackend::save(&self.inner, collection, id, values).await
    }

    async fn delete(&self, collection: &str, id: &Bson) -> DocumentStoreResult<u64> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        StoreBackend::delete(&self.inner, collection, id).await
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        StoreBackend::delete_one(&self.inner, collection, filter).await
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        StoreBackend::delete_many(&self.inner, collection, filter).await
    }

    async fn find_one(&self, collection: &str, filter: Document) -> DocumentStoreResult<Option<Document>> {
        self.check_find(collection)?;
        StoreBackend::find_one(&self.inner, collection, filter).await
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        values: Document,
        options: UpdateOptions,
    ) -> DocumentStoreResult<Option<Document>> {
        StoreBackend::find_one_and_update(&self.inner, collection, filter, values, options).await
    }

    async fn find_one_and_delete(
        &self,
        collection: &str,
        filter: Document,
        options: QueryOptions,
    ) -> DocumentStoreResult<u64> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        StoreBackend::find_one_and_delete(&self.inner, collection, filter, options).await
    }

    async fn find(&self, collection: &str, filter: Document, options: QueryOptions) -> DocumentStoreResult<Vec<Document>> {
        self.check_find(collection)?;
        StoreBackend::find(&self.inner, collection, filter, options).await
    }

    async fn count(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64> {
        StoreBackend::count(&self.inner, collection, filter).await
    }

    async fn create_index(&self, collection: &str, field: &str, options: IndexOptions) -> DocumentStoreResult<()> {
        StoreBackend::create_index(&self.inner, collection, field, options).await
    }

    async fn clear_collection(&self, collection: &str) -> DocumentStoreResult<()> {
        StoreBackend::clear_collection(&self.inner, collection).await
    }

    async fn drop_database(&self) -> DocumentStoreResult<()> {
        StoreBackend::drop_database(&self.inner).await
    }

    async fn close(&self) -> DocumentStoreResult<()> {
        StoreBackend::close(&self.inner).await
    }

    fn driver(&self) -> &dyn Any {
        self
    }
}

/// A store over a fresh counting backend, and a handle on the counters.
pub fn counting_store() -> (DocumentStore, CountingStore) {
    let backend = CountingStore::default();
    (DocumentStore::with_backend(backend.clone()), backend)
}

pub struct City;

impl Model for City {
    fn schema() -> Arc<Schema> {
        static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
            Schema::document("City")
                .field("name", Field::text().required())
                .field("population", Field::number().min(0.0))
                .build()
                .unwrap()
        });
        SCHEMA.clone()
    }
}

pub struct Address;

impl Model for Address {
    fn schema() -> Arc<Schema> {
        static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
            Schema::embedded("Address")
                .field("street", Field::text())
                .field("city", Field::text().required())
                .build()
                .unwrap()
        });
        SCHEMA.clone()
    }
}

pub struct Person;

impl Model for Person {
    fn schema() -> Arc<Schema> {
        static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
            Schema::document("Person")
                .collection("people")
                .field("name", Field::text().required())
                .field("email", Field::text().unique().pattern(r"^[^@\s]+@[^@\s]+$"))
                .field("age", Field::number().min(0.0).max(150.0))
                .field("role", Field::text().choices(["admin", "user"]).default("user"))
                .field("password", Field::text().private())
                .field("address", Field::document(Address::schema))
                .field("friends", Field::documents(Person::schema))
                .field("born", Field::date())
                .build()
                .unwrap()
        });
        SCHEMA.clone()
    }
}

pub struct Author;

impl Model for Author {
    fn schema() -> Arc<Schema> {
        static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
            Schema::document("Author")
                .field("name", Field::text().required())
                .build()
                .unwrap()
        });
        SCHEMA.clone()
    }
}

pub struct Publisher;

impl Model for Publisher {
    fn schema() -> Arc<Schema> {
        static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
            Schema::document("Publisher")
                .field("name", Field::text().required())
                .build()
                .unwrap()
        });
        SCHEMA.clone()
    }
}

pub struct Book;

impl Model for Book {
    fn schema() -> Arc<Schema> {
        static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
            Schema::document("Book")
                .field("title", Field::text().required())
                .field("author", Field::document(Author::schema))
                .field("coauthors", Field::documents(Author::schema))
                .field("publisher", Field::document(Publisher::schema))
                .field("tags", Field::array_of(FieldType::Text))
                .field("extras", Field::array())
                .build()
                .unwrap()
        });
        SCHEMA.clone()
    }
}

/// Fills `slug` from `title` before validation and refuses to delete locked articles.
struct ArticleHooks;

#[async_trait]
impl Hooks for ArticleHooks {
    async fn pre_validate(&self, entity: &mut Entity) -> DocumentStoreResult<()> {
        if entity.get("slug").is_none_or(Value::is_unset) {
            let slug = entity
                .get_str("title")
                .unwrap_or_default()
                .to_lowercase()
                .replace(' ', "-");
            entity.set("slug", slug)?;
        }
        Ok(())
    }

    async fn pre_delete(&self, entity: &mut Entity) -> DocumentStoreResult<()> {
        if entity.get_bool("locked") == Some(true) {
            return Err(DocumentStoreError::InvalidDocument("article is locked".into()));
        }
        Ok(())
    }

    async fn post_find(&self, entity: &mut Entity) -> DocumentStoreResult<()> {
        entity.set("loaded", true)
    }
}

pub struct Article;

impl Model for Article {
    fn schema() -> Arc<Schema> {
        static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
            Schema::document("Article")
                .field("title", Field::text().required())
                .field("slug", Field::text().required())
                .field("locked", Field::boolean().default(false))
                .field("loaded", Field::boolean())
                .hooks(ArticleHooks)
                .build()
                .unwrap()
        });
        SCHEMA.clone()
    }
}

pub async fn save_city(store: &DocumentStore, name: &str, population: i32) -> Entity {
    let mut city = store.model::<City>().create().await.unwrap();
    city.set("name", name).unwrap();
    city.set("population", population).unwrap();
    city.save(store).await.unwrap();
    city
}

pub async fn save_author(store: &DocumentStore, name: &str) -> Entity {
    let mut author = store.model::<Author>().create().await.unwrap();
    author.set("name", name).unwrap();
    author.save(store).await.unwrap();
    author
}
