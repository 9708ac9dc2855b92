use async_trait::async_trait;
use bson::{Bson, Document, doc, oid::ObjectId};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection, IndexModel,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{
        ClientOptions, FindOneAndDeleteOptions, FindOptions,
        IndexOptions as MongoIndexOptions, ReturnDocument,
    },
};
use std::any::Any;
use tracing::{debug, info};

use docmodel_core::{
    backend::{IdScheme, IndexOptions, NativeIdType, StoreBackend, StoreBackendBuilder, UpdateOptions},
    error::{DocumentStoreError, DocumentStoreResult},
    query::QueryOptions,
};

use crate::query::{MongoQueryTranslator, cast_id};

/// Database used when neither the options nor the connection string name one.
pub const DEFAULT_DATABASE: &str = "test";

const DUPLICATE_KEY: i32 = 11000;

/// Driver options for a multi-record find.
pub(crate) fn find_options(options: &QueryOptions) -> FindOptions {
    let mut find_options = FindOptions::default();
    find_options.sort = sort_document(options);
    find_options.skip = options.skip;
    find_options.limit = options.limit.map(|limit| limit as i64);
    find_options
}

/// Driver options for `find_one_and_delete`. Only the sort applies.
pub(crate) fn find_one_and_delete_options(options: &QueryOptions) -> FindOneAndDeleteOptions {
    let mut delete_options = FindOneAndDeleteOptions::default();
    delete_options.sort = sort_document(options);
    delete_options
}

fn sort_document(options: &QueryOptions) -> Option<Document> {
    options
        .sort
        .as_ref()
        .filter(|sort| !sort.is_empty())
        .map(|sort| sort.to_document())
}

/// Maps a driver error, reporting duplicate keys as unique violations.
pub(crate) fn map_error(err: MongoError) -> DocumentStoreError {
    let code = match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => Some(e.code),
        ErrorKind::Command(e) => Some(e.code),
        _ => None,
    };

    if code == Some(DUPLICATE_KEY) {
        DocumentStoreError::UniqueViolation(err.to_string())
    } else {
        DocumentStoreError::Backend(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: impl Into<String>) -> Self {
        Self { client, database: database.into() }
    }

    pub fn builder(dsn: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn database_name(&self) -> &str {
        &self.database
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }
}

impl IdScheme for MongoDbStore {
    fn to_canonical_id(&self, id: &Bson) -> String {
        match id {
            Bson::ObjectId(oid) => oid.to_hex(),
            Bson::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    fn is_native_id(&self, value: &Bson) -> bool {
        match value {
            Bson::ObjectId(_) => true,
            Bson::String(s) => ObjectId::parse_str(s).is_ok(),
            _ => false,
        }
    }

    fn native_id_type(&self) -> NativeIdType {
        NativeIdType::ObjectId
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn save(
        &self,
        collection: &str,
        id: Option<&Bson>,
        values: Document,
    ) -> DocumentStoreResult<Bson> {
        let Some(id) = id.map(cast_id) else {
            return Ok(self
                .get_collection(collection)
                .insert_one(values)
                .await
                .map_err(map_error)?
                .inserted_id);
        };

        self.get_collection(collection)
            .update_one(doc! { "_id": id.clone() }, doc! { "$set": values })
            .upsert(true)
            .await
            .map_err(map_error)?;

        Ok(id)
    }

    async fn delete(&self, collection: &str, id: &Bson) -> DocumentStoreResult<u64> {
        Ok(self
            .get_collection(collection)
            .delete_one(doc! { "_id": cast_id(id) })
            .await
            .map_err(map_error)?
            .deleted_count)
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64> {
        Ok(self
            .get_collection(collection)
            .delete_one(MongoQueryTranslator::translate(&filter)?)
            .await
            .map_err(map_error)?
            .deleted_count)
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64> {
        Ok(self
            .get_collection(collection)
            .delete_many(MongoQueryTranslator::translate(&filter)?)
            .await
            .map_err(map_error)?
            .deleted_count)
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
    ) -> DocumentStoreResult<Option<Document>> {
        self.get_collection(collection)
            .find_one(MongoQueryTranslator::translate(&filter)?)
            .await
            .map_err(map_error)
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        values: Document,
        options: UpdateOptions,
    ) -> DocumentStoreResult<Option<Document>> {
        self.get_collection(collection)
            .find_one_and_update(
                MongoQueryTranslator::translate(&filter)?,
                doc! { "$set": values },
            )
            .upsert(options.upsert)
            .return_document(ReturnDocument::After)
            .await
            .map_err(map_error)
    }

    async fn find_one_and_delete(
        &self,
        collection: &str,
        filter: Document,
        options: QueryOptions,
    ) -> DocumentStoreResult<u64> {
        let deleted = self
            .get_collection(collection)
            .find_one_and_delete(MongoQueryTranslator::translate(&filter)?)
            .with_options(find_one_and_delete_options(&options))
            .await
            .map_err(map_error)?;

        Ok(deleted.map_or(0, |_| 1))
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: QueryOptions,
    ) -> DocumentStoreResult<Vec<Document>> {
        self.get_collection(collection)
            .find(MongoQueryTranslator::translate(&filter)?)
            .with_options(find_options(&options))
            .await
            .map_err(map_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(map_error)
    }

    async fn count(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64> {
        self.get_collection(collection)
            .count_documents(MongoQueryTranslator::translate(&filter)?)
            .await
            .map_err(map_error)
    }

    async fn create_index(
        &self,
        collection: &str,
        field: &str,
        options: IndexOptions,
    ) -> DocumentStoreResult<()> {
        self.get_collection(collection)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { field: 1 })
                    .options(
                        MongoIndexOptions::builder()
                            .unique(options.unique)
                            .sparse(options.sparse)
                            .build(),
                    )
                    .build(),
            )
            .await
            .map_err(map_error)?;

        debug!(collection, field, unique = options.unique, "created index");

        Ok(())
    }

    async fn clear_collection(&self, collection: &str) -> DocumentStoreResult<()> {
        self.get_collection(collection)
            .delete_many(doc! {})
            .await
            .map_err(map_error)?;

        Ok(())
    }

    async fn drop_database(&self) -> DocumentStoreResult<()> {
        self.client
            .database(&self.database)
            .drop()
            .await
            .map_err(map_error)
    }

    async fn close(&self) -> DocumentStoreResult<()> {
        debug!(database = %self.database, "closing mongodb client");
        self.client.clone().shutdown().await;

        Ok(())
    }

    fn driver(&self) -> &dyn Any {
        &self.client
    }
}

/// Builder for [`MongoDbStore`].
///
/// The database is taken from [`database`](MongoDbStoreBuilder::database), then from the
/// path of the connection string, then defaults to [`DEFAULT_DATABASE`].
#[derive(Debug, Clone)]
pub struct MongoDbStoreBuilder {
    dsn: String,
    database: Option<String>,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: None,
        }
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;
        let database = self
            .database
            .or_else(|| options.default_database.clone())
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());

        let client = Client::with_options(options)
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        info!(database = %database, "connected mongodb client");

        Ok(MongoDbStore::new(client, database))
    }
}
