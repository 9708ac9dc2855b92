//! The connection context.
//!
//! A [`DocumentStore`] owns the currently connected backend. Every persistence and
//! finder operation goes through it, so there is no process-wide connection: create a
//! store, connect it, and pass it to the operations that need it.
//!
//! # Example
//!
//! ```ignore
//! use docmodel::{DocumentStore, registry::ConnectOptions};
//!
//! let store = DocumentStore::new(docmodel::default_registry());
//! store.connect("memory://", ConnectOptions::default()).await?;
//!
//! let cities = store.model::<City>();
//! let springfield = cities.find_one(doc! { "name": "Springfield" }, Default::default()).await?;
//! ```

use mea::{mutex::Mutex, rwlock::RwLock};
use std::{collections::HashSet, fmt, sync::Arc};
use tracing::{debug, info};

use crate::{
    backend::{DynStoreBackend, IndexOptions, StoreBackend},
    collection::Collection,
    document::Model,
    error::{DocumentStoreError, DocumentStoreResult},
    registry::{BackendRegistry, ConnectOptions},
    schema::Schema,
};

/// Holds the connected backend and the registry used to open new ones.
///
/// Connecting again replaces the backend wholesale. Until a backend is connected, every
/// operation fails with [`DocumentStoreError::NotConnected`].
pub struct DocumentStore {
    registry: BackendRegistry,
    client: RwLock<Option<Arc<dyn DynStoreBackend>>>,
    /// Collections whose indexes were created on the current backend.
    indexed: Mutex<HashSet<String>>,
}

impl DocumentStore {
    /// Creates an unconnected store that opens backends through `registry`.
    pub fn new(registry: BackendRegistry) -> Self {
        Self {
            registry,
            client: RwLock::new(None),
            indexed: Mutex::new(HashSet::new()),
        }
    }

    /// Creates a store already connected to `backend`, with an empty registry.
    pub fn with_backend(backend: impl StoreBackend + 'static) -> Self {
        Self {
            registry: BackendRegistry::new(),
            client: RwLock::new(Some(Arc::new(backend))),
            indexed: Mutex::new(HashSet::new()),
        }
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Opens a backend for `url` and makes it the current one.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::UnrecognizedUrl`] if no registered connector handles
    /// the URL, or the connector's own error. The previous backend stays in place when
    /// connecting fails.
    pub async fn connect(&self, url: &str, options: ConnectOptions) -> DocumentStoreResult<()> {
        let backend: Arc<dyn DynStoreBackend> = self.registry.connect(url, &options).await?.into();

        self.replace(backend).await;
        info!(url = %redact(url), "connected");

        Ok(())
    }

    /// Makes `backend` the current one.
    pub async fn set_backend(&self, backend: impl StoreBackend + 'static) {
        self.replace(Arc::new(backend)).await;
    }

    async fn replace(&self, backend: Arc<dyn DynStoreBackend>) {
        *self.client.write().await = Some(backend);
        self.indexed.lock().await.clear();
    }

    /// The current backend.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::NotConnected`] if no backend is connected.
    pub async fn client(&self) -> DocumentStoreResult<Arc<dyn DynStoreBackend>> {
        self.client
            .read()
            .await
            .clone()
            .ok_or(DocumentStoreError::NotConnected)
    }

    pub async fn is_connected(&self) -> bool {
        self.client.read().await.is_some()
    }

    /// Closes and forgets the current backend. Does nothing if none is connected.
    pub async fn close(&self) -> DocumentStoreResult<()> {
        let client = self.client.write().await.take();
        self.indexed.lock().await.clear();

        if let Some(client) = client {
            client.close().await?;
            info!("disconnected");
        }

        Ok(())
    }

    /// Finder and factory operations for the entity type described by `schema`.
    pub fn collection(&self, schema: Arc<Schema>) -> Collection<'_> {
        Collection::new(schema, self)
    }

    /// Finder and factory operations for a [`Model`] type.
    pub fn model<M: Model>(&self) -> Collection<'_> {
        Collection::new(M::schema(), self)
    }

    /// Removes every record of a collection.
    pub async fn clear_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.client().await?.clear_collection(name).await
    }

    /// Removes every collection of the current backend.
    pub async fn drop_database(&self) -> DocumentStoreResult<()> {
        self.client().await?.drop_database().await?;
        self.indexed.lock().await.clear();

        Ok(())
    }

    /// Creates the unique indexes declared by `schema`, once per collection per backend.
    pub(crate) async fn ensure_indexes(&self, schema: &Schema) -> DocumentStoreResult<()> {
        if !schema.is_persistable() {
            return Ok(());
        }

        let collection = schema.collection_name();
        let mut indexed = self.indexed.lock().await;
        if indexed.contains(collection) {
            return Ok(());
        }

        let client = self.client().await?;
        for field in schema.unique_fields() {
            debug!(collection, field, "creating unique index");
            client
                .create_index(collection, field, IndexOptions { unique: true, sparse: false })
                .await?;
        }
        indexed.insert(collection.to_string());

        Ok(())
    }
}

impl fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStore")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Strips credentials from a URL before logging it.
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme), Some(at)) if at > scheme => format!("{}://***{}", &url[..scheme], &url[at..]),
        _ => url.to_string(),
    }
}
