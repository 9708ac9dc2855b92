//! Connection URLs for the in-memory store.
//!
//! - `memory://` opens a fresh store that lives as long as the connection.
//! - `file://<dir>` opens a store persisted to `<dir>`, loading what is already there.
//!   With [`ConnectOptions::database`] set, records go to the `<dir>/<database>`
//!   subdirectory instead.

use async_trait::async_trait;
use std::path::PathBuf;

use docmodel_core::{
    backend::{DynStoreBackend, StoreBackendBuilder},
    error::{DocumentStoreError, DocumentStoreResult},
    registry::{BackendConnector, ConnectOptions},
};

use crate::store::InMemoryStore;

const MEMORY_SCHEME: &str = "memory://";
const FILE_SCHEME: &str = "file://";

/// Connector for `memory://` and `file://` URLs.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryConnector;

impl MemoryConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BackendConnector for MemoryConnector {
    fn name(&self) -> &str {
        "memory"
    }

    fn can_handle(&self, url: &str) -> bool {
        url.starts_with(MEMORY_SCHEME) || url.starts_with(FILE_SCHEME)
    }

    async fn connect(
        &self,
        url: &str,
        options: &ConnectOptions,
    ) -> DocumentStoreResult<Box<dyn DynStoreBackend>> {
        if url.starts_with(MEMORY_SCHEME) {
            return Ok(Box::new(InMemoryStore::new()));
        }

        let dir = url.strip_prefix(FILE_SCHEME).unwrap_or_default();
        if dir.is_empty() {
            return Err(DocumentStoreError::Initialization(format!(
                "{url} does not name a directory"
            )));
        }

        let mut dir = PathBuf::from(dir);
        if let Some(database) = &options.database {
            dir.push(database);
        }

        let store = InMemoryStore::builder().path(dir).build().await?;

        Ok(Box::new(store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docmodel_core::registry::BackendRegistry;

    #[test]
    fn test_recognized_urls() {
        let connector = MemoryConnector::new();

        assert!(connector.can_handle("memory://"));
        assert!(connector.can_handle("file:///tmp/data"));
        assert!(!connector.can_handle("mongodb://localhost:27017/test"));
        assert!(!connector.can_handle("nedb://memory"));
    }

    #[tokio::test]
    async fn test_file_url_with_database_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("file://{}", dir.path().display());
        let registry = BackendRegistry::new().with(MemoryConnector::new());

        let backend = registry
            .connect(&url, &ConnectOptions::new().database("app"))
            .await
            .unwrap();
        backend.save("cities", None, doc! { "name": "Springfield" }).await.unwrap();

        assert!(dir.path().join("app").join("cities.db").exists());
    }

    #[tokio::test]
    async fn test_empty_file_url_is_rejected() {
        let result = MemoryConnector::new()
            .connect("file://", &ConnectOptions::default())
            .await;

        assert!(matches!(result, Err(DocumentStoreError::Initialization(_))));
    }
}
