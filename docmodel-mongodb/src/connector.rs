//! Connection URLs for the MongoDB store.

use async_trait::async_trait;

use docmodel_core::{
    backend::{DynStoreBackend, StoreBackendBuilder},
    error::DocumentStoreResult,
    registry::{BackendConnector, ConnectOptions},
};

use crate::store::MongoDbStoreBuilder;

const SCHEMES: [&str; 2] = ["mongodb://", "mongodb+srv://"];

/// Connector for `mongodb://` and `mongodb+srv://` connection strings.
#[derive(Debug, Default, Clone, Copy)]
pub struct MongoConnector;

impl MongoConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BackendConnector for MongoConnector {
    fn name(&self) -> &str {
        "mongodb"
    }

    fn can_handle(&self, url: &str) -> bool {
        SCHEMES.iter().any(|scheme| url.starts_with(scheme))
    }

    async fn connect(
        &self,
        url: &str,
        options: &ConnectOptions,
    ) -> DocumentStoreResult<Box<dyn DynStoreBackend>> {
        let mut builder = MongoDbStoreBuilder::new(url);
        if let Some(database) = &options.database {
            builder = builder.database(database);
        }

        Ok(Box::new(builder.build().await?))
    }
}
