//! The connectors compiled into this build.

use docmodel_core::registry::BackendRegistry;
use docmodel_memory::MemoryConnector;

/// A registry with every backend compiled into this build.
///
/// `memory://` and `file://` URLs always resolve. `mongodb://` and `mongodb+srv://`
/// URLs resolve when the `mongodb` feature is enabled; otherwise connecting to one fails
/// with an initialization error that names the missing feature.
pub fn default_registry() -> BackendRegistry {
    let registry = BackendRegistry::new().with(MemoryConnector::new());

    #[cfg(feature = "mongodb")]
    let registry = registry.with(docmodel_mongodb::MongoConnector::new());

    #[cfg(not(feature = "mongodb"))]
    let registry = registry.with(disabled::MongoConnector);

    registry
}

#[cfg(not(feature = "mongodb"))]
mod disabled {
    use async_trait::async_trait;

    use docmodel_core::{
        backend::DynStoreBackend,
        error::{DocumentStoreError, DocumentStoreResult},
        registry::{BackendConnector, ConnectOptions},
    };

    /// Claims MongoDB URLs so that they fail with a useful message.
    #[derive(Debug)]
    pub(super) struct MongoConnector;

    #[async_trait]
    impl BackendConnector for MongoConnector {
        fn name(&self) -> &str {
            "mongodb (disabled)"
        }

        fn can_handle(&self, url: &str) -> bool {
            url.starts_with("mongodb://") || url.starts_with("mongodb+srv://")
        }

        async fn connect(
            &self,
            _url: &str,
            _options: &ConnectOptions,
        ) -> DocumentStoreResult<Box<dyn DynStoreBackend>> {
            Err(DocumentStoreError::Initialization(
                "mongodb support is not enabled; rebuild with the `mongodb` feature".to_string(),
            ))
        }
    }
}
