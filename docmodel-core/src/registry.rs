//! Backend selection by connection URL.
//!
//! A [`BackendRegistry`] holds an ordered list of [`BackendConnector`]s. When a store
//! connects, the first connector whose [`can_handle`](BackendConnector::can_handle)
//! accepts the URL opens the backend.

use async_trait::async_trait;
use std::fmt::Debug;
use tracing::debug;

use crate::{
    backend::DynStoreBackend,
    error::{DocumentStoreError, DocumentStoreResult},
};

/// Settings passed to a connector alongside the URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Database name, for backends whose URL does not carry one.
    pub database: Option<String>,
}

impl ConnectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }
}

/// Opens backends for the URLs it recognizes.
#[async_trait]
pub trait BackendConnector: Send + Sync + Debug {
    /// A short name for logs.
    fn name(&self) -> &str;

    /// Returns `true` if this connector recognizes `url`.
    fn can_handle(&self, url: &str) -> bool;

    /// Opens a backend for `url`.
    async fn connect(
        &self,
        url: &str,
        options: &ConnectOptions,
    ) -> DocumentStoreResult<Box<dyn DynStoreBackend>>;
}

/// An ordered list of connectors. Earlier connectors win.
#[derive(Debug, Default)]
pub struct BackendRegistry {
    connectors: Vec<Box<dyn BackendConnector>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a connector.
    pub fn add(&mut self, connector: impl BackendConnector + 'static) -> &mut Self {
        self.connectors.push(Box::new(connector));
        self
    }

    /// Appends a connector, builder style.
    pub fn with(mut self, connector: impl BackendConnector + 'static) -> Self {
        self.add(connector);
        self
    }

    /// The first connector that recognizes `url`.
    pub fn get(&self, url: &str) -> Option<&dyn BackendConnector> {
        self.connectors
            .iter()
            .find(|connector| connector.can_handle(url))
            .map(|connector| connector.as_ref())
    }

    /// Opens a backend for `url` with the first connector that recognizes it.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::UnrecognizedUrl`] when no connector recognizes the
    /// URL, or whatever the connector reports.
    pub async fn connect(
        &self,
        url: &str,
        options: &ConnectOptions,
    ) -> DocumentStoreResult<Box<dyn DynStoreBackend>> {
        let connector = self
            .get(url)
            .ok_or_else(|| DocumentStoreError::UnrecognizedUrl(url.to_string()))?;

        debug!(connector = connector.name(), "opening backend");

        connector.connect(url, options).await
    }

    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }
}
