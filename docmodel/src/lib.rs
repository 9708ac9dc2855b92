//! Main docmodel crate providing a unified interface for schema-validated documents.
//!
//! This crate is the primary entry point for users of the docmodel framework. It
//! re-exports the core types from the sub-crates and wires the available storage
//! backends into a registry, so a store is opened from a URL.
//!
//! # Features
//!
//! - **Declarative schemas** - Typed fields with required, pattern, choices, min/max, custom checks and defaults
//! - **References** - Fields that point at other entity types, resolved in bulk on find
//! - **Lifecycle hooks** - Validation, save, delete and find hooks per schema
//! - **Multiple backends** - In-memory (optionally file-backed) and MongoDB storage
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::prelude::*;
//! use std::sync::{Arc, LazyLock};
//!
//! struct Author;
//! struct Book;
//!
//! impl Model for Author {
//!     fn schema() -> Arc<Schema> {
//!         static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
//!             Schema::document("Author")
//!                 .field("name", Field::text().required())
//!                 .build()
//!                 .unwrap()
//!         });
//!         SCHEMA.clone()
//!     }
//! }
//!
//! impl Model for Book {
//!     fn schema() -> Arc<Schema> {
//!         static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
//!             Schema::document("Book")
//!                 .field("title", Field::text().required())
//!                 .field("author", Field::document(Author::schema))
//!                 .build()
//!                 .unwrap()
//!         });
//!         SCHEMA.clone()
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let store = docmodel::connect("memory://", ConnectOptions::default()).await?;
//!
//!     let mut author = store.model::<Author>().create().await?;
//!     author.set("name", "Ursula")?;
//!     author.save(&store).await?;
//!
//!     let mut book = store.model::<Book>().create().await?;
//!     book.set("title", "The Dispossessed")?;
//!     book.set("author", author)?;
//!     book.save(&store).await?;
//!
//!     // The author comes back as an entity, not an id.
//!     let books = store.model::<Book>().find(doc! {}, FindOptions::new()).await?;
//!     assert_eq!(books[0].get_entity("author").unwrap().get_str("name"), Some("Ursula"));
//!
//!     store.close().await
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing, optionally mirrored to files
//! - `mongodb` - Persistent MongoDB backend (requires the `mongodb` feature)

mod connectors;
pub mod prelude;

pub use connectors::default_registry;
pub use docmodel_core::{
    backend, collection, document, entity, error, hooks, populate, query, registry, schema, store,
    validate, value,
};

// Re-export BSON types for convenience
pub use bson;

use docmodel_core::{error::DocumentStoreResult, registry::ConnectOptions, store::DocumentStore};

/// Opens a store on [`default_registry`] and connects it to `url`.
///
/// # Errors
///
/// Returns [`UnrecognizedUrl`](crate::error::DocumentStoreError::UnrecognizedUrl) when
/// no backend handles the URL, or whatever the backend reports while connecting.
pub async fn connect(url: &str, options: ConnectOptions) -> DocumentStoreResult<DocumentStore> {
    let store = DocumentStore::new(default_registry());
    store.connect(url, options).await?;

    Ok(store)
}

/// In-memory storage backend implementations.
pub mod memory {
    pub use docmodel_memory::{InMemoryStore, InMemoryStoreBuilder, MemoryConnector};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docmodel_mongodb::{MongoConnector, MongoDbStore, MongoDbStoreBuilder};
}
