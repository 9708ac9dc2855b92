//! In-memory document storage backend for docmodel.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend`
//! trait. It uses async-aware read-write locks for concurrent access and is ideal for
//! development, testing, and small embedded deployments.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Mongo-style filters** - Comparison, membership, regex and logical operators over dotted paths
//! - **Unique indexes** - Duplicate values are rejected on every write
//! - **Optional persistence** - One file per collection in a directory of your choice
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{DocumentStore, memory::InMemoryStore};
//!
//! let backend = InMemoryStore::builder().build().await?;
//! let store = DocumentStore::with_backend(backend);
//!
//! let mut city = store.model::<City>().create().await?;
//! city.set("name", "Springfield")?;
//! city.save(&store).await?;
//! ```
//!
//! Through a registry, the same backend is reached with `memory://` or
//! `file:///path/to/dir` URLs (see [`MemoryConnector`]).

#[allow(unused_extern_crates)]
extern crate self as docmodel_memory;

pub mod connector;
mod evaluator;
pub mod persist;
pub mod store;

pub use connector::MemoryConnector;
pub use store::{InMemoryStore, InMemoryStoreBuilder};
