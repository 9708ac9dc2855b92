//! MongoDB backend implementation for docmodel.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait.
//! Filters are executed by the server, unique indexes are server indexes, and new
//! records get object ids.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docmodel = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Features
//!
//! - **Persistent storage** - Data is persisted to MongoDB Atlas or self-hosted MongoDB
//! - **Server-side queries** - Filtering, sorting and pagination run in the database
//! - **Async/await** - Fully asynchronous API built on MongoDB's async driver
//! - **Id casting** - Hex strings compared against `_id` match object ids
//!
//! # Connection
//!
//! The database is named by the builder, the connect options, or the path of the
//! connection string, in that order. Without any of them it is `test`.
//!
//! # Example
//!
//! ```ignore
//! use docmodel::{backend::StoreBackendBuilder, mongodb::MongoDbStore};
//!
//! let backend = MongoDbStore::builder("mongodb://localhost:27017")
//!     .database("my_database")
//!     .build()
//!     .await?;
//! let store = DocumentStore::with_backend(backend);
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_mongodb;

pub mod connector;
mod query;
pub mod store;

pub use connector::MongoConnector;
pub use store::{MongoDbStore, MongoDbStoreBuilder};
