//! An object-document mapper over pluggable document stores.
//!
//! This crate is the core of the docmodel project and provides:
//!
//! - **Schemas** ([`schema`]) - Typed field declarations with constraints, defaults, and hooks
//! - **Entities** ([`entity`]) - Instances of a schema, with validation and (de)serialization
//! - **Persistence** ([`document`]) - The save and delete pipelines
//! - **Population** ([`populate`]) - Bulk resolution of references into entities
//! - **Collections** ([`collection`]) - Finders and factories for one entity type
//! - **Store backend abstraction** ([`backend`]) - The contract every storage backend fulfills
//! - **Backend registry** ([`registry`]) - Selecting a backend from a connection URL
//! - **Connection context** ([`store`]) - The connected backend, shared by all operations
//! - **Filters and options** ([`query`]) - Filter parsing, sorting, and finder options
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use docmodel::prelude::*;
//!
//! struct City;
//!
//! impl Model for City {
//!     fn schema() -> Arc<Schema> {
//!         static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
//!             Schema::document("City")
//!                 .field("name", Field::text().required())
//!                 .field("population", Field::number().min(0.0))
//!                 .build()
//!                 .unwrap()
//!         });
//!         SCHEMA.clone()
//!     }
//! }
//!
//! let store = DocumentStore::new(docmodel::default_registry());
//! store.connect("memory://", ConnectOptions::default()).await?;
//!
//! let mut city = store.model::<City>().create().await?;
//! city.set("name", "Springfield")?;
//! city.save(&store).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_core;

pub mod backend;
pub mod collection;
pub mod document;
pub mod entity;
pub mod error;
pub mod hooks;
pub mod populate;
pub mod query;
pub mod registry;
pub mod schema;
pub mod store;
pub mod validate;
pub mod value;
