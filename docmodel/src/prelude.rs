//! Convenient re-exports of commonly used types from docmodel.
//!
//! ```ignore
//! use docmodel::prelude::*;
//! ```
//!
//! This provides access to:
//! - Schemas, fields and hooks
//! - Entities, their values and the `Model` trait
//! - The store, its collections and the backend registry
//! - Finder options and filter expressions
//! - Error types

pub use docmodel_core::{
    backend::{DynStoreBackend, IdScheme, NativeIdType, StoreBackend, StoreBackendBuilder},
    collection::Collection,
    document::Model,
    entity::{Entity, OneOrMany},
    error::{DocumentStoreError, DocumentStoreResult, ValidationError, ValidationErrorKind},
    hooks::{HookKind, Hooks, NoHooks},
    query::{
        Expr, FieldOp, FindOneAndDeleteOptions, FindOneAndUpdateOptions, FindOneOptions,
        FindOptions, Populate, QueryOptions, Sort, SortDirection, SortSpec,
    },
    registry::{BackendConnector, BackendRegistry, ConnectOptions},
    schema::{EntityKind, Field, FieldType, Schema, SchemaBuilder},
    store::DocumentStore,
    value::Value,
};

pub use bson::{Bson, doc};
pub use std::sync::{Arc, LazyLock};
