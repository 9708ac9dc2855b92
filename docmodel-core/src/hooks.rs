//! Lifecycle hooks for entity types.
//!
//! Implement [`Hooks`] and attach it with [`SchemaBuilder::hooks`](crate::schema::SchemaBuilder::hooks)
//! to run code around validation, saving, deleting, and loading. Every method has a
//! no-op default, so implementations only override what they need.
//!
//! ```ignore
//! struct Stamp;
//!
//! #[async_trait]
//! impl Hooks for Stamp {
//!     async fn pre_save(&self, entity: &mut Entity) -> DocumentStoreResult<()> {
//!         entity.set("updated", bson::DateTime::now())
//!     }
//! }
//! ```
//!
//! Any hook returning an error aborts the operation it belongs to.

use async_trait::async_trait;
use bson::Bson;

use crate::{entity::Entity, error::DocumentStoreResult};

/// The asynchronous lifecycle points an entity passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    PreValidate,
    PostValidate,
    PreSave,
    PostSave,
    PreDelete,
    PostDelete,
    PostFind,
}

#[async_trait]
pub trait Hooks: Send + Sync {
    /// Runs synchronously at the end of entity creation, with the raw data the entity
    /// was created from. Errors are logged and swallowed.
    fn pre_init(&self, _entity: &mut Entity, _data: Option<&Bson>) -> DocumentStoreResult<()> {
        Ok(())
    }

    async fn pre_validate(&self, _entity: &mut Entity) -> DocumentStoreResult<()> {
        Ok(())
    }

    async fn post_validate(&self, _entity: &mut Entity) -> DocumentStoreResult<()> {
        Ok(())
    }

    async fn pre_save(&self, _entity: &mut Entity) -> DocumentStoreResult<()> {
        Ok(())
    }

    async fn post_save(&self, _entity: &mut Entity) -> DocumentStoreResult<()> {
        Ok(())
    }

    async fn pre_delete(&self, _entity: &mut Entity) -> DocumentStoreResult<()> {
        Ok(())
    }

    async fn post_delete(&self, _entity: &mut Entity) -> DocumentStoreResult<()> {
        Ok(())
    }

    /// Runs on every entity returned by a finder, after population.
    async fn post_find(&self, _entity: &mut Entity) -> DocumentStoreResult<()> {
        Ok(())
    }
}

/// Hooks that do nothing. Used when a schema declares none.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl Hooks for NoHooks {}

pub(crate) async fn invoke(
    hooks: &dyn Hooks,
    kind: HookKind,
    entity: &mut Entity,
) -> DocumentStoreResult<()> {
    match kind {
        HookKind::PreValidate => hooks.pre_validate(entity).await,
        HookKind::PostValidate => hooks.post_validate(entity).await,
        HookKind::PreSave => hooks.pre_save(entity).await,
        HookKind::PostSave => hooks.post_save(entity).await,
        HookKind::PreDelete => hooks.pre_delete(entity).await,
        HookKind::PostDelete => hooks.post_delete(entity).await,
        HookKind::PostFind => hooks.post_find(entity).await,
    }
}
