//! Reference population.
//!
//! Population replaces the raw ids stored under reference fields with the entities they
//! point at. All entities passed in must share one schema. Ids are collected from every
//! owner, grouped by referenced collection, de-duplicated by canonical id, and fetched
//! with one bulk lookup per collection. Lookups for different collections run
//! concurrently.
//!
//! Population is shallow (the fetched entities are not populated themselves) and
//! idempotent: already-resolved references contribute their id and are fetched again.

use bson::Bson;
use futures::future::try_join_all;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tracing::debug;

use crate::{
    entity::Entity,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Populate, QueryOptions, ids_filter},
    schema::Schema,
    store::DocumentStore,
    value::Value,
};

/// One reference field of the owners being populated.
struct PendingField {
    key: String,
    collection: String,
    is_array: bool,
    /// Referenced ids, per owner, in the order they appeared.
    ids: Vec<Vec<Bson>>,
}

/// All ids requested from one collection.
struct Lookup {
    schema: Arc<Schema>,
    seen: HashSet<String>,
    ids: Vec<Bson>,
}

/// Resolves the reference fields of `docs` allowed by `populate`.
///
/// Array slots whose id matches no record are dropped; scalar references whose id
/// matches no record keep the raw id.
pub async fn populate(
    store: &DocumentStore,
    docs: &mut [Entity],
    populate: &Populate,
) -> DocumentStoreResult<()> {
    let Some(schema) = docs.first().map(|doc| doc.schema().clone()) else {
        return Ok(());
    };
    if !populate.is_enabled() {
        return Ok(());
    }

    let client = store.client().await?;
    let mut pending = Vec::new();
    let mut lookups: HashMap<String, Lookup> = HashMap::new();

    for (key, field) in schema.fields() {
        if !populate.allows(key) {
            continue;
        }
        let Some((target, is_array)) = field.ty().reference_schema() else {
            continue;
        };

        let lookup = lookups
            .entry(target.collection_name().to_string())
            .or_insert_with(|| Lookup {
                schema: target.clone(),
                seen: HashSet::new(),
                ids: Vec::new(),
            });
        let mut per_owner = Vec::with_capacity(docs.len());

        for doc in docs.iter() {
            let ids = match doc.get(key) {
                Some(Value::Array(items)) => items.iter().filter_map(reference_id).collect(),
                Some(value) => reference_id(value).into_iter().collect(),
                None => Vec::new(),
            };

            for id in &ids {
                if lookup.seen.insert(client.to_canonical_id(id)) {
                    lookup.ids.push(id.clone());
                }
            }

            per_owner.push(ids);
        }

        pending.push(PendingField {
            key: key.to_string(),
            collection: target.collection_name().to_string(),
            is_array,
            ids: per_owner,
        });
    }

    let lookups = lookups
        .into_values()
        .filter(|lookup| !lookup.ids.is_empty())
        .collect::<Vec<_>>();

    debug!(
        entity = %schema.name(),
        owners = docs.len(),
        lookups = lookups.len(),
        "populating references"
    );

    let fetched = try_join_all(lookups.into_iter().map(|lookup| async move {
        let collection = store.collection(lookup.schema.clone());
        let found = collection
            .load(ids_filter(lookup.ids), QueryOptions::default())
            .await?;

        Ok::<_, DocumentStoreError>((
            lookup.schema.collection_name().to_string(),
            found,
        ))
    }))
    .await?;

    let resolved = fetched
        .into_iter()
        .map(|(collection, found)| {
            let by_id = found
                .into_iter()
                .map(|entity| (client.to_canonical_id(entity.id()), entity))
                .collect::<HashMap<_, _>>();
            (collection, by_id)
        })
        .collect::<HashMap<_, _>>();

    // owners are only touched once every lookup has succeeded
    let nothing_found = HashMap::new();
    for field in pending {
        let by_id = resolved.get(&field.collection).unwrap_or(&nothing_found);

        for (doc, ids) in docs.iter_mut().zip(field.ids) {
            let mut matches = ids
                .iter()
                .filter_map(|id| by_id.get(&client.to_canonical_id(id)))
                .map(|entity| Value::from(entity.clone()));

            if field.is_array {
                if let Some(Value::Array(items)) = doc.get_mut(&field.key) {
                    *items = matches.collect();
                }
            } else if let Some(entity) = matches.next() {
                doc.set(&field.key, entity)?;
            }
        }
    }

    Ok(())
}

/// The id a reference value points at: a raw id, or the id of a resolved entity.
fn reference_id(value: &Value) -> Option<Bson> {
    match value {
        Value::Bson(id) => Some(id.clone()),
        Value::Entity(entity) if entity.has_id() => Some(entity.id().clone()),
        _ => None,
    }
}
