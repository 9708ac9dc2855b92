mod common;

use common::{Book, Person, Publisher, counting_store, save_author};
use docmodel::prelude::*;

async fn save_book(store: &DocumentStore, title: &str, author: &Entity, coauthors: &[&Entity]) -> Entity {
    let mut book = store.model::<Book>().create().await.unwrap();
    book.set("title", title).unwrap();
    book.set("author", author.clone()).unwrap();
    book.set(
        "coauthors",
        coauthors.iter().map(|a| Value::from((*a).clone())).collect::<Vec<_>>(),
    )
    .unwrap();
    book.save(store).await.unwrap();
    book
}

#[tokio::test]
async fn test_references_are_stored_as_ids() {
    let (store, _) = counting_store();
    let author = save_author(&store, "Ursula").await;
    let book = save_book(&store, "The Dispossessed", &author, &[&author]).await;

    let record = store
        .client()
        .await
        .unwrap()
        .find_one("books", doc! { "_id": book.id().clone() })
        .await
        .unwrap()
        .unwrap();

    assert_eq!(record.get("author"), Some(author.id()));
    assert_eq!(record.get_array("coauthors").unwrap(), &vec![author.id().clone()]);
}

#[tokio::test]
async fn test_find_resolves_references_with_one_lookup_per_collection() {
    let (store, backend) = counting_store();
    let ursula = save_author(&store, "Ursula").await;
    let octavia = save_author(&store, "Octavia").await;
    save_book(&store, "The Dispossessed", &ursula, &[&octavia]).await;
    save_book(&store, "Kindred", &octavia, &[&ursula, &octavia]).await;
    save_book(&store, "The Lathe of Heaven", &ursula, &[]).await;
    backend.reset();

    let books = store
        .model::<Book>()
        .find(doc! {}, FindOptions::new().sort("title"))
        .await
        .unwrap();

    // one find for the books, one bulk lookup for every referenced author
    assert_eq!(backend.finds(), 2);

    let kindred = &books[0];
    assert_eq!(kindred.get_str("title"), Some("Kindred"));
    assert_eq!(kindred.get_entity("author").unwrap().get_str("name"), Some("Octavia"));
    let coauthors = kindred
        .get_array("coauthors")
        .unwrap()
        .iter()
        .filter_map(|value| value.as_entity())
        .filter_map(|author| author.get_str("name"))
        .collect::<Vec<_>>();
    assert_eq!(coauthors, vec!["Ursula", "Octavia"]);

    assert_eq!(books[2].get_str("title"), Some("The Lathe of Heaven"));
    assert_eq!(books[2].get_array("coauthors").map(<[Value]>::len), Some(0));
}

#[tokio::test]
async fn test_population_can_be_disabled_or_restricted() {
    let (store, _) = counting_store();
    let author = save_author(&store, "Ursula").await;
    let mut publisher = store.model::<Publisher>().create().await.unwrap();
    publisher.set("name", "Harper").unwrap();
    publisher.save(&store).await.unwrap();

    let mut book = save_book(&store, "The Dispossessed", &author, &[]).await;
    book.set("publisher", publisher.clone()).unwrap();
    book.save(&store).await.unwrap();

    let books = store.model::<Book>();

    let raw = books
        .find_one(doc! {}, FindOneOptions::new().populate(false))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(raw.get("author"), Some(&Value::Bson(author.id().clone())));
    assert_eq!(raw.get("publisher"), Some(&Value::Bson(publisher.id().clone())));

    let partial = books
        .find_one(doc! {}, FindOneOptions::new().populate(Populate::fields(["publisher"])))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(partial.get("author"), Some(&Value::Bson(author.id().clone())));
    assert_eq!(partial.get_entity("publisher").unwrap().get_str("name"), Some("Harper"));
}

#[tokio::test]
async fn test_missing_references() {
    let (store, _) = counting_store();
    let ursula = save_author(&store, "Ursula").await;
    let mut octavia = save_author(&store, "Octavia").await;
    save_book(&store, "Kindred", &octavia, &[&ursula, &octavia]).await;
    let octavia_id = octavia.id().clone();
    octavia.delete(&store).await.unwrap();

    let book = store
        .model::<Book>()
        .find_one(doc! {}, FindOneOptions::new())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(book.get("author"), Some(&Value::Bson(octavia_id)));
    let coauthors = book.get_array("coauthors").unwrap();
    assert_eq!(coauthors.len(), 1);
    assert_eq!(coauthors[0].as_entity().unwrap().get_str("name"), Some("Ursula"));
}

#[tokio::test]
async fn test_failed_lookup_leaves_owners_untouched() {
    let (store, backend) = counting_store();
    let author = save_author(&store, "Ursula").await;
    let mut publisher = store.model::<Publisher>().create().await.unwrap();
    publisher.set("name", "Harper").unwrap();
    publisher.save(&store).await.unwrap();

    let mut book = save_book(&store, "The Dispossessed", &author, &[&author]).await;
    book.set("publisher", publisher.clone()).unwrap();
    book.save(&store).await.unwrap();

    let books = store.model::<Book>();
    let mut raw = books
        .find(doc! {}, FindOptions::new().populate(false))
        .await
        .unwrap();
    let before = raw.clone();

    backend.fail_finds_in("publishers");
    let err = books.populate(&mut raw, &Populate::All).await.unwrap_err();

    assert!(matches!(err, DocumentStoreError::Backend(_)));
    assert_eq!(raw, before);
    assert_eq!(
        raw[0].get_array("coauthors").unwrap(),
        &[Value::Bson(author.id().clone())][..]
    );
}

#[tokio::test]
async fn test_population_is_idempotent() {
    let (store, backend) = counting_store();
    let author = save_author(&store, "Ursula").await;
    save_book(&store, "The Dispossessed", &author, &[&author]).await;
    let books = store.model::<Book>();

    let mut found = books.find(doc! {}, FindOptions::new()).await.unwrap();
    let first = found.clone();
    backend.reset();

    books.populate(&mut found, &Populate::All).await.unwrap();

    assert_eq!(found, first);
    assert_eq!(backend.finds(), 1);
}

#[tokio::test]
async fn test_self_references() {
    let (store, _) = counting_store();
    let people = store.model::<Person>();

    let mut ann = people.create().await.unwrap();
    ann.set("name", "Ann").unwrap();
    ann.set("email", "ann@example.com").unwrap();
    ann.save(&store).await.unwrap();

    let mut bob = people.create().await.unwrap();
    bob.set("name", "Bob").unwrap();
    bob.set("email", "bob@example.com").unwrap();
    bob.set("friends", vec![ann.clone()]).unwrap();
    bob.save(&store).await.unwrap();

    let bob = people
        .find_one(doc! { "name": "Bob" }, FindOneOptions::new())
        .await
        .unwrap()
        .unwrap();
    let friends = bob.get_array("friends").unwrap();
    assert_eq!(friends.len(), 1);
    assert_eq!(friends[0].as_entity().unwrap().id(), ann.id());
}

#[tokio::test]
async fn test_reference_must_point_at_the_declared_type() {
    let (store, backend) = counting_store();
    let mut publisher = store.model::<Publisher>().create().await.unwrap();
    publisher.set("name", "Harper").unwrap();
    publisher.save(&store).await.unwrap();
    backend.reset();

    let mut book = store.model::<Book>().create().await.unwrap();
    book.set("title", "Wrong").unwrap();
    book.set("author", publisher).unwrap();
    let err = book.save(&store).await.unwrap_err();

    assert!(matches!(
        err,
        DocumentStoreError::Validation(ValidationError { kind: ValidationErrorKind::Type { .. }, .. })
    ));
    assert_eq!(backend.saves(), 0);
}
