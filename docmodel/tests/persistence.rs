mod common;

use common::{Address, Article, City, Person, counting_store, save_city};
use docmodel::prelude::*;

#[tokio::test]
async fn test_missing_required_field_never_reaches_backend() {
    let (store, backend) = counting_store();
    let mut city = store.model::<City>().create().await.unwrap();
    city.set("population", 30).unwrap();

    let err = city.save(&store).await.unwrap_err();

    match err {
        DocumentStoreError::Validation(error) => {
            assert_eq!(error.collection, "citys");
            assert_eq!(error.field, "name");
            assert!(matches!(error.kind, ValidationErrorKind::Required { .. }));
            assert_eq!(error.to_string(), "Key citys.name is required, but got undefined");
        }
        other => panic!("expected a validation error, got {other:?}"),
    }
    assert_eq!(backend.saves(), 0);
    assert!(!city.has_id());
}

#[tokio::test]
async fn test_save_assigns_native_id_and_round_trips() {
    let (store, backend) = counting_store();
    let mut person = store.model::<Person>().create().await.unwrap();
    person.set("name", "Ann").unwrap();
    person.set("email", "ann@example.com").unwrap();
    person.set("age", 42).unwrap();
    person.set("born", "1982-03-04T05:06:07Z").unwrap();

    person.save(&store).await.unwrap();

    assert!(person.has_id());
    assert!(backend.is_native_id(person.id()));
    assert_eq!(person.get_str("role"), Some("user"));
    assert!(matches!(person.get("born"), Some(Value::Bson(Bson::DateTime(_)))));

    let found = store
        .model::<Person>()
        .find_one(doc! { "_id": person.id().clone() }, FindOneOptions::new())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(found.id(), person.id());
    assert_eq!(found.get_str("name"), Some("Ann"));
    assert_eq!(found.get_f64("age"), Some(42.0));
    assert_eq!(found.get("born"), person.get("born"));
    assert_eq!(found.get_array("friends").map(<[Value]>::len), Some(0));
}

#[tokio::test]
async fn test_second_save_updates_in_place() {
    let (store, _) = counting_store();
    let mut city = save_city(&store, "Springfield", 30).await;
    let id = city.id().clone();

    city.set("population", 31).unwrap();
    city.save(&store).await.unwrap();

    assert_eq!(city.id(), &id);
    let cities = store.model::<City>();
    assert_eq!(cities.count(doc! {}).await.unwrap(), 1);
    let found = cities
        .find_one(doc! { "_id": id }, FindOneOptions::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.get_f64("population"), Some(31.0));
}

#[tokio::test]
async fn test_custom_id_is_kept() {
    let (store, backend) = counting_store();
    let mut city = store.model::<City>().create().await.unwrap();
    city.set_id("1234567890abcdef").unwrap();
    city.set("name", "Quahog").unwrap();

    city.save(&store).await.unwrap();

    assert_eq!(city.id(), &Bson::from("1234567890abcdef"));
    assert!(backend.is_native_id(city.id()));
    let found = store
        .model::<City>()
        .find_one(doc! { "_id": "1234567890abcdef" }, FindOneOptions::new())
        .await
        .unwrap();
    assert_eq!(found.and_then(|c| c.get_str("name").map(str::to_string)), Some("Quahog".into()));

    assert!(city.set_id("fedcba0987654321").is_err());
}

#[tokio::test]
async fn test_constraint_failures() {
    let (store, backend) = counting_store();
    let people = store.model::<Person>();

    let mut person = people.create().await.unwrap();
    person.set("name", "Ann").unwrap();
    person.set("email", "not-an-email").unwrap();
    let err = person.save(&store).await.unwrap_err();
    assert!(matches!(
        err,
        DocumentStoreError::Validation(ValidationError { kind: ValidationErrorKind::Pattern { .. }, .. })
    ));

    person.set("email", "ann@example.com").unwrap();
    person.set("age", 200).unwrap();
    let err = person.save(&store).await.unwrap_err();
    assert!(matches!(
        err,
        DocumentStoreError::Validation(ValidationError { kind: ValidationErrorKind::Max { .. }, .. })
    ));

    person.set("age", 20).unwrap();
    person.set("role", "owner").unwrap();
    let err = person.save(&store).await.unwrap_err();
    assert!(matches!(
        err,
        DocumentStoreError::Validation(ValidationError { kind: ValidationErrorKind::Choice { .. }, .. })
    ));

    person.set("role", "admin").unwrap();
    person.set("age", "twenty").unwrap();
    let err = person.save(&store).await.unwrap_err();
    assert!(matches!(
        err,
        DocumentStoreError::Validation(ValidationError { kind: ValidationErrorKind::Type { .. }, .. })
    ));

    assert_eq!(backend.saves(), 0);
}

#[tokio::test]
async fn test_unique_violation() {
    let (store, _) = counting_store();
    let people = store.model::<Person>();

    let mut first = people.create().await.unwrap();
    first.set("name", "Ann").unwrap();
    first.set("email", "same@example.com").unwrap();
    first.save(&store).await.unwrap();

    let mut second = people.create().await.unwrap();
    second.set("name", "Bob").unwrap();
    second.set("email", "same@example.com").unwrap();
    let err = second.save(&store).await.unwrap_err();

    assert!(matches!(err, DocumentStoreError::UniqueViolation(_)));
    assert_eq!(people.count(doc! {}).await.unwrap(), 1);
}

#[tokio::test]
async fn test_embedded_entities_are_validated_and_nested() {
    let (store, _) = counting_store();
    let mut person = store.model::<Person>().create().await.unwrap();
    person.set("name", "Ann").unwrap();
    person.set("email", "ann@example.com").unwrap();

    let mut address = store.collection(Address::schema()).create().await.unwrap();
    address.set("street", "742 Evergreen Terrace").unwrap();
    person.set("address", address.clone()).unwrap();

    let err = person.save(&store).await.unwrap_err();
    assert!(matches!(
        err,
        DocumentStoreError::Validation(ValidationError { ref field, .. }) if field == "city"
    ));

    address.set("city", "Springfield").unwrap();
    person.set("address", address).unwrap();
    person.save(&store).await.unwrap();

    let record = store
        .client()
        .await
        .unwrap()
        .find_one("people", doc! { "_id": person.id().clone() })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        record.get_document("address").unwrap().get_str("city").unwrap(),
        "Springfield"
    );

    let found = store
        .model::<Person>()
        .find_one(doc! { "_id": person.id().clone() }, FindOneOptions::new())
        .await
        .unwrap()
        .unwrap();
    let address = found.get_entity("address").unwrap();
    assert!(address.schema().is_embedded());
    assert_eq!(address.get_str("street"), Some("742 Evergreen Terrace"));
}

#[tokio::test]
async fn test_embedded_schemas_cannot_be_saved_alone() {
    let (store, _) = counting_store();
    let mut address = store.collection(Address::schema()).create().await.unwrap();
    address.set("city", "Springfield").unwrap();

    let err = address.save(&store).await.unwrap_err();

    assert!(matches!(err, DocumentStoreError::InvalidDocument(_)));
}

#[tokio::test]
async fn test_typed_and_untyped_arrays() {
    let (store, _) = counting_store();
    let books = store.model::<common::Book>();

    let mut mixed = books.create().await.unwrap();
    mixed.set("title", "Mixed").unwrap();
    mixed.set("extras", vec![Value::from(1), Value::from("two"), Value::from(true)]).unwrap();
    mixed.set("tags", vec!["a", "b"]).unwrap();
    mixed.save(&store).await.unwrap();

    let mut wrong = books.create().await.unwrap();
    wrong.set("title", "Wrong").unwrap();
    wrong.set("tags", vec![Value::from("a"), Value::from(2)]).unwrap();
    let err = wrong.save(&store).await.unwrap_err();

    match err {
        DocumentStoreError::Validation(error) => {
            assert_eq!(error.field, "tags");
            assert_eq!(
                error.kind,
                ValidationErrorKind::Type { expected: "[String]".into(), actual: "[a,2]".into() }
            );
        }
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_hooks_run_around_save_find_and_delete() {
    let (store, backend) = counting_store();
    let articles = store.model::<Article>();

    let mut article = articles.create().await.unwrap();
    article.set("title", "Hello World").unwrap();
    article.save(&store).await.unwrap();
    assert_eq!(article.get_str("slug"), Some("hello-world"));
    assert_eq!(article.get_bool("loaded"), None);

    let mut found = articles
        .find(doc! { "slug": "hello-world" }, FindOptions::new())
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get_bool("loaded"), Some(true));

    found[0].set("locked", true).unwrap();
    let err = found[0].delete(&store).await.unwrap_err();
    assert!(matches!(err, DocumentStoreError::InvalidDocument(_)));
    assert_eq!(backend.deletes(), 0);

    found[0].set("locked", false).unwrap();
    assert_eq!(found[0].delete(&store).await.unwrap(), 1);
    assert_eq!(articles.count(doc! {}).await.unwrap(), 0);
}

#[tokio::test]
async fn test_saving_a_projected_entity_keeps_unselected_fields() {
    let (store, _) = counting_store();
    let articles = store.model::<Article>();

    let mut article = articles.create().await.unwrap();
    article.set("title", "Hello World").unwrap();
    article.set("locked", true).unwrap();
    article.save(&store).await.unwrap();

    let mut partial = articles
        .find_one(doc! {}, FindOneOptions::new().select(["title", "slug"]))
        .await
        .unwrap()
        .unwrap();
    assert!(partial.is_partial());
    assert!(partial.get("locked").is_none());

    partial.set("title", "Hello Again").unwrap();
    partial.save(&store).await.unwrap();
    assert!(partial.get("locked").is_none());

    let reloaded = articles
        .find_one(doc! { "_id": article.id().clone() }, FindOneOptions::new())
        .await
        .unwrap()
        .unwrap();
    assert!(!reloaded.is_partial());
    assert_eq!(reloaded.get_str("title"), Some("Hello Again"));
    assert_eq!(reloaded.get_str("slug"), Some("hello-world"));
    assert_eq!(reloaded.get_bool("locked"), Some(true));
    assert_eq!(articles.count(doc! {}).await.unwrap(), 1);
}

#[tokio::test]
async fn test_delete_without_id_skips_backend() {
    let (store, backend) = counting_store();
    let mut city = store.model::<City>().create().await.unwrap();
    city.set("name", "Nowhere").unwrap();

    let deleted = city.delete(&store).await.unwrap();

    assert_eq!(deleted, 0);
    assert_eq!(backend.deletes(), 0);
}

#[tokio::test]
async fn test_private_fields_are_stored_but_not_presented() {
    let (store, _) = counting_store();
    let mut person = store.model::<Person>().create().await.unwrap();
    person.set("name", "Ann").unwrap();
    person.set("email", "ann@example.com").unwrap();
    person.set("password", "hunter2").unwrap();
    person.save(&store).await.unwrap();

    let json = person.to_json().unwrap();
    assert_eq!(json["name"], "Ann");
    assert!(json.get("password").is_none());

    let found = store
        .model::<Person>()
        .find_one(doc! { "_id": person.id().clone() }, FindOneOptions::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.get_str("password"), Some("hunter2"));
}
