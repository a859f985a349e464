use std::time::Duration;

use recordlayer::{
    bson::{Bson, doc, oid::ObjectId},
    memory::InMemoryStore,
    prelude::*,
};

#[derive(Debug, Default, Schema)]
struct Person {
    name: Option<String>,
    age: Option<i32>,
    email: Option<String>,
}

impl Model for Person {}

#[derive(Debug, Default, Schema)]
struct Link {
    label: Option<String>,
    target: Bson,
}

impl Model for Link {}

fn store() -> RecordStore<InMemoryStore> {
    RecordStore::new(InMemoryStore::new(), StoreConfig::new("testdb")).unwrap()
}

async fn seed(repo: &Repository<'_, Person, InMemoryStore>) {
    for (name, age) in [("dave", 40), ("ann", 20), ("carl", 35), ("bea", 30)] {
        let mut person = Record::<Person>::new(
            doc! { "name": name, "age": age, "email": format!("{name}@example.com") },
            true,
        )
        .unwrap();
        repo.save(&mut person).await.unwrap();
    }
}

fn names(records: &[Record<Person>]) -> Vec<&str> {
    records
        .iter()
        .filter_map(|record| record.name.as_deref())
        .collect()
}

#[tokio::test]
async fn unsorted_find_returns_insertion_order() {
    let store = store();
    let people = store.repository::<Person>();
    seed(&people).await;

    let all = people.find_all(Query::new()).await.unwrap();
    assert_eq!(names(&all), vec!["dave", "ann", "carl", "bea"]);
    assert!(all.iter().all(Record::is_persisted));
}

#[tokio::test]
async fn sort_offset_and_limit_are_applied() {
    let store = store();
    let people = store.repository::<Person>();
    seed(&people).await;

    let query = Query::builder()
        .sort("age", SortDirection::Desc)
        .offset(1)
        .limit(2)
        .build();

    let page = people.find_all(query).await.unwrap();
    assert_eq!(names(&page), vec!["carl", "bea"]);
}

#[tokio::test]
async fn zero_limit_returns_every_record() {
    let store = store();
    let people = store.repository::<Person>();
    seed(&people).await;

    let all = people
        .find_all(Query::builder().sort("name", SortDirection::Asc).limit(0).build())
        .await
        .unwrap();
    assert_eq!(names(&all), vec!["ann", "bea", "carl", "dave"]);
}

#[tokio::test]
async fn object_id_filters_match_only_the_same_id() {
    let store = store();
    let links = store.repository::<Link>();
    let (a, b) = (ObjectId::new(), ObjectId::new());

    for (label, target) in [("to_a", Bson::ObjectId(a)), ("to_b", Bson::ObjectId(b)), ("none", Bson::Null)] {
        let mut link = Record::<Link>::new(doc! { "label": label }, true).unwrap();
        link.set("target", target).unwrap();
        links.save(&mut link).await.unwrap();
    }

    let matched = links.find_all(Filter::eq("target", a)).await.unwrap();
    let labels = matched
        .iter()
        .filter_map(|link| link.label.as_deref())
        .collect::<Vec<_>>();
    assert_eq!(labels, vec!["to_a"]);
    assert_eq!(links.count(Some(Filter::eq("target", Bson::Null))).await.unwrap(), 1);
}

#[tokio::test]
async fn filters_select_matching_records() {
    let store = store();
    let people = store.repository::<Person>();
    seed(&people).await;

    let adults = people
        .find_all(
            Query::builder()
                .filter(Filter::gte("age", 30).and(Filter::ne("name", "dave")))
                .sort("name", SortDirection::Asc)
                .build(),
        )
        .await
        .unwrap();
    assert_eq!(names(&adults), vec!["bea", "carl"]);

    let count = people
        .count(Some(Filter::ends_with("email", "@example.com")))
        .await
        .unwrap();
    assert_eq!(count, 4);
    assert_eq!(people.count(Some(Filter::lt("age", 21))).await.unwrap(), 1);
}

#[tokio::test]
async fn find_one_on_empty_collection_is_absent() {
    let store = store();
    let people = store.repository::<Person>();

    assert!(people.find_one(Query::new()).await.unwrap().is_none());
    assert!(people.find_one(Filter::eq("name", "nobody")).await.unwrap().is_none());
    assert_eq!(people.count(None).await.unwrap(), 0);
}

#[tokio::test]
async fn find_one_respects_sort() {
    let store = store();
    let people = store.repository::<Person>();
    seed(&people).await;

    let youngest = people
        .find_one(Query::builder().sort("age", SortDirection::Asc).build())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(youngest.name.as_deref(), Some("ann"));
}

#[tokio::test]
async fn cursor_is_lazy_and_rewindable() {
    let store = store();
    let people = store.repository::<Person>();
    seed(&people).await;

    let mut cursor = people.find(Query::builder().sort("name", SortDirection::Asc).limit(2).build());

    let mut first_pass = Vec::new();
    while let Some(person) = cursor.next().await.unwrap() {
        first_pass.push(person.name.clone().unwrap());
    }
    assert_eq!(first_pass, vec!["ann", "bea"]);
    assert!(cursor.next().await.unwrap().is_none());

    // Writes after the first pass are visible once the query re-executes.
    let mut newcomer = Record::<Person>::new(doc! { "name": "aaron", "age": 50 }, true).unwrap();
    people.save(&mut newcomer).await.unwrap();

    cursor.rewind();
    let first = cursor.next().await.unwrap().unwrap();
    assert_eq!(first.name.as_deref(), Some("aaron"));
}

#[tokio::test]
async fn find_timeout_defaults_from_config_and_can_be_overridden() {
    let store = RecordStore::builder()
        .gateway(InMemoryStore::new())
        .database("testdb")
        .find_timeout(Duration::from_secs(5))
        .build()
        .unwrap();

    let people = store.repository::<Person>();
    assert_eq!(people.find(Query::new()).query().timeout, Some(Duration::from_secs(5)));

    let explicit = Query::builder().timeout(Duration::from_millis(10)).build();
    assert_eq!(people.find(explicit).query().timeout, Some(Duration::from_millis(10)));

    let fast = store
        .repository::<Person>()
        .with_find_timeout(Duration::from_millis(100));
    assert_eq!(fast.find(Query::new()).query().timeout, Some(Duration::from_millis(100)));
}

#[tokio::test]
async fn unique_index_blocks_duplicate_saves() {
    let store = store();
    let people = store.repository::<Person>();

    people
        .ensure_index(
            IndexKeys::ascending("email"),
            IndexOptions { unique: true, ..IndexOptions::default() },
        )
        .await
        .unwrap();
    seed(&people).await;

    let mut duplicate =
        Record::<Person>::new(doc! { "name": "other", "email": "ann@example.com" }, true).unwrap();
    let err = people.save(&mut duplicate).await.unwrap_err();

    assert!(matches!(err, DocumentStoreError::DuplicateKey(ref index, ref collection)
        if index == "email_1" && collection == "people"));
    assert!(duplicate.is_new());
    assert_eq!(people.count(None).await.unwrap(), 4);

    people.drop_index(IndexKeys::ascending("email")).await.unwrap();
    people.save(&mut duplicate).await.unwrap();
    assert!(matches!(
        people.drop_index(IndexKeys::ascending("email")).await,
        Err(DocumentStoreError::IndexNotFound(..))
    ));
}

#[tokio::test]
async fn repositories_are_scoped_to_their_collection() {
    let store = store();
    let people = store.repository::<Person>();
    seed(&people).await;

    assert_eq!(people.namespace(), &Namespace::new("testdb", "people"));
    assert_eq!(
        store.gateway().documents(&Namespace::new("testdb", "people")).await.len(),
        4
    );
    assert!(store
        .gateway()
        .documents(&Namespace::new("other", "people"))
        .await
        .is_empty());
}
