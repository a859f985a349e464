use recordlayer::{
    bson::{Bson, doc},
    memory::InMemoryStore,
    prelude::*,
};

#[derive(Debug, Default, Schema)]
struct User {
    email: Option<String>,
    password: Option<String>,
    #[record(skip)]
    trail: Vec<&'static str>,
}

impl Model for User {
    fn validators() -> ValidatorTable {
        ValidatorTable::new()
            .register("validates_email", |value| {
                value.as_str().is_some_and(|email| email.contains('@'))
            })
            .register("validates_password", |value| {
                value.as_str().is_some_and(|password| password.len() >= 2)
            })
    }

    fn after_new(&mut self) {
        self.trail.push("after_new");
    }

    fn before_validation(&mut self) {
        self.trail.push("before_validation");
    }

    fn after_validation(&mut self) {
        self.trail.push("after_validation");
    }

    fn before_save(&mut self) {
        self.trail.push("before_save");
        // Normalized before the snapshot is taken.
        self.email = self.email.take().map(|email| email.to_lowercase());
    }

    fn after_save(&mut self) {
        self.trail.push("after_save");
    }

    fn before_destroy(&mut self) {
        self.trail.push("before_destroy");
    }
}

#[derive(Debug, Default, Schema)]
struct Misnamed {
    name: Option<String>,
    #[record(skip)]
    trail: Vec<&'static str>,
}

impl Model for Misnamed {
    fn validators() -> ValidatorTable {
        ValidatorTable::new().register("check_name", |_| true)
    }

    fn before_validation(&mut self) {
        self.trail.push("before_validation");
    }

    fn after_validation(&mut self) {
        self.trail.push("after_validation");
    }

    fn before_save(&mut self) {
        self.trail.push("before_save");
    }
}

fn store() -> RecordStore<InMemoryStore> {
    RecordStore::new(InMemoryStore::new(), StoreConfig::new("testdb")).unwrap()
}

fn user(email: &str, password: &str) -> Record<User> {
    Record::new(doc! { "email": email, "password": password }, true).unwrap()
}

#[tokio::test]
async fn save_then_find_by_id_round_trips() {
    let store = store();
    let users = store.repository::<User>();
    let mut record = user("A@B.com", "pw");

    users.save(&mut record).await.unwrap();

    let id = record.identity().unwrap();
    let found = users.find_by_id(id).await.unwrap().unwrap();

    assert!(found.is_persisted());
    assert_eq!(found.identity(), Some(id));
    assert_eq!(found.attributes(false).unwrap(), record.attributes(false).unwrap());
    assert_eq!(found.email.as_deref(), Some("a@b.com"));
}

#[tokio::test]
async fn hooks_run_in_lifecycle_order() {
    let store = store();
    let users = store.repository::<User>();
    let mut record = user("a@b.com", "pw");

    users.save(&mut record).await.unwrap();
    users.destroy(&mut record).await.unwrap();

    assert_eq!(
        record.trail,
        vec![
            "after_new",
            "before_validation",
            "after_validation",
            "before_save",
            "after_save",
            "before_destroy",
        ]
    );

    let found = users.find_all(Query::new()).await.unwrap();
    assert!(found.is_empty());
}

#[tokio::test]
async fn materialized_records_skip_after_new() {
    let store = store();
    let users = store.repository::<User>();
    users.save(&mut user("a@b.com", "pw")).await.unwrap();

    let found = users.find_one(Query::new()).await.unwrap().unwrap();
    assert!(found.trail.is_empty());
}

#[tokio::test]
async fn resave_replaces_the_stored_document() {
    let store = store();
    let users = store.repository::<User>();
    let mut record = user("a@b.com", "pw");

    users.save(&mut record).await.unwrap();
    let id = record.identity();
    record.set("password", "changed").unwrap();
    users.save(&mut record).await.unwrap();

    assert_eq!(record.identity(), id);
    assert_eq!(users.count(None).await.unwrap(), 1);

    let found = users.find_by_id(id.unwrap()).await.unwrap().unwrap();
    assert_eq!(found.get("password"), Some(Bson::String("changed".into())));
}

#[tokio::test]
async fn failed_validation_writes_nothing() {
    let store = store();
    let users = store.repository::<User>();
    let mut record = user("not-an-email", "x");

    let err = users.save(&mut record).await.unwrap_err();

    assert!(err.is_validation_failure());
    assert!(!err.is_configuration_error());
    assert!(record.is_new());
    assert_eq!(record.identity(), None);
    assert_eq!(users.count(None).await.unwrap(), 0);

    // The scan stops at the first rejection.
    assert_eq!(record.errors().len(), 1);
    assert_eq!(record.errors()[0].validator, "validates_email");
    assert_eq!(record.errors()[0].attribute, "email");
}

#[tokio::test]
async fn validate_reports_without_saving() {
    let store = store();
    let users = store.repository::<User>();
    let mut record = user("a@b.com", "x");

    assert!(!users.validate(&mut record).unwrap());
    assert_eq!(record.errors()[0].attribute, "password");

    record.set("password", "long enough").unwrap();
    assert!(users.validate(&mut record).unwrap());
    assert!(record.errors().is_empty());
    assert_eq!(users.count(None).await.unwrap(), 0);
}

#[tokio::test]
async fn misnamed_validator_is_a_configuration_error() {
    let store = store();
    let repo = store.repository::<Misnamed>();
    let mut record = Record::<Misnamed>::default();

    let err = repo.save(&mut record).await.unwrap_err();

    assert!(matches!(err, DocumentStoreError::InvalidValidator(ref name, _) if name == "check_name"));
    assert!(err.is_configuration_error());
    assert_eq!(record.trail, vec!["before_validation", "after_validation"]);
    assert_eq!(repo.count(None).await.unwrap(), 0);
}

#[tokio::test]
async fn destroying_new_record_is_a_noop() {
    let store = store();
    let users = store.repository::<User>();
    let mut record = user("a@b.com", "pw");

    assert_eq!(users.destroy(&mut record).await.unwrap(), DestroyOutcome::NoOp);
    assert!(record.is_new());
    assert!(record.trail.contains(&"before_destroy"));
}

#[tokio::test]
async fn destroyed_record_is_gone_and_cannot_be_saved() {
    let store = store();
    let users = store.repository::<User>();
    let mut record = user("a@b.com", "pw");
    users.save(&mut record).await.unwrap();
    let id = record.identity().unwrap();

    assert_eq!(users.destroy(&mut record).await.unwrap(), DestroyOutcome::Removed);
    assert!(record.is_destroyed());
    assert!(users.find_by_id(id).await.unwrap().is_none());

    assert_eq!(users.destroy(&mut record).await.unwrap(), DestroyOutcome::NoOp);
    assert!(matches!(
        users.save(&mut record).await,
        Err(DocumentStoreError::InvalidState(_))
    ));
}

#[tokio::test]
async fn stale_copies_are_last_writer_wins() {
    let store = store();
    let users = store.repository::<User>();
    let mut original = user("a@b.com", "pw");
    users.save(&mut original).await.unwrap();

    let id = original.identity().unwrap();
    let mut copy = users.find_by_id(id).await.unwrap().unwrap();

    copy.set("password", "from-copy").unwrap();
    users.save(&mut copy).await.unwrap();
    original.set("password", "from-original").unwrap();
    users.save(&mut original).await.unwrap();

    let stored = users.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(stored.password.as_deref(), Some("from-original"));
}

#[tokio::test]
async fn store_configuration_is_required() {
    assert!(matches!(
        RecordStore::<InMemoryStore>::builder().database("testdb").build(),
        Err(DocumentStoreError::Configuration(_))
    ));
    assert!(matches!(
        RecordStore::new(InMemoryStore::new(), StoreConfig::new("")),
        Err(DocumentStoreError::Configuration(_))
    ));

    let config = StoreConfig::from_json(r#"{ "database": "testdb", "find_timeout_ms": 500 }"#).unwrap();
    let store = RecordStore::builder()
        .gateway(InMemoryStore::new())
        .config(config)
        .build()
        .unwrap();
    assert_eq!(store.config().find_timeout_ms, 500);

    store.shutdown().await.unwrap();
}
