use sqlrepo::prelude::*;
use sqlrepo::{ConfigErrorKind, ErrorKind, StateErrorKind, transaction_active};
use std::sync::Arc;
use tempfile::TempDir;

#[derive(Entity, Debug, Default, Clone, PartialEq)]
struct Person {
    #[sqlrepo(id, generated)]
    id: Option<i64>,
    name: String,
    age: i32,
}

#[repository]
trait PersonRepository: Repository<Person, i64> {
    fn find_by_age(&self, cx: &TransactionContext, age: i32) -> Result<Option<Person>>;

    fn find_by_name(&self, cx: &TransactionContext, name: &str) -> Result<Vec<Person>>;

    #[query("SELECT * FROM PERSON WHERE AGE > ? ORDER BY NAME")]
    fn older_than(&self, cx: &TransactionContext, age: i32) -> Result<Vec<Person>>;

    fn store(&self, cx: &TransactionContext, person: &Person) -> Result<Person>;

    fn count_everyone(&self, cx: &TransactionContext) -> Result<Vec<Person>>;
}

#[repository]
trait MisnamedRepository: Repository<Person, i64> {
    fn find_by_nickname(&self, cx: &TransactionContext, nickname: &str) -> Result<Option<Person>>;
}

struct Fixture {
    _dir: TempDir,
    ds: SqliteDataSource,
    people: Arc<PersonRepositoryImpl>,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("people.db").to_string_lossy().into_owned();
    let ds = SqliteDataSource::file(path);
    run_in_transaction(&ds, |cx| create_table::<Person>(cx)).unwrap();
    Fixture {
        _dir: dir,
        ds,
        people: PersonRepositoryImpl::shared().unwrap(),
    }
}

fn person(name: &str, age: i32) -> Person {
    Person {
        id: None,
        name: name.to_string(),
        age,
    }
}

#[test]
fn save_generates_id_visible_to_later_transaction() {
    let f = fixture();

    let saved = run_in_transaction(&f.ds, |cx| f.people.save(cx, person("Ada", 36))).unwrap();
    let id = saved.id.unwrap();
    assert_eq!(saved.name, "Ada");

    let found = run_in_transaction(&f.ds, |cx| f.people.find_by_id(cx, id)).unwrap();
    assert_eq!(found, Some(saved));
}

#[test]
fn find_all_on_empty_table() {
    let f = fixture();
    let all = run_in_transaction(&f.ds, |cx| f.people.find_all(cx)).unwrap();
    assert!(all.is_empty());
}

#[test]
fn find_by_id_missing_is_none() {
    let f = fixture();
    let found = run_in_transaction(&f.ds, |cx| f.people.find_by_id(cx, 42)).unwrap();
    assert_eq!(found, None);
}

#[test]
fn save_with_existing_id_replaces_row() {
    let f = fixture();
    let all = run_in_transaction(&f.ds, |cx| {
        let mut ada = f.people.save(cx, person("Ada", 36))?;
        ada.age = 37;
        f.people.save(cx, ada)?;
        f.people.find_all(cx)
    })
    .unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].age, 37);
}

#[test]
fn find_by_property_returns_first_match() {
    let f = fixture();
    let (first, nobody) = run_in_transaction(&f.ds, |cx| {
        f.people.save(cx, person("Ada", 36))?;
        f.people.save(cx, person("Grace", 36))?;
        f.people.save(cx, person("Alan", 41))?;
        Ok((f.people.find_by_age(cx, 36)?, f.people.find_by_age(cx, 99)?))
    })
    .unwrap();
    assert_eq!(first.map(|p| p.name).as_deref(), Some("Ada"));
    assert_eq!(nobody, None);

    let named = run_in_transaction(&f.ds, |cx| f.people.find_by_name(cx, "Alan")).unwrap();
    assert_eq!(named.len(), 1);
    assert_eq!(named[0].age, 41);
}

#[test]
fn query_method_binds_arguments() {
    let f = fixture();
    let older = run_in_transaction(&f.ds, |cx| {
        for (name, age) in [("Grace", 85), ("Ada", 36), ("Alan", 41)] {
            f.people.save(cx, person(name, age))?;
        }
        f.people.older_than(cx, 40)
    })
    .unwrap();
    let names: Vec<&str> = older.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Alan", "Grace"]);
}

#[test]
fn entity_argument_on_unconventional_name_is_unsupported() {
    let f = fixture();
    let ada = person("Ada", 36);
    let err = run_in_transaction(&f.ds, |cx| f.people.store(cx, &ada)).unwrap_err();
    assert_eq!(err.state_kind(), Some(StateErrorKind::UnsupportedOperation));
    assert!(err.to_string().contains("store"));

    let all = run_in_transaction(&f.ds, |cx| f.people.find_all(cx)).unwrap();
    assert!(all.is_empty());
}

#[test]
fn call_without_active_transaction_fails() {
    let f = fixture();
    let cx = TransactionContext::new();
    let err = f.people.find_all(&cx).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::State);
    assert_eq!(err.state_kind(), Some(StateErrorKind::NoConnection));
    assert_eq!(err.to_string(), Error::no_connection().to_string());
}

#[test]
fn failed_block_rolls_back() {
    let f = fixture();
    let err = run_in_transaction(&f.ds, |cx| -> Result<()> {
        f.people.save(cx, person("Ada", 36))?;
        Err(Error::custom("changed my mind"))
    })
    .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Custom(msg) if msg == "changed my mind"));
    assert!(err.suppressed().is_empty());

    let all = run_in_transaction(&f.ds, |cx| f.people.find_all(cx)).unwrap();
    assert!(all.is_empty());
}

#[test]
fn data_access_failure_is_wrapped_inside_and_unwrapped_outside() {
    let dir = tempfile::tempdir().unwrap();
    let ds = SqliteDataSource::file(dir.path().join("empty.db").to_string_lossy().into_owned());
    let people = PersonRepositoryImpl::shared().unwrap();

    let err = run_in_transaction(&ds, |cx| {
        let inner = people.find_all(cx).unwrap_err();
        assert!(inner.is_repository());
        assert!(inner.to_string().contains("find_all"));
        Err::<(), _>(inner)
    })
    .unwrap_err();

    assert!(!err.is_repository());
    assert_eq!(err.category(), ErrorCategory::DataAccess);
    assert!(err.to_string().contains("no such table"));
}

#[test]
fn nested_transaction_is_rejected() {
    let f = fixture();
    let err = run_in_transaction(&f.ds, |cx| {
        cx.run_in_transaction(&f.ds, |_| Ok(()))
    })
    .unwrap_err();
    assert_eq!(err.state_kind(), Some(StateErrorKind::NestedTransaction));
}

#[test]
fn nesting_through_free_function_keeps_outer_rollback() {
    let f = fixture();
    let err = run_in_transaction(&f.ds, |_| -> Result<()> {
        let inner = run_in_transaction(&f.ds, |cx| f.people.save(cx, person("Ada", 36)));
        assert_eq!(
            inner.unwrap_err().state_kind(),
            Some(StateErrorKind::NestedTransaction)
        );
        Err(Error::custom("outer fails"))
    })
    .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Custom(msg) if msg == "outer fails"));
    assert!(!transaction_active());

    let all = run_in_transaction(&f.ds, |cx| f.people.find_all(cx)).unwrap();
    assert!(all.is_empty());
}

#[test]
fn unsupported_method_is_state_error() {
    let f = fixture();
    let err = run_in_transaction(&f.ds, |cx| f.people.count_everyone(cx)).unwrap_err();
    assert_eq!(err.state_kind(), Some(StateErrorKind::UnsupportedOperation));
}

#[test]
fn unknown_property_fails_at_build() {
    let err = MisnamedRepositoryImpl::shared().unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Configuration);
    assert_eq!(err.config_kind(), Some(ConfigErrorKind::UnknownProperty));
}

#[test]
fn shared_repository_is_built_once() {
    let a = PersonRepositoryImpl::shared().unwrap();
    let b = PersonRepositoryImpl::shared().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}
