use ormtour::orm::{create_engine, ObjectState, OrmError, SessionFactory};
use ormtour::{models, User};
use tempfile::TempDir;

fn memory_factory() -> SessionFactory {
    let engine = create_engine("sqlite://");
    models::metadata().create_all(&engine).expect("create tables");
    SessionFactory::new(engine)
}

#[test]
fn id_is_none_until_commit_then_unique() {
    let factory = memory_factory();
    let mut session = factory.session();

    let handles = session.add_all(vec![
        User::new("ed", "Ed Jones"),
        User::new("wendy", "Wendy Williams"),
        User::new("mary", "Mary Contrary"),
    ]);
    for &h in &handles {
        assert_eq!(session.get(h).unwrap().id, None);
    }

    session.commit().expect("commit");

    let mut ids = handles
        .iter()
        .map(|&h| session.get(h).unwrap().id.expect("assigned id"))
        .collect::<Vec<_>>();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 3);
}

#[test]
fn rollback_before_commit_leaves_storage_unchanged() {
    let factory = memory_factory();
    let mut session = factory.session();
    session.add(User::new("ed", "Ed Jones"));
    session.commit().unwrap();

    let fake = session.add(User::new("fakeuser", "Invalid"));
    session.rollback();
    assert_eq!(session.state(fake), Some(ObjectState::Detached));

    let other = factory.session();
    let names = other
        .query_columns::<User, (String,)>(&[User::NAME])
        .all()
        .unwrap();
    assert_eq!(names, vec![("ed".to_string(),)]);
}

#[test]
fn ordered_query_and_projection() {
    let factory = memory_factory();
    let mut session = factory.session();
    for i in 0..5 {
        session.add(User::new(format!("user{i}"), format!("User Number {i}")));
    }
    session.commit().unwrap();

    let ids = session
        .query::<User>()
        .order_by(User::ID)
        .iter()
        .unwrap()
        .map(|u| u.id.unwrap())
        .collect::<Vec<_>>();
    assert_eq!(ids.len(), 5);
    assert!(ids.windows(2).all(|w| w[0] <= w[1]));

    let pairs = session
        .query_columns::<User, (String, String)>(&[User::NAME, User::FULL_NAME])
        .order_by(User::ID)
        .all()
        .unwrap();
    assert_eq!(pairs.len(), 5);
    assert_eq!(pairs[0], ("user0".to_string(), "User Number 0".to_string()));
}

#[test]
fn results_are_one_shot_and_sized() {
    let factory = memory_factory();
    let mut session = factory.session();
    session.add(User::new("a", "A"));
    session.add(User::new("b", "B"));
    session.commit().unwrap();

    let mut results = session.query::<User>().iter().unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.next().is_some());
    assert!(results.next().is_some());
    assert!(results.next().is_none());
}

#[test]
fn update_delete_through_find() {
    let factory = memory_factory();
    let mut session = factory.session();
    let ed = session.add(User::new("ed", "Ed Jones"));
    session.commit().unwrap();
    let id = session.get(ed).unwrap().id.unwrap();
    session.close();

    let mut session = factory.session();
    let found = session.find::<User>(id).unwrap().expect("stored user");
    session.get_mut(found).unwrap().full_name = "Edward Jones".into();
    session.commit().unwrap();

    let reloaded = factory
        .session()
        .query::<User>()
        .filter_eq(User::ID, id)
        .first()
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.full_name, "Edward Jones");

    session.delete(found).unwrap();
    session.commit().unwrap();
    assert_eq!(factory.session().query::<User>().count().unwrap(), 0);
}

#[test]
fn over_length_value_is_rejected_atomically() {
    let factory = memory_factory();
    let mut session = factory.session();
    session.add(User::new("ok", "Fine"));
    session.add(User::new("ok2", "x".repeat(21)));

    let err = session.commit().unwrap_err();
    assert!(matches!(
        err,
        OrmError::ValueTooLong {
            table: "Users",
            column: "full_name",
            max: 20,
            actual: 21
        }
    ));
    session.rollback();
    assert_eq!(session.query::<User>().count().unwrap(), 0);
}

#[test]
fn file_database_persists_across_engines() {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite:///{}", dir.path().join("users.db").display());

    let engine = create_engine(url.clone());
    assert!(!engine.is_connected());
    models::metadata().create_all(&engine).unwrap();
    let mut session = engine.session();
    session.add(User::new("ed", "Ed Jones"));
    session.commit().unwrap();
    session.close();
    engine.dispose().unwrap();

    let engine = create_engine(url);
    let users = engine.session().query::<User>().all().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].to_string(), "<User (name: ed, full_name: Ed Jones)>");
}
