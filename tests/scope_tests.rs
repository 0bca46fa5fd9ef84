use entiscope::{
    entity_scope, share, AnyEntity, Entity, Error, Insertion, MapConfig, PrimaryKey, ScopeMode,
};
use std::rc::Rc;

#[derive(Entity, Debug)]
struct Product {
    id: Option<PrimaryKey>,
    name: String,
}

fn product(id: Option<i64>, name: &str) -> entiscope::Shared<Product> {
    share(Product {
        id: id.map(PrimaryKey::Int),
        name: name.to_string(),
    })
}

#[test]
fn test_insert_then_get_returns_identical_instance() {
    let _scope = entiscope::open(ScopeMode::Normal);
    let p = product(Some(7), "lamp");

    assert_eq!(entiscope::insert_entity(&p), Ok(Insertion::Inserted));
    let found = entiscope::get::<Product>(7).unwrap().unwrap();
    assert!(Rc::ptr_eq(&found, &p));
}

#[test]
fn test_unsaved_entity_is_never_cached() {
    let _scope = entiscope::open(ScopeMode::Normal);
    let p = product(None, "draft");

    assert_eq!(
        entiscope::insert(Some(AnyEntity::new(&p))),
        Ok(Insertion::SkippedNew)
    );
    assert!(entiscope::get_all::<Product>().unwrap().is_empty());
}

#[test]
fn test_null_entity_is_rejected() {
    let _scope = entiscope::open(ScopeMode::Normal);
    assert_eq!(entiscope::insert(None), Err(Error::NullEntity));
}

/// Tolerated inconsistency: two instances with the same key do not fail,
/// the first one stays resident.
#[test]
fn test_second_instance_for_same_key_is_dropped() {
    let _scope = entiscope::open(ScopeMode::Normal);
    let first = product(Some(1), "first");
    let second = product(Some(1), "second");

    entiscope::insert_entity(&first).unwrap();
    assert_eq!(entiscope::insert_entity(&second), Ok(Insertion::Conflict));

    let found = entiscope::get::<Product>(1).unwrap().unwrap();
    assert!(Rc::ptr_eq(&found, &first));
    assert_eq!(found.borrow().name, "first");
}

#[test]
fn test_strict_scope_rejects_second_instance() {
    let _scope = entiscope::open_with(ScopeMode::ForceNew, MapConfig::strict());
    entiscope::insert_entity(&product(Some(1), "first")).unwrap();

    assert!(matches!(
        entiscope::insert_entity(&product(Some(1), "second")),
        Err(Error::DuplicateInstance { .. })
    ));
}

#[test]
fn test_force_new_scope_is_discarded_on_close() {
    let _outer = entiscope::open(ScopeMode::Normal);

    let inner = entiscope::open(ScopeMode::ForceNew);
    entiscope::insert_entity(&product(Some(3), "inner")).unwrap();
    assert!(entiscope::contains::<Product>(3).unwrap());
    inner.close().unwrap();

    assert!(entiscope::get::<Product>(3).unwrap().is_none());
}

#[test]
fn test_normal_scope_piggybacks_on_active_map() {
    let _outer = entiscope::open(ScopeMode::Normal);
    let p = product(Some(4), "shared");

    let inner = entiscope::open(ScopeMode::Normal);
    assert!(inner.is_piggyback());
    entiscope::insert_entity(&p).unwrap();
    inner.close().unwrap();

    assert!(entiscope::scope::is_active());
    let found = entiscope::get::<Product>(4).unwrap().unwrap();
    assert!(Rc::ptr_eq(&found, &p));
}

#[test]
fn test_queries_without_scope_fail() {
    assert_eq!(entiscope::scope::is_sealed(), Err(Error::NoActiveScope));
    assert!(matches!(
        entiscope::get::<Product>(1),
        Err(Error::NoActiveScope)
    ));
    assert!(matches!(
        entiscope::insert_entity(&product(Some(1), "x")),
        Err(Error::NoActiveScope)
    ));
}

#[test]
fn test_try_get_by_key() {
    let _scope = entiscope::open(ScopeMode::Normal);
    let p = product(Some(1), "lamp");
    entiscope::insert_entity(&p).unwrap();

    let key = entiscope::EntityKey::of::<Product>(1);
    let found = entiscope::try_get(&key).unwrap().unwrap();
    assert!(found.is(&p));
    assert!(entiscope::try_get(&entiscope::EntityKey::of::<Product>(2))
        .unwrap()
        .is_none());
}

#[entity_scope(mode = "force_new")]
fn count_in_fresh_scope() -> usize {
    entiscope::insert_entity(&product(Some(100), "fresh")).unwrap();
    entiscope::get_all::<Product>().unwrap().len()
}

#[entity_scope(mode = "force_new_sealed")]
fn sealed_inside() -> bool {
    entiscope::scope::is_sealed().unwrap()
}

#[entity_scope]
fn early_return(stop: bool) -> Result<usize, Error> {
    if stop {
        return Ok(0);
    }
    entiscope::insert_entity(&product(Some(200), "kept"))?;
    entiscope::get_all::<Product>().map(|all| all.len())
}

#[test]
fn test_attribute_opens_and_restores_scope() {
    let _outer = entiscope::open(ScopeMode::Normal);
    entiscope::insert_entity(&product(Some(1), "outer")).unwrap();

    assert_eq!(count_in_fresh_scope(), 1);
    assert!(sealed_inside());

    // Back in the outer scope
    assert!(!entiscope::scope::is_sealed().unwrap());
    assert!(!entiscope::contains::<Product>(100).unwrap());
    assert_eq!(entiscope::get_all::<Product>().unwrap().len(), 1);
}

#[test]
fn test_attribute_without_active_scope() {
    assert_eq!(early_return(true), Ok(0));
    assert!(!entiscope::scope::is_active());

    assert_eq!(early_return(false), Ok(1));
    assert!(!entiscope::scope::is_active());
}

#[test]
fn test_attribute_normal_mode_piggybacks() {
    let _outer = entiscope::open(ScopeMode::Normal);
    assert_eq!(early_return(false), Ok(1));
    // The piggyback handle left the entity in the outer scope
    assert!(entiscope::contains::<Product>(200).unwrap());
}

#[test]
fn test_scope_released_when_body_panics() {
    #[entity_scope(mode = "force_new")]
    fn explode() {
        panic!("row decoding failed");
    }

    let result = std::panic::catch_unwind(explode);
    assert!(result.is_err());
    assert!(!entiscope::scope::is_active());
}

#[test]
fn test_with_scope_reports_result() {
    let names = entiscope::with_scope(ScopeMode::ForceNew, || {
        entiscope::insert_many([product(Some(1), "a"), product(Some(2), "b")]).unwrap();
        let mut names: Vec<_> = entiscope::get_all::<Product>()
            .unwrap()
            .iter()
            .map(|p| p.borrow().name.clone())
            .collect();
        names.sort();
        names
    })
    .unwrap();

    assert_eq!(names, vec!["a", "b"]);
    assert!(!entiscope::scope::is_active());
}

#[test]
fn test_each_thread_has_its_own_scope() {
    let _scope = entiscope::open(ScopeMode::Normal);
    entiscope::insert_entity(&product(Some(1), "main")).unwrap();

    let seen_elsewhere = std::thread::spawn(|| {
        let _scope = entiscope::open(ScopeMode::Normal);
        entiscope::contains::<Product>(1).unwrap()
    })
    .join()
    .unwrap();

    assert!(!seen_elsewhere);
    assert!(entiscope::contains::<Product>(1).unwrap());
}
