//! Bare-instance construction.
//!
//! Hydration needs to hand out an instance for a key before its fields have
//! been read, so that cycles in the graph can point back at it. This module
//! builds those empty shells.
//!
//! Constructors are resolved once per type and kept in a process-wide
//! registry. A constructor is a pure function of its type, so every thread
//! and every scope shares the same entry.
//!
//! # Examples
//!
//! ```
//! use entiscope_core::{factory, Entity, PrimaryKey};
//!
//! struct Account {
//!     id: Option<PrimaryKey>,
//!     currency: String,
//! }
//!
//! impl Entity for Account {
//!     fn id(&self) -> Option<&PrimaryKey> {
//!         self.id.as_ref()
//!     }
//!     fn set_id(&mut self, id: PrimaryKey) {
//!         self.id = Some(id);
//!     }
//! }
//!
//! // No bare constructor on the trait impl: register one explicitly
//! factory::register::<Account>(|| Account { id: None, currency: String::new() });
//!
//! let account = factory::construct::<Account>(12).unwrap();
//! assert_eq!(account.borrow().id, Some(PrimaryKey::Int(12)));
//! ```

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::{share, Entity, Error, PrimaryKey, Result, Shared};

/// Boxed `fn() -> T`, downcast back by the caller that knows `T`.
type Constructor = Box<dyn Any + Send + Sync>;

static FACTORIES: Lazy<RwLock<HashMap<TypeId, Constructor>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Registers the bare constructor for `T`, replacing any previous one.
pub fn register<T: Entity>(constructor: fn() -> T) {
    FACTORIES
        .write()
        .insert(TypeId::of::<T>(), Box::new(constructor) as Constructor);
    tracing::trace!(entity_type = type_name::<T>(), "bare constructor registered");
}

/// Whether a constructor for `T` has been registered or resolved already.
pub fn is_registered<T: Entity>() -> bool {
    FACTORIES.read().contains_key(&TypeId::of::<T>())
}

/// Removes every cached constructor.
///
/// Constructors coming from [`Entity::bare_constructor`] are resolved again
/// on next use; explicit registrations are lost. Useful for testing.
pub fn clear() {
    FACTORIES.write().clear();
}

fn resolve<T: Entity>() -> Result<fn() -> T> {
    let cached = FACTORIES
        .read()
        .get(&TypeId::of::<T>())
        .and_then(|constructor| constructor.downcast_ref::<fn() -> T>().copied());
    if let Some(constructor) = cached {
        return Ok(constructor);
    }

    let constructor = T::bare_constructor().ok_or(Error::NoDefaultConstructor {
        type_name: type_name::<T>(),
    })?;
    FACTORIES
        .write()
        .entry(TypeId::of::<T>())
        .or_insert_with(|| Box::new(constructor) as Constructor);
    tracing::trace!(entity_type = type_name::<T>(), "bare constructor resolved");
    Ok(constructor)
}

/// Builds an empty `T` carrying `id`.
///
/// The instance is not registered in any identity map; that is left to the
/// caller. Fails with [`Error::NoDefaultConstructor`] when `T` has no bare
/// constructor and none was registered.
pub fn construct<T: Entity>(id: impl Into<PrimaryKey>) -> Result<Shared<T>> {
    let constructor = resolve::<T>()?;
    let mut instance = constructor();
    instance.set_id(id.into());
    Ok(share(instance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::test_entities::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_construct_sets_id() {
        let c = construct::<Customer>(7).unwrap();
        assert_eq!(c.borrow().id, Some(PrimaryKey::Int(7)));
        assert_eq!(c.borrow().name, "");
    }

    #[test]
    #[serial]
    fn test_constructor_is_cached_after_first_use() {
        clear();
        assert!(!is_registered::<Order>());

        construct::<Order>(1).unwrap();
        assert!(is_registered::<Order>());
    }

    #[test]
    #[serial]
    fn test_missing_constructor_fails() {
        clear();
        let err = construct::<Ledger>(1).unwrap_err();
        assert!(matches!(err, Error::NoDefaultConstructor { type_name } if type_name.ends_with("Ledger")));
        assert!(!is_registered::<Ledger>());
    }

    #[test]
    #[serial]
    fn test_registered_constructor_is_used() {
        clear();
        register::<Ledger>(|| Ledger {
            id: None,
            currency: "EUR",
        });

        let ledger = construct::<Ledger>("L-1").unwrap();
        assert_eq!(ledger.borrow().currency, "EUR");
        assert_eq!(ledger.borrow().id, Some(PrimaryKey::from("L-1")));
    }

    #[test]
    #[serial]
    fn test_each_call_builds_a_fresh_instance() {
        let a = construct::<Customer>(1).unwrap();
        let b = construct::<Customer>(1).unwrap();
        assert!(!std::rc::Rc::ptr_eq(&a, &b));
    }
}
