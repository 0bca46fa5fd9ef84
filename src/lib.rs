//! # Entiscope
//!
//! A scoped identity-map cache for materializing persisted records into
//! entities.
//!
//! Within a scope, every distinct (entity type, primary key) pair resolves to
//! exactly one live instance, even across nested operations and cyclic object
//! graphs. Scopes live on the current thread only; nothing is locked or shared.
//!
//! ## Features
//!
//! - **Identity map**: one instance per key, first registration wins
//! - **Nested scopes**: piggyback on the active scope or force a fresh one
//! - **RAII release**: the previous scope is restored on every exit path
//! - **Reentrant hydration**: a strict LIFO retriever chain per scope
//! - **Bare construction**: cached, side-effect free constructors per type
//!
//! ## Quick Start
//!
//! ```rust
//! use entiscope::{entity_scope, share, Entity, PrimaryKey};
//! use std::rc::Rc;
//!
//! #[derive(Entity, Default)]
//! #[entity(default)]
//! struct Customer {
//!     id: Option<PrimaryKey>,
//!     name: String,
//! }
//!
//! #[entity_scope]
//! fn load() -> bool {
//!     let ada = share(Customer { id: Some(1.into()), name: "Ada".into() });
//!     entiscope::insert_entity(&ada).unwrap();
//!
//!     let again = entiscope::get::<Customer>(1).unwrap().unwrap();
//!     Rc::ptr_eq(&ada, &again)
//! }
//!
//! assert!(load());
//! // The scope was released when `load` returned
//! assert!(!entiscope::scope::is_active());
//! ```
//!
//! ## Nested Scopes
//!
//! ```rust
//! use entiscope::{share, Entity, PrimaryKey, ScopeMode};
//!
//! #[derive(Entity)]
//! struct Tag {
//!     id: Option<PrimaryKey>,
//! }
//!
//! let _outer = entiscope::open(ScopeMode::Normal);
//! {
//!     let _inner = entiscope::open(ScopeMode::ForceNew);
//!     entiscope::insert_entity(&share(Tag { id: Some(5.into()) })).unwrap();
//!     assert!(entiscope::contains::<Tag>(5).unwrap());
//! }
//! // Entities registered in the inner scope went away with it
//! assert!(!entiscope::contains::<Tag>(5).unwrap());
//! ```
//!
//! ## Error Handling
//!
//! Every operation on the active scope fails with [`Error::NoActiveScope`]
//! when no scope has been opened on the current thread.

pub use entiscope_core::*;
pub use entiscope_macros::{entity_scope, Entity};

pub use entiscope_core::scope::{open, open_with, with_scope};

/// Registers an entity from the erased pipeline in the active scope.
///
/// Fails with [`Error::NullEntity`] when `entity` is `None`.
pub fn insert(entity: Option<AnyEntity>) -> Result<Insertion> {
    scope::with_map(|map| map.insert(entity))?
}

/// Registers a typed entity in the active scope.
pub fn insert_entity<T: Entity>(entity: &Shared<T>) -> Result<Insertion> {
    scope::with_map(|map| map.insert_entity(entity))?
}

/// Registers every entity in the active scope, returning how many were new.
pub fn insert_many<I>(entities: I) -> Result<usize>
where
    I: IntoIterator,
    I::Item: Into<AnyEntity>,
{
    scope::with_map(|map| map.insert_many(entities))?
}

/// Registers every persisted entity reachable from `root` in the active scope.
///
/// # Examples
///
/// ```rust
/// use entiscope::{share, AnyEntity, Entity, Modifiable, PrimaryKey, ScopeMode};
///
/// #[derive(Entity)]
/// struct Node {
///     id: Option<PrimaryKey>,
/// }
///
/// let _scope = entiscope::open(ScopeMode::Normal);
/// let saved = share(Node { id: Some(1.into()) });
/// let unsaved = share(Node { id: None });
///
/// let enumerate = |_: &()| {
///     vec![
///         Modifiable::Entity(AnyEntity::new(&saved)),
///         Modifiable::Entity(AnyEntity::new(&unsaved)),
///     ]
/// };
///
/// assert_eq!(entiscope::insert_graph(&enumerate, &()).unwrap(), 1);
/// ```
pub fn insert_graph<R, G>(enumerator: &G, root: &R) -> Result<usize>
where
    R: ?Sized,
    G: GraphEnumerator<R> + ?Sized,
{
    scope::with_map(|map| map.insert_graph(enumerator, root))?
}

pub fn contains<T: Entity>(id: impl Into<PrimaryKey>) -> Result<bool> {
    scope::with_map(|map| map.contains::<T>(id))
}

pub fn get<T: Entity>(id: impl Into<PrimaryKey>) -> Result<Option<Shared<T>>> {
    scope::with_map(|map| map.get::<T>(id))
}

/// Every instance of `T` in the active scope; empty when none was registered.
pub fn get_all<T: Entity>() -> Result<Vec<Shared<T>>> {
    scope::with_map(|map| map.get_all::<T>())
}

pub fn try_get(key: &EntityKey) -> Result<Option<AnyEntity>> {
    scope::with_map(|map| map.try_get(key))
}

/// Builds an empty `T` carrying `id` without registering it anywhere.
pub fn construct<T: Entity>(id: impl Into<PrimaryKey>) -> Result<Shared<T>> {
    factory::construct::<T>(id)
}

pub use entiscope_core::scope::{pop_retriever, push_retriever, with_retriever};
