use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::graph::GraphEnumerator;
use crate::retriever::RetrieverChain;
use crate::{AnyEntity, Entity, EntityKey, Error, PrimaryKey, Result, Shared, TypeTag};

#[cfg(feature = "stats")]
use crate::MapStats;

/// What to do when a second, different instance is inserted under a key that
/// is already taken.
///
/// # Variants
///
/// * `Tolerate` - Keep the first instance and report [`Insertion::Conflict`] (default)
/// * `Reject` - Fail with [`Error::DuplicateInstance`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    #[default]
    Tolerate,
    Reject,
}

/// Per-map configuration, chosen when a scope is opened.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MapConfig {
    pub duplicate_policy: DuplicatePolicy,
}

impl MapConfig {
    pub fn strict() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::Reject,
        }
    }
}

/// Outcome of a single insert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Insertion {
    /// The key was free and now holds the entity.
    Inserted,
    /// The very same instance was already resident.
    AlreadyPresent,
    /// The entity has no primary key yet and was not registered.
    SkippedNew,
    /// A different instance holds the key. It stays resident; the new one is dropped.
    Conflict,
}

/// Mapping from (type, primary key) to the single live instance for that key.
///
/// Each key holds at most one instance. The first instance registered under a
/// key wins for as long as the map lives; there is no eviction.
///
/// # Examples
///
/// ```
/// use entiscope_core::{share, Entity, IdentityMap, Insertion, PrimaryKey};
/// use std::rc::Rc;
///
/// #[derive(Default)]
/// struct Customer {
///     id: Option<PrimaryKey>,
/// }
///
/// impl Entity for Customer {
///     fn id(&self) -> Option<&PrimaryKey> {
///         self.id.as_ref()
///     }
///     fn set_id(&mut self, id: PrimaryKey) {
///         self.id = Some(id);
///     }
/// }
///
/// let mut map = IdentityMap::new();
/// let ada = share(Customer { id: Some(7.into()) });
///
/// assert_eq!(map.insert_entity(&ada).unwrap(), Insertion::Inserted);
/// assert!(Rc::ptr_eq(&map.get::<Customer>(7).unwrap(), &ada));
///
/// // Entities that were never saved are not cached
/// let fresh = share(Customer::default());
/// assert_eq!(map.insert_entity(&fresh).unwrap(), Insertion::SkippedNew);
/// ```
#[derive(Debug, Default)]
pub struct IdentityMap {
    entries: HashMap<TypeTag, HashMap<PrimaryKey, AnyEntity>>,
    config: MapConfig,
    pub(crate) retrievers: RetrieverChain,
    #[cfg(feature = "stats")]
    stats: MapStats,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MapConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> MapConfig {
        self.config
    }

    /// Registers an entity coming from the erased materialization pipeline.
    ///
    /// Fails with [`Error::NullEntity`] when `entity` is `None`. See
    /// [`Insertion`] for the possible outcomes otherwise.
    pub fn insert(&mut self, entity: Option<AnyEntity>) -> Result<Insertion> {
        let entity = entity.ok_or(Error::NullEntity)?;
        self.insert_any(entity)
    }

    /// Registers a typed entity.
    pub fn insert_entity<T: Entity>(&mut self, entity: &Shared<T>) -> Result<Insertion> {
        self.insert_any(AnyEntity::new(entity))
    }

    /// Registers every entity, stopping at the first error.
    ///
    /// Returns how many entities were newly inserted.
    pub fn insert_many<I>(&mut self, entities: I) -> Result<usize>
    where
        I: IntoIterator,
        I::Item: Into<AnyEntity>,
    {
        let mut inserted = 0;
        for entity in entities {
            if self.insert_any(entity.into())? == Insertion::Inserted {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    /// Registers every persisted entity reachable from `root`.
    ///
    /// Unsaved entities and embedded values reported by the enumerator are
    /// skipped. Returns how many entities were newly inserted.
    pub fn insert_graph<R, G>(&mut self, enumerator: &G, root: &R) -> Result<usize>
    where
        R: ?Sized,
        G: GraphEnumerator<R> + ?Sized,
    {
        let reachable = enumerator.enumerate_reachable(root);
        tracing::trace!(nodes = reachable.len(), "registering reachable graph");
        self.insert_many(reachable.iter().filter_map(|node| node.persisted().cloned()))
    }

    fn insert_any(&mut self, entity: AnyEntity) -> Result<Insertion> {
        let id = match entity.id() {
            Some(id) => id,
            None => return Ok(Insertion::SkippedNew),
        };
        let tag = entity.type_tag();

        match self.entries.entry(tag).or_default().entry(id) {
            Entry::Vacant(slot) => {
                slot.insert(entity);
                #[cfg(feature = "stats")]
                self.stats.record_insert();
                Ok(Insertion::Inserted)
            }
            Entry::Occupied(slot) => {
                if slot.get().ptr_eq(&entity) {
                    return Ok(Insertion::AlreadyPresent);
                }
                #[cfg(feature = "stats")]
                self.stats.record_conflict();
                match self.config.duplicate_policy {
                    // Odd but allowed: the resident instance wins.
                    DuplicatePolicy::Tolerate => {
                        tracing::debug!(
                            entity_type = tag.name(),
                            id = %slot.key(),
                            "different instance for an already cached entity, keeping the first one"
                        );
                        Ok(Insertion::Conflict)
                    }
                    DuplicatePolicy::Reject => Err(Error::DuplicateInstance {
                        type_name: tag.name(),
                        id: slot.key().clone(),
                    }),
                }
            }
        }
    }

    pub fn contains<T: Entity>(&self, id: impl Into<PrimaryKey>) -> bool {
        self.contains_dyn(TypeTag::of::<T>(), &id.into())
    }

    pub fn contains_dyn(&self, type_tag: TypeTag, id: &PrimaryKey) -> bool {
        self.entries
            .get(&type_tag)
            .map_or(false, |bucket| bucket.contains_key(id))
    }

    pub fn get<T: Entity>(&self, id: impl Into<PrimaryKey>) -> Option<Shared<T>> {
        self.get_dyn(TypeTag::of::<T>(), &id.into())
            .and_then(|entity| entity.downcast::<T>())
    }

    pub fn get_dyn(&self, type_tag: TypeTag, id: &PrimaryKey) -> Option<AnyEntity> {
        let found = self
            .entries
            .get(&type_tag)
            .and_then(|bucket| bucket.get(id))
            .cloned();

        #[cfg(feature = "stats")]
        {
            if found.is_some() {
                self.stats.record_hit();
            } else {
                self.stats.record_miss();
            }
        }

        found
    }

    /// Looks up an entity by its full key.
    ///
    /// A missing type bucket and a missing id inside an existing bucket are
    /// both reported as `None`.
    pub fn try_get(&self, key: &EntityKey) -> Option<AnyEntity> {
        self.get_dyn(key.type_tag, &key.id)
    }

    /// Every instance of `T` in the map, in no particular order.
    pub fn get_all<T: Entity>(&self) -> Vec<Shared<T>> {
        self.get_all_dyn(TypeTag::of::<T>())
            .into_iter()
            .filter_map(|entity| entity.downcast::<T>())
            .collect()
    }

    /// Every instance tagged `type_tag`; empty when the type was never seen.
    pub fn get_all_dyn(&self, type_tag: TypeTag) -> Vec<AnyEntity> {
        self.entries
            .get(&type_tag)
            .map(|bucket| bucket.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Drops the instance registered for `(T, id)` and returns it.
    ///
    /// Meant for rolling back a placeholder whose hydration failed; callers
    /// still holding the instance keep it alive.
    pub fn remove<T: Entity>(&mut self, id: impl Into<PrimaryKey>) -> Option<Shared<T>> {
        self.remove_dyn(TypeTag::of::<T>(), &id.into())
            .and_then(|entity| entity.downcast::<T>())
    }

    pub fn remove_dyn(&mut self, type_tag: TypeTag, id: &PrimaryKey) -> Option<AnyEntity> {
        let bucket = self.entries.get_mut(&type_tag)?;
        let removed = bucket.remove(id);
        if bucket.is_empty() {
            self.entries.remove(&type_tag);
        }
        removed
    }

    /// Whether a hydration pass currently holds a retriever on this map.
    pub fn has_retriever(&self) -> bool {
        self.retrievers.is_active()
    }

    /// Number of cached entities across all types.
    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the lookup statistics of this map.
    ///
    /// This method is only available when the `stats` feature is enabled.
    #[cfg(feature = "stats")]
    pub fn stats(&self) -> &MapStats {
        &self.stats
    }
}
