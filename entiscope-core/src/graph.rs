//! Seam to the object-graph traversal that lives outside this crate.
//!
//! [`IdentityMap::insert_graph`](crate::IdentityMap::insert_graph) asks a
//! [`GraphEnumerator`] for every object reachable from a root and registers
//! the persisted entities among them.

use crate::{AnyEntity, TypeTag};

/// One object reachable from a graph root.
#[derive(Clone, Debug)]
pub enum Modifiable {
    /// An entity, persisted or not.
    Entity(AnyEntity),
    /// A value owned by an entity that has no identity of its own
    /// (embedded value, collection, ...). Never registered.
    Embedded(TypeTag),
}

impl Modifiable {
    /// The entity, if this node is one that has been persisted.
    pub fn persisted(&self) -> Option<&AnyEntity> {
        match self {
            Modifiable::Entity(e) if !e.is_new() => Some(e),
            _ => None,
        }
    }
}

impl From<AnyEntity> for Modifiable {
    fn from(entity: AnyEntity) -> Self {
        Modifiable::Entity(entity)
    }
}

/// Enumerates every object reachable from a root, the root included.
///
/// Implementations must terminate on cyclic graphs. Any closure with the
/// matching signature is an enumerator.
///
/// # Examples
///
/// ```
/// use entiscope_core::{share, AnyEntity, Entity, GraphEnumerator, Modifiable, PrimaryKey};
///
/// struct Tag {
///     id: Option<PrimaryKey>,
/// }
///
/// impl Entity for Tag {
///     fn id(&self) -> Option<&PrimaryKey> {
///         self.id.as_ref()
///     }
///     fn set_id(&mut self, id: PrimaryKey) {
///         self.id = Some(id);
///     }
/// }
///
/// let only_root = |root: &AnyEntity| vec![Modifiable::Entity(root.clone())];
/// let tag = share(Tag { id: Some(PrimaryKey::Int(1)) });
///
/// assert_eq!(only_root.enumerate_reachable(&AnyEntity::new(&tag)).len(), 1);
/// ```
pub trait GraphEnumerator<R: ?Sized> {
    fn enumerate_reachable(&self, root: &R) -> Vec<Modifiable>;
}

impl<R: ?Sized, F> GraphEnumerator<R> for F
where
    F: Fn(&R) -> Vec<Modifiable>,
{
    fn enumerate_reachable(&self, root: &R) -> Vec<Modifiable> {
        self(root)
    }
}
