use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::{EntityKey, PrimaryKey, TypeTag};

/// A live, context-confined entity instance.
///
/// Instances are shared between the identity map and the object graph that
/// references them, and are populated after they have been registered, hence
/// `Rc<RefCell<_>>`. Neither half is `Send`: an instance never leaves the
/// thread that hydrated it.
pub type Shared<T> = Rc<RefCell<T>>;

/// Wraps a value into a [`Shared`] instance.
pub fn share<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}

/// A persisted domain object identified by its type and primary key.
///
/// Usually derived with `#[derive(Entity)]` from the `entiscope` crate.
///
/// # Examples
///
/// ```
/// use entiscope_core::{Entity, PrimaryKey};
///
/// #[derive(Default)]
/// struct Customer {
///     id: Option<PrimaryKey>,
///     name: String,
/// }
///
/// impl Entity for Customer {
///     fn id(&self) -> Option<&PrimaryKey> {
///         self.id.as_ref()
///     }
///
///     fn set_id(&mut self, id: PrimaryKey) {
///         self.id = Some(id);
///     }
///
///     fn bare_constructor() -> Option<fn() -> Self> {
///         Some(Self::default)
///     }
/// }
///
/// let mut customer = Customer::default();
/// assert!(customer.is_new());
/// customer.set_id(PrimaryKey::Int(3));
/// assert!(!customer.is_new());
/// ```
pub trait Entity: 'static {
    /// The primary key, or `None` while the entity has never been saved.
    fn id(&self) -> Option<&PrimaryKey>;

    fn set_id(&mut self, id: PrimaryKey);

    fn is_new(&self) -> bool {
        self.id().is_none()
    }

    /// Side-effect free constructor producing an empty shell of this type.
    ///
    /// Used by the bare-instance factory the first time the type is
    /// constructed. Types returning `None` must be registered with
    /// [`factory::register`](crate::factory::register) before they can be
    /// bare-constructed.
    fn bare_constructor() -> Option<fn() -> Self>
    where
        Self: Sized,
    {
        None
    }
}

trait ErasedEntity {
    fn current_id(&self) -> Option<PrimaryKey>;
}

impl<T: Entity> ErasedEntity for RefCell<T> {
    fn current_id(&self) -> Option<PrimaryKey> {
        self.borrow().id().cloned()
    }
}

/// Type-erased handle to a [`Shared`] entity.
///
/// Two handles are the same entity when they point to the same allocation;
/// see [`AnyEntity::ptr_eq`].
#[derive(Clone)]
pub struct AnyEntity {
    tag: TypeTag,
    any: Rc<dyn Any>,
    erased: Rc<dyn ErasedEntity>,
}

impl AnyEntity {
    pub fn new<T: Entity>(entity: &Shared<T>) -> Self {
        let any: Rc<dyn Any> = entity.clone();
        let erased: Rc<dyn ErasedEntity> = entity.clone();
        Self {
            tag: TypeTag::of::<T>(),
            any,
            erased,
        }
    }

    pub fn type_tag(&self) -> TypeTag {
        self.tag
    }

    /// Reads the primary key currently stored in the entity.
    ///
    /// # Panics
    ///
    /// Panics if the entity is mutably borrowed at the time of the call.
    pub fn id(&self) -> Option<PrimaryKey> {
        self.erased.current_id()
    }

    pub fn is_new(&self) -> bool {
        self.id().is_none()
    }

    /// The identity-map key, or `None` for entities that were never saved.
    pub fn key(&self) -> Option<EntityKey> {
        self.id().map(|id| EntityKey::new(self.tag, id))
    }

    pub fn downcast<T: Entity>(&self) -> Option<Shared<T>> {
        self.any.clone().downcast::<RefCell<T>>().ok()
    }

    pub fn ptr_eq(&self, other: &AnyEntity) -> bool {
        Rc::as_ptr(&self.any) as *const () == Rc::as_ptr(&other.any) as *const ()
    }

    pub fn is<T: Entity>(&self, entity: &Shared<T>) -> bool {
        Rc::as_ptr(&self.any) as *const () == Rc::as_ptr(entity) as *const ()
    }
}

impl<T: Entity> From<&Shared<T>> for AnyEntity {
    fn from(entity: &Shared<T>) -> Self {
        AnyEntity::new(entity)
    }
}

impl<T: Entity> From<Shared<T>> for AnyEntity {
    fn from(entity: Shared<T>) -> Self {
        AnyEntity::new(&entity)
    }
}

impl fmt::Debug for AnyEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyEntity")
            .field("type", &self.tag.name())
            .field("ptr", &(Rc::as_ptr(&self.any) as *const ()))
            .finish()
    }
}
