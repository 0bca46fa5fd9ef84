use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::num::TryFromIntError;

/// Runtime tag for an entity type.
///
/// Two tags are equal when they describe the same Rust type. The type name is
/// carried only for diagnostics and does not take part in equality or hashing.
///
/// # Examples
///
/// ```
/// use entiscope_core::TypeTag;
///
/// struct Invoice;
/// struct Customer;
///
/// assert_eq!(TypeTag::of::<Invoice>(), TypeTag::of::<Invoice>());
/// assert_ne!(TypeTag::of::<Invoice>(), TypeTag::of::<Customer>());
/// assert!(TypeTag::of::<Invoice>().name().ends_with("Invoice"));
/// ```
#[derive(Clone, Copy, Debug)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

impl Hash for TypeTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Identifier assigned to an entity once it has been persisted.
///
/// Entities that have not been saved yet carry no `PrimaryKey` at all and can
/// never become part of an [`EntityKey`].
///
/// # Examples
///
/// ```
/// use entiscope_core::PrimaryKey;
///
/// assert_eq!(PrimaryKey::from(42), PrimaryKey::Int(42));
/// assert_eq!(PrimaryKey::from("INV-1").to_string(), "INV-1");
///
/// let composite = PrimaryKey::Composite(vec![1.into(), "A".into()]);
/// assert_eq!(composite.to_string(), "(1, A)");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimaryKey {
    Int(i64),
    Text(String),
    Composite(Vec<PrimaryKey>),
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimaryKey::Int(v) => write!(f, "{}", v),
            PrimaryKey::Text(v) => f.write_str(v),
            PrimaryKey::Composite(parts) => {
                f.write_str("(")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", part)?;
                }
                f.write_str(")")
            }
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for PrimaryKey {
                fn from(v: $t) -> Self {
                    PrimaryKey::Int(i64::from(v))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

// Wider unsigned ids only fit while they stay within `i64`.
macro_rules! impl_try_from_uint {
    ($($t:ty),*) => {
        $(
            impl TryFrom<$t> for PrimaryKey {
                type Error = TryFromIntError;

                fn try_from(v: $t) -> Result<Self, Self::Error> {
                    i64::try_from(v).map(PrimaryKey::Int)
                }
            }
        )*
    };
}

impl_try_from_uint!(u64, usize);

impl From<&str> for PrimaryKey {
    fn from(v: &str) -> Self {
        PrimaryKey::Text(v.to_string())
    }
}

impl From<String> for PrimaryKey {
    fn from(v: String) -> Self {
        PrimaryKey::Text(v)
    }
}

/// The identity of a persisted entity: its type plus its primary key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntityKey {
    pub type_tag: TypeTag,
    pub id: PrimaryKey,
}

impl EntityKey {
    pub fn new(type_tag: TypeTag, id: impl Into<PrimaryKey>) -> Self {
        Self {
            type_tag,
            id: id.into(),
        }
    }

    pub fn of<T: 'static>(id: impl Into<PrimaryKey>) -> Self {
        Self::new(TypeTag::of::<T>(), id)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.type_tag, self.id)
    }
}
