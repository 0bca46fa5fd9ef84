use thiserror::Error;

use crate::PrimaryKey;

/// Contract violations reported by the identity-map machinery.
///
/// None of these are expected in correct usage. They are surfaced to the
/// caller immediately and never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// `insert` was called without an entity.
    #[error("cannot insert a null entity into the identity map")]
    NullEntity,

    /// An operation needed the active scope but none has been opened on this thread.
    #[error("no entity scope has been opened on this thread")]
    NoActiveScope,

    /// A retriever was released, or asked to resolve, while it was not the top of the chain.
    #[error("inconsistent state of the retriever chain")]
    InconsistentRetrieverState,

    /// A scope guard tried to close a scope that is not the active one.
    #[error("inconsistent state of the scope stack")]
    InconsistentScopeState,

    /// A retriever outlived the scope whose identity map it refers to.
    #[error("the scope owning this retriever has already been closed")]
    ScopeClosed,

    /// The type has neither a bare constructor nor a registered factory.
    #[error("type '{type_name}' has no parameterless constructor")]
    NoDefaultConstructor { type_name: &'static str },

    /// A second, different instance was inserted under an occupied key
    /// while the map runs with [`DuplicatePolicy::Reject`](crate::DuplicatePolicy::Reject).
    #[error("there's a different instance of '{type_name}' with id '{id}' in the identity map")]
    DuplicateInstance {
        type_name: &'static str,
        id: PrimaryKey,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
