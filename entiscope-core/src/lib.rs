//! # Entiscope Core
//!
//! Core types for the Entiscope identity-map cache.
//!
//! While persisted records are hydrated into entities, every distinct
//! (entity type, primary key) pair must resolve to exactly one live instance,
//! across nested operations and cyclic object graphs. This crate provides the
//! pieces that guarantee it.
//!
//! ## Module Organization
//!
//! - [`key`] - `TypeTag`, `PrimaryKey` and `EntityKey`
//! - [`entity`] - the `Entity` trait and the `Shared`/`AnyEntity` handles
//! - [`identity_map`] - per-scope map from key to live instance
//! - [`retriever`] - LIFO chain of reentrancy tokens for nested hydration
//! - [`scope`] - thread-confined stack of scopes with RAII release
//! - [`factory`] - process-wide cache of bare-instance constructors
//! - [`graph`] - seam to the external object-graph enumerator
//!
//! No state in this crate is shared between threads except the constructor
//! registry in [`factory`].
pub mod entity;
mod error;
pub mod factory;
pub mod graph;
pub mod identity_map;
pub mod key;
pub mod retriever;
pub mod scope;

#[cfg(feature = "stats")]
mod stats;

pub use entity::{share, AnyEntity, Entity, Shared};
pub use error::{Error, Result};
pub use graph::{GraphEnumerator, Modifiable};
pub use identity_map::{DuplicatePolicy, IdentityMap, Insertion, MapConfig};
pub use key::{EntityKey, PrimaryKey, TypeTag};
pub use retriever::{Resolved, Retriever};
pub use scope::{ScopeGuard, ScopeMode};

#[cfg(feature = "stats")]
pub use stats::MapStats;
