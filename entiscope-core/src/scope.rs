//! Thread-confined stack of entity scopes.
//!
//! Each thread has its own notion of the *active* scope. Opening a scope
//! either activates a fresh [`IdentityMap`] or piggybacks on the one already
//! active, depending on the requested [`ScopeMode`]. The returned
//! [`ScopeGuard`] restores the previously active scope when it is closed or
//! dropped, so release happens on every exit path.
//!
//! Nothing in here is shared across threads: a [`ScopeGuard`] is neither
//! `Send` nor `Sync`, and two threads never observe each other's scopes.
//!
//! # Examples
//!
//! ```
//! use entiscope_core::scope::{self, ScopeMode};
//!
//! assert!(!scope::is_active());
//! {
//!     let _outer = scope::open(ScopeMode::Normal);
//!     assert!(scope::is_active());
//!     assert!(!scope::is_sealed().unwrap());
//!
//!     {
//!         let _inner = scope::open(ScopeMode::ForceNewSealed);
//!         assert!(scope::is_sealed().unwrap());
//!     }
//!
//!     // The outer scope is active again
//!     assert!(!scope::is_sealed().unwrap());
//! }
//! assert!(!scope::is_active());
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::retriever::{self, Retriever};
use crate::{Error, IdentityMap, MapConfig, Result};

/// How [`open`] treats an already active scope.
///
/// # Variants
///
/// * `Normal` - Reuse the active scope if there is one, otherwise create one
/// * `ForceNew` - Always create a fresh scope on top of the active one
/// * `ForceNewSealed` - Like `ForceNew`, and mark the new scope sealed
///
/// # Examples
///
/// ```
/// use entiscope_core::ScopeMode;
///
/// assert_eq!(ScopeMode::default(), ScopeMode::Normal);
/// assert!(ScopeMode::ForceNewSealed.forces_new());
/// assert!(!ScopeMode::Normal.forces_new());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScopeMode {
    #[default]
    Normal,
    ForceNew,
    ForceNewSealed,
}

impl ScopeMode {
    pub fn forces_new(self) -> bool {
        !matches!(self, ScopeMode::Normal)
    }

    pub fn is_sealed(self) -> bool {
        matches!(self, ScopeMode::ForceNewSealed)
    }
}

struct Scope {
    map: Rc<RefCell<IdentityMap>>,
    /// Read-only intent; callers enforce it.
    sealed: bool,
    depth: usize,
    /// The scope that was active when this one was opened.
    previous: Option<Rc<Scope>>,
    /// Set when the owning guard was released while a later scope was on top.
    closed: Cell<bool>,
}

impl Scope {
    /// Nearest scope below this one whose guard has not been released yet.
    fn restore_target(&self) -> Option<Rc<Scope>> {
        let mut candidate = self.previous.clone();
        while let Some(scope) = candidate {
            if !scope.closed.get() {
                return Some(scope);
            }
            candidate = scope.previous.clone();
        }
        None
    }
}

thread_local! {
    static CURRENT: RefCell<Option<Rc<Scope>>> = const { RefCell::new(None) };
}

fn current() -> Result<Rc<Scope>> {
    CURRENT
        .with(|c| c.borrow().clone())
        .ok_or(Error::NoActiveScope)
}

/// Handle returned by [`open`].
///
/// A guard that created a scope restores the previously active one when it is
/// closed or dropped. A piggyback guard, which reused the active scope, leaves
/// the stack alone.
#[must_use = "the scope is closed as soon as the guard is dropped"]
pub struct ScopeGuard {
    created: Option<Rc<Scope>>,
}

impl ScopeGuard {
    /// Whether this guard reused an already active scope.
    pub fn is_piggyback(&self) -> bool {
        self.created.is_none()
    }

    /// Closes the scope, reporting misuse instead of logging it.
    ///
    /// Fails with [`Error::InconsistentScopeState`] when the scope this guard
    /// created is no longer the active one, i.e. an inner scope is still
    /// open. The active scope stays as it is, but the released scope is
    /// marked closed: once the inner scopes are closed, the stack skips it and
    /// goes back to the nearest scope whose guard is still alive.
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        let created = match self.created.take() {
            Some(created) => created,
            None => return Ok(()),
        };

        CURRENT.with(|c| {
            let mut current = c.borrow_mut();
            let is_top = current
                .as_ref()
                .map_or(false, |top| Rc::ptr_eq(top, &created));
            if !is_top {
                created.closed.set(true);
                return Err(Error::InconsistentScopeState);
            }
            *current = created.restore_target();
            tracing::trace!(depth = created.depth, "entity scope closed");
            Ok(())
        })
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            tracing::error!(%err, "entity scope dropped out of order");
        }
    }
}

/// Opens a scope on the current thread with the default [`MapConfig`].
pub fn open(mode: ScopeMode) -> ScopeGuard {
    open_with(mode, MapConfig::default())
}

/// Opens a scope on the current thread.
///
/// `config` only applies when a new scope is created; a piggyback guard uses
/// the active scope as it is.
pub fn open_with(mode: ScopeMode, config: MapConfig) -> ScopeGuard {
    CURRENT.with(|c| {
        let mut current = c.borrow_mut();
        if current.is_some() && !mode.forces_new() {
            tracing::trace!("reusing active entity scope");
            return ScopeGuard { created: None };
        }

        let depth = current.as_ref().map_or(0, |s| s.depth + 1);
        let scope = Rc::new(Scope {
            map: Rc::new(RefCell::new(IdentityMap::with_config(config))),
            sealed: mode.is_sealed(),
            depth,
            previous: current.take(),
            closed: Cell::new(false),
        });
        *current = Some(scope.clone());
        tracing::trace!(depth, sealed = scope.sealed, "entity scope opened");

        ScopeGuard {
            created: Some(scope),
        }
    })
}

/// Runs `f` inside a scope opened with `mode` and closes it afterwards.
///
/// The scope is released even if `f` panics.
pub fn with_scope<R>(mode: ScopeMode, f: impl FnOnce() -> R) -> Result<R> {
    let guard = open(mode);
    let result = f();
    guard.close()?;
    Ok(result)
}

/// Whether a scope is active on this thread.
pub fn is_active() -> bool {
    CURRENT.with(|c| c.borrow().is_some())
}

/// Whether the active scope was opened with [`ScopeMode::ForceNewSealed`].
pub fn is_sealed() -> Result<bool> {
    current().map(|scope| scope.sealed)
}

/// Whether a hydration pass holds a retriever on the active scope.
pub fn has_retriever() -> bool {
    current()
        .map(|scope| scope.map.borrow().has_retriever())
        .unwrap_or(false)
}

/// Runs `f` against the identity map of the active scope.
///
/// # Panics
///
/// Panics if called again from inside `f`, or if `f` pushes or pops
/// retrievers: the map is exclusively borrowed for the duration of the call.
pub fn with_map<R>(f: impl FnOnce(&mut IdentityMap) -> R) -> Result<R> {
    let scope = current()?;
    let mut map = scope.map.borrow_mut();
    Ok(f(&mut map))
}

/// Pushes a retriever on the active scope's chain.
pub fn push_retriever() -> Result<Retriever> {
    current().map(|scope| Retriever::push(&scope.map))
}

/// Pops `retriever`, which must be the top of the active scope's chain.
pub fn pop_retriever(retriever: &Retriever) -> Result<()> {
    retriever.pop()
}

/// Runs `f` with a fresh retriever on the active scope, popping it on every
/// exit path.
pub fn with_retriever<R>(f: impl FnOnce(&Retriever) -> R) -> Result<R> {
    let scope = current()?;
    retriever::with_retriever(&scope.map, f)
}
