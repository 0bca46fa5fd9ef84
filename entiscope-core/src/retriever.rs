//! Reentrancy tokens for graph hydration.
//!
//! Every hydration pass pushes a [`Retriever`] on the chain of the identity
//! map it fills, and pops it when it is done. Nested passes push child
//! retrievers. The chain is strictly LIFO: only the top retriever may resolve
//! entities or be popped, anything else is reported as
//! [`Error::InconsistentRetrieverState`].

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::{factory, Entity, Error, IdentityMap, PrimaryKey, Result, Shared};

struct Node {
    parent: Option<Retriever>,
    depth: usize,
    map: Weak<RefCell<IdentityMap>>,
}

/// One level of in-progress hydration.
///
/// Cloning yields the same token; identity is pointer identity, so a token
/// can be used by the caller as a key for cycle bookkeeping.
#[derive(Clone)]
pub struct Retriever(Rc<Node>);

/// Result of [`Retriever::resolve`].
#[derive(Debug)]
pub enum Resolved<T> {
    /// The instance already registered for the key.
    Cached(Shared<T>),
    /// A bare instance that was just registered and still needs its fields.
    Placeholder(Shared<T>),
}

impl<T> Resolved<T> {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Resolved::Placeholder(_))
    }

    pub fn into_inner(self) -> Shared<T> {
        match self {
            Resolved::Cached(e) | Resolved::Placeholder(e) => e,
        }
    }
}

/// The retriever stack of one identity map.
#[derive(Debug, Default)]
pub(crate) struct RetrieverChain {
    top: Option<Retriever>,
}

impl RetrieverChain {
    pub(crate) fn is_active(&self) -> bool {
        self.top.is_some()
    }

    fn is_top(&self, retriever: &Retriever) -> bool {
        self.top
            .as_ref()
            .map_or(false, |top| top.ptr_eq(retriever))
    }
}

impl Retriever {
    /// Pushes a new retriever on the chain of `map`.
    ///
    /// The first push creates the root retriever; later pushes create children
    /// of the current top.
    ///
    /// # Panics
    ///
    /// Panics if `map` is currently borrowed.
    pub fn push(map: &Rc<RefCell<IdentityMap>>) -> Retriever {
        let mut guard = map.borrow_mut();
        let parent = guard.retrievers.top.take();
        let depth = parent.as_ref().map_or(0, |p| p.depth() + 1);

        let retriever = Retriever(Rc::new(Node {
            parent,
            depth,
            map: Rc::downgrade(map),
        }));
        guard.retrievers.top = Some(retriever.clone());
        tracing::trace!(depth, "retriever pushed");
        retriever
    }

    /// Pops this retriever, making its parent the top of the chain again.
    ///
    /// Fails with [`Error::InconsistentRetrieverState`] unless this retriever
    /// is the current top.
    pub fn pop(&self) -> Result<()> {
        let map = self.map()?;
        let mut map = map.borrow_mut();
        if !map.retrievers.is_top(self) {
            return Err(Error::InconsistentRetrieverState);
        }
        map.retrievers.top = self.0.parent.clone();
        tracing::trace!(depth = self.depth(), "retriever popped");
        Ok(())
    }

    /// Nesting level; the root retriever is at depth 0.
    pub fn depth(&self) -> usize {
        self.0.depth
    }

    pub fn parent(&self) -> Option<&Retriever> {
        self.0.parent.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.0.parent.is_none()
    }

    pub fn ptr_eq(&self, other: &Retriever) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Whether this retriever is the top of its chain.
    pub fn is_current(&self) -> bool {
        self.map()
            .map(|map| map.borrow().retrievers.is_top(self))
            .unwrap_or(false)
    }

    fn map(&self) -> Result<Rc<RefCell<IdentityMap>>> {
        self.0.map.upgrade().ok_or(Error::ScopeClosed)
    }

    /// Runs `f` against the identity map this retriever belongs to.
    pub fn with_map<R>(&self, f: impl FnOnce(&mut IdentityMap) -> R) -> Result<R> {
        let map = self.map()?;
        let mut map = map.borrow_mut();
        Ok(f(&mut map))
    }

    /// Returns the instance registered for `(T, id)`, or registers and returns
    /// a bare placeholder for it.
    ///
    /// Only the top retriever may resolve. A placeholder is visible to every
    /// later lookup, so a cycle that leads back to the same key gets the same
    /// instance instead of hydrating it again.
    ///
    /// The placeholder stays registered if populating it fails. Callers that
    /// bail out must [`discard`](Retriever::discard) it, otherwise the empty
    /// shell is handed out as [`Resolved::Cached`] for the rest of the scope.
    pub fn resolve<T: Entity>(&self, id: impl Into<PrimaryKey>) -> Result<Resolved<T>> {
        let map = self.map()?;
        let mut map = map.borrow_mut();
        if !map.retrievers.is_top(self) {
            return Err(Error::InconsistentRetrieverState);
        }

        let id = id.into();
        if let Some(found) = map.get::<T>(id.clone()) {
            return Ok(Resolved::Cached(found));
        }

        let placeholder = factory::construct::<T>(id)?;
        map.insert_entity(&placeholder)?;
        Ok(Resolved::Placeholder(placeholder))
    }

    /// Unregisters the instance held for `(T, id)`, typically a placeholder
    /// whose hydration failed. Returns it if there was one.
    ///
    /// Like [`resolve`](Retriever::resolve), only the top retriever may
    /// discard.
    pub fn discard<T: Entity>(&self, id: impl Into<PrimaryKey>) -> Result<Option<Shared<T>>> {
        self.with_map(|map| {
            if !map.retrievers.is_top(self) {
                return Err(Error::InconsistentRetrieverState);
            }
            let removed = map.remove::<T>(id);
            if removed.is_some() {
                tracing::debug!(
                    depth = self.depth(),
                    entity_type = std::any::type_name::<T>(),
                    "placeholder discarded"
                );
            }
            Ok(removed)
        })?
    }
}

impl fmt::Debug for Retriever {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retriever")
            .field("depth", &self.0.depth)
            .field("ptr", &Rc::as_ptr(&self.0))
            .finish()
    }
}

/// Pops the held retriever when dropped, so the chain unwinds on every exit
/// path of [`with_retriever`].
struct PopOnDrop(Option<Retriever>);

impl PopOnDrop {
    fn finish(mut self) -> Result<()> {
        match self.0.take() {
            Some(retriever) => retriever.pop(),
            None => Ok(()),
        }
    }
}

impl Drop for PopOnDrop {
    fn drop(&mut self) {
        if let Some(retriever) = self.0.take() {
            if let Err(err) = retriever.pop() {
                tracing::error!(depth = retriever.depth(), %err, "failed to release retriever");
            }
        }
    }
}

/// Pushes a retriever on `map`, runs `f` with it and pops it again, even if
/// `f` panics.
pub fn with_retriever<R>(
    map: &Rc<RefCell<IdentityMap>>,
    f: impl FnOnce(&Retriever) -> R,
) -> Result<R> {
    let retriever = Retriever::push(map);
    let guard = PopOnDrop(Some(retriever.clone()));
    let result = f(&retriever);
    guard.finish()?;
    Ok(result)
}
