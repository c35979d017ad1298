//! Append-only storage with typed handles.
//!
//! Every node of a program (variables, expressions, statements, scopes,
//! blocks, block inputs) lives in an [`Arena`] owned by the
//! [`Program`](crate::Program). Nodes are never removed, so a handle stays
//! valid for the lifetime of its program and handles only ever point at
//! nodes that already existed when they were taken.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::num::NonZeroU32;
use std::ops::{Index, IndexMut};

use crate::IrError;

/// A typed index into an [`Arena`].
///
/// Stored off by one in a `NonZeroU32`, so `Option<Handle<T>>` (an unbound
/// block input, a loop without a counter) costs no extra space.
pub struct Handle<T> {
    slot: NonZeroU32,
    marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub(crate) fn new(index: u32) -> Self {
        let slot = index
            .checked_add(1)
            .and_then(NonZeroU32::new)
            .unwrap_or(NonZeroU32::MAX);
        Self {
            slot,
            marker: PhantomData,
        }
    }

    /// Returns the zero-based index of this handle.
    pub fn index(self) -> usize {
        (self.slot.get() - 1) as usize
    }
}

// Manual impls: deriving would put bounds on `T`.
impl<T> Copy for Handle<T> {}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Eq for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.slot.cmp(&other.slot)
    }
}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.slot.get());
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index())
    }
}

/// Append-only node storage indexed by [`Handle`].
#[derive(Clone, Debug)]
pub struct Arena<T> {
    items: Vec<T>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The handle the next [`append`](Self::append) will return.
    ///
    /// A block and its statement refer to each other, so one of the two
    /// has to be named before it exists.
    pub(crate) fn next_handle(&self) -> Handle<T> {
        Handle::new(self.slot_count())
    }

    pub(crate) fn append(&mut self, value: T) -> Handle<T> {
        let handle = Handle::new(self.slot_count());
        self.items.push(value);
        handle
    }

    fn slot_count(&self) -> u32 {
        match u32::try_from(self.items.len()) {
            Ok(n) if n < u32::MAX => n,
            _ => panic!("program arena is full ({} nodes)", self.items.len()),
        }
    }

    pub fn try_get(&self, handle: Handle<T>) -> Option<&T> {
        self.items.get(handle.index())
    }

    /// Fails with [`IrError::BadHandle`] when `handle` is out of range,
    /// which is how a handle taken from another program shows up.
    pub fn check(&self, handle: Handle<T>) -> Result<(), IrError> {
        match self.try_get(handle) {
            Some(_) => Ok(()),
            None => Err(IrError::BadHandle {
                index: handle.index(),
                size: self.items.len(),
            }),
        }
    }

    /// Nodes in insertion order, paired with their handles.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        (0u32..).zip(&self.items).map(|(i, v)| (Handle::new(i), v))
    }
}

impl<T> Index<Handle<T>> for Arena<T> {
    type Output = T;

    fn index(&self, handle: Handle<T>) -> &T {
        &self.items[handle.index()]
    }
}

impl<T> IndexMut<Handle<T>> for Arena<T> {
    fn index_mut(&mut self, handle: Handle<T>) -> &mut T {
        &mut self.items[handle.index()]
    }
}
