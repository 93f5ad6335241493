//! The single stack shared by every open handle.

use crate::error::Result;
use crate::stack::IntStack;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// An [`IntStack`] behind an exclusive lock.
///
/// Every primitive mutates the stack, so all of them take the lock in
/// exclusive mode for their whole duration.
#[derive(Debug)]
pub struct SharedStack {
    inner: Mutex<IntStack>,
}

impl SharedStack {
    /// Allocate an empty shared stack.
    pub fn with_capacity(capacity: u32) -> Result<Self> {
        Ok(Self {
            inner: Mutex::new(IntStack::with_capacity(capacity)?),
        })
    }

    pub fn push(&self, value: i32) -> Result<()> {
        self.lock().push(value)
    }

    pub fn pop(&self) -> Result<i32> {
        self.lock().pop()
    }

    pub fn resize(&self, new_capacity: u32) -> Result<()> {
        self.lock().resize(new_capacity)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> u32 {
        self.lock().capacity()
    }

    /// Copy of the elements, bottom to top.
    pub fn snapshot(&self) -> Vec<i32> {
        self.lock().as_slice().to_vec()
    }

    /// Acquire the exclusive lock.
    ///
    /// A panic while holding the guard cannot leave the stack half-updated,
    /// since every primitive commits in a single assignment, so a poisoned
    /// lock is taken over.
    pub fn lock(&self) -> MutexGuard<'_, IntStack> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
