//! Bounded LIFO of machine-word integers.

use crate::error::{Error, Result};

/// A capacity-bounded stack of `i32`.
///
/// Elements `[0, len)` are the values pushed and not yet popped, in push
/// order; the last one is the top. The backing buffer always has room for
/// `capacity` elements, and `capacity` is never zero.
#[derive(Debug)]
pub struct IntStack {
    data: Vec<i32>,
    capacity: u32,
}

impl IntStack {
    /// Allocate an empty stack able to hold `capacity` elements.
    pub fn with_capacity(capacity: u32) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::Invalid("capacity must be greater than 0".to_string()));
        }
        let data = alloc_buffer(capacity)?;
        tracing::info!(capacity, "int_stack: initialized");
        Ok(Self { data, capacity })
    }

    /// Number of elements currently held.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Maximum number of elements.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.data.len() >= self.capacity as usize
    }

    /// The top element, if any.
    pub fn peek(&self) -> Option<i32> {
        self.data.last().copied()
    }

    /// Elements bottom to top.
    pub fn as_slice(&self) -> &[i32] {
        &self.data
    }

    /// Push `value` as the new top. Fails with `OutOfRange` when full.
    pub fn push(&mut self, value: i32) -> Result<()> {
        if self.is_full() {
            tracing::warn!(value, "int_stack: overflow, cannot push");
            return Err(Error::OutOfRange);
        }
        self.data.push(value);
        tracing::debug!(value, size = self.data.len(), "int_stack: pushed");
        Ok(())
    }

    /// Remove and return the top. Fails with `Empty` when there is none.
    pub fn pop(&mut self) -> Result<i32> {
        match self.data.pop() {
            Some(value) => {
                tracing::debug!(value, size = self.data.len(), "int_stack: popped");
                Ok(value)
            }
            None => {
                tracing::warn!("int_stack: underflow");
                Err(Error::Empty)
            }
        }
    }

    /// Change the capacity.
    ///
    /// Shrinking below the current size discards the topmost elements. The
    /// new buffer is allocated before anything is committed, so a failed
    /// allocation leaves the stack exactly as it was.
    pub fn resize(&mut self, new_capacity: u32) -> Result<()> {
        if new_capacity == 0 {
            return Err(Error::Invalid("capacity must be greater than 0".to_string()));
        }

        let mut new_data = alloc_buffer(new_capacity)?;
        let keep = self.data.len().min(new_capacity as usize);
        if keep < self.data.len() {
            tracing::warn!(
                from = self.data.len(),
                to = new_capacity,
                "int_stack: shrinking, data lost"
            );
        }
        new_data.extend_from_slice(&self.data[..keep]);

        self.data = new_data;
        self.capacity = new_capacity;
        tracing::info!(capacity = new_capacity, "int_stack: resized");
        Ok(())
    }
}

impl Drop for IntStack {
    fn drop(&mut self) {
        tracing::info!("int_stack: deinitialized");
    }
}

fn alloc_buffer(capacity: u32) -> Result<Vec<i32>> {
    if alloc_fault::take() {
        return Err(Error::NoMemory);
    }
    let mut data = Vec::new();
    data.try_reserve_exact(capacity as usize)
        .map_err(|_| Error::NoMemory)?;
    Ok(data)
}

/// Allocation failure injection for tests; compiled out otherwise.
#[cfg(test)]
pub(crate) mod alloc_fault {
    use std::cell::Cell;

    thread_local! {
        static FAIL_NEXT: Cell<bool> = const { Cell::new(false) };
    }

    /// Make the next buffer allocation on this thread fail.
    pub(crate) fn fail_next() {
        FAIL_NEXT.with(|f| f.set(true));
    }

    pub(super) fn take() -> bool {
        FAIL_NEXT.with(|f| f.replace(false))
    }
}

#[cfg(not(test))]
mod alloc_fault {
    pub(super) fn take() -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(capacity: u32, values: &[i32]) -> IntStack {
        let mut stack = IntStack::with_capacity(capacity).unwrap();
        for &v in values {
            stack.push(v).unwrap();
        }
        stack
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(IntStack::with_capacity(0), Err(Error::Invalid(_))));
    }

    #[test]
    fn test_push_then_pop_returns_value() {
        let mut stack = IntStack::with_capacity(10).unwrap();
        stack.push(-42).unwrap();
        assert_eq!(stack.pop().unwrap(), -42);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_lifo_order() {
        let mut stack = filled(10, &[1, 2, 3]);
        assert_eq!(stack.pop().unwrap(), 3);
        assert_eq!(stack.pop().unwrap(), 2);
        assert_eq!(stack.pop().unwrap(), 1);
    }

    #[test]
    fn test_overflow_leaves_state_unchanged() {
        let values: Vec<i32> = (0..10).collect();
        let mut stack = filled(10, &values);
        assert!(stack.is_full());

        assert!(matches!(stack.push(10), Err(Error::OutOfRange)));
        assert_eq!(stack.len(), 10);
        assert_eq!(stack.peek(), Some(9));
    }

    #[test]
    fn test_pop_empty() {
        let mut stack = IntStack::with_capacity(3).unwrap();
        assert!(matches!(stack.pop(), Err(Error::Empty)));
        assert_eq!(stack.len(), 0);
    }

    #[test]
    fn test_resize_grow_preserves_elements() {
        let mut stack = filled(5, &[1, 2, 3, 4, 5]);
        stack.resize(20).unwrap();
        assert_eq!(stack.capacity(), 20);
        assert_eq!(stack.as_slice(), &[1, 2, 3, 4, 5]);
        stack.push(6).unwrap();
    }

    #[test]
    fn test_resize_shrink_truncates_top() {
        let mut stack = filled(10, &[1, 2, 3, 4, 5]);
        stack.resize(3).unwrap();
        assert_eq!(stack.capacity(), 3);
        assert_eq!(stack.as_slice(), &[1, 2, 3]);
        assert!(stack.is_full());
    }

    #[test]
    fn test_resize_to_current_size() {
        let mut stack = filled(10, &[7, 8]);
        stack.resize(2).unwrap();
        assert_eq!(stack.as_slice(), &[7, 8]);
        assert!(matches!(stack.push(9), Err(Error::OutOfRange)));
    }

    #[test]
    fn test_construction_out_of_memory() {
        alloc_fault::fail_next();
        assert!(matches!(IntStack::with_capacity(10), Err(Error::NoMemory)));
        assert!(IntStack::with_capacity(10).is_ok());
    }

    #[test]
    fn test_resize_out_of_memory_leaves_state() {
        for new_capacity in [2, 5, 50] {
            let mut stack = filled(5, &[1, 2, 3, 4, 5]);
            alloc_fault::fail_next();
            assert!(matches!(stack.resize(new_capacity), Err(Error::NoMemory)));
            assert_eq!(stack.capacity(), 5);
            assert_eq!(stack.as_slice(), &[1, 2, 3, 4, 5]);
            assert!(matches!(stack.push(6), Err(Error::OutOfRange)));
            assert_eq!(stack.pop().unwrap(), 5);
        }
    }

    #[test]
    fn test_resize_zero_rejected() {
        let mut stack = filled(10, &[1, 2]);
        assert!(matches!(stack.resize(0), Err(Error::Invalid(_))));
        assert_eq!(stack.capacity(), 10);
        assert_eq!(stack.as_slice(), &[1, 2]);
    }
}
